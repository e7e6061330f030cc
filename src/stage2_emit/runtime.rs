//! Fixed assembly text the program-begin call streams out: the reset vector's
//! runtime cells and the arithmetic support routines the 16-bit multiply/
//! divide/remainder rules call into.
//!
//! The cells are process-wide on purpose: every use is confined to one
//! straight-line combine sequence or one helper activation, and no user call
//! can occur in between, so recursion never observes them mid-update.
//! (Values that do survive a call go through frame-scoped spill cells.)

/// Scratch and constant cells, placed below the code.
pub const RUNTIME_CELLS: &str = "\
_t0:    .space 4      ; combine scratch, low byte first
_t1:    .space 4      ; second combine scratch
_ret:   .space 4      ; double-word return value
_op1:   .word 0       ; helper operand 1
_op2:   .word 0       ; helper operand 2
_mres:  .word 0       ; multiply accumulator
_dq:    .word 0       ; division quotient
_drem:  .word 0       ; division remainder
_dcnt:  .byte 0       ; division loop counter
_dsgn:  .byte 0       ; pending result sign
_c00:   .byte 0x00
_c01:   .byte 0x01
_c80:   .byte 0x80
_cff:   .byte 0xFF
";

/// `__mul16`: `Y:AC = _op1 * _op2` (low 16 bits, shift-and-add).
/// `__udm16`: `_dq = _op1 / _op2`, `_drem = _op1 % _op2`, unsigned restoring
/// division; `__udiv16`/`__umod16`/`__sdiv16`/`__smod16` wrap it. The signed
/// wrappers truncate toward zero; the remainder takes the dividend's sign.
/// `__sdiv8`/`__smod8` wrap the unsigned `DIV`/`MOD` instructions the same
/// way. All of them destroy `_op1`/`_op2`.
pub const RUNTIME_ROUTINES: &str = "\
__mul16:
    LDI 0
    STA _mres
    STA _mres+1
__mul16_loop:
    LDA _op2
    OR _op2+1
    JZ __mul16_done
    LDA _op2
    AND _c01
    JZ __mul16_skip
    LDA _mres
    ADD _op1
    STA _mres
    LDA _mres+1
    ADC _op1+1
    STA _mres+1
__mul16_skip:
    LDA _op1
    ADD _op1
    STA _op1
    LDA _op1+1
    ADC _op1+1
    STA _op1+1
    LDA _op2+1
    SHR
    STA _op2+1
    JC __mul16_carry
    LDA _op2
    SHR
    STA _op2
    JMP __mul16_loop
__mul16_carry:
    LDA _op2
    SHR
    OR _c80
    STA _op2
    JMP __mul16_loop
__mul16_done:
    LDA _mres+1
    TAY
    LDA _mres
    RET

__udm16:
    LDI 0
    STA _drem
    STA _drem+1
    STA _dq
    STA _dq+1
    LDI 16
    STA _dcnt
__udm16_loop:
    LDA _op1
    ADD _op1
    STA _op1
    LDA _op1+1
    ADC _op1+1
    STA _op1+1
    LDA _drem
    ADC _drem
    STA _drem
    LDA _drem+1
    ADC _drem+1
    STA _drem+1
    JC __udm16_high
    LDA _dq
    ADD _dq
    STA _dq
    LDA _dq+1
    ADC _dq+1
    STA _dq+1
    LDA _drem+1
    CMP _op2+1
    JC __udm16_next
    JNZ __udm16_sub
    LDA _drem
    CMP _op2
    JC __udm16_next
    JMP __udm16_sub
__udm16_high:
    LDA _dq
    ADD _dq
    STA _dq
    LDA _dq+1
    ADC _dq+1
    STA _dq+1
__udm16_sub:
    LDA _drem
    SUB _op2
    STA _drem
    LDA _drem+1
    SBC _op2+1
    STA _drem+1
    LDA _dq
    OR _c01
    STA _dq
__udm16_next:
    LDA _dcnt
    DEC
    STA _dcnt
    JNZ __udm16_loop
    RET

__udiv16:
    CALL __udm16
    LDA _dq+1
    TAY
    LDA _dq
    RET

__umod16:
    CALL __udm16
    LDA _drem+1
    TAY
    LDA _drem
    RET

__sabs16:
    LDA _op1+1
    AND _c80
    JZ __sabs16_op2
    LDA _op1
    XOR _cff
    ADD _c01
    STA _op1
    LDA _op1+1
    XOR _cff
    ADC _c00
    STA _op1+1
__sabs16_op2:
    LDA _op2+1
    AND _c80
    JZ __sabs16_done
    LDA _op2
    XOR _cff
    ADD _c01
    STA _op2
    LDA _op2+1
    XOR _cff
    ADC _c00
    STA _op2+1
__sabs16_done:
    RET

__sdiv16:
    LDA _op1+1
    XOR _op2+1
    AND _c80
    STA _dsgn
    CALL __sabs16
    CALL __udm16
    LDA _dsgn
    JZ __sdiv16_pos
    LDA _dq
    XOR _cff
    ADD _c01
    STA _dq
    LDA _dq+1
    XOR _cff
    ADC _c00
    STA _dq+1
__sdiv16_pos:
    LDA _dq+1
    TAY
    LDA _dq
    RET

__smod16:
    LDA _op1+1
    AND _c80
    STA _dsgn
    CALL __sabs16
    CALL __udm16
    LDA _dsgn
    JZ __smod16_pos
    LDA _drem
    XOR _cff
    ADD _c01
    STA _drem
    LDA _drem+1
    XOR _cff
    ADC _c00
    STA _drem+1
__smod16_pos:
    LDA _drem+1
    TAY
    LDA _drem
    RET

__sabs8:
    LDA _op1
    JN __sabs8_neg1
    JMP __sabs8_op2
__sabs8_neg1:
    NEG
    STA _op1
__sabs8_op2:
    LDA _op2
    JN __sabs8_neg2
    RET
__sabs8_neg2:
    NEG
    STA _op2
    RET

__sdiv8:
    LDA _op1
    XOR _op2
    AND _c80
    STA _dsgn
    CALL __sabs8
    LDA _op2
    TAX
    LDA _op1
    DIV
    TAY
    LDA _dsgn
    JZ __sdiv8_pos
    TYA
    NEG
    RET
__sdiv8_pos:
    TYA
    RET

__smod8:
    LDA _op1
    AND _c80
    STA _dsgn
    CALL __sabs8
    LDA _op2
    TAX
    LDA _op1
    MOD
    TAY
    LDA _dsgn
    JZ __smod8_pos
    TYA
    NEG
    RET
__smod8_pos:
    TYA
    RET
";
