//! The NEANDER-X capability menu: every rule the matcher may choose from, in
//! declaration order (earlier rules win cost ties).
//!
//! Register-class conventions the templates rely on:
//! - a B1 value lives in `AC`, a B2 value in `Y:AC` (low in `AC`), a B4 value
//!   as four bytes on the stack (most significant pushed first);
//! - when a rule has two register-class leaves, the engine banks the left
//!   value before the right one's code runs (B1: `PUSH`; B2: `PUSH`,`TYA`,
//!   `PUSH`; B4: already on the stack), so combine templates always see the
//!   left operand on the stack and the right one in the accumulator bank;
//! - `_t0`/`_t1` are process-wide scratch cells, legal inside one combine
//!   sequence because no call can intervene; `_op1`/`_op2` marshal runtime
//!   helper arguments.

use crate::common::{
    ir::Operation as Op,
    types::{SizeClass, Signedness},
};
use crate::stage1_select::{
    rule::{
        Matcher, Nonterminal, Pattern, PatternKid, Rule, RuleTable, SideCondition, StructuredEmit,
    },
    terminal::Terminal,
};
use std::sync::LazyLock;

use Nonterminal::*;
use SizeClass::*;
use Signedness::*;
use StructuredEmit as SE;

const SIGNS: [Signedness; 2] = [Signed, Unsigned];

const fn t(op: Op, size: SizeClass, sign: Signedness) -> Terminal {
    Terminal::new(op, size, sign)
}
fn nt(n: Nonterminal) -> PatternKid {
    PatternKid::Nt(n)
}
fn sub(term: Terminal, kids: Vec<PatternKid>) -> PatternKid {
    PatternKid::Sub(Pattern { term, kids })
}
fn tree(term: Terminal, kids: Vec<PatternKid>) -> Matcher {
    Matcher::Tree(Pattern { term, kids })
}
fn leaf(term: Terminal) -> Matcher {
    tree(term, vec![])
}
fn chain(src: Nonterminal) -> Matcher {
    Matcher::Chain(src)
}
/// A memory operand: `Indir` of an `Addr` or `Faddr` leaf.
fn load(size: SizeClass, sign: Signedness, base: Nonterminal) -> PatternKid {
    sub(t(Op::Indir, size, sign), vec![nt(base)])
}
/// A spill-cell pointer leaf.
fn spill() -> PatternKid {
    sub(t(Op::AddrSpill, B2, Unsigned), vec![])
}

pub fn rules() -> &'static RuleTable {
    static TABLE: LazyLock<RuleTable> = LazyLock::new(build);
    &TABLE
}

fn build() -> RuleTable {
    let mut r: Vec<Rule> = vec![];

    /* Constants and addresses: text-only rules. */
    for sg in SIGNS {
        r.push(Rule::text(Con1, leaf(t(Op::Const, B1, sg)), "%a", 0));
        r.push(Rule::text(Con2, leaf(t(Op::Const, B2, sg)), "%a", 0));
        r.push(Rule::text(Con4, leaf(t(Op::Const, B4, sg)), "%a", 0));
        r.push(
            Rule::text(ConOne, leaf(t(Op::Const, B1, sg)), "%a", 0)
                .when(SideCondition::ConstInRange(1, 1)),
        );
        r.push(
            Rule::text(ConOne, leaf(t(Op::Const, B2, sg)), "%a", 0)
                .when(SideCondition::ConstInRange(1, 1)),
        );
    }
    r.push(Rule::text(Addr, leaf(t(Op::AddrGlobal, B2, Unsigned)), "%a", 0));
    r.push(Rule::text(Faddr, leaf(t(Op::AddrFrame, B2, Unsigned)), "%a", 0));
    r.push(Rule::text(Faddr, leaf(t(Op::AddrLocal, B2, Unsigned)), "%a", 0));

    /* Materializing constants and addresses into the accumulator bank. */
    r.push(Rule::text(Reg, chain(Con1), "    LDI %0\n", 1));
    r.push(Rule::text(
        Reg,
        chain(Con2),
        "    LDI hi(%0)\n    TAY\n    LDI lo(%0)\n",
        3,
    ));
    r.push(Rule::text(
        Reg,
        chain(Con4),
        "    LDI b3(%0)\n    PUSH\n    LDI b2(%0)\n    PUSH\n    LDI hi(%0)\n    PUSH\n    LDI lo(%0)\n    PUSH\n",
        8,
    ));
    r.push(Rule::text(
        Reg,
        chain(Addr),
        "    LDI hi(%0)\n    TAY\n    LDI lo(%0)\n",
        3,
    ));

    /* Loads. */
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(t(Op::Indir, B1, sg), vec![nt(Faddr)]),
            "    LDA %0,FP\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Indir, B1, sg), vec![nt(Addr)]),
            "    LDA %0\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Indir, B2, sg), vec![nt(Faddr)]),
            "    LDA %0+1,FP\n    TAY\n    LDA %0,FP\n",
            3,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Indir, B2, sg), vec![nt(Addr)]),
            "    LDA %0+1\n    TAY\n    LDA %0\n",
            3,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Indir, B4, sg), vec![nt(Faddr)]),
            "    LDA %0+3,FP\n    PUSH\n    LDA %0+2,FP\n    PUSH\n    LDA %0+1,FP\n    PUSH\n    LDA %0,FP\n    PUSH\n",
            8,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Indir, B4, sg), vec![nt(Addr)]),
            "    LDA %0+3\n    PUSH\n    LDA %0+2\n    PUSH\n    LDA %0+1\n    PUSH\n    LDA %0\n    PUSH\n",
            8,
        ));
    }

    /* Byte access through a global base plus a computed index. X is the only
    index-capable auxiliary; spans beyond 256 bytes are the front end's
    problem. */
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(
                t(Op::Indir, B1, sg),
                vec![sub(t(Op::Add, B2, Unsigned), vec![nt(Addr), nt(Reg)])],
            ),
            "    TAX\n    LDA %0,X\n",
            2,
        ));
        r.push(Rule::text(
            Reg,
            tree(
                t(Op::Indir, B1, sg),
                vec![sub(t(Op::Add, B2, Unsigned), vec![nt(Reg), nt(Addr)])],
            ),
            "    TAX\n    LDA %1,X\n",
            2,
        ));
        r.push(Rule::text(
            Stmt,
            tree(
                t(Op::Asgn, B1, sg),
                vec![
                    sub(t(Op::Add, B2, Unsigned), vec![nt(Addr), nt(Reg)]),
                    nt(Reg),
                ],
            ),
            "    TAY\n    POP\n    POP\n    TAX\n    TYA\n    STA %0,X\n",
            6,
        ));
        r.push(Rule::text(
            Stmt,
            tree(
                t(Op::Asgn, B1, sg),
                vec![
                    sub(t(Op::Add, B2, Unsigned), vec![nt(Reg), nt(Addr)]),
                    nt(Reg),
                ],
            ),
            "    TAY\n    POP\n    POP\n    TAX\n    TYA\n    STA %1,X\n",
            6,
        ));
    }

    /* Stores. */
    for sg in SIGNS {
        r.push(Rule::text(
            Stmt,
            tree(t(Op::Asgn, B1, sg), vec![nt(Faddr), nt(Reg)]),
            "    STA %0,FP\n",
            1,
        ));
        r.push(Rule::text(
            Stmt,
            tree(t(Op::Asgn, B1, sg), vec![nt(Addr), nt(Reg)]),
            "    STA %0\n",
            1,
        ));
        r.push(Rule::text(
            Stmt,
            tree(t(Op::Asgn, B2, sg), vec![nt(Faddr), nt(Reg)]),
            "    STA %0,FP\n    TYA\n    STA %0+1,FP\n",
            3,
        ));
        r.push(Rule::text(
            Stmt,
            tree(t(Op::Asgn, B2, sg), vec![nt(Addr), nt(Reg)]),
            "    STA %0\n    TYA\n    STA %0+1\n",
            3,
        ));
        r.push(Rule::text(
            Stmt,
            tree(t(Op::Asgn, B4, sg), vec![nt(Faddr), nt(Reg)]),
            "    POP\n    STA %0,FP\n    POP\n    STA %0+1,FP\n    POP\n    STA %0+2,FP\n    POP\n    STA %0+3,FP\n",
            8,
        ));
        r.push(Rule::text(
            Stmt,
            tree(t(Op::Asgn, B4, sg), vec![nt(Addr), nt(Reg)]),
            "    POP\n    STA %0\n    POP\n    STA %0+1\n    POP\n    STA %0+2\n    POP\n    STA %0+3\n",
            8,
        ));
    }

    /* Spill cells (call-activation scoped; offsets resolved by the frame). */
    for sg in SIGNS {
        r.push(Rule::emit(
            Reg,
            tree(t(Op::Indir, B1, sg), vec![spill()]),
            SE::SpillRead,
            1,
        ));
        r.push(Rule::emit(
            Reg,
            tree(t(Op::Indir, B2, sg), vec![spill()]),
            SE::SpillRead,
            3,
        ));
        r.push(Rule::emit(
            Stmt,
            tree(t(Op::Asgn, B1, sg), vec![spill(), nt(Reg)]),
            SE::SpillWrite,
            1,
        ));
        r.push(Rule::emit(
            Stmt,
            tree(t(Op::Asgn, B2, sg), vec![spill(), nt(Reg)]),
            SE::SpillWrite,
            3,
        ));
    }

    /* B1 add/sub. */
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(t(Op::Add, B1, sg), vec![load(B1, sg, Addr), load(B1, sg, Addr)]),
            "    LDA %0\n    ADD %1\n",
            2,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Add, B1, sg), vec![load(B1, sg, Faddr), load(B1, sg, Faddr)]),
            "    LDA %0,FP\n    ADD %1,FP\n",
            2,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Add, B1, sg), vec![nt(Reg), load(B1, sg, Addr)]),
            "    ADD %1\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Add, B1, sg), vec![nt(Reg), load(B1, sg, Faddr)]),
            "    ADD %1,FP\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Add, B1, sg), vec![nt(Reg), nt(ConOne)]),
            "    INC\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Add, B1, sg), vec![nt(Reg), nt(Reg)]),
            "    TAX\n    POP\n    ADDX\n",
            3,
        ));

        r.push(Rule::text(
            Reg,
            tree(t(Op::Sub, B1, sg), vec![load(B1, sg, Addr), load(B1, sg, Addr)]),
            "    LDA %0\n    SUB %1\n",
            2,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Sub, B1, sg), vec![load(B1, sg, Faddr), load(B1, sg, Faddr)]),
            "    LDA %0,FP\n    SUB %1,FP\n",
            2,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Sub, B1, sg), vec![nt(Reg), load(B1, sg, Addr)]),
            "    SUB %1\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Sub, B1, sg), vec![nt(Reg), load(B1, sg, Faddr)]),
            "    SUB %1,FP\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Sub, B1, sg), vec![nt(Reg), nt(ConOne)]),
            "    DEC\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Sub, B1, sg), vec![nt(Reg), nt(Reg)]),
            "    TAX\n    POP\n    SUBX\n",
            3,
        ));
    }

    /* B1 multiply/divide/remainder. MUL/DIV/MOD are unsigned; signed byte
    division detours through the runtime wrappers. */
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(t(Op::Mul, B1, sg), vec![nt(Reg), nt(Reg)]),
            "    TAX\n    POP\n    MUL\n",
            3,
        ));
    }
    r.push(Rule::text(
        Reg,
        tree(t(Op::Div, B1, Unsigned), vec![nt(Reg), nt(Reg)]),
        "    TAX\n    POP\n    DIV\n",
        3,
    ));
    r.push(Rule::text(
        Reg,
        tree(t(Op::Rem, B1, Unsigned), vec![nt(Reg), nt(Reg)]),
        "    TAX\n    POP\n    MOD\n",
        3,
    ));
    r.push(Rule::text(
        Reg,
        tree(t(Op::Div, B1, Signed), vec![nt(Reg), nt(Reg)]),
        "    STA _op2\n    POP\n    STA _op1\n    CALL __sdiv8\n",
        4,
    ));
    r.push(Rule::text(
        Reg,
        tree(t(Op::Rem, B1, Signed), vec![nt(Reg), nt(Reg)]),
        "    STA _op2\n    POP\n    STA _op1\n    CALL __smod8\n",
        4,
    ));

    /* B1 unary and bitwise. */
    for sg in SIGNS {
        r.push(Rule::text(Reg, tree(t(Op::Neg, B1, sg), vec![nt(Reg)]), "    NEG\n", 1));
        r.push(Rule::text(Reg, tree(t(Op::BitNot, B1, sg), vec![nt(Reg)]), "    NOT\n", 1));

        r.push(Rule::text(
            Reg,
            tree(t(Op::BitAnd, B1, sg), vec![load(B1, sg, Addr), load(B1, sg, Addr)]),
            "    LDA %0\n    AND %1\n",
            2,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitAnd, B1, sg), vec![nt(Reg), load(B1, sg, Addr)]),
            "    AND %1\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitAnd, B1, sg), vec![nt(Reg), nt(Reg)]),
            "    TAX\n    POP\n    ANDX\n",
            3,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitOr, B1, sg), vec![load(B1, sg, Addr), load(B1, sg, Addr)]),
            "    LDA %0\n    OR %1\n",
            2,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitOr, B1, sg), vec![nt(Reg), load(B1, sg, Addr)]),
            "    OR %1\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitOr, B1, sg), vec![nt(Reg), nt(Reg)]),
            "    TAX\n    POP\n    ORX\n",
            3,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitXor, B1, sg), vec![load(B1, sg, Addr), load(B1, sg, Addr)]),
            "    LDA %0\n    XOR %1\n",
            2,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitXor, B1, sg), vec![nt(Reg), load(B1, sg, Addr)]),
            "    XOR %1\n",
            1,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitXor, B1, sg), vec![nt(Reg), nt(Reg)]),
            "    TAX\n    POP\n    XORX\n",
            3,
        ));
    }

    /* B1 shifts. */
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(t(Op::ShiftLeft, B1, sg), vec![nt(Reg), nt(ConOne)]),
            "    SHL\n",
            1,
        ));
        r.push(Rule::emit(
            Reg,
            tree(t(Op::ShiftLeft, B1, sg), vec![nt(Reg), nt(Reg)]),
            SE::VarShift,
            8,
        ));
    }
    r.push(Rule::text(
        Reg,
        tree(t(Op::ShiftRight, B1, Unsigned), vec![nt(Reg), nt(ConOne)]),
        "    SHR\n",
        1,
    ));
    r.push(Rule::text(
        Reg,
        tree(t(Op::ShiftRight, B1, Signed), vec![nt(Reg), nt(ConOne)]),
        "    ASR\n",
        1,
    ));
    r.push(Rule::emit(
        Reg,
        tree(t(Op::ShiftRight, B1, Unsigned), vec![nt(Reg), nt(Reg)]),
        SE::VarShift,
        8,
    ));
    r.push(Rule::emit(
        Reg,
        tree(t(Op::ShiftRight, B1, Signed), vec![nt(Reg), nt(Reg)]),
        SE::VarShift,
        8,
    ));

    /* B2 add/sub: low bytes first, then the carry-aware high-byte op. */
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(t(Op::Add, B2, sg), vec![load(B2, sg, Faddr), load(B2, sg, Faddr)]),
            "    LDA %0,FP\n    ADD %1,FP\n    TAX\n    LDA %0+1,FP\n    ADC %1+1,FP\n    TAY\n    TXA\n",
            7,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Add, B2, sg), vec![load(B2, sg, Addr), load(B2, sg, Addr)]),
            "    LDA %0\n    ADD %1\n    TAX\n    LDA %0+1\n    ADC %1+1\n    TAY\n    TXA\n",
            7,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Add, B2, sg), vec![nt(Reg), nt(Reg)]),
            "    STA _t0\n    TYA\n    STA _t0+1\n    POP\n    STA _t1+1\n    POP\n    ADD _t0\n    STA _t1\n    LDA _t1+1\n    ADC _t0+1\n    TAY\n    LDA _t1\n",
            12,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Sub, B2, sg), vec![load(B2, sg, Faddr), load(B2, sg, Faddr)]),
            "    LDA %0,FP\n    SUB %1,FP\n    TAX\n    LDA %0+1,FP\n    SBC %1+1,FP\n    TAY\n    TXA\n",
            7,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Sub, B2, sg), vec![load(B2, sg, Addr), load(B2, sg, Addr)]),
            "    LDA %0\n    SUB %1\n    TAX\n    LDA %0+1\n    SBC %1+1\n    TAY\n    TXA\n",
            7,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Sub, B2, sg), vec![nt(Reg), nt(Reg)]),
            "    STA _t0\n    TYA\n    STA _t0+1\n    POP\n    STA _t1+1\n    POP\n    SUB _t0\n    STA _t1\n    LDA _t1+1\n    SBC _t0+1\n    TAY\n    LDA _t1\n",
            12,
        ));
    }

    /* B4 add/sub: both operands already live on the stack (right on top);
    pop into the scratch cells, chain the four byte ops, push the result. */
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(t(Op::Add, B4, sg), vec![nt(Reg), nt(Reg)]),
            "    POP\n    STA _t0\n    POP\n    STA _t0+1\n    POP\n    STA _t0+2\n    POP\n    STA _t0+3\n    POP\n    STA _t1\n    POP\n    STA _t1+1\n    POP\n    STA _t1+2\n    POP\n    STA _t1+3\n    LDA _t1\n    ADD _t0\n    STA _t1\n    LDA _t1+1\n    ADC _t0+1\n    STA _t1+1\n    LDA _t1+2\n    ADC _t0+2\n    STA _t1+2\n    LDA _t1+3\n    ADC _t0+3\n    STA _t1+3\n    LDA _t1+3\n    PUSH\n    LDA _t1+2\n    PUSH\n    LDA _t1+1\n    PUSH\n    LDA _t1\n    PUSH\n",
            36,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Sub, B4, sg), vec![nt(Reg), nt(Reg)]),
            "    POP\n    STA _t0\n    POP\n    STA _t0+1\n    POP\n    STA _t0+2\n    POP\n    STA _t0+3\n    POP\n    STA _t1\n    POP\n    STA _t1+1\n    POP\n    STA _t1+2\n    POP\n    STA _t1+3\n    LDA _t1\n    SUB _t0\n    STA _t1\n    LDA _t1+1\n    SBC _t0+1\n    STA _t1+1\n    LDA _t1+2\n    SBC _t0+2\n    STA _t1+2\n    LDA _t1+3\n    SBC _t0+3\n    STA _t1+3\n    LDA _t1+3\n    PUSH\n    LDA _t1+2\n    PUSH\n    LDA _t1+1\n    PUSH\n    LDA _t1\n    PUSH\n",
            36,
        ));
    }

    /* B2 unary and bitwise. */
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(t(Op::Neg, B2, sg), vec![nt(Reg)]),
            "    STA _t0\n    TYA\n    XOR _cff\n    TAY\n    LDA _t0\n    XOR _cff\n    ADD _c01\n    STA _t0\n    TYA\n    ADC _c00\n    TAY\n    LDA _t0\n",
            12,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitNot, B2, sg), vec![nt(Reg)]),
            "    XOR _cff\n    TAX\n    TYA\n    XOR _cff\n    TAY\n    TXA\n",
            6,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitAnd, B2, sg), vec![nt(Reg), nt(Reg)]),
            "    STA _t0\n    TYA\n    STA _t0+1\n    POP\n    AND _t0+1\n    TAY\n    POP\n    AND _t0\n",
            8,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitOr, B2, sg), vec![nt(Reg), nt(Reg)]),
            "    STA _t0\n    TYA\n    STA _t0+1\n    POP\n    OR _t0+1\n    TAY\n    POP\n    OR _t0\n",
            8,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::BitXor, B2, sg), vec![nt(Reg), nt(Reg)]),
            "    STA _t0\n    TYA\n    STA _t0+1\n    POP\n    XOR _t0+1\n    TAY\n    POP\n    XOR _t0\n",
            8,
        ));
    }

    /* B2 multiply/divide/remainder: no native 16-bit instructions exist, so
    these marshal into the runtime routines. */
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(t(Op::Mul, B2, sg), vec![nt(Reg), nt(Reg)]),
            "    STA _op2\n    TYA\n    STA _op2+1\n    POP\n    STA _op1+1\n    POP\n    STA _op1\n    CALL __mul16\n",
            8,
        ));
    }
    r.push(Rule::text(
        Reg,
        tree(t(Op::Div, B2, Signed), vec![nt(Reg), nt(Reg)]),
        "    STA _op2\n    TYA\n    STA _op2+1\n    POP\n    STA _op1+1\n    POP\n    STA _op1\n    CALL __sdiv16\n",
        8,
    ));
    r.push(Rule::text(
        Reg,
        tree(t(Op::Div, B2, Unsigned), vec![nt(Reg), nt(Reg)]),
        "    STA _op2\n    TYA\n    STA _op2+1\n    POP\n    STA _op1+1\n    POP\n    STA _op1\n    CALL __udiv16\n",
        8,
    ));
    r.push(Rule::text(
        Reg,
        tree(t(Op::Rem, B2, Signed), vec![nt(Reg), nt(Reg)]),
        "    STA _op2\n    TYA\n    STA _op2+1\n    POP\n    STA _op1+1\n    POP\n    STA _op1\n    CALL __smod16\n",
        8,
    ));
    r.push(Rule::text(
        Reg,
        tree(t(Op::Rem, B2, Unsigned), vec![nt(Reg), nt(Reg)]),
        "    STA _op2\n    TYA\n    STA _op2+1\n    POP\n    STA _op1+1\n    POP\n    STA _op1\n    CALL __umod16\n",
        8,
    ));

    /* B2 shifts: left-by-one is a self-add chain; everything else loops. */
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(t(Op::ShiftLeft, B2, sg), vec![nt(Reg), nt(ConOne)]),
            "    STA _t0\n    TYA\n    STA _t0+1\n    LDA _t0\n    ADD _t0\n    STA _t0\n    LDA _t0+1\n    ADC _t0+1\n    TAY\n    LDA _t0\n",
            10,
        ));
        r.push(Rule::emit(
            Reg,
            tree(t(Op::ShiftLeft, B2, sg), vec![nt(Reg), nt(Reg)]),
            SE::VarShift,
            16,
        ));
        r.push(Rule::emit(
            Reg,
            tree(t(Op::ShiftRight, B2, sg), vec![nt(Reg), nt(Reg)]),
            SE::VarShift,
            16,
        ));
    }

    /* B1 fused compare-and-branch. `CMP` sets the flags from `AC - operand`;
    the conditional jump encodes the relation and the signedness. */
    #[rustfmt::skip]
    const B1_BRANCHES: [(Op, Signedness, &str, &str); 12] = [
        (Op::BranchEq, Signed,   "    CMP %1\n    JZ %a\n",  "    STA _t0\n    POP\n    CMP _t0\n    JZ %a\n"),
        (Op::BranchEq, Unsigned, "    CMP %1\n    JZ %a\n",  "    STA _t0\n    POP\n    CMP _t0\n    JZ %a\n"),
        (Op::BranchNe, Signed,   "    CMP %1\n    JNZ %a\n", "    STA _t0\n    POP\n    CMP _t0\n    JNZ %a\n"),
        (Op::BranchNe, Unsigned, "    CMP %1\n    JNZ %a\n", "    STA _t0\n    POP\n    CMP _t0\n    JNZ %a\n"),
        (Op::BranchLt, Signed,   "    CMP %1\n    JN %a\n",  "    STA _t0\n    POP\n    CMP _t0\n    JN %a\n"),
        (Op::BranchLt, Unsigned, "    CMP %1\n    JC %a\n",  "    STA _t0\n    POP\n    CMP _t0\n    JC %a\n"),
        (Op::BranchLe, Signed,   "    CMP %1\n    JLE %a\n", "    STA _t0\n    POP\n    CMP _t0\n    JLE %a\n"),
        (Op::BranchLe, Unsigned, "    CMP %1\n    JBE %a\n", "    STA _t0\n    POP\n    CMP _t0\n    JBE %a\n"),
        (Op::BranchGt, Signed,   "    CMP %1\n    JGT %a\n", "    STA _t0\n    POP\n    CMP _t0\n    JGT %a\n"),
        (Op::BranchGt, Unsigned, "    CMP %1\n    JA %a\n",  "    STA _t0\n    POP\n    CMP _t0\n    JA %a\n"),
        (Op::BranchGe, Signed,   "    CMP %1\n    JGE %a\n", "    STA _t0\n    POP\n    CMP _t0\n    JGE %a\n"),
        (Op::BranchGe, Unsigned, "    CMP %1\n    JNC %a\n", "    STA _t0\n    POP\n    CMP _t0\n    JNC %a\n"),
    ];
    for (op, sg, mem_tpl, reg_tpl) in B1_BRANCHES {
        r.push(Rule::text(
            Stmt,
            tree(t(op, B1, sg), vec![nt(Reg), load(B1, sg, Addr)]),
            mem_tpl,
            2,
        ));
        r.push(Rule::text(
            Stmt,
            tree(t(op, B1, sg), vec![nt(Reg), nt(Reg)]),
            reg_tpl,
            4,
        ));
    }

    /* B2 fused compare-and-branch: byte-chained, handled structurally. */
    for sg in SIGNS {
        for op in [
            Op::BranchEq,
            Op::BranchNe,
            Op::BranchLt,
            Op::BranchLe,
            Op::BranchGt,
            Op::BranchGe,
        ] {
            r.push(Rule::emit(
                Stmt,
                tree(t(op, B2, sg), vec![nt(Reg), nt(Reg)]),
                SE::CmpBranch,
                12,
            ));
        }
    }

    /* Size conversions. A conversion steps one size class at a time; the node
    signedness names the source's signedness. */
    r.push(Rule::emit(
        Reg,
        tree(t(Op::Widen, B2, Signed), vec![nt(Reg)]),
        SE::SignExtend12,
        6,
    ));
    r.push(Rule::text(
        Reg,
        tree(t(Op::Widen, B2, Unsigned), vec![nt(Reg)]),
        "    TAX\n    LDI 0\n    TAY\n    TXA\n",
        4,
    ));
    r.push(Rule::emit(
        Reg,
        tree(t(Op::Widen, B4, Signed), vec![nt(Reg)]),
        SE::SignExtend24,
        8,
    ));
    r.push(Rule::text(
        Reg,
        tree(t(Op::Widen, B4, Unsigned), vec![nt(Reg)]),
        "    TAX\n    LDI 0\n    PUSH\n    PUSH\n    TYA\n    PUSH\n    TXA\n    PUSH\n",
        8,
    ));
    for sg in SIGNS {
        r.push(Rule::text(
            Reg,
            tree(t(Op::Narrow, B1, sg), vec![nt(Reg)]),
            "    ; low byte already in AC\n",
            0,
        ));
        r.push(Rule::text(
            Reg,
            tree(t(Op::Narrow, B2, sg), vec![nt(Reg)]),
            "    POP\n    TAX\n    POP\n    TAY\n    POP\n    POP\n    TXA\n",
            7,
        ));
    }

    /* Control flow. */
    r.push(Rule::text(Stmt, leaf(t(Op::Label, B2, Unsigned)), "%a:\n", 0));
    r.push(Rule::text(Stmt, leaf(t(Op::Jump, B2, Unsigned)), "    JMP %a\n", 1));

    /* Arguments, calls, returns. */
    for sg in SIGNS {
        r.push(Rule::emit(Stmt, tree(t(Op::Arg, B1, sg), vec![nt(Reg)]), SE::ArgPush, 5));
        r.push(Rule::emit(Stmt, tree(t(Op::Arg, B2, sg), vec![nt(Reg)]), SE::ArgPush, 4));
        r.push(Rule::emit(Stmt, tree(t(Op::Arg, B4, sg), vec![nt(Reg)]), SE::ArgPush, 0));
        r.push(Rule::emit(Reg, leaf(t(Op::Call, B1, sg)), SE::Call, 2));
        r.push(Rule::emit(Reg, leaf(t(Op::Call, B2, sg)), SE::Call, 2));
        r.push(Rule::emit(Reg, leaf(t(Op::Call, B4, sg)), SE::Call, 10));
        r.push(Rule::emit(Stmt, tree(t(Op::Ret, B1, sg), vec![nt(Reg)]), SE::Ret, 1));
        r.push(Rule::emit(Stmt, tree(t(Op::Ret, B2, sg), vec![nt(Reg)]), SE::Ret, 1));
        r.push(Rule::emit(Stmt, tree(t(Op::Ret, B4, sg), vec![nt(Reg)]), SE::Ret, 10));
    }
    r.push(Rule::emit(Stmt, leaf(t(Op::CallVoid, B2, Unsigned)), SE::Call, 2));
    r.push(Rule::emit(Stmt, leaf(t(Op::RetVoid, B2, Unsigned)), SE::Ret, 1));

    /* An expression evaluated for effect only. */
    r.push(Rule::emit(Stmt, chain(Reg), SE::Discard, 0));

    RuleTable::new(r)
}
