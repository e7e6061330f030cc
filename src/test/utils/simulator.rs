//! A small NEANDER-X assembler and interpreter over the emitted text, so the
//! behavioral properties (operand preservation, reentrancy, carry chains, the
//! calling convention) are asserted by actually executing programs.
//!
//! The instruction set and flag discipline implemented here are the assembler
//! surface the emitter targets: loads, stores, transfers, increments, and the
//! logical ops preserve `C`; only add/subtract/compare and the shifts write it.

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static LABEL_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_.][A-Za-z0-9_.]*):(.*)$").unwrap());

const MEM_BYTELEN: usize = 1 << 16;
const MAX_STEPS: u64 = 10_000_000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mnemonic {
    Lda, Sta, Ldi,
    Tax, Txa, Tay, Tya,
    Add, Adc, Sub, Sbc, And, Or, Xor,
    Addx, Subx, Andx, Orx, Xorx,
    Not, Neg, Shl, Shr, Asr, Inc, Dec, Cmp,
    Mul, Div, Mod,
    Push, Pop, PushFp, PopFp, Tsf, Tfs, Addsp,
    Call, Ret, Jmp, Jz, Jnz, Jn, Jc, Jnc, Jle, Jgt, Jge, Jbe, Ja,
    Hlt,
}

#[derive(Clone, Copy, Debug)]
enum Operand {
    None,
    /// Immediate or absolute address, decided by the mnemonic.
    Value(i64),
    FpRel(i64),
    Indexed(i64),
}

#[derive(Clone, Copy, Debug)]
struct Instr {
    mnemonic: Mnemonic,
    operand: Operand,
}

enum Item {
    Label(String),
    Org(String),
    Byte(String),
    Word(String),
    Space(u16),
    Instr(Mnemonic, Option<String>),
    Ignored,
}

pub struct Simulator {
    mem: Vec<u8>,
    code: HashMap<u16, Instr>,
    symbols: HashMap<String, u16>,

    pub ac: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u16,
    pub fp: u16,
    n: bool,
    z: bool,
    c: bool,
    pc: u16,
}

impl Simulator {
    pub fn load(asm: &str) -> Result<Self> {
        let items = parse_items(asm)?;

        /* Pass 1: addresses. */
        let mut symbols = HashMap::<String, u16>::new();
        let mut loc: u32 = 0;
        for item in items.iter() {
            match item {
                Item::Label(name) => {
                    symbols.insert(name.clone(), loc as u16);
                }
                Item::Org(expr) => {
                    loc = eval_expr(expr, &symbols)
                        .with_context(|| format!(".org {expr}"))? as u32;
                }
                Item::Byte(_) | Item::Instr(..) => loc += 1,
                Item::Word(_) => loc += 2,
                Item::Space(bytelen) => loc += *bytelen as u32,
                Item::Ignored => {}
            }
        }

        /* Pass 2: data bytes and the code map. */
        let mut mem = vec![0u8; MEM_BYTELEN];
        let mut code = HashMap::new();
        let mut loc: u32 = 0;
        for item in items.iter() {
            match item {
                Item::Label(_) => {}
                Item::Org(expr) => loc = eval_expr(expr, &symbols)? as u32,
                Item::Byte(expr) => {
                    mem[loc as usize] = (eval_expr(expr, &symbols)? & 0xFF) as u8;
                    loc += 1;
                }
                Item::Word(expr) => {
                    let v = eval_expr(expr, &symbols)?;
                    mem[loc as usize] = (v & 0xFF) as u8;
                    mem[loc as usize + 1] = ((v >> 8) & 0xFF) as u8;
                    loc += 2;
                }
                Item::Space(bytelen) => loc += *bytelen as u32,
                Item::Instr(mnemonic, operand_text) => {
                    let operand = match operand_text {
                        None => Operand::None,
                        Some(text) => parse_operand(text, &symbols)?,
                    };
                    code.insert(loc as u16, Instr { mnemonic: *mnemonic, operand });
                    loc += 1;
                }
                Item::Ignored => {}
            }
        }

        Ok(Self {
            mem,
            code,
            symbols,
            ac: 0,
            x: 0,
            y: 0,
            sp: 0xFFFF,
            fp: 0xFFFF,
            n: false,
            z: false,
            c: false,
            pc: 0,
        })
    }

    pub fn sym_addr(&self, name: &str) -> Result<u16> {
        self.symbols
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("undefined symbol {name:?}"))
    }
    pub fn byte_at(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }
    pub fn word_at(&self, addr: u16) -> u16 {
        self.byte_at(addr) as u16 | ((self.byte_at(addr.wrapping_add(1)) as u16) << 8)
    }
    /// The two-byte return-value convention: low in `AC`, high in `Y`.
    pub fn ret_word(&self) -> u16 {
        self.ac as u16 | ((self.y as u16) << 8)
    }

    pub fn run(&mut self) -> Result<()> {
        for _ in 0..MAX_STEPS {
            let instr = *self
                .code
                .get(&self.pc)
                .ok_or_else(|| anyhow!("pc 0x{:04X} is not an instruction", self.pc))?;
            if instr.mnemonic == Mnemonic::Hlt {
                return Ok(());
            }
            self.step(instr)?;
        }
        Err(anyhow!("no HLT within {MAX_STEPS} steps"))
    }

    fn step(&mut self, instr: Instr) -> Result<()> {
        use Mnemonic as M;
        let mut next_pc = self.pc.wrapping_add(1);
        match instr.mnemonic {
            M::Lda => {
                self.ac = self.read(instr.operand)?;
                self.set_nz(self.ac);
            }
            M::Sta => {
                let addr = self.addr(instr.operand)?;
                self.mem[addr as usize] = self.ac;
            }
            M::Ldi => {
                self.ac = (self.value(instr.operand)? & 0xFF) as u8;
                self.set_nz(self.ac);
            }
            M::Tax => {
                self.x = self.ac;
                self.set_nz(self.x);
            }
            M::Txa => {
                self.ac = self.x;
                self.set_nz(self.ac);
            }
            M::Tay => {
                self.y = self.ac;
                self.set_nz(self.y);
            }
            M::Tya => {
                self.ac = self.y;
                self.set_nz(self.ac);
            }
            M::Add => {
                let m = self.read(instr.operand)?;
                self.add(m, false);
            }
            M::Adc => {
                let m = self.read(instr.operand)?;
                self.add(m, self.c);
            }
            M::Sub => {
                let m = self.read(instr.operand)?;
                self.sub(m, false);
            }
            M::Sbc => {
                let m = self.read(instr.operand)?;
                self.sub(m, self.c);
            }
            M::And => {
                let m = self.read(instr.operand)?;
                self.ac &= m;
                self.set_nz(self.ac);
            }
            M::Or => {
                let m = self.read(instr.operand)?;
                self.ac |= m;
                self.set_nz(self.ac);
            }
            M::Xor => {
                let m = self.read(instr.operand)?;
                self.ac ^= m;
                self.set_nz(self.ac);
            }
            M::Addx => self.add(self.x, false),
            M::Subx => self.sub(self.x, false),
            M::Andx => {
                self.ac &= self.x;
                self.set_nz(self.ac);
            }
            M::Orx => {
                self.ac |= self.x;
                self.set_nz(self.ac);
            }
            M::Xorx => {
                self.ac ^= self.x;
                self.set_nz(self.ac);
            }
            M::Not => {
                self.ac = !self.ac;
                self.set_nz(self.ac);
            }
            M::Neg => {
                self.ac = self.ac.wrapping_neg();
                self.set_nz(self.ac);
            }
            M::Shl => {
                self.c = self.ac & 0x80 != 0;
                self.ac <<= 1;
                self.set_nz(self.ac);
            }
            M::Shr => {
                self.c = self.ac & 0x01 != 0;
                self.ac >>= 1;
                self.set_nz(self.ac);
            }
            M::Asr => {
                self.c = self.ac & 0x01 != 0;
                self.ac = ((self.ac as i8) >> 1) as u8;
                self.set_nz(self.ac);
            }
            M::Inc => {
                self.ac = self.ac.wrapping_add(1);
                self.set_nz(self.ac);
            }
            M::Dec => {
                self.ac = self.ac.wrapping_sub(1);
                self.set_nz(self.ac);
            }
            M::Cmp => {
                let m = self.read(instr.operand)?;
                let diff = self.ac.wrapping_sub(m);
                self.set_nz(diff);
                self.c = self.ac < m;
            }
            M::Mul => {
                let product = self.ac as u16 * self.x as u16;
                self.y = (product >> 8) as u8;
                self.ac = (product & 0xFF) as u8;
                self.set_nz(self.ac);
            }
            M::Div => {
                if self.x == 0 {
                    return Err(anyhow!("division by zero at pc 0x{:04X}", self.pc));
                }
                let (q, r) = (self.ac / self.x, self.ac % self.x);
                self.ac = q;
                self.y = r;
                self.set_nz(self.ac);
            }
            M::Mod => {
                if self.x == 0 {
                    return Err(anyhow!("division by zero at pc 0x{:04X}", self.pc));
                }
                self.ac %= self.x;
                self.set_nz(self.ac);
            }
            M::Push => self.push(self.ac),
            M::Pop => {
                self.ac = self.pop();
                self.set_nz(self.ac);
            }
            M::PushFp => {
                self.push((self.fp >> 8) as u8);
                self.push((self.fp & 0xFF) as u8);
            }
            M::PopFp => {
                let lo = self.pop();
                let hi = self.pop();
                self.fp = lo as u16 | ((hi as u16) << 8);
            }
            M::Tsf => self.fp = self.sp,
            M::Tfs => self.sp = self.fp,
            M::Addsp => {
                let delta = self.value(instr.operand)?;
                self.sp = (self.sp as i64 + delta) as u16;
            }
            M::Call => {
                let target = self.addr(instr.operand)?;
                let ret = self.pc.wrapping_add(1);
                self.push((ret >> 8) as u8);
                self.push((ret & 0xFF) as u8);
                next_pc = target;
            }
            M::Ret => {
                let lo = self.pop();
                let hi = self.pop();
                next_pc = lo as u16 | ((hi as u16) << 8);
            }
            M::Jmp => next_pc = self.addr(instr.operand)?,
            M::Jz => next_pc = self.branch(instr.operand, self.z, next_pc)?,
            M::Jnz => next_pc = self.branch(instr.operand, !self.z, next_pc)?,
            M::Jn => next_pc = self.branch(instr.operand, self.n, next_pc)?,
            M::Jc => next_pc = self.branch(instr.operand, self.c, next_pc)?,
            M::Jnc => next_pc = self.branch(instr.operand, !self.c, next_pc)?,
            M::Jle => next_pc = self.branch(instr.operand, self.z || self.n, next_pc)?,
            M::Jgt => next_pc = self.branch(instr.operand, !self.z && !self.n, next_pc)?,
            M::Jge => next_pc = self.branch(instr.operand, !self.n, next_pc)?,
            M::Jbe => next_pc = self.branch(instr.operand, self.c || self.z, next_pc)?,
            M::Ja => next_pc = self.branch(instr.operand, !self.c && !self.z, next_pc)?,
            M::Hlt => unreachable!("handled by run()"),
        }
        self.pc = next_pc;
        Ok(())
    }

    fn add(&mut self, m: u8, carry_in: bool) {
        let sum = self.ac as u16 + m as u16 + carry_in as u16;
        self.c = sum > 0xFF;
        self.ac = (sum & 0xFF) as u8;
        self.set_nz(self.ac);
    }
    fn sub(&mut self, m: u8, borrow_in: bool) {
        let diff = self.ac as i16 - m as i16 - borrow_in as i16;
        self.c = diff < 0;
        self.ac = (diff & 0xFF) as u8;
        self.set_nz(self.ac);
    }
    fn set_nz(&mut self, v: u8) {
        self.n = v & 0x80 != 0;
        self.z = v == 0;
    }
    fn push(&mut self, v: u8) {
        self.sp = self.sp.wrapping_sub(1);
        self.mem[self.sp as usize] = v;
    }
    fn pop(&mut self) -> u8 {
        let v = self.mem[self.sp as usize];
        self.sp = self.sp.wrapping_add(1);
        v
    }

    fn value(&self, operand: Operand) -> Result<i64> {
        match operand {
            Operand::Value(v) => Ok(v),
            _ => Err(anyhow!("expected an immediate operand")),
        }
    }
    fn addr(&self, operand: Operand) -> Result<u16> {
        match operand {
            Operand::Value(v) => Ok((v & 0xFFFF) as u16),
            Operand::FpRel(offset) => Ok((self.fp as i64 + offset) as u16),
            Operand::Indexed(base) => Ok(((base + self.x as i64) & 0xFFFF) as u16),
            Operand::None => Err(anyhow!("missing operand")),
        }
    }
    fn read(&self, operand: Operand) -> Result<u8> {
        let addr = self.addr(operand)?;
        Ok(self.mem[addr as usize])
    }
    fn branch(&self, operand: Operand, taken: bool, fallthrough: u16) -> Result<u16> {
        if taken { self.addr(operand) } else { Ok(fallthrough) }
    }
}

fn parse_items(asm: &str) -> Result<Vec<Item>> {
    let mut items = vec![];
    for raw_line in asm.lines() {
        let line = match raw_line.find(';') {
            Some(i) => &raw_line[..i],
            None => raw_line,
        };
        let mut line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = LABEL_DEF.captures(line) {
            items.push(Item::Label(caps[1].to_string()));
            line = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
        }
        items.push(parse_statement(line)?);
    }
    Ok(items)
}

fn parse_statement(line: &str) -> Result<Item> {
    let (head, rest) = match line.find(char::is_whitespace) {
        Some(i) => (&line[..i], line[i..].trim()),
        None => (line, ""),
    };
    if head.starts_with('.') {
        return match head {
            ".org" => Ok(Item::Org(rest.to_string())),
            ".byte" => Ok(Item::Byte(rest.to_string())),
            ".word" => Ok(Item::Word(rest.to_string())),
            ".space" => Ok(Item::Space(rest.parse()?)),
            ".text" | ".data" | ".bss" | ".rodata" | ".global" | ".extern" => Ok(Item::Ignored),
            other => Err(anyhow!("unknown directive {other}")),
        };
    }

    use Mnemonic as M;
    let mnemonic = match head {
        "LDA" => M::Lda,
        "STA" => M::Sta,
        "LDI" => M::Ldi,
        "TAX" => M::Tax,
        "TXA" => M::Txa,
        "TAY" => M::Tay,
        "TYA" => M::Tya,
        "ADD" => M::Add,
        "ADC" => M::Adc,
        "SUB" => M::Sub,
        "SBC" => M::Sbc,
        "AND" => M::And,
        "OR" => M::Or,
        "XOR" => M::Xor,
        "ADDX" => M::Addx,
        "SUBX" => M::Subx,
        "ANDX" => M::Andx,
        "ORX" => M::Orx,
        "XORX" => M::Xorx,
        "NOT" => M::Not,
        "NEG" => M::Neg,
        "SHL" => M::Shl,
        "SHR" => M::Shr,
        "ASR" => M::Asr,
        "INC" => M::Inc,
        "DEC" => M::Dec,
        "CMP" => M::Cmp,
        "MUL" => M::Mul,
        "DIV" => M::Div,
        "MOD" => M::Mod,
        "PUSH" => M::Push,
        "POP" => M::Pop,
        "PUSH_FP" => M::PushFp,
        "POP_FP" => M::PopFp,
        "TSF" => M::Tsf,
        "TFS" => M::Tfs,
        "ADDSP" => M::Addsp,
        "CALL" => M::Call,
        "RET" => M::Ret,
        "JMP" => M::Jmp,
        "JZ" => M::Jz,
        "JNZ" => M::Jnz,
        "JN" => M::Jn,
        "JC" => M::Jc,
        "JNC" => M::Jnc,
        "JLE" => M::Jle,
        "JGT" => M::Jgt,
        "JGE" => M::Jge,
        "JBE" => M::Jbe,
        "JA" => M::Ja,
        "HLT" => M::Hlt,
        other => return Err(anyhow!("unknown mnemonic {other:?} in line {line:?}")),
    };
    let operand = if rest.is_empty() { None } else { Some(rest.to_string()) };
    Ok(Item::Instr(mnemonic, operand))
}

fn parse_operand(text: &str, symbols: &HashMap<String, u16>) -> Result<Operand> {
    if let Some(expr) = text.strip_suffix(",FP") {
        return Ok(Operand::FpRel(eval_expr(expr, symbols)?));
    }
    if let Some(expr) = text.strip_suffix(",X") {
        return Ok(Operand::Indexed(eval_expr(expr, symbols)?));
    }
    Ok(Operand::Value(eval_expr(text, symbols)?))
}

/// Operand expressions: sums and differences of symbols and integers, plus
/// the byte selectors `lo`/`hi`/`b2`/`b3`.
fn eval_expr(expr: &str, symbols: &HashMap<String, u16>) -> Result<i64> {
    let mut parser = ExprParser {
        chars: expr.trim().as_bytes(),
        pos: 0,
        symbols,
    };
    let v = parser.sum()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(anyhow!("trailing input in expression {expr:?}"));
    }
    Ok(v)
}

struct ExprParser<'a> {
    chars: &'a [u8],
    pos: usize,
    symbols: &'a HashMap<String, u16>,
}
impl ExprParser<'_> {
    fn sum(&mut self) -> Result<i64> {
        self.skip_ws();
        let mut acc = if self.eat(b'-') { -self.term()? } else { self.term()? };
        loop {
            self.skip_ws();
            if self.eat(b'+') {
                acc += self.term()?;
            } else if self.eat(b'-') {
                acc -= self.term()?;
            } else {
                break;
            }
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<i64> {
        self.skip_ws();
        let start = self.pos;
        if start >= self.chars.len() {
            return Err(anyhow!("expected a term"));
        }
        let c = self.chars[start];
        if c.is_ascii_digit() {
            return self.number();
        }
        let ident = self.ident()?;
        self.skip_ws();
        if self.eat(b'(') {
            let inner = self.sum()?;
            self.skip_ws();
            if self.eat(b')') == false {
                return Err(anyhow!("expected `)`"));
            }
            let shift = match ident.as_str() {
                "lo" => 0,
                "hi" => 8,
                "b2" => 16,
                "b3" => 24,
                other => return Err(anyhow!("unknown selector {other:?}")),
            };
            return Ok((inner >> shift) & 0xFF);
        }
        self.symbols
            .get(&ident)
            .map(|v| *v as i64)
            .ok_or_else(|| anyhow!("undefined symbol {ident:?}"))
    }

    fn number(&mut self) -> Result<i64> {
        let start = self.pos;
        if self.chars[self.pos..].starts_with(b"0x") || self.chars[self.pos..].starts_with(b"0X") {
            self.pos += 2;
            let digits_start = self.pos;
            while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_hexdigit() {
                self.pos += 1;
            }
            let digits = std::str::from_utf8(&self.chars[digits_start..self.pos])?;
            return Ok(i64::from_str_radix(digits, 16)?);
        }
        while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let digits = std::str::from_utf8(&self.chars[start..self.pos])?;
        Ok(digits.parse()?)
    }

    fn ident(&mut self) -> Result<String> {
        let start = self.pos;
        while self.pos < self.chars.len()
            && (self.chars[self.pos].is_ascii_alphanumeric()
                || self.chars[self.pos] == b'_'
                || self.chars[self.pos] == b'.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(anyhow!("expected an identifier"));
        }
        Ok(std::str::from_utf8(&self.chars[start..self.pos])?.to_string())
    }

    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.pos < self.chars.len() && self.chars[self.pos] == byte {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}
