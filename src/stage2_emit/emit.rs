use crate::common::{
    identifier::{JumpLabel, SymbolIdentifier},
    ir::{FunctionDef, IrLeaf, IrNode, Operation},
    symbol_table::Symbol,
    types::{SizeClass, Signedness},
};
use crate::stage1_select::{
    grammar,
    label::{self, Labeled, Labeler},
    rule::{Matcher, Nonterminal, Rule, RuleAction, RuleTable, StructuredEmit},
};
use crate::stage2_emit::{frame::FrameLayout, runtime};
use anyhow::{Context, Result, anyhow};
use regex::Regex;
use std::io::Write;
use std::sync::LazyLock;

static ASM_NAME_BAD_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_.]").unwrap());

/// The textual value a register-class rule produces.
const ACCUM_NAME: &str = "AC";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Segment {
    Code,
    Data,
    Bss,
    ReadOnly,
}

pub fn asm_name(ident: &SymbolIdentifier) -> String {
    match ident {
        SymbolIdentifier::Exact(raw) => {
            format!("_{}", ASM_NAME_BAD_CHAR.replace_all(raw.as_str(), "_"))
        }
        SymbolIdentifier::Generated { id, descr: _ } => format!("_L{}", id.as_int()),
    }
}
fn label_name(lbl: &JumpLabel) -> String {
    format!("_L{}", lbl.id.as_int())
}

/// The driver-facing emission surface: one program-begin call, segment and
/// data-definition calls in whatever order a well-formed driver produces,
/// a per-function call, and one program-end call.
pub struct AsmEmitter<W: Write> {
    out: W,
    cur_segment: Option<Segment>,
}
impl<W: Write> AsmEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out, cur_segment: None }
    }
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn prog_begin(&mut self) -> Result<()> {
        writeln!(self.out, "; NEANDER-X assembly")?;
        writeln!(self.out, ";")?;
        writeln!(self.out, "; Memory layout:")?;
        writeln!(self.out, ";   0x0000-0x00FF: runtime cells")?;
        writeln!(self.out, ";   0x0100+      : code and data")?;
        writeln!(self.out, ";   stack        : SP resets to 0xFFFF, grows down")?;
        writeln!(self.out)?;
        writeln!(self.out, "; Reset vector")?;
        writeln!(self.out, "    .org 0x0000")?;
        writeln!(self.out, "    JMP _start")?;
        writeln!(self.out)?;
        writeln!(self.out, "; Runtime cells")?;
        self.out.write_all(runtime::RUNTIME_CELLS.as_bytes())?;
        writeln!(self.out)?;
        writeln!(self.out, "    .org 0x0100")?;
        writeln!(self.out, "_start:")?;
        writeln!(self.out, "    CALL _main")?;
        writeln!(self.out, "    HLT")?;
        writeln!(self.out)?;
        writeln!(self.out, "; Runtime routines")?;
        self.out.write_all(runtime::RUNTIME_ROUTINES.as_bytes())?;
        Ok(())
    }

    pub fn prog_end(&mut self) -> Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "; End of program")?;
        writeln!(self.out, "    HLT")?;
        Ok(())
    }

    /// Idempotent: switching to the segment already in effect emits nothing.
    pub fn segment(&mut self, seg: Segment) -> Result<()> {
        if self.cur_segment == Some(seg) {
            return Ok(());
        }
        self.cur_segment = Some(seg);
        let directive = match seg {
            Segment::Code => ".text",
            Segment::Data => ".data",
            Segment::Bss => ".bss",
            Segment::ReadOnly => ".rodata",
        };
        writeln!(self.out)?;
        writeln!(self.out, "    {directive}")?;
        Ok(())
    }

    pub fn export(&mut self, sym: &Symbol) -> Result<()> {
        writeln!(self.out, "    .global {}", asm_name(&sym.ident))?;
        Ok(())
    }
    pub fn import(&mut self, sym: &Symbol) -> Result<()> {
        writeln!(self.out, "    .extern {}", asm_name(&sym.ident))?;
        Ok(())
    }
    pub fn global(&mut self, sym: &Symbol) -> Result<()> {
        writeln!(self.out, "{}:", asm_name(&sym.ident))?;
        Ok(())
    }
    /// Little-endian byte image of one constant.
    pub fn def_const(&mut self, size: SizeClass, value: i64) -> Result<()> {
        for i in 0..size.bytelen() {
            writeln!(self.out, "    .byte {}", (value >> (8 * i)) & 0xFF)?;
        }
        Ok(())
    }
    pub fn def_address(&mut self, sym: &Symbol) -> Result<()> {
        writeln!(self.out, "    .word {}", asm_name(&sym.ident))?;
        Ok(())
    }
    pub fn def_string(&mut self, bytes: &[u8]) -> Result<()> {
        for b in bytes {
            writeln!(self.out, "    .byte {b}")?;
        }
        Ok(())
    }
    pub fn space(&mut self, bytelen: u16) -> Result<()> {
        writeln!(self.out, "    .space {bytelen}")?;
        Ok(())
    }

    /// Select and emit one function: frame layout, cost labeling of every
    /// statement tree, prologue, body, shared epilogue.
    pub fn function(&mut self, def: &FunctionDef) -> Result<()> {
        let fn_name = asm_name(&def.sym.ident);

        self.segment(Segment::Code)?;

        let frame = FrameLayout::build(def)?;
        let rules = grammar::rules();
        let labeler = Labeler::new(rules);
        let labeled = def
            .body
            .iter()
            .map(|stmt| labeler.label_tree(stmt))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("selecting instructions for {fn_name}"))?;

        writeln!(self.out)?;
        writeln!(self.out, "; Function: {fn_name}")?;
        writeln!(self.out, "{fn_name}:")?;
        writeln!(self.out, "    ; prologue")?;
        writeln!(self.out, "    PUSH_FP")?;
        writeln!(self.out, "    TSF")?;
        let frame_bytelen = frame.frame_bytelen();
        if frame_bytelen > 0 {
            writeln!(self.out, "    ; allocate {frame_bytelen} bytes for locals and spills")?;
            for _ in 0..frame_bytelen {
                writeln!(self.out, "    LDI 0")?;
                writeln!(self.out, "    PUSH")?;
            }
        }

        let ret_label = JumpLabel::new("ret");
        let mut emitter = FunctionEmitter {
            out: &mut self.out,
            rules,
            frame: &frame,
            ret_label: label_name(&ret_label),
        };
        for stmt in labeled.iter() {
            emitter.stmt(stmt).with_context(|| format!("emitting {fn_name}"))?;
        }

        writeln!(self.out, "{}:", label_name(&ret_label))?;
        writeln!(self.out, "    ; epilogue")?;
        writeln!(self.out, "    TFS")?;
        writeln!(self.out, "    POP_FP")?;
        writeln!(self.out, "    RET")?;

        log::info!("emitted function {fn_name}");
        Ok(())
    }
}

/// The recursive emission walker for one function body.
///
/// `eval` is the single path every rule goes through: resolve the chosen rule,
/// evaluate the pattern's nonterminal leaves left to right, bank the
/// accumulator between two register-class leaves, then apply the rule's action
/// (template or structured) uniformly. The left-operand save protocol lives
/// here and nowhere else, so no individual rule can drop an operand.
struct FunctionEmitter<'a, W: Write> {
    out: &'a mut W,
    rules: &'static RuleTable,
    frame: &'a FrameLayout,
    ret_label: String,
}
impl<W: Write> FunctionEmitter<'_, W> {
    fn stmt(&mut self, labeled: &Labeled<'_>) -> Result<()> {
        self.eval(labeled, Nonterminal::Stmt)?;
        Ok(())
    }

    fn eval(&mut self, sub: &Labeled<'_>, nt: Nonterminal) -> Result<String> {
        let id = sub
            .chosen(nt)
            .ok_or_else(|| label::uncovered(sub.node, nt))?;
        let rule = self.rules.get(id);
        match &rule.matcher {
            Matcher::Chain(src) => {
                let inner = self.eval(sub, *src)?;
                self.apply(rule, sub, &[inner])
            }
            Matcher::Tree(pattern) => {
                let binds = label::bind(pattern, sub)?;
                let mut texts = Vec::with_capacity(binds.len());
                for (i, (kid, kid_nt)) in binds.iter().enumerate() {
                    texts.push(self.eval(kid, *kid_nt)?);
                    let later_reg = binds[i + 1..]
                        .iter()
                        .any(|(_, later_nt)| *later_nt == Nonterminal::Reg);
                    if *kid_nt == Nonterminal::Reg && later_reg {
                        self.bank_accumulator(kid.node.size)?;
                    }
                }
                self.apply(rule, sub, &texts)
            }
        }
    }

    /// Move the just-produced value out of the accumulator bank so the next
    /// operand's code is free to use it. B4 values already live on the stack.
    fn bank_accumulator(&mut self, size: SizeClass) -> Result<()> {
        match size {
            SizeClass::B1 => {
                writeln!(self.out, "    PUSH")?;
            }
            SizeClass::B2 => {
                writeln!(self.out, "    PUSH")?;
                writeln!(self.out, "    TYA")?;
                writeln!(self.out, "    PUSH")?;
            }
            SizeClass::B4 => {}
        }
        Ok(())
    }

    fn apply(&mut self, rule: &Rule, sub: &Labeled<'_>, texts: &[String]) -> Result<String> {
        match &rule.action {
            RuleAction::Template(tpl) => {
                let leaf = self.leaf_text(sub.node).ok();
                let text = substitute(tpl, texts, leaf.as_deref())?;
                if tpl.ends_with('\n') {
                    self.out.write_all(text.as_bytes())?;
                    Ok(ACCUM_NAME.to_string())
                } else {
                    Ok(text)
                }
            }
            RuleAction::Emit(se) => self.structured(*se, sub, texts),
        }
    }

    /// Operand text of a node's own leaf.
    fn leaf_text(&self, node: &IrNode) -> Result<String> {
        match &node.leaf {
            Some(IrLeaf::Const(v)) => Ok(v.to_string()),
            Some(IrLeaf::Obj { sym, delta }) => {
                if sym.storage.is_frame_resident() {
                    let offset = self.frame.offset_of(sym)? + *delta as i32;
                    Ok(offset.to_string())
                } else {
                    let name = asm_name(&sym.ident);
                    match *delta {
                        0 => Ok(name),
                        d if d > 0 => Ok(format!("{name}+{d}")),
                        d => Ok(format!("{name}{d}")),
                    }
                }
            }
            Some(IrLeaf::Target(lbl)) => Ok(label_name(lbl)),
            Some(IrLeaf::Callee { sym, .. }) => Ok(asm_name(&sym.ident)),
            Some(IrLeaf::Spill(_)) | None => Err(anyhow!("node carries no textual operand")),
        }
    }

    fn structured(
        &mut self,
        se: StructuredEmit,
        sub: &Labeled<'_>,
        _texts: &[String],
    ) -> Result<String> {
        use StructuredEmit as SE;
        match se {
            SE::SpillRead => {
                let offset = self.spill_offset_of(&sub.kids[0])?;
                match sub.node.size {
                    SizeClass::B1 => {
                        writeln!(self.out, "    LDA {offset},FP")?;
                    }
                    SizeClass::B2 => {
                        writeln!(self.out, "    LDA {},FP", offset + 1)?;
                        writeln!(self.out, "    TAY")?;
                        writeln!(self.out, "    LDA {offset},FP")?;
                    }
                    SizeClass::B4 => return Err(anyhow!("double-word values are never spilled")),
                }
            }
            SE::SpillWrite => {
                let offset = self.spill_offset_of(&sub.kids[0])?;
                match sub.node.size {
                    SizeClass::B1 => {
                        writeln!(self.out, "    STA {offset},FP")?;
                    }
                    SizeClass::B2 => {
                        writeln!(self.out, "    STA {offset},FP")?;
                        writeln!(self.out, "    TYA")?;
                        writeln!(self.out, "    STA {},FP", offset + 1)?;
                    }
                    SizeClass::B4 => return Err(anyhow!("double-word values are never spilled")),
                }
            }
            SE::ArgPush => match sub.node.size {
                SizeClass::B1 => {
                    self.lines(&["TAX", "LDI 0", "PUSH", "TXA", "PUSH"])?;
                }
                SizeClass::B2 => {
                    self.lines(&["TAX", "TYA", "PUSH", "TXA", "PUSH"])?;
                }
                SizeClass::B4 => {}
            },
            SE::Call => {
                let Some(IrLeaf::Callee { sym, arg_bytelen }) = &sub.node.leaf else {
                    return Err(anyhow!("call node carries no callee"));
                };
                writeln!(self.out, "    CALL {}", asm_name(&sym.ident))?;
                if *arg_bytelen > 0 {
                    writeln!(self.out, "    ADDSP {arg_bytelen}")?;
                }
                if sub.node.op == Operation::Call && sub.node.size == SizeClass::B4 {
                    self.lines(&[
                        "LDA _ret+3", "PUSH", "LDA _ret+2", "PUSH", "LDA _ret+1", "PUSH",
                        "LDA _ret", "PUSH",
                    ])?;
                }
            }
            SE::Ret => {
                if sub.node.op == Operation::Ret && sub.node.size == SizeClass::B4 {
                    self.lines(&[
                        "POP", "STA _ret", "POP", "STA _ret+1", "POP", "STA _ret+2", "POP",
                        "STA _ret+3",
                    ])?;
                }
                writeln!(self.out, "    JMP {}", self.ret_label)?;
            }
            SE::Discard => {
                if sub.node.size == SizeClass::B4 {
                    writeln!(self.out, "    ADDSP 4")?;
                }
            }
            SE::CmpBranch => self.cmp_branch(sub)?,
            SE::VarShift => self.var_shift(sub)?,
            SE::SignExtend12 => {
                let neg = label_name(&JumpLabel::new("sx_neg"));
                let done = label_name(&JumpLabel::new("sx_done"));
                writeln!(self.out, "    TAX")?;
                writeln!(self.out, "    JN {neg}")?;
                self.lines(&["LDI 0", "TAY"])?;
                writeln!(self.out, "    JMP {done}")?;
                writeln!(self.out, "{neg}:")?;
                self.lines(&["LDI 255", "TAY"])?;
                writeln!(self.out, "{done}:")?;
                writeln!(self.out, "    TXA")?;
            }
            SE::SignExtend24 => {
                let neg = label_name(&JumpLabel::new("sx4_neg"));
                let done = label_name(&JumpLabel::new("sx4_done"));
                self.lines(&["TAX", "TYA"])?;
                writeln!(self.out, "    JN {neg}")?;
                self.lines(&["LDI 0", "PUSH", "PUSH"])?;
                writeln!(self.out, "    JMP {done}")?;
                writeln!(self.out, "{neg}:")?;
                self.lines(&["LDI 255", "PUSH", "PUSH"])?;
                writeln!(self.out, "{done}:")?;
                self.lines(&["TYA", "PUSH", "TXA", "PUSH"])?;
            }
        }
        Ok(ACCUM_NAME.to_string())
    }

    /// B2 compare-and-branch: left banked on the stack, right in `Y:AC`.
    /// Orderings are decided by a byte-chained subtraction; equality by two
    /// byte compares.
    fn cmp_branch(&mut self, sub: &Labeled<'_>) -> Result<()> {
        let target = self.leaf_text(sub.node)?;
        self.lines(&[
            "STA _t0", "TYA", "STA _t0+1", "POP", "STA _t1+1", "POP", "STA _t1",
        ])?;

        let signed = sub.node.sign == Signedness::Signed;
        match sub.node.op {
            Operation::BranchEq => {
                let skip = label_name(&JumpLabel::new("eq_skip"));
                self.lines(&["LDA _t1", "CMP _t0"])?;
                writeln!(self.out, "    JNZ {skip}")?;
                self.lines(&["LDA _t1+1", "CMP _t0+1"])?;
                writeln!(self.out, "    JZ {target}")?;
                writeln!(self.out, "{skip}:")?;
            }
            Operation::BranchNe => {
                self.lines(&["LDA _t1", "CMP _t0"])?;
                writeln!(self.out, "    JNZ {target}")?;
                self.lines(&["LDA _t1+1", "CMP _t0+1"])?;
                writeln!(self.out, "    JNZ {target}")?;
            }
            Operation::BranchLt | Operation::BranchGe => {
                // left - right
                self.lines(&["LDA _t1", "SUB _t0", "LDA _t1+1", "SBC _t0+1"])?;
                let jump = match (sub.node.op, signed) {
                    (Operation::BranchLt, true) => "JN",
                    (Operation::BranchLt, false) => "JC",
                    (_, true) => "JGE",
                    (_, false) => "JNC",
                };
                writeln!(self.out, "    {jump} {target}")?;
            }
            Operation::BranchGt | Operation::BranchLe => {
                // right - left
                self.lines(&["LDA _t0", "SUB _t1", "LDA _t0+1", "SBC _t1+1"])?;
                let jump = match (sub.node.op, signed) {
                    (Operation::BranchGt, true) => "JN",
                    (Operation::BranchGt, false) => "JC",
                    (_, true) => "JGE",
                    (_, false) => "JNC",
                };
                writeln!(self.out, "    {jump} {target}")?;
            }
            op => return Err(anyhow!("{op:?} is not a comparison")),
        }
        Ok(())
    }

    /// Shift by a runtime amount: left value banked, count's low byte in `AC`.
    fn var_shift(&mut self, sub: &Labeled<'_>) -> Result<()> {
        let arith =
            sub.node.op == Operation::ShiftRight && sub.node.sign == Signedness::Signed;
        let looplbl = label_name(&JumpLabel::new("sh_loop"));
        let done = label_name(&JumpLabel::new("sh_done"));

        match sub.node.size {
            SizeClass::B1 => {
                let mnemonic = match (sub.node.op, arith) {
                    (Operation::ShiftLeft, _) => "SHL",
                    (_, true) => "ASR",
                    (_, false) => "SHR",
                };
                self.lines(&["TAX", "POP", "TAY"])?;
                writeln!(self.out, "{looplbl}:")?;
                writeln!(self.out, "    TXA")?;
                writeln!(self.out, "    JZ {done}")?;
                self.lines(&["TYA", mnemonic, "TAY", "TXA", "DEC", "TAX"])?;
                writeln!(self.out, "    JMP {looplbl}")?;
                writeln!(self.out, "{done}:")?;
                writeln!(self.out, "    TYA")?;
            }
            SizeClass::B2 => {
                self.lines(&["TAX", "POP", "STA _t1+1", "POP", "STA _t1"])?;
                writeln!(self.out, "{looplbl}:")?;
                writeln!(self.out, "    TXA")?;
                writeln!(self.out, "    JZ {done}")?;
                match sub.node.op {
                    Operation::ShiftLeft => {
                        self.lines(&[
                            "LDA _t1", "ADD _t1", "STA _t1", "LDA _t1+1", "ADC _t1+1",
                            "STA _t1+1",
                        ])?;
                    }
                    _ => {
                        let hi_mnemonic = if arith { "ASR" } else { "SHR" };
                        let carry = label_name(&JumpLabel::new("sh_carry"));
                        let join = label_name(&JumpLabel::new("sh_join"));
                        self.lines(&["LDA _t1+1", hi_mnemonic, "STA _t1+1"])?;
                        writeln!(self.out, "    JC {carry}")?;
                        self.lines(&["LDA _t1", "SHR", "STA _t1"])?;
                        writeln!(self.out, "    JMP {join}")?;
                        writeln!(self.out, "{carry}:")?;
                        self.lines(&["LDA _t1", "SHR", "OR _c80", "STA _t1"])?;
                        writeln!(self.out, "{join}:")?;
                    }
                }
                self.lines(&["TXA", "DEC", "TAX"])?;
                writeln!(self.out, "    JMP {looplbl}")?;
                writeln!(self.out, "{done}:")?;
                self.lines(&["LDA _t1+1", "TAY", "LDA _t1"])?;
            }
            SizeClass::B4 => return Err(anyhow!("double-word shifts are outside the menu")),
        }
        Ok(())
    }

    fn spill_offset_of(&self, addr_kid: &Labeled<'_>) -> Result<i32> {
        match &addr_kid.node.leaf {
            Some(IrLeaf::Spill(slot)) => self.frame.spill_offset(*slot),
            _ => Err(anyhow!("expected a spill-cell pointer leaf")),
        }
    }

    fn lines(&mut self, instrs: &[&str]) -> Result<()> {
        for instr in instrs {
            writeln!(self.out, "    {instr}")?;
        }
        Ok(())
    }
}

/// Expand one template: `%0`..`%9` the nonterminal leaves' produced texts,
/// `%a` the node's own operand text, `%r` the result register, `%%` a percent.
fn substitute(tpl: &str, texts: &[String], leaf: Option<&str>) -> Result<String> {
    let mut out = String::with_capacity(tpl.len() + 16);
    let mut chars = tpl.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('a') => {
                let leaf = leaf.ok_or_else(|| anyhow!("template needs an operand (%a)"))?;
                out.push_str(leaf);
            }
            Some('r') => out.push_str(ACCUM_NAME),
            Some(d @ '0'..='9') => {
                let i = d as usize - '0' as usize;
                let text = texts
                    .get(i)
                    .ok_or_else(|| anyhow!("template refers to missing leaf %{i}"))?;
                out.push_str(text);
            }
            other => return Err(anyhow!("bad substitution marker {other:?}")),
        }
    }
    Ok(out)
}
