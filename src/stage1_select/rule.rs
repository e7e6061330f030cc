use crate::common::ir::{IrLeaf, IrNode};
use crate::stage1_select::terminal::Terminal;

/// Abstract result category a rule can produce.
///
/// `Reg` means "value materialized in the accumulator bank": `AC` for B1,
/// `Y:AC` for B2, and the four bytes pushed on the stack for B4. The remaining
/// nonterminals are textual: they produce operand text, not instructions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Nonterminal {
    Stmt,
    Reg,
    Con1,
    Con2,
    Con4,
    /// A constant whose value is exactly 1; lets increment/decrement and
    /// shift-by-one rules outbid the general forms.
    ConOne,
    /// Absolute address text of a global/static object.
    Addr,
    /// Frame-relative offset text of a parameter, local, or spill cell.
    Faddr,
}
impl Nonterminal {
    pub const COUNT: usize = 8;

    pub fn idx(self) -> usize {
        self as usize
    }
}

#[derive(Debug)]
pub enum PatternKid {
    Nt(Nonterminal),
    Sub(Pattern),
}

#[derive(Debug)]
pub struct Pattern {
    pub term: Terminal,
    pub kids: Vec<PatternKid>,
}

#[derive(Debug)]
pub enum Matcher {
    /// Derive from another nonterminal at the same node.
    Chain(Nonterminal),
    Tree(Pattern),
}

#[derive(Debug)]
pub enum SideCondition {
    ConstInRange(i64, i64),
}
impl SideCondition {
    pub fn eval(&self, node: &IrNode) -> bool {
        match self {
            Self::ConstInRange(lo, hi) => match &node.leaf {
                Some(IrLeaf::Const(v)) => lo <= v && v <= hi,
                _ => false,
            },
        }
    }
}

/// Emission sequences that need per-use state (fresh labels, frame offsets,
/// argument bookkeeping) and therefore cannot be fixed template text. The
/// engine applies these exactly like templates: after all nonterminal leaves
/// of the pattern have been evaluated.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StructuredEmit {
    SpillRead,
    SpillWrite,
    ArgPush,
    Call,
    Ret,
    Discard,
    CmpBranch,
    VarShift,
    /// B1 -> B2 sign extension.
    SignExtend12,
    /// B2 -> B4 sign extension.
    SignExtend24,
}

#[derive(Debug)]
pub enum RuleAction {
    /// Literal assembly text with substitution markers (`%0`..`%9`, `%a`,
    /// `%r`, `%%`). A template ending in a newline is an instruction sequence;
    /// otherwise it is operand text propagated to the consuming rule.
    Template(&'static str),
    Emit(StructuredEmit),
}

pub type Cost = u16;
pub const INFINITE_COST: Cost = u16::MAX;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RuleId(pub(crate) u16);

#[derive(Debug)]
pub struct Rule {
    pub nonterm: Nonterminal,
    pub matcher: Matcher,
    pub action: RuleAction,
    pub cost: Cost,
    pub cond: Option<SideCondition>,
}
impl Rule {
    pub fn text(nonterm: Nonterminal, matcher: Matcher, template: &'static str, cost: Cost) -> Self {
        Self {
            nonterm,
            matcher,
            action: RuleAction::Template(template),
            cost,
            cond: None,
        }
    }
    pub fn emit(nonterm: Nonterminal, matcher: Matcher, emit: StructuredEmit, cost: Cost) -> Self {
        Self {
            nonterm,
            matcher,
            action: RuleAction::Emit(emit),
            cost,
            cond: None,
        }
    }
    pub fn when(mut self, cond: SideCondition) -> Self {
        self.cond = Some(cond);
        self
    }
}

/// The target's capability menu, in declaration order. Order is semantic:
/// cost ties are broken in favor of the earlier rule.
#[derive(Debug)]
pub struct RuleTable {
    rules: Vec<Rule>,
}
impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
    pub fn get(&self, id: RuleId) -> &Rule {
        &self.rules[id.0 as usize]
    }
    pub fn iter_ids(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, r)| (RuleId(i as u16), r))
    }
}
