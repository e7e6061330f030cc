use crate::common::ir::IrNode;
use crate::stage1_select::{
    rule::{Cost, INFINITE_COST, Matcher, Nonterminal, Pattern, PatternKid, RuleId, RuleTable},
    terminal::Terminal,
};
use anyhow::{Result, anyhow};

/// Per-node outcome of the cost-labeling pass: for every reachable
/// nonterminal, the cheapest rule and its accumulated cost.
#[derive(Clone, Copy, Debug)]
struct State {
    cost: [Cost; Nonterminal::COUNT],
    rule: [Option<RuleId>; Nonterminal::COUNT],
}
impl State {
    fn new() -> Self {
        Self {
            cost: [INFINITE_COST; Nonterminal::COUNT],
            rule: [None; Nonterminal::COUNT],
        }
    }
}

/// An IR subtree annotated with its labeling. Mirrors the IR tree's shape;
/// discarded after the emission walk.
#[derive(Debug)]
pub struct Labeled<'ir> {
    pub node: &'ir IrNode,
    pub kids: Vec<Labeled<'ir>>,
    state: State,
}
impl<'ir> Labeled<'ir> {
    pub fn chosen(&self, nt: Nonterminal) -> Option<RuleId> {
        self.state.rule[nt.idx()]
    }
    pub fn cost(&self, nt: Nonterminal) -> Cost {
        self.state.cost[nt.idx()]
    }
}

/// The dynamic-programming matcher. Target-independent: every piece of
/// NEANDER-X knowledge it applies comes in through the rule table.
pub struct Labeler<'rt> {
    rules: &'rt RuleTable,
}
impl<'rt> Labeler<'rt> {
    pub fn new(rules: &'rt RuleTable) -> Self {
        Self { rules }
    }

    /// Label one statement tree bottom-up and verify the root derives `Stmt`.
    /// A node shape with no finite-cost covering rule is a fatal
    /// grammar-coverage failure for the enclosing unit; the diagnostic blames
    /// the deepest node that derives nothing at all, falling back to the root.
    pub fn label_tree<'ir>(&self, root: &'ir IrNode) -> Result<Labeled<'ir>> {
        let labeled = self.label(root);
        if labeled.chosen(Nonterminal::Stmt).is_none() {
            return Err(match find_underived(&labeled) {
                Some(culprit) => anyhow!(
                    "grammar coverage failure: no rule covers terminal {}",
                    Terminal::of(culprit.node)
                ),
                None => uncovered(root, Nonterminal::Stmt),
            });
        }
        Ok(labeled)
    }

    fn label<'ir>(&self, node: &'ir IrNode) -> Labeled<'ir> {
        let kids = node.kids.iter().map(|kid| self.label(kid)).collect::<Vec<_>>();
        let mut labeled = Labeled { node, kids, state: State::new() };

        for (id, rule) in self.rules.iter_ids() {
            let Matcher::Tree(pattern) = &rule.matcher else {
                continue;
            };
            if let Some(cond) = &rule.cond
                && cond.eval(node) == false
            {
                continue;
            }
            let Some(kids_cost) = Self::match_cost(pattern, &labeled) else {
                continue;
            };
            let total = kids_cost + rule.cost as u32;
            Self::record(&mut labeled.state, rule.nonterm, id, total);
        }

        self.close(&mut labeled);

        log::trace!(
            "labeled {} stmt_cost={}",
            Terminal::of(node),
            labeled.cost(Nonterminal::Stmt)
        );
        labeled
    }

    /// Structural match of `pattern` against `subject`, returning the summed
    /// cost of the pattern's nonterminal leaves, or `None` on mismatch or on
    /// any leaf the subject cannot derive.
    fn match_cost(pattern: &Pattern, subject: &Labeled<'_>) -> Option<u32> {
        if Terminal::of(subject.node) != pattern.term {
            return None;
        }
        if pattern.kids.len() != subject.kids.len() {
            return None;
        }
        let mut sum: u32 = 0;
        for (pat_kid, sub_kid) in pattern.kids.iter().zip(subject.kids.iter()) {
            match pat_kid {
                PatternKid::Nt(nt) => {
                    let cost = sub_kid.cost(*nt);
                    if cost == INFINITE_COST {
                        return None;
                    }
                    sum += cost as u32;
                }
                PatternKid::Sub(sub_pattern) => {
                    sum += Self::match_cost(sub_pattern, sub_kid)?;
                }
            }
        }
        Some(sum)
    }

    /// Chain-rule closure, run to fixpoint. Iterating the table in declaration
    /// order with a strict improvement test keeps tie-breaking deterministic.
    fn close(&self, labeled: &mut Labeled<'_>) {
        loop {
            let mut improved = false;
            for (id, rule) in self.rules.iter_ids() {
                let Matcher::Chain(src) = &rule.matcher else {
                    continue;
                };
                if let Some(cond) = &rule.cond
                    && cond.eval(labeled.node) == false
                {
                    continue;
                }
                let src_cost = labeled.cost(*src);
                if src_cost == INFINITE_COST {
                    continue;
                }
                let total = src_cost as u32 + rule.cost as u32;
                improved |= Self::record(&mut labeled.state, rule.nonterm, id, total);
            }
            if improved == false {
                break;
            }
        }
    }

    fn record(state: &mut State, nt: Nonterminal, id: RuleId, total: u32) -> bool {
        if total >= INFINITE_COST as u32 {
            return false;
        }
        let slot = nt.idx();
        if (total as Cost) < state.cost[slot] {
            state.cost[slot] = total as Cost;
            state.rule[slot] = Some(id);
            true
        } else {
            false
        }
    }
}

/// Re-walk a tree pattern against a labeled subject collecting its nonterminal
/// leaves in left-to-right order, each bound to the subtree it covers.
/// The emission engine evaluates exactly this sequence before applying a
/// rule's action.
pub fn bind<'a, 'ir>(
    pattern: &Pattern,
    subject: &'a Labeled<'ir>,
) -> Result<Vec<(&'a Labeled<'ir>, Nonterminal)>> {
    let mut out = vec![];
    collect(pattern, subject, &mut out)?;
    Ok(out)
}

fn collect<'a, 'ir>(
    pattern: &Pattern,
    subject: &'a Labeled<'ir>,
    out: &mut Vec<(&'a Labeled<'ir>, Nonterminal)>,
) -> Result<()> {
    if Terminal::of(subject.node) != pattern.term || pattern.kids.len() != subject.kids.len() {
        return Err(anyhow!(
            "labeling out of sync: pattern root {} vs subject {}",
            pattern.term,
            Terminal::of(subject.node)
        ));
    }
    for (pat_kid, sub_kid) in pattern.kids.iter().zip(subject.kids.iter()) {
        match pat_kid {
            PatternKid::Nt(nt) => out.push((sub_kid, *nt)),
            PatternKid::Sub(sub_pattern) => collect(sub_pattern, sub_kid, out)?,
        }
    }
    Ok(())
}

fn find_underived<'a, 'ir>(labeled: &'a Labeled<'ir>) -> Option<&'a Labeled<'ir>> {
    for kid in labeled.kids.iter() {
        if let Some(culprit) = find_underived(kid) {
            return Some(culprit);
        }
    }
    let derives_anything = labeled.state.cost.iter().any(|c| *c != INFINITE_COST);
    if derives_anything { None } else { Some(labeled) }
}

pub fn uncovered(node: &IrNode, demanded: Nonterminal) -> anyhow::Error {
    anyhow!(
        "grammar coverage failure: no finite-cost rule derives {demanded:?} for terminal {}",
        Terminal::of(node)
    )
}
