//! Instruction selection: the terminal encoding, the target's rule table, and
//! the target-independent cost-labeling pass that chooses a minimum-cost
//! covering rule per node and nonterminal.

pub mod grammar;
pub mod label;
pub mod rule;
pub mod terminal;
