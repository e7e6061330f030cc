use crate::common::{
    ir::{IrNode, Operation},
    types::{SizeClass, Signedness},
};
use std::fmt;

/// Structural key identifying a node shape for the matcher.
///
/// Matching is driven purely by equality on this key, so the key must be
/// bijective with the distinct `(operation, size, signedness)` combinations the
/// front end can produce. The `IrNode` constructors normalize the size and
/// signedness of size-agnostic operations (labels, jumps, void calls), which is
/// what keeps the mapping collision-free.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Terminal {
    pub op: Operation,
    pub size: SizeClass,
    pub sign: Signedness,
}
impl Terminal {
    pub const fn new(op: Operation, size: SizeClass, sign: Signedness) -> Self {
        Self { op, size, sign }
    }
    pub fn of(node: &IrNode) -> Self {
        Self::new(node.op, node.size, node.sign)
    }
}
impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.sign {
            Signedness::Signed => "I",
            Signedness::Unsigned => "U",
        };
        write!(f, "{:?}{}{}", self.op, sign, self.size.bytelen())
    }
}
