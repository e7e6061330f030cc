//! Code emission: per-activation frame layout, the recursive emission walker
//! with the structural left-operand save protocol, and the textual assembly
//! surface (segments, data directives, prologue/epilogue, runtime routines).

pub mod emit;
pub mod frame;
pub mod runtime;
