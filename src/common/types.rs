/// Width of an integer value, in bytes. The NEANDER-X accumulator is one byte
/// wide; B2 and B4 values are handled by the multi-precision rules.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SizeClass {
    B1 = 1,
    B2 = 2,
    B4 = 4,
}
impl SizeClass {
    pub fn bytelen(&self) -> u16 {
        *self as u16
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Signedness {
    Signed,
    Unsigned,
}

pub const STACK_SLOT_BYTELEN: u16 = 2;

pub fn stack_align(bytelen: u16) -> u16 {
    bytelen.div_ceil(STACK_SLOT_BYTELEN) * STACK_SLOT_BYTELEN
}
