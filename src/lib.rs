pub mod common;
pub mod driver;
pub mod stage1_select;
pub mod stage2_emit;

#[cfg(test)]
mod test;
