mod misc;
mod programs;
pub mod simulator;

pub use misc::*;
pub use programs::*;
