#[macro_use]
mod macros;

pub mod current;
pub mod energy;
pub mod power;
