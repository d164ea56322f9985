#[macro_use]
extern crate tracing;

pub mod cli;
pub mod compositor;
pub mod container;
pub mod focus;
pub mod stacking;
pub mod uevent;
pub mod utils;
