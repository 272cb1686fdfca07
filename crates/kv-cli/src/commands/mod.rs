//! Command implementations

pub(crate) mod common;
pub mod down;
pub mod generate;
pub mod refresh;
pub mod status;
pub mod up;
