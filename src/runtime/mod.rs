//! Runtime system
//!
//! Object memory and the values stored in it.

pub mod memory;
pub mod value;
