//! Profile persister implementations

pub mod file;
pub mod mem;
