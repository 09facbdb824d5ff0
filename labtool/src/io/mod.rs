//! I/O helpers: configuration, interpreter discovery, script staging and
//! process execution.

pub mod config;
pub mod interpreter;
pub mod invoker;
pub mod process;
pub mod staging;
