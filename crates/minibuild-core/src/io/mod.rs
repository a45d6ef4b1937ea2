//! Blocking IO: verified downloads and child processes.

pub mod exec;
pub mod fetch;
