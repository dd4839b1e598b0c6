//! Side-effecting adapters: configuration files and tool processes.

pub mod config;
pub mod process;
pub mod tool;
