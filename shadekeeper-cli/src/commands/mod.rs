//! CLI subcommands.

pub mod common;
pub mod config;
pub mod framework;
pub mod packages;
