//! Shared utilities.

pub mod exec;
