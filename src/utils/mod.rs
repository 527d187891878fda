//! Utility functions and helpers.
//!
//! Environment variable handling shared by the config types.

pub mod env;

pub use env::{get_env_with_prefix, parse_flag, parse_list};
