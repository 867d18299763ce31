#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared utilities for vend.
//!
//! Pure helper functions with no logging dependencies. Logging is owned by
//! the callers in `vend-core` and `vend-cli`.

pub mod fs;
