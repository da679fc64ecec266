//! Shared utilities for codeshare: logger setup and time helpers.

pub mod logger;
pub mod time;
