//! Shared helpers. Currently only diagnostic logging setup.

pub mod logger;
