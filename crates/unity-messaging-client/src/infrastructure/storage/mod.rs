//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads and writes the TOML file, falls back to
//! defaults on first run, and converts the file values into the client's
//! runtime settings.

pub mod config;
