//! Core runtime infrastructure.
//!
//! - [`config`] - Configuration parsing and validation
//! - [`runtime`] - Component lifecycle and signal handling
//! - [`time`] - Clocks and timestamp formats
//! - [`error`] - Error taxonomy and GENI result codes

pub mod config;
pub mod error;
pub mod runtime;
pub mod time;
