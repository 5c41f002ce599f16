//! # chainpipe-observability
//!
//! Structured logging for ChainPipe.
//!
//! Every ChainPipe crate logs through `tracing` macros with structured
//! fields (`pipeline`, `block`, `offset`, ...). This crate installs the
//! subscriber: an `EnvFilter` built from a global level plus per-component
//! overrides, writing human-readable text or JSON lines (ELK, Loki,
//! CloudWatch).

pub mod logging;

pub use logging::{init_tracing, LogConfig, LogInitError};
