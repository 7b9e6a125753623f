//! Distributed rank sort on a square mesh of processes.
// The binaries pull in `clap`, `anyhow` and `tracing-subscriber`, so unused
// crate dependencies cannot be denied for the library alone.
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod comm;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
#[cfg(feature = "mpi")]
pub mod mpi_comm;
pub mod ranksort;
pub mod thread_comm;
pub mod tools;
pub mod topology;
