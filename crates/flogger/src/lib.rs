#![doc = include_str!("../../../README.md")]
//!

//! This crate re-exports the engine, the entry store and the built-in
//! handlers of `flogger-core`.

pub use flogger_core::*;
