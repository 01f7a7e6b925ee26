//! ufwguard daemon library.
//!
//! Exposes internal modules for integration testing. In production,
//! `ufwguard-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod logging;
pub mod run;
