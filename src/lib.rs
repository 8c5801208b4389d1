// ============================================================================
// tx-lint - Library Interface
// ============================================================================
//
// This module exposes the internal modules for integration testing.
// The main binary (main.rs) only parses arguments and dispatches to `cli`.

pub mod annotation;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;
pub mod rules;
pub mod scanner;
pub mod symbol_table;
