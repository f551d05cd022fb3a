//! Integration test suite for islet
//!
//! End-to-end tests driving the engine the way a router would, plus the CLI
//! binary through `assert_cmd`.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **render**: Full documents, state embedding and sub-component registration
//! - **endpoint**: Client-module endpoint responses and id validation
//! - **loader**: Artifact cleanup on failing module hosts
//! - **db**: Connection guard with a recording connector
//! - **cli**: The `islet` binary

mod cli;
mod db;
mod endpoint;
mod loader;
mod render;
