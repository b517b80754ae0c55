//! Purpose: Library crate behind the `hdlrun` CLI and its integration tests.
//! Exports: `api` (stable surface), plus the bootstrap, setup, engine, and manifest modules.
//! Role: Bootstraps an HDL unit-test run and hands it to an external test engine.
//! Invariants: Setup steps run in a fixed order and abort before the engine on any error.
//! Invariants: The engine only ever sees a frozen, immutable project snapshot.
pub mod api;
pub mod bootstrap;
pub mod core;
pub mod engine;
pub mod layout;
pub mod manifest;
pub mod notice;
pub mod setup;
