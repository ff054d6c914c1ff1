//! Purpose: Library crate behind the `stowage` CLI and its tests.
//! Exports: `api` (stable surface), `core` (codecs, persistence, sync, errors), `notice`.
//! Role: Extension-directed load/save plus idempotent directory synchronization.
//! Invariants: Library code returns `core::error::Error` and never panics on bad input.
//! Invariants: Process-wide state is limited to the read-only format registry.
pub mod api;
pub mod core;
pub mod notice;
