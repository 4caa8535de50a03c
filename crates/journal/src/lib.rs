#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **journal** – the durable event journal engine: write coordinator,
//! delete coordinator, tag-write dispatch, sequence-number probe,
//! the read-journal hookup contract, and the journal controller
//! that ties them together.
//!
//! `journal-core` defines the data model and the [`journal_core::store::JournalStore`]
//! trait every backing store implements; this crate is generic over that
//! trait and never touches a concrete store directly, mirroring the split
//! between a storage crate's data model and the engine logic built on top
//! of it.

/// Per-PID concurrency primitives shared by the write, delete, and probe paths.
pub mod coordination;
/// Delete coordinator.
pub mod delete;
/// Read-journal hookup.
pub mod replay;
/// Sequence-number probe.
pub mod seqnr;
/// Tag-write dispatch.
pub mod tagwrite;
/// Write coordinator.
pub mod write;

/// Journal controller.
pub mod controller;

pub use controller::{JournalController, ShutdownHook};
