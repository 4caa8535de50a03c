#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **journal-scylla** – the production [`JournalStore`](journal_core::store::JournalStore)
//! for the durable event journal, backed by the `scylla` driver crate.
//!
//! Owns the statement builder ([`statements`]) and the `ScyllaStore` that
//! implements the storage trait `journal-core` defines: `journal`'s
//! coordination logic is written once against the trait and runs
//! unmodified against this or `journal-memory`.

pub mod statements;
mod store;

pub use store::ScyllaStore;
