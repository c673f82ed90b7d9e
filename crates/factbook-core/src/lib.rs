//! Core types for the Factbook contact repository.
//!
//! Contacts are never stored as records. Every piece of information is a
//! [`Fact`](fact::Fact) tied to a schema [`Predicate`](schema::Predicate),
//! grouped into append-only [`Revision`](revision::Revision)s. The live
//! [`ContactModel`](model::ContactModel) is rebuilt from the fact log.
//!
//! This crate has no database dependencies. Storage backends
//! implement [`RevisionStore`](store::RevisionStore).

pub mod contact;
pub mod error;
pub mod fact;
pub mod model;
pub mod repository;
pub mod revision;
pub mod schema;
pub mod store;
pub mod vague_date;

pub use error::{Error, Result};

/// Identity number of a contact, fact, date or revision. Allocation starts at
/// 1; 0 is reserved for "unset" references.
pub type Serial = u64;

#[cfg(test)]
pub(crate) mod testing;
