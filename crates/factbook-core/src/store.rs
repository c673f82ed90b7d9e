//! The `RevisionStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `factbook-store-sqlite`). [`Repository`](crate::repository::Repository)
//! depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::revision::Revision;

/// Durable, append-only storage of revisions.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait RevisionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Load every persisted revision with its dates and facts, in ascending
  /// serial order.
  fn load_revisions(
    &self,
  ) -> impl Future<Output = Result<Vec<Revision>, Self::Error>> + Send + '_;

  /// Persist one revision: header, dates and facts. Either every row is
  /// written or none is.
  fn persist_revision<'a>(
    &'a self,
    revision: &'a Revision,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
