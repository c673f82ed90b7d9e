//! Shared helpers for unit tests.

use std::{
  collections::BTreeMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use crate::{Serial, fact::Fact, revision::Revision, store::RevisionStore};

pub fn fact(serial: Serial, predicate: Serial, subject: Serial, value: &str) -> Fact {
  Fact::new(serial, predicate, subject, value)
}

#[derive(Debug, thiserror::Error)]
#[error("memory store refused the write")]
pub struct MemoryStoreError;

/// A [`RevisionStore`] kept in memory. Clones share state, so a test can keep
/// a handle while a repository owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
  revisions: Arc<Mutex<BTreeMap<Serial, Revision>>>,
  fail:      Arc<AtomicBool>,
}

impl MemoryStore {
  /// Make every subsequent write fail until reset.
  pub fn fail_writes(&self, fail: bool) { self.fail.store(fail, Ordering::SeqCst); }

  pub fn len(&self) -> usize {
    self.revisions.lock().map(|r| r.len()).unwrap_or_default()
  }
}

impl RevisionStore for MemoryStore {
  type Error = MemoryStoreError;

  async fn load_revisions(&self) -> Result<Vec<Revision>, MemoryStoreError> {
    let revisions = self.revisions.lock().map_err(|_| MemoryStoreError)?;
    Ok(revisions.values().cloned().collect())
  }

  async fn persist_revision(&self, revision: &Revision) -> Result<(), MemoryStoreError> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(MemoryStoreError);
    }
    let mut revisions = self.revisions.lock().map_err(|_| MemoryStoreError)?;
    revisions.insert(revision.serial, revision.clone());
    Ok(())
  }
}
