//! [`Repository`]: the append-only revision log.
//!
//! Owns every loaded [`Revision`], the aggregate of their changes, and the
//! serial pools used to hand out fact and date serials that collide neither
//! with committed rows nor with serials reserved but not yet committed.
//!
//! Single-process, single-writer: serial allocation is `max + 1` over the
//! pool and is only race-free under that assumption.

use std::{
  collections::{BTreeMap, BTreeSet},
  ops::RangeBounds,
};

use chrono::{SubsecRound as _, Utc};
use tracing::{debug, info};

use crate::{
  Error, Result, Serial,
  revision::{Changes, Revision},
  store::RevisionStore,
};

fn storage<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Storage(Box::new(e))
}

// ─── Serial pool ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SerialPool {
  committed:   BTreeSet<Serial>,
  uncommitted: BTreeSet<Serial>,
}

impl SerialPool {
  /// Reserve and return `max(committed ∪ uncommitted) + 1`.
  fn reserve(&mut self) -> Serial {
    let last = self
      .committed
      .last()
      .copied()
      .max(self.uncommitted.last().copied())
      .unwrap_or(0);
    let next = last + 1;
    self.uncommitted.insert(next);
    next
  }

  fn mark_committed(&mut self, serials: impl IntoIterator<Item = Serial>) {
    for serial in serials {
      self.uncommitted.remove(&serial);
      self.committed.insert(serial);
    }
  }

  /// Replace the committed set; reservations that are now committed are
  /// dropped, the rest stay reserved.
  fn reset_committed(&mut self, serials: impl IntoIterator<Item = Serial>) {
    self.committed = serials.into_iter().collect();
    let committed = &self.committed;
    self.uncommitted.retain(|s| !committed.contains(s));
  }
}

// ─── Repository ──────────────────────────────────────────────────────────────

/// The revision history backed by a [`RevisionStore`].
///
/// Created uninitialised by [`Repository::new`]; [`Repository::reload`] (or
/// [`Repository::open`]) brings it into the loaded state, after which each
/// [`Repository::commit`] appends exactly one revision.
pub struct Repository<S> {
  store:        S,
  loaded:       bool,
  revisions:    BTreeMap<Serial, Revision>,
  /// Aggregate of every committed revision.
  current:      Changes,
  fact_serials: SerialPool,
  date_serials: SerialPool,
}

impl<S: RevisionStore> Repository<S> {
  pub fn new(store: S) -> Self {
    Self {
      store,
      loaded: false,
      revisions: BTreeMap::new(),
      current: Changes::new(),
      fact_serials: SerialPool::default(),
      date_serials: SerialPool::default(),
    }
  }

  /// Create a repository and load its history.
  pub async fn open(store: S) -> Result<Self> {
    let mut repository = Self::new(store);
    repository.reload().await?;
    Ok(repository)
  }

  pub fn is_loaded(&self) -> bool { self.loaded }

  /// Discard in-memory revisions and reload them from the store.
  ///
  /// Serials reserved through [`Self::get_new_fact_serial`] and
  /// [`Self::get_new_date_serial`] remain reserved.
  #[tracing::instrument(skip(self))]
  pub async fn reload(&mut self) -> Result<()> {
    let loaded = self.store.load_revisions().await.map_err(storage)?;

    let mut revisions = BTreeMap::new();
    for revision in loaded {
      let serial = revision.serial;
      if revisions.insert(serial, revision).is_some() {
        return Err(Error::DuplicateKey(format!("revision {serial}")));
      }
    }

    let mut current = Changes::new();
    for revision in revisions.values() {
      let overwritten = current.merge(revision.changes.clone());
      if !overwritten.is_empty() {
        debug!(
          revision = revision.serial,
          facts = ?overwritten.facts,
          dates = ?overwritten.dates,
          "revision re-records earlier serials"
        );
      }
    }

    self.fact_serials.reset_committed(current.facts.keys().copied());
    self.date_serials.reset_committed(current.dates.keys().copied());
    self.revisions = revisions;
    self.current = current;
    self.loaded = true;

    info!(revisions = self.revisions.len(), "repository loaded");
    Ok(())
  }

  /// Persist `changes` as a new revision and return it.
  ///
  /// The serial is one past the highest existing revision. Nothing in memory
  /// changes unless the store accepted every row. Re-recording a committed
  /// fact serial is only allowed as a retraction, and a committed date serial
  /// only with an equal value; anything else is [`Error::DuplicateKey`].
  #[tracing::instrument(skip(self, changes))]
  pub async fn commit(&mut self, comment: &str, changes: Changes) -> Result<Revision> {
    if !self.loaded {
      debug!("committing to an unloaded repository; loading first");
      self.reload().await?;
    }
    changes.check_appendable(&self.current)?;

    let serial = self.revisions.keys().next_back().copied().unwrap_or(0) + 1;
    let revision = Revision {
      serial,
      timestamp: Utc::now().trunc_subsecs(0),
      comment: comment.to_owned(),
      changes,
    };

    self
      .store
      .persist_revision(&revision)
      .await
      .map_err(storage)?;

    self
      .fact_serials
      .mark_committed(revision.changes.facts.keys().copied());
    self
      .date_serials
      .mark_committed(revision.changes.dates.keys().copied());
    self.current.merge(revision.changes.clone());
    self.revisions.insert(serial, revision.clone());

    info!(
      serial,
      facts = revision.changes.facts.len(),
      dates = revision.changes.dates.len(),
      "revision committed"
    );
    Ok(revision)
  }

  /// Reserve the next free fact serial.
  pub fn get_new_fact_serial(&mut self) -> Serial {
    let serial = self.fact_serials.reserve();
    debug!(serial, "reserved fact serial");
    serial
  }

  /// Reserve the next free date serial.
  pub fn get_new_date_serial(&mut self) -> Serial {
    let serial = self.date_serials.reserve();
    debug!(serial, "reserved date serial");
    serial
  }

  /// Merge the changes of every revision whose serial lies in `range`, later
  /// revisions winning on a serial collision. `..` aggregates everything.
  pub fn aggregate_revisions(&self, range: impl RangeBounds<Serial>) -> Changes {
    let mut aggregate = Changes::new();
    for revision in self
      .revisions
      .values()
      .filter(|r| range.contains(&r.serial))
    {
      let overwritten = aggregate.merge(revision.changes.clone());
      if !overwritten.is_empty() {
        debug!(
          revision = revision.serial,
          facts = ?overwritten.facts,
          dates = ?overwritten.dates,
          "aggregation re-records earlier serials"
        );
      }
    }
    aggregate
  }

  pub fn count_revisions(&self) -> usize { self.revisions.len() }

  pub fn get_revision(&self, serial: Serial) -> Result<&Revision> {
    self
      .revisions
      .get(&serial)
      .ok_or(Error::RevisionNotFound(serial))
  }

  /// Revisions in ascending serial order.
  pub fn iter_revisions(&self) -> impl Iterator<Item = &Revision> {
    self.revisions.values()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    testing::{MemoryStore, fact},
    vague_date::VagueDate,
  };

  async fn repository() -> (MemoryStore, Repository<MemoryStore>) {
    let store = MemoryStore::default();
    let repo = Repository::open(store.clone()).await.unwrap();
    (store, repo)
  }

  #[tokio::test]
  async fn new_repository_is_uninitialised() {
    let repo = Repository::new(MemoryStore::default());
    assert!(!repo.is_loaded());
    assert_eq!(repo.count_revisions(), 0);
  }

  #[tokio::test]
  async fn first_commit_has_serial_one() {
    let (_, mut repo) = repository().await;
    let revision = repo.commit("c1", Changes::new()).await.unwrap();
    assert_eq!(revision.serial, 1);

    repo.reload().await.unwrap();
    assert_eq!(repo.count_revisions(), 1);
    assert_eq!(repo.get_revision(1).unwrap().comment, "c1");
  }

  #[tokio::test]
  async fn commit_serials_are_gap_free() {
    let (_, mut repo) = repository().await;
    for i in 1..=3 {
      let revision = repo.commit(&format!("c{i}"), Changes::new()).await.unwrap();
      assert_eq!(revision.serial, i);
    }
    let serials: Vec<_> = repo.iter_revisions().map(|r| r.serial).collect();
    assert_eq!(serials, [1, 2, 3]);
  }

  #[tokio::test]
  async fn committed_fact_survives_reload() {
    let (store, mut repo) = repository().await;
    repo
      .commit("c1", Changes::new().with_fact(fact(1, 1, 1, "Mustermann")))
      .await
      .unwrap();

    let reopened = Repository::open(store).await.unwrap();
    let f = &reopened.get_revision(1).unwrap().changes.facts[&1];
    assert_eq!(f.value, "Mustermann");
    assert_eq!(f.subject_serial, 1);
  }

  #[tokio::test]
  async fn unknown_revision_is_not_found() {
    let (_, repo) = repository().await;
    assert!(matches!(
      repo.get_revision(4),
      Err(Error::RevisionNotFound(4))
    ));
  }

  #[tokio::test]
  async fn fact_serials_increase_across_commits() {
    let (_, mut repo) = repository().await;
    let mut seen = Vec::new();

    let a = repo.get_new_fact_serial();
    let b = repo.get_new_fact_serial();
    seen.extend([a, b]);
    repo
      .commit("c1", Changes::new().with_fact(fact(a, 1, 1, "x")))
      .await
      .unwrap();
    seen.push(repo.get_new_fact_serial());
    repo
      .commit("c2", Changes::new().with_fact(fact(b, 2, 1, "y")))
      .await
      .unwrap();
    seen.push(repo.get_new_fact_serial());

    assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
  }

  #[tokio::test]
  async fn reservations_skip_committed_serials() {
    let (store, mut repo) = repository().await;
    repo
      .commit(
        "c1",
        Changes::new()
          .with_fact(fact(5, 1, 1, "x"))
          .with_date(9, "2016".parse::<VagueDate>().unwrap()),
      )
      .await
      .unwrap();

    let mut reopened = Repository::open(store).await.unwrap();
    assert_eq!(reopened.get_new_fact_serial(), 6);
    assert_eq!(reopened.get_new_date_serial(), 10);
  }

  #[tokio::test]
  async fn failed_commit_leaves_state_unchanged() {
    let (store, mut repo) = repository().await;
    repo.commit("c1", Changes::new()).await.unwrap();

    store.fail_writes(true);
    let err = repo
      .commit("c2", Changes::new().with_fact(fact(1, 1, 1, "x")))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(repo.count_revisions(), 1);
    assert!(repo.aggregate_revisions(..).facts.is_empty());

    store.fail_writes(false);
    let revision = repo
      .commit("c2", Changes::new().with_fact(fact(1, 1, 1, "x")))
      .await
      .unwrap();
    assert_eq!(revision.serial, 2);
    assert_eq!(store.len(), 2);
  }

  #[tokio::test]
  async fn rewriting_a_committed_fact_is_rejected() {
    let (_, mut repo) = repository().await;
    let original = fact(1, 1, 1, "Mustermann");
    repo
      .commit("c1", Changes::new().with_fact(original.clone()))
      .await
      .unwrap();

    let err = repo
      .commit("c2", Changes::new().with_fact(fact(1, 1, 1, "Musterfrau")))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::DuplicateKey(_)));

    repo
      .commit("retract", Changes::new().with_fact(original.invalidated()))
      .await
      .unwrap();
    assert!(!repo.aggregate_revisions(..).facts[&1].is_valid);
  }

  #[tokio::test]
  async fn changing_a_committed_date_is_rejected() {
    let (_, mut repo) = repository().await;
    let date: VagueDate = "2016".parse().unwrap();
    repo
      .commit("c1", Changes::new().with_date(1, date))
      .await
      .unwrap();

    let other: VagueDate = "2017".parse().unwrap();
    let err = repo
      .commit("c2", Changes::new().with_date(1, other))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::DuplicateKey(_)));
  }

  #[tokio::test]
  async fn aggregate_respects_half_open_range() {
    let (_, mut repo) = repository().await;
    repo
      .commit("c1", Changes::new().with_fact(fact(1, 1, 1, "a")))
      .await
      .unwrap();
    repo
      .commit("c2", Changes::new().with_fact(fact(2, 2, 1, "b")))
      .await
      .unwrap();
    repo
      .commit("c3", Changes::new().with_fact(fact(3, 3, 1, "c")))
      .await
      .unwrap();

    let keys = |c: Changes| c.facts.into_keys().collect::<Vec<_>>();
    assert_eq!(keys(repo.aggregate_revisions(..)), [1, 2, 3]);
    assert_eq!(keys(repo.aggregate_revisions(2..)), [2, 3]);
    assert_eq!(keys(repo.aggregate_revisions(..3)), [1, 2]);
    assert_eq!(keys(repo.aggregate_revisions(2..3)), [2]);
  }

  #[tokio::test]
  async fn later_revisions_win_in_aggregation() {
    let (_, mut repo) = repository().await;
    let f = fact(1, 1, 1, "a");
    repo.commit("c1", Changes::new().with_fact(f.clone())).await.unwrap();
    repo
      .commit("c2", Changes::new().with_fact(f.invalidated()))
      .await
      .unwrap();

    assert!(repo.aggregate_revisions(..2).facts[&1].is_valid);
    assert!(repo.aggregate_revisions(..=1).facts[&1].is_valid);
    assert!(!repo.aggregate_revisions(..).facts[&1].is_valid);
  }

  #[tokio::test]
  async fn commit_loads_an_unloaded_repository() {
    let store = MemoryStore::default();
    Repository::open(store.clone())
      .await
      .unwrap()
      .commit("c1", Changes::new())
      .await
      .unwrap();

    let mut repo = Repository::new(store);
    let revision = repo.commit("c2", Changes::new()).await.unwrap();
    assert_eq!(revision.serial, 2);
    assert!(repo.is_loaded());
  }
}
