//! Revisions: atomic, ordered batches of date and fact changes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, Serial, fact::Fact, vague_date::VagueDate};

// ─── Changes ─────────────────────────────────────────────────────────────────

/// Dates and facts keyed by serial. Ordered maps keep replay deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
  pub dates: BTreeMap<Serial, VagueDate>,
  pub facts: BTreeMap<Serial, Fact>,
}

/// Serials that [`Changes::merge`] replaced rather than added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overwritten {
  pub dates: Vec<Serial>,
  pub facts: Vec<Serial>,
}

impl Overwritten {
  pub fn is_empty(&self) -> bool { self.dates.is_empty() && self.facts.is_empty() }
}

impl Changes {
  pub fn new() -> Self { Self::default() }

  pub fn is_empty(&self) -> bool { self.dates.is_empty() && self.facts.is_empty() }

  /// Total number of entries.
  pub fn len(&self) -> usize { self.dates.len() + self.facts.len() }

  pub fn with_fact(mut self, fact: Fact) -> Self {
    self.facts.insert(fact.serial, fact);
    self
  }

  pub fn with_date(mut self, serial: Serial, date: VagueDate) -> Self {
    self.dates.insert(serial, date);
    self
  }

  /// Merge `other` into `self`; entries of `other` win on a serial collision.
  pub fn merge(&mut self, other: Changes) -> Overwritten {
    let mut overwritten = Overwritten::default();
    for (serial, date) in other.dates {
      if self.dates.insert(serial, date).is_some() {
        overwritten.dates.push(serial);
      }
    }
    for (serial, fact) in other.facts {
      if self.facts.insert(serial, fact).is_some() {
        overwritten.facts.push(serial);
      }
    }
    overwritten
  }

  /// Check that `self` may be layered on top of `committed`.
  ///
  /// Every fact must be keyed by its own serial. A committed fact serial may
  /// only be re-recorded as its retraction, and a committed date serial only
  /// with an equal value. Anything else is [`Error::DuplicateKey`].
  pub fn check_appendable(&self, committed: &Changes) -> Result<()> {
    for (serial, fact) in &self.facts {
      if *serial != fact.serial {
        return Err(Error::DuplicateKey(format!(
          "fact {} filed under serial {serial}",
          fact.serial
        )));
      }
      if let Some(old) = committed.facts.get(serial)
        && !fact.is_retraction_of(old)
      {
        return Err(Error::DuplicateKey(format!("fact {serial}")));
      }
    }
    for (serial, date) in &self.dates {
      if let Some(old) = committed.dates.get(serial)
        && old != date
      {
        return Err(Error::DuplicateKey(format!("date {serial}")));
      }
    }
    Ok(())
  }
}

// ─── Revision ────────────────────────────────────────────────────────────────

/// One commit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
  /// Sequential and gap-free, starting at 1.
  pub serial:    Serial,
  pub timestamp: DateTime<Utc>,
  pub comment:   String,
  pub changes:   Changes,
}
