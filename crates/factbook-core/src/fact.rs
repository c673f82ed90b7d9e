//! Facts, the unit of record of the contact repository.
//!
//! A fact is an immutable `(subject, predicate, value)` triple identified by a
//! globally unique serial. The owning contact type is implied by the
//! predicate's subject class. Facts are never edited in place: a correction is
//! a new fact under a fresh serial, and the old one is re-recorded with
//! `is_valid` cleared.

use serde::{Deserialize, Serialize};

use crate::Serial;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
  pub serial:           Serial,
  pub predicate_serial: Serial,
  pub subject_serial:   Serial,
  /// Scalar text, or the decimal serial of the referenced contact for
  /// reference predicates.
  pub value:            String,
  pub note:             Option<String>,
  /// Start of the validity interval, as a date serial.
  pub date_begin:       Option<Serial>,
  /// End of the validity interval, as a date serial.
  pub date_end:         Option<Serial>,
  pub is_valid:         bool,
}

impl Fact {
  /// Convenience constructor with all optional fields unset.
  pub fn new(
    serial: Serial,
    predicate_serial: Serial,
    subject_serial: Serial,
    value: impl Into<String>,
  ) -> Self {
    Self {
      serial,
      predicate_serial,
      subject_serial,
      value: value.into(),
      note: None,
      date_begin: None,
      date_end: None,
      is_valid: true,
    }
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    self.note = Some(note.into());
    self
  }

  pub fn with_validity(
    mut self,
    date_begin: Option<Serial>,
    date_end: Option<Serial>,
  ) -> Self {
    self.date_begin = date_begin;
    self.date_end = date_end;
    self
  }

  /// The same fact, marked as no longer valid.
  pub fn invalidated(&self) -> Self {
    Self { is_valid: false, ..self.clone() }
  }

  /// Whether `self` may replace `committed` under the same serial: only the
  /// validity flag may change, and only from valid to invalid.
  pub fn is_retraction_of(&self, committed: &Fact) -> bool {
    !self.is_valid && *self == committed.invalidated()
  }
}
