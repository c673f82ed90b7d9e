//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Serials are stored as `INTEGER` (SQLite's signed 64-bit), timestamps as
//! Unix seconds, dates as canonical VagueDate text and `is_valid` as 0/1.

use chrono::{DateTime, Utc};
use factbook_core::{Serial, fact::Fact, vague_date::VagueDate};

use crate::{Error, Result};

// ─── Serial ──────────────────────────────────────────────────────────────────

pub fn encode_serial(serial: Serial) -> Result<i64> {
  i64::try_from(serial)
    .map_err(|_| Error::Corrupt(format!("serial {serial} exceeds INTEGER range")))
}

pub fn decode_serial(value: i64) -> Result<Serial> {
  Serial::try_from(value)
    .map_err(|_| Error::Corrupt(format!("negative serial {value}")))
}

fn encode_opt_serial(serial: Option<Serial>) -> Result<Option<i64>> {
  serial.map(encode_serial).transpose()
}

fn decode_opt_serial(value: Option<i64>) -> Result<Option<Serial>> {
  value.map(decode_serial).transpose()
}

// ─── Timestamp ───────────────────────────────────────────────────────────────

pub fn encode_ts(ts: DateTime<Utc>) -> i64 { ts.timestamp() }

pub fn decode_ts(secs: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp(secs, 0)
    .ok_or_else(|| Error::Corrupt(format!("timestamp out of range: {secs}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from or written to a `revisions` row.
pub struct RawRevision {
  pub serial:    i64,
  pub timestamp: i64,
  pub comment:   String,
}

/// Raw values read from or written to a `dates` row.
pub struct RawDate {
  pub serial:   i64,
  pub revision: i64,
  pub date:     String,
}

impl RawDate {
  pub fn encode(revision: Serial, serial: Serial, date: &VagueDate) -> Result<Self> {
    Ok(Self {
      serial:   encode_serial(serial)?,
      revision: encode_serial(revision)?,
      date:     date.to_string(),
    })
  }

  /// Decode into `(revision, serial, date)`.
  pub fn decode(self) -> Result<(Serial, Serial, VagueDate)> {
    Ok((
      decode_serial(self.revision)?,
      decode_serial(self.serial)?,
      self.date.parse()?,
    ))
  }
}

/// Raw values read from or written to a `facts` row.
pub struct RawFact {
  pub serial:     i64,
  pub revision:   i64,
  pub predicate:  i64,
  pub subject:    i64,
  pub value:      String,
  pub note:       Option<String>,
  pub date_begin: Option<i64>,
  pub date_end:   Option<i64>,
  pub is_valid:   bool,
}

impl RawFact {
  pub fn encode(revision: Serial, fact: &Fact) -> Result<Self> {
    Ok(Self {
      serial:     encode_serial(fact.serial)?,
      revision:   encode_serial(revision)?,
      predicate:  encode_serial(fact.predicate_serial)?,
      subject:    encode_serial(fact.subject_serial)?,
      value:      fact.value.clone(),
      note:       fact.note.clone(),
      date_begin: encode_opt_serial(fact.date_begin)?,
      date_end:   encode_opt_serial(fact.date_end)?,
      is_valid:   fact.is_valid,
    })
  }

  /// Decode into `(revision, fact)`.
  pub fn decode(self) -> Result<(Serial, Fact)> {
    let fact = Fact {
      serial:           decode_serial(self.serial)?,
      predicate_serial: decode_serial(self.predicate)?,
      subject_serial:   decode_serial(self.subject)?,
      value:            self.value,
      note:             self.note,
      date_begin:       decode_opt_serial(self.date_begin)?,
      date_end:         decode_opt_serial(self.date_end)?,
      is_valid:         self.is_valid,
    };
    Ok((decode_serial(self.revision)?, fact))
  }
}
