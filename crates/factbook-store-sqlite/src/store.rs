//! [`SqliteStore`]: the SQLite implementation of [`RevisionStore`].

use std::{collections::BTreeMap, path::Path};

use factbook_core::{
  Serial,
  revision::{Changes, Revision},
  store::RevisionStore,
};

use crate::{
  Error, Result,
  encode::{
    RawDate, RawFact, RawRevision, decode_serial, decode_ts, encode_serial, encode_ts,
  },
  schema::SCHEMA,
  settings::StoreConfig,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Factbook revision store backed by a single SQLite file.
///
/// Clones share one background connection.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a fresh in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open the store described by `config`, creating the parent directory
  /// and applying the configured journal mode.
  #[tracing::instrument(skip_all, fields(path = %config.path.display()))]
  pub async fn open_with_config(config: &StoreConfig) -> Result<Self> {
    let path = config.resolved_path();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent).await?;
    }

    let store = Self::open(&path).await?;
    let mode = config.journal_mode.as_str();
    let applied: String = store
      .conn
      .call(move |conn| {
        let applied = conn.pragma_update_and_check(None, "journal_mode", mode, |row| {
          row.get::<_, String>(0)
        })?;
        Ok(applied)
      })
      .await?;
    tracing::debug!(requested = mode, %applied, "journal mode set");
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RevisionStore impl ──────────────────────────────────────────────────────

impl RevisionStore for SqliteStore {
  type Error = Error;

  #[tracing::instrument(skip(self))]
  async fn load_revisions(&self) -> Result<Vec<Revision>> {
    let (raw_revisions, raw_dates, raw_facts) = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT serial, timestamp, comment FROM revisions ORDER BY serial",
        )?;
        let revisions = stmt
          .query_map([], |row| {
            Ok(RawRevision {
              serial:    row.get(0)?,
              timestamp: row.get(1)?,
              comment:   row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn
          .prepare("SELECT serial, revision, date FROM dates ORDER BY revision, serial")?;
        let dates = stmt
          .query_map([], |row| {
            Ok(RawDate {
              serial:   row.get(0)?,
              revision: row.get(1)?,
              date:     row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT serial, revision, predicate, subject, value, note,
                  date_begin, date_end, is_valid
           FROM facts ORDER BY revision, serial",
        )?;
        let facts = stmt
          .query_map([], |row| {
            Ok(RawFact {
              serial:     row.get(0)?,
              revision:   row.get(1)?,
              predicate:  row.get(2)?,
              subject:    row.get(3)?,
              value:      row.get(4)?,
              note:       row.get(5)?,
              date_begin: row.get(6)?,
              date_end:   row.get(7)?,
              is_valid:   row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((revisions, dates, facts))
      })
      .await?;

    let mut revisions: BTreeMap<Serial, Revision> = BTreeMap::new();
    for raw in raw_revisions {
      let serial = decode_serial(raw.serial)?;
      revisions.insert(serial, Revision {
        serial,
        timestamp: decode_ts(raw.timestamp)?,
        comment: raw.comment,
        changes: Changes::new(),
      });
    }

    for raw in raw_dates {
      let (revision, serial, date) = raw.decode()?;
      let target = revisions.get_mut(&revision).ok_or_else(|| {
        Error::Corrupt(format!("date {serial} belongs to unknown revision {revision}"))
      })?;
      target.changes.dates.insert(serial, date);
    }

    for raw in raw_facts {
      let (revision, fact) = raw.decode()?;
      let serial = fact.serial;
      let target = revisions.get_mut(&revision).ok_or_else(|| {
        Error::Corrupt(format!("fact {serial} belongs to unknown revision {revision}"))
      })?;
      target.changes.facts.insert(serial, fact);
    }

    tracing::debug!(count = revisions.len(), "revisions loaded");
    Ok(revisions.into_values().collect())
  }

  #[tracing::instrument(skip_all, fields(serial = revision.serial))]
  async fn persist_revision(&self, revision: &Revision) -> Result<()> {
    let header = RawRevision {
      serial:    encode_serial(revision.serial)?,
      timestamp: encode_ts(revision.timestamp),
      comment:   revision.comment.clone(),
    };
    let dates = revision
      .changes
      .dates
      .iter()
      .map(|(serial, date)| RawDate::encode(revision.serial, *serial, date))
      .collect::<Result<Vec<_>>>()?;
    let facts = revision
      .changes
      .facts
      .values()
      .map(|fact| RawFact::encode(revision.serial, fact))
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO revisions (serial, timestamp, comment) VALUES (?1, ?2, ?3)",
          rusqlite::params![header.serial, header.timestamp, header.comment],
        )?;
        {
          let mut stmt = tx
            .prepare("INSERT INTO dates (serial, revision, date) VALUES (?1, ?2, ?3)")?;
          for date in &dates {
            stmt.execute(rusqlite::params![date.serial, date.revision, date.date])?;
          }

          let mut stmt = tx.prepare(
            "INSERT INTO facts (
               serial, revision, predicate, subject, value, note,
               date_begin, date_end, is_valid
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          )?;
          for fact in &facts {
            stmt.execute(rusqlite::params![
              fact.serial,
              fact.revision,
              fact.predicate,
              fact.subject,
              fact.value,
              fact.note,
              fact.date_begin,
              fact.date_end,
              fact.is_valid,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!("revision persisted");
    Ok(())
  }
}
