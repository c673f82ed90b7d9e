//! SQL schema for the Factbook SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS revisions (
    serial    INTEGER PRIMARY KEY,
    timestamp INTEGER NOT NULL,   -- Unix seconds, UTC
    comment   TEXT    NOT NULL
);

-- Rows are strictly append-only.
-- A serial may reappear in a later revision (retractions), never twice in one.
CREATE TABLE IF NOT EXISTS dates (
    serial   INTEGER NOT NULL,
    revision INTEGER NOT NULL REFERENCES revisions(serial),
    date     TEXT    NOT NULL,    -- canonical VagueDate text
    PRIMARY KEY (serial, revision)
);

CREATE TABLE IF NOT EXISTS facts (
    serial     INTEGER NOT NULL,
    revision   INTEGER NOT NULL REFERENCES revisions(serial),
    predicate  INTEGER NOT NULL,
    subject    INTEGER NOT NULL,
    value      TEXT    NOT NULL,
    note       TEXT,
    date_begin INTEGER,           -- date serial or NULL
    date_end   INTEGER,           -- date serial or NULL
    is_valid   INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (serial, revision)
);

CREATE INDEX IF NOT EXISTS dates_revision_idx ON dates(revision);
CREATE INDEX IF NOT EXISTS facts_revision_idx ON facts(revision);

PRAGMA user_version = 1;
";
