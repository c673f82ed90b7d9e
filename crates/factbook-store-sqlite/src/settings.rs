//! Store configuration.
//!
//! Read from an optional TOML file and `FACTBOOK_*` environment variables,
//! the latter taking precedence:
//!
//! ```toml
//! path         = "~/.local/share/factbook/contacts.db"
//! journal_mode = "wal"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

const DEFAULT_PATH: &str = "~/.local/share/factbook/contacts.db";

/// SQLite journal mode applied when the store is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
  Delete,
  Truncate,
  Persist,
  Memory,
  #[default]
  Wal,
  Off,
}

impl JournalMode {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Delete => "delete",
      Self::Truncate => "truncate",
      Self::Persist => "persist",
      Self::Memory => "memory",
      Self::Wal => "wal",
      Self::Off => "off",
    }
  }
}

/// Where and how to open the SQLite store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
  #[serde(default = "default_path")]
  pub path:         PathBuf,
  #[serde(default)]
  pub journal_mode: JournalMode,
}

fn default_path() -> PathBuf { PathBuf::from(DEFAULT_PATH) }

impl Default for StoreConfig {
  fn default() -> Self {
    Self { path: default_path(), journal_mode: JournalMode::default() }
  }
}

impl StoreConfig {
  /// Load from `file` (if given and present) and the environment.
  pub fn load(file: Option<&Path>) -> Result<Self> { Self::load_from(file, None) }

  /// As [`Self::load`], reading `FACTBOOK_*` variables from `env` instead of
  /// the process environment when given.
  fn load_from(
    file: Option<&Path>,
    env: Option<config::Map<String, String>>,
  ) -> Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(file) = file {
      builder =
        builder.add_source(config::File::from(file.to_path_buf()).required(false));
    }
    let settings = builder
      .add_source(config::Environment::with_prefix("FACTBOOK").source(env))
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  /// `path` with a leading `~/` expanded to the user's home directory.
  pub fn resolved_path(&self) -> PathBuf { expand_tilde(&self.path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
