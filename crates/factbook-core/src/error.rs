//! Error types for `factbook-core`.

use thiserror::Error;

use crate::{
  Serial,
  contact::{ContactId, ContactType},
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot parse {kind} from {input:?}")]
  Parse { kind: &'static str, input: String },

  #[error("contact not found: {0}")]
  ContactNotFound(ContactId),

  #[error("revision not found: {0}")]
  RevisionNotFound(Serial),

  #[error("fact not found: {0}")]
  FactNotFound(Serial),

  #[error("unknown contact type: {0:?}")]
  UnknownType(String),

  #[error("unknown attribute {attribute:?} on {contact_type}")]
  UnknownAttribute {
    contact_type: ContactType,
    attribute:    String,
  },

  #[error("unknown predicate: {0}")]
  UnknownPredicate(Serial),

  #[error("fact {fact} holds a malformed reference: {value:?}")]
  MalformedReference { fact: Serial, value: String },

  #[error("duplicate key: {0}")]
  DuplicateKey(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn parse(kind: &'static str, input: impl Into<String>) -> Self {
    Self::Parse { kind, input: input.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
