//! Contacts: typed entities materialised from facts.
//!
//! A contact holds no state of its own beyond its identity. Everything else
//! is the facts recorded under its attribute names, both forward facts (where
//! the contact is the subject) and back-facts (where another contact refers to
//! it).

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  Error, Result, Serial,
  fact::Fact,
  schema::{Attribute, Schema},
};

// ─── ContactType ─────────────────────────────────────────────────────────────

/// The kind of entity a contact represents. Declaration order is the sort
/// order of [`ContactId`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContactType {
  Person,
  Company,
  Address,
}

impl ContactType {
  /// Parse a type name, reporting [`Error::UnknownType`] on failure.
  pub fn from_name(name: &str) -> Result<Self> {
    name
      .parse()
      .map_err(|_| Error::UnknownType(name.to_owned()))
  }
}

// ─── ContactId ───────────────────────────────────────────────────────────────

/// Stable identity of a contact, ordered by type and then serial. Rendered as
/// the type name followed by the serial, e.g. `person7`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
pub struct ContactId {
  pub contact_type: ContactType,
  pub serial:       Serial,
}

impl ContactId {
  pub fn new(contact_type: ContactType, serial: Serial) -> Self {
    Self { contact_type, serial }
  }
}

impl fmt::Display for ContactId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", self.contact_type, self.serial)
  }
}

impl FromStr for ContactId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let split = s
      .find(|c: char| c.is_ascii_digit())
      .ok_or_else(|| Error::parse("contact id", s))?;
    let (name, digits) = s.split_at(split);
    let contact_type: ContactType =
      name.parse().map_err(|_| Error::parse("contact id", s))?;
    let serial: Serial =
      digits.parse().map_err(|_| Error::parse("contact id", s))?;
    Ok(Self { contact_type, serial })
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// A materialised contact: its identity plus the facts filed under each
/// attribute name, in insertion (fact serial) order.
#[derive(Debug, Clone)]
pub struct Contact {
  id:     ContactId,
  schema: Arc<Schema>,
  facts:  BTreeMap<&'static str, Vec<Fact>>,
}

impl Contact {
  pub fn new(schema: Arc<Schema>, id: ContactId) -> Self {
    Self { id, schema, facts: BTreeMap::new() }
  }

  pub fn id(&self) -> ContactId { self.id }

  pub fn contact_type(&self) -> ContactType { self.id.contact_type }

  pub fn serial(&self) -> Serial { self.id.serial }

  pub(crate) fn push_fact(&mut self, attribute: &'static str, fact: Fact) {
    self.facts.entry(attribute).or_default().push(fact);
  }

  /// `true` when no fact is filed under any attribute.
  pub fn is_empty(&self) -> bool { self.facts.values().all(Vec::is_empty) }

  /// Forward attributes of this contact's type.
  pub fn iter_attributes(&self) -> impl Iterator<Item = &Attribute> {
    self.schema.attributes(self.contact_type()).iter()
  }

  /// Back-attributes of this contact's type.
  pub fn iter_back_attributes(&self) -> impl Iterator<Item = &Attribute> {
    self.schema.back_attributes(self.contact_type()).iter()
  }

  /// Facts under `attribute`. An attribute the type knows but that holds no
  /// facts yields an empty slice.
  pub fn get_facts(&self, attribute: &str) -> Result<&[Fact]> {
    let attribute = self.schema.get_attribute(self.contact_type(), attribute)?;
    Ok(
      self
        .facts
        .get(attribute.name)
        .map(Vec::as_slice)
        .unwrap_or_default(),
    )
  }

  /// Raw value of the first fact under a forward `attribute`, if any.
  pub fn first_value(&self, attribute: &str) -> Option<&str> {
    self
      .facts
      .get(attribute)
      .and_then(|facts| facts.first())
      .map(|f| f.value.as_str())
  }

  /// Type-specific display string; `#serial` when the relevant facts are
  /// missing.
  pub fn title(&self) -> String {
    let parts: Vec<&str> = match self.contact_type() {
      ContactType::Person => ["firstname", "lastname"]
        .iter()
        .filter_map(|a| self.first_value(a))
        .filter(|v| !v.is_empty())
        .collect(),
      ContactType::Company => self
        .first_value("name")
        .filter(|v| !v.is_empty())
        .into_iter()
        .collect(),
      ContactType::Address => ["street", "city", "phone"]
        .iter()
        .filter_map(|a| self.first_value(a))
        .filter(|v| !v.is_empty())
        .collect(),
    };

    if parts.is_empty() {
      return format!("#{}", self.serial());
    }
    let separator = match self.contact_type() {
      ContactType::Address => ", ",
      ContactType::Person | ContactType::Company => " ",
    };
    parts.join(separator)
  }
}
