//! The metamodel: predicates and the attributes derived from them.
//!
//! A [`Predicate`] is an immutable schema entry naming one kind of fact. The
//! [`Schema`] is built once from a predicate table and shared by reference;
//! every predicate yields a forward [`Attribute`] on its subject type, and
//! every [`ValueType::Ref`] predicate yields a back-attribute on its target
//! type.

use std::collections::BTreeMap;

use ContactType::{Address, Company, Person};
use ValueType::{Date, EMail, PhoneNumber, Str, Text, Url};

use crate::{Error, Result, Serial, contact::ContactType, vague_date::VagueDate};

// ─── Value types ─────────────────────────────────────────────────────────────

/// The kind of value a fact carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
  /// Single-line text.
  Str,
  /// Multi-line text.
  Text,
  /// A [`VagueDate`] in canonical form.
  Date,
  EMail,
  PhoneNumber,
  Url,
  /// The serial of another contact, encoded as decimal text.
  Ref {
    target:         ContactType,
    /// Name under which the relation appears on the target type.
    back_attribute: &'static str,
  },
}

impl ValueType {
  pub fn is_ref(&self) -> bool { matches!(self, Self::Ref { .. }) }
}

/// Decode the serial stored in a reference value. Empty text and `0` mean
/// "unset".
pub fn decode_ref(fact: Serial, value: &str) -> Result<Option<Serial>> {
  if value.is_empty() {
    return Ok(None);
  }
  match value.parse::<Serial>() {
    Ok(0) => Ok(None),
    Ok(serial) => Ok(Some(serial)),
    Err(_) => Err(Error::MalformedReference { fact, value: value.to_owned() }),
  }
}

// ─── Predicates and attributes ───────────────────────────────────────────────

/// One fixed schema entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Predicate {
  pub serial:        Serial,
  pub subject_class: ContactType,
  pub name:          &'static str,
  pub value_type:    ValueType,
}

impl Predicate {
  pub const fn new(
    serial: Serial,
    subject_class: ContactType,
    name: &'static str,
    value_type: ValueType,
  ) -> Self {
    Self { serial, subject_class, name, value_type }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Forward,
  Back,
}

/// A named, typed slot on a contact type.
///
/// Back-attributes are typed as a reference to the predicate's subject type,
/// with the forward name as their own back-attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
  pub name:             &'static str,
  pub value_type:       ValueType,
  pub predicate_serial: Serial,
  pub direction:        Direction,
}

#[derive(Debug, Clone, Default)]
struct TypeSchema {
  attributes:      Vec<Attribute>,
  back_attributes: Vec<Attribute>,
}

impl TypeSchema {
  fn find(&self, name: &str) -> Option<&Attribute> {
    self
      .attributes
      .iter()
      .chain(&self.back_attributes)
      .find(|a| a.name == name)
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// The immutable metamodel.
#[derive(Debug, Clone)]
pub struct Schema {
  predicates: BTreeMap<Serial, Predicate>,
  types:      BTreeMap<ContactType, TypeSchema>,
}

impl Schema {
  /// Build a schema from a predicate table.
  ///
  /// Fails with [`Error::DuplicateKey`] on a repeated predicate serial or an
  /// attribute name used twice on one contact type. A self-referencing `Ref`
  /// whose back name equals its own name is a symmetric relation and
  /// registers a single attribute.
  pub fn new(predicates: impl IntoIterator<Item = Predicate>) -> Result<Self> {
    let mut schema = Self { predicates: BTreeMap::new(), types: BTreeMap::new() };

    for p in predicates {
      if schema.predicates.insert(p.serial, p).is_some() {
        return Err(Error::DuplicateKey(format!("predicate {}", p.serial)));
      }

      schema.register(p.subject_class, Attribute {
        name:             p.name,
        value_type:       p.value_type,
        predicate_serial: p.serial,
        direction:        Direction::Forward,
      })?;

      if let ValueType::Ref { target, back_attribute } = p.value_type {
        if target == p.subject_class && back_attribute == p.name {
          continue;
        }
        schema.register(target, Attribute {
          name:             back_attribute,
          value_type:       ValueType::Ref {
            target:         p.subject_class,
            back_attribute: p.name,
          },
          predicate_serial: p.serial,
          direction:        Direction::Back,
        })?;
      }
    }

    Ok(schema)
  }

  /// The built-in predicate table for persons, companies and addresses.
  pub fn standard() -> Self {
    Self::new(STANDARD_PREDICATES.iter().copied())
      .expect("built-in predicate table is consistent")
  }

  fn register(&mut self, ty: ContactType, attribute: Attribute) -> Result<()> {
    let entry = self.types.entry(ty).or_default();
    if entry.find(attribute.name).is_some() {
      return Err(Error::DuplicateKey(format!(
        "attribute {:?} on {ty}",
        attribute.name
      )));
    }
    match attribute.direction {
      Direction::Forward => entry.attributes.push(attribute),
      Direction::Back => entry.back_attributes.push(attribute),
    }
    Ok(())
  }

  /// Whether any predicate mentions `ty` as subject or target.
  pub fn contains_type(&self, ty: ContactType) -> bool {
    self.types.contains_key(&ty)
  }

  pub fn predicate(&self, serial: Serial) -> Result<&Predicate> {
    self
      .predicates
      .get(&serial)
      .ok_or(Error::UnknownPredicate(serial))
  }

  pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
    self.predicates.values()
  }

  /// Forward attributes of `ty`, in predicate order.
  pub fn attributes(&self, ty: ContactType) -> &[Attribute] {
    self
      .types
      .get(&ty)
      .map(|t| t.attributes.as_slice())
      .unwrap_or_default()
  }

  /// Back-attributes of `ty`, in predicate order.
  pub fn back_attributes(&self, ty: ContactType) -> &[Attribute] {
    self
      .types
      .get(&ty)
      .map(|t| t.back_attributes.as_slice())
      .unwrap_or_default()
  }

  /// Look up an attribute by name, forward attributes first.
  pub fn get_attribute(&self, ty: ContactType, name: &str) -> Result<&Attribute> {
    self
      .types
      .get(&ty)
      .and_then(|t| t.find(name))
      .ok_or_else(|| Error::UnknownAttribute {
        contact_type: ty,
        attribute:    name.to_owned(),
      })
  }

  /// Check that `value` is acceptable for a fact of `predicate`.
  pub fn validate_value(&self, predicate: &Predicate, value: &str) -> Result<()> {
    match predicate.value_type {
      ValueType::Date => value.parse::<VagueDate>().map(drop),
      ValueType::Ref { .. } => decode_ref(0, value).map(drop),
      ValueType::Str
      | ValueType::Text
      | ValueType::EMail
      | ValueType::PhoneNumber
      | ValueType::Url => Ok(()),
    }
  }
}

// ─── Built-in table ──────────────────────────────────────────────────────────

const fn reference(target: ContactType, back_attribute: &'static str) -> ValueType {
  ValueType::Ref { target, back_attribute }
}

pub const STANDARD_PREDICATES: &[Predicate] = &[
  Predicate::new(1, Person, "lastname", Str),
  Predicate::new(2, Person, "firstname", Str),
  Predicate::new(3, Person, "nickname", Str),
  Predicate::new(4, Person, "birthday", Date),
  Predicate::new(5, Person, "gender", Str),
  Predicate::new(6, Person, "email", EMail),
  Predicate::new(7, Person, "phone", PhoneNumber),
  Predicate::new(8, Person, "mobile", PhoneNumber),
  Predicate::new(9, Person, "homepage", Url),
  Predicate::new(10, Person, "company", reference(Company, "employee")),
  Predicate::new(11, Person, "position", Str),
  Predicate::new(12, Person, "address", reference(Address, "resident")),
  Predicate::new(13, Person, "partner", reference(Person, "partner")),
  Predicate::new(14, Person, "parent", reference(Person, "child")),
  Predicate::new(15, Person, "keywords", Str),
  Predicate::new(16, Person, "notes", Text),
  Predicate::new(17, Company, "name", Str),
  Predicate::new(18, Company, "email", EMail),
  Predicate::new(19, Company, "phone", PhoneNumber),
  Predicate::new(20, Company, "fax", PhoneNumber),
  Predicate::new(21, Company, "homepage", Url),
  Predicate::new(22, Company, "address", reference(Address, "company")),
  Predicate::new(23, Company, "parent_company", reference(Company, "subsidiary")),
  Predicate::new(24, Company, "keywords", Str),
  Predicate::new(25, Company, "notes", Text),
  Predicate::new(26, Address, "street", Str),
  Predicate::new(27, Address, "postcode", Str),
  Predicate::new(28, Address, "city", Str),
  Predicate::new(29, Address, "country", Str),
  Predicate::new(30, Address, "phone", PhoneNumber),
];
