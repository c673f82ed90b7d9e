//! [`ContactModel`]: the live, materialised view over the fact log.
//!
//! The model keeps the committed baseline and a staging area of uncommitted
//! dates and facts. Whenever either changes, the contact index is rebuilt from
//! their union, replaying facts in serial order so that the result does not
//! depend on map iteration order.

use std::{
  collections::{BTreeMap, btree_map::Entry},
  sync::Arc,
};

use tracing::debug;

use crate::{
  Error, Result, Serial,
  contact::{Contact, ContactId, ContactType},
  fact::Fact,
  repository::Repository,
  revision::{Changes, Revision},
  schema::{Direction, Schema, ValueType, decode_ref},
  store::RevisionStore,
  vague_date::VagueDate,
};

// ─── Query ───────────────────────────────────────────────────────────────────

/// Parameters for [`ContactModel::search`].
#[derive(Debug, Clone, Default)]
pub struct ContactQuery {
  /// Case-insensitive keyword matched against titles and fact values.
  pub text:         Option<String>,
  pub contact_type: Option<ContactType>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

// ─── Model ───────────────────────────────────────────────────────────────────

struct Index {
  contacts:    BTreeMap<ContactId, Contact>,
  last_serial: BTreeMap<ContactType, Serial>,
  last_fact:   Serial,
  last_date:   Serial,
}

#[derive(Debug)]
pub struct ContactModel {
  schema:           Arc<Schema>,
  baseline:         Changes,
  staged:           Changes,
  /// `baseline` with `staged` merged on top.
  universe:         Changes,
  contacts:         BTreeMap<ContactId, Contact>,
  last_serial_map:  BTreeMap<ContactType, Serial>,
  last_fact_serial: Serial,
  last_date_serial: Serial,
}

impl ContactModel {
  pub fn new(schema: Arc<Schema>) -> Self {
    Self {
      schema,
      baseline: Changes::new(),
      staged: Changes::new(),
      universe: Changes::new(),
      contacts: BTreeMap::new(),
      last_serial_map: BTreeMap::new(),
      last_fact_serial: 0,
      last_date_serial: 0,
    }
  }

  /// Build a model over committed `changes`.
  pub fn load(schema: Arc<Schema>, changes: Changes) -> Result<Self> {
    let mut model = Self::new(schema);
    model.rebuild(changes)?;
    Ok(model)
  }

  /// Build a model over the whole history of `repository`.
  pub fn from_repository<S: RevisionStore>(
    schema: Arc<Schema>,
    repository: &Repository<S>,
  ) -> Result<Self> {
    Self::load(schema, repository.aggregate_revisions(..))
  }

  pub fn schema(&self) -> &Arc<Schema> { &self.schema }

  // ── Materialisation ─────────────────────────────────────────────────────

  /// Replace the committed baseline and rebuild the index. Staged changes
  /// stay layered on top.
  pub fn rebuild(&mut self, changes: Changes) -> Result<()> {
    let mut universe = changes.clone();
    universe.merge(self.staged.clone());
    self.install(universe)?;
    self.baseline = changes;
    Ok(())
  }

  /// Materialise `universe` and swap it in. Nothing changes on error.
  fn install(&mut self, universe: Changes) -> Result<()> {
    let index = self.materialise(&universe)?;
    debug!(
      contacts = index.contacts.len(),
      facts = universe.facts.len(),
      dates = universe.dates.len(),
      "rebuilt contact index"
    );
    self.contacts = index.contacts;
    for (ty, serial) in index.last_serial {
      let last = self.last_serial_map.entry(ty).or_default();
      *last = (*last).max(serial);
    }
    self.last_fact_serial = self.last_fact_serial.max(index.last_fact);
    self.last_date_serial = self.last_date_serial.max(index.last_date);
    self.universe = universe;
    Ok(())
  }

  fn materialise(&self, universe: &Changes) -> Result<Index> {
    let mut contacts: BTreeMap<ContactId, Contact> = BTreeMap::new();
    let mut last_serial: BTreeMap<ContactType, Serial> = BTreeMap::new();

    let mut file = |id: ContactId, attribute: Option<(&'static str, &Fact)>| {
      let last = last_serial.entry(id.contact_type).or_default();
      *last = (*last).max(id.serial);
      let contact = match contacts.entry(id) {
        Entry::Occupied(e) => e.into_mut(),
        Entry::Vacant(e) => e.insert(Contact::new(self.schema.clone(), id)),
      };
      if let Some((name, fact)) = attribute {
        contact.push_fact(name, fact.clone());
      }
    };

    for fact in universe.facts.values() {
      let predicate = self.schema.predicate(fact.predicate_serial)?;
      let subject = ContactId::new(predicate.subject_class, fact.subject_serial);
      file(subject, fact.is_valid.then_some((predicate.name, fact)));

      if let ValueType::Ref { target, back_attribute } = predicate.value_type
        && let Some(serial) = decode_ref(fact.serial, &fact.value)?
      {
        let object = ContactId::new(target, serial);
        let symmetric = back_attribute == predicate.name;
        let filed = fact.is_valid && !(symmetric && object == subject);
        file(object, filed.then_some((back_attribute, fact)));
      }
    }

    Ok(Index {
      contacts,
      last_serial,
      last_fact: universe.facts.keys().next_back().copied().unwrap_or(0),
      last_date: universe.dates.keys().next_back().copied().unwrap_or(0),
    })
  }

  // ── Lookup ──────────────────────────────────────────────────────────────

  pub fn get(&self, id: ContactId) -> Result<&Contact> {
    self.contacts.get(&id).ok_or(Error::ContactNotFound(id))
  }

  pub fn contains(&self, id: ContactId) -> bool { self.contacts.contains_key(&id) }

  /// Every materialised contact, in id order.
  pub fn iter_objects(&self) -> impl Iterator<Item = &Contact> {
    self.contacts.values()
  }

  /// A fact by serial, staged or committed.
  pub fn get_fact(&self, serial: Serial) -> Result<&Fact> {
    self
      .universe
      .facts
      .get(&serial)
      .ok_or(Error::FactNotFound(serial))
  }

  pub fn get_date(&self, serial: Serial) -> Option<&VagueDate> {
    self.universe.dates.get(&serial)
  }

  /// Valid facts whose reference points at `contact`. Scans every fact.
  pub fn iter_back_facts<'a>(
    &'a self,
    contact: &'a Contact,
  ) -> impl Iterator<Item = &'a Fact> + 'a {
    self.universe.facts.values().filter(move |fact| {
      if !fact.is_valid {
        return false;
      }
      let Ok(predicate) = self.schema.predicate(fact.predicate_serial) else {
        return false;
      };
      match predicate.value_type {
        ValueType::Ref { target, .. } => {
          target == contact.contact_type()
            && matches!(
              decode_ref(fact.serial, &fact.value),
              Ok(Some(serial)) if serial == contact.serial()
            )
        }
        _ => false,
      }
    })
  }

  /// Display value of a fact: the referenced contact's title for
  /// references (empty when unset), the raw text otherwise.
  pub fn get_fact_value(&self, fact: &Fact) -> Result<String> {
    match self.get_fact_object(fact)? {
      Some(object) => Ok(object.title()),
      None if self.is_ref(fact)? => Ok(String::new()),
      None => Ok(fact.value.clone()),
    }
  }

  pub fn get_fact_subject(&self, fact: &Fact) -> Result<&Contact> {
    let predicate = self.schema.predicate(fact.predicate_serial)?;
    self.get(ContactId::new(predicate.subject_class, fact.subject_serial))
  }

  /// The contact a reference fact points at; `None` for scalar facts and
  /// unset references.
  pub fn get_fact_object(&self, fact: &Fact) -> Result<Option<&Contact>> {
    let predicate = self.schema.predicate(fact.predicate_serial)?;
    let ValueType::Ref { target, .. } = predicate.value_type else {
      return Ok(None);
    };
    match decode_ref(fact.serial, &fact.value)? {
      Some(serial) => self.get(ContactId::new(target, serial)).map(Some),
      None => Ok(None),
    }
  }

  fn is_ref(&self, fact: &Fact) -> Result<bool> {
    Ok(self.schema.predicate(fact.predicate_serial)?.value_type.is_ref())
  }

  /// Contacts matching `query`, sorted by title and then id.
  pub fn search(&self, query: &ContactQuery) -> Vec<&Contact> {
    let needle = query.text.as_deref().map(str::to_lowercase);

    let mut hits: Vec<(String, &Contact)> = self
      .contacts
      .values()
      .filter(|c| query.contact_type.is_none_or(|ty| ty == c.contact_type()))
      .map(|c| (c.title(), c))
      .filter(|(title, c)| match &needle {
        None => true,
        Some(needle) => {
          title.to_lowercase().contains(needle.as_str())
            || self.forward_values(c).any(|v| v.to_lowercase().contains(needle.as_str()))
        }
      })
      .collect();

    hits.sort_by(|(ta, a), (tb, b)| {
      ta.to_lowercase()
        .cmp(&tb.to_lowercase())
        .then_with(|| a.id().cmp(&b.id()))
    });

    hits
      .into_iter()
      .map(|(_, c)| c)
      .skip(query.offset.unwrap_or(0))
      .take(query.limit.unwrap_or(usize::MAX))
      .collect()
  }

  fn forward_values<'a>(
    &'a self,
    contact: &'a Contact,
  ) -> impl Iterator<Item = String> + 'a {
    contact
      .iter_attributes()
      .flat_map(|a| contact.get_facts(a.name).unwrap_or(&[]))
      .filter_map(|f| self.get_fact_value(f).ok())
  }

  // ── Allocation ──────────────────────────────────────────────────────────

  /// A new, empty contact under the next free serial of `contact_type`. It
  /// enters the index once a fact mentions it.
  pub fn create_contact(&mut self, contact_type: ContactType) -> Result<Contact> {
    if !self.schema.contains_type(contact_type) {
      return Err(Error::UnknownType(contact_type.to_string()));
    }
    let last = self.last_serial_map.entry(contact_type).or_default();
    *last += 1;
    Ok(Contact::new(
      self.schema.clone(),
      ContactId::new(contact_type, *last),
    ))
  }

  pub fn create_fact_serial(&mut self) -> Serial {
    self.last_fact_serial += 1;
    self.last_fact_serial
  }

  pub fn create_date_serial(&mut self) -> Serial {
    self.last_date_serial += 1;
    self.last_date_serial
  }

  // ── Staging ─────────────────────────────────────────────────────────────

  /// Stage `changes` and rebuild. Nothing is staged if `changes` could not
  /// be committed on top of the baseline or if the rebuild fails.
  pub fn add_changes(&mut self, changes: Changes) -> Result<()> {
    changes.check_appendable(&self.baseline)?;
    let mut staged = self.staged.clone();
    staged.merge(changes);
    let mut universe = self.baseline.clone();
    universe.merge(staged.clone());
    self.install(universe)?;
    self.staged = staged;
    Ok(())
  }

  pub fn exists_uncommitted_changes(&self) -> bool { !self.staged.is_empty() }

  pub fn uncommitted_changes(&self) -> &Changes { &self.staged }

  /// Drop every staged change and rebuild from the committed baseline.
  /// Serial counters are not rewound.
  pub fn discard_changes(&mut self) -> Result<()> {
    self.install(self.baseline.clone())?;
    self.staged = Changes::new();
    Ok(())
  }

  /// Build a new fact for a forward `attribute` of `contact`, validating the
  /// value and allocating a fresh serial. The fact is not staged.
  pub fn new_fact(
    &mut self,
    contact: ContactId,
    attribute: &str,
    value: impl Into<String>,
  ) -> Result<Fact> {
    let value = value.into();
    let attribute = self.schema.get_attribute(contact.contact_type, attribute)?;
    if attribute.direction == Direction::Back {
      return Err(Error::UnknownAttribute {
        contact_type: contact.contact_type,
        attribute:    attribute.name.to_owned(),
      });
    }
    let predicate = self.schema.predicate(attribute.predicate_serial)?;
    self.schema.validate_value(predicate, &value)?;
    let predicate_serial = predicate.serial;
    Ok(Fact::new(
      self.create_fact_serial(),
      predicate_serial,
      contact.serial,
      value,
    ))
  }

  /// Stage a fact under a serial not yet known to the model.
  pub fn stage_fact(&mut self, fact: Fact) -> Result<()> {
    if self.universe.facts.contains_key(&fact.serial) {
      return Err(Error::DuplicateKey(format!("fact {}", fact.serial)));
    }
    self.add_changes(Changes::new().with_fact(fact))
  }

  /// Stage a date under a fresh serial and return the serial.
  pub fn stage_date(&mut self, date: VagueDate) -> Result<Serial> {
    let serial = self.create_date_serial();
    self.add_changes(Changes::new().with_date(serial, date))?;
    Ok(serial)
  }

  /// Supersede a fact: stage a copy carrying `value` under a fresh serial
  /// and re-stage the old fact as invalid. Returns the replacement.
  pub fn edit_fact(
    &mut self,
    serial: Serial,
    value: impl Into<String>,
  ) -> Result<Fact> {
    let old = self.get_fact(serial)?.clone();
    let value = value.into();
    let predicate = self.schema.predicate(old.predicate_serial)?;
    self.schema.validate_value(predicate, &value)?;

    let replacement = Fact {
      serial: self.create_fact_serial(),
      value,
      is_valid: true,
      ..old.clone()
    };
    self.add_changes(
      Changes::new()
        .with_fact(old.invalidated())
        .with_fact(replacement.clone()),
    )?;
    Ok(replacement)
  }

  /// Stage a fact as no longer valid.
  pub fn retract_fact(&mut self, serial: Serial) -> Result<()> {
    let retracted = self.get_fact(serial)?.invalidated();
    self.add_changes(Changes::new().with_fact(retracted))
  }

  /// Commit the staging area as one revision and clear it. On failure the
  /// staged changes are kept.
  pub async fn commit<S: RevisionStore>(
    &mut self,
    comment: &str,
    repository: &mut Repository<S>,
  ) -> Result<Revision> {
    let revision = repository.commit(comment, self.staged.clone()).await?;
    let staged = std::mem::take(&mut self.staged);
    self.baseline.merge(staged);
    Ok(revision)
  }
}
