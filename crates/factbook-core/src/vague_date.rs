//! Partial, uncertain calendar dates.
//!
//! A [`VagueDate`] always carries a year; the month and day are optional, and
//! a day requires a month. Every component can independently be marked as
//! approximate (leading `~`) or unsure (trailing `?`).
//!
//! Canonical text form: `[~]D[?].[~]MM[?].[~]YYYY[?]`, leading components
//! omitted when absent. The day is written without a leading zero, the month
//! with exactly two digits and the year with exactly four.

use std::{fmt, str::FromStr, sync::LazyLock};

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MIN_YEAR: u16 = 1900;
pub const MAX_YEAR: u16 = 2100;

static GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"^(?:(?:(~)?([1-9]|[12][0-9]|3[01])(\?)?\.)?(~)?([0-9]{2})(\?)?\.)?(~)?([0-9]{4})(\?)?$",
  )
  .expect("valid vague date grammar")
});

/// One component of a [`VagueDate`] together with its qualifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Part<T> {
  pub value: T,
  /// `false` when the component is approximate (`~`).
  pub exact: bool,
  /// `false` when the component is unsure (`?`).
  pub sure:  bool,
}

impl<T> Part<T> {
  pub fn exact(value: T) -> Self { Self { value, exact: true, sure: true } }

  pub fn approximate(mut self) -> Self {
    self.exact = false;
    self
  }

  pub fn unsure(mut self) -> Self {
    self.sure = false;
    self
  }
}

/// A calendar date with optional day and month and per-component exactness
/// and certainty flags.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct VagueDate {
  day:   Option<Part<u8>>,
  month: Option<Part<u8>>,
  year:  Part<u16>,
}

impl VagueDate {
  /// Build a date, checking that a day comes with a month, that the year
  /// lies in [`MIN_YEAR`]..=[`MAX_YEAR`] and that the components form a real
  /// Gregorian date. Missing components are checked as `1`.
  pub fn new(
    day: Option<Part<u8>>,
    month: Option<Part<u8>>,
    year: Part<u16>,
  ) -> Result<Self> {
    let date = Self { day, month, year };
    if day.is_some() && month.is_none() {
      return Err(Error::parse("vague date", date.to_string()));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&year.value) {
      return Err(Error::parse("vague date", date.to_string()));
    }
    let m = month.map_or(1, |m| m.value);
    let d = day.map_or(1, |d| d.value);
    if NaiveDate::from_ymd_opt(year.value.into(), m.into(), d.into()).is_none() {
      return Err(Error::parse("vague date", date.to_string()));
    }
    Ok(date)
  }

  /// Convenience constructor for a fully known, exact date.
  pub fn exact(day: u8, month: u8, year: u16) -> Result<Self> {
    Self::new(
      Some(Part::exact(day)),
      Some(Part::exact(month)),
      Part::exact(year),
    )
  }

  pub fn day(&self) -> Option<u8> { self.day.map(|p| p.value) }

  pub fn month(&self) -> Option<u8> { self.month.map(|p| p.value) }

  pub fn year(&self) -> u16 { self.year.value }

  pub fn is_day_exact(&self) -> Option<bool> { self.day.map(|p| p.exact) }

  pub fn is_month_exact(&self) -> Option<bool> { self.month.map(|p| p.exact) }

  pub fn is_year_exact(&self) -> bool { self.year.exact }

  pub fn is_day_sure(&self) -> Option<bool> { self.day.map(|p| p.sure) }

  pub fn is_month_sure(&self) -> Option<bool> { self.month.map(|p| p.sure) }

  pub fn is_year_sure(&self) -> bool { self.year.sure }

  /// Earliest calendar day this date can denote.
  pub fn earliest(&self) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
      self.year.value.into(),
      self.month().unwrap_or(1).into(),
      self.day().unwrap_or(1).into(),
    )
  }
}

fn write_part<T: fmt::Display>(
  f: &mut fmt::Formatter<'_>,
  part: &Part<T>,
  width: usize,
) -> fmt::Result {
  if !part.exact {
    f.write_str("~")?;
  }
  write!(f, "{:0width$}", part.value)?;
  if !part.sure {
    f.write_str("?")?;
  }
  Ok(())
}

impl fmt::Display for VagueDate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(day) = &self.day {
      write_part(f, day, 1)?;
      f.write_str(".")?;
    }
    if let Some(month) = &self.month {
      write_part(f, month, 2)?;
      f.write_str(".")?;
    }
    write_part(f, &self.year, 4)
  }
}

impl FromStr for VagueDate {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let caps = GRAMMAR
      .captures(s)
      .ok_or_else(|| Error::parse("vague date", s))?;

    let number = |idx: usize| -> Result<Option<u16>> {
      caps
        .get(idx)
        .map(|m| m.as_str().parse::<u16>())
        .transpose()
        .map_err(|_| Error::parse("vague date", s))
    };
    let flag = |idx: usize| caps.get(idx).is_none();

    let part_u8 = |value: Option<u16>, tilde: usize, question: usize| {
      value
        .map(|v| u8::try_from(v).map_err(|_| Error::parse("vague date", s)))
        .transpose()
        .map(|v| {
          v.map(|value| Part { value, exact: flag(tilde), sure: flag(question) })
        })
    };

    let day = part_u8(number(2)?, 1, 3)?;
    let month = part_u8(number(5)?, 4, 6)?;
    let year = Part {
      value: number(8)?.ok_or_else(|| Error::parse("vague date", s))?,
      exact: flag(7),
      sure:  flag(9),
    };

    Self::new(day, month, year).map_err(|_| Error::parse("vague date", s))
  }
}

impl TryFrom<String> for VagueDate {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<VagueDate> for String {
  fn from(d: VagueDate) -> Self { d.to_string() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn roundtrip(s: &str) {
    let parsed: VagueDate = s.parse().unwrap();
    assert_eq!(parsed.to_string(), s);
  }

  #[test]
  fn full_date_roundtrips() {
    roundtrip("30.04.2016");
    roundtrip("1.01.1900");
    roundtrip("31.12.2100");
  }

  #[test]
  fn approximate_and_unsure_markers_roundtrip() {
    roundtrip("~30.04.~2016");
    roundtrip("30?.04.2016");
    roundtrip("~30?.~04?.~2016?");
    roundtrip("04?.2016");
    roundtrip("~2016");
    roundtrip("2016?");
  }

  #[test]
  fn partial_dates_roundtrip() {
    roundtrip("04.2016");
    roundtrip("2016");
  }

  #[test]
  fn flags_are_recorded_per_component() {
    let d: VagueDate = "~30.04?.~2016".parse().unwrap();
    assert_eq!(d.day(), Some(30));
    assert_eq!(d.month(), Some(4));
    assert_eq!(d.year(), 2016);
    assert_eq!(d.is_day_exact(), Some(false));
    assert_eq!(d.is_day_sure(), Some(true));
    assert_eq!(d.is_month_exact(), Some(true));
    assert_eq!(d.is_month_sure(), Some(false));
    assert!(!d.is_year_exact());
    assert!(d.is_year_sure());
  }

  #[test]
  fn missing_components_have_no_flags() {
    let d: VagueDate = "2016".parse().unwrap();
    assert_eq!(d.day(), None);
    assert_eq!(d.month(), None);
    assert_eq!(d.is_day_exact(), None);
    assert_eq!(d.is_month_sure(), None);
  }

  #[test]
  fn rejects_wrong_digit_grouping() {
    for s in [
      "01.04.2016",
      "30.4.2016",
      "30.04.16",
      "2016-04-16",
      "",
      "~",
      "30.04.2016.",
      " 30.04.2016",
    ] {
      assert!(
        matches!(s.parse::<VagueDate>(), Err(Error::Parse { .. })),
        "{s:?} should be rejected"
      );
    }
  }

  #[test]
  fn rejects_impossible_calendar_dates() {
    assert!("31.04.2016".parse::<VagueDate>().is_err());
    assert!("29.02.2015".parse::<VagueDate>().is_err());
    assert!("29.02.2016".parse::<VagueDate>().is_ok());
    assert!("13.2016".parse::<VagueDate>().is_err());
    assert!("00.2016".parse::<VagueDate>().is_err());
  }

  #[test]
  fn rejects_years_out_of_range() {
    assert!("1899".parse::<VagueDate>().is_err());
    assert!("2101".parse::<VagueDate>().is_err());
  }

  #[test]
  fn new_requires_month_for_day() {
    let err = VagueDate::new(Some(Part::exact(3)), None, Part::exact(2000));
    assert!(err.is_err());
  }

  #[test]
  fn constructed_dates_render_canonically() {
    let d = VagueDate::new(
      Some(Part::exact(5).approximate()),
      Some(Part::exact(7)),
      Part::exact(1984).unsure(),
    )
    .unwrap();
    assert_eq!(d.to_string(), "~5.07.1984?");
    assert_eq!(d, "~5.07.1984?".parse().unwrap());
  }

  #[test]
  fn earliest_fills_missing_components() {
    let d: VagueDate = "~2016".parse().unwrap();
    assert_eq!(d.earliest(), NaiveDate::from_ymd_opt(2016, 1, 1));
  }

  #[test]
  fn serde_uses_canonical_string() {
    let d: VagueDate = "~30.04.~2016".parse().unwrap();
    let json = serde_json::to_string(&d).unwrap();
    assert_eq!(json, "\"~30.04.~2016\"");
    let back: VagueDate = serde_json::from_str(&json).unwrap();
    assert_eq!(back, d);
    assert!(serde_json::from_str::<VagueDate>("\"30.4.2016\"").is_err());
  }
}
