//! MARC bibliographic record structures and operations.
//!
//! This module provides the core record types:
//! - [`Record`] — a bibliographic record: leader, ordered fields, warnings
//! - [`Field`] — a variable field, either control (tags 001-009) or data (010+)
//! - [`ControlField`] / [`DataField`] — the two field variants
//! - [`Subfield`] — a coded data element within a data field
//!
//! MARC-21 is position-sensitive, so fields are kept in insertion order.
//! A secondary tag index maps each tag to the positions of its fields,
//! giving O(1) average lookup by tag while the ordered sequence remains
//! the source of truth.
//!
//! # Examples
//!
//! Build a record and query it:
//!
//! ```
//! use marctract::{ControlField, DataField, Field, Record};
//!
//! # fn main() -> Result<(), marctract::MarcError> {
//! let mut record = Record::new("00000nam a2200000   4500");
//! record.add_field(Field::Control(ControlField::new("001", "12345")?));
//!
//! let mut field = DataField::new("245", '1', '0')?;
//! field.add_subfield('a', "The Great Gatsby");
//! record.add_field(Field::Data(field));
//!
//! assert_eq!(record.len(), 2);
//! assert_eq!(record.get_by_tag("245").len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Equality between records is defined as byte-equal MARC-21
//! re-serialization: two records compare equal exactly when
//! [`Record::to_marc21`] produces the same output for both.

use crate::error::{MarcError, Result};
use crate::leader::{FIELD_TERMINATOR, LEADER_LEN, RECORD_TERMINATOR, SUBFIELD_DELIMITER};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A subfield within a data field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    /// Subfield code (single alphanumeric character)
    pub code: char,
    /// Subfield data
    pub data: String,
}

impl Subfield {
    /// Create a new subfield.
    pub fn new(code: char, data: impl Into<String>) -> Self {
        Subfield {
            code,
            data: data.into(),
        }
    }
}

/// A control field (tags 001-009) carrying unstructured data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlField {
    tag: String,
    /// Field data
    pub data: String,
}

impl ControlField {
    /// Create a new control field.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidTag`] unless `tag` is three ASCII digits
    /// with a numeric value below 10.
    pub fn new(tag: impl Into<String>, data: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if parse_tag(&tag)? >= 10 {
            return Err(MarcError::InvalidTag(format!(
                "Control field tag must be below 010, got {tag:?}"
            )));
        }
        Ok(ControlField {
            tag,
            data: data.into(),
        })
    }

    /// The 3-digit field tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// A control field is empty when it carries no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A data field (tags 010-999) carrying two indicators and coded subfields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataField {
    tag: String,
    /// First indicator
    pub indicator1: char,
    /// Second indicator
    pub indicator2: char,
    /// Subfields in source order (`SmallVec` avoids allocation for typical
    /// fields with 4 or fewer subfields)
    pub subfields: SmallVec<[Subfield; 4]>,
}

impl DataField {
    /// Create a new data field with no subfields.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidTag`] unless `tag` is three ASCII digits
    /// with a numeric value of 10 or above.
    pub fn new(tag: impl Into<String>, indicator1: char, indicator2: char) -> Result<Self> {
        let tag = tag.into();
        if parse_tag(&tag)? < 10 {
            return Err(MarcError::InvalidTag(format!(
                "Data field tag must be 010 or above, got {tag:?}"
            )));
        }
        Ok(DataField {
            tag,
            indicator1,
            indicator2,
            subfields: SmallVec::new(),
        })
    }

    /// The 3-digit field tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Append a subfield.
    pub fn add_subfield(&mut self, code: char, data: impl Into<String>) {
        self.subfields.push(Subfield::new(code, data));
    }

    /// Iterate over subfields with the given code, in source order.
    ///
    /// The code `'*'` matches every subfield.
    pub fn subfields_by_code(&self, code: char) -> impl Iterator<Item = &Subfield> {
        self.subfields
            .iter()
            .filter(move |sf| code == '*' || sf.code == code)
    }

    /// First subfield with the given code, if any.
    #[must_use]
    pub fn first_subfield(&self, code: char) -> Option<&Subfield> {
        self.subfields_by_code(code).next()
    }

    /// The subfield at position `index` in source order.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::OutOfRange`] when `index` is not within
    /// `[0, subfield count)`.
    pub fn subfield_at(&self, index: usize) -> Result<&Subfield> {
        self.subfields.get(index).ok_or_else(|| {
            MarcError::OutOfRange(format!(
                "Subfield index {index} out of range for field {} with {} subfield(s)",
                self.tag,
                self.subfields.len()
            ))
        })
    }

    /// A data field is empty when it has no subfields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subfields.is_empty()
    }
}

/// A variable field: either a control field or a data field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    /// Control field (tags 001-009)
    Control(ControlField),
    /// Data field (tags 010-999)
    Data(DataField),
}

impl Field {
    /// The 3-digit field tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Field::Control(f) => f.tag(),
            Field::Data(f) => f.tag(),
        }
    }

    /// True for the control variant.
    #[must_use]
    pub fn is_control(&self) -> bool {
        matches!(self, Field::Control(_))
    }

    /// True for the data variant.
    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(self, Field::Data(_))
    }

    /// A field is empty when it carries no semantically meaningful payload:
    /// a control field with empty data, or a data field with no subfields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Field::Control(f) => f.is_empty(),
            Field::Data(f) => f.is_empty(),
        }
    }

    /// The control variant, if this is one.
    #[must_use]
    pub fn as_control(&self) -> Option<&ControlField> {
        match self {
            Field::Control(f) => Some(f),
            Field::Data(_) => None,
        }
    }

    /// The data variant, if this is one.
    #[must_use]
    pub fn as_data(&self) -> Option<&DataField> {
        match self {
            Field::Data(f) => Some(f),
            Field::Control(_) => None,
        }
    }
}

/// Parse a 3-character numeric tag.
///
/// # Errors
///
/// Returns [`MarcError::InvalidTag`] unless `tag` is exactly three ASCII
/// digits.
pub(crate) fn parse_tag(tag: &str) -> Result<u16> {
    if tag.chars().count() != 3 || !tag.chars().all(|c| c.is_ascii_digit()) {
        return Err(MarcError::InvalidTag(format!(
            "Tag must be three ASCII digits, got {tag:?}"
        )));
    }
    tag.parse::<u16>()
        .map_err(|_| MarcError::InvalidTag(format!("Tag must be three ASCII digits, got {tag:?}")))
}

/// A MARC bibliographic record.
///
/// Fields are stored in insertion order; the tag index is a derived view
/// mapping each tag to the positions of its fields and is kept consistent
/// by [`Record::add_field`] and [`Record::remove_field`].
///
/// Warnings accumulated while deserializing (coerced indicators, dropped
/// zero-length subfields, a missing record terminator) are carried on the
/// record so data quality can be audited without losing records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    leader: String,
    fields: Vec<Field>,
    warnings: Vec<String>,
    tag_index: IndexMap<String, Vec<usize>>,
}

impl Record {
    /// Create an empty record with the given 24-character leader.
    pub fn new(leader: impl Into<String>) -> Self {
        Record {
            leader: leader.into(),
            fields: Vec::new(),
            warnings: Vec::new(),
            tag_index: IndexMap::new(),
        }
    }

    /// The 24-character leader.
    #[must_use]
    pub fn leader(&self) -> &str {
        &self.leader
    }

    /// Warnings accumulated during deserialization.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a field, updating the tag index.
    pub fn add_field(&mut self, field: Field) {
        let position = self.fields.len();
        self.tag_index
            .entry(field.tag().to_string())
            .or_default()
            .push(position);
        self.fields.push(field);
    }

    /// Remove and return the field at `index`, updating the tag index.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::OutOfRange`] when `index` is not within
    /// `[0, len)`.
    pub fn remove_field(&mut self, index: usize) -> Result<Field> {
        if index >= self.fields.len() {
            return Err(MarcError::OutOfRange(format!(
                "Field index {index} out of range for record with {} field(s)",
                self.fields.len()
            )));
        }
        let field = self.fields.remove(index);
        let bucket_empty = match self.tag_index.get_mut(field.tag()) {
            Some(bucket) => {
                bucket.retain(|&i| i != index);
                bucket.is_empty()
            },
            None => false,
        };
        if bucket_empty {
            self.tag_index.shift_remove(field.tag());
        }
        for bucket in self.tag_index.values_mut() {
            for position in bucket.iter_mut() {
                if *position > index {
                    *position -= 1;
                }
            }
        }
        Ok(field)
    }

    /// The field at `index` in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::OutOfRange`] when `index` is not within
    /// `[0, len)`.
    pub fn get(&self, index: usize) -> Result<&Field> {
        self.fields.get(index).ok_or_else(|| {
            MarcError::OutOfRange(format!(
                "Field index {index} out of range for record with {} field(s)",
                self.fields.len()
            ))
        })
    }

    /// Iterate over all fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// All fields with the given tag, in insertion order.
    ///
    /// An empty `tag` selects all fields.
    #[must_use]
    pub fn get_by_tag(&self, tag: &str) -> Vec<&Field> {
        self.fields_by_tag(tag).collect()
    }

    /// Iterate over fields with the given tag, in insertion order.
    ///
    /// An empty `tag` selects all fields.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// for field in record.fields_by_tag("650") {
    ///     println!("Subject field: {}", field.tag());
    /// }
    /// ```
    pub fn fields_by_tag<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a Field> {
        let positions: Vec<usize> = if tag.is_empty() {
            (0..self.fields.len()).collect()
        } else {
            self.tag_index.get(tag).cloned().unwrap_or_default()
        };
        positions.into_iter().map(move |i| &self.fields[i])
    }

    /// Data of the first control field with the given tag, if any.
    #[must_use]
    pub fn control_field_data(&self, tag: &str) -> Option<&str> {
        self.fields_by_tag(tag)
            .find_map(Field::as_control)
            .map(|f| f.data.as_str())
    }

    /// Serialize to MARC-21 (ISO 2709) transmission format.
    ///
    /// The directory is rebuilt from the current field sequence, and the
    /// leader's record length (positions 0-4) and base address (12-16) are
    /// recomputed; all other leader positions are emitted as stored.
    /// Lengths and offsets are byte counts, per MARC-21.
    #[must_use]
    pub fn to_marc21(&self) -> String {
        let mut directory = String::new();
        let mut data_area = String::new();
        let mut offset = 0usize;

        for field in &self.fields {
            let payload = match field {
                Field::Control(f) => f.data.clone(),
                Field::Data(f) => {
                    let mut p = String::new();
                    p.push(f.indicator1);
                    p.push(f.indicator2);
                    for sf in &f.subfields {
                        p.push(SUBFIELD_DELIMITER);
                        p.push(sf.code);
                        p.push_str(&sf.data);
                    }
                    p
                },
            };
            let field_length = payload.len();
            directory.push_str(field.tag());
            directory.push_str(&format!("{field_length:04}"));
            directory.push_str(&format!("{offset:05}"));
            data_area.push_str(&payload);
            data_area.push(FIELD_TERMINATOR);
            offset += field_length + 1;
        }
        directory.push(FIELD_TERMINATOR);

        let base_address = LEADER_LEN + directory.len();
        let record_length = base_address + data_area.len() + 1;

        let mut leader: Vec<char> = self
            .leader
            .chars()
            .chain(std::iter::repeat(' '))
            .take(LEADER_LEN)
            .collect();
        for (i, c) in format!("{record_length:05}").chars().enumerate() {
            leader[i] = c;
        }
        for (i, c) in format!("{base_address:05}").chars().enumerate() {
            leader[12 + i] = c;
        }

        let mut out = String::with_capacity(record_length);
        out.extend(leader);
        out.push_str(&directory);
        out.push_str(&data_area);
        out.push(RECORD_TERMINATOR);
        out
    }
}

/// Equality is byte-equal MARC-21 re-serialization; warnings and the
/// derived tag index do not participate.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.to_marc21() == other.to_marc21()
    }
}

impl Eq for Record {}
