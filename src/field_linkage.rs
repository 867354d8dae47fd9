//! Linkage parsing for MARC 880 (Alternate Graphic Representation) fields.
//!
//! An 880 field carries a transliteration or alternate-script rendering of
//! another field in the same record. The pairing is declared in subfield 6,
//! whose data begins `TTT-NN`: `TTT` is the tag of the linked field and
//! `NN` an occurrence counter. Extraction pairs fields by tag alone; the
//! occurrence counter is parsed but not consulted.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LINKAGE: Regex =
        Regex::new(r"^(\d{3})-(\d{2,3})").expect("linkage regex is valid");
}

/// Information parsed from a subfield 6 value.
///
/// # Examples
///
/// ```
/// use marctract::LinkageInfo;
///
/// let info = LinkageInfo::parse("010-01/(N").unwrap();
/// assert_eq!(info.tag, "010");
/// assert_eq!(info.occurrence, "01");
/// assert!(info.links_to("010"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkageInfo {
    /// Tag of the linked field
    pub tag: String,
    /// Occurrence counter pairing original and alternate fields
    pub occurrence: String,
}

impl LinkageInfo {
    /// Parse a subfield 6 value of the form `TTT-NN[...]`.
    ///
    /// Trailing material (script identification, orientation codes) is
    /// ignored. Returns `None` when the value does not start with a
    /// well-formed linkage.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let caps = LINKAGE.captures(value)?;
        Some(LinkageInfo {
            tag: caps[1].to_string(),
            occurrence: caps[2].to_string(),
        })
    }

    /// Whether this linkage points at the given tag.
    #[must_use]
    pub fn links_to(&self, tag: &str) -> bool {
        self.tag == tag
    }
}
