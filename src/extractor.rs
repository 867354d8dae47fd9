//! Pattern-driven extraction of field and subfield values.
//!
//! A [`PatternExtractor`] compiles a compact query string once and runs it
//! against any number of records. The query language follows the Traject
//! convention:
//!
//! - `"001"` — the whole data of every 001 control field
//! - `"005[5]"` / `"005[0-7]"` — a character or inclusive character range
//! - `"245a"` — subfield a of every 245 field, one value per occurrence
//! - `"270aa"` — a repeated code joins all occurrences with a space
//! - `"650|*0|x"` — indicator filter; `*` matches anything
//! - `"100:700"` — several patterns separated by `:`
//!
//! A pattern without subfield codes selects every subfield. Linked 880
//! (alternate-script) fields are included by default and can be excluded
//! or selected exclusively via [`ExtractorOptions::with_alternate_field`].
//!
//! Compilation is the only fallible step; a compiled plan is immutable,
//! shareable across threads, and produces a (possibly empty) value list
//! for any record.
//!
//! # Examples
//!
//! ```
//! use marctract::{DataField, Field, PatternExtractor, Record};
//!
//! # fn main() -> Result<(), marctract::MarcError> {
//! let mut record = Record::new("00000nam a2200000   4500");
//! let mut field = DataField::new("245", '1', '0')?;
//! field.add_subfield('a', "Moby Dick /");
//! field.add_subfield('c', "Herman Melville.");
//! record.add_field(Field::Data(field));
//!
//! let extractor = PatternExtractor::new("245a")?;
//! assert_eq!(extractor.extract(&record), vec!["Moby Dick /"]);
//! # Ok(())
//! # }
//! ```

use crate::error::{MarcError, Result};
use crate::field_linkage::LinkageInfo;
use crate::record::{DataField, Record};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref CONTROL_PATTERN: Regex =
        Regex::new(r"^(\d{3})(?:\[(\d+)(?:-(\d+))?\])?$").expect("control pattern regex is valid");
    static ref DATA_PATTERN: Regex = Regex::new(r"^(\d{3})(?:\|([a-z0-9 *]{2})\|)?([a-z0-9]*)$")
        .expect("data pattern regex is valid");
}

/// How linked 880 (alternate-script) fields participate in extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlternateField {
    /// Visit the named tag's fields, then the 880 fields linked to it.
    #[default]
    Include,
    /// Visit only the named tag's fields.
    DontInclude,
    /// Visit only the 880 fields linked to the named tag.
    Only,
}

/// Post-processing options for a [`PatternExtractor`].
///
/// # Examples
///
/// ```
/// use marctract::ExtractorOptions;
///
/// let options = ExtractorOptions::default()
///     .with_trim_punctuation(true)
///     .with_default("unknown");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExtractorOptions {
    /// Return only the first value produced.
    pub first: bool,
    /// Trim common terminal punctuation from each value.
    pub trim_punctuation: bool,
    /// Returned as the sole value when extraction produces nothing.
    pub default: Option<String>,
    /// Keep repeated values instead of deduplicating.
    pub allow_duplicates: bool,
    /// Join the values produced by a single field with this separator.
    pub separator: Option<String>,
    /// Linked 880 handling.
    pub alternate_field: AlternateField,
}

impl ExtractorOptions {
    /// Create options with defaults: every value, duplicates suppressed,
    /// no trimming, alternate-script fields included.
    #[must_use]
    pub fn new() -> Self {
        ExtractorOptions::default()
    }

    /// Return only the first value produced.
    #[must_use]
    pub fn with_first(mut self, first: bool) -> Self {
        self.first = first;
        self
    }

    /// Trim common terminal punctuation from each value.
    #[must_use]
    pub fn with_trim_punctuation(mut self, trim: bool) -> Self {
        self.trim_punctuation = trim;
        self
    }

    /// Use `default` as the sole result when extraction produces nothing.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Keep repeated values instead of deduplicating.
    #[must_use]
    pub fn with_allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }

    /// Join all values produced by a single field with `separator`.
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Control linked 880 handling.
    #[must_use]
    pub fn with_alternate_field(mut self, alternate_field: AlternateField) -> Self {
        self.alternate_field = alternate_field;
        self
    }
}

/// A character selection within a control field's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slice {
    /// A single zero-based character position.
    Single(usize),
    /// An inclusive character range.
    Range(usize, usize),
}

#[derive(Debug, Clone)]
struct CodeSelector {
    code: char,
    /// Set when the code was repeated in the pattern: all occurrences are
    /// joined with a single space into one value per field.
    join_repeats: bool,
}

#[derive(Debug, Clone)]
enum Subplan {
    Control {
        tag: String,
        slice: Option<Slice>,
    },
    Data {
        tag: String,
        indicators: Option<(char, char)>,
        codes: Vec<CodeSelector>,
    },
}

/// A compiled extraction query.
///
/// Compile once with [`PatternExtractor::new`] or
/// [`PatternExtractor::with_options`], then call
/// [`extract`](PatternExtractor::extract) against any number of records.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    subplans: Vec<Subplan>,
    options: ExtractorOptions,
}

impl PatternExtractor {
    /// Compile a query with default options.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidPattern`] naming the offending pattern
    /// and the reason it was rejected.
    pub fn new(query: &str) -> Result<Self> {
        Self::with_options(query, ExtractorOptions::default())
    }

    /// Compile a query with the given options.
    ///
    /// Patterns are separated by `:`; empty patterns between separators are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::InvalidPattern`] naming the offending pattern
    /// and the reason it was rejected.
    pub fn with_options(query: &str, options: ExtractorOptions) -> Result<Self> {
        let subplans = query
            .split(':')
            .filter(|pattern| !pattern.is_empty())
            .map(compile_pattern)
            .collect::<Result<Vec<_>>>()?;
        Ok(PatternExtractor { subplans, options })
    }

    /// Run the compiled plan against a record.
    ///
    /// Execution cannot fail; any record produces a (possibly empty) list
    /// of values.
    #[must_use]
    pub fn extract(&self, record: &Record) -> Vec<String> {
        let mut results: Vec<String> = Vec::new();

        for subplan in &self.subplans {
            match subplan {
                Subplan::Control { tag, slice } => {
                    self.extract_control(record, tag, *slice, &mut results);
                },
                Subplan::Data {
                    tag,
                    indicators,
                    codes,
                } => {
                    self.extract_data(record, tag, *indicators, codes, &mut results);
                },
            }
            if self.options.first && !results.is_empty() {
                results.truncate(1);
                return results;
            }
        }

        if results.is_empty() {
            if let Some(default) = &self.options.default {
                return vec![default.clone()];
            }
        }
        if self.options.allow_duplicates {
            results
        } else {
            distinct(results)
        }
    }

    fn extract_control(
        &self,
        record: &Record,
        tag: &str,
        slice: Option<Slice>,
        results: &mut Vec<String>,
    ) {
        // Control fields may repeat (006 and 007 commonly do).
        let mut seen: HashSet<String> = HashSet::new();
        for field in record.fields_by_tag(tag) {
            let Some(control) = field.as_control() else {
                continue;
            };
            let value = match slice {
                None => control.data.clone(),
                Some(Slice::Single(index)) => match control.data.chars().nth(index) {
                    Some(c) => c.to_string(),
                    None => continue,
                },
                Some(Slice::Range(start, end)) => {
                    if end < start {
                        continue;
                    }
                    let selected: String = control
                        .data
                        .chars()
                        .skip(start)
                        .take(end - start + 1)
                        .collect();
                    if selected.is_empty() {
                        continue;
                    }
                    selected
                },
            };
            if !self.options.allow_duplicates && !seen.insert(value.clone()) {
                continue;
            }
            let value = if self.options.trim_punctuation {
                trim_punctuation(&value)
            } else {
                value
            };
            results.push(value);
            if self.options.first {
                return;
            }
        }
    }

    fn extract_data(
        &self,
        record: &Record,
        tag: &str,
        indicators: Option<(char, char)>,
        codes: &[CodeSelector],
        results: &mut Vec<String>,
    ) {
        let mut visited: Vec<&DataField> = Vec::new();
        if self.options.alternate_field != AlternateField::Only {
            visited.extend(record.fields_by_tag(tag).filter_map(|f| f.as_data()));
        }
        if self.options.alternate_field != AlternateField::DontInclude {
            visited.extend(linked_alternates(record, tag));
        }

        for field in visited {
            if let Some((want1, want2)) = indicators {
                if !indicator_matches(want1, field.indicator1)
                    || !indicator_matches(want2, field.indicator2)
                {
                    continue;
                }
            }

            let mut field_values: Vec<String> = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();
            for selector in codes {
                let mut code_values: Vec<String> = Vec::new();
                for subfield in field.subfields_by_code(selector.code) {
                    if !self.options.allow_duplicates && !seen.insert(subfield.data.clone()) {
                        continue;
                    }
                    let datum = if self.options.trim_punctuation {
                        trim_punctuation(&subfield.data)
                    } else {
                        subfield.data.clone()
                    };
                    code_values.push(datum);
                }
                if selector.join_repeats {
                    if !code_values.is_empty() {
                        field_values.push(code_values.join(" "));
                    }
                } else {
                    field_values.append(&mut code_values);
                }
            }

            match &self.options.separator {
                Some(separator) if !field_values.is_empty() => {
                    results.push(field_values.join(separator));
                },
                Some(_) => {},
                None => results.append(&mut field_values),
            }
            if self.options.first && !results.is_empty() {
                return;
            }
        }
    }
}

/// The 880 fields whose subfield 6 links them to `tag`, in record order.
fn linked_alternates<'a>(record: &'a Record, tag: &str) -> Vec<&'a DataField> {
    record
        .fields_by_tag("880")
        .filter_map(|field| field.as_data())
        .filter(|field| {
            field
                .first_subfield('6')
                .and_then(|sf| LinkageInfo::parse(&sf.data))
                .is_some_and(|linkage| linkage.links_to(tag))
        })
        .collect()
}

fn indicator_matches(want: char, actual: char) -> bool {
    want == '*' || want == actual
}

fn compile_pattern(pattern: &str) -> Result<Subplan> {
    let invalid = |reason: &str| MarcError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if pattern.chars().count() < 3 {
        return Err(invalid("pattern must be at least three characters"));
    }
    let tag: String = pattern.chars().take(3).collect();
    if !tag.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("tag is not numeric"));
    }
    let tag_value: u16 = tag
        .parse()
        .map_err(|_| invalid("tag is not numeric"))?;

    if tag_value < 10 {
        let caps = CONTROL_PATTERN.captures(pattern).ok_or_else(|| {
            if pattern.contains('[') || pattern.contains(']') {
                invalid("malformed character range")
            } else {
                invalid("a control field pattern allows only a bracketed character range")
            }
        })?;
        let slice = match (caps.get(2), caps.get(3)) {
            (Some(start), None) => Some(Slice::Single(parse_index(start.as_str(), &invalid)?)),
            (Some(start), Some(end)) => Some(Slice::Range(
                parse_index(start.as_str(), &invalid)?,
                parse_index(end.as_str(), &invalid)?,
            )),
            _ => None,
        };
        Ok(Subplan::Control { tag, slice })
    } else {
        let caps = DATA_PATTERN.captures(pattern).ok_or_else(|| {
            if pattern.contains('|') {
                invalid("indicators must be exactly two characters wrapped in '|'")
            } else if pattern.contains('[') || pattern.contains(']') {
                invalid("character ranges apply only to control field tags")
            } else {
                invalid("unrecognized subfield code")
            }
        })?;
        let indicators = caps.get(2).map(|m| {
            let mut chars = m.as_str().chars();
            (chars.next().unwrap_or('*'), chars.next().unwrap_or('*'))
        });
        let mut codes: Vec<CodeSelector> = Vec::new();
        for code in caps.get(3).map_or("", |m| m.as_str()).chars() {
            if let Some(existing) = codes.iter_mut().find(|s| s.code == code) {
                existing.join_repeats = true;
            } else {
                codes.push(CodeSelector {
                    code,
                    join_repeats: false,
                });
            }
        }
        if codes.is_empty() {
            codes.push(CodeSelector {
                code: '*',
                join_repeats: false,
            });
        }
        Ok(Subplan::Data {
            tag,
            indicators,
            codes,
        })
    }
}

fn parse_index(text: &str, invalid: &dyn Fn(&str) -> MarcError) -> Result<usize> {
    text.parse::<usize>()
        .map_err(|_| invalid("range index is not numeric"))
}

fn distinct(values: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Trim leading and trailing runs of ASCII whitespace and the terminal
/// punctuation conventional in MARC cataloging (`. , ; : / \ = +`).
/// Internal punctuation is preserved.
#[must_use]
pub fn trim_punctuation(value: &str) -> String {
    value
        .trim_matches(|c: char| {
            c.is_ascii_whitespace() || matches!(c, '.' | ',' | ';' | ':' | '/' | '\\' | '=' | '+')
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ControlField, Field};

    fn record_with_270() -> Record {
        let mut record = Record::new("00000nam a2200000   4500");
        let mut field = DataField::new("270", '1', ' ').unwrap();
        field.add_subfield('a', "ECU Libraries");
        field.add_subfield('a', "1000 E 5th St.");
        field.add_subfield('b', "Greenville");
        field.add_subfield('c', "NC");
        field.add_subfield('d', "U.S.");
        field.add_subfield('e', "27858");
        record.add_field(Field::Data(field));
        record
    }

    fn record_with_005() -> Record {
        let mut record = Record::new("00000nam a2200000   4500");
        record.add_field(Field::Control(
            ControlField::new("005", "19940223151047.0").unwrap(),
        ));
        record
    }

    fn record_with_880s() -> Record {
        let mut record = Record::new("00000nam a2200000   4500");
        let mut original = DataField::new("010", ' ', ' ').unwrap();
        original.add_subfield('a', "T1");
        record.add_field(Field::Data(original));

        let mut alt1 = DataField::new("880", ' ', ' ').unwrap();
        alt1.add_subfield('6', "010-01");
        alt1.add_subfield('a', "T2");
        record.add_field(Field::Data(alt1));

        let mut alt2 = DataField::new("880", ' ', ' ').unwrap();
        alt2.add_subfield('6', "010-02");
        alt2.add_subfield('a', "T3");
        record.add_field(Field::Data(alt2));
        record
    }

    fn extract(pattern: &str, record: &Record) -> Vec<String> {
        PatternExtractor::new(pattern).unwrap().extract(record)
    }

    #[test]
    fn test_control_field_whole_data() {
        assert_eq!(
            extract("005", &record_with_005()),
            vec!["19940223151047.0"]
        );
    }

    #[test]
    fn test_control_field_single_character() {
        assert_eq!(extract("005[5]", &record_with_005()), vec!["2"]);
    }

    #[test]
    fn test_control_field_inclusive_range() {
        assert_eq!(extract("005[0-7]", &record_with_005()), vec!["19940223"]);
    }

    #[test]
    fn test_control_field_out_of_range_yields_nothing() {
        assert!(extract("005[99]", &record_with_005()).is_empty());
    }

    #[test]
    fn test_data_field_single_code() {
        assert_eq!(
            extract("270a", &record_with_270()),
            vec!["ECU Libraries", "1000 E 5th St."]
        );
    }

    #[test]
    fn test_data_field_repeated_code_joins() {
        assert_eq!(
            extract("270aa", &record_with_270()),
            vec!["ECU Libraries 1000 E 5th St."]
        );
    }

    #[test]
    fn test_data_field_no_codes_selects_all() {
        assert_eq!(
            extract("270", &record_with_270()),
            vec![
                "ECU Libraries",
                "1000 E 5th St.",
                "Greenville",
                "NC",
                "U.S.",
                "27858"
            ]
        );
    }

    #[test]
    fn test_indicator_wildcard_match() {
        assert_eq!(extract("270|1*|b", &record_with_270()), vec!["Greenville"]);
    }

    #[test]
    fn test_indicator_mismatch_yields_nothing() {
        assert!(extract("270|2*|b", &record_with_270()).is_empty());
    }

    #[test]
    fn test_indicator_blank_is_literal() {
        assert_eq!(extract("270|1 |b", &record_with_270()), vec!["Greenville"]);
        assert!(extract("270|11|b", &record_with_270()).is_empty());
    }

    #[test]
    fn test_multiple_patterns_concatenate() {
        let record = record_with_270();
        assert_eq!(extract("270b:270c", &record), vec!["Greenville", "NC"]);
    }

    #[test]
    fn test_empty_patterns_between_separators_dropped() {
        let record = record_with_270();
        assert_eq!(extract(":270b::270c:", &record), vec!["Greenville", "NC"]);
    }

    #[test]
    fn test_alternate_field_include() {
        assert_eq!(extract("010a", &record_with_880s()), vec!["T1", "T2", "T3"]);
    }

    #[test]
    fn test_alternate_field_only() {
        let extractor = PatternExtractor::with_options(
            "010a",
            ExtractorOptions::default().with_alternate_field(AlternateField::Only),
        )
        .unwrap();
        assert_eq!(extractor.extract(&record_with_880s()), vec!["T2", "T3"]);
    }

    #[test]
    fn test_alternate_field_dont_include() {
        let extractor = PatternExtractor::with_options(
            "010a",
            ExtractorOptions::default().with_alternate_field(AlternateField::DontInclude),
        )
        .unwrap();
        assert_eq!(extractor.extract(&record_with_880s()), vec!["T1"]);
    }

    #[test]
    fn test_first_returns_single_value() {
        let extractor = PatternExtractor::with_options(
            "270a",
            ExtractorOptions::default().with_first(true),
        )
        .unwrap();
        assert_eq!(extractor.extract(&record_with_270()), vec!["ECU Libraries"]);
    }

    #[test]
    fn test_first_falls_through_empty_patterns() {
        let extractor = PatternExtractor::with_options(
            "999a:270b",
            ExtractorOptions::default().with_first(true),
        )
        .unwrap();
        // The first pattern matches nothing, so the value comes from the
        // second; still at most one value.
        assert_eq!(extractor.extract(&record_with_270()), vec!["Greenville"]);
    }

    #[test]
    fn test_default_used_when_empty() {
        let extractor = PatternExtractor::with_options(
            "999a",
            ExtractorOptions::default().with_default("unknown"),
        )
        .unwrap();
        assert_eq!(extractor.extract(&record_with_270()), vec!["unknown"]);
    }

    #[test]
    fn test_duplicates_suppressed_by_default() {
        let mut record = Record::new("00000nam a2200000   4500");
        let mut field = DataField::new("650", ' ', '0').unwrap();
        field.add_subfield('a', "History");
        field.add_subfield('a', "History");
        record.add_field(Field::Data(field));
        assert_eq!(extract("650a", &record), vec!["History"]);
    }

    #[test]
    fn test_allow_duplicates_keeps_repeats() {
        let mut record = Record::new("00000nam a2200000   4500");
        let mut field = DataField::new("650", ' ', '0').unwrap();
        field.add_subfield('a', "History");
        field.add_subfield('a', "History");
        record.add_field(Field::Data(field));
        let extractor = PatternExtractor::with_options(
            "650a",
            ExtractorOptions::default().with_allow_duplicates(true),
        )
        .unwrap();
        assert_eq!(extractor.extract(&record), vec!["History", "History"]);
    }

    #[test]
    fn test_separator_collapses_field_values() {
        let extractor = PatternExtractor::with_options(
            "270ab",
            ExtractorOptions::default().with_separator("; "),
        )
        .unwrap();
        assert_eq!(
            extractor.extract(&record_with_270()),
            vec!["ECU Libraries; 1000 E 5th St.; Greenville"]
        );
    }

    #[test]
    fn test_trim_punctuation_option() {
        let extractor = PatternExtractor::with_options(
            "270a",
            ExtractorOptions::default().with_trim_punctuation(true),
        )
        .unwrap();
        assert_eq!(
            extractor.extract(&record_with_270()),
            vec!["ECU Libraries", "1000 E 5th St"]
        );
    }

    #[test]
    fn test_trim_punctuation_preserves_internal() {
        assert_eq!(trim_punctuation("Smith, John."), "Smith, John");
        assert_eq!(trim_punctuation(" /title: "), "title");
        assert_eq!(trim_punctuation("plain"), "plain");
    }

    #[test]
    fn test_compiled_plan_is_deterministic() {
        let record = record_with_270();
        let a = PatternExtractor::new("270a:270b").unwrap();
        let b = PatternExtractor::new("270a:270b").unwrap();
        assert_eq!(a.extract(&record), b.extract(&record));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        for (pattern, fragment) in [
            ("24", "at least three"),
            ("2x5a", "not numeric"),
            ("005a", "control field pattern"),
            ("005[", "malformed"),
            ("005[1-x]", "malformed"),
            ("245[0-3]", "control field tags"),
            ("245|1|a", "two characters"),
            ("245|123|a", "two characters"),
            ("650A", "unrecognized subfield code"),
            ("650!", "unrecognized subfield code"),
        ] {
            let result = PatternExtractor::new(pattern);
            match result {
                Err(MarcError::InvalidPattern { pattern: p, reason }) => {
                    assert_eq!(p, pattern);
                    assert!(
                        reason.contains(fragment),
                        "pattern {pattern:?}: reason {reason:?} missing {fragment:?}"
                    );
                },
                other => panic!("pattern {pattern:?} should fail to compile, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_malformed_linkage_is_not_linked() {
        let mut record = record_with_880s();
        let mut stray = DataField::new("880", ' ', ' ').unwrap();
        stray.add_subfield('6', "garbage");
        stray.add_subfield('a', "T4");
        record.add_field(Field::Data(stray));
        assert_eq!(extract("010a", &record), vec!["T1", "T2", "T3"]);
    }
}
