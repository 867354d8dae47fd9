//! Deserializing MARC-21 transmission format into [`Record`] values.
//!
//! Two entry points share a common core: [`from_bytes`] selects the
//! character encoding (leader byte 9, overridable with `force_utf8`) and
//! decodes the buffer; [`from_str`] parses an already-decoded record.
//!
//! Parsing is split-driven: the record text after the leader is divided on
//! Field Terminators, the first piece is the directory, and the remaining
//! pieces are field payloads in directory order. Directory lengths and
//! offsets are therefore never dereferenced; a malformed directory surfaces
//! as a count mismatch instead of an out-of-bounds slice.
//!
//! Only three conditions are fatal: an invalid leader, a directory entry
//! whose tag is not numeric, and a directory/payload count mismatch.
//! Everything else that is recoverable (a missing record terminator, extra
//! directory characters, bad indicators, empty subfields) is recorded as a
//! warning on the returned record.

use crate::encoding::{decode_utf8, Marc8Decode, Marc8Decoder};
use crate::error::{MarcError, Result};
use crate::leader::{
    self, DIRECTORY_ENTRY_LEN, FIELD_TERMINATOR, LEADER_LEN, RECORD_TERMINATOR, SUBFIELD_DELIMITER,
};
use crate::record::{parse_tag, ControlField, DataField, Field, Record};

/// Deserialize a binary MARC-21 record with the built-in MARC-8 decoder.
///
/// Leader byte 9 selects the encoding: a blank means MARC-8 unless
/// `force_utf8` is set; anything else (and the forced case) is decoded as
/// UTF-8 after stripping a leading BOM if present.
///
/// # Errors
///
/// Returns [`MarcError::InvalidLeader`], [`MarcError::InvalidTag`], or
/// [`MarcError::DirectoryMismatch`] for the fatal structural defects, and
/// [`MarcError::Encoding`] when a UTF-8 record contains invalid bytes.
pub fn from_bytes(bytes: &[u8], force_utf8: bool) -> Result<Record> {
    from_bytes_with_decoder(bytes, force_utf8, &Marc8Decoder::new())
}

/// Deserialize a binary MARC-21 record with a caller-supplied MARC-8
/// decoder.
///
/// # Errors
///
/// As [`from_bytes`].
pub fn from_bytes_with_decoder(
    bytes: &[u8],
    force_utf8: bool,
    decoder: &dyn Marc8Decode,
) -> Result<Record> {
    if bytes.len() < LEADER_LEN {
        return Err(MarcError::InvalidLeader(format!(
            "Record is shorter than the {LEADER_LEN}-byte leader"
        )));
    }
    let text = if bytes[9] == b' ' && !force_utf8 {
        decoder.decode(bytes)
    } else {
        decode_utf8(bytes)?
    };
    from_str(&text)
}

/// Deserialize a character-decoded MARC-21 record.
///
/// # Errors
///
/// Returns [`MarcError::InvalidLeader`], [`MarcError::InvalidTag`], or
/// [`MarcError::DirectoryMismatch`] for the fatal structural defects.
pub fn from_str(text: &str) -> Result<Record> {
    leader::validate(text)?;

    let leader_end = text
        .char_indices()
        .nth(LEADER_LEN)
        .map_or(text.len(), |(i, _)| i);
    let mut record = Record::new(&text[..leader_end]);

    let mut body = &text[leader_end..];
    if let Some(stripped) = body.strip_suffix(RECORD_TERMINATOR) {
        body = stripped;
    } else {
        record.add_warning("Record does not end with a Record Terminator (hex 1D).".to_string());
    }

    let mut pieces = body.split(FIELD_TERMINATOR);
    let directory = pieces.next().unwrap_or("");
    let mut payloads: Vec<&str> = pieces.collect();
    if body.ends_with(FIELD_TERMINATOR) {
        // The final field's terminator produces an empty trailing piece.
        payloads.pop();
    }

    let mut directory_chars: Vec<char> = directory.chars().collect();
    let extra = directory_chars.len() % DIRECTORY_ENTRY_LEN;
    if extra != 0 {
        record.add_warning(format!(
            "Directory contains {extra} extra character(s). Removing extra characters."
        ));
        directory_chars.truncate(directory_chars.len() - extra);
    }

    let entry_count = directory_chars.len() / DIRECTORY_ENTRY_LEN;
    if entry_count != payloads.len() {
        return Err(MarcError::DirectoryMismatch(format!(
            "Directory has {entry_count} entries but the record has {} field payloads",
            payloads.len()
        )));
    }

    for (entry, payload) in directory_chars
        .chunks(DIRECTORY_ENTRY_LEN)
        .zip(payloads.into_iter())
    {
        let tag: String = entry[..3].iter().collect();
        let tag_value = parse_tag(&tag)?;
        // A terminator can survive the split when payloads are adjacent.
        let payload = payload.strip_suffix(FIELD_TERMINATOR).unwrap_or(payload);
        if tag_value < 10 {
            record.add_field(Field::Control(ControlField::new(tag, payload)?));
        } else {
            let field = parse_data_field(&mut record, &tag, payload)?;
            record.add_field(Field::Data(field));
        }
    }

    Ok(record)
}

fn parse_data_field(record: &mut Record, tag: &str, payload: &str) -> Result<DataField> {
    let mut segments = payload.split(SUBFIELD_DELIMITER);
    let indicator_segment = segments.next().unwrap_or("");
    let indicator_chars: Vec<char> = indicator_segment.chars().collect();

    let (indicator1, indicator2) = if indicator_chars.len() == 2 {
        (
            coerce_indicator(record, tag, indicator_chars[0]),
            coerce_indicator(record, tag, indicator_chars[1]),
        )
    } else {
        record.add_warning(format!(
            "Invalid indicators \"{indicator_segment}\" forcing indicators to be blanks."
        ));
        (' ', ' ')
    };

    let mut field = DataField::new(tag, indicator1, indicator2)?;
    for (i, segment) in segments.enumerate() {
        if segment.is_empty() {
            record.add_warning(format!(
                "Subfield #{} in field {tag} has zero length. Skipped.",
                i + 1
            ));
            continue;
        }
        let code = segment.chars().next().unwrap_or(' ');
        field.add_subfield(code, &segment[code.len_utf8()..]);
    }
    if field.is_empty() {
        record.add_warning(format!("Field {tag} has no subfields."));
    }
    Ok(field)
}

/// Indicators must be a blank or a lower-case ASCII letter or digit;
/// upper-case input is lowered silently, anything else is coerced to blank
/// with a warning.
fn coerce_indicator(record: &mut Record, tag: &str, indicator: char) -> char {
    if indicator == ' ' {
        return ' ';
    }
    let lowered = indicator.to_ascii_lowercase();
    if indicator.is_ascii() && lowered.is_ascii_alphanumeric() {
        lowered
    } else {
        record.add_warning(format!(
            "Illegal indicator '{indicator}' in field {tag} forced to blank."
        ));
        ' '
    }
}
