//! MARC leader constants and structural validation.
//!
//! The MARC leader is a 24-character fixed-length prefix on every record.
//! Most of its positions are descriptive metadata consulted elsewhere (the
//! character coding flag at position 9 drives encoding selection during
//! deserialization); this module checks only the structural facts a record
//! must satisfy before the directory and fields can be carved out of it:
//!
//! - Positions 0-4: record length (5 digits), matching the decoded text
//! - Positions 12-16: base address of data (5 digits), inside the record
//! - The character before the base address is the Field Terminator
//! - Positions 20-23: the literal `"4500"`

use crate::error::{MarcError, Result};

/// Length of the leader in characters.
pub const LEADER_LEN: usize = 24;

/// Length of one directory entry in characters.
pub const DIRECTORY_ENTRY_LEN: usize = 12;

/// Terminates every record (hex 1D).
pub const RECORD_TERMINATOR: char = '\u{1D}';

/// Terminates the directory and every variable field (hex 1E).
pub const FIELD_TERMINATOR: char = '\u{1E}';

/// Prefixes every subfield within a data field (hex 1F).
pub const SUBFIELD_DELIMITER: char = '\u{1F}';

/// Validate the leader of a character-decoded MARC record.
///
/// `record` is the full decoded record text (leader included, record
/// terminator optional). The record length in positions 0-4 is a physical
/// byte count, so a record decoded from multi-byte UTF-8 has fewer
/// characters than its leader reports; the check accepts a match against
/// the character count, the UTF-8 byte count, or the UTF-16 code-unit
/// count of the decoded text.
///
/// # Errors
///
/// Returns [`MarcError::InvalidLeader`] describing the first failed check.
pub fn validate(record: &str) -> Result<()> {
    let leader: Vec<char> = record.chars().take(LEADER_LEN).collect();
    if leader.len() < LEADER_LEN {
        return Err(MarcError::InvalidLeader(format!(
            "Record is shorter than the {LEADER_LEN}-character leader"
        )));
    }

    let reported = parse_digits(&leader[0..5], "record length")?;
    let char_len = record.chars().count();
    let byte_len = record.len();
    let utf16_len = record.encode_utf16().count();
    if reported != char_len && reported != byte_len && reported != utf16_len {
        return Err(MarcError::InvalidLeader(format!(
            "Reported record length {reported} does not match decoded length {char_len}"
        )));
    }

    let base_address = parse_digits(&leader[12..17], "base address")?;
    if base_address >= reported {
        return Err(MarcError::InvalidLeader(format!(
            "Base address {base_address} is not less than record length {reported}"
        )));
    }
    if base_address == 0 || record.chars().nth(base_address - 1) != Some(FIELD_TERMINATOR) {
        return Err(MarcError::InvalidLeader(format!(
            "Directory does not end with a Field Terminator before base address {base_address}"
        )));
    }

    if leader[20..24] != ['4', '5', '0', '0'] {
        let tail: String = leader[20..24].iter().collect();
        return Err(MarcError::InvalidLeader(format!(
            "Leader ends with {tail:?}, expected \"4500\""
        )));
    }

    Ok(())
}

fn parse_digits(chars: &[char], what: &str) -> Result<usize> {
    let text: String = chars.iter().collect();
    if !chars.iter().all(char::is_ascii_digit) {
        return Err(MarcError::InvalidLeader(format!(
            "Leader {what} is not numeric: {text:?}"
        )));
    }
    text.parse::<usize>()
        .map_err(|_| MarcError::InvalidLeader(format!("Leader {what} is not numeric: {text:?}")))
}
