//! Character encoding support for MARC records.
//!
//! MARC records carry their character coding in leader position 9:
//! a blank means MARC-8 (legacy, escape-driven character sets per ISO 2022),
//! anything else is treated as UTF-8 (optionally BOM-prefixed).
//!
//! MARC-8 decoding is a pluggable boundary: the deserializer talks to a
//! [`Marc8Decode`] implementation and nothing else, so the built-in
//! [`Marc8Decoder`] can be swapped for one with full codepage coverage.
//! The built-in decoder handles escape-sequence character-set switching,
//! combining-mark buffering, and NFC normalization over the Basic Latin,
//! ANSEL, subscript, superscript, and Greek-symbol sets; characters outside
//! those sets decode to U+FFFD.

use crate::error::{MarcError, Result};
use unicode_normalization::UnicodeNormalization;

/// UTF-8 byte order mark, stripped before decoding when present.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decodes MARC-8 bytes to a string.
///
/// Implementations must accept arbitrary input and produce a best-effort
/// string; decoding never fails, it degrades to replacement characters.
pub trait Marc8Decode {
    /// Decode a MARC-8 byte buffer.
    fn decode(&self, bytes: &[u8]) -> String;
}

/// Decode a UTF-8 buffer, stripping a leading byte order mark if present.
///
/// # Errors
///
/// Returns [`MarcError::Encoding`] when the bytes are not valid UTF-8.
pub(crate) fn decode_utf8(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| MarcError::Encoding(format!("Invalid UTF-8: {e}")))
}

/// MARC-8 character sets the built-in decoder knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    BasicLatin,
    Ansel,
    Subscript,
    Superscript,
    GreekSymbols,
    /// A set designated by an escape sequence this decoder has no table for
    /// (Hebrew, Arabic, Cyrillic, EACC multibyte). Decoded as U+FFFD.
    Unmapped,
}

impl Charset {
    fn from_final_byte(byte: u8) -> Option<Charset> {
        match byte {
            0x42 => Some(Charset::BasicLatin),
            0x45 => Some(Charset::Ansel),
            0x32..=0x34 | 0x4E | 0x51 | 0x53 => Some(Charset::Unmapped),
            _ => None,
        }
    }
}

/// The built-in escape-driven MARC-8 decoder.
///
/// Stateless; each [`decode`](Marc8Decode::decode) call runs a fresh G0/G1
/// state machine over the buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Marc8Decoder;

impl Marc8Decoder {
    /// Create a decoder.
    #[must_use]
    pub fn new() -> Self {
        Marc8Decoder
    }
}

impl Marc8Decode for Marc8Decoder {
    fn decode(&self, bytes: &[u8]) -> String {
        let mut g0 = Charset::BasicLatin;
        let mut g1 = Charset::Ansel;
        let mut result = String::with_capacity(bytes.len());
        let mut combining: Vec<char> = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            // ESC starts a character-set designation.
            if bytes[i] == 0x1B {
                let Some(&selector) = bytes.get(i + 1) else {
                    result.push('\u{FFFD}');
                    break;
                };
                match selector {
                    // ESC ( F designates G0, ESC ) F designates G1.
                    0x28 | 0x29 => {
                        if let Some(&final_byte) = bytes.get(i + 2) {
                            if let Some(charset) = Charset::from_final_byte(final_byte) {
                                if selector == 0x28 {
                                    g0 = charset;
                                } else {
                                    g1 = charset;
                                }
                            }
                            i += 3;
                        } else {
                            result.push('\u{FFFD}');
                            i = bytes.len();
                        }
                        continue;
                    },
                    // ESC $ designates a multibyte set (EACC); no table here.
                    0x24 => {
                        g0 = Charset::Unmapped;
                        i += if bytes.get(i + 2) == Some(&0x31) { 3 } else { 2 };
                        continue;
                    },
                    // ESC s resets G0 to Basic Latin.
                    0x73 => {
                        g0 = Charset::BasicLatin;
                        i += 2;
                        continue;
                    },
                    // Locking escapes for the custom MARC sets.
                    0x67 => {
                        g0 = Charset::GreekSymbols;
                        i += 2;
                        continue;
                    },
                    0x62 => {
                        g0 = Charset::Subscript;
                        i += 2;
                        continue;
                    },
                    0x70 => {
                        g0 = Charset::Superscript;
                        i += 2;
                        continue;
                    },
                    _ => {
                        // Unknown escape sequence, skip it.
                        i += 2;
                        continue;
                    },
                }
            }

            let byte = bytes[i];
            i += 1;

            // The record/field/subfield terminators must survive decoding:
            // the deserializer decodes whole record buffers and splits on
            // them afterwards. Other control bytes are dropped, except
            // LF/CR which pass through.
            if byte < 0x20 || byte == 0x7F {
                if matches!(byte, 0x1D | 0x1E | 0x1F | 0x0A | 0x0D) {
                    result.push(byte as char);
                }
                continue;
            }

            let charset = if byte >= 0xA0 { g1 } else { g0 };
            match lookup(charset, byte) {
                Some((ch, true)) => combining.push(ch),
                Some((ch, false)) => {
                    // MARC-8 puts combining marks before the base character;
                    // Unicode wants them after it.
                    result.push(ch);
                    result.extend(combining.drain(..));
                },
                None => {
                    result.push('\u{FFFD}');
                    combining.clear();
                },
            }
        }
        result.extend(combining);

        result.nfc().collect()
    }
}

/// Map a byte in the given character set to `(char, is_combining)`.
fn lookup(charset: Charset, byte: u8) -> Option<(char, bool)> {
    match charset {
        Charset::BasicLatin => Some((byte as char, false)),
        Charset::Ansel => ansel(byte),
        Charset::Subscript => subscript(byte).map(|c| (c, false)),
        Charset::Superscript => superscript(byte).map(|c| (c, false)),
        Charset::GreekSymbols => greek(byte).map(|c| (c, false)),
        Charset::Unmapped => None,
    }
}

/// ANSEL extended Latin: spacing characters in 0xA1-0xC8, combining
/// diacritics in 0xE0-0xFE.
fn ansel(byte: u8) -> Option<(char, bool)> {
    let spacing = match byte {
        0xA0 => ' ',
        0xA1 => '\u{0141}', // Ł
        0xA2 => '\u{00D8}', // Ø
        0xA3 => '\u{0110}', // Đ
        0xA4 => '\u{00DE}', // Þ
        0xA5 => '\u{00C6}', // Æ
        0xA6 => '\u{0152}', // Œ
        0xA7 => '\u{02B9}', // modifier prime
        0xA8 => '\u{00B7}', // middle dot
        0xA9 => '\u{266D}', // music flat
        0xAA => '\u{00AE}', // registered
        0xAB => '\u{00B1}', // plus-minus
        0xAC => '\u{01A0}', // Ơ
        0xAD => '\u{01AF}', // Ư
        0xAE => '\u{02BC}', // modifier apostrophe
        0xB0 => '\u{02BB}', // modifier turned comma
        0xB1 => '\u{0142}', // ł
        0xB2 => '\u{00F8}', // ø
        0xB3 => '\u{0111}', // đ
        0xB4 => '\u{00FE}', // þ
        0xB5 => '\u{00E6}', // æ
        0xB6 => '\u{0153}', // œ
        0xB7 => '\u{02BA}', // modifier double prime
        0xB8 => '\u{0131}', // dotless i
        0xB9 => '\u{00A3}', // pound sign
        0xBA => '\u{00F0}', // ð
        0xBC => '\u{01A1}', // ơ
        0xBD => '\u{01B0}', // ư
        0xC0 => '\u{00B0}', // degree
        0xC1 => '\u{2113}', // script l
        0xC2 => '\u{2117}', // sound recording copyright
        0xC3 => '\u{00A9}', // copyright
        0xC4 => '\u{266F}', // music sharp
        0xC5 => '\u{00BF}', // inverted question mark
        0xC6 => '\u{00A1}', // inverted exclamation mark
        0xC8 => '\u{20AC}', // euro
        _ => '\0',
    };
    if spacing != '\0' {
        return Some((spacing, false));
    }
    let combining = match byte {
        0xE0 => '\u{0309}', // hook above
        0xE1 => '\u{0300}', // grave
        0xE2 => '\u{0301}', // acute
        0xE3 => '\u{0302}', // circumflex
        0xE4 => '\u{0303}', // tilde
        0xE5 => '\u{0304}', // macron
        0xE6 => '\u{0306}', // breve
        0xE7 => '\u{0307}', // dot above
        0xE8 => '\u{0308}', // diaeresis
        0xE9 => '\u{030C}', // caron
        0xEA => '\u{030A}', // ring above
        0xEB => '\u{FE20}', // ligature left half
        0xEC => '\u{FE21}', // ligature right half
        0xED => '\u{0315}', // comma above right
        0xEE => '\u{030B}', // double acute
        0xEF => '\u{0310}', // candrabindu
        0xF0 => '\u{0327}', // cedilla
        0xF1 => '\u{0328}', // ogonek
        0xF2 => '\u{0323}', // dot below
        0xF3 => '\u{0324}', // diaeresis below
        0xF4 => '\u{0325}', // ring below
        0xF5 => '\u{0333}', // double underscore
        0xF6 => '\u{0332}', // underscore
        0xF7 => '\u{0326}', // comma below
        0xF8 => '\u{031C}', // left half ring below
        0xF9 => '\u{032E}', // breve below
        0xFA => '\u{FE22}', // double tilde left half
        0xFB => '\u{FE23}', // double tilde right half
        0xFE => '\u{0313}', // comma above
        _ => return None,
    };
    Some((combining, true))
}

fn subscript(byte: u8) -> Option<char> {
    match byte {
        b'0'..=b'9' => char::from_u32(0x2080 + u32::from(byte - b'0')),
        b'+' => Some('\u{208A}'),
        b'-' => Some('\u{208B}'),
        b'(' => Some('\u{208D}'),
        b')' => Some('\u{208E}'),
        _ => None,
    }
}

fn superscript(byte: u8) -> Option<char> {
    match byte {
        b'0' => Some('\u{2070}'),
        b'1' => Some('\u{00B9}'),
        b'2' => Some('\u{00B2}'),
        b'3' => Some('\u{00B3}'),
        b'4'..=b'9' => char::from_u32(0x2070 + u32::from(byte - b'0')),
        b'+' => Some('\u{207A}'),
        b'-' => Some('\u{207B}'),
        b'(' => Some('\u{207D}'),
        b')' => Some('\u{207E}'),
        _ => None,
    }
}

fn greek(byte: u8) -> Option<char> {
    match byte {
        b'a' => Some('\u{03B1}'),
        b'b' => Some('\u{03B2}'),
        b'c' => Some('\u{03B3}'),
        _ => None,
    }
}
