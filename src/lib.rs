#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # marctract
//!
//! A Rust library for streaming, decoding, and querying MARC-21
//! bibliographic records in the ISO 2709 binary format.
//!
//! ## Quick Start
//!
//! ### Streaming records from a file
//!
//! ```ignore
//! use marctract::MarcStream;
//!
//! # fn main() -> Result<(), marctract::MarcError> {
//! let mut stream = MarcStream::open("records.mrc")?.with_skip_on_error(true);
//! for item in &mut stream {
//!     if let Some(record) = item? {
//!         println!("{} fields, {} warnings", record.len(), record.warnings().len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Extracting values with patterns
//!
//! ```ignore
//! use marctract::{ExtractorOptions, PatternExtractor};
//!
//! # fn main() -> Result<(), marctract::MarcError> {
//! # let record = marctract::Record::new("00000nam a2200000   4500");
//! let title = PatternExtractor::with_options(
//!     "245a",
//!     ExtractorOptions::default().with_first(true).with_trim_punctuation(true),
//! )?;
//! for value in title.extract(&record) {
//!     println!("Title: {value}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`record`] — Core record structures (`Record`, `Field`, `Subfield`)
//! - [`stream`] — Lazy framing of records out of a byte stream
//! - [`deserializer`] — Decoding MARC-21 transmission format
//! - [`leader`] — Leader constants and structural validation
//! - [`extractor`] — Compiled Traject-style extraction patterns
//! - [`encoding`] — Character encoding support (MARC-8 and UTF-8)
//! - [`field_linkage`] — 880/subfield-6 linkage parsing
//! - [`error`] — Error types and result type

pub mod deserializer;
pub mod encoding;
pub mod error;
pub mod extractor;
pub mod field_linkage;
pub mod leader;
/// Core MARC record structures (`Record`, `Field`, `Subfield`)
pub mod record;
pub mod stream;

pub use encoding::{Marc8Decode, Marc8Decoder};
pub use error::{MarcError, Result};
pub use extractor::{trim_punctuation, AlternateField, ExtractorOptions, PatternExtractor};
pub use field_linkage::LinkageInfo;
pub use leader::{
    DIRECTORY_ENTRY_LEN, FIELD_TERMINATOR, LEADER_LEN, RECORD_TERMINATOR, SUBFIELD_DELIMITER,
};
pub use record::{ControlField, DataField, Field, Record, Subfield};
pub use stream::MarcStream;
