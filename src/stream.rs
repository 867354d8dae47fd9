//! Streaming MARC records from a seekable byte source.
//!
//! [`MarcStream`] frames one record at a time out of a byte stream of
//! arbitrary size: it scans forward in bounded chunks for the Record
//! Terminator (0x1D), seeks back to the record start, reads exactly that
//! record's bytes, and hands them to the deserializer. At most one record
//! is held in memory at a time.
//!
//! # Examples
//!
//! Reading records from a file:
//!
//! ```no_run
//! use marctract::MarcStream;
//!
//! let mut stream = MarcStream::open("records.mrc")?.with_skip_on_error(true);
//! for item in &mut stream {
//!     match item? {
//!         Some(record) => println!("{} fields", record.len()),
//!         None => println!("skipped a bad record"),
//!     }
//! }
//! println!("{} records failed", stream.exceptions().len());
//! # Ok::<(), marctract::MarcError>(())
//! ```

use crate::deserializer;
use crate::error::{MarcError, Result};
use crate::record::Record;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

const RECORD_TERMINATOR: u8 = 0x1D;

/// Chunk size for the terminator scan. The MARC-21 record length field is
/// five decimal digits, capping a record at 99 999 bytes; 10 MiB is
/// comfortably ample.
const BUFFER_SIZE: usize = 10 * 1024 * 1024;

/// Lazy reader of ISO 2709 binary MARC streams.
///
/// The stream owns its byte source exclusively and releases it when
/// iteration ends, on any fatal error, on [`close`](MarcStream::close), or
/// on drop. It is single-use: reading past exhaustion reports
/// [`MarcError::EndOfStream`].
///
/// Iteration yields `Result<Option<Record>>`: `Ok(Some(_))` is a decoded
/// record, `Ok(None)` marks the position of a record that failed to decode
/// while [`skip_on_error`](MarcStream::with_skip_on_error) is set (the
/// failure is retained in [`exceptions`](MarcStream::exceptions)), and
/// `Err(_)` is fatal.
#[derive(Debug)]
pub struct MarcStream<R: Read + Seek> {
    source: Option<R>,
    length: u64,
    position: u64,
    buffer: Vec<u8>,
    force_utf8: bool,
    skip_on_error: bool,
    exceptions: Vec<MarcError>,
}

impl MarcStream<File> {
    /// Open a MARC file.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::StreamInit`] when the file cannot be opened or
    /// measured.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| MarcError::StreamInit(format!("{}: {e}", path.display())))?;
        Self::new(file)
    }
}

impl<R: Read + Seek> MarcStream<R> {
    /// Wrap a seekable byte source.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::StreamInit`] when the source cannot be measured
    /// or rewound.
    pub fn new(mut source: R) -> Result<Self> {
        let length = source
            .seek(SeekFrom::End(0))
            .and_then(|length| source.seek(SeekFrom::Start(0)).map(|_| length))
            .map_err(|e| MarcError::StreamInit(e.to_string()))?;
        Ok(MarcStream {
            source: Some(source),
            length,
            position: 0,
            buffer: vec![0u8; BUFFER_SIZE],
            force_utf8: false,
            skip_on_error: false,
            exceptions: Vec::new(),
        })
    }

    /// Force UTF-8 decoding regardless of the leader's coding flag.
    #[must_use]
    pub fn with_force_utf8(mut self, force_utf8: bool) -> Self {
        self.force_utf8 = force_utf8;
        self
    }

    /// On a record-level decode failure, record the error and yield an
    /// absent record instead of failing the stream.
    #[must_use]
    pub fn with_skip_on_error(mut self, skip_on_error: bool) -> Self {
        self.skip_on_error = skip_on_error;
        self
    }

    /// Fraction of the stream consumed, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.length == 0 {
            1.0
        } else {
            self.position as f64 / self.length as f64
        }
    }

    /// Decode failures captured while skipping records.
    #[must_use]
    pub fn exceptions(&self) -> &[MarcError] {
        &self.exceptions
    }

    /// Release the underlying byte source. Reading afterwards reports
    /// [`MarcError::EndOfStream`]. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.source = None;
    }

    /// Frame and decode the next record.
    ///
    /// Returns `Ok(Some(record))` for a decoded record and `Ok(None)` for a
    /// record skipped under `skip_on_error`.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::EndOfStream`] once the stream is exhausted or
    /// closed, [`MarcError::UnexpectedEof`] when the source shrinks under a
    /// just-observed terminator, a deserializer error when `skip_on_error`
    /// is off, or an IO error from the source. Every error releases the
    /// source.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        match self.advance() {
            Err(e) => {
                self.close();
                Err(e)
            },
            ok => ok,
        }
    }

    fn advance(&mut self) -> Result<Option<Record>> {
        let record_start = self.position;
        let mut accumulated: usize = 0;

        loop {
            if record_start + accumulated as u64 >= self.length {
                // Exhausted; trailing bytes with no terminator are dropped.
                return Err(MarcError::EndOfStream);
            }
            let Some(source) = self.source.as_mut() else {
                return Err(MarcError::EndOfStream);
            };
            source.seek(SeekFrom::Start(record_start + accumulated as u64))?;
            let read = source.read(&mut self.buffer)?;
            if read == 0 {
                return Err(MarcError::EndOfStream);
            }

            let Some(terminator) = memchr::memchr(RECORD_TERMINATOR, &self.buffer[..read]) else {
                accumulated += read;
                continue;
            };

            let record_length = accumulated + terminator + 1;
            let mut record_bytes = vec![0u8; record_length];
            source.seek(SeekFrom::Start(record_start))?;
            source.read_exact(&mut record_bytes).map_err(|e| {
                if e.kind() == ErrorKind::UnexpectedEof {
                    MarcError::UnexpectedEof(
                        "Stream truncated inside a record whose terminator was observed"
                            .to_string(),
                    )
                } else {
                    MarcError::Io(e)
                }
            })?;
            self.position = record_start + record_length as u64;

            return match deserializer::from_bytes(&record_bytes, self.force_utf8) {
                Ok(record) => Ok(Some(record)),
                Err(e) if self.skip_on_error => {
                    self.exceptions.push(e);
                    Ok(None)
                },
                Err(e) => Err(e),
            };
        }
    }
}

impl<R: Read + Seek> Iterator for MarcStream<R> {
    type Item = Result<Option<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_record() {
            Err(MarcError::EndOfStream) => None,
            item => Some(item),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ControlField, DataField, Field};
    use std::io::Cursor;

    fn sample_record(id: &str) -> Record {
        let mut record = Record::new("00000nam a2200000   4500");
        record.add_field(Field::Control(ControlField::new("001", id).unwrap()));
        let mut field = DataField::new("245", '1', '0').unwrap();
        field.add_subfield('a', format!("Title {id}"));
        record.add_field(Field::Data(field));
        record
    }

    fn stream_of(records: &[Record]) -> MarcStream<Cursor<Vec<u8>>> {
        let mut bytes = Vec::new();
        for record in records {
            bytes.extend_from_slice(record.to_marc21().as_bytes());
        }
        MarcStream::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_reads_all_records_in_order() {
        let records = vec![sample_record("one"), sample_record("two"), sample_record("three")];
        let stream = stream_of(&records);

        let read: Vec<Record> = stream.map(|item| item.unwrap().unwrap()).collect();
        assert_eq!(read.len(), 3);
        for (got, want) in read.iter().zip(records.iter()) {
            assert_eq!(got, want);
        }
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        let mut stream = MarcStream::new(Cursor::new(Vec::new())).unwrap();
        assert!(stream.next().is_none());
        assert!((stream.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_read_after_exhaustion_is_end_of_stream() {
        let mut stream = stream_of(&[sample_record("one")]);
        assert!(stream.read_record().unwrap().is_some());
        assert!(matches!(
            stream.read_record(),
            Err(MarcError::EndOfStream)
        ));
        // And again, after the source has been released.
        assert!(matches!(
            stream.read_record(),
            Err(MarcError::EndOfStream)
        ));
    }

    #[test]
    fn test_skip_on_error_yields_absent_record() {
        let good = sample_record("one");
        let mut bytes = Vec::new();
        // First record: leader not ending in 4500.
        let bad = good.to_marc21().replace("4500", "9999");
        bytes.extend_from_slice(bad.as_bytes());
        bytes.extend_from_slice(good.to_marc21().as_bytes());

        let mut stream = MarcStream::new(Cursor::new(bytes))
            .unwrap()
            .with_skip_on_error(true);

        assert!(stream.read_record().unwrap().is_none());
        assert!(stream.read_record().unwrap().is_some());
        assert!(matches!(
            stream.read_record(),
            Err(MarcError::EndOfStream)
        ));
        assert_eq!(stream.exceptions().len(), 1);
        assert!(matches!(
            stream.exceptions()[0],
            MarcError::InvalidLeader(_)
        ));
    }

    #[test]
    fn test_fail_fast_propagates_and_closes() {
        let good = sample_record("one");
        let mut bytes = Vec::new();
        let bad = good.to_marc21().replace("4500", "9999");
        bytes.extend_from_slice(bad.as_bytes());
        bytes.extend_from_slice(good.to_marc21().as_bytes());

        let mut stream = MarcStream::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            stream.read_record(),
            Err(MarcError::InvalidLeader(_))
        ));
        // The source was released; further reads see a closed stream.
        assert!(matches!(
            stream.read_record(),
            Err(MarcError::EndOfStream)
        ));
    }

    #[test]
    fn test_progress_advances() {
        let mut stream = stream_of(&[sample_record("one"), sample_record("two")]);
        assert!(stream.progress().abs() < f64::EPSILON);
        stream.read_record().unwrap();
        let halfway = stream.progress();
        assert!(halfway > 0.0 && halfway < 1.0);
        stream.read_record().unwrap();
        assert!((stream.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trailing_garbage_without_terminator_is_dropped() {
        let mut bytes = sample_record("one").to_marc21().into_bytes();
        bytes.extend_from_slice(b"garbage with no terminator");
        let mut stream = MarcStream::new(Cursor::new(bytes)).unwrap();
        assert!(stream.read_record().unwrap().is_some());
        assert!(matches!(
            stream.read_record(),
            Err(MarcError::EndOfStream)
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut stream = stream_of(&[sample_record("one")]);
        stream.close();
        stream.close();
        assert!(matches!(
            stream.read_record(),
            Err(MarcError::EndOfStream)
        ));
    }

    #[test]
    fn test_iterator_interface() {
        let stream = stream_of(&[sample_record("one"), sample_record("two")]);
        let count = stream.filter_map(|item| item.unwrap()).count();
        assert_eq!(count, 2);
    }
}
