//! Round-trip law: serializing a well-formed record and deserializing the
//! result yields a record with identical MARC-21 serialization and no
//! warnings.

use marctract::{deserializer, ControlField, DataField, Field, Record};
use proptest::prelude::*;

/// Printable ASCII, which keeps generated data clear of the structural
/// terminator bytes.
const DATA: &str = "[ -~]{0,20}";

fn subfield_code() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('0', '9'),
    ]
}

fn indicator() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('0', '9'),
        Just(' '),
    ]
}

fn control_field() -> impl Strategy<Value = Field> {
    ("00[1-9]", DATA).prop_map(|(tag, data)| {
        Field::Control(ControlField::new(tag, data).expect("generated control tag is valid"))
    })
}

fn data_field() -> impl Strategy<Value = Field> {
    (
        "[1-9][0-9]{2}",
        indicator(),
        indicator(),
        prop::collection::vec((subfield_code(), DATA), 1..5),
    )
        .prop_map(|(tag, ind1, ind2, subfields)| {
            let mut field =
                DataField::new(tag, ind1, ind2).expect("generated data tag is valid");
            for (code, data) in subfields {
                field.add_subfield(code, data);
            }
            Field::Data(field)
        })
}

fn record() -> impl Strategy<Value = Record> {
    prop::collection::vec(prop_oneof![control_field(), data_field()], 0..6).prop_map(|fields| {
        let mut record = Record::new("00000nam a2200000   4500");
        for field in fields {
            record.add_field(field);
        }
        record
    })
}

proptest! {
    #[test]
    fn round_trip_preserves_serialization(record in record()) {
        let marc = record.to_marc21();
        let parsed = deserializer::from_str(&marc).expect("serialized record parses");
        prop_assert!(parsed.warnings().is_empty(), "warnings: {:?}", parsed.warnings());
        prop_assert_eq!(&parsed, &record);
        prop_assert_eq!(parsed.to_marc21(), marc);
    }

    #[test]
    fn bytes_and_string_entry_points_agree(record in record()) {
        let marc = record.to_marc21();
        let from_string = deserializer::from_str(&marc).expect("string entry point");
        let from_bytes =
            deserializer::from_bytes(marc.as_bytes(), false).expect("bytes entry point");
        prop_assert_eq!(from_string.to_marc21(), from_bytes.to_marc21());
    }

    #[test]
    fn compiled_patterns_are_idempotent(record in record()) {
        let first = marctract::PatternExtractor::new("245a:001").expect("pattern compiles");
        let second = marctract::PatternExtractor::new("245a:001").expect("pattern compiles");
        prop_assert_eq!(first.extract(&record), second.extract(&record));
    }
}
