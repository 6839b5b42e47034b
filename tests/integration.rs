//! Integration tests: build data files, write them, read them back and compare with the declared rows.

use recordlayout::{
    DataFile, DataRecord, Directive, ErrorMode, LayoutError, Settings, Value,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn settings() -> Arc<Settings> {
    Arc::new(Settings::default())
}

fn path_in(dir: &Path, name: &str) -> String {
    dir.join(name).display().to_string()
}

#[test]
fn test_auto_width_grows_to_longest_value() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(dir.path(), "auto.dat");
    let mut file = DataFile::fixed_length(path.clone(), settings()).expect("file");
    file.new_fragment()
        .set_record_type("user")
        .set_names(&["id", "name"])
        .expect("names")
        .set_types(&["半角", "半角"])
        .expect("types")
        .set_lengths(&["4", "-"])
        .expect("lengths")
        .add_row(&["1", "abc"])
        .add_row(&["22", "wxyz"]);

    let fragment = &file.fragments()[0];
    assert_eq!(fragment.lengths(), ["4".to_string(), "4".to_string()]);
    assert_eq!(fragment.length_of("name").expect("width"), 4);
    assert_eq!(fragment.record_length().expect("record length"), 8);

    file.write().expect("write");
    assert_eq!(fs::read(&path).expect("read file"), b"1   abc 22  wxyz".to_vec());

    let layout = file.create_layout().expect("layout");
    assert_eq!(layout.directives.int(Directive::RecordLength), Some(8));

    let records = file.read().expect("read");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("name"), Some(&Value::text("abc")));
    assert_eq!(records[1].get("id"), Some(&Value::text("22")));
    assert_eq!(records, file.expected_records().expect("expected"));
}

#[test]
fn test_auto_width_strips_line_breaks() {
    let mut file = DataFile::fixed_length("unused.dat", settings()).expect("file");
    file.new_fragment()
        .set_record_type("memo")
        .set_names(&["text"])
        .expect("names")
        .set_types(&["半角"])
        .expect("types")
        .set_lengths(&["-"])
        .expect("lengths")
        .add_row(&["ab \r\n cd"]);
    let fragment = &file.fragments()[0];
    assert_eq!(fragment.lengths(), ["4".to_string()]);
    assert_eq!(fragment.rows()[0].values.get("text").map(String::as_str), Some("abcd"));
}

#[test]
fn test_duplicate_names_rejected() {
    let mut file = DataFile::fixed_length("dup.dat", settings()).expect("file");
    let err = file
        .new_fragment()
        .set_names(&["foo", "bar", "buz", "foo", "buz"])
        .err()
        .expect("duplicate names must fail");
    let msg = err.to_string();
    assert!(matches!(err, LayoutError::Config(_)), "{:?}", err);
    assert!(msg.contains("duplicate field=[foo, buz]"), "{}", msg);
    assert!(msg.contains("file=[dup.dat]"), "{}", msg);
}

#[test]
fn test_types_and_lengths_must_match_names() {
    let mut file = DataFile::fixed_length("size.dat", settings()).expect("file");
    let mut fragment = file.new_fragment();
    fragment.set_names(&["a", "b"]).expect("names");
    let err = fragment.set_types(&["半角"]).err().expect("size mismatch");
    assert!(err.to_string().contains("field name size is 2. but types size is 1."), "{}", err);
    let err = fragment.set_lengths(&["1", "2", "3"]).err().expect("size mismatch");
    assert!(err.to_string().contains("but lengths size is 3."), "{}", err);
}

#[test]
fn test_unknown_type_label_rejected() {
    let mut file = DataFile::fixed_length("label.dat", settings()).expect("file");
    let mut fragment = file.new_fragment();
    fragment.set_names(&["a"]).expect("names");
    let err = fragment.set_types(&["no-such-label"]).err().expect("unknown label");
    assert!(err.to_string().contains("can't convert value [no-such-label]"), "{}", err);
}

#[test]
fn test_record_length_differs() {
    let mut file = DataFile::fixed_length("differ.dat", settings()).expect("file");
    file.new_fragment()
        .set_record_type("short")
        .set_names(&["a"])
        .expect("names")
        .set_types(&["半角"])
        .expect("types")
        .set_lengths(&["3"])
        .expect("lengths")
        .add_row(&["x"]);
    file.new_fragment()
        .set_record_type("long")
        .set_names(&["a"])
        .expect("names")
        .set_types(&["半角"])
        .expect("types")
        .set_lengths(&["4"])
        .expect("lengths")
        .add_row(&["y"]);
    let err = file.create_layout().expect_err("lengths differ");
    let msg = err.to_string();
    assert!(matches!(err, LayoutError::State(_)), "{:?}", err);
    assert!(msg.contains("record-length differs."), "{}", msg);
    assert!(msg.contains("short=3") && msg.contains("long=4"), "{}", msg);
    assert!(file.write().is_err());
}

#[test]
fn test_binary_values_are_zero_padded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(dir.path(), "bin.dat");
    let mut file = DataFile::fixed_length(path.clone(), settings()).expect("file");
    file.new_fragment()
        .set_record_type("blob")
        .set_names(&["data"])
        .expect("names")
        .set_types(&["バイナリ"])
        .expect("types")
        .set_lengths(&["4"])
        .expect("lengths")
        .add_row(&["0x0A0B"]);
    file.write().expect("write");
    assert_eq!(fs::read(&path).expect("read file"), vec![0x0A, 0x0B, 0x00, 0x00]);

    let records = file.read().expect("read");
    assert_eq!(records[0].get("data"), Some(&Value::Bytes(vec![0x0A, 0x0B, 0x00, 0x00])));
    assert_eq!(records, file.expected_records().expect("expected"));
}

#[test]
fn test_binary_overflow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut file = DataFile::fixed_length(path_in(dir.path(), "over.dat"), settings()).expect("file");
    file.new_fragment()
        .set_record_type("blob")
        .set_names(&["data"])
        .expect("names")
        .set_types(&["バイナリ"])
        .expect("types")
        .set_lengths(&["2"])
        .expect("lengths")
        .add_row(&["0x010203"]);
    match file.write() {
        Err(LayoutError::Overflow { field, value, limit }) => {
            assert_eq!(field, "data");
            assert_eq!(value, "0x010203");
            assert_eq!(limit, 2);
        }
        other => panic!("expected overflow, got {:?}", other),
    }
}

#[test]
fn test_numeric_fields_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(dir.path(), "num.dat");
    let mut file = DataFile::fixed_length(path.clone(), settings()).expect("file");
    file.set_directive("record-separator", "CRLF").expect("directive");
    file.new_fragment()
        .set_record_type("amounts")
        .set_names(&["zoned", "packed", "code"])
        .expect("names")
        .set_types(&["符号無ゾーン10進数", "符号付パック10進数", "符号無数値"])
        .expect("types")
        .set_lengths(&["5", "3", "5"])
        .expect("lengths")
        .add_row(&["42", "-123", "00042"])
        .add_row(&["", "7", "12345"]);
    file.write().expect("write");

    let bytes = fs::read(&path).expect("read file");
    assert_eq!(bytes.len(), 2 * (13 + 2));
    assert_eq!(&bytes[..5], b"00042");
    assert_eq!(&bytes[5..8], &[0x00u8, 0x12, 0x37]);
    assert_eq!(&bytes[13..15], b"\r\n");

    let records = file.read().expect("read");
    assert_eq!(records[0].get("zoned"), Some(&Value::Number(42)));
    assert_eq!(records[0].get("packed"), Some(&Value::Number(-123)));
    assert_eq!(records[0].get("code"), Some(&Value::text("00042")));
    assert_eq!(records[1].get("zoned"), Some(&Value::Number(0)));
    assert_eq!(records, file.expected_records().expect("expected"));
}

#[test]
fn test_number_strings_are_zero_padded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(dir.path(), "numstr.dat");
    let mut file = DataFile::fixed_length(path.clone(), settings()).expect("file");
    file.new_fragment()
        .set_record_type("codes")
        .set_names(&["code", "signed"])
        .expect("names")
        .set_types(&["符号無数値", "符号付数値"])
        .expect("types")
        .set_lengths(&["5", "5"])
        .expect("lengths")
        .add_row(&["12", "-12"]);
    file.write().expect("write");
    assert_eq!(fs::read(&path).expect("read file"), b"00012-0012".to_vec());

    let records = file.read().expect("read");
    assert_eq!(records[0].get("code"), Some(&Value::text("00012")));
    assert_eq!(records[0].get("signed"), Some(&Value::text("-0012")));
    assert_eq!(records, file.expected_records().expect("expected"));
}

#[test]
fn test_auto_width_number_string_column() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(dir.path(), "autonum.dat");
    let mut file = DataFile::fixed_length(path.clone(), settings()).expect("file");
    file.new_fragment()
        .set_record_type("codes")
        .set_names(&["code"])
        .expect("names")
        .set_types(&["符号無数値"])
        .expect("types")
        .set_lengths(&["-"])
        .expect("lengths")
        .add_row(&["7"])
        .add_row(&["123"]);
    assert_eq!(file.fragments()[0].length_of("code").expect("width"), 3);
    file.write().expect("write");
    assert_eq!(fs::read(&path).expect("read file"), b"007123".to_vec());

    let records = file.read().expect("read");
    assert_eq!(records[0].get("code"), Some(&Value::text("007")));
    assert_eq!(records, file.expected_records().expect("expected"));
}

#[test]
fn test_every_default_type_round_trips_in_shift_jis() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(dir.path(), "alltypes.dat");
    let mut file = DataFile::fixed_length(path.clone(), settings()).expect("file");
    file.set_directive("text-encoding", "Shift_JIS").expect("directive");
    file.new_fragment()
        .set_record_type("all")
        .set_names(&["x", "n", "xn", "z", "sz", "p", "sp", "x9", "sx9", "b"])
        .expect("names")
        .set_types(&[
            "半角",
            "全角",
            "全半角",
            "符号無ゾーン10進数",
            "符号付ゾーン10進数",
            "符号無パック10進数",
            "符号付パック10進数",
            "符号無数値",
            "符号付数値",
            "バイナリ",
        ])
        .expect("types")
        .set_lengths(&["5", "4", "5", "5", "5", "3", "3", "5", "5", "2"])
        .expect("lengths")
        .add_row(&["ab", "あ", "aあ", "42", "-42", "123", "-7", "12", "-12", "0x0A"])
        .add_row(&["", "", "x", "", "3", "", "99999", "", "7", "0x01"]);
    assert_eq!(file.fragments()[0].record_length().expect("record length"), 42);
    file.write().expect("write");

    let bytes = fs::read(&path).expect("read file");
    assert_eq!(bytes.len(), 2 * 42);
    assert_eq!(&bytes[30..40], b"00012-0012");
    assert_eq!(&bytes[40..42], &[0x0Au8, 0x00]);

    let records = file.read().expect("read");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("n"), Some(&Value::text("あ")));
    assert_eq!(records[0].get("xn"), Some(&Value::text("aあ")));
    assert_eq!(records[0].get("sz"), Some(&Value::Number(-42)));
    assert_eq!(records[0].get("sp"), Some(&Value::Number(-7)));
    assert_eq!(records[1].get("z"), Some(&Value::Number(0)));
    assert_eq!(records[1].get("sp"), Some(&Value::Number(99999)));
    assert_eq!(records, file.expected_records().expect("expected"));
}

#[test]
fn test_record_length_with_names_shorter_than_lengths() {
    let mut file = DataFile::fixed_length("shrunk.dat", settings()).expect("file");
    file.new_fragment()
        .set_names(&["a", "b"])
        .expect("names")
        .set_types(&["半角", "半角"])
        .expect("types")
        .set_lengths(&["1", "x"])
        .expect("lengths")
        .set_names(&["a"])
        .expect("names");
    let err = file.fragments()[0].record_length().err().expect("bad width must fail");
    assert!(matches!(err, LayoutError::State(_)), "{:?}", err);
    assert!(err.to_string().contains("field length [x]"), "{}", err);
}

#[test]
fn test_double_byte_field_in_shift_jis() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(dir.path(), "sjis.dat");
    let mut file = DataFile::fixed_length(path.clone(), settings()).expect("file");
    file.set_directive("text-encoding", "Shift_JIS").expect("directive");
    file.new_fragment()
        .set_record_type("kana")
        .set_names(&["word"])
        .expect("names")
        .set_types(&["全角"])
        .expect("types")
        .set_lengths(&["-"])
        .expect("lengths")
        .add_row(&["あい"])
        .add_row(&["う"]);
    assert_eq!(file.fragments()[0].length_of("word").expect("width"), 4);
    file.write().expect("write");
    assert_eq!(fs::read(&path).expect("read file").len(), 8);

    let records = file.read().expect("read");
    assert_eq!(records[1].get("word"), Some(&Value::text("う")));
    assert_eq!(records, file.expected_records().expect("expected"));
}

#[test]
fn test_variable_length_quoting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(dir.path(), "quoted.csv");
    let mut file = DataFile::variable_length(path.clone(), settings()).expect("file");
    file.set_directive("record-separator", "LF").expect("directive");
    file.new_fragment()
        .set_record_type("pair")
        .set_names(&["key", "text"])
        .expect("names")
        .set_types(&["半角", "半角"])
        .expect("types")
        .add_row(&["x", "a,b"])
        .add_row(&["y", "say \"hi\""]);
    file.write().expect("write");
    assert_eq!(
        fs::read_to_string(&path).expect("read file"),
        "x,\"a,b\"\ny,\"say \"\"hi\"\"\"\n"
    );

    let records = file.read().expect("read");
    assert_eq!(records[0].get("text"), Some(&Value::text("a,b")));
    assert_eq!(records[1].get("text"), Some(&Value::text("say \"hi\"")));
    assert_eq!(records, file.expected_records().expect("expected"));
}

#[test]
fn test_variable_length_requires_record_separator() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut file = DataFile::variable_length(path_in(dir.path(), "nosep.csv"), settings()).expect("file");
    file.new_fragment()
        .set_record_type("r")
        .set_names(&["a"])
        .expect("names")
        .set_types(&["半角"])
        .expect("types")
        .add_row(&["1"]);
    let err = file.write().expect_err("separator is required");
    assert!(err.to_string().contains("record-separator"), "{}", err);
}

#[test]
fn test_settings_seed_directives() {
    let mut s = Settings::default();
    s.variable_length_directives.insert("record-separator".into(), "CRLF".into());
    s.variable_length_directives.insert("field-separator".into(), "\\t".into());
    let file = DataFile::variable_length("seeded.tsv", Arc::new(s)).expect("file");
    assert_eq!(file.directives().text(Directive::RecordSeparator), Some("\r\n"));
    assert_eq!(file.directives().text(Directive::FieldSeparator), Some("\t"));
}

#[test]
fn test_mock_message_error_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(dir.path(), "messages.dat");
    let mut file = DataFile::mock_messages(path.clone(), settings()).expect("file");
    file.new_fragment()
        .set_record_type("reply")
        .set_names(&["status", "msg"])
        .expect("names")
        .set_types(&["半角", "半角"])
        .expect("types")
        .set_lengths(&["-", "-"])
        .expect("lengths")
        .add_row_with_id("1", &["OK", "hello"])
        .add_row_with_id("2", &["errorMode:timeout"])
        .add_row_with_id("3", &["errorMode:msgException", "ignored"]);

    let fragment = &file.fragments()[0];
    assert_eq!(fragment.lengths(), ["2".to_string(), "5".to_string()]);
    assert_eq!(fragment.rows()[1].error_mode, Some(ErrorMode::Timeout));
    assert_eq!(fragment.rows()[2].error_mode, Some(ErrorMode::MessageException));
    assert_eq!(fragment.number_of_records(), 1);

    file.write().expect("write");
    assert_eq!(fs::read(&path).expect("read file"), b"OKhello".to_vec());

    let expected = file.expected_records().expect("expected");
    assert_eq!(expected.len(), 3);
    assert_eq!(expected[0].row_number.as_deref(), Some("1"));
    assert_eq!(expected[1].get("status"), Some(&Value::text("errorMode:timeout")));
    assert_eq!(expected[1].get("msg"), None);

    let read = file.read().expect("read");
    let mut first = expected[0].clone();
    first.row_number = None;
    assert_eq!(read, vec![first]);
}

#[test]
fn test_expected_records_keep_row_number() {
    let mut file = DataFile::fixed_length("rows.dat", settings()).expect("file");
    file.new_fragment()
        .set_record_type("r")
        .set_names(&["v"])
        .expect("names")
        .set_types(&["半角"])
        .expect("types")
        .set_lengths(&["3"])
        .expect("lengths")
        .add_row_with_id("007", &["a"]);
    let expected = file.expected_records().expect("expected");
    let mut want = DataRecord::new("r");
    want.row_number = Some("007".to_string());
    want.insert("v", Value::text("a"));
    assert_eq!(expected, vec![want]);
}

#[test]
fn test_write_failure_reports_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = path_in(&dir.path().join("missing-dir"), "x.dat");
    let mut file = DataFile::fixed_length(path.clone(), settings()).expect("file");
    file.new_fragment()
        .set_record_type("r")
        .set_names(&["v"])
        .expect("names")
        .set_types(&["半角"])
        .expect("types")
        .set_lengths(&["1"])
        .expect("lengths")
        .add_row(&["a"]);
    match file.write() {
        Err(LayoutError::Io { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected I/O error, got {:?}", other),
    }
}
