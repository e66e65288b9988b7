use std::io::Write;

use das_config::load_rate_table_csv;
use tempfile::NamedTempFile;

fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_an_ascending_table() {
    let file = write_csv("min_period,sampling_hz\n2400,40000\n3025,32000\n3900,25000\n");
    let table = load_rate_table_csv(file.path()).unwrap();
    assert_eq!(table, vec![(2400, 40000), (3025, 32000), (3900, 25000)]);
}

#[test]
fn rejects_unordered_periods() {
    let file = write_csv("min_period,sampling_hz\n3900,25000\n2400,40000\n");
    let err = load_rate_table_csv(file.path()).unwrap_err();
    assert!(err.to_string().contains("ascending"));
}

#[test]
fn rejects_empty_tables() {
    let file = write_csv("min_period,sampling_hz\n");
    assert!(load_rate_table_csv(file.path()).is_err());
}

#[test]
fn rejects_garbage_rows() {
    let file = write_csv("min_period,sampling_hz\ntwo,fast\n");
    assert!(load_rate_table_csv(file.path()).is_err());
}
