//! Split and view tests.
//!
//! Splits are named, ordered key lists; a reader's view is either the
//! whole file or the union of the splits named by a `+`-joined selector,
//! with first-occurrence ordering.

use fdd::{FddError, Key, Reader, Value, Writer};
use tempfile::TempDir;

fn write_six_keys(path: &std::path::Path) {
    let mut writer = Writer::create(path).unwrap();
    for i in 1..=6i64 {
        writer
            .set(format!("k{}", i), format!("v{}", i))
            .unwrap();
    }
    writer
        .make_split("train", [Key::from("k1"), Key::from("k2"), Key::from("k3")])
        .unwrap();
    writer
        .make_split("val", [Key::from("k4"), Key::from("k5")])
        .unwrap();
    writer.make_split("test", [Key::from("k6")]).unwrap();
    writer.close().unwrap();
}

#[test]
fn union_view_scopes_the_reader() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("six.fdd");
    write_six_keys(&path);

    let reader = Reader::open_split(&path, Some("train+val")).unwrap();
    let keys: Vec<String> = reader.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, ["k1", "k2", "k3", "k4", "k5"]);
    assert_eq!(reader.len(), 5);

    // k6 exists in the file but not in the active view.
    assert!(matches!(
        reader.get(&Key::from("k6")),
        Err(FddError::NotFound(_))
    ));
    assert!(!reader.contains(&Key::from("k6")));
}

#[test]
fn path_embedded_selector_is_equivalent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("six.fdd");
    write_six_keys(&path);

    let by_argument = Reader::open_split(&path, Some("train")).unwrap();
    let spec = format!("{}^train", path.display());
    let by_path = Reader::open(&spec).unwrap();

    let argument_keys: Vec<Key> = by_argument.keys().cloned().collect();
    let path_keys: Vec<Key> = by_path.keys().cloned().collect();
    assert_eq!(argument_keys, path_keys);
    assert_eq!(by_path.len(), 3);
    assert_eq!(
        by_path.get(&Key::from("k2")).unwrap().value().unwrap(),
        Value::from("v2")
    );
}

#[test]
fn union_order_dedups_on_first_occurrence() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("overlap.fdd");

    {
        let mut writer = Writer::create(&path).unwrap();
        for i in 1..=4i64 {
            writer.set(format!("k{}", i), i).unwrap();
        }
        writer
            .make_split("a", [Key::from("k1"), Key::from("k3")])
            .unwrap();
        writer
            .make_split("b", [Key::from("k3"), Key::from("k2")])
            .unwrap();
        writer.close().unwrap();
    }

    let reader = Reader::open_split(&path, Some("a+b")).unwrap();
    let keys: Vec<String> = reader.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, ["k1", "k3", "k2"]);
}

#[test]
fn unknown_split_is_not_found() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("six.fdd");
    write_six_keys(&path);

    assert!(matches!(
        Reader::open_split(&path, Some("holdout")),
        Err(FddError::NotFound(_))
    ));
}

#[test]
fn load_new_split_extends_the_view() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("six.fdd");
    write_six_keys(&path);

    let mut reader = Reader::open_split(&path, Some("train")).unwrap();
    assert_eq!(reader.len(), 3);

    reader.load_new_split("test").unwrap();
    let keys: Vec<String> = reader.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, ["k1", "k2", "k3", "k6"]);
    assert!(reader.contains(&Key::from("k6")));

    // Overlapping keys are not duplicated.
    reader.load_new_split("train").unwrap();
    assert_eq!(reader.len(), 4);

    assert!(matches!(
        reader.load_new_split("nope"),
        Err(FddError::NotFound(_))
    ));
}

#[test]
fn split_names_are_listed_in_declaration_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("six.fdd");
    write_six_keys(&path);

    let reader = Reader::open(&path).unwrap();
    let names: Vec<&str> = reader.split_names().collect();
    assert_eq!(names, ["train", "val", "test"]);
}
