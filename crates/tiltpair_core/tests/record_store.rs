use tiltpair_core::{
    Label, MdLocation, MdValue, MetaData, RecordStore, SqliteRecordStore, StoreError,
};

fn coordinates(points: &[(i32, i32)]) -> MetaData {
    let mut md = MetaData::new();
    for &(x, y) in points {
        let id = md.add_object();
        md.set_value(Label::XInt, x, id).unwrap();
        md.set_value(Label::YInt, y, id).unwrap();
    }
    md
}

fn read_points(md: &MetaData) -> Vec<(i32, i32)> {
    md.find_objects()
        .into_iter()
        .map(|id| {
            (
                md.get_coordinate(&Label::XInt, id).unwrap(),
                md.get_coordinate(&Label::YInt, id).unwrap(),
            )
        })
        .collect()
}

#[test]
fn write_then_read_keeps_order_and_types() {
    let dir = tempfile::tempdir().unwrap();
    let location = MdLocation::new("DefaultFamily", dir.path().join("mic1.pos"));
    let store = SqliteRecordStore::new();

    let mut md = coordinates(&[(30, 40), (10, 20), (50, 5)]);
    let first = md.find_objects()[0];
    md.set_value(Label::AngleTilt, 42.5, first).unwrap();
    md.set_value(Label::Other("comment".to_string()), "manual", first)
        .unwrap();
    store.write(&md, &location).unwrap();

    let loaded = store.read(&location).unwrap();
    assert_eq!(read_points(&loaded), vec![(30, 40), (10, 20), (50, 5)]);
    let first = loaded.find_objects()[0];
    assert_eq!(loaded.get_double(&Label::AngleTilt, first).unwrap(), 42.5);
    assert_eq!(
        loaded
            .get_value(&Label::Other("comment".to_string()), first)
            .unwrap(),
        &MdValue::Text("manual".to_string())
    );
}

#[test]
fn rewriting_a_block_replaces_its_records() {
    let dir = tempfile::tempdir().unwrap();
    let location = MdLocation::new("f", dir.path().join("mic1.pos"));
    let store = SqliteRecordStore::new();

    store
        .write(&coordinates(&[(1, 1), (2, 2), (3, 3)]), &location)
        .unwrap();
    store.write(&coordinates(&[(9, 9)]), &location).unwrap();

    assert_eq!(read_points(&store.read(&location).unwrap()), vec![(9, 9)]);
}

#[test]
fn blocks_of_one_file_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mic1.pos");
    let ribosome = MdLocation::new("ribosome", &path);
    let proteasome = MdLocation::new("proteasome", &path);
    let store = SqliteRecordStore::new();

    store.write(&coordinates(&[(1, 2)]), &ribosome).unwrap();
    store.write(&coordinates(&[(3, 4), (5, 6)]), &proteasome).unwrap();

    assert_eq!(read_points(&store.read(&ribosome).unwrap()), vec![(1, 2)]);
    assert_eq!(
        read_points(&store.read(&proteasome).unwrap()),
        vec![(3, 4), (5, 6)]
    );

    assert!(store.remove(&ribosome).unwrap());
    assert!(path.exists());
    assert!(!store.exists(&ribosome).unwrap());
    assert!(store.exists(&proteasome).unwrap());

    assert!(store.remove(&proteasome).unwrap());
    assert!(!path.exists());
}

#[test]
fn missing_file_or_block_reads_as_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mic1.pos");
    let store = SqliteRecordStore::new();

    let missing_file = MdLocation::new("f", &path);
    assert!(matches!(
        store.read(&missing_file),
        Err(StoreError::NotFound(_))
    ));
    assert!(!path.exists());
    assert!(!store.exists(&missing_file).unwrap());
    assert!(!store.remove(&missing_file).unwrap());

    store.write(&coordinates(&[(1, 1)]), &missing_file).unwrap();
    let other_block = MdLocation::new("g", &path);
    assert!(matches!(
        store.read(&other_block),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn empty_table_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let location = MdLocation::new("f", dir.path().join("empty.pos"));
    let store = SqliteRecordStore::new();

    store.write(&MetaData::new(), &location).unwrap();

    assert!(store.exists(&location).unwrap());
    assert!(store.read(&location).unwrap().is_empty());
}

#[test]
fn non_database_file_is_a_db_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.pos");
    std::fs::write(&path, vec![b'x'; 4096]).unwrap();

    let err = SqliteRecordStore::new()
        .read(&MdLocation::new("f", &path))
        .unwrap_err();
    assert!(matches!(err, StoreError::Db(_)));
}
