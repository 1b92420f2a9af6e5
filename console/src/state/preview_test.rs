use super::*;

fn ids(raw: &[i64]) -> Vec<Id> {
    raw.iter().map(|&id| Id::from(id)).collect()
}

#[test]
fn insert_writes_file_with_extension() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = PreviewStore::open(dir.path().join("previews")).unwrap();

    let path = store.insert(&Id::from(4), "Cat.PNG", b"png-bytes").unwrap();
    assert_eq!(path.file_name().unwrap(), "preview-4.png");
    assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
    assert_eq!(store.path_of(&Id::from(4)), Some(path.as_path()));
}

#[test]
fn odd_names_fall_back_to_generic_extension() {
    assert_eq!(extension_of("archive"), "img");
    assert_eq!(extension_of("weird.ext with space"), "img");
    assert_eq!(extension_of("photo.jpeg"), "jpeg");
}

#[test]
fn ids_are_escaped_for_the_filesystem() {
    assert_eq!(file_key(&Id::new("../etc/passwd")), "_2e_2e_2fetc_2fpasswd");
    assert_eq!(file_key(&Id::new("a-1")), "a-1");
}

#[test]
fn distinct_ids_never_share_a_preview() {
    assert_ne!(file_key(&Id::new("a.b")), file_key(&Id::new("a_b")));
    assert_ne!(file_key(&Id::new("a_2eb")), file_key(&Id::new("a.b")));

    let dir = tempfile::tempdir().unwrap();
    let mut store = PreviewStore::open(dir.path()).unwrap();
    let dotted = store.insert(&Id::new("a.b"), "x.png", b"dot").unwrap();
    let underscored = store.insert(&Id::new("a_b"), "y.png", b"under").unwrap();

    assert_ne!(dotted, underscored);
    assert_eq!(std::fs::read(&dotted).unwrap(), b"dot");
    assert_eq!(std::fs::read(&underscored).unwrap(), b"under");

    let reopened = PreviewStore::open(dir.path()).unwrap();
    assert_eq!(reopened.path_of(&Id::new("a.b")), Some(dotted.as_path()));
    assert_eq!(reopened.len(), 2);
}

#[test]
fn missing_lists_undisplayed_previews_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = PreviewStore::open(dir.path()).unwrap();
    store.insert(&Id::from(2), "b.png", b"b").unwrap();

    let displayed = ids(&[3, 2, 1]);
    let missing: Vec<&str> = store.missing(&displayed).iter().map(|id| id.as_str()).collect();
    assert_eq!(missing, ["3", "1"]);
}

#[test]
fn release_except_deletes_previews_no_longer_displayed() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = PreviewStore::open(dir.path()).unwrap();
    for id in 1..=4 {
        store.insert(&Id::from(id), "x.png", b"x").unwrap();
    }
    let stale = store.path_of(&Id::from(1)).unwrap().to_path_buf();

    let released = store.release_except(&ids(&[2, 3])).unwrap();
    assert_eq!(released, 2);
    assert_eq!(store.len(), 2);
    assert!(!stale.exists());
    assert!(store.path_of(&Id::from(2)).unwrap().exists());
}

#[test]
fn reopen_indexes_existing_previews_and_ignores_other_files() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = PreviewStore::open(dir.path()).unwrap();
        store.insert(&Id::from(9), "x.jpg", b"x").unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

    let mut store = PreviewStore::open(dir.path()).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.path_of(&Id::from(9)).is_some());

    assert_eq!(store.release_all().unwrap(), 1);
    assert!(store.is_empty());
    assert!(dir.path().join("notes.txt").exists());
}

#[test]
fn reinsert_replaces_old_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = PreviewStore::open(dir.path()).unwrap();
    let first = store.insert(&Id::from(1), "a.png", b"a").unwrap();
    let second = store.insert(&Id::from(1), "a.jpg", b"b").unwrap();
    assert!(!first.exists());
    assert!(second.exists());
    assert_eq!(store.len(), 1);
}
