use std::fs;

use filemind_core::types::ChunkRecord;
use filemind_core::Error;
use filemind_vector::{StoreHandle, VectorStore};

fn rec(path: &str, n: usize, embedding: Vec<f32>) -> ChunkRecord {
    ChunkRecord {
        id: format!("{path}:{n}"),
        source_path: path.to_string(),
        source_name: path.rsplit('/').next().unwrap_or(path).to_string(),
        embedding,
        preview_text: format!("text {n}"),
    }
}

#[test]
fn absent_file_loads_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let store = VectorStore::load(&tmp.path().join("nope.json")).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.size(), 0);
    assert_eq!(store.dimension(), None);
}

#[test]
fn persist_then_load_round_trips_versioned_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested/dir/index.json");
    let store = VectorStore::from_records(vec![rec("a.txt", 0, vec![0.1, 0.2]), rec("b.txt", 0, vec![0.3, 0.4])]).unwrap();
    store.persist(&path).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["version"], 1);
    assert_eq!(raw["dimension"], 2);
    assert!(raw["updated_at"].is_string());
    assert_eq!(raw["records"][0]["sourcePath"], "a.txt");
    assert_eq!(raw["records"][1]["previewText"], "text 0");

    let loaded = VectorStore::load(&path).unwrap();
    assert_eq!(loaded, store);

    // only the final file remains; the temp file was renamed into place
    let names: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(names, vec![std::ffi::OsString::from("index.json")]);
}

#[test]
fn legacy_bare_array_is_accepted() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("index.json");
    let legacy = serde_json::to_string(&vec![rec("x.md", 0, vec![1.0, 0.0, 0.0])]).unwrap();
    fs::write(&path, legacy).unwrap();

    let store = VectorStore::load(&path).unwrap();
    assert_eq!(store.size(), 1);
    assert_eq!(store.records()[0].source_name, "x.md");

    store.persist(&path).unwrap();
    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["version"], 1);
}

#[test]
fn unreadable_contents_are_corrupt() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("index.json");
    let cases = [
        "{not json",
        "",
        "42",
        r#"{"records":[]}"#,
        r#"{"version":2,"records":[]}"#,
        r#"{"version":1,"dimension":3,"records":[{"id":"1","sourcePath":"a","sourceName":"a","embedding":[1.0],"previewText":"t"}]}"#,
        r#"[{"id":"1","sourcePath":"a","sourceName":"a","embedding":[1.0],"previewText":"t"},
            {"id":"2","sourcePath":"b","sourceName":"b","embedding":[1.0,2.0],"previewText":"t"}]"#,
    ];
    for body in cases {
        fs::write(&path, body).unwrap();
        let err = VectorStore::load(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptIndex { .. }), "expected corrupt index for {body:?}, got {err:?}");
    }
}

#[test]
fn merge_keeps_exactly_the_new_generation_per_path() {
    let old = VectorStore::from_records(vec![
        rec("docs/a.txt", 0, vec![1.0, 0.0]),
        rec("docs/a.txt", 1, vec![1.0, 0.0]),
        rec("docs/a.txt", 2, vec![1.0, 0.0]),
        rec("docs/b.txt", 0, vec![0.0, 1.0]),
    ])
    .unwrap();
    let fresh = vec![rec("docs/a.txt", 10, vec![0.5, 0.5]), rec("docs/c.txt", 0, vec![0.5, 0.5])];
    let merged = old.merge(fresh).unwrap();

    assert_eq!(merged.count_for("docs/a.txt"), 1);
    assert_eq!(merged.count_for("docs/b.txt"), 1);
    assert_eq!(merged.count_for("docs/c.txt"), 1);
    assert!(merged.records().iter().all(|r| r.id != "docs/a.txt:0"));

    // paths without new records keep their old ones
    let unchanged = merged.merge(Vec::new()).unwrap();
    assert_eq!(unchanged, merged);
}

#[tokio::test]
async fn handle_commit_persists_before_swapping() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("index.json");
    let handle = StoreHandle::open(&path).unwrap();
    let status = handle.status().await;
    assert!(!status.has_index);
    assert_eq!(status.count, 0);

    let next = VectorStore::from_records(vec![rec("a", 0, vec![1.0])]).unwrap();
    handle.commit(next).await.unwrap();
    assert_eq!(handle.status().await.count, 1);
    assert_eq!(VectorStore::load(&path).unwrap().size(), 1);

    // a parent that is a regular file cannot hold the index
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "x").unwrap();
    let broken = StoreHandle::with_store(blocker.join("index.json"), VectorStore::new());
    let err = broken.commit(VectorStore::from_records(vec![rec("a", 0, vec![1.0])]).unwrap()).await.unwrap_err();
    assert!(matches!(err, Error::Persist { .. }));
    assert_eq!(broken.status().await.count, 0);
}
