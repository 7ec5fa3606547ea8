use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use photo_carousel::catalog::PhotoRecord;
use photo_carousel::persist;
use photo_carousel::scan::scan_library;
use tempfile::tempdir;

#[test]
fn scan_finds_nested_images_and_skips_the_rest() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("album").join("2021")).unwrap();
    fs::create_dir_all(root.join(".thumbs")).unwrap();
    fs::write(root.join("a.jpg"), b"x").unwrap();
    fs::write(root.join("album").join("b.PNG"), b"x").unwrap();
    fs::write(root.join("album").join("2021").join("c.webp"), b"x").unwrap();
    fs::write(root.join("album").join("notes.txt"), b"x").unwrap();
    fs::write(root.join("noext"), b"x").unwrap();
    fs::write(root.join(".thumbs").join("d.jpg"), b"x").unwrap();

    let records = scan_library(root);
    let mut names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["a.jpg", "b.PNG", "c.webp"]);

    let c = records.iter().find(|r| r.name == "c.webp").unwrap();
    assert_eq!(c.folder, "2021");
    assert!(c.path.ends_with("album/2021/c.webp"));
}

#[tokio::test]
async fn records_round_trip_through_json() {
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("records.json");
    let records = vec![
        PhotoRecord {
            path: PathBuf::from("/photos/holiday/a.jpg"),
            name: "a.jpg".to_string(),
            folder: "holiday".to_string(),
            file_date: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            index: 3,
        },
        PhotoRecord {
            path: PathBuf::from("/photos/b.png"),
            name: "b.png".to_string(),
            folder: "photos".to_string(),
            file_date: Utc.with_ymd_and_hms(2023, 12, 24, 18, 30, 0).unwrap(),
            index: 0,
        },
    ];

    persist::save_records(&file, &records).await.unwrap();
    let loaded = persist::load_records(&file).await;
    assert_eq!(loaded, records);
}

#[tokio::test]
async fn missing_or_corrupt_state_files_mean_start_empty() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("nope.json");
    assert!(persist::load_records(&missing).await.is_empty());
    assert!(persist::load_names(&missing).await.is_empty());

    let corrupt = tmp.path().join("corrupt.json");
    fs::write(&corrupt, b"{not json").unwrap();
    assert!(persist::load_records(&corrupt).await.is_empty());
    assert!(persist::load_names(&corrupt).await.is_empty());
}

#[tokio::test]
async fn name_sets_round_trip_and_serialize_sorted() {
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("ignored.json");
    let names: HashSet<String> = ["zebra.jpg", "apple.jpg", "mango.jpg"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    persist::save_names(&file, &names).await.unwrap();
    assert_eq!(persist::load_names(&file).await, names);

    let raw = fs::read_to_string(&file).unwrap();
    let order: Vec<String> = serde_json::from_str(&raw).unwrap();
    assert_eq!(order, vec!["apple.jpg", "mango.jpg", "zebra.jpg"]);
}
