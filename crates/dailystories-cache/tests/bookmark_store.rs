use dailystories_cache::{BookmarkStore, SavedStory};
use tempfile::TempDir;

fn story(id: &str, name: &str, created_at: &str) -> SavedStory {
    SavedStory {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("{} went for a walk", name),
        photo_url: format!("https://story-api.dicoding.dev/images/stories/{}.jpg", id),
        created_at: created_at.to_string(),
        lat: Some(-6.2),
        lon: Some(106.8),
    }
}

fn temp_store() -> (TempDir, BookmarkStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = BookmarkStore::new(temp_dir.path().join("daily-stories-db.sqlite"), 1);
    (temp_dir, store)
}

#[test]
fn test_save_then_exists() {
    let (_dir, store) = temp_store();
    let s1 = story("s1", "A", "2024-01-01");

    assert!(!store.exists("s1"));
    assert!(store.save(&s1));
    assert!(store.exists("s1"));
    assert_eq!(store.get("s1"), Some(s1));
}

#[test]
fn test_delete_then_exists() {
    let (_dir, store) = temp_store();
    store.save(&story("s1", "A", "2024-01-01"));

    assert!(store.delete("s1"));
    assert!(!store.exists("s1"));
    assert!(store.get("s1").is_none());
}

#[test]
fn test_second_save_overwrites() {
    let (_dir, store) = temp_store();
    store.save(&story("s1", "A", "2024-01-01"));

    let mut updated = story("s1", "A (edited)", "2024-01-01");
    updated.lat = None;
    updated.lon = None;
    assert!(store.save(&updated));

    let all = store.list_all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0], updated);
}

#[test]
fn test_delete_missing_id_is_not_an_error() {
    let (_dir, store) = temp_store();
    store.save(&story("s1", "A", "2024-01-01"));

    assert!(store.delete("nope"));
    assert_eq!(store.list_all(), vec![story("s1", "A", "2024-01-01")]);
}

#[test]
fn test_list_all_then_sort_newest_first() {
    let (_dir, store) = temp_store();
    store.save(&story("s1", "A", "2024-01-01"));
    store.save(&story("s2", "B", "2024-02-01"));

    let mut all = store.list_all();
    assert_eq!(all.len(), 2);

    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s2", "s1"]);
}

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("daily-stories-db.sqlite");

    BookmarkStore::new(&path, 1).save(&story("s1", "A", "2024-01-01"));

    let reopened = BookmarkStore::new(&path, 1);
    assert!(reopened.exists("s1"));
}

#[test]
fn test_unavailable_storage_reports_failure() {
    let temp_dir = TempDir::new().unwrap();
    let store = BookmarkStore::new(temp_dir.path().join("missing").join("stories.db"), 1);

    assert!(!store.save(&story("s1", "A", "2024-01-01")));
    assert!(!store.exists("s1"));
    assert!(!store.delete("s1"));
    assert!(store.list_all().is_empty());
    assert!(store.get("s1").is_none());
}
