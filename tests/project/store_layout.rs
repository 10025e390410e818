use grouplock::store::PolicyStore;
use tempfile::TempDir;

const EXISTING_STORE: &str = r#"{
  "100200300": {
    "enabled": true,
    "nick": "Z",
    "original": { "m1": "Z", "m2": "Custom" },
    "count": 12,
    "cooldown": false,
    "gclock": true,
    "groupName": "Fortress"
  },
  "400500600": {
    "enabled": false,
    "original": {},
    "count": 0,
    "cooldown": true
  }
}"#;

#[tokio::test]
async fn existing_store_layout_loads_unchanged() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("groupData.json");
    std::fs::write(&path, EXISTING_STORE).unwrap();

    let store = PolicyStore::load(&path).await.unwrap();

    let locked = store.get("100200300").unwrap();
    assert!(locked.enabled);
    assert_eq!(locked.desired_nickname("m2", "LOCKED"), "Custom");
    assert_eq!(locked.desired_nickname("m9", "LOCKED"), "Z");
    assert_eq!(locked.locked_title(), Some("Fortress"));
    assert_eq!(store.nickname_locked(), vec!["100200300".to_string()]);

    let inert = store.get("400500600").unwrap();
    assert!(inert.is_inert());
    assert_eq!(inert.desired_nickname("m1", "LOCKED"), "LOCKED");
}

#[tokio::test]
async fn saved_store_keeps_the_on_disk_field_names() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("groupData.json");
    std::fs::write(&path, EXISTING_STORE).unwrap();
    let store = PolicyStore::load(&path).await.unwrap();

    store.upsert("100200300", |policy| policy.count = 13);
    store.save().await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["100200300"]["groupName"], "Fortress");
    assert_eq!(raw["100200300"]["count"], 13);
    assert!(raw["100200300"].get("group_name").is_none());
    assert_eq!(PolicyStore::load(&path).await.unwrap().len(), 2);
}
