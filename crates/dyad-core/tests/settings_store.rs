#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use dyad_core::settings::{ProblemCheckMode, SettingsPatch, SettingsStore, UserSettings};
use dyad_core::ClientCode;
use serde_json::{json, Value};

fn patch(v: Value) -> SettingsPatch {
    match v {
        Value::Object(map) => map,
        _ => panic!("patch must be an object"),
    }
}

fn store(dir: &tempfile::TempDir) -> SettingsStore {
    SettingsStore::with_defaults(dir.path(), UserSettings::defaults_with_user_id("test-user".into()))
}

fn on_disk(store: &SettingsStore) -> Value {
    serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap()
}

#[test]
fn first_read_materializes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::with_defaults(
        dir.path().join("nested").join("dyad"),
        UserSettings::defaults_with_user_id("test-user".into()),
    );
    assert!(!store.path().exists());

    let first = store.read().unwrap();
    assert!(store.path().exists());
    assert_eq!(&first, store.defaults());

    let second = store.read().unwrap();
    assert_eq!(first, second);
}

#[test]
fn partial_file_is_backfilled_from_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    std::fs::write(store.path(), r#"{"selectedTheme":"dark","zoomFactor":1.25}"#).unwrap();

    let s = store.read().unwrap();
    assert_eq!(s.selected_theme, "dark");
    assert_eq!(s.zoom_factor, 1.25);
    assert_eq!(s.telemetry_user_id, "test-user");
    assert_eq!(s.check_for_problems, ProblemCheckMode::OnDemand);
    assert_eq!(s.default_template, store.defaults().default_template);
}

#[test]
fn write_merges_and_leaves_other_keys_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store
        .write(patch(json!({ "selectedTheme": "solarized" })))
        .unwrap();

    let written = store.write(patch(json!({ "isRunning": true }))).unwrap();
    assert!(written.is_running);
    assert_eq!(written.selected_theme, "solarized");

    let read_back = store.read().unwrap();
    assert_eq!(read_back, written);

    let mut expected = store.defaults().clone();
    expected.selected_theme = "solarized".into();
    expected.is_running = true;
    assert_eq!(read_back, expected);
}

#[test]
fn is_running_scenario_persists_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    assert!(!store.read().unwrap().is_running);

    store.write(patch(json!({ "isRunning": true }))).unwrap();
    assert!(store.read().unwrap().is_running);
    assert_eq!(on_disk(&store)["isRunning"], true);
}

#[test]
fn corrupt_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    std::fs::write(store.path(), "{ not json").unwrap();
    assert_eq!(&store.read().unwrap(), store.defaults());

    std::fs::write(store.path(), "[1, 2, 3]").unwrap();
    assert_eq!(&store.read().unwrap(), store.defaults());

    std::fs::write(store.path(), r#"{"zoomFactor": 42}"#).unwrap();
    assert_eq!(&store.read().unwrap(), store.defaults());
}

#[test]
fn invalid_patch_is_rejected_and_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store.write(patch(json!({ "selectedTheme": "dark" }))).unwrap();
    let before = std::fs::read_to_string(store.path()).unwrap();

    let err = store
        .write(patch(json!({ "zoomFactor": 9.0 })))
        .unwrap_err();
    assert_eq!(err.client_code().as_str(), "INVALID_SETTINGS");

    let err = store
        .write(patch(json!({ "checkForProblems": "sometimes" })))
        .unwrap_err();
    assert_eq!(err.client_code().as_str(), "INVALID_SETTINGS");

    let err = store
        .write(patch(json!({ "notASetting": 1 })))
        .unwrap_err();
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");

    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
}

#[test]
fn unknown_keys_in_file_are_dropped_on_next_write() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    std::fs::write(store.path(), r#"{"legacyFlag": true, "selectedTheme": "dark"}"#).unwrap();

    assert_eq!(store.read().unwrap().selected_theme, "dark");
    store.write(patch(json!({ "hasRunBefore": true }))).unwrap();

    let disk = on_disk(&store);
    assert!(disk.get("legacyFlag").is_none());
    assert_eq!(disk["selectedTheme"], "dark");
    assert_eq!(disk["hasRunBefore"], true);
}

#[test]
fn failed_write_surfaces_io_and_keeps_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    store.write(patch(json!({ "selectedTheme": "dark" }))).unwrap();
    let before = std::fs::read_to_string(store.path()).unwrap();

    // temp file path occupied by a directory
    let tmp = dir.path().join("settings.json.tmp");
    std::fs::create_dir(&tmp).unwrap();

    let err = store
        .write(patch(json!({ "selectedTheme": "light" })))
        .unwrap_err();
    assert_eq!(err.client_code(), ClientCode::Io);
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    assert!(tmp.is_dir());
}

#[test]
fn failed_rename_removes_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir);
    // settings path occupied by a non-empty directory, so the rename fails
    std::fs::create_dir(store.path()).unwrap();
    std::fs::write(store.path().join("keep"), "x").unwrap();

    let err = store
        .write(patch(json!({ "selectedTheme": "light" })))
        .unwrap_err();
    assert_eq!(err.client_code(), ClientCode::Io);
    assert!(!dir.path().join("settings.json.tmp").exists());
    assert!(store.path().join("keep").exists());
}
