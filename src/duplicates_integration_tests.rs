//! Integration tests for the `duplicates` command's public `run()` entry
//! point, end to end through `InMemoryStackServer` (the colocated unit tests
//! in `duplicates.rs` only exercise the pure `find_duplicates` grouping).

use crate::adapter::InMemoryStackServer;
use crate::config::{Config, ConfigOverrides};
use crate::duplicates;
use crate::model::Asset;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;

fn asset(id: &str, filename: &str, secs: i64) -> Asset {
    Asset {
        id: id.to_string(),
        original_filename: filename.to_string(),
        local_datetime: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs),
        original_path: format!("/{filename}"),
        is_archived: false,
        is_trashed: false,
        stack_ref: None,
    }
}

fn test_config() -> Config {
    Config::load(ConfigOverrides {
        api_url: Some("https://photos.example.test".into()),
        api_key: Some("k".into()),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_run_reports_exact_name_and_time_duplicates() {
    let server = InMemoryStackServer::new(
        vec![
            asset("a", "IMG_1.jpg", 0),
            asset("b", "IMG_1.jpg", 0),
            asset("c", "IMG_2.jpg", 0),
        ],
        HashMap::new(),
    );
    let groups = duplicates::run(&server, &test_config()).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}

#[tokio::test]
async fn test_run_issues_no_mutating_calls() {
    let server = InMemoryStackServer::new(
        vec![asset("a", "IMG_1.jpg", 0), asset("b", "IMG_1.jpg", 0)],
        HashMap::new(),
    );
    duplicates::run(&server, &test_config()).await;
    assert!(server.written_stacks().is_empty());
    assert!(server.deleted_stacks().is_empty());
    assert!(server.trashed_calls().is_empty());
}

#[tokio::test]
async fn test_run_on_empty_account_yields_no_groups() {
    let server = InMemoryStackServer::new(vec![], HashMap::new());
    assert!(duplicates::run(&server, &test_config()).await.is_empty());
}
