use std::path::Path;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use wayfare_core::config::ClientConfig;
use wayfare_core::{collections, CandidateRecord, RecordKind};

use crate::cli::{CollectionArg, ConfigCommands, SortOrder, TripCommands};
use crate::commands::book::run_book;
use crate::commands::clear::run_clear;
use crate::commands::common::{
    build_candidate, default_top_deals, format_record_lines, format_relative_time, join_words,
    parse_details, sort_records, truncate, CliContext, StoreMode,
};
use crate::commands::config::{render_config, run_config, run_config_init};
use crate::commands::deals::run_deals;
use crate::commands::remove::run_remove;
use crate::commands::save::run_save;
use crate::commands::search::run_search;
use crate::commands::trip::run_trip;
use crate::error::CliError;

fn offline_context(dir: &Path) -> CliContext {
    CliContext {
        config: ClientConfig::default(),
        config_path: dir.join("config.json"),
        db_path: dir.join("wayfare.db"),
        offline: true,
    }
}

#[test]
fn join_words_collapses_to_none_when_blank() {
    assert_eq!(
        join_words(&["Hidden".to_string(), "Cove".to_string()]),
        Some("Hidden Cove".to_string())
    );
    assert_eq!(join_words(&[]), None);
    assert_eq!(join_words(&["  ".to_string()]), None);
}

#[test]
fn build_candidate_requires_label_for_new_records() {
    let error = build_candidate(None, None, None, Some("$10".into()), None, RecordKind::Deal)
        .unwrap_err();
    assert!(matches!(error, CliError::EmptyRecord));

    let update = build_candidate(
        Some("204".to_string()),
        None,
        None,
        Some("$229".to_string()),
        None,
        RecordKind::Deal,
    )
    .unwrap();
    assert_eq!(update.id.as_deref(), Some("204"));
    assert_eq!(update.price_label.as_deref(), Some("$229"));
    assert_eq!(update.display_label, None);
}

#[test]
fn parse_details_keeps_scalar_types() {
    let details = parse_details(&[
        "travelers=2".to_string(),
        "insured=true".to_string(),
        "date = 2025-06-01".to_string(),
    ])
    .unwrap();

    assert_eq!(details["travelers"], json!(2));
    assert_eq!(details["insured"], json!(true));
    assert_eq!(details["date"], json!("2025-06-01"));
}

#[test]
fn parse_details_rejects_missing_separator() {
    assert!(matches!(
        parse_details(&["travelers".to_string()]),
        Err(CliError::InvalidDetail(_))
    ));
    assert!(matches!(
        parse_details(&["=2".to_string()]),
        Err(CliError::InvalidDetail(_))
    ));
}

#[test]
fn format_relative_time_units() {
    let now = Utc::now();
    assert_eq!(format_relative_time(now - Duration::seconds(30), now), "just now");
    assert_eq!(format_relative_time(now - Duration::minutes(2), now), "2m ago");
    assert_eq!(format_relative_time(now - Duration::hours(2), now), "2h ago");
    assert_eq!(format_relative_time(now - Duration::days(3), now), "3d ago");
    assert_eq!(format_relative_time(now + Duration::hours(1), now), "just now");
}

#[test]
fn truncate_marks_cut_text() {
    assert_eq!(truncate("Lisbon", 10), "Lisbon");
    assert_eq!(truncate("Visakhapatnam", 8), "Visak...");
}

#[test]
fn sort_records_by_price() {
    let store = wayfare_core::RecordStore::new(wayfare_core::storage::MemoryBackend::new());
    let mut deals = store.seed_if_empty(collections::TOP_DEALS, default_top_deals());

    sort_records(&mut deals, SortOrder::PriceLow);
    assert_eq!(deals[0].display_label, "Hidden Cove");

    sort_records(&mut deals, SortOrder::PriceHigh);
    assert_eq!(deals[0].display_label, "Santorini");
}

#[test]
fn default_top_deals_keep_home_page_order() {
    let ids = default_top_deals()
        .into_iter()
        .filter_map(|deal| deal.id)
        .collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec!["201", "202", "203", "204", "205", "206", "207", "208", "209"]
    );
}

#[test]
fn format_record_lines_marks_synced_records() {
    let store = wayfare_core::RecordStore::new(wayfare_core::storage::MemoryBackend::new());
    let mut fields = serde_json::Map::new();
    fields.insert("id".to_string(), json!(42));
    let record = store.upsert(
        collections::SAVED_ITEMS,
        CandidateRecord::new().city("Lisbon").price("$249").server_fields(fields),
    );

    let lines = format_record_lines(&[record]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Lisbon"));
    assert!(lines[0].contains("$249"));
    assert!(lines[0].ends_with("synced"));
}

#[test]
fn collection_args_map_to_storage_keys() {
    assert_eq!(CollectionArg::Saved.key(), "travel_saved_items_v1");
    assert_eq!(CollectionArg::Trips.key(), "travel_created_trips_v1");
    assert_eq!(CollectionArg::Bookings.key(), "travel_bookings_v1");
    assert_eq!(CollectionArg::Deals.key(), "travel_home_top_deals_v1");
}

#[tokio::test]
async fn save_remove_and_clear_round_trip_through_database() {
    let dir = tempfile::tempdir().unwrap();
    let context = offline_context(dir.path());
    let candidate = build_candidate(
        None,
        Some("Lisbon".to_string()),
        None,
        Some("$249".to_string()),
        None,
        RecordKind::Deal,
    )
    .unwrap();

    run_save(&context, CollectionArg::Saved, candidate).await.unwrap();

    let store = context.open_store(StoreMode::Local).unwrap();
    let saved = store.list(collections::SAVED_ITEMS);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].display_label, "Lisbon");
    assert!(!store.has_mirror());

    run_remove(&context, CollectionArg::Saved, &saved[0].id).unwrap();
    assert!(store.list(collections::SAVED_ITEMS).is_empty());

    let missing = run_remove(&context, CollectionArg::Saved, "nope").unwrap_err();
    assert!(matches!(missing, CliError::RecordNotFound { .. }));

    run_trip(
        &context,
        TripCommands::Add {
            city: vec!["Kyoto".to_string()],
            title: None,
            price: None,
            img: None,
        },
    )
    .unwrap();
    assert_eq!(store.list(collections::CREATED_TRIPS)[0].kind, RecordKind::Trip);

    run_clear(&context, CollectionArg::Trips).unwrap();
    assert!(store.list(collections::CREATED_TRIPS).is_empty());
}

#[test]
fn empty_record_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let context = offline_context(dir.path());
    assert!(matches!(
        run_remove(&context, CollectionArg::Saved, "   "),
        Err(CliError::EmptyRecordId)
    ));
}

#[test]
fn deals_are_seeded_once() {
    let dir = tempfile::tempdir().unwrap();
    let context = offline_context(dir.path());

    run_deals(&context, true).unwrap();
    let store = context.open_store(StoreMode::Local).unwrap();
    store.remove(collections::TOP_DEALS, "201");

    run_deals(&context, true).unwrap();
    let deals = store.list(collections::TOP_DEALS);
    assert_eq!(deals.len(), 8);
    assert_eq!(deals[0].id, "202");
}

#[tokio::test]
async fn booking_is_kept_locally_when_offline() {
    let dir = tempfile::tempdir().unwrap();
    let context = offline_context(dir.path());
    run_deals(&context, false).unwrap();

    run_book(
        &context,
        CollectionArg::Deals,
        "205",
        &["travelers=2".to_string()],
    )
    .await
    .unwrap();

    let store = context.open_store(StoreMode::Local).unwrap();
    let bookings = store.list(collections::BOOKINGS);
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].id, "205");
    assert_eq!(bookings[0].kind, RecordKind::Booking);
    assert_eq!(bookings[0].display_label, "Santorini");

    let missing = run_book(&context, CollectionArg::Saved, "205", &[])
        .await
        .unwrap_err();
    assert!(matches!(missing, CliError::RecordNotFound { .. }));
}

#[tokio::test]
async fn search_requires_backend() {
    let dir = tempfile::tempdir().unwrap();
    let context = offline_context(dir.path());

    let error = run_search(&context, &["Lisbon".to_string()], "stays", None, false)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::RemoteNotConfigured));

    let error = run_search(&context, &[], "stays", None, false)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::EmptySearchOrigin));
}

#[test]
fn config_init_merges_into_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let context = offline_context(dir.path());
    std::fs::write(&context.config_path, r#"{"user_id":"7"}"#).unwrap();

    let updated = run_config_init(
        &context,
        Some("http://localhost:8083/".to_string()),
        None,
        Some(2_500),
        Some("secret".to_string()),
    )
    .unwrap();

    assert_eq!(updated.user_id.as_deref(), Some("7"));
    assert_eq!(updated.api_base_url.as_deref(), Some("http://localhost:8083"));
    assert_eq!(updated.mirror_timeout_ms, Some(2_500));
    assert_eq!(
        ClientConfig::load_from_path(&context.config_path).unwrap(),
        updated
    );

    let rendered = render_config(&updated).unwrap();
    assert!(rendered.contains("[REDACTED]"));
    assert!(!rendered.contains("secret"));
}

#[test]
fn config_init_rejects_invalid_url() {
    let dir = tempfile::tempdir().unwrap();
    let context = offline_context(dir.path());

    let error = run_config(
        &context,
        ConfigCommands::Init {
            api_base_url: Some("localhost:8083".to_string()),
            user_id: None,
            mirror_timeout_ms: None,
            auth_token: None,
        },
    )
    .unwrap_err();
    assert!(matches!(error, CliError::Core(wayfare_core::Error::Config(_))));
    assert!(!context.config_path.exists());
}

#[test]
fn offline_context_hides_configured_backend() {
    let dir = tempfile::tempdir().unwrap();
    let mut context = offline_context(dir.path());
    context.config.api_base_url = Some("http://localhost:8083".to_string());

    assert_eq!(context.remote_base(), None);
    assert!(context.api_client().unwrap().is_none());

    context.offline = false;
    assert_eq!(context.remote_base(), Some("http://localhost:8083"));
    assert!(context.api_client().unwrap().is_some());
}
