use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use wayfare_core::api::TravelApiClient;
use wayfare_core::config::ClientConfig;
use wayfare_core::mirror::HttpMirror;
use wayfare_core::storage::SqliteBackend;
use wayfare_core::util::normalize_text_option;
use wayfare_core::{CandidateRecord, Record, RecordKind, RecordStore};

use crate::cli::SortOrder;
use crate::error::CliError;

/// Everything a command needs to reach local storage and the backend.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: ClientConfig,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub offline: bool,
}

#[derive(Clone, Copy)]
pub enum StoreMode {
    Local,
    Mirrored,
}

impl StoreMode {
    const fn mirrors(self) -> bool {
        matches!(self, Self::Mirrored)
    }
}

impl CliContext {
    /// Resolve config file, environment and flags, in increasing precedence.
    pub fn resolve(
        cli_db_path: Option<PathBuf>,
        cli_config_path: Option<PathBuf>,
        offline: bool,
    ) -> Result<Self, CliError> {
        let config_path = match cli_config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let config = ClientConfig::load_from_path(&config_path)?.with_env_overrides()?;
        let db_path = match cli_db_path.or_else(|| config.db_path.clone()) {
            Some(path) => path,
            None => default_db_path()?,
        };

        Ok(Self {
            config,
            config_path,
            db_path,
            offline,
        })
    }

    /// Backend base URL, unless running offline.
    pub fn remote_base(&self) -> Option<&str> {
        if self.offline {
            None
        } else {
            self.config.api_base_url.as_deref()
        }
    }

    pub fn open_store(&self, mode: StoreMode) -> Result<RecordStore, CliError> {
        let backend = SqliteBackend::open(&self.db_path)?;
        let store = RecordStore::builder(Arc::new(backend))
            .default_owner(self.config.user_id.clone())
            .build();

        if mode.mirrors() {
            if let Some(base) = self.remote_base() {
                let timeout = self.config.mirror_timeout();
                store.attach_mirror(HttpMirror::new(base, timeout)?, timeout)?;
                tracing::debug!("Mirroring saved records to {}", base);
            }
        }

        Ok(store)
    }

    pub fn api_client(&self) -> Result<Option<TravelApiClient>, CliError> {
        let Some(base) = self.remote_base() else {
            return Ok(None);
        };
        let client = TravelApiClient::new(base, self.config.mirror_timeout())?
            .with_auth_token(self.config.auth_token.clone());
        Ok(Some(client))
    }

    pub fn require_api_client(&self) -> Result<TravelApiClient, CliError> {
        self.api_client()?.ok_or(CliError::RemoteNotConfigured)
    }
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("wayfare").join("config.json"))
        .ok_or_else(|| CliError::Config("Failed to resolve config directory".to_string()))
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("wayfare").join("wayfare.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
}

pub fn join_words(parts: &[String]) -> Option<String> {
    normalize_text_option(Some(parts.join(" ")))
}

pub fn normalize_record_id(id: &str) -> Result<String, CliError> {
    normalize_text_option(Some(id.to_string())).ok_or(CliError::EmptyRecordId)
}

/// Candidate from command-line fields. A new record needs a city or a title;
/// an update of an existing ID may change anything.
pub fn build_candidate(
    id: Option<String>,
    city: Option<String>,
    title: Option<String>,
    price: Option<String>,
    img: Option<String>,
    kind: RecordKind,
) -> Result<CandidateRecord, CliError> {
    let id = normalize_text_option(id);
    let city = normalize_text_option(city);
    let title = normalize_text_option(title);
    if id.is_none() && city.is_none() && title.is_none() {
        return Err(CliError::EmptyRecord);
    }

    let mut candidate = CandidateRecord::new().kind(kind);
    candidate.id = id;
    candidate.display_label = city;
    candidate.title = title;
    candidate.price_label = normalize_text_option(price);
    candidate.image_ref = normalize_text_option(img);
    Ok(candidate)
}

/// Parse repeated `KEY=VALUE` flags. Values that read as JSON scalars keep
/// their type; anything else is a string.
pub fn parse_details(details: &[String]) -> Result<Map<String, Value>, CliError> {
    let mut parsed = Map::new();
    for detail in details {
        let Some((key, value)) = detail.split_once('=') else {
            return Err(CliError::InvalidDetail(detail.clone()));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::InvalidDetail(detail.clone()));
        }
        let value = value.trim();
        let value = match serde_json::from_str::<Value>(value) {
            Ok(scalar @ (Value::Number(_) | Value::Bool(_))) => scalar,
            _ => Value::String(value.to_string()),
        };
        parsed.insert(key.to_string(), value);
    }
    Ok(parsed)
}

pub fn sort_records(records: &mut [Record], order: SortOrder) {
    match order {
        SortOrder::Newest => {}
        SortOrder::PriceLow => records.sort_by_key(Record::price_amount),
        SortOrder::PriceHigh => {
            records.sort_by_key(|record| std::cmp::Reverse(record.price_amount()));
        }
    }
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    let now = Utc::now();
    records
        .iter()
        .map(|record| {
            let id = truncate(&record.id, 20);
            let label = truncate(&record.display_label, 28);
            let relative_time = format_relative_time(record.created_at, now);
            let synced = if record.server_id().is_some() { "synced" } else { "" };
            format!(
                "{id:<20}  {label:<28}  {:>8}  {relative_time:<8}  {synced}",
                record.price_label
            )
            .trim_end()
            .to_string()
        })
        .collect()
}

pub fn print_records(records: &[Record], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else if records.is_empty() {
        println!("(empty)");
    } else {
        for line in format_record_lines(records) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - timestamp).num_seconds().max(0);
    let minute = 60;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Deals shown on the home page before the user has any of their own.
pub fn default_top_deals() -> Vec<CandidateRecord> {
    [
        ("201", "Beaches", "$199", "beaches"),
        ("202", "Resorts", "$299", "resorts"),
        ("203", "Nightlife", "$349", "night"),
        ("204", "Lisbon", "$249", "lisbon"),
        ("205", "Santorini", "$399", "santorini"),
        ("206", "Kyoto", "$319", "kyoto"),
        ("207", "Pernem", "$183", "beaches"),
        ("208", "Visakhapatnam", "$199", "resorts"),
        ("209", "Hidden Cove", "$149", "santorini"),
    ]
    .into_iter()
    .map(|(id, city, price, img)| {
        CandidateRecord::new()
            .with_id(id)
            .kind(RecordKind::Deal)
            .city(city)
            .price(price)
            .image(img)
    })
    .collect()
}
