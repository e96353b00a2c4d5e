//! Record model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::util::{json_text, normalize_text_option};

/// Opaque fields returned by the remote mirror for a record.
pub type ServerFields = Map<String, Value>;

const DEFAULT_DISPLAY_LABEL: &str = "Unknown";
const DEFAULT_PRICE_LABEL: &str = "—";

/// What a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Deal,
    Trip,
    Story,
    Booking,
    #[serde(other)]
    Item,
}

impl RecordKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deal => "deal",
            Self::Trip => "trip",
            Self::Story => "story",
            Self::Booking => "booking",
            Self::Item => "item",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deal" => Ok(Self::Deal),
            "trip" => Ok(Self::Trip),
            "story" => Ok(Self::Story),
            "booking" => Ok(Self::Booking),
            "item" => Ok(Self::Item),
            other => Err(format!("unknown record kind '{other}'")),
        }
    }
}

/// A user-generated item of interest (saved deal, created trip, booking...).
///
/// The serialized field names match the layout the web client has always
/// written to local storage, so existing collections keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredRecord")]
pub struct Record {
    /// Unique within its collection
    pub id: String,
    pub kind: RecordKind,
    pub title: String,
    /// Primary label shown on cards (usually the destination city)
    #[serde(rename = "city")]
    pub display_label: String,
    #[serde(rename = "img")]
    pub image_ref: String,
    #[serde(rename = "price")]
    pub price_label: String,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Local creation time
    #[serde(rename = "saved_at")]
    pub created_at: DateTime<Utc>,
    /// Fields returned by the remote mirror, `None` until reconciled
    #[serde(rename = "serverFields", skip_serializing_if = "Option::is_none")]
    pub server_fields: Option<ServerFields>,
}

/// A record as found in storage, before any field is trusted.
///
/// Web builds have written numbers where text is expected and merged server
/// keys such as `createdAt` straight onto the stored item.
#[derive(Deserialize)]
struct StoredRecord {
    id: Option<Value>,
    kind: Option<Value>,
    title: Option<Value>,
    city: Option<Value>,
    img: Option<Value>,
    price: Option<Value>,
    #[serde(rename = "userId")]
    user_id: Option<Value>,
    saved_at: Option<Value>,
    #[serde(rename = "createdAt")]
    server_created_at: Option<Value>,
    #[serde(rename = "serverFields")]
    server_fields: Option<Value>,
}

impl TryFrom<StoredRecord> for Record {
    type Error = String;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let id = stored
            .id
            .as_ref()
            .and_then(json_text)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "record has no usable id".to_string())?;
        let kind = match stored.kind {
            None | Some(Value::Null) => RecordKind::default(),
            Some(Value::String(kind)) => kind.parse().unwrap_or(RecordKind::Item),
            Some(_) => RecordKind::Item,
        };
        let text = |value: Option<Value>| value.as_ref().and_then(json_text).unwrap_or_default();
        let created_at = [stored.saved_at, stored.server_created_at]
            .iter()
            .flatten()
            .find_map(parse_timestamp)
            .unwrap_or_else(Utc::now);
        let server_fields = match stored.server_fields {
            Some(Value::Object(fields)) => Some(fields),
            _ => None,
        };

        Ok(Self {
            id,
            kind,
            title: text(stored.title),
            display_label: text(stored.city),
            image_ref: text(stored.img),
            price_label: text(stored.price),
            owner_id: stored.user_id.as_ref().and_then(json_text),
            created_at,
            server_fields,
        })
    }
}

/// RFC 3339 text or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

impl Record {
    /// Build a record from a candidate, substituting defaults for anything missing.
    pub fn from_candidate(
        candidate: CandidateRecord,
        id: String,
        default_owner: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let display_label = candidate
            .display_label
            .clone()
            .or_else(|| candidate.title.clone())
            .unwrap_or_else(|| DEFAULT_DISPLAY_LABEL.to_string());
        let title = candidate
            .title
            .or(candidate.display_label)
            .unwrap_or_default();

        Self {
            id,
            kind: candidate.kind.unwrap_or_default(),
            title,
            display_label,
            image_ref: candidate.image_ref.unwrap_or_default(),
            price_label: candidate
                .price_label
                .unwrap_or_else(|| DEFAULT_PRICE_LABEL.to_string()),
            owner_id: candidate
                .owner_id
                .or_else(|| default_owner.map(str::to_string)),
            created_at,
            server_fields: candidate.server_fields,
        }
    }

    /// Overwrite fields the candidate supplies; `server_fields` are merged.
    pub fn merge_candidate(&mut self, candidate: CandidateRecord) {
        if let Some(kind) = candidate.kind {
            self.kind = kind;
        }
        if let Some(title) = candidate.title {
            self.title = title;
        }
        if let Some(label) = candidate.display_label {
            self.display_label = label;
        }
        if let Some(image) = candidate.image_ref {
            self.image_ref = image;
        }
        if let Some(price) = candidate.price_label {
            self.price_label = price;
        }
        if let Some(owner) = candidate.owner_id {
            self.owner_id = Some(owner);
        }
        if let Some(fields) = candidate.server_fields {
            self.merge_server_fields(fields);
        }
    }

    /// Merge fields into `server_fields`; incoming keys win, other keys stay.
    pub fn merge_server_fields(&mut self, incoming: ServerFields) {
        let fields = self.server_fields.get_or_insert_with(Map::new);
        for (key, value) in incoming {
            fields.insert(key, value);
        }
    }

    /// Id assigned by the remote service, if the record has been reconciled.
    pub fn server_id(&self) -> Option<String> {
        self.server_fields
            .as_ref()
            .and_then(|fields| fields.get("id"))
            .and_then(json_text)
    }

    /// Whole-unit part of the price label (`"$1,249.99"` -> 1249), 0 when absent.
    pub fn price_amount(&self) -> u64 {
        let re = Regex::new(r"[^\d]").expect("Invalid regex");
        let whole = self
            .price_label
            .split_once('.')
            .map_or(self.price_label.as_str(), |(whole, _)| whole);
        re.replace_all(whole, "").parse().unwrap_or(0)
    }
}

/// A possibly-partial record submitted by a caller.
///
/// Every field is optional; the store substitutes defaults so a write never
/// fails because of missing presentation data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: Option<RecordKind>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "city", default)]
    pub display_label: Option<String>,
    #[serde(rename = "img", default)]
    pub image_ref: Option<String>,
    #[serde(rename = "price", default)]
    pub price_label: Option<String>,
    #[serde(rename = "userId", default, deserialize_with = "optional_string_or_number")]
    pub owner_id: Option<String>,
    #[serde(rename = "serverFields", default)]
    pub server_fields: Option<ServerFields>,
}

impl CandidateRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub const fn kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.display_label = Some(city.into());
        self
    }

    #[must_use]
    pub fn image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    #[must_use]
    pub fn price(mut self, price_label: impl Into<String>) -> Self {
        self.price_label = Some(price_label.into());
        self
    }

    #[must_use]
    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    #[must_use]
    pub fn server_fields(mut self, fields: ServerFields) -> Self {
        self.server_fields = Some(fields);
        self
    }

    /// Trim every text field and drop the ones left empty.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            id: normalize_text_option(self.id),
            kind: self.kind,
            title: normalize_text_option(self.title),
            display_label: normalize_text_option(self.display_label),
            image_ref: normalize_text_option(self.image_ref),
            price_label: normalize_text_option(self.price_label),
            owner_id: normalize_text_option(self.owner_id),
            server_fields: self.server_fields,
        }
    }
}

// Older web builds wrote numeric ids (`201`) and user ids (`1`).
fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => json_text(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a string or number")),
    }
}
