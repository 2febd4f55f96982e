use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Coarse classification of translation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Buttons,
    Messages,
    Errors,
    Labels,
    Titles,
    Placeholders,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Buttons,
        Category::Messages,
        Category::Errors,
        Category::Labels,
        Category::Titles,
        Category::Placeholders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Buttons => "buttons",
            Category::Messages => "messages",
            Category::Errors => "errors",
            Category::Labels => "labels",
            Category::Titles => "titles",
            Category::Placeholders => "placeholders",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "Unknown category '{}' (expected one of: buttons, messages, errors, labels, titles, placeholders)",
                    s.trim()
                )
            })
    }
}

/// The localized text for one language of one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    /// Empty string means "untranslated"
    pub value: String,
    #[serde(default)]
    pub updated_by: String,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationKey {
    pub id: String,
    pub key: String,
    /// Kept as the server's string so unknown categories still load
    pub category: String,
    pub description: Option<String>,
    #[serde(default)]
    pub translations: BTreeMap<String, Translation>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl TranslationKey {
    pub fn category_kind(&self) -> Option<Category> {
        self.category.parse().ok()
    }

    /// Current value for `language`, or "" when the language has no entry
    pub fn translation_value(&self, language: &str) -> &str {
        self.translations
            .get(language)
            .map(|t| t.value.as_str())
            .unwrap_or("")
    }

    pub fn is_translated(&self, language: &str) -> bool {
        !self.translation_value(language).is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Key,
    Category,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Search, category and pagination window for the key list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub offset: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl TranslationFilters {
    pub const DEFAULT_LIMIT: u32 = 24;

    /// Canonical form: empty search means no search, and the limit is never
    /// zero.
    pub fn normalized(&self) -> Self {
        Self {
            search: self
                .search
                .as_ref()
                .filter(|s| !s.is_empty())
                .cloned(),
            limit: self.limit.max(1),
            ..self.clone()
        }
    }

    /// Query string pairs for `GET /translation-keys`
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let filters = self.normalized();
        let mut params = Vec::with_capacity(4);
        if let Some(category) = filters.category {
            params.push(("category", category.as_str().to_string()));
        }
        if let Some(search) = filters.search {
            params.push(("search", search));
        }
        params.push(("limit", filters.limit.to_string()));
        params.push(("offset", filters.offset.to_string()));
        params
    }
}

impl Default for TranslationFilters {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
            sort_by: None,
            sort_order: None,
        }
    }
}

/// Completion percentage (0-100) per language code
pub type TranslationStats = BTreeMap<String, f64>;

/// One page of the key list together with the server's total count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<TranslationKey>,
    pub total: u64,
}

impl ListPage {
    /// Drop `id` from the page. Returns true (and decrements the total) only
    /// when the key was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|k| k.id != id);
        let removed = self.items.len() != before;
        if removed {
            self.total = self.total.saturating_sub(1);
        }
        removed
    }
}

/// The list endpoint answers either with a bare array or with an envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListResponse {
    Bare(Vec<TranslationKey>),
    Envelope {
        #[serde(alias = "data")]
        items: Vec<TranslationKey>,
        #[serde(default)]
        total: Option<u64>,
    },
}

impl ListResponse {
    pub(crate) fn into_parts(self) -> (Vec<TranslationKey>, Option<u64>) {
        match self {
            ListResponse::Bare(items) => (items, None),
            ListResponse::Envelope { items, total } => (items, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTranslationKeyRequest {
    pub key: String,
    pub category: Category,
    pub description: Option<String>,
}

/// Partial update: only the fields that are `Some` are sent.
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateTranslationKeyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translations: Option<BTreeMap<String, Translation>>,
}

/// Build the full translations mapping with `language` replaced.
///
/// The server treats the `translations` field as a whole-field replace, so
/// every other language is carried over as the complete stored record. The
/// edited entry has no `updated_at`; the server stamps it.
pub fn merge_translation(
    existing: &BTreeMap<String, Translation>,
    language: &str,
    value: &str,
    updated_by: &str,
) -> BTreeMap<String, Translation> {
    let mut merged = existing.clone();
    merged.insert(
        language.to_string(),
        Translation {
            value: value.to_string(),
            updated_by: updated_by.to_string(),
            updated_at: None,
        },
    );
    merged
}

/// Timestamps arrive either as RFC 3339 or as naive ISO strings (assumed UTC)
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            Ok(raw.as_deref().and_then(super::parse))
        }
    }
}
