use super::error::QueryError;
use crate::store::RecordMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const DEFAULT_PER_PAGE: usize = 20;

/// A record as seen by callers of the façade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub item: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RecordMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<Vec<SavedItem>>,
    pub collection: String,
}

impl SavedItem {
    pub fn new(collection: impl Into<String>, item: JsonValue) -> Self {
        Self {
            id: None,
            item,
            metadata: None,
            expand: None,
            collection: collection.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: RecordMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Parameters of a `get` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetQuery {
    pub ids: Vec<String>,
    pub where_clause: Option<String>,
    pub expand: bool,
    /// 1-based
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub limit: Option<usize>,
}

/// Slice of a result list selected by pagination or a flat limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    All,
    Page { skip: usize, take: usize },
    Limit(usize),
}

impl Window {
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        match *self {
            Window::All => items,
            Window::Page { skip, take } => items.into_iter().skip(skip).take(take).collect(),
            Window::Limit(limit) => items.into_iter().take(limit).collect(),
        }
    }
}

impl GetQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, where_clause: impl Into<String>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn page(mut self, page: usize, per_page: usize) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Pagination wins over `limit` when both are present.
    pub fn window(&self) -> Window {
        match (self.page, self.per_page, self.limit) {
            (None, None, None) => Window::All,
            (None, None, Some(limit)) => Window::Limit(limit),
            (page, per_page, _) => {
                let take = per_page.unwrap_or(DEFAULT_PER_PAGE);
                let page = page.unwrap_or(1).max(1);
                Window::Page {
                    skip: (page - 1).saturating_mul(take),
                    take,
                }
            }
        }
    }

    /// Build from decoded URL query pairs (`id`, `where`, `expand`, `page`,
    /// `perPage`, `limit`). `id` may repeat; unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "id" => query.ids.push(value.to_string()),
                "where" => query.where_clause = Some(value.to_string()),
                "expand" => query.expand = parse_flag(value),
                "page" => query.page = Some(parse_positive("page", value)?),
                "perPage" => query.per_page = Some(parse_positive("perPage", value)?),
                "limit" => query.limit = Some(parse_number("limit", value)?),
                _ => {}
            }
        }
        Ok(query)
    }
}

/// Parameters of a `delete` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteQuery {
    pub ids: Vec<String>,
    pub cascade: bool,
}

impl DeleteQuery {
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "id" => query.ids.push(value.as_ref().to_string()),
                "cascade" => query.cascade = parse_flag(value.as_ref()),
                _ => {}
            }
        }
        if query.ids.is_empty() {
            return Err(QueryError::BadRequest("id is required".to_string()));
        }
        Ok(query)
    }
}

/// A bare `?expand` counts as set.
fn parse_flag(value: &str) -> bool {
    !matches!(value.trim(), "false" | "0" | "no")
}

fn parse_number(name: &str, value: &str) -> Result<usize, QueryError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| QueryError::BadRequest(format!("{name} must be a non-negative integer")))
}

fn parse_positive(name: &str, value: &str) -> Result<usize, QueryError> {
    match parse_number(name, value)? {
        0 => Err(QueryError::BadRequest(format!("{name} must be at least 1"))),
        n => Ok(n),
    }
}
