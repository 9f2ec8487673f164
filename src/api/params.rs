//! Query-string construction for list endpoints.

use chrono::NaiveDate;

/// Ordered query parameters.
///
/// Values that are missing or empty are never stored, so they never reach
/// the wire. Iteration order is insertion order; setting an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
  pairs: Vec<(String, String)>,
}

impl QueryParams {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set `key` to `value`, or drop the key if the value is absent or empty.
  pub fn set<V: ToString>(&mut self, key: &str, value: Option<V>) {
    let value = value.map(|v| v.to_string()).filter(|v| !v.is_empty());

    match value {
      Some(value) => {
        if let Some(pair) = self.pairs.iter_mut().find(|(k, _)| k == key) {
          pair.1 = value;
        } else {
          self.pairs.push((key.to_string(), value));
        }
      }
      None => self.pairs.retain(|(k, _)| k != key),
    }
  }

  /// Builder form of [`QueryParams::set`].
  pub fn with<V: ToString>(mut self, key: &str, value: Option<V>) -> Self {
    self.set(key, value);
    self
  }

  pub fn is_empty(&self) -> bool {
    self.pairs.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  /// Percent-encoded `a=1&b=2` form, without the leading `?`.
  pub fn to_query_string(&self) -> String {
    url::form_urlencoded::Serializer::new(String::new())
      .extend_pairs(self.iter())
      .finish()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
  Asc,
  Desc,
}

impl SortOrder {
  pub fn as_str(self) -> &'static str {
    match self {
      SortOrder::Asc => "asc",
      SortOrder::Desc => "desc",
    }
  }

  pub fn toggled(self) -> Self {
    match self {
      SortOrder::Asc => SortOrder::Desc,
      SortOrder::Desc => SortOrder::Asc,
    }
  }
}

impl std::fmt::Display for SortOrder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Filters accepted by the article list endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
  pub source: Option<String>,
  pub sentiment: Option<String>,
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
}

/// Pagination, sorting and filtering for list endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
  pub limit: Option<u32>,
  pub offset: Option<u32>,
  pub sort_by: Option<String>,
  pub sort_order: Option<SortOrder>,
  pub filter: ArticleFilter,
}

impl ListParams {
  pub fn page(limit: u32, offset: u32) -> Self {
    Self {
      limit: Some(limit),
      offset: Some(offset),
      ..Self::default()
    }
  }

  pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
    self.sort_by = Some(field.into());
    self.sort_order = Some(order);
    self
  }

  pub fn to_query(&self) -> QueryParams {
    QueryParams::new()
      .with("limit", self.limit)
      .with("offset", self.offset)
      .with("sort_by", self.sort_by.as_deref())
      .with("sort_order", self.sort_order)
      .with("source", self.filter.source.as_deref())
      .with("sentiment", self.filter.sentiment.as_deref())
      .with("from", self.filter.from.map(|d| d.format("%Y-%m-%d")))
      .with("to", self.filter.to.map(|d| d.format("%Y-%m-%d")))
  }
}
