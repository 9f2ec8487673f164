//! Typed access to server resources through the cache.
//!
//! A view asks [`Resources`] for a handle; the handle subscribes the key in
//! the cache (and the poll scheduler, when polling is on), and unsubscribes
//! again when dropped. Views read [`ResourceHandle::snapshot`] on every
//! render and never await network calls themselves.

use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::api::types::{
  Article, ArticlePage, HealthStatus, ScraperStats, SentimentSummary, SourceList, StockQuote,
};
use crate::api::{ApiClient, ApiResponse, ErrorKind, ListParams, NormalizedError, QueryParams};
use crate::cache::{CacheStatus, CacheStore, KeyPrefix, QueryKey, ResourceClass};
use crate::config::TimeoutConfig;
use crate::sync::{
  Fetcher, PollScheduler, PollStatus, Priority, RateLimitTracker, RefreshRejected,
};

/// First key segment of every resource this module hands out.
const NAMESPACES: &[&str] = &["articles", "sources", "health", "scraper", "sentiment", "quote"];

/// Cached value for any resource. One store holds every kind.
#[derive(Debug, Clone)]
pub enum Payload {
  Articles(Arc<ArticlePage>),
  Article(Arc<Article>),
  Sources(Arc<SourceList>),
  Health(Arc<HealthStatus>),
  Scraper(Arc<ScraperStats>),
  Sentiment(Arc<SentimentSummary>),
  Quote(Arc<StockQuote>),
}

/// A value type that can be fetched and cached.
pub trait Resource: Send + Sync + Sized + 'static {
  /// Shape of the envelope's `data` field
  type Wire: DeserializeOwned + Send + 'static;

  fn into_payload(response: ApiResponse<Self::Wire>) -> Payload;

  fn from_payload(payload: &Payload) -> Option<Arc<Self>>;
}

impl Resource for ArticlePage {
  type Wire = Vec<Article>;

  fn into_payload(response: ApiResponse<Self::Wire>) -> Payload {
    Payload::Articles(Arc::new(ArticlePage {
      articles: response.data,
      pagination: response.meta.and_then(|m| m.pagination),
    }))
  }

  fn from_payload(payload: &Payload) -> Option<Arc<Self>> {
    match payload {
      Payload::Articles(page) => Some(page.clone()),
      _ => None,
    }
  }
}

macro_rules! plain_resource {
  ($ty:ty, $variant:ident) => {
    impl Resource for $ty {
      type Wire = $ty;

      fn into_payload(response: ApiResponse<Self::Wire>) -> Payload {
        Payload::$variant(Arc::new(response.data))
      }

      fn from_payload(payload: &Payload) -> Option<Arc<Self>> {
        match payload {
          Payload::$variant(value) => Some(value.clone()),
          _ => None,
        }
      }
    }
  };
}

plain_resource!(Article, Article);
plain_resource!(SourceList, Sources);
plain_resource!(HealthStatus, Health);
plain_resource!(ScraperStats, Scraper);
plain_resource!(SentimentSummary, Sentiment);
plain_resource!(StockQuote, Quote);

/// Where a resource lives and how it is cached.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
  pub key: QueryKey,
  pub path: String,
  pub query: QueryParams,
  pub priority: Priority,
}

impl ResourceRequest {
  pub fn new(key: QueryKey, path: impl Into<String>) -> Self {
    Self {
      key,
      path: path.into(),
      query: QueryParams::new(),
      priority: Priority::Normal,
    }
  }

  pub fn with_query(mut self, query: QueryParams) -> Self {
    self.query = query;
    self
  }

  pub fn with_priority(mut self, priority: Priority) -> Self {
    self.priority = priority;
    self
  }
}

/// Fetcher of a key held by handles that do not poll, with the number of
/// such handles.
struct OnDemand {
  fetcher: Fetcher<Payload>,
  handles: usize,
}

/// Factory for resource handles. Clones share the underlying engine.
#[derive(Clone)]
pub struct Resources {
  client: ApiClient,
  store: CacheStore<Payload>,
  scheduler: PollScheduler<Payload>,
  rate_limits: RateLimitTracker,
  timeouts: TimeoutConfig,
  on_demand: Arc<Mutex<HashMap<QueryKey, OnDemand>>>,
}

impl Resources {
  pub fn new(
    client: ApiClient,
    store: CacheStore<Payload>,
    scheduler: PollScheduler<Payload>,
    rate_limits: RateLimitTracker,
    timeouts: TimeoutConfig,
  ) -> Self {
    Self {
      client,
      store,
      scheduler,
      rate_limits,
      timeouts,
      on_demand: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Subscribe to a resource and start loading it if needed.
  pub fn use_resource<R: Resource>(&self, request: ResourceRequest, polling: bool) -> ResourceHandle<R> {
    let fetcher = self.fetcher::<R>(&request);
    let key = request.key;

    self.store.subscribe(&key);
    if polling {
      self
        .scheduler
        .subscribe(&key, request.priority, fetcher.clone());
    } else {
      self
        .lock_on_demand()
        .entry(key.clone())
        .or_insert_with(|| OnDemand {
          fetcher: fetcher.clone(),
          handles: 0,
        })
        .handles += 1;
    }

    let initial = fetcher.clone();
    self.store.prefetch(&key, move || initial());

    ResourceHandle {
      key,
      polling,
      fetcher,
      resources: self.clone(),
      _marker: PhantomData,
    }
  }

  pub fn articles(&self, params: &ListParams, polling: bool) -> ResourceHandle<ArticlePage> {
    let query = params.to_query();
    let key = QueryKey::new(ResourceClass::Standard, "articles")
      .with_segment("list")
      .with_pairs(query.iter());
    self.use_resource(ResourceRequest::new(key, "articles").with_query(query), polling)
  }

  pub fn article(&self, id: i64, polling: bool) -> ResourceHandle<Article> {
    self.use_resource(
      ResourceRequest::new(article_key(id), format!("articles/{}", id)),
      polling,
    )
  }

  /// Detail handle that renders `row` from a list until the full article
  /// arrives. The seeded value is stale, so the detail is always fetched.
  pub fn article_from_row(&self, row: &Article, polling: bool) -> ResourceHandle<Article> {
    let key = article_key(row.id);
    let cached = self.store.peek(&key).is_some_and(|entry| entry.value.is_some());
    if !cached {
      self.store.set(&key, Payload::Article(Arc::new(row.clone())));
      self.store.invalidate(&key);
    }
    self.article(row.id, polling)
  }

  pub fn search_articles(&self, query: &str, polling: bool) -> ResourceHandle<ArticlePage> {
    let query = QueryParams::new().with("q", Some(query.trim()));
    let key = QueryKey::new(ResourceClass::Standard, "articles")
      .with_segment("search")
      .with_pairs(query.iter());
    self.use_resource(
      ResourceRequest::new(key, "articles/search").with_query(query),
      polling,
    )
  }

  pub fn sources(&self, polling: bool) -> ResourceHandle<SourceList> {
    let key = QueryKey::new(ResourceClass::Static, "sources");
    self.use_resource(ResourceRequest::new(key, "sources"), polling)
  }

  pub fn health(&self, polling: bool) -> ResourceHandle<HealthStatus> {
    let key = QueryKey::new(ResourceClass::Frequent, "health");
    self.use_resource(
      ResourceRequest::new(key, "health").with_priority(Priority::Critical),
      polling,
    )
  }

  pub fn scraper_stats(&self, polling: bool) -> ResourceHandle<ScraperStats> {
    let key = QueryKey::new(ResourceClass::Frequent, "scraper");
    self.use_resource(ResourceRequest::new(key, "scraper/stats"), polling)
  }

  pub fn sentiment(&self, polling: bool) -> ResourceHandle<SentimentSummary> {
    let key = QueryKey::new(ResourceClass::Standard, "sentiment");
    self.use_resource(ResourceRequest::new(key, "sentiment/summary"), polling)
  }

  pub fn stock_quote(&self, symbol: &str, polling: bool) -> ResourceHandle<StockQuote> {
    let symbol = normalize_symbol(symbol);
    let key = QueryKey::new(ResourceClass::Realtime, "quote").with_segment(symbol.clone());
    self.use_resource(
      ResourceRequest::new(key, format!("stocks/{}/quote", symbol)),
      polling,
    )
  }

  /// Mark everything under `prefix` stale.
  pub fn invalidate(&self, prefix: &KeyPrefix) -> usize {
    self.store.invalidate_prefix(prefix)
  }

  /// Manual "refresh everything": mark every cached entry stale, fire every
  /// polled subscription now and revalidate every other subscribed key in
  /// the background. Refused while the quota is exhausted.
  pub fn refresh_all(&self) -> Result<usize, RefreshRejected> {
    self.rate_limits.check_manual()?;
    let invalidated = NAMESPACES
      .iter()
      .map(|namespace| self.invalidate(&KeyPrefix::new(namespace)))
      .sum();
    self.scheduler.catch_up();

    let on_demand: Vec<(QueryKey, Fetcher<Payload>)> = self
      .lock_on_demand()
      .iter()
      .map(|(key, entry)| (key.clone(), entry.fetcher.clone()))
      .collect();
    for (key, fetcher) in &on_demand {
      let store = self.store.clone();
      let key = key.clone();
      let fetcher = fetcher.clone();
      tokio::spawn(async move {
        let _ = store.refresh(&key, move || fetcher()).await;
      });
    }

    debug!(
      invalidated,
      revalidating = on_demand.len(),
      "manual refresh of all resources"
    );
    Ok(invalidated)
  }

  fn release_on_demand(&self, key: &QueryKey) {
    let mut on_demand = self.lock_on_demand();
    if let Some(entry) = on_demand.get_mut(key) {
      entry.handles = entry.handles.saturating_sub(1);
      if entry.handles == 0 {
        on_demand.remove(key);
      }
    }
  }

  fn lock_on_demand(&self) -> MutexGuard<'_, HashMap<QueryKey, OnDemand>> {
    self.on_demand.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn fetcher<R: Resource>(&self, request: &ResourceRequest) -> Fetcher<Payload> {
    let client = self.client.clone();
    let path = request.path.clone();
    let query = request.query.clone();
    let timeout = self.timeouts.for_class(request.key.class());

    Arc::new(move || {
      let client = client.clone();
      let path = path.clone();
      let query = query.clone();
      async move {
        client
          .get::<R::Wire>(&path, query, timeout)
          .await
          .map(R::into_payload)
      }
      .boxed()
    })
  }
}

fn article_key(id: i64) -> QueryKey {
  QueryKey::new(ResourceClass::Static, "articles")
    .with_segment("detail")
    .with_segment(id.to_string())
}

fn normalize_symbol(symbol: &str) -> String {
  symbol
    .trim()
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
    .collect::<String>()
    .to_uppercase()
}

/// What a view renders for one resource.
#[derive(Debug, Clone)]
pub struct ResourceView<R> {
  pub value: Option<Arc<R>>,
  pub status: CacheStatus,
  pub error: Option<NormalizedError>,
  /// Showing a value older than its class allows
  pub is_stale: bool,
  pub age: Option<Duration>,
}

impl<R> ResourceView<R> {
  pub fn is_loading(&self) -> bool {
    self.status == CacheStatus::Loading
  }
}

/// Live subscription to one resource; unsubscribes on drop.
pub struct ResourceHandle<R> {
  key: QueryKey,
  polling: bool,
  fetcher: Fetcher<Payload>,
  resources: Resources,
  _marker: PhantomData<fn() -> R>,
}

impl<R: Resource> ResourceHandle<R> {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn snapshot(&self) -> ResourceView<R> {
    let entry = self.resources.store.get(&self.key);
    let now = Instant::now();

    ResourceView {
      value: entry.value.as_ref().and_then(R::from_payload),
      is_stale: entry.is_stale(now),
      age: entry.age(now),
      status: entry.status,
      error: entry.error,
    }
  }

  /// Poll timer state, or `None` when this handle does not poll.
  pub fn poll_status(&self) -> Option<PollStatus> {
    if !self.polling {
      return None;
    }
    self.resources.scheduler.status(&self.key)
  }

  /// Await a fresh value, fetching only when the cached one is stale.
  pub async fn ensure(&self) -> Result<Arc<R>, NormalizedError> {
    let fetcher = self.fetcher.clone();
    let payload = self
      .resources
      .store
      .ensure_fresh(&self.key, move || fetcher())
      .await?;

    R::from_payload(&payload).ok_or_else(|| {
      NormalizedError::new(
        ErrorKind::Decode,
        format!("cached value for {} has the wrong type", self.key),
      )
    })
  }

  /// Manual refresh. Refused while the request quota is exhausted.
  pub fn refetch(&self) -> Result<(), RefreshRejected> {
    self.resources.rate_limits.check_manual()?;
    debug!(key = %self.key, "manual refresh");

    let store = self.resources.store.clone();
    let key = self.key.clone();
    let fetcher = self.fetcher.clone();
    tokio::spawn(async move {
      let _ = store.refetch(&key, move || fetcher()).await;
    });
    Ok(())
  }
}

impl<R> Drop for ResourceHandle<R> {
  fn drop(&mut self) {
    self.resources.store.unsubscribe(&self.key);
    if self.polling {
      self.resources.scheduler.unsubscribe(&self.key);
    } else {
      self.resources.release_on_demand(&self.key);
    }
  }
}
