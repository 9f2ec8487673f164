//! Wiring for the synchronization engine.
//!
//! Every shared object is built once here and handed out by handle.

use color_eyre::Result;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::ApiClient;
use crate::cache::{CacheEvent, CacheStore};
use crate::config::Config;
use crate::resources::{Payload, Resources};
use crate::sync::{
  spawn_probe, ConnectivityMonitor, ConnectivityState, PollScheduler, RateLimitState,
  RateLimitTracker, Visibility,
};

pub struct Engine {
  client: ApiClient,
  store: CacheStore<Payload>,
  scheduler: PollScheduler<Payload>,
  connectivity: ConnectivityMonitor,
  rate_limits: RateLimitTracker,
  resources: Resources,
  probe_online: Duration,
  probe_offline: Duration,
  tasks: Vec<JoinHandle<()>>,
}

impl Engine {
  pub fn new(config: &Config) -> Result<Self> {
    let connectivity = ConnectivityMonitor::new(config.reconnect_grace());
    let rate_limits = RateLimitTracker::new();

    let client = ApiClient::new(&config.api)?
      .with_rate_limits(rate_limits.clone())
      .with_connectivity(connectivity.clone());

    let store = CacheStore::new(config.gc_window());
    let scheduler = PollScheduler::new(
      store.clone(),
      connectivity.clone(),
      rate_limits.clone(),
      config.poll_policy(),
    );

    let resources = Resources::new(
      client.clone(),
      store.clone(),
      scheduler.clone(),
      rate_limits.clone(),
      config.api.timeouts,
    );

    Ok(Self {
      client,
      store,
      scheduler,
      connectivity,
      rate_limits,
      resources,
      probe_online: Duration::from_secs(config.connectivity.probe_online_secs.max(1)),
      probe_offline: Duration::from_secs(config.connectivity.probe_offline_secs.max(1)),
      tasks: Vec::new(),
    })
  }

  /// Spawn the connectivity listener and the reachability probe.
  pub fn start(&mut self) {
    if !self.tasks.is_empty() {
      return;
    }

    self.tasks.push(self.scheduler.watch_connectivity());

    let client = self.client.clone();
    self.tasks.push(spawn_probe(
      self.connectivity.clone(),
      self.probe_online,
      self.probe_offline,
      move || {
        let client = client.clone();
        async move { client.probe().await }
      },
    ));

    info!(base_url = %self.client.base_url(), "sync engine started");
  }

  pub fn resources(&self) -> &Resources {
    &self.resources
  }

  #[cfg(test)]
  pub fn store(&self) -> &CacheStore<Payload> {
    &self.store
  }

  pub fn scheduler(&self) -> &PollScheduler<Payload> {
    &self.scheduler
  }

  #[cfg(test)]
  pub fn rate_limits(&self) -> &RateLimitTracker {
    &self.rate_limits
  }

  pub fn rate_limit_state(&self) -> RateLimitState {
    self.rate_limits.snapshot()
  }

  pub fn connectivity(&self) -> watch::Receiver<ConnectivityState> {
    self.connectivity.watch()
  }

  pub fn cache_events(&self) -> broadcast::Receiver<CacheEvent> {
    self.store.events()
  }

  pub fn base_url(&self) -> &url::Url {
    self.client.base_url()
  }

  /// Terminal focus changed.
  pub fn set_visibility(&self, visibility: Visibility) {
    self.scheduler.set_visibility(visibility);
  }

  pub fn shutdown(&mut self) {
    for task in self.tasks.drain(..) {
      task.abort();
    }
    self.scheduler.suspend_all();
  }
}

impl Drop for Engine {
  fn drop(&mut self) {
    for task in self.tasks.drain(..) {
      task.abort();
    }
  }
}
