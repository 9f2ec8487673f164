//! Background synchronization: connectivity, quota tracking and polling.

pub mod connectivity;
pub mod rate_limit;
pub mod scheduler;

pub use connectivity::{spawn_probe, ConnectivityMonitor, ConnectivityPhase, ConnectivityState};
pub use rate_limit::{RateLimitState, RateLimitTracker, RefreshRejected};
pub use scheduler::{Fetcher, PollPhase, PollPolicy, PollScheduler, PollStatus, Priority, Visibility};
