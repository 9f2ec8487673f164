//! Client for the news API: transport, response envelope, error taxonomy.

pub mod api_types;
pub mod client;
pub mod error;
pub mod params;
pub mod types;

pub use api_types::ApiResponse;
pub use client::ApiClient;
pub use error::{ErrorKind, Locale, NormalizedError};
pub use params::{ListParams, QueryParams, SortOrder};
