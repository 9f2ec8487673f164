pub mod banner;
pub mod footer;
pub mod header;
pub mod utils;

pub use banner::{draw_banner, Banner};
pub use footer::draw_footer;
pub use header::{draw_header, extract_host};
pub use utils::{
  cache_status_color, change_color, format_age, format_signed, sentiment_color, truncate,
};
