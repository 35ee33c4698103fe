pub mod http;
pub mod props;
pub mod time;

// Re-export main utilities
pub use http::{get, get_once, http_status_is_ok, HttpError, ResponseData, RetryPolicy};
pub use props::get_prop;
pub use time::get_now_unix_millis;
