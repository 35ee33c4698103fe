pub mod build_date;
pub mod compare;
pub mod record;

// Re-export common types
pub use build_date::BuildDate;
pub use compare::{evaluate_all, is_newer};
pub use record::{parse, parse_value, RecordError, UpdateRecord};
