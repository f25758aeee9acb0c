// Utility functions
pub mod date_filter;
pub mod error;
pub mod time_bucket;

pub use date_filter::*;
pub use error::*;
pub use time_bucket::*;
