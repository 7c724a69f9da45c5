//! Domain module - feedback entities, identifiers and aggregation
//!
//! Modern Rust module organization:
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod aggregate;
pub mod constants;
pub mod errors;
pub mod feedback;
pub mod identifiers;

pub use aggregate::{AggregateState, Aggregator, Summary, encode_row};
pub use errors::{FetchError, LookbackOutOfRange};
pub use feedback::{FeedbackQuery, FeedbackRecord};
pub use identifiers::{FetchTarget, parse_identifier_list, partition_groups, targets_for};
