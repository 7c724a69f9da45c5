//! Product identifiers and fetch targets

use std::fmt;

use serde::{Deserialize, Serialize};

/// One unit of work for the batch scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchTarget {
    /// No product filter: the whole seller catalogue
    AllProducts,
    /// Feedback for a single product identifier (nmId)
    Product(String),
}

impl FetchTarget {
    pub fn product_id(&self) -> Option<&str> {
        match self {
            Self::AllProducts => None,
            Self::Product(id) => Some(id),
        }
    }
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllProducts => write!(f, "all products"),
            Self::Product(id) => write!(f, "nmId {id}"),
        }
    }
}

/// Split a comma-separated identifier list, trimming entries and dropping
/// empty ones. Order is kept; duplicates are kept too.
pub fn parse_identifier_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Targets for a run: one per identifier, or a single unfiltered target
/// when the list is empty.
pub fn targets_for(identifiers: &[String]) -> Vec<FetchTarget> {
    if identifiers.is_empty() {
        vec![FetchTarget::AllProducts]
    } else {
        identifiers
            .iter()
            .cloned()
            .map(FetchTarget::Product)
            .collect()
    }
}

/// Partition targets into consecutive groups of at most `group_size`.
/// A zero group size is treated as one group holding everything.
pub fn partition_groups(targets: Vec<FetchTarget>, group_size: usize) -> Vec<Vec<FetchTarget>> {
    if targets.is_empty() {
        return Vec::new();
    }
    if group_size == 0 {
        return vec![targets];
    }
    targets
        .chunks(group_size)
        .map(<[FetchTarget]>::to_vec)
        .collect()
}
