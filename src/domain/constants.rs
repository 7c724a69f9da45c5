//! Marketplace and export domain constants
//!
//! Fixed characteristics of the Wildberries feedback API and of the CSV
//! export format. Tunables live in `infrastructure::config::defaults`.

/// Wildberries feedback API characteristics
pub mod wildberries {
    /// Base URL of the feedback API
    pub const BASE_URL: &str = "https://feedbacks-api.wildberries.ru";

    /// Path of the feedback-listing endpoint
    pub const FEEDBACKS_PATH: &str = "/api/v1/feedbacks";

    /// Largest `take` the endpoint accepts for one page
    pub const MAX_PAGE_SIZE: u32 = 5000;

    /// Sort order value for newest-first listing
    pub const ORDER_DATE_DESC: &str = "dateDesc";

    /// Query parameter names
    pub mod params {
        pub const IS_ANSWERED: &str = "isAnswered";
        pub const TAKE: &str = "take";
        pub const SKIP: &str = "skip";
        pub const ORDER: &str = "order";
        pub const DATE_FROM: &str = "dateFrom";
        pub const DATE_TO: &str = "dateTo";
        pub const NM_ID: &str = "nmId";
    }
}

/// Feedback record normalization
pub mod record {
    /// Author name used when the upstream item carries none
    pub const ANONYMOUS_AUTHOR: &str = "Anonymous";
}

/// Aggregation rules
pub mod aggregation {
    /// Products with strictly more non-empty texts than this are counted
    /// in `Summary::ids_with_more_than_n_texts`
    pub const TEXT_THRESHOLD: u64 = 5;
}

/// CSV export format
pub mod export {
    /// Header row, written once at the top of every CSV body
    pub const CSV_HEADER: &str = "PRODUCT ID,BODY,AUTHOR,Verified,CREATED AT,RATING";

    /// Media type attached to the exported blob
    pub const CSV_MEDIA_TYPE: &str = "text/csv; charset=utf-8";

    /// Exported file names are `<prefix><YYYY-MM-DD>.csv`
    pub const FILE_NAME_PREFIX: &str = "wildberries_feedback_";
}

/// Durable storage slot names
pub mod storage {
    /// Slot holding the accumulated CSV body
    pub const CSV_DATA_KEY: &str = "csvData";

    /// Slot holding the JSON-encoded progress log
    pub const RESULTS_KEY: &str = "results";
}
