//! Feedback query and record value objects

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::constants::{record::ANONYMOUS_AUTHOR, wildberries};
use super::errors::LookbackOutOfRange;
use super::identifiers::FetchTarget;

/// One paginated query against the feedback-listing endpoint.
///
/// Everything but `offset` is fixed at construction; the pagination driver
/// moves the cursor with [`FeedbackQuery::advance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackQuery {
    is_answered: bool,
    page_size: u32,
    offset: u64,
    date_from: i64,
    date_to: i64,
    product_id: Option<String>,
}

impl FeedbackQuery {
    /// Answered feedback of the last `lookback_days` days, newest first,
    /// with the date range pinned at `now`.
    ///
    /// Fails when the window start falls outside the representable date range.
    pub fn for_lookback(
        lookback_days: u32,
        page_size: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, LookbackOutOfRange> {
        let out_of_range = LookbackOutOfRange {
            days: lookback_days,
        };
        let window = Duration::try_days(i64::from(lookback_days)).ok_or(out_of_range)?;
        let date_from = now.checked_sub_signed(window).ok_or(out_of_range)?;
        Ok(Self {
            is_answered: true,
            page_size,
            offset: 0,
            date_from: date_from.timestamp(),
            date_to: now.timestamp(),
            product_id: None,
        })
    }

    /// Copy of this query scoped to `target`, with the cursor reset.
    #[must_use]
    pub fn for_target(&self, target: &FetchTarget) -> Self {
        Self {
            offset: 0,
            product_id: target.product_id().map(str::to_string),
            ..self.clone()
        }
    }

    /// Copy of this query positioned at `offset`.
    #[must_use]
    pub fn at_offset(&self, offset: u64) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    /// Move the cursor past a page of `page_len` records.
    pub fn advance(&mut self, page_len: usize) {
        self.offset += page_len as u64;
    }

    pub const fn is_answered(&self) -> bool {
        self.is_answered
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub const fn offset(&self) -> u64 {
        self.offset
    }

    pub const fn date_from(&self) -> i64 {
        self.date_from
    }

    pub const fn date_to(&self) -> i64 {
        self.date_to
    }

    pub fn product_id(&self) -> Option<&str> {
        self.product_id.as_deref()
    }

    /// Query string pairs in the upstream API's naming.
    /// Booleans render as `true`/`false`, integers as decimals.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        use wildberries::params;

        let mut pairs = vec![
            (params::IS_ANSWERED, self.is_answered.to_string()),
            (params::TAKE, self.page_size.to_string()),
            (params::SKIP, self.offset.to_string()),
            (params::ORDER, wildberries::ORDER_DATE_DESC.to_string()),
            (params::DATE_FROM, self.date_from.to_string()),
            (params::DATE_TO, self.date_to.to_string()),
        ];
        if let Some(product_id) = &self.product_id {
            pairs.push((params::NM_ID, product_id.clone()));
        }
        pairs
    }
}

/// One feedback item, normalized from the upstream representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub product_id: String,
    pub text: String,
    pub author_name: String,
    pub verified: bool,
    pub created_at: String,
    pub rating: i64,
}

impl FeedbackRecord {
    /// Build a record applying the upstream defaults: anonymous author,
    /// unverified, empty timestamp and zero rating when fields are absent.
    pub fn normalized(
        product_id: impl Into<String>,
        text: Option<String>,
        author_name: Option<String>,
        verified: Option<bool>,
        created_at: Option<&str>,
        rating: Option<i64>,
    ) -> Self {
        let author_name = author_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());

        Self {
            product_id: product_id.into(),
            text: text.unwrap_or_default(),
            author_name,
            verified: verified.unwrap_or(false),
            created_at: created_at.map(normalize_timestamp).unwrap_or_default(),
            rating: rating.unwrap_or(0),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Render an upstream timestamp as `YYYY-MM-DDTHH:MM:SS.sssZ`.
/// Values that are not RFC 3339 are kept verbatim.
pub fn normalize_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    DateTime::parse_from_rfc3339(raw).map_or_else(
        |_| raw.to_string(),
        |parsed| {
            parsed
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn lookback_window_spans_requested_days() {
        let query = FeedbackQuery::for_lookback(35, 5000, fixed_now()).unwrap();
        assert_eq!(query.date_to() - query.date_from(), 35 * 86_400);
        assert_eq!(query.date_to(), fixed_now().timestamp());
        assert!(query.is_answered());
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn lookback_past_the_calendar_range_is_rejected() {
        let err = FeedbackQuery::for_lookback(100_000_000, 5000, fixed_now()).unwrap_err();
        assert_eq!(err, LookbackOutOfRange { days: 100_000_000 });
        assert_eq!(
            err.to_string(),
            "lookback of 100000000 days is outside the supported date range"
        );
        assert!(FeedbackQuery::for_lookback(u32::MAX, 5000, fixed_now()).is_err());
    }

    #[test]
    fn query_pairs_use_upstream_names() {
        let base = FeedbackQuery::for_lookback(1, 5000, fixed_now()).unwrap();
        let query = base
            .for_target(&FetchTarget::Product("12345".to_string()))
            .at_offset(10_000);
        let pairs = query.query_pairs();

        assert!(pairs.contains(&("isAnswered", "true".to_string())));
        assert!(pairs.contains(&("take", "5000".to_string())));
        assert!(pairs.contains(&("skip", "10000".to_string())));
        assert!(pairs.contains(&("order", "dateDesc".to_string())));
        assert!(pairs.contains(&("nmId", "12345".to_string())));
    }

    #[test]
    fn unfiltered_query_has_no_product_param() {
        let query = FeedbackQuery::for_lookback(1, 100, fixed_now())
            .unwrap()
            .for_target(&FetchTarget::AllProducts);
        assert!(query.query_pairs().iter().all(|(name, _)| *name != "nmId"));
    }

    #[test]
    fn advance_moves_cursor_by_page_length() {
        let mut query = FeedbackQuery::for_lookback(1, 100, fixed_now()).unwrap();
        query.advance(100);
        query.advance(37);
        assert_eq!(query.offset(), 137);
    }

    #[test]
    fn for_target_resets_offset() {
        let query = FeedbackQuery::for_lookback(1, 100, fixed_now())
            .unwrap()
            .at_offset(500);
        let scoped = query.for_target(&FetchTarget::Product("1".to_string()));
        assert_eq!(scoped.offset(), 0);
        assert_eq!(scoped.product_id(), Some("1"));
    }

    #[test]
    fn normalized_record_applies_defaults() {
        let record = FeedbackRecord::normalized("42", None, None, None, None, None);
        assert_eq!(record.product_id, "42");
        assert_eq!(record.text, "");
        assert_eq!(record.author_name, ANONYMOUS_AUTHOR);
        assert!(!record.verified);
        assert_eq!(record.created_at, "");
        assert_eq!(record.rating, 0);
        assert!(!record.has_text());
    }

    #[test]
    fn timestamps_are_rendered_in_utc_millis() {
        assert_eq!(
            normalize_timestamp("2024-03-01T15:30:00+03:00"),
            "2024-03-01T12:30:00.000Z"
        );
        assert_eq!(normalize_timestamp("2024-03-01T12:30:00Z"), "2024-03-01T12:30:00.000Z");
        assert_eq!(normalize_timestamp("yesterday"), "yesterday");
        assert_eq!(normalize_timestamp(""), "");
    }
}
