//! Identifier list utilities
//!
//! Small pure transformations over pasted identifier lists. They share no
//! state with [`FeedbackSession`](super::FeedbackSession).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputFormatError {
    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),

    #[error("Input is empty")]
    EmptyInput,
}

/// Turn a newline-separated list into a comma-separated one.
///
/// ```
/// use feedback_harvester_lib::text_tools::format_id_list;
/// assert_eq!(format_id_list("123\r\n 456 \n\n789"), "123,456,789");
/// ```
pub fn format_id_list(input: &str) -> String {
    input
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a comma-separated list of integers. The first bad token fails the
/// whole list.
pub fn parse_number_list(input: &str) -> Result<Vec<i64>, InputFormatError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<i64>()
                .map_err(|_| InputFormatError::InvalidNumber(token.to_string()))
        })
        .collect()
}

/// Numbers of `first` that also occur in `second`, keeping `first`'s order
/// and duplicates.
pub fn compute_matches(first: &str, second: &str) -> Result<Vec<i64>, InputFormatError> {
    let first = parse_number_list(first)?;
    let second = parse_number_list(second)?;
    Ok(first.into_iter().filter(|n| second.contains(n)).collect())
}

/// Keep the part of every comma-separated entry before its first dash.
pub fn truncate_at_dash(input: &str) -> Result<Vec<String>, InputFormatError> {
    if input.trim().is_empty() {
        return Err(InputFormatError::EmptyInput);
    }

    Ok(input
        .split(',')
        .map(str::trim)
        .map(|entry| entry.split_once('-').map_or(entry, |(head, _)| head))
        .map(str::to_string)
        .collect())
}

/// Join results the way they are shown to the user.
pub fn join_for_display<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
