//! Request-independent completion logic
//!
//! `completion` drives the account failover, `prompt` flattens a chat into a
//! transcript and `translate` renders results in OpenAI shapes.

pub mod completion;
pub mod prompt;
pub mod translate;

/// Current Unix timestamp in seconds
///
/// A clock set before the epoch yields 0 and a warning.
pub fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                "System clock appears to be before UNIX epoch - using 0 as timestamp"
            );
            0
        })
}
