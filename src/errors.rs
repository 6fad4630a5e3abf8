use thiserror::Error;

/// Errors surfaced by the RPC layer to its caller.
///
/// Upstream failures never appear here: the reliability layer degrades them into a
/// fallback response. `RateLimited` is the one condition that fails loudly.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Admission errors ─────────────────────────────────────────────────────
    #[error("Rate limit exceeded for conversation '{conversation_id}', retry in {retry_after_ms}ms")]
    RateLimited { conversation_id: String, retry_after_ms: u64 },

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },
}

impl AppError {
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::EmptyField { .. } | AppError::FieldTooLong { .. })
    }

    /// Stable machine-readable tag for the JSON error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::RateLimited { .. } => "rate_limited",
            AppError::EmptyField { .. } | AppError::FieldTooLong { .. } => "validation",
        }
    }
}
