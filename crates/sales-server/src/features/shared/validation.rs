//! Shared validation utilities

/// Largest page any list endpoint returns
pub const MAX_LIST_LIMIT: usize = 100;

/// Page size for a list request
///
/// A missing or zero `requested` falls back to `default`; anything above
/// [`MAX_LIST_LIMIT`] is capped.
pub fn resolve_limit(requested: Option<usize>, default: usize) -> usize {
    requested
        .filter(|limit| *limit > 0)
        .unwrap_or(default)
        .clamp(1, MAX_LIST_LIMIT)
}
