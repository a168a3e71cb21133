//! Field validation shared by the account operations.

use thiserror::Error;

/// Longest account name the backend accepts, in bytes.
pub const MAX_NAME_LEN: usize = 12;

/// Why a well-formed body was refused before reaching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("invalid parameters")]
    InvalidParameters,

    #[error("invalid account or password")]
    InvalidAccountOrPassword,

    #[error("account not found")]
    AccountNotFound,

    #[error("name length invalid")]
    NameLength,

    #[error("password required")]
    PasswordRequired,

    #[error("invalid paging parameters")]
    InvalidPaging,
}

/// Non-empty and at most [`MAX_NAME_LEN`] bytes.
pub fn name_in_range(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LEN
}

/// Offset and limit usable as the backend's unsigned 32-bit paging fields.
pub fn paging_in_range(offset: i64, limit: i64) -> bool {
    let max = i64::from(u32::MAX);
    (0..=max).contains(&offset) && (1..=max).contains(&limit)
}
