// src/core/accounts/loader.rs

//! Parses the account directory snapshot loaded once at startup.
//!
//! The format is a sequence of whitespace-separated `username status` pairs, where the
//! status is `1` (active) or `0` (banned). Pairs are usually one per line, but line breaks
//! carry no meaning.

use super::account::{Account, AccountStatus};
use crate::core::SessionServerError;
use std::path::Path;

/// Parses every `(username, status)` record in `source`, in order of appearance.
///
/// Duplicates are returned as-is; [`AccountRegistry`](super::AccountRegistry) resolves them.
pub fn load(source: &str) -> Result<Vec<Account>, SessionServerError> {
    let mut accounts = Vec::new();
    let mut pending: Option<(&str, usize)> = None;

    for (index, line) in source.lines().enumerate() {
        let line_no = index + 1;
        for token in line.split_whitespace() {
            match pending.take() {
                None => pending = Some((token, line_no)),
                Some((username, _)) => {
                    let status = AccountStatus::from_code(token).ok_or_else(|| {
                        SessionServerError::AccountLoad {
                            line: line_no,
                            reason: format!(
                                "invalid status '{token}' for account '{username}' (expected 0 or 1)"
                            ),
                        }
                    })?;
                    accounts.push(Account::new(username, status));
                }
            }
        }
    }

    if let Some((username, line)) = pending {
        return Err(SessionServerError::AccountLoad {
            line,
            reason: format!("account '{username}' has no status"),
        });
    }

    Ok(accounts)
}

/// Reads and parses the account directory at `path`.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Vec<Account>, SessionServerError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load(&contents)
}
