// src/core/accounts/account.rs

/// Whether an account may log in at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Banned,
}

impl AccountStatus {
    /// Maps the numeric status used by the account directory: `1` is active, `0` is banned.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(AccountStatus::Active),
            "0" => Some(AccountStatus::Banned),
            _ => None,
        }
    }
}

/// A single directory entry together with its live-session flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Unique, case-sensitive login name.
    pub username: String,
    pub status: AccountStatus,
    /// True while exactly one connection is authenticated as this account.
    pub in_session: bool,
}

impl Account {
    pub fn new(username: impl Into<String>, status: AccountStatus) -> Self {
        Self {
            username: username.into(),
            status,
            in_session: false,
        }
    }
}
