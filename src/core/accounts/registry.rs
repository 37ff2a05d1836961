// src/core/accounts/registry.rs

//! The shared account registry.
//!
//! Every connection's session consults the same registry. A single mutex covers both
//! lookup and the flip of `in_session`, so a login check-and-set is one atomic critical
//! section under either dispatch strategy. The lock is never held across an `.await`.

use super::account::{Account, AccountStatus};
use indexmap::IndexMap;
use indexmap::map::Entry;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// The result of a login attempt. Exactly one outcome applies to each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The account was free and is now bound to the caller.
    Success,
    NotFound,
    Banned,
    /// The account already holds a live session on some connection.
    AlreadyActive,
}

/// An ordered directory of accounts, unique by username.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: Mutex<IndexMap<String, Account>>,
}

impl AccountRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from loaded records. A repeated username replaces the earlier
    /// record's status but keeps its position.
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let mut map: IndexMap<String, Account> = IndexMap::new();
        for account in accounts {
            match map.entry(account.username.clone()) {
                Entry::Occupied(mut slot) => {
                    warn!(
                        "Duplicate account '{}' in directory; the later record wins.",
                        account.username
                    );
                    slot.insert(account);
                }
                Entry::Vacant(slot) => {
                    slot.insert(account);
                }
            }
        }
        Self {
            accounts: Mutex::new(map),
        }
    }

    /// Attempts to bind a session to `username`.
    ///
    /// Checks run in a fixed order: unknown, then already active, then banned.
    /// Only `Success` changes state.
    pub fn try_login(&self, username: &str) -> LoginOutcome {
        let mut accounts = self.accounts.lock();
        let Some(account) = accounts.get_mut(username) else {
            return LoginOutcome::NotFound;
        };
        if account.in_session {
            debug!("Account '{}' is already logged in elsewhere.", username);
            return LoginOutcome::AlreadyActive;
        }
        if account.status == AccountStatus::Banned {
            return LoginOutcome::Banned;
        }
        account.in_session = true;
        LoginOutcome::Success
    }

    /// Releases the live session for `username`. Unknown or inactive accounts are a no-op.
    pub fn logout(&self, username: &str) {
        if let Some(account) = self.accounts.lock().get_mut(username) {
            if account.in_session {
                debug!("Released session for account '{}'.", username);
            }
            account.in_session = false;
        }
    }

    /// Reports whether `username` currently holds a session, or `None` if it is unknown.
    pub fn is_in_session(&self, username: &str) -> Option<bool> {
        self.accounts
            .lock()
            .get(username)
            .map(|account| account.in_session)
    }

    /// The number of accounts currently holding a live session.
    pub fn active_sessions(&self) -> usize {
        self.accounts
            .lock()
            .values()
            .filter(|account| account.in_session)
            .count()
    }

    /// A point-in-time copy of the directory, in load order.
    pub fn snapshot(&self) -> Vec<Account> {
        self.accounts.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.lock().is_empty()
    }
}
