//! In-memory organisation-to-session-token store backed by `DashMap`.

use std::fmt;

use dashmap::DashMap;

/// Token pair remembered for one organisation.
///
/// `original` is the token the administrator supplied; `effective` is the
/// one currently accepted by the portal, which changes when the portal
/// rotates the auth cookie.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub original: String,
    pub effective: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("rotated", &(self.original != self.effective))
            .finish()
    }
}

/// Thread-safe token store shared by request handlers and the refresher.
///
/// Every read and write of an entry holds that entry's shard lock, so a
/// reader always sees a complete pair. Reads return copies.
#[derive(Default)]
pub struct TokenStore {
    entries: DashMap<String, TokenPair>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `token` as both the original and effective token for `org_id`.
    pub fn put(&self, org_id: &str, token: &str) {
        self.entries.insert(
            org_id.to_string(),
            TokenPair {
                original: token.to_string(),
                effective: token.to_string(),
            },
        );
    }

    /// Records `token` for `org_id` and returns the token to send now.
    ///
    /// Re-persisting the token already stored as the original keeps any
    /// rotation and returns the effective token; a different token replaces
    /// the entry.
    pub fn persist(&self, org_id: &str, token: &str) -> String {
        let mut entry = self
            .entries
            .entry(org_id.to_string())
            .or_insert_with(|| TokenPair {
                original: token.to_string(),
                effective: token.to_string(),
            });
        if entry.original != token {
            *entry = TokenPair {
                original: token.to_string(),
                effective: token.to_string(),
            };
        }
        entry.effective.clone()
    }

    pub fn get(&self, org_id: &str) -> Option<TokenPair> {
        self.entries.get(org_id).map(|entry| entry.value().clone())
    }

    /// Replaces the effective token only if it still equals `expected`.
    ///
    /// Returns whether the entry was updated. A concurrent `put` between the
    /// refresher's read and this call wins.
    pub fn rotate(&self, org_id: &str, expected: &str, effective: &str) -> bool {
        match self.entries.get_mut(org_id) {
            Some(mut entry) if entry.effective == expected => {
                entry.effective = effective.to_string();
                true
            }
            _ => false,
        }
    }

    /// Removes the entry only if its effective token is still `expected`.
    pub fn expire(&self, org_id: &str, expected: &str) -> bool {
        self.entries
            .remove_if(org_id, |_, pair| pair.effective == expected)
            .is_some()
    }

    pub fn remove(&self, org_id: &str) -> Option<TokenPair> {
        self.entries.remove(org_id).map(|(_, pair)| pair)
    }

    /// Token to send for `org_id` when the caller presents `token`.
    ///
    /// A caller presenting the token it originally stored gets the current
    /// effective token; anyone else uses exactly what they supplied.
    pub fn effective_token(&self, org_id: &str, token: &str) -> String {
        match self.entries.get(org_id) {
            Some(entry) if entry.original == token => entry.effective.clone(),
            _ => token.to_string(),
        }
    }

    pub fn org_ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
