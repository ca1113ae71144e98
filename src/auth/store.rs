// Process-wide credential slot

use chrono::Utc;
use std::sync::{Arc, RwLock};

use super::types::Credential;

/// Holds zero or one credential shared by request handlers and the sweep.
///
/// The slot stores an `Arc<Credential>`, so a publish swaps one pointer and a
/// reader sees either the old credential or the new one, never a mix. The
/// lock is never held across an await point.
#[derive(Debug, Default)]
pub struct TokenStore {
    slot: RwLock<Option<Arc<Credential>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current credential, or `None` once it has passed `expires_at`
    pub fn get(&self) -> Option<Arc<Credential>> {
        self.last_known().filter(|cred| !cred.is_expired())
    }

    /// Current credential including an expired one that has not been replaced.
    ///
    /// The refresh token outlives the access token, so refresh paths read
    /// from here rather than from `get`.
    pub fn last_known(&self) -> Option<Arc<Credential>> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    pub fn is_available(&self) -> bool {
        self.get().is_some()
    }

    /// Replace the stored credential
    pub fn set(&self, credential: Credential) -> Arc<Credential> {
        let credential = Arc::new(credential);
        let ttl = credential.expires_at - Utc::now();
        {
            let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
            *slot = Some(Arc::clone(&credential));
        }
        tracing::debug!(
            token = credential.redacted(),
            ttl_secs = ttl.num_seconds(),
            "Stored Twitch credential"
        );
        credential
    }

    /// Replace the stored credential only while `expected` is still the one held.
    ///
    /// Returns `None` and leaves the slot alone when it was cleared or
    /// replaced in the meantime.
    pub fn replace_if_current(
        &self,
        expected: &Arc<Credential>,
        credential: Credential,
    ) -> Option<Arc<Credential>> {
        let credential = Arc::new(credential);
        {
            let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(held) if Arc::ptr_eq(held, expected) => {
                    *slot = Some(Arc::clone(&credential));
                }
                _ => return None,
            }
        }
        tracing::debug!(token = credential.redacted(), "Stored rotated Twitch credential");
        Some(credential)
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if slot.take().is_some() {
            tracing::info!("Twitch credential cleared");
        }
    }
}
