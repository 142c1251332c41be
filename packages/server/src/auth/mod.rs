//! API key authentication with a TTL cache in front of the record store.

pub mod cache;

use std::sync::Arc;

use sea_orm::DbErr;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::records::RecordStore;
use cache::CredentialCache;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// The caller behind a valid API key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub owner_id: i32,
    /// The raw key, echoed back for shard computation.
    pub api_key: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("API-KEY missing.")]
    MissingCredential,

    #[error("Invalid API-KEY.")]
    UnknownCredential,

    #[error("API key lookup failed: {0}")]
    Lookup(#[from] DbErr),
}

/// Resolves raw API keys to principals, cache first.
pub struct KeyAuthenticator {
    records: Arc<dyn RecordStore>,
    cache: Arc<dyn CredentialCache>,
}

impl KeyAuthenticator {
    pub fn new(records: Arc<dyn RecordStore>, cache: Arc<dyn CredentialCache>) -> Self {
        Self { records, cache }
    }

    /// Authenticate the value of the API key header.
    ///
    /// A cache hit is trusted without consulting the store, so revocation takes
    /// effect only once the entry's TTL has elapsed.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, header: Option<&str>) -> Result<Principal, AuthError> {
        let api_key = match header {
            Some(value) if !value.is_empty() => value,
            _ => return Err(AuthError::MissingCredential),
        };

        if let Some(principal) = self.cache.get(api_key) {
            debug!(owner_id = principal.owner_id, "API key cache hit");
            return Ok(principal);
        }

        let record = self
            .records
            .find_api_key(api_key)
            .await?
            .ok_or(AuthError::UnknownCredential)?;

        let principal = Principal {
            owner_id: record.user_id,
            api_key: record.key,
        };
        self.cache.set(api_key.to_string(), principal.clone());
        debug!(owner_id = principal.owner_id, "API key resolved from store");

        Ok(principal)
    }
}
