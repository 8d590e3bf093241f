//! Credential context handed to every registry call.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::store::{self, StoreError};

const SESSION_FILE: &str = "session.json";
const SEEN_FILE: &str = "seen_messages.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

impl Session {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn claims(&self) -> Option<ExpiryClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        decode::<ExpiryClaims>(&self.token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// The token's `exp` claim. The signature is not checked: the backend
    /// owns verification, the client only wants to know when to log in again.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.claims()?.exp?, 0).single()
    }

    /// Expired, or not a decodable token at all.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.claims() {
            Some(claims) => claims.exp.is_some_and(|exp| exp < now.timestamp()),
            None => true,
        }
    }
}

/// Persisted login: session.json in the config dir.
pub struct SessionStore;

impl SessionStore {
    pub fn load() -> Option<Session> {
        store::load_json(SESSION_FILE)
    }

    /// The stored session if it is still usable; an expired one is removed.
    pub fn load_valid(now: DateTime<Utc>) -> Option<Session> {
        let session = Self::load()?;
        if session.is_expired(now) {
            tracing::info!(user = %session.username, "stored session expired");
            if let Err(e) = Self::clear() {
                tracing::warn!(error = %e, "cannot remove expired session");
            }
            return None;
        }
        Some(session)
    }

    pub fn save(session: &Session) -> Result<(), StoreError> {
        store::save_json(SESSION_FILE, session)
    }

    pub fn clear() -> Result<(), StoreError> {
        store::remove(SESSION_FILE)
    }

    pub fn load_seen() -> BTreeMap<String, usize> {
        store::load_json(SEEN_FILE).unwrap_or_default()
    }

    pub fn save_seen(seen: &BTreeMap<String, usize>) -> Result<(), StoreError> {
        store::save_json(SEEN_FILE, seen)
    }
}
