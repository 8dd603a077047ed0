// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token storage: the single source of truth for "is this client authenticated".
//!
//! The admin app historically persisted tokens under several key names as the
//! storage schema evolved; existing installs may hold a token under any of
//! them. The store keeps every alias in sync on write and clears them together,
//! so readers see one consistent pair regardless of which key they ask for.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Access-token key aliases, in read priority order.
const ACCESS_KEYS: &[&str] = &["adminToken", "authToken", "token"];

/// Refresh-token key aliases, in read priority order.
const REFRESH_KEYS: &[&str] = &["adminRefreshToken", "refreshToken"];

/// An access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Durable token storage with legacy key fan-out.
///
/// All mutation goes through [`set`](Self::set) and [`clear`](Self::clear);
/// both hold the write lock for the full alias sweep, so no reader observes a
/// torn pair. Persistence failures degrade to "re-authenticate on next start"
/// and are logged rather than returned.
pub struct TokenStore {
    entries: RwLock<HashMap<String, String>>,
    persist_path: Option<PathBuf>,
}

impl TokenStore {
    /// In-memory store with no persistence (tests, ephemeral sessions).
    pub fn in_memory() -> Self {
        Self { entries: RwLock::new(HashMap::new()), persist_path: None }
    }

    /// Store backed by `tokens.json` under `dir`, seeded from any existing file.
    pub fn with_state_dir(dir: &Path) -> Self {
        let path = dir.join("tokens.json");
        let entries = match load(&path) {
            Ok(map) => map,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), err = %e, "failed to load persisted tokens");
                }
                HashMap::new()
            }
        };
        Self { entries: RwLock::new(entries), persist_path: Some(path) }
    }

    /// Read the current pair. Returns `None` when no access token is present,
    /// regardless of any stale refresh token left behind.
    pub fn get(&self) -> Option<TokenPair> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let access_token = first_non_empty(&entries, ACCESS_KEYS)?;
        let refresh_token = first_non_empty(&entries, REFRESH_KEYS);
        Some(TokenPair { access_token, refresh_token })
    }

    /// Current refresh token, if any.
    pub fn refresh_token(&self) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        first_non_empty(&entries, REFRESH_KEYS)
    }

    /// Write the pair under every alias. A partial pair (no refresh token)
    /// only updates the access aliases.
    pub fn set(&self, pair: &TokenPair) {
        let snapshot = {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            for key in ACCESS_KEYS {
                entries.insert((*key).to_owned(), pair.access_token.clone());
            }
            if let Some(ref refresh) = pair.refresh_token {
                for key in REFRESH_KEYS {
                    entries.insert((*key).to_owned(), refresh.clone());
                }
            }
            entries.clone()
        };
        self.persist(&snapshot);
    }

    /// Remove every alias. Idempotent.
    pub fn clear(&self) {
        let snapshot = {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            for key in ACCESS_KEYS.iter().chain(REFRESH_KEYS) {
                entries.remove(*key);
            }
            entries.clone()
        };
        self.persist(&snapshot);
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        let Some(ref path) = self.persist_path else {
            return;
        };
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    tracing::warn!(err = %e, "failed to create token state dir");
                    return;
                }
            }
        }
        if let Err(e) = save(path, entries) {
            tracing::warn!(path = %path.display(), err = %e, "failed to persist tokens");
        }
    }
}

fn first_non_empty(entries: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| entries.get(*k))
        .find(|v| !v.is_empty())
        .cloned()
}

/// Load the persisted alias map from a JSON file.
fn load(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    let entries: HashMap<String, String> = serde_json::from_str(&contents)?;
    Ok(entries)
}

/// Save the alias map to a JSON file atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) to avoid corruption when
/// concurrent saves race on the same `.tmp` file.
fn save(path: &Path, entries: &HashMap<String, String>) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(entries)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolve the state directory for shopwire data.
///
/// Checks `SHOPWIRE_STATE_DIR`, then `$XDG_STATE_HOME/shopwire`,
/// then `$HOME/.local/state/shopwire`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SHOPWIRE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("shopwire");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/shopwire");
    }
    PathBuf::from(".shopwire")
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
