// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for `DeviceIdentity`. Prefers the OS-native secret store via
//! `keyring`; falls back to an atomically-written JSON file under the state
//! directory when no platform keyring backend is reachable (headless CI, a
//! minimal Linux image with no secret-service daemon).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::model::DeviceIdentity;

const KEYRING_SERVICE: &str = "edgebridge";
const KEYRING_USER: &str = "device-identity";

/// Resolves the on-disk fallback path: `BRIDGE_STATE_DIR`, else
/// `$XDG_STATE_HOME/edgebridge`, else `$HOME/.local/state/edgebridge`, else
/// `./.edgebridge`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("BRIDGE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("edgebridge");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/edgebridge");
    }
    PathBuf::from(".edgebridge")
}

fn fallback_path() -> PathBuf {
    state_dir().join("identity.json")
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIdentity {
    device_id: String,
    device_key: String,
}

/// Persists `identity`, preferring the platform keyring. Returns an error
/// only if both the keyring write and the file fallback fail.
pub fn save(identity: &DeviceIdentity) -> Result<(), BridgeError> {
    let payload = serde_json::to_string(&PersistedIdentity {
        device_id: identity.device_id.clone(),
        device_key: identity.device_key.clone(),
    })
    .map_err(|e| BridgeError::Integrity(format!("serializing device identity: {e}")))?;

    match keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        Ok(entry) => match entry.set_password(&payload) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "keyring unavailable, falling back to file-backed identity store");
                save_fallback(&payload)
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "keyring unavailable, falling back to file-backed identity store");
            save_fallback(&payload)
        }
    }
}

fn save_fallback(payload: &str) -> Result<(), BridgeError> {
    let dir = state_dir();
    std::fs::create_dir_all(&dir)
        .map_err(|e| BridgeError::Integrity(format!("creating state dir {}: {e}", dir.display())))?;
    let path = fallback_path();
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, payload)
        .map_err(|e| BridgeError::Integrity(format!("writing {}: {e}", tmp.display())))?;
    std::fs::rename(&tmp, &path)
        .map_err(|e| BridgeError::Integrity(format!("renaming {} -> {}: {e}", tmp.display(), path.display())))?;
    Ok(())
}

/// Loads a previously persisted identity. Absence (either store empty) is
/// `Ok(None)`, not an error — the daemon starts "unpaired".
pub fn load() -> Result<Option<DeviceIdentity>, BridgeError> {
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        match entry.get_password() {
            Ok(payload) => return Ok(Some(parse(&payload)?)),
            Err(keyring::Error::NoEntry) => {}
            Err(e) => tracing::warn!(error = %e, "keyring read failed, checking file fallback"),
        }
    }
    let path = fallback_path();
    if !path.exists() {
        return Ok(None);
    }
    let payload = std::fs::read_to_string(&path)
        .map_err(|e| BridgeError::Integrity(format!("reading {}: {e}", path.display())))?;
    Ok(Some(parse(&payload)?))
}

fn parse(payload: &str) -> Result<DeviceIdentity, BridgeError> {
    let persisted: PersistedIdentity = serde_json::from_str(payload)
        .map_err(|e| BridgeError::Integrity(format!("parsing device identity: {e}")))?;
    Ok(DeviceIdentity { device_id: persisted.device_id, device_key: persisted.device_key })
}

/// Removes both stores, used by the `unpair` CLI affordance.
pub fn clear() -> Result<(), BridgeError> {
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        let _ = entry.delete_credential();
    }
    let path = fallback_path();
    if path.exists() {
        std::fs::remove_file(&path)
            .map_err(|e| BridgeError::Integrity(format!("removing {}: {e}", path.display())))?;
    }
    Ok(())
}
