// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signed HTTP client for the cloud surface: pairing, check-in, heartbeat,
//! config fetch. A thin `reqwest::Client` wrapper with typed request and
//! response structs, using HMAC request signing instead of bearer tokens.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::model::{chrono_compat::Timestamp, Tier};

const CLOCK_SKEW_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub hostname: String,
    pub platform: String,
    pub version: String,
    pub tier: Tier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairResponse {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "deviceKey")]
    pub device_key: String,
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckinEvent {
    #[serde(rename = "eventId")]
    pub event_id: String,
    #[serde(rename = "externalUserId")]
    pub external_user_id: String,
    pub timestamp: String,
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(rename = "isSimulated")]
    pub is_simulated: bool,
    #[serde(rename = "deviceId")]
    pub device_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckinResponse {
    pub success: bool,
    #[serde(rename = "processedIds", default)]
    pub processed_ids: Vec<String>,
    #[serde(rename = "failedIds", default)]
    pub failed_ids: Vec<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: String,
    pub tier: Tier,
    #[serde(rename = "queueDepth")]
    pub queue_depth: u64,
    #[serde(rename = "cpuPercent")]
    pub cpu_percent: f32,
    #[serde(rename = "memoryPercent")]
    pub memory_percent: f32,
    #[serde(rename = "lastEventTime")]
    pub last_event_time: Option<String>,
}

/// Signed HTTP client, keyed by `(device_id, device_key)` once paired.
pub struct AuthenticatedClient {
    http: reqwest::Client,
    base_url: String,
    device_id: Option<String>,
    device_key: Option<String>,
    /// A server-suggested clock offset applied to the next signature after a
    /// 401 carrying `X-Server-Time`, retrying the request exactly once.
    clock_offset_secs: AtomicI64,
}

impl AuthenticatedClient {
    pub fn new(base_url: String) -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self {
            http: reqwest::Client::builder().timeout(Duration::from_secs(30)).build().unwrap_or_default(),
            base_url,
            device_id: None,
            device_key: None,
            clock_offset_secs: AtomicI64::new(0),
        }
    }

    pub fn with_credentials(mut self, device_id: String, device_key: String) -> Self {
        self.device_id = Some(device_id);
        self.device_key = Some(device_key);
        self
    }

    pub fn is_paired(&self) -> bool {
        self.device_id.is_some() && self.device_key.is_some()
    }

    fn signature(device_key: &str, method: &str, path: &str, timestamp: i64, body: &[u8]) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, device_key.as_bytes());
        let mut data = Vec::new();
        data.extend_from_slice(method.as_bytes());
        data.extend_from_slice(path.as_bytes());
        data.extend_from_slice(timestamp.to_string().as_bytes());
        data.extend_from_slice(body);
        let tag = hmac::sign(&key, &data);
        BASE64.encode(tag.as_ref())
    }

    async fn signed_request<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, BridgeError> {
        let (Some(device_id), Some(device_key)) = (&self.device_id, &self.device_key) else {
            return Err(BridgeError::Auth("device is not paired".into()));
        };

        let body_bytes = match body {
            Some(b) => serde_json::to_vec(b).map_err(|e| BridgeError::Validation(format!("encoding request body: {e}")))?,
            None => Vec::new(),
        };

        let result = self
            .send_signed_once(&method, path, device_id, device_key, &body_bytes, self.clock_offset_secs.load(Ordering::Relaxed))
            .await?;

        if result.status() == reqwest::StatusCode::UNAUTHORIZED {
            if let Some(offset) = result
                .headers()
                .get("X-Server-Time")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok())
            {
                let adjustment = offset - Timestamp::now().unix_secs();
                if adjustment.abs() > CLOCK_SKEW_TOLERANCE_SECS * 10 {
                    tracing::error!(adjustment, "server-reported clock offset is far outside tolerance, check host clock");
                }
                self.clock_offset_secs.store(adjustment, Ordering::Relaxed);
                tracing::warn!(adjustment, "server reported clock skew, retrying once with adjusted timestamp");
                let retried = self
                    .send_signed_once(&method, path, device_id, device_key, &body_bytes, adjustment)
                    .await?;
                return Self::decode(retried).await;
            }
        }

        Self::decode(result).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_signed_once(
        &self,
        method: &reqwest::Method,
        path: &str,
        device_id: &str,
        device_key: &str,
        body_bytes: &[u8],
        offset_secs: i64,
    ) -> Result<reqwest::Response, BridgeError> {
        let timestamp = Timestamp::now().unix_secs() + offset_secs;
        let signature = Self::signature(device_key, method.as_str(), path, timestamp, body_bytes);
        let url = format!("{}{}", self.base_url, path);

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("X-Device-ID", device_id)
            .header("X-Timestamp", timestamp.to_string())
            .header("X-Signature", signature)
            .header("Content-Type", "application/json");
        if !body_bytes.is_empty() {
            req = req.body(body_bytes.to_vec());
        }
        req.send().await.map_err(BridgeError::from)
    }

    async fn decode<R: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<R, BridgeError> {
        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::REQUEST_TIMEOUT {
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::TransientIo(format!("{status}: {text}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::Auth(format!("{status}: {text}")));
        }
        response.json().await.map_err(BridgeError::from)
    }

    /// Unauthenticated pairing exchange: pair code + device info → persistent
    /// credentials. Caller persists via `crate::secret`.
    pub async fn pair(&self, pair_code: &str, info: &DeviceInfo) -> Result<PairResponse, BridgeError> {
        #[derive(Serialize)]
        struct PairRequest<'a> {
            #[serde(rename = "pairCode")]
            pair_code: &'a str,
            #[serde(rename = "deviceInfo")]
            device_info: &'a DeviceInfo,
        }
        let body = PairRequest { pair_code, device_info: info };
        let url = format!("{}/api/v1/devices/pair", self.base_url);
        let response = self.http.post(&url).json(&body).send().await.map_err(BridgeError::from)?;
        Self::decode(response).await
    }

    pub async fn checkin(&self, events: &[CheckinEvent]) -> Result<CheckinResponse, BridgeError> {
        if events.len() > 100 {
            return Err(BridgeError::Validation("checkin batch exceeds 100 events".into()));
        }
        #[derive(Serialize)]
        struct CheckinRequest<'a> {
            events: &'a [CheckinEvent],
        }
        let body = CheckinRequest { events };
        self.signed_request(reqwest::Method::POST, "/api/v1/checkin", Some(&body)).await
    }

    pub async fn heartbeat(&self, snapshot: &HealthSnapshot) -> Result<serde_json::Value, BridgeError> {
        self.signed_request(reqwest::Method::POST, "/api/v1/devices/heartbeat", Some(snapshot)).await
    }

    pub async fn fetch_config(&self) -> Result<serde_json::Value, BridgeError> {
        self.signed_request::<(), _>(reqwest::Method::GET, "/api/v1/devices/config", None).await
    }

    pub async fn cloud_health(&self) -> Result<bool, BridgeError> {
        let url = format!("{}/api/v1/health", self.base_url);
        let response = self.http.get(&url).send().await.map_err(BridgeError::from)?;
        Ok(response.status().is_success())
    }
}
