// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box harness for the process-level smoke tests: builds a temporary
//! config pointing the real `edgebridge` binary at a wiremock-stubbed cloud,
//! spawns it, and exposes its local HTTP surface to the test.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static RING_PROVIDER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// A spawned `edgebridge` daemon under test, with its own scratch state
/// directory. The child is reaped on drop so a panicking test never leaks
/// an orphaned process.
pub struct BridgeProcess {
    child: Child,
    port: u16,
    _state_dir: tempfile::TempDir,
}

impl BridgeProcess {
    /// Launch edgebridge against `server_url`, running only the simulator
    /// adapter against a fresh on-disk queue in a tier-`full` config.
    pub fn start(server_url: &str) -> anyhow::Result<Self> {
        install_rustls_provider_once();

        let binary = locate_binary()?;
        let port = bind_and_release_a_port()?;
        let state_dir = tempfile::tempdir()?;
        let db_path = state_dir.path().join("queue.sqlite3");
        let config_path = state_dir.path().join("bridge.yaml");

        let yaml = format!(
            "serverUrl: {server_url}\ndatabasePath: {}\ntier: full\nenabledAdapters: [simulator]\nadapterConfigs:\n  simulator:\n    name: simulator\n    enabled: true\napiServer:\n  host: 127.0.0.1\n  port: {port}\n",
            db_path.display()
        );
        std::fs::File::create(&config_path)?.write_all(yaml.as_bytes())?;

        let child = Command::new(&binary)
            .args(["--config", config_path.to_str().unwrap_or_default(), "--log-level", "warn"])
            .env("BRIDGE_STATE_DIR", state_dir.path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port, _state_dir: state_dir })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Block until `/health` answers at all (any status code counts), or
    /// give up after `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let url = format!("{}/health", self.base_url());
        let deadline = tokio::time::Instant::now() + timeout;

        while tokio::time::Instant::now() < deadline {
            if client.get(&url).send().await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("edgebridge never answered on {url} within {timeout:?}")
    }
}

impl Drop for BridgeProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn install_rustls_provider_once() {
    if RING_PROVIDER_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn locate_binary() -> anyhow::Result<PathBuf> {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .ancestors()
        .nth(2)
        .ok_or_else(|| anyhow::anyhow!("{} has no grandparent directory", manifest_dir.display()))?;
    let binary = workspace_root.join("target").join("debug").join("edgebridge");
    anyhow::ensure!(binary.exists(), "expected a built edgebridge binary at {}", binary.display());
    Ok(binary)
}

/// There's no portable way to reserve a port without a gap between releasing
/// the listener and the child binding it, so this just picks one that's free
/// right now and accepts the (small, local-only) race.
fn bind_and_release_a_port() -> anyhow::Result<u16> {
    Ok(std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port())
}
