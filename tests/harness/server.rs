//! TestServer - end-to-end test harness
//!
//! Spawns the actual loopchain binary on a random port, working in a
//! temporary directory so each instance gets its own input/output/temp tree
//! and its own in-memory storage.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use tempfile::TempDir;

/// Test harness that spawns the loopchain binary on a random port
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    child: Child,
    /// Working directory for the server process (cleaned up on drop)
    temp_dir: TempDir,
}

impl TestServer {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let input_dir = temp_dir.path().join("input");
        std::fs::create_dir_all(&input_dir)?;

        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let child = Command::new(env!("CARGO_BIN_EXE_loopchain"))
            .current_dir(temp_dir.path())
            .arg("--bind")
            .arg(addr.to_string())
            .arg("--input-dir")
            .arg(&input_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to spawn loopchain binary: {}", e))?;

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        let server = Self {
            addr,
            client,
            child,
            temp_dir,
        };

        // Poll until server is ready (max 5 seconds to handle resource contention)
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if server.get("/health").await.is_ok() {
                return Ok(server);
            }
        }

        // Drop kills the child
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Directory unannotated image names resolve against
    pub fn input_dir(&self) -> PathBuf {
        self.temp_dir.path().join("input")
    }

    /// Directory `[output]` names resolve against
    pub fn output_dir(&self) -> PathBuf {
        self.temp_dir.path().join("output")
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Run a node, returning status and JSON body
    pub async fn execute(&self, class_type: &str, inputs: Value) -> Result<(u16, Value)> {
        let request = serde_json::json!({"class_type": class_type, "inputs": inputs});
        let resp = self.post("/loopchain/execute", &request).await?;
        let status = resp.status().as_u16();
        Ok((status, resp.json().await?))
    }

    /// Query the loop length for a key
    pub async fn length(&self, kind: &str, key: &str, batch_size: usize) -> Result<i64> {
        let batch_size = batch_size.to_string();
        let resp = self
            .client
            .get(format!("{}/loopchain/dataloader_length", self.base_url()))
            .query(&[("type", kind), ("key", key), ("batch_size", batch_size.as_str())])
            .send()
            .await?;
        let body: Value = resp.json().await?;
        body["result"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("missing result in {}", body))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Write a solid-color PNG
pub fn write_png(path: &Path, width: u32, height: u32, shade: u8) {
    image::RgbImage::from_pixel(width, height, image::Rgb([shade, shade, shade]))
        .save(path)
        .expect("Failed to write test image");
}
