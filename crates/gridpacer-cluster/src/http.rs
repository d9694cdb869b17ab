//! HTTP/1 JSON client for the cluster master.
//!
//! One connection per request, bounded by a per-request timeout. The loop
//! makes a handful of requests per cycle at most, so connection pooling
//! buys nothing here.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use tracing::debug;

use gridpacer_core::Phase;

use crate::api::{CapacityRequest, ClusterApi, StatusReport};
use crate::error::{ClusterError, ClusterResult};

/// `ClusterApi` implementation speaking JSON over HTTP/1 to the master.
pub struct HttpClusterApi {
    /// Master address as `host:port`.
    master: String,
    /// Per-request timeout.
    timeout: Duration,
}

impl HttpClusterApi {
    pub fn new(master: impl Into<String>, timeout: Duration) -> Self {
        Self {
            master: master.into(),
            timeout,
        }
    }

    /// Issue one request and return the response body.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> ClusterResult<Bytes> {
        let attempt = async {
            let stream = tokio::net::TcpStream::connect(&self.master)
                .await
                .map_err(|e| ClusterError::Connect(e.to_string()))?;

            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| ClusterError::Connect(e.to_string()))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let uri = format!("http://{}{}", self.master, path);
            let req = http::Request::builder()
                .method(method)
                .uri(&uri)
                .header("host", &self.master)
                .header("content-type", "application/json")
                .header("user-agent", "gridpacer/0.1")
                .body(Full::new(Bytes::from(body.unwrap_or_default())))
                .map_err(|e| ClusterError::Request(e.to_string()))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| ClusterError::Request(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(ClusterError::Status(resp.status().as_u16()));
            }

            let collected = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| ClusterError::Request(e.to_string()))?;
            Ok(collected.to_bytes())
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::Timeout),
        }
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn fetch_status(&self) -> ClusterResult<StatusReport> {
        let body = self.request("GET", "/v1/status", None).await?;
        let report: StatusReport =
            serde_json::from_slice(&body).map_err(|e| ClusterError::Decode(e.to_string()))?;
        debug!(
            jobs = report.jobs.len(),
            cpu = report.cpu_ratio,
            mem = report.mem_ratio,
            "status report fetched"
        );
        Ok(report)
    }

    async fn set_capacity(&self, job_id: &str, phase: Phase, capacity: u32) -> ClusterResult<()> {
        let body = serde_json::to_vec(&CapacityRequest { phase, capacity })
            .map_err(|e| ClusterError::Request(e.to_string()))?;
        let path = format!("/v1/jobs/{job_id}/capacity");
        self.request("POST", &path, Some(body)).await?;
        Ok(())
    }

    async fn kill_job(&self, job_id: &str) -> ClusterResult<()> {
        let path = format!("/v1/jobs/{job_id}/kill");
        self.request("POST", &path, None).await?;
        Ok(())
    }
}
