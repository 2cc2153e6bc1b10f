//! Transport to the external scoring oracle.
//!
//! The dispatcher only sees [`ScoringOracle`]; [`HttpOracle`] is the
//! production implementation, posting the feature rows as JSON over a
//! fresh HTTP/1.1 connection per call.

use anyhow::{bail, Context};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::Uri;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::types::OracleFeatures;

/// Largest oracle response body accepted by default.
pub const MAX_RESPONSE_BYTES: usize = 1 << 20;

/// A service that scores a batch of feature rows.
///
/// Implementations return the raw response body on success. Reachability
/// failures map to `OracleUnavailable`; interpreting the body is the
/// dispatcher's job.
pub trait ScoringOracle: Send + Sync {
    fn score<'a>(&'a self, rows: &'a [OracleFeatures]) -> BoxFuture<'a, DispatchResult<Bytes>>;
}

/// Oracle reached over plain HTTP, e.g. `http://localhost:5000/predict`.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    uri: Uri,
    /// `host:port` used for the TCP connect.
    address: String,
    host_header: String,
    response_limit: usize,
}

impl HttpOracle {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let uri: Uri = url
            .parse()
            .with_context(|| format!("invalid oracle url {url}"))?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => bail!("unsupported oracle url scheme {other} (only http is supported)"),
            None => bail!("oracle url {url} has no scheme"),
        }
        let Some(authority) = uri.authority().cloned() else {
            bail!("oracle url {url} has no host");
        };

        let port = authority.port_u16().unwrap_or(80);
        let address = format!("{}:{}", authority.host(), port);

        Ok(Self {
            uri,
            address,
            host_header: authority.as_str().to_string(),
            response_limit: MAX_RESPONSE_BYTES,
        })
    }

    pub fn with_response_limit(mut self, bytes: usize) -> Self {
        self.response_limit = bytes;
        self
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    async fn post(&self, body: Vec<u8>) -> DispatchResult<Bytes> {
        let uri = &self.uri;

        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| {
                debug!(error = %e, %uri, "oracle connection failed");
                DispatchError::OracleUnavailable(format!("cannot connect to {}: {e}", self.address))
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| {
                debug!(error = %e, %uri, "oracle handshake failed");
                DispatchError::OracleUnavailable(format!("handshake with {} failed: {e}", self.address))
            })?;

        // Drive the connection in the background; aborted when this call
        // returns or is dropped.
        let _conn = ConnectionTask(tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "oracle connection closed with error");
            }
        }));

        let target = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(target)
            .header(http::header::HOST, &self.host_header)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::USER_AGENT, "charge-priority/0.1")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| DispatchError::OracleUnavailable(format!("cannot build oracle request: {e}")))?;

        let resp = sender.send_request(req).await.map_err(|e| {
            debug!(error = %e, %uri, "oracle request failed");
            DispatchError::OracleUnavailable(format!("request to {uri} failed: {e}"))
        })?;

        let status = resp.status();
        if !status.is_success() {
            debug!(%status, %uri, "oracle returned non-2xx");
            return Err(DispatchError::OracleUnavailable(format!(
                "oracle at {uri} answered with status {status}"
            )));
        }

        let limit = self.response_limit;
        let body = Limited::new(resp.into_body(), limit)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    debug!(%uri, limit, "oracle response too large");
                    DispatchError::OracleContractViolation(format!(
                        "oracle response exceeds {limit} bytes"
                    ))
                } else {
                    DispatchError::OracleUnavailable(format!("reading oracle response failed: {e}"))
                }
            })?
            .to_bytes();

        debug!(%uri, bytes = body.len(), "oracle responded");
        Ok(body)
    }
}

impl ScoringOracle for HttpOracle {
    fn score<'a>(&'a self, rows: &'a [OracleFeatures]) -> BoxFuture<'a, DispatchResult<Bytes>> {
        Box::pin(async move {
            let body = serde_json::to_vec(rows).map_err(|e| {
                DispatchError::MalformedInput(format!("cannot encode oracle payload: {e}"))
            })?;
            self.post(body).await
        })
    }
}

struct ConnectionTask(JoinHandle<()>);

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}
