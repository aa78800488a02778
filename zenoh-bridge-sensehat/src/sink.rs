//! Message sink for publishing readings toward the cloud.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

use edgesense_common::ZenohConfig;

/// Sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to connect sink: {0}")]
    Connect(String),

    #[error("Failed to publish to {key}: {message}")]
    Publish { key: String, message: String },

    #[error("Failed to close session: {0}")]
    Close(String),
}

/// Destination for serialized readings.
///
/// Delivery guarantees, timeouts, and retries belong to the implementation;
/// the publisher loop only awaits the outcome of each publish.
pub trait MessageSink {
    /// Publish a payload to a logical output channel.
    fn publish(
        &self,
        channel: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), SinkError>>;

    /// Release the sink's resources.
    ///
    /// Safe to call more than once; calls after the first are no-ops.
    fn shutdown(&self) -> impl Future<Output = Result<(), SinkError>>;
}

/// Zenoh-backed sink.
///
/// Logical channels map to key expressions as `<key_prefix>/<channel>`.
pub struct ZenohSink {
    session: zenoh::Session,
    key_prefix: String,
    closed: AtomicBool,
}

impl ZenohSink {
    /// Connect using the deployment's Zenoh configuration.
    pub async fn connect(
        config: &ZenohConfig,
        key_prefix: impl Into<String>,
    ) -> Result<Self, SinkError> {
        let session = edgesense_common::connect(config)
            .await
            .map_err(|e| SinkError::Connect(e.to_string()))?;

        Ok(Self {
            session,
            key_prefix: key_prefix.into(),
            closed: AtomicBool::new(false),
        })
    }

    /// Get the key prefix.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Build the full key expression for a logical channel.
    pub fn build_key(&self, channel: &str) -> String {
        format!("{}/{}", self.key_prefix, channel)
    }

    /// Publish raw bytes to a full key expression (status messages, etc.).
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) -> Result<(), SinkError> {
        self.session
            .put(key, payload)
            .await
            .map_err(|e| SinkError::Publish {
                key: key.to_string(),
                message: e.to_string(),
            })
    }
}

impl MessageSink for ZenohSink {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), SinkError> {
        let key = self.build_key(channel);
        self.publish_raw(&key, payload).await
    }

    async fn shutdown(&self) -> Result<(), SinkError> {
        // Write-once guard: the session closes exactly once, every later
        // call is a no-op.
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Sink already shut down");
            return Ok(());
        }

        self.session
            .close()
            .await
            .map_err(|e| SinkError::Close(e.to_string()))
    }
}
