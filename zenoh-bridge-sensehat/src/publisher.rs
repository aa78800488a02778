//! The telemetry publisher loop.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use edgesense_common::Reading;

use crate::sensor::{SensorError, SensorSource};
use crate::sink::{MessageSink, SinkError};

/// Errors terminating the publish loop.
///
/// There is no local recovery: any failure during an iteration propagates
/// out of [`TelemetryPublisher::run`] and ends the loop.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Sensor read failed: {0}")]
    Sensor(#[from] SensorError),

    #[error("Failed to serialize reading: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Drives the read → publish → sleep cycle.
///
/// Strictly sequential: one reading is polled, logged, and published to the
/// output channel, then the loop sleeps for the poll interval. The stop flag
/// is checked between iterations only; a stop requested mid-sleep takes
/// effect once the sleep completes, so termination can lag by up to one
/// interval.
pub struct TelemetryPublisher {
    device_id: String,
    channel: String,
    interval: Duration,
}

impl TelemetryPublisher {
    /// Create a publisher for the given device identity and output channel.
    pub fn new(
        device_id: impl Into<String>,
        channel: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            channel: channel.into(),
            interval,
        }
    }

    /// Run until the stop flag is set or an iteration fails.
    ///
    /// Returns `Ok(())` on a flag-initiated stop; the caller owns sink
    /// shutdown on both paths.
    pub async fn run<S, M>(
        &self,
        sensor: &mut S,
        sink: &M,
        stop: watch::Receiver<bool>,
    ) -> Result<(), PublishError>
    where
        S: SensorSource,
        M: MessageSink,
    {
        info!(
            device_id = %self.device_id,
            channel = %self.channel,
            interval_secs = self.interval.as_secs(),
            "Starting telemetry publisher"
        );

        while !*stop.borrow() {
            self.publish_once(sensor, sink).await?;
            tokio::time::sleep(self.interval).await;
        }

        info!("Stop requested, exiting publish loop");
        Ok(())
    }

    /// One iteration: poll all three channels, round, log, publish.
    async fn publish_once<S, M>(&self, sensor: &mut S, sink: &M) -> Result<(), PublishError>
    where
        S: SensorSource,
        M: MessageSink,
    {
        let humidity = sensor.read_humidity()?;
        let pressure = sensor.read_pressure()?;
        let temperature = sensor.read_temperature()?;

        let reading = Reading::new(&self.device_id, humidity, pressure, temperature);
        let line = reading.to_json()?;

        info!("{line}");

        sink.publish(&self.channel, line.into_bytes()).await?;
        Ok(())
    }
}
