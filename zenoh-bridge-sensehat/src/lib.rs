//! Zenoh bridge for the Raspberry Pi Sense HAT.
//!
//! Samples humidity, pressure, and temperature from the HAT's environmental
//! sensors on a fixed interval and publishes each reading to Zenoh as a flat
//! JSON object:
//!
//! ```text
//! {"deviceId":"dev1","humidity":45.68,"pressure":1012.35,"temperature":22.22}
//! ```
//!
//! # Key Expressions
//!
//! ```text
//! edgesense/sensehat/<device>/<channel>
//! ```
//!
//! Where `<device>` is the identity from `IOTEDGE_DEVICEID` and `<channel>`
//! is the configured logical output channel (default `output1`).

pub mod config;
pub mod publisher;
pub mod sensor;
pub mod sink;
