//! Sense HAT environmental sensor access.
//!
//! The HAT exposes its HTS221 (humidity + temperature) and LPS25H (pressure)
//! chips through the kernel Industrial I/O sysfs interface, so no userspace
//! driver stack is needed; readings are plain attribute file reads.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// IIO device name of the humidity/temperature chip.
const HTS221: &str = "hts221";

/// IIO device name of the pressure chip.
const LPS25H: &str = "lps25h";

/// Framebuffer name the Sense HAT LED matrix registers under.
const SENSE_FB_NAME: &str = "RPi-Sense FB";

/// 8x8 LED matrix, RGB565: 128 bytes of zeroes blanks the display.
const LED_MATRIX_BYTES: usize = 128;

/// IIO reports humidity and temperature in milli-units.
const MILLI: f64 = 1000.0;

/// IIO reports pressure in kilopascal; 1 kPa = 10 mbar.
const KPA_TO_MBAR: f64 = 10.0;

/// Sensor errors.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("IIO sysfs root '{0}' is not available (kernel IIO support required)")]
    IioUnavailable(PathBuf),

    #[error("IIO device '{0}' not found")]
    DeviceNotFound(&'static str),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed value in {path}: '{value}'")]
    Parse { path: PathBuf, value: String },

    #[error("Failed to clear LED matrix at {path}: {source}")]
    Reset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A source of environmental measurements.
///
/// Reads are synchronous and should be called close together in time so one
/// poll cycle reflects a single moment.
pub trait SensorSource {
    /// Percent relative humidity.
    fn read_humidity(&mut self) -> Result<f64, SensorError>;

    /// Atmospheric pressure in millibars.
    fn read_pressure(&mut self) -> Result<f64, SensorError>;

    /// Temperature in degrees Celsius.
    fn read_temperature(&mut self) -> Result<f64, SensorError>;

    /// Clear any display/indicator state. Called once at startup.
    fn reset(&mut self) -> Result<(), SensorError>;
}

/// Sense HAT driver backed by Linux IIO sysfs.
#[derive(Debug)]
pub struct IioSenseHat {
    /// Device directory of the HTS221 chip.
    hts221: PathBuf,
    /// Device directory of the LPS25H chip.
    lps25h: PathBuf,
    /// LED matrix framebuffer device, when present.
    framebuffer: Option<PathBuf>,
}

impl IioSenseHat {
    /// Construct from known device paths.
    pub fn new(hts221: PathBuf, lps25h: PathBuf, framebuffer: Option<PathBuf>) -> Self {
        Self {
            hts221,
            lps25h,
            framebuffer,
        }
    }

    /// Discover the Sense HAT under the given IIO sysfs root.
    ///
    /// Fails when IIO is unavailable or either chip is missing; this is the
    /// bridge's startup capability check. `framebuffer` overrides LED matrix
    /// auto-discovery.
    pub fn discover(iio_root: &Path, framebuffer: Option<PathBuf>) -> Result<Self, SensorError> {
        Self::discover_at(iio_root, Path::new("/sys/class/graphics"), framebuffer)
    }

    fn discover_at(
        iio_root: &Path,
        graphics_root: &Path,
        framebuffer: Option<PathBuf>,
    ) -> Result<Self, SensorError> {
        if !iio_root.is_dir() {
            return Err(SensorError::IioUnavailable(iio_root.to_path_buf()));
        }

        let hts221 = find_device(iio_root, HTS221)?;
        let lps25h = find_device(iio_root, LPS25H)?;

        let framebuffer = framebuffer.or_else(|| find_sense_framebuffer(graphics_root));

        debug!(
            hts221 = %hts221.display(),
            lps25h = %lps25h.display(),
            framebuffer = ?framebuffer,
            "Discovered Sense HAT devices"
        );

        Ok(Self::new(hts221, lps25h, framebuffer))
    }
}

impl SensorSource for IioSenseHat {
    fn read_humidity(&mut self) -> Result<f64, SensorError> {
        Ok(read_channel(&self.hts221, "in_humidityrelative")? / MILLI)
    }

    fn read_pressure(&mut self) -> Result<f64, SensorError> {
        Ok(read_channel(&self.lps25h, "in_pressure")? * KPA_TO_MBAR)
    }

    fn read_temperature(&mut self) -> Result<f64, SensorError> {
        Ok(read_channel(&self.hts221, "in_temp")? / MILLI)
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        match &self.framebuffer {
            Some(fb) => {
                std::fs::write(fb, [0u8; LED_MATRIX_BYTES]).map_err(|e| SensorError::Reset {
                    path: fb.clone(),
                    source: e,
                })?;
                debug!(framebuffer = %fb.display(), "Cleared LED matrix");
                Ok(())
            }
            None => {
                debug!("No Sense HAT framebuffer found, skipping LED clear");
                Ok(())
            }
        }
    }
}

/// Locate the IIO device directory whose `name` attribute matches.
fn find_device(iio_root: &Path, name: &'static str) -> Result<PathBuf, SensorError> {
    let entries = std::fs::read_dir(iio_root).map_err(|e| SensorError::Read {
        path: iio_root.to_path_buf(),
        source: e,
    })?;

    for entry in entries.flatten() {
        let dir = entry.path();
        if let Ok(device_name) = std::fs::read_to_string(dir.join("name"))
            && device_name.trim() == name
        {
            return Ok(dir);
        }
    }

    Err(SensorError::DeviceNotFound(name))
}

/// Locate the Sense HAT LED framebuffer device node, if the fb driver is loaded.
fn find_sense_framebuffer(graphics_root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(graphics_root).ok()?;

    for entry in entries.flatten() {
        if let Ok(name) = std::fs::read_to_string(entry.path().join("name"))
            && name.trim() == SENSE_FB_NAME
        {
            return Some(Path::new("/dev").join(entry.file_name()));
        }
    }

    None
}

/// Read one IIO channel in ABI units.
///
/// Prefers the processed `<prefix>_input` attribute; falls back to
/// `(raw + offset) * scale` when the driver only exposes raw values.
fn read_channel(device_dir: &Path, prefix: &str) -> Result<f64, SensorError> {
    let input = device_dir.join(format!("{prefix}_input"));
    if input.exists() {
        return read_attr(&input);
    }

    let raw = read_attr(&device_dir.join(format!("{prefix}_raw")))?;
    let offset = read_attr_or(device_dir, &format!("{prefix}_offset"), 0.0)?;
    let scale = read_attr_or(device_dir, &format!("{prefix}_scale"), 1.0)?;

    Ok((raw + offset) * scale)
}

fn read_attr(path: &Path) -> Result<f64, SensorError> {
    let content = std::fs::read_to_string(path).map_err(|e| SensorError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    content
        .trim()
        .parse::<f64>()
        .map_err(|_| SensorError::Parse {
            path: path.to_path_buf(),
            value: content.trim().to_string(),
        })
}

fn read_attr_or(device_dir: &Path, name: &str, default: f64) -> Result<f64, SensorError> {
    let path = device_dir.join(name);
    if path.exists() {
        read_attr(&path)
    } else {
        Ok(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_device(root: &Path, dir_name: &str, device_name: &str, attrs: &[(&str, &str)]) {
        let dir = root.join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{device_name}\n")).unwrap();
        for (attr, value) in attrs {
            fs::write(dir.join(attr), format!("{value}\n")).unwrap();
        }
    }

    fn fake_sense_hat(root: &Path) {
        write_device(
            root,
            "iio:device0",
            HTS221,
            &[
                ("in_humidityrelative_input", "45678.9"),
                ("in_temp_input", "22222"),
            ],
        );
        write_device(root, "iio:device1", LPS25H, &[("in_pressure_input", "101.2345")]);
    }

    #[test]
    fn test_discover_and_read() {
        let tmp = TempDir::new().unwrap();
        fake_sense_hat(tmp.path());

        let mut hat = IioSenseHat::discover_at(tmp.path(), Path::new("/nonexistent"), None).unwrap();

        assert_eq!(hat.read_humidity().unwrap(), 45.6789);
        assert_eq!(hat.read_temperature().unwrap(), 22.222);
        assert_eq!(hat.read_pressure().unwrap(), 1012.345);
    }

    #[test]
    fn test_discover_requires_iio_root() {
        let result =
            IioSenseHat::discover_at(Path::new("/nonexistent/iio"), Path::new("/nonexistent"), None);

        assert!(matches!(result, Err(SensorError::IioUnavailable(_))));
    }

    #[test]
    fn test_discover_requires_both_chips() {
        let tmp = TempDir::new().unwrap();
        write_device(
            tmp.path(),
            "iio:device0",
            HTS221,
            &[("in_humidityrelative_input", "40000")],
        );

        let result = IioSenseHat::discover_at(tmp.path(), Path::new("/nonexistent"), None);
        assert!(matches!(result, Err(SensorError::DeviceNotFound(LPS25H))));
    }

    #[test]
    fn test_input_preferred_over_raw() {
        let tmp = TempDir::new().unwrap();
        write_device(
            tmp.path(),
            "iio:device0",
            HTS221,
            &[
                ("in_temp_input", "20000"),
                ("in_temp_raw", "9999999"),
                ("in_temp_scale", "1000.0"),
            ],
        );
        write_device(tmp.path(), "iio:device1", LPS25H, &[("in_pressure_input", "100")]);

        let mut hat = IioSenseHat::discover_at(tmp.path(), Path::new("/nonexistent"), None).unwrap();
        assert_eq!(hat.read_temperature().unwrap(), 20.0);
    }

    #[test]
    fn test_raw_offset_scale_fallback() {
        let tmp = TempDir::new().unwrap();
        write_device(
            tmp.path(),
            "iio:device0",
            HTS221,
            &[
                ("in_temp_raw", "21000"),
                ("in_temp_offset", "1222"),
                ("in_temp_scale", "1.0"),
            ],
        );
        write_device(tmp.path(), "iio:device1", LPS25H, &[("in_pressure_raw", "250"), ("in_pressure_scale", "0.4")]);

        let mut hat = IioSenseHat::discover_at(tmp.path(), Path::new("/nonexistent"), None).unwrap();

        // (21000 + 1222) * 1.0 milli-degrees
        assert_eq!(hat.read_temperature().unwrap(), 22.222);
        // 250 * 0.4 kPa = 100 kPa = 1000 mbar
        assert_eq!(hat.read_pressure().unwrap(), 1000.0);
    }

    #[test]
    fn test_malformed_attribute() {
        let tmp = TempDir::new().unwrap();
        write_device(
            tmp.path(),
            "iio:device0",
            HTS221,
            &[
                ("in_humidityrelative_input", "not-a-number"),
                ("in_temp_input", "20000"),
            ],
        );
        write_device(tmp.path(), "iio:device1", LPS25H, &[("in_pressure_input", "100")]);

        let mut hat = IioSenseHat::discover_at(tmp.path(), Path::new("/nonexistent"), None).unwrap();
        assert!(matches!(
            hat.read_humidity(),
            Err(SensorError::Parse { .. })
        ));
    }

    #[test]
    fn test_framebuffer_discovery() {
        let tmp = TempDir::new().unwrap();
        fake_sense_hat(tmp.path());

        let graphics = TempDir::new().unwrap();
        let fb_dir = graphics.path().join("fb1");
        fs::create_dir_all(&fb_dir).unwrap();
        fs::write(fb_dir.join("name"), "RPi-Sense FB\n").unwrap();

        let hat = IioSenseHat::discover_at(tmp.path(), graphics.path(), None).unwrap();
        assert_eq!(hat.framebuffer, Some(PathBuf::from("/dev/fb1")));
    }

    #[test]
    fn test_reset_clears_led_matrix() {
        let tmp = TempDir::new().unwrap();
        let fb = tmp.path().join("fb1");
        fs::write(&fb, [0xFFu8; LED_MATRIX_BYTES]).unwrap();

        let mut hat = IioSenseHat::new(tmp.path().into(), tmp.path().into(), Some(fb.clone()));
        hat.reset().unwrap();

        let contents = fs::read(&fb).unwrap();
        assert_eq!(contents, vec![0u8; LED_MATRIX_BYTES]);
    }

    #[test]
    fn test_reset_without_framebuffer_is_noop() {
        let mut hat = IioSenseHat::new("/dev/null".into(), "/dev/null".into(), None);
        hat.reset().unwrap();
    }
}
