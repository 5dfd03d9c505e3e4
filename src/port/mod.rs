#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
use linux::{is_port_open, open_native};
#[cfg(target_os = "macos")]
use macos::{is_port_open, open_native};

pub use serialport::SerialPort;

use anyhow::Result;
use core::time::Duration;
use log::debug;
use serialport::{self, SerialPortType};
use thiserror::Error;

pub const DEFAULT_PORT: &str = "/dev/ttyTurboVac";
pub const DEFAULT_BAUDRATE: u32 = 19200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum OpenPortError {
    #[error("no compatible serial adapter found")]
    NoCompatiblePort,
    #[error("{port_name:?} busy")]
    PortBusy { port_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortConfig {
    /// Device path or `auto`
    pub name: String,
    pub baudrate: u32,
    /// Bound on every blocking read
    pub timeout: Duration,
    /// Skip the busy check
    pub force: bool,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PORT.to_string(),
            baudrate: DEFAULT_BAUDRATE,
            timeout: DEFAULT_TIMEOUT,
            force: false,
        }
    }
}

impl PortConfig {
    pub fn new(name: &str, baudrate: u32) -> Self {
        Self {
            name: name.to_string(),
            baudrate,
            ..Default::default()
        }
    }
}

#[derive(PartialEq)]
struct UsbId(u16, u16);

static COMPATIBLE_IDS: &[UsbId] = &[
    UsbId(0x0403, 0x6001), // FTDI FT232R USB UART
    UsbId(0x0403, 0x6014), // FTDI FT232H Single HS USB-UART/FIFO IC
    UsbId(0x067b, 0x2303), // Prolific PL2303 Serial Port
    UsbId(0x10c4, 0xea60), // Silicon Labs CP210x UART Bridge
    UsbId(0x1a86, 0x7523), // QinHeng Electronics HL-340 USB-Serial adapter
];

pub fn open_port(config: &PortConfig) -> Result<Box<dyn SerialPort>> {
    let true_name: String = if config.name == "auto" {
        guess_port()?
    } else {
        config.name.clone()
    };

    if !config.force && is_port_open(&true_name) {
        return Err(OpenPortError::PortBusy {
            port_name: true_name,
        }
        .into());
    }

    let port = open_native(&true_name, config)?;

    debug!("open_port OK: {} @ {} baud", &true_name, config.baudrate);
    Ok(port)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn is_port_open(_port_name: &str) -> bool {
    false
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn open_native(port_name: &str, config: &PortConfig) -> Result<Box<dyn SerialPort>> {
    Ok(serialport::new(port_name, config.baudrate)
        .timeout(config.timeout)
        .open()?)
}

/// Ports visible to the system, with a short description of each.
pub fn list_ports() -> Result<Vec<(String, String)>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|info| {
            let kind = match &info.port_type {
                SerialPortType::UsbPort(usb_info) => format!(
                    "usb {:04x}:{:04x}{}",
                    usb_info.vid,
                    usb_info.pid,
                    if COMPATIBLE_IDS.contains(&UsbId(usb_info.vid, usb_info.pid)) {
                        " (compatible)"
                    } else {
                        ""
                    }
                ),
                SerialPortType::PciPort => "pci".to_string(),
                SerialPortType::BluetoothPort => "bluetooth".to_string(),
                SerialPortType::Unknown => "unknown".to_string(),
            };
            (info.port_name, kind)
        })
        .collect())
}

fn guess_port() -> Result<String> {
    serialport::available_ports()?
        .into_iter()
        .filter(|info| match &info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                COMPATIBLE_IDS.contains(&UsbId(usb_info.vid, usb_info.pid))
                    && !is_port_open(&info.port_name)
            }
            SerialPortType::Unknown | SerialPortType::PciPort | SerialPortType::BluetoothPort => {
                false
            }
        })
        .map(|info| info.port_name)
        .next()
        .ok_or_else(|| OpenPortError::NoCompatiblePort.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_properties() {
        let config = PortConfig::default();
        assert_eq!(config.name, "/dev/ttyTurboVac");
        assert_eq!(config.baudrate, 19200);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert!(!config.force);
    }

    #[test]
    fn missing_device_fails() {
        let config = PortConfig::new("/dev/turbovac-does-not-exist", 19200);
        assert!(open_port(&config).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn busy_device_is_refused() {
        let path = std::env::temp_dir().join("turbovac-port-busy");
        let _held = std::fs::File::create(&path).unwrap();
        let path = std::fs::canonicalize(&path).unwrap();
        let name = path.to_str().unwrap();

        assert!(is_port_open(name));
        let err = open_port(&PortConfig::new(name, 19200)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OpenPortError>(),
            Some(OpenPortError::PortBusy { .. })
        ));
    }
}
