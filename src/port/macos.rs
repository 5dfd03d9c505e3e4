use super::PortConfig;
use anyhow::Result;
use serialport::SerialPort;

// TODO: scan open file descriptors with lsof-style libproc queries
pub fn is_port_open(_port_name: &str) -> bool {
    false
}

pub fn open_native(port_name: &str, config: &PortConfig) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(port_name, config.baudrate)
        .timeout(config.timeout)
        .open_native()?;

    Ok(Box::new(port))
}
