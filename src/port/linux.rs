use super::PortConfig;

use anyhow::Result;
use glob::glob;
use serialport::SerialPort;
use std::fs;

pub fn open_native(port_name: &str, config: &PortConfig) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(port_name, config.baudrate)
        .timeout(config.timeout)
        .open_native()?;

    Ok(Box::new(port))
}

pub fn is_port_open(port_name: &str) -> bool {
    let paths = match glob("/proc/[0-9]*/fd/*") {
        Ok(paths) => paths,
        Err(_) => return false,
    };

    paths
        .filter_map(|p| p.ok())
        .filter_map(|path| fs::read_link(path).ok())
        .any(|link| link.to_str() == Some(port_name))
}
