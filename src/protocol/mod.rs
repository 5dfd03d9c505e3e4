#[cfg(test)]
pub(crate) mod mock;
pub mod sim;

use itertools::Itertools;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use std::fmt::Display;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Byte stream a protocol implementation talks over.
pub trait Link: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Link for T {}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("serial i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("serial link is not open")]
    NotConnected,
    #[error("malformed reply: {0}")]
    BadReply(String),
    #[error("parameter {number} rejected: {reason}")]
    Rejected { number: u16, reason: String },
    #[error("cannot interpret {field} value {value}")]
    Coercion { field: &'static str, value: String },
}

impl ProtocolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProtocolError::Io(e) if e.kind() == io::ErrorKind::TimedOut)
    }
}

/// Raw value of a reply field as the telegram layer decoded it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Uint(u32),
    Sint(i32),
    Float(f32),
    Bin(u16),
}

impl Display for Numeric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Numeric::Uint(v) => v.fmt(f),
            Numeric::Sint(v) => v.fmt(f),
            Numeric::Float(v) => v.fmt(f),
            Numeric::Bin(v) => write!(f, "0b{:016b}", v),
        }
    }
}

impl ToPrimitive for Numeric {
    fn to_i64(&self) -> Option<i64> {
        match *self {
            Numeric::Uint(v) => Some(v.into()),
            Numeric::Sint(v) => Some(v.into()),
            Numeric::Float(v) => v.to_i64(),
            Numeric::Bin(_) => None,
        }
    }

    fn to_u64(&self) -> Option<u64> {
        match *self {
            Numeric::Uint(v) => Some(v.into()),
            Numeric::Sint(v) => v.to_u64(),
            Numeric::Float(v) => v.to_u64(),
            Numeric::Bin(_) => None,
        }
    }

    fn to_f64(&self) -> Option<f64> {
        match *self {
            Numeric::Uint(v) => Some(v.into()),
            Numeric::Sint(v) => Some(v.into()),
            Numeric::Float(v) => Some(v.into()),
            Numeric::Bin(_) => None,
        }
    }
}

/// Decoded response telegram. Every reply carries the live process values
/// next to the addressed parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub parameter_value: u32,
    pub frequency: u32,
    pub temperature: i32,
    pub current: Numeric,
    pub voltage: u32,
    pub flag_bits: u16,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            parameter_value: 0,
            frequency: 0,
            temperature: 0,
            current: Numeric::Uint(0),
            voltage: 0,
            flag_bits: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum StatusBit {
    Ready = 0,
    OperationEnabled = 2,
    Error = 3,
    Accelerating = 4,
    Decelerating = 5,
    SwitchOnInhibit = 6,
    TemperatureWarning = 7,
    ParameterChannel = 9,
    SetpointReached = 10,
    Turning = 11,
    OverloadWarning = 13,
    CollectiveWarning = 14,
    ProcessChannel = 15,
}

impl StatusBit {
    pub fn mask(self) -> u16 {
        1 << (self as u8)
    }

    pub fn decode(bits: u16) -> Vec<StatusBit> {
        (0u8..16)
            .filter(|i| bits & (1 << i) != 0)
            .filter_map(StatusBit::from_u8)
            .collect()
    }

    pub fn encode(bits: &[StatusBit]) -> u16 {
        bits.iter().fold(0, |acc, bit| acc | bit.mask())
    }

    pub fn description(self) -> &'static str {
        match self {
            StatusBit::Ready => "Ready for operation",
            StatusBit::OperationEnabled => "Operation enabled",
            StatusBit::Error => "Error condition",
            StatusBit::Accelerating => "Accelerating",
            StatusBit::Decelerating => "Decelerating",
            StatusBit::SwitchOnInhibit => "Switch-on inhibit",
            StatusBit::TemperatureWarning => "Temperature warning",
            StatusBit::ParameterChannel => "Parameter channel enabled",
            StatusBit::SetpointReached => "Frequency setpoint reached",
            StatusBit::Turning => "Pump is turning",
            StatusBit::OverloadWarning => "Overload warning",
            StatusBit::CollectiveWarning => "Collective warning",
            StatusBit::ProcessChannel => "Process channel enabled",
        }
    }
}

impl Display for StatusBit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.description().fmt(f)
    }
}

/// Status bits decoded from one probe reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub raw: u16,
    pub bits: Vec<StatusBit>,
}

impl StatusReport {
    pub fn from_bits(raw: u16) -> Self {
        Self {
            raw,
            bits: StatusBit::decode(raw),
        }
    }

    pub fn contains(&self, bit: StatusBit) -> bool {
        self.bits.contains(&bit)
    }
}

impl Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.bits.is_empty() {
            "no status bits set".fmt(f)
        } else {
            self.bits.iter().join(", ").fmt(f)
        }
    }
}

/// Telegram layer of the pump. Implementations own framing and checksums;
/// callers only see decoded replies.
pub trait Protocol: Send {
    fn send_raw(&mut self, link: &mut dyn Link, telegram: &[u8]) -> Result<Reply, ProtocolError>;

    fn read_parameter(
        &mut self,
        link: &mut dyn Link,
        number: u16,
        index: u8,
        pump_on: bool,
    ) -> Result<Reply, ProtocolError>;

    fn write_parameter(
        &mut self,
        link: &mut dyn Link,
        number: u16,
        value: u32,
        index: u8,
        pump_on: bool,
    ) -> Result<Reply, ProtocolError>;

    fn status(&mut self, link: &mut dyn Link, pump_on: bool) -> Result<Reply, ProtocolError>;
}

impl<P: Protocol + ?Sized> Protocol for Box<P> {
    fn send_raw(&mut self, link: &mut dyn Link, telegram: &[u8]) -> Result<Reply, ProtocolError> {
        (**self).send_raw(link, telegram)
    }

    fn read_parameter(
        &mut self,
        link: &mut dyn Link,
        number: u16,
        index: u8,
        pump_on: bool,
    ) -> Result<Reply, ProtocolError> {
        (**self).read_parameter(link, number, index, pump_on)
    }

    fn write_parameter(
        &mut self,
        link: &mut dyn Link,
        number: u16,
        value: u32,
        index: u8,
        pump_on: bool,
    ) -> Result<Reply, ProtocolError> {
        (**self).write_parameter(link, number, value, index, pump_on)
    }

    fn status(&mut self, link: &mut dyn Link, pump_on: bool) -> Result<Reply, ProtocolError> {
        (**self).status(link, pump_on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_status_bits() {
        let bits = StatusBit::decode(0b1000_1010_0000_0101);
        assert_eq!(
            bits,
            vec![
                StatusBit::Ready,
                StatusBit::OperationEnabled,
                StatusBit::ParameterChannel,
                StatusBit::Turning,
                StatusBit::ProcessChannel
            ]
        );
    }

    #[test]
    fn decode_skips_reserved_bits() {
        assert!(StatusBit::decode(1 << 1 | 1 << 8 | 1 << 12).is_empty());
    }

    #[test]
    fn encode_status_bits() {
        let raw = StatusBit::encode(&[StatusBit::Error, StatusBit::Turning]);
        assert_eq!(raw, 0x0808);
        assert_eq!(StatusBit::decode(raw), vec![StatusBit::Error, StatusBit::Turning]);
    }

    #[test]
    fn report_text() {
        let report = StatusReport::from_bits(StatusBit::encode(&[
            StatusBit::Ready,
            StatusBit::Accelerating,
        ]));
        assert_eq!(report.to_string(), "Ready for operation, Accelerating");
        assert_eq!(StatusReport::from_bits(0).to_string(), "no status bits set");
    }

    #[test]
    fn numeric_to_f64() {
        assert_eq!(Numeric::Uint(3).to_f64(), Some(3.0));
        assert_eq!(Numeric::Sint(-2).to_f64(), Some(-2.0));
        assert_eq!(Numeric::Float(1.5).to_f64(), Some(1.5));
        assert_eq!(Numeric::Bin(0x0f).to_f64(), None);
    }

    #[test]
    fn timeout_detection() {
        let err: ProtocolError = io::Error::new(io::ErrorKind::TimedOut, "no reply").into();
        assert!(err.is_timeout());
        assert!(!ProtocolError::NotConnected.is_timeout());
    }
}
