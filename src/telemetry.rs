use log::debug;
use num_traits::ToPrimitive;

use crate::controller::PARAM_FREQUENCY_SETPOINT;
use crate::protocol::{Link, Numeric, Protocol, ProtocolError};

/// Live values from one reply. Never cached: each read is a new exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    /// Rotor frequency, Hz
    pub frequency: u32,
    /// Value of the setpoint parameter, Hz
    pub frequency_setpoint: u32,
    /// Converter temperature, °C
    pub temperature: i32,
    /// Motor current, A
    pub current: f64,
    /// Intermediate circuit voltage, V
    pub voltage: u32,
}

/// Reads the setpoint parameter and takes every live value from that reply.
pub fn read_telemetry(
    protocol: &mut dyn Protocol,
    link: &mut dyn Link,
    pump_on: bool,
) -> Result<TelemetrySnapshot, ProtocolError> {
    let reply = protocol.read_parameter(link, PARAM_FREQUENCY_SETPOINT, 0, pump_on)?;

    let snapshot = TelemetrySnapshot {
        frequency: reply.frequency,
        frequency_setpoint: reply.parameter_value,
        temperature: reply.temperature,
        current: coerce_current(reply.current)?,
        voltage: reply.voltage,
    };
    debug!("telemetry {:?}", snapshot);
    Ok(snapshot)
}

/// Motor current must come out as a finite, non-negative amperage.
pub fn coerce_current(raw: Numeric) -> Result<f64, ProtocolError> {
    match raw.to_f64() {
        Some(amps) if amps.is_finite() && amps >= 0.0 => Ok(amps),
        _ => Err(ProtocolError::Coercion {
            field: "current",
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::{Call, RecordingLink, ScriptedProtocol};
    use crate::protocol::Reply;

    fn reply() -> Reply {
        Reply {
            parameter_value: 800,
            frequency: 640,
            temperature: 31,
            current: Numeric::Float(1.25),
            voltage: 24,
            flag_bits: 0,
        }
    }

    #[test]
    fn one_read_fills_snapshot() {
        let mut proto = ScriptedProtocol::default();
        proto.push(reply());
        let mut link = RecordingLink::default();

        let snapshot = read_telemetry(&mut proto, &mut link, true).unwrap();
        assert_eq!(
            snapshot,
            TelemetrySnapshot {
                frequency: 640,
                frequency_setpoint: 800,
                temperature: 31,
                current: 1.25,
                voltage: 24,
            }
        );
        assert_eq!(
            proto.calls(),
            vec![Call::Read {
                number: 24,
                pump_on: true
            }]
        );
    }

    #[test]
    fn current_coercion() {
        assert_eq!(coerce_current(Numeric::Uint(2)).unwrap(), 2.0);
        assert_eq!(coerce_current(Numeric::Sint(0)).unwrap(), 0.0);
        assert!(coerce_current(Numeric::Sint(-1)).is_err());
        assert!(coerce_current(Numeric::Float(f32::NAN)).is_err());
        assert!(coerce_current(Numeric::Float(f32::INFINITY)).is_err());

        let err = coerce_current(Numeric::Bin(3)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot interpret current value 0b0000000000000011"
        );
    }

    #[test]
    fn bad_current_fails_read() {
        let mut proto = ScriptedProtocol::default();
        proto.push(Reply {
            current: Numeric::Bin(1),
            ..reply()
        });
        let mut link = RecordingLink::default();

        assert!(matches!(
            read_telemetry(&mut proto, &mut link, false),
            Err(ProtocolError::Coercion { field: "current", .. })
        ));
    }

    #[test]
    fn timeout_propagates() {
        let mut proto = ScriptedProtocol::default();
        let mut link = RecordingLink::default();
        link.set_timeout(true);

        let err = read_telemetry(&mut proto, &mut link, false).unwrap_err();
        assert!(err.is_timeout());
    }
}
