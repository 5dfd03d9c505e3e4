//! In-process pump model. Stands in for the telegram layer and the pump
//! electronics behind it; the link is never touched.

use log::debug;

use super::{Link, Numeric, Protocol, ProtocolError, Reply, StatusBit};
use crate::controller::{PARAM_ERROR_CODE, PARAM_ERROR_HOUR, PARAM_FREQUENCY_SETPOINT};

pub const MAX_FREQUENCY: u32 = 1500;
pub const DEFAULT_SETPOINT: u32 = 1200;
pub const DEFAULT_RAMP: u32 = 200;

const AMBIENT_TEMPERATURE: i32 = 25;
const SUPPLY_VOLTAGE: u32 = 24;

#[derive(Debug, Clone)]
pub struct SimulatedPump {
    setpoint: u32,
    frequency: u32,
    motor_on: bool,
    ramp: u32,
    error_code: u32,
    error_hour: u32,
}

impl Default for SimulatedPump {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPump {
    pub fn new() -> Self {
        Self {
            setpoint: DEFAULT_SETPOINT,
            frequency: 0,
            motor_on: false,
            ramp: DEFAULT_RAMP,
            error_code: 0,
            error_hour: 0,
        }
    }

    pub fn with_ramp(mut self, ramp: u32) -> Self {
        self.ramp = ramp.max(1);
        self
    }

    pub fn with_fault(mut self, code: u32, hour: u32) -> Self {
        self.error_code = code;
        self.error_hour = hour;
        self
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn motor_on(&self) -> bool {
        self.motor_on
    }

    fn target(&self) -> u32 {
        if self.motor_on {
            self.setpoint
        } else {
            0
        }
    }

    fn advance(&mut self, pump_on: bool) {
        self.motor_on = pump_on;
        let target = self.target();
        self.frequency = if self.frequency < target {
            self.frequency.saturating_add(self.ramp).min(target)
        } else {
            self.frequency.saturating_sub(self.ramp).max(target)
        };
    }

    fn flag_bits(&self) -> u16 {
        let mut bits = vec![StatusBit::ParameterChannel, StatusBit::ProcessChannel];
        if self.error_code == 0 {
            bits.push(StatusBit::Ready);
        } else {
            bits.push(StatusBit::Error);
        }
        if self.motor_on {
            bits.push(StatusBit::OperationEnabled);
        }
        if self.frequency > 0 {
            bits.push(StatusBit::Turning);
        }
        let target = self.target();
        if self.frequency < target {
            bits.push(StatusBit::Accelerating);
        } else if self.frequency > target {
            bits.push(StatusBit::Decelerating);
        } else if self.motor_on {
            bits.push(StatusBit::SetpointReached);
        }
        StatusBit::encode(&bits)
    }

    fn current(&self) -> f32 {
        if self.frequency < self.target() {
            2.5
        } else if self.motor_on && self.frequency > 0 {
            0.6
        } else {
            0.0
        }
    }

    fn reply(&self, parameter_value: u32) -> Reply {
        let reply = Reply {
            parameter_value,
            frequency: self.frequency,
            temperature: AMBIENT_TEMPERATURE + (self.frequency / 100) as i32,
            current: Numeric::Float(self.current()),
            voltage: SUPPLY_VOLTAGE,
            flag_bits: self.flag_bits(),
        };
        debug!("sim reply {:?}", reply);
        reply
    }

    fn parameter(&self, number: u16) -> Result<u32, ProtocolError> {
        match number {
            PARAM_FREQUENCY_SETPOINT => Ok(self.setpoint),
            PARAM_ERROR_CODE => Ok(self.error_code),
            PARAM_ERROR_HOUR => Ok(self.error_hour),
            _ => Err(ProtocolError::Rejected {
                number,
                reason: "unknown parameter".to_string(),
            }),
        }
    }
}

impl Protocol for SimulatedPump {
    fn send_raw(&mut self, _link: &mut dyn Link, telegram: &[u8]) -> Result<Reply, ProtocolError> {
        if telegram.first() != Some(&0x02) {
            return Err(ProtocolError::BadReply(format!(
                "telegram does not start with STX: {:02X?}",
                telegram
            )));
        }
        Ok(self.reply(0))
    }

    fn read_parameter(
        &mut self,
        _link: &mut dyn Link,
        number: u16,
        _index: u8,
        pump_on: bool,
    ) -> Result<Reply, ProtocolError> {
        self.advance(pump_on);
        let value = self.parameter(number)?;
        Ok(self.reply(value))
    }

    fn write_parameter(
        &mut self,
        _link: &mut dyn Link,
        number: u16,
        value: u32,
        _index: u8,
        pump_on: bool,
    ) -> Result<Reply, ProtocolError> {
        self.advance(pump_on);
        match number {
            PARAM_FREQUENCY_SETPOINT if value <= MAX_FREQUENCY => {
                self.setpoint = value;
                Ok(self.reply(value))
            }
            PARAM_FREQUENCY_SETPOINT => Err(ProtocolError::Rejected {
                number,
                reason: format!("{} Hz exceeds maximum of {} Hz", value, MAX_FREQUENCY),
            }),
            PARAM_ERROR_CODE | PARAM_ERROR_HOUR => Err(ProtocolError::Rejected {
                number,
                reason: "parameter is read-only".to_string(),
            }),
            _ => Err(ProtocolError::Rejected {
                number,
                reason: "unknown parameter".to_string(),
            }),
        }
    }

    fn status(&mut self, _link: &mut dyn Link, pump_on: bool) -> Result<Reply, ProtocolError> {
        self.advance(pump_on);
        Ok(self.reply(0))
    }
}
