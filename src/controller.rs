//! Command dispatcher for one pump on one serial link.
//!
//! Every request carries the `pump_on` flag of the current [`PumpState`]; the
//! flag is read from the tracker at the moment of the exchange and the state
//! only changes after the pump acknowledged the request. One lock covers the
//! link, the protocol and the tracker, so operations from several threads
//! never interleave on the wire.

use std::{
    fmt::Display,
    io::Write,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::errors::ErrorTable;
use crate::port::{self, PortConfig};
use crate::protocol::{Link, Protocol, ProtocolError, StatusReport};
use crate::state::{PumpState, StateTracker};
use crate::telemetry::{self, TelemetrySnapshot};

pub const PARAM_FREQUENCY_SETPOINT: u16 = 24;
pub const PARAM_ERROR_CODE: u16 = 171;
pub const PARAM_ERROR_HOUR: u16 = 176;

/// Error code the converter reports when its error log is empty.
pub const NO_ERROR: u32 = 0;

/// Status request telegram with every control bit cleared.
pub const STATUS_PROBE: [u8; 24] = [
    0x02, 0x16, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x14,
];

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("cannot connect on port {port}: {reason}")]
    Connection { port: String, reason: String },
    #[error("cannot open the link while the controller is {0}")]
    InvalidState(PumpState),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: u32,
    pub description: String,
    pub operating_hour: u32,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Last error was Nr. {} ({}). It occurred at operating hour {}.",
            self.code, self.description, self.operating_hour
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastError {
    None,
    Recorded(Diagnostic),
}

impl Display for LastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LastError::None => "No error recorded.".fmt(f),
            LastError::Recorded(diagnostic) => diagnostic.fmt(f),
        }
    }
}

struct Session<P> {
    protocol: P,
    link: Option<Box<dyn Link>>,
    tracker: StateTracker,
    status: String,
    closed: bool,
}

impl<P: Protocol> Session<P> {
    fn exchange<T>(
        &mut self,
        request: impl FnOnce(&mut P, &mut dyn Link, bool) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        let pump_on = self.tracker.pump_on();
        let link = self.link.as_deref_mut().ok_or(ProtocolError::NotConnected)?;
        request(&mut self.protocol, link, pump_on)
    }

    fn transition(&mut self, state: PumpState, status: String) {
        info!("{} -> {}: {}", self.tracker.current(), state, status);
        self.tracker.set(state);
        self.status = status;
    }

    fn check_openable(&self) -> Result<(), ControllerError> {
        match self.tracker.current() {
            PumpState::Initializing if self.closed => {
                debug!("controller was closed, refusing to reopen");
                Err(ControllerError::InvalidState(PumpState::Initializing))
            }
            PumpState::Initializing | PumpState::Disconnected => Ok(()),
            other => Err(ControllerError::InvalidState(other)),
        }
    }
}

pub struct PumpController<P> {
    session: Mutex<Session<P>>,
    errors: Arc<ErrorTable>,
}

impl<P: Protocol> PumpController<P> {
    pub fn new(protocol: P, errors: Arc<ErrorTable>) -> Self {
        Self {
            session: Mutex::new(Session {
                protocol,
                link: None,
                tracker: StateTracker::new(),
                status: "Initializing...".to_string(),
                closed: false,
            }),
            errors,
        }
    }

    fn session(&self) -> MutexGuard<'_, Session<P>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PumpState {
        self.session().tracker.current()
    }

    pub fn pump_on(&self) -> bool {
        self.session().tracker.pump_on()
    }

    /// Human readable status of the last transition or query.
    pub fn status_text(&self) -> String {
        self.session().status.clone()
    }

    pub fn error_table(&self) -> &ErrorTable {
        &self.errors
    }

    /// Opens the serial port. On failure the controller is left
    /// `Disconnected` and may retry.
    pub fn open(&self, config: &PortConfig) -> Result<(), ControllerError> {
        self.open_with(config, |config| {
            Ok(Box::new(port::open_port(config)?) as Box<dyn Link>)
        })
    }

    /// Same as [`open`](Self::open) with the transport opened by `opener`.
    pub fn open_with<F>(&self, config: &PortConfig, opener: F) -> Result<(), ControllerError>
    where
        F: FnOnce(&PortConfig) -> anyhow::Result<Box<dyn Link>>,
    {
        let mut session = self.session();
        session.check_openable()?;

        match opener(config) {
            Ok(link) => {
                session.link = Some(link);
                session.transition(
                    PumpState::Stopped,
                    format!("TurboVac pump is initialised on port {}.", config.name),
                );
                Ok(())
            }
            Err(e) => {
                session.transition(
                    PumpState::Disconnected,
                    format!("Cannot connect on port {}.", config.name),
                );
                Err(ControllerError::Connection {
                    port: config.name.clone(),
                    reason: format!("{:#}", e),
                })
            }
        }
    }

    /// Takes over an already open link.
    pub fn attach(&self, link: Box<dyn Link>, name: &str) -> Result<(), ControllerError> {
        let mut session = self.session();
        session.check_openable()?;

        session.link = Some(link);
        session.transition(
            PumpState::Stopped,
            format!("TurboVac pump is initialised on port {}.", name),
        );
        Ok(())
    }

    pub fn start(&self) -> Result<(), ControllerError> {
        let mut session = self.session();
        session.exchange(|proto, link, _| proto.status(link, true))?;
        session.transition(PumpState::Running, "Pump is running.".to_string());
        Ok(())
    }

    pub fn stop(&self) -> Result<(), ControllerError> {
        let mut session = self.session();
        session.exchange(|proto, link, _| proto.status(link, false))?;
        session.transition(
            PumpState::Stopped,
            "Pump is stopping or already stopped.".to_string(),
        );
        Ok(())
    }

    /// Writes the setpoint and returns the value the pump acknowledged.
    pub fn set_frequency_setpoint(&self, hz: u32) -> Result<u32, ControllerError> {
        let reply = self.session().exchange(|proto, link, pump_on| {
            proto.write_parameter(link, PARAM_FREQUENCY_SETPOINT, hz, 0, pump_on)
        })?;
        debug!("setpoint {} Hz acknowledged as {}", hz, reply.parameter_value);
        Ok(reply.parameter_value)
    }

    pub fn read_telemetry(&self) -> Result<TelemetrySnapshot, ControllerError> {
        Ok(self
            .session()
            .exchange(|proto, link, pump_on| telemetry::read_telemetry(proto, link, pump_on))?)
    }

    pub fn read_frequency_setpoint(&self) -> Result<u32, ControllerError> {
        Ok(self.read_telemetry()?.frequency_setpoint)
    }

    pub fn frequency(&self) -> Result<u32, ControllerError> {
        Ok(self.read_telemetry()?.frequency)
    }

    pub fn temperature(&self) -> Result<i32, ControllerError> {
        Ok(self.read_telemetry()?.temperature)
    }

    pub fn current(&self) -> Result<f64, ControllerError> {
        let current = self.read_telemetry()?.current;
        debug!("current {} A", current);
        Ok(current)
    }

    pub fn voltage(&self) -> Result<u32, ControllerError> {
        Ok(self.read_telemetry()?.voltage)
    }

    /// Sends the fixed [`STATUS_PROBE`] telegram in every state.
    pub fn get_status_flags(&self) -> Result<StatusReport, ControllerError> {
        let mut session = self.session();
        let reply = session.exchange(|proto, link, _| proto.send_raw(link, &STATUS_PROBE))?;

        let report = StatusReport::from_bits(reply.flag_bits);
        session.status = report.to_string();
        Ok(report)
    }

    pub fn get_last_error(&self) -> Result<LastError, ControllerError> {
        let mut session = self.session();
        let code = session
            .exchange(|proto, link, pump_on| {
                proto.read_parameter(link, PARAM_ERROR_CODE, 0, pump_on)
            })?
            .parameter_value;
        let operating_hour = session
            .exchange(|proto, link, pump_on| {
                proto.read_parameter(link, PARAM_ERROR_HOUR, 0, pump_on)
            })?
            .parameter_value;

        if code == NO_ERROR {
            return Ok(LastError::None);
        }

        let diagnostic = Diagnostic {
            code,
            description: self.errors.describe(code),
            operating_hour,
        };
        session.status = diagnostic.to_string();
        Ok(LastError::Recorded(diagnostic))
    }

    /// Drops the link. Failures are logged, never returned. A closed
    /// controller cannot be opened again.
    pub fn close(&self) {
        let mut session = self.session();
        if let Some(mut link) = session.link.take() {
            if let Err(e) = link.flush() {
                warn!("flush before close failed: {}", e);
            }
        }
        session.closed = true;
        session.transition(PumpState::Initializing, "close serial".to_string());
    }
}
