//! Control and telemetry for a TURBOVAC turbomolecular pump on a serial link.

pub mod controller;
pub mod errors;
pub mod port;
pub mod protocol;
pub mod state;
pub mod telemetry;

pub use controller::{ControllerError, Diagnostic, LastError, PumpController};
pub use errors::{ErrorRecord, ErrorTable, ErrorTableError};
pub use protocol::{Link, Protocol, ProtocolError, Reply, StatusReport};
pub use state::PumpState;
pub use telemetry::TelemetrySnapshot;
