use anyhow::Result;
use clap::{Parser, Subcommand};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use turbovac::port::DEFAULT_BAUDRATE;
use turbovac::protocol::sim::DEFAULT_RAMP;

#[derive(Error, Debug)]
pub enum StepError {
    #[error("invalid step '{0}'")]
    BadStep(String),
    #[error("invalid fault '{0}', expected CODE@HOUR")]
    BadFault(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Start,
    Stop,
    Telemetry,
    Frequency,
    Setpoint,
    SetSetpoint(u32),
    Temperature,
    Current,
    Voltage,
    Status,
    LastError,
    State,
}

impl FromStr for Step {
    type Err = StepError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^([a-z-]+)(?:=(\S+))?$").unwrap();
        }

        let bad = || StepError::BadStep(input.to_string());
        let c = RE.captures(input).ok_or_else(bad)?;
        let name = c.get(1).map_or("", |m| m.as_str());

        match (name, c.get(2)) {
            ("setpoint", Some(value)) => parse_with_radix::<u32>(value.as_str())
                .map(Step::SetSetpoint)
                .map_err(|_| bad()),
            (_, Some(_)) => Err(bad()),
            ("start", None) => Ok(Step::Start),
            ("stop", None) => Ok(Step::Stop),
            ("telemetry", None) => Ok(Step::Telemetry),
            ("frequency", None) => Ok(Step::Frequency),
            ("setpoint", None) => Ok(Step::Setpoint),
            ("temperature", None) => Ok(Step::Temperature),
            ("current", None) => Ok(Step::Current),
            ("voltage", None) => Ok(Step::Voltage),
            ("status", None) => Ok(Step::Status),
            ("last-error", None) => Ok(Step::LastError),
            ("state", None) => Ok(Step::State),
            _ => Err(bad()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub code: u32,
    pub hour: u32,
}

impl FromStr for Fault {
    type Err = StepError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^(\d+)@(\d+)$").unwrap();
        }

        let bad = || StepError::BadFault(input.to_string());
        let c = RE.captures(input).ok_or_else(bad)?;
        let field = |i: usize| {
            c.get(i)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .ok_or_else(bad)
        };

        Ok(Fault {
            code: field(1)?,
            hour: field(2)?,
        })
    }
}

fn parse_with_radix<T>(input: &str) -> Result<T, T::FromStrRadixErr>
where
    T: num::Num,
    <T as num::Num>::FromStrRadixErr: std::error::Error + Send + Sync,
{
    if input.starts_with("0x") {
        T::from_str_radix(input.trim_start_matches("0x"), 16)
    } else if input.starts_with("0b") {
        T::from_str_radix(input.trim_start_matches("0b"), 2)
    } else {
        T::from_str_radix(input, 10)
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// enable debug output
    #[clap(long, short)]
    pub debug: bool,

    /// Use json-formatted output
    #[clap(long, short)]
    pub json: bool,

    /// Error code table, one "CODE description" per line
    #[clap(long, short, parse(from_os_str))]
    pub error_table: Option<PathBuf>,

    /// Simulated rotor ramp per exchange, Hz
    #[clap(long, default_value_t = DEFAULT_RAMP, parse(try_from_str=parse_with_radix))]
    pub ramp: u32,

    /// Preload the simulated error log (CODE@HOUR)
    #[clap(long)]
    pub fault: Option<Fault>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List known error codes
    ListErrors,

    /// List serial ports
    ListPorts,

    /// Run steps against the simulated pump
    Run {
        /// Hold this serial port open for the session ("auto" picks the
        /// first free compatible adapter)
        #[clap(long, short)]
        port: Option<String>,

        /// Port baudrate
        #[clap(long, short, default_value_t = DEFAULT_BAUDRATE, parse(try_from_str=parse_with_radix))]
        baudrate: u32,

        /// Open the port even if another process holds it
        #[clap(long, short)]
        force: bool,

        /// start, stop, telemetry, frequency, setpoint[=HZ], temperature,
        /// current, voltage, status, last-error, state
        #[clap(required = true)]
        steps: Vec<Step>,
    },
}
