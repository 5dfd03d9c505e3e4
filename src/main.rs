mod cli;

use std::{fmt::Display, io, process, sync::Arc};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, shells::Bash};
use json::JsonValue;
use log::{debug, error};

use turbovac::port::{self, PortConfig};
use turbovac::protocol::sim::SimulatedPump;
use turbovac::{ErrorTable, LastError, PumpController, StatusReport, TelemetrySnapshot};

use cli::{Cli, Commands, Step};

enum OutputFormat {
    Plain,
    Json,
}

fn render(fmt: &OutputFormat, plain: String, value: JsonValue) -> String {
    match fmt {
        OutputFormat::Plain => plain,
        OutputFormat::Json => json::stringify(value),
    }
}

fn telemetry_output(t: &TelemetrySnapshot) -> (String, JsonValue) {
    let mut obj = JsonValue::new_object();
    obj["frequency"] = t.frequency.into();
    obj["frequency_setpoint"] = t.frequency_setpoint.into();
    obj["temperature"] = t.temperature.into();
    obj["current"] = t.current.into();
    obj["voltage"] = t.voltage.into();

    let plain = format!(
        "frequency {} Hz, setpoint {} Hz, temperature {} C, current {:.2} A, voltage {} V",
        t.frequency, t.frequency_setpoint, t.temperature, t.current, t.voltage
    );
    (plain, obj)
}

fn status_output(report: &StatusReport) -> (String, JsonValue) {
    let mut obj = JsonValue::new_object();
    obj["raw"] = report.raw.into();
    obj["bits"] = JsonValue::Array(
        report
            .bits
            .iter()
            .map(|bit| bit.description().into())
            .collect(),
    );
    (report.to_string(), obj)
}

fn last_error_output(last: &LastError) -> (String, JsonValue) {
    match last {
        LastError::None => (last.to_string(), JsonValue::Null),
        LastError::Recorded(diagnostic) => {
            let mut obj = JsonValue::new_object();
            obj["code"] = diagnostic.code.into();
            obj["description"] = diagnostic.description.clone().into();
            obj["operating_hour"] = diagnostic.operating_hour.into();
            (last.to_string(), obj)
        }
    }
}

fn scalar<T: Display + Into<JsonValue>>(value: T, unit: &str) -> (String, JsonValue) {
    (format!("{} {}", value, unit), value.into())
}

fn cmd_list_errors(table: &ErrorTable, fmt: OutputFormat) -> Result<String> {
    let mut obj = JsonValue::new_object();
    for record in table.records() {
        obj[record.code.to_string().as_str()] = record.description.clone().into();
    }

    Ok(render(
        &fmt,
        table
            .records()
            .iter()
            .map(|record| record.to_string())
            .collect::<Vec<String>>()
            .join("\n"),
        obj,
    ))
}

fn cmd_list_ports(fmt: OutputFormat) -> Result<String> {
    let ports = port::list_ports()?;

    let mut obj = JsonValue::new_object();
    for (name, kind) in &ports {
        obj[name.as_str()] = kind.as_str().into();
    }

    Ok(render(
        &fmt,
        ports
            .iter()
            .map(|(name, kind)| format!("{} {}", name, kind))
            .collect::<Vec<String>>()
            .join("\n"),
        obj,
    ))
}

fn run_step(
    controller: &PumpController<SimulatedPump>,
    step: Step,
    fmt: &OutputFormat,
) -> Result<String> {
    debug!("step {:?}", step);
    let (plain, value) = match step {
        Step::Start => {
            controller.start()?;
            let status = controller.status_text();
            (status.clone(), status.into())
        }
        Step::Stop => {
            controller.stop()?;
            let status = controller.status_text();
            (status.clone(), status.into())
        }
        Step::Telemetry => telemetry_output(&controller.read_telemetry()?),
        Step::Frequency => scalar(controller.frequency()?, "Hz"),
        Step::Setpoint => scalar(controller.read_frequency_setpoint()?, "Hz"),
        Step::SetSetpoint(hz) => scalar(controller.set_frequency_setpoint(hz)?, "Hz"),
        Step::Temperature => scalar(controller.temperature()?, "C"),
        Step::Current => scalar(controller.current()?, "A"),
        Step::Voltage => scalar(controller.voltage()?, "V"),
        Step::Status => status_output(&controller.get_status_flags()?),
        Step::LastError => last_error_output(&controller.get_last_error()?),
        Step::State => {
            let state = controller.state().to_string();
            (state.clone(), state.into())
        }
    };

    Ok(render(fmt, plain, value))
}

fn cmd_run(
    cli: &Cli,
    table: ErrorTable,
    steps: &[Step],
    port: Option<PortConfig>,
    fmt: OutputFormat,
) -> Result<String> {
    let mut pump = SimulatedPump::new().with_ramp(cli.ramp);
    if let Some(fault) = cli.fault {
        pump = pump.with_fault(fault.code, fault.hour);
    }

    let controller = PumpController::new(pump, Arc::new(table));
    match port {
        Some(config) => controller.open(&config)?,
        None => controller.attach(Box::new(io::Cursor::new(Vec::new())), "sim")?,
    }

    for &step in steps {
        let line = run_step(&controller, step, &fmt)
            .with_context(|| format!("Step {:?} failed", step))?;
        println!("{}", line);
    }

    controller.close();
    Ok(String::new())
}

fn do_main() -> Result<String> {
    if std::env::var("GENERATE_COMPLETION").is_ok() {
        generate(
            Bash,
            &mut cli::Cli::command(),
            "turbovac-tool",
            &mut io::stdout(),
        );

        return Ok(String::default());
    }

    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.debug {
        "debug"
    } else {
        "info"
    }))
    .format_timestamp(None)
    .format_target(false)
    .init();

    let fmt = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };

    let table = match &cli.error_table {
        Some(path) => ErrorTable::load(path)?,
        None => ErrorTable::bundled().context("Bundled error table is corrupt")?,
    };

    match &cli.command {
        Commands::ListErrors => cmd_list_errors(&table, fmt),
        Commands::ListPorts => cmd_list_ports(fmt),
        Commands::Run {
            steps,
            port,
            baudrate,
            force,
        } => {
            let port = port.as_ref().map(|name| PortConfig {
                force: *force,
                ..PortConfig::new(name, *baudrate)
            });
            cmd_run(&cli, table, steps, port, fmt)
        }
    }
}

fn main() {
    match do_main() {
        Ok(s) if s.is_empty() => {}
        Ok(s) => println!("{}", s),
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}
