#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::Parser;
use schedule_gate_os::config::GateConfig;
use schedule_gate_os::gate::ScheduleGate;
use schedule_gate_tools::gate_cli::{execute_gate_command, GateCommand};
use tracing_subscriber::EnvFilter;

/// Inspect and drive the delayed schedule gate.
#[derive(Debug, Parser)]
#[command(name = "schedule-gate", version)]
struct Cli {
    /// Pending slot file; defaults to SCHEDULE_GATE_PENDING_PATH or the XDG state dir.
    #[arg(long, global = true)]
    pending_path: Option<PathBuf>,

    /// tracing filter directive, e.g. `info` or `schedule_gate_os=debug`.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: GateCommand,
}

fn main() {
    let cli = Cli::parse();
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = match &cli.pending_path {
        Some(path) => GateConfig::for_path(path),
        None => GateConfig::default_local(),
    };
    let gate = ScheduleGate::open_local(&config);
    let output = execute_gate_command(&gate, &cli.command)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
