use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ferrite_core::Cycle;
use ferrite_core::mem::{ChannelStats, MemorySystem, RejectReason, Transaction};
use log::error;

mod trace;

use trace::TraceReader;

/// Cycle-accurate DRAM memory-system simulator.
///
/// Replays a transaction trace against a configured memory system and
/// writes the issued command stream to <PREFIX>.trc and aggregate
/// statistics to <PREFIX>.csv.
#[derive(Parser)]
#[command(name = "ferrite", version)]
struct Args {
    /// Trace file to run.
    #[arg(short = 't', long = "trace")]
    trace: PathBuf,

    /// Device configurations, one per channel; the last one is broadcast
    /// to any remaining channels.
    #[arg(short = 'd', long = "device", value_delimiter = ',', required = true)]
    device: Vec<PathBuf>,

    /// Controller configuration.
    #[arg(short = 'c', long = "ctrl", default_value = "ctrl/system.ctrl")]
    ctrl: PathBuf,

    /// File name prefix for all outputs.
    #[arg(short = 'o', long = "output", default_value = "test")]
    output: String,

    /// Total memory capacity in MB, or one capacity per channel.
    #[arg(short = 's', long = "size", value_delimiter = ',', default_value = "1024")]
    size: Vec<u64>,

    /// Enable per-command logging.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(&args) {
        Ok(cycles) => {
            println!();
            println!("-------------------------------------------------------");
            println!("   Simulation Complete");
            println!("   Cycles Elapsed: {cycles}");
            println!("-------------------------------------------------------");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<Cycle, Box<dyn std::error::Error>> {
    let mut system = MemorySystem::new(&args.ctrl, &args.device, &args.size)?;

    let mut reader = TraceReader::open(&args.trace, system.freq())
        .map_err(|err| format!("could not open trace file <{}>: {err}", args.trace.display()))?;

    let trc_path = format!("{}.trc", args.output);
    let mut trc = BufWriter::new(File::create(&trc_path)?);

    // Replay: hold at most one pending transaction, admit it once its
    // arrival cycle comes (retrying while the target queue is full), and
    // step the system until everything drains.
    let mut pending: Option<(Cycle, Transaction)> = None;
    let mut cycle: Cycle = 0;
    loop {
        if pending.is_none() {
            pending = reader.next_tx();
        }
        if let Some((arrival, tx)) = pending.take() {
            if cycle >= arrival {
                if let Err(rejected) = system.add_tx(tx) {
                    match rejected.reason {
                        RejectReason::QueueFull => pending = Some((arrival, rejected.tx)),
                        // Already logged; there is no point retrying.
                        RejectReason::TooLong => {}
                    }
                }
            } else {
                pending = Some((arrival, tx));
            }
        }

        if reader.done() && pending.is_none() && !system.busy() {
            break;
        }

        for record in system.step() {
            writeln!(trc, "{record}")?;
        }
        cycle += 1;
    }
    trc.flush()?;

    let csv_path = format!("{}.csv", args.output);
    let mut csv = BufWriter::new(File::create(&csv_path)?);
    writeln!(csv, "{}", ChannelStats::CSV_HEADER)?;
    for chan in system.channels() {
        writeln!(csv, "{}", chan.stats().csv_row(chan.id()))?;
    }
    csv.flush()?;

    Ok(system.cycle())
}
