//! CLI front-end for the RDT protocol testbed: resolves a scenario preset
//! or explicit flags into a validated [`Scenario`], runs the requested
//! protocol(s) for the requested number of runs, and prints one result row
//! per protocol.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use rdt_testbed::config::{Protocol, Scenario};
use rdt_testbed::driver::{run_transfer, RunResult};
use rdt_testbed::error::RunError;
use rdt_testbed::metrics::{aggregate, ScenarioSummary};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Comparative testbed for Go-Back-N, Selective Repeat, and TCP-like reliable data transfer over a simulated lossy channel"
)]
struct Args {
    /// Named scenario preset, or "custom" to build one from the flags below.
    #[arg(long, value_enum, default_value = "custom")]
    scenario: ScenarioName,

    #[arg(long)]
    loss: Option<f64>,
    #[arg(long)]
    rtt: Option<f64>,
    #[arg(long)]
    window: Option<u32>,
    #[arg(long = "bytes")]
    bytes: Option<usize>,
    #[arg(long)]
    mss: Option<usize>,
    #[arg(long)]
    jitter: Option<f64>,
    #[arg(long)]
    corrupt: Option<f64>,
    #[arg(long)]
    reorder: Option<f64>,

    /// Enables the optional AIMD congestion window for the TCP-like protocol.
    #[arg(long)]
    cwnd: bool,

    #[arg(long, default_value_t = 1)]
    runs: u32,

    #[arg(long, value_enum, default_value = "all")]
    protocol: ProtocolArg,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Also writes a results.csv under this directory.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ScenarioName {
    #[value(name = "A")]
    A,
    #[value(name = "B")]
    B,
    #[value(name = "C")]
    C,
    #[value(name = "D")]
    D,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ProtocolArg {
    Gbn,
    Sr,
    Tcp,
    All,
}

impl ProtocolArg {
    fn protocols(self) -> Vec<Protocol> {
        match self {
            ProtocolArg::Gbn => vec![Protocol::Gbn],
            ProtocolArg::Sr => vec![Protocol::Sr],
            ProtocolArg::Tcp => vec![Protocol::Tcp],
            ProtocolArg::All => vec![Protocol::Gbn, Protocol::Sr, Protocol::Tcp],
        }
    }
}

const DEFAULT_LOSS: f64 = 0.0;
const DEFAULT_RTT_MS: f64 = 50.0;
const DEFAULT_WINDOW: u32 = 4;
const DEFAULT_BYTES: usize = 20_000;
const DEFAULT_MSS: usize = 1024;
const DEFAULT_JITTER_MS: f64 = 0.0;
const DEFAULT_CORRUPT: f64 = 0.0;
const DEFAULT_REORDER: f64 = 0.0;

fn build_scenario(args: &Args, protocol: Protocol) -> Result<Scenario, rdt_testbed::error::ConfigError> {
    if args.scenario != ScenarioName::Custom {
        let name = match args.scenario {
            ScenarioName::A => "A",
            ScenarioName::B => "B",
            ScenarioName::C => "C",
            ScenarioName::D => "D",
            ScenarioName::Custom => unreachable!(),
        };
        let mut scenario = Scenario::preset(name, protocol, args.runs, args.seed)?;
        scenario.cwnd_enabled = args.cwnd;
        return Ok(scenario);
    }

    let scenario = Scenario {
        protocol,
        loss: args.loss.unwrap_or(DEFAULT_LOSS),
        rtt_ms: args.rtt.unwrap_or(DEFAULT_RTT_MS),
        jitter_ms: args.jitter.unwrap_or(DEFAULT_JITTER_MS),
        corrupt: args.corrupt.unwrap_or(DEFAULT_CORRUPT),
        reorder: args.reorder.unwrap_or(DEFAULT_REORDER),
        window: args.window.unwrap_or(DEFAULT_WINDOW),
        payload_bytes: args.bytes.unwrap_or(DEFAULT_BYTES),
        mss: args.mss.unwrap_or(DEFAULT_MSS),
        runs: args.runs,
        cwnd_enabled: args.cwnd,
        seed: args.seed,
        loss_schedule: None,
    };
    Ok(scenario)
}

fn run_scenario(scenario: &Scenario) -> ScenarioSummary {
    let payload: Vec<u8> = (0..scenario.payload_bytes).map(|i| (i % 256) as u8).collect();
    let outcomes: Vec<Result<RunResult, RunError>> = (0..scenario.runs as u64)
        .map(|run_index| {
            let outcome = run_transfer(scenario, &payload, run_index);
            if let Err(err) = &outcome {
                log::warn!("run {run_index} failed: {err}");
            }
            outcome
        })
        .collect();
    aggregate(scenario.protocol, &outcomes)
}

fn print_table(summaries: &[ScenarioSummary]) {
    println!(
        "{:<6} {:>14} {:>20} {:>16} {:>9} {:>9}",
        "proto", "mean_time_s", "mean_throughput_bps", "mean_retx", "runs_ok", "failed"
    );
    for s in summaries {
        println!(
            "{:<6} {:>14} {:>20} {:>16} {:>9} {:>9}",
            s.protocol.to_string(),
            s.mean_time_s.map(|v| format!("{v:.4}")).unwrap_or_else(|| "n/a".to_string()),
            s.mean_throughput_bps.map(|v| format!("{v:.1}")).unwrap_or_else(|| "n/a".to_string()),
            s.mean_retransmissions.map(|v| format!("{v:.2}")).unwrap_or_else(|| "n/a".to_string()),
            s.runs_ok,
            s.runs_failed,
        );
    }
}

fn write_csv(dir: &PathBuf, summaries: &[ScenarioSummary]) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut out = String::from("protocol,mean_time_s,mean_throughput_bps,mean_retransmissions,runs_ok,runs_failed\n");
    for s in summaries {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            s.protocol,
            s.mean_time_s.map(|v| v.to_string()).unwrap_or_default(),
            s.mean_throughput_bps.map(|v| v.to_string()).unwrap_or_default(),
            s.mean_retransmissions.map(|v| v.to_string()).unwrap_or_default(),
            s.runs_ok,
            s.runs_failed,
        ));
    }
    fs::write(dir.join("results.csv"), out)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut summaries = Vec::new();
    for protocol in args.protocol.protocols() {
        let scenario = match build_scenario(&args, protocol) {
            Ok(s) => s,
            Err(err) => {
                eprintln!("argument error: {err}");
                return ExitCode::from(2);
            }
        };
        if let Err(err) = scenario.validate() {
            eprintln!("argument error: {err}");
            return ExitCode::from(2);
        }
        summaries.push(run_scenario(&scenario));
    }

    print_table(&summaries);

    if let Some(dir) = &args.output {
        if let Err(err) = write_csv(dir, &summaries) {
            eprintln!("failed to write results to {}: {err}", dir.display());
            return ExitCode::from(1);
        }
    }

    let any_scenario_fully_failed = summaries.iter().any(|s| s.runs_ok == 0);
    if any_scenario_fully_failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
