use std::cell::RefCell;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use hash_track::sim::{HostProfile, SimulatedHost};
use hash_track::{fragment_of, Detector};
use hash_track_config::{Config, LoadOptions};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub mod script;

use script::{parse_script, Step};

/// Log filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "warn,hash_track=info";

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<i32> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Fragment(args) => handle_fragment(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn handle_fragment(args: FragmentArgs) -> Result<i32> {
    emit(&format!("{}\n", fragment_of(&args.address)))?;
    Ok(0)
}

fn handle_simulate(args: SimulateArgs) -> Result<i32> {
    let SimulateArgs {
        profile,
        start,
        config,
        format,
        script,
    } = args;

    let options = match config {
        Some(path) => LoadOptions::default().with_override_path(path),
        None => LoadOptions::default(),
    };
    let config = Config::load(options)?;

    let source = read_script(&script)
        .with_context(|| format!("Unable to read script: {}", script.display()))?;
    let steps = parse_script(&source)?;

    let host = SimulatedHost::new(profile.into_profile(), start);
    let detector = Detector::new(host.clone(), config.detector_settings());
    let records = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&records);
    let clock = Rc::downgrade(&host);
    detector.initialize(move |fragment, initial| {
        let at = clock.upgrade().map(|host| host.now()).unwrap_or_default();
        let kind = if initial {
            RecordKind::Initial
        } else {
            RecordKind::Change
        };
        sink.borrow_mut().push(Record {
            kind,
            fragment: fragment.to_owned(),
            at,
        });
    });
    debug!(strategy = ?detector.strategy(), "simulation started");

    for step in steps {
        match step {
            Step::Go(fragment) => detector.navigate_to(&fragment),
            Step::External(fragment) => host.navigate_externally(&fragment),
            Step::Tick(duration) => host.advance(duration),
            Step::Back => {
                if !host.back() {
                    debug!("no earlier history entry");
                }
            }
            Step::Forward => {
                if !host.forward() {
                    debug!("no later history entry");
                }
            }
            Step::Read => records.borrow_mut().push(Record {
                kind: RecordKind::Read,
                fragment: detector.read_current_fragment(),
                at: host.now(),
            }),
        }
        host.run_pending();
    }

    let rendered = render(&records.borrow(), format);
    emit(&rendered)?;
    Ok(0)
}

fn read_script(path: &Path) -> io::Result<String> {
    if path == Path::new("-") {
        let mut source = String::new();
        io::stdin().lock().read_to_string(&mut source)?;
        Ok(source)
    } else {
        fs::read_to_string(path)
    }
}

#[derive(Debug, Clone, Copy)]
enum RecordKind {
    Initial,
    Change,
    Read,
}

impl RecordKind {
    fn as_str(self) -> &'static str {
        match self {
            RecordKind::Initial => "initial",
            RecordKind::Change => "change",
            RecordKind::Read => "read",
        }
    }
}

#[derive(Debug, Clone)]
struct Record {
    kind: RecordKind,
    fragment: String,
    at: Duration,
}

fn render(records: &[Record], format: FormatValue) -> String {
    let mut out = String::new();
    for record in records {
        let line = match format {
            FormatValue::Plain => format!("{}\t{}", record.kind.as_str(), record.fragment),
            FormatValue::Json => json!({
                "event": record.kind.as_str(),
                "fragment": record.fragment,
                "at_ms": record.at.as_millis() as u64,
            })
            .to_string(),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn emit(rendered: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match handle.write_all(rendered.as_bytes()) {
        Ok(_) => {}
        Err(err) if should_ignore_pipe_error(&err) => return Ok(()),
        Err(err) => return Err(err).context("Failed to write output"),
    }
    match handle.flush() {
        Ok(_) => Ok(()),
        Err(err) if should_ignore_pipe_error(&err) => Ok(()),
        Err(err) => Err(err).context("Failed to flush stdout"),
    }
}

fn should_ignore_pipe_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::WouldBlock
    )
}

#[derive(Parser)]
#[command(name = "hash-track", version, about = "Address fragment tracking tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the fragment parsed from an address
    Fragment(FragmentArgs),
    /// Run a navigation script against a simulated host and print every notification
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct FragmentArgs {
    /// Full address, e.g. http://example.com/page#state
    #[arg(value_name = "ADDRESS")]
    address: String,
}

#[derive(Args)]
struct SimulateArgs {
    /// Capabilities of the simulated host
    #[arg(long, value_enum, default_value_t = ProfileValue::Native)]
    profile: ProfileValue,

    /// Address the page starts at
    #[arg(long, value_name = "ADDRESS", default_value = "http://localhost/")]
    start: String,

    /// Configuration file taking precedence over .hash-track.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = FormatValue::Plain)]
    format: FormatValue,

    /// Script file, or '-' for stdin
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileValue {
    Native,
    Polling,
    Legacy,
    CompatibilityView,
}

impl ProfileValue {
    fn into_profile(self) -> HostProfile {
        match self {
            ProfileValue::Native => HostProfile::native(),
            ProfileValue::Polling => HostProfile::polling(),
            ProfileValue::Legacy => HostProfile::legacy(),
            ProfileValue::CompatibilityView => HostProfile::compatibility_view(),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatValue {
    Plain,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_keeps_library_info() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
        let directives: Vec<&str> = DEFAULT_LOG_FILTER.split(',').collect();
        assert_eq!(directives, vec!["warn", "hash_track=info"]);
    }
}
