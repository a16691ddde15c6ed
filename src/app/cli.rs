//! Command-line argument definitions (clap) and help text.

use std::path::PathBuf;

use clap::Parser;

pub const HELP_TEXT: &str = "
Slurm hooks for GPU hardware-counter daemons on leadership-class jobs
Usage: counter-hook <MODE> [OPTIONS]

Modes (exactly one):
  -p, --prologue                Decide this node's role and launch the counter daemon if selected
  -e, --epilogue                Signal this job's counter daemon and remove its PID file
  -d, --decide                  Print this node's role decision without launching anything
  -i, --status                  Show the PID file and daemon state for this job
Options:
  -c, --config <CONFIG>         Configuration file (default: config.json beside the executable)
      --log-level <LOG_LEVEL>   Log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
  -h, --help                    Print help
  -V, --version                 Print version

Exit codes:
  0 success or not a counter node    4 daemon launch failed
  1 missing environment variable     5 PID file write failed
  2 malformed input                  6 signal delivery failed
  3 node not in job's node list      7 PID file cleanup failed
                                     8 PID file unreadable
";

#[derive(Parser, Debug)]
#[command(name = "counter-hook")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Slurm hooks for GPU hardware-counter daemons", long_about = None)]
pub struct Args {
    // === Modes ===
    /// Decide this node's role and launch the counter daemon if selected
    #[arg(short = 'p', long, help_heading = "Modes")]
    pub prologue: bool,

    /// Signal this job's counter daemon and remove its PID file
    #[arg(short = 'e', long, help_heading = "Modes")]
    pub epilogue: bool,

    /// Print this node's role decision without launching anything
    #[arg(short = 'd', long, help_heading = "Modes")]
    pub decide: bool,

    /// Show the PID file and daemon state for this job
    #[arg(short = 'i', long, help_heading = "Modes")]
    pub status: bool,

    // === Options ===
    /// Configuration file (default: config.json beside the executable)
    #[arg(short = 'c', long, help_heading = "Options")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
    #[arg(long = "log-level", help_heading = "Options")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Prologue,
    Epilogue,
    Decide,
    Status,
}

impl Args {
    /// The single requested mode, or `None` when zero or several were given.
    pub fn mode(&self) -> Option<Mode> {
        let selected: Vec<Mode> = [
            (self.prologue, Mode::Prologue),
            (self.epilogue, Mode::Epilogue),
            (self.decide, Mode::Decide),
            (self.status, Mode::Status),
        ]
        .into_iter()
        .filter_map(|(on, mode)| on.then_some(mode))
        .collect();

        match selected.as_slice() {
            [mode] => Some(*mode),
            _ => None,
        }
    }
}
