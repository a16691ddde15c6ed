//! counter-hook entry point: CLI dispatch, logging, exit codes.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use counter_hooks::app::cli::{Args, Mode, HELP_TEXT};
use counter_hooks::app::logging::{filter_for_level, init_tracing, resolve_level};
use counter_hooks::config::context::job_id_from_env;
use counter_hooks::config::persistence::LoadedConfig;
use counter_hooks::config::{load_config, HookConfig, JobContext};
use counter_hooks::daemon::status::show_status;
use counter_hooks::daemon::RecordStore;
use counter_hooks::error::{EXIT_MALFORMED_INPUT, EXIT_MISSING_INPUT};
use counter_hooks::phase::{
    early_skip, prologue_from_lookup, resolve_role, run_epilogue, EpilogueOutcome, PrologueOutcome,
};
use counter_hooks::role::RoleDecision;
use counter_hooks::HookError;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            if err.kind() == clap::error::ErrorKind::DisplayHelp {
                print!("{}", HELP_TEXT);
                return ExitCode::SUCCESS;
            }
            if err.kind() == clap::error::ErrorKind::DisplayVersion {
                println!("counter-hook {} ({})", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
                return ExitCode::SUCCESS;
            }
            eprintln!("{}", err);
            print!("{}", HELP_TEXT);
            return ExitCode::from(EXIT_MALFORMED_INPUT);
        }
    };

    let Some(mode) = args.mode() else {
        eprintln!("ERROR: Specify exactly one of --prologue, --epilogue, --decide, --status.");
        print!("{}", HELP_TEXT);
        return ExitCode::from(EXIT_MALFORMED_INPUT);
    };

    // Config comes first so its log level can take part in level resolution.
    let loaded = load_config(args.config.as_deref());

    let config_level = match &loaded {
        Ok(l) => l.config.logging.log_level.clone(),
        Err(_) => "info".to_string(),
    };
    let level = resolve_level(args.log_level.as_deref(), std::env::var("LOG_LEVEL").ok(), &config_level);
    init_tracing(filter_for_level(&level));

    let LoadedConfig { config, source } = match loaded {
        Ok(l) => l,
        Err(e) => {
            error!("{:#}", e);
            let code = if args.config.as_ref().is_some_and(|p| !p.exists()) {
                EXIT_MISSING_INPUT
            } else {
                EXIT_MALFORMED_INPUT
            };
            return ExitCode::from(code);
        }
    };
    match &source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("No configuration file, using built-in defaults"),
    }

    let result = match mode {
        Mode::Prologue => prologue(&config),
        Mode::Epilogue => epilogue(&config),
        Mode::Decide => decide(&config),
        Mode::Status => status(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.exit_code();
            if code == 0 {
                warn!("{}", e);
            } else {
                error!("{}", e);
            }
            ExitCode::from(code)
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn prologue(config: &HookConfig) -> Result<(), HookError> {
    match prologue_from_lookup(config, env_var)? {
        PrologueOutcome::Skipped(_) => {}
        PrologueOutcome::Launched(daemon) => {
            println!(
                "Launched {} with PID {}, written to {}",
                config.daemon.name,
                daemon.pid,
                daemon.record_path.display()
            );
        }
    }
    Ok(())
}

fn epilogue(config: &HookConfig) -> Result<(), HookError> {
    let job_id = job_id_from_env()?;
    match run_epilogue(config, &job_id)? {
        EpilogueOutcome::Terminated(daemon) => {
            println!(
                "Sent {} to process with PID {}, deleted {}",
                config.daemon.stop_signal,
                daemon.pid,
                daemon.record_path.display()
            );
        }
        EpilogueOutcome::Stale { pid } => {
            println!("Process with PID {} had already exited, removed its PID file", pid);
        }
        EpilogueOutcome::NoRecord => {}
    }
    Ok(())
}

fn decide(config: &HookConfig) -> Result<(), HookError> {
    if let Some(reason) = early_skip(config, &env_var)? {
        println!("not a counter node ({})", reason);
        return Ok(());
    }
    let ctx = JobContext::from_env()?;
    match resolve_role(config, &ctx)? {
        RoleDecision::Participating { slot } => println!(
            "{}: counter node, slot {} ({})",
            ctx.node_name,
            slot,
            config.daemon.config_artifact(slot).display()
        ),
        RoleDecision::NotParticipating(reason) => {
            println!("{}: not a counter node ({})", ctx.node_name, reason)
        }
    }
    Ok(())
}

fn status(config: &HookConfig) -> Result<(), HookError> {
    let job_id = job_id_from_env()?;
    let store = RecordStore::from_settings(&config.daemon);
    show_status(&store, &job_id)?;
    Ok(())
}
