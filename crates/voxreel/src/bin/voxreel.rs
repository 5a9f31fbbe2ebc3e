use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use voxreel::config::{apply_env_overrides, validate_config};
use voxreel::{load_config, logging, Config, JobStatus, Orchestrator, VoxreelError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file; built-in defaults are used when omitted
    #[arg(short, long, env = "VOXREEL_CONFIG")]
    config: Option<PathBuf>,

    /// Audio files to queue at startup
    audio: Vec<PathBuf>,

    /// Exit once every file given on the command line has finished
    #[arg(long)]
    once: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match resolve_config(args.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("voxreel: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("voxreel: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config, &args) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn resolve_config(path: Option<&PathBuf>) -> Result<Config, VoxreelError> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => {
            let mut config = Config::default();
            apply_env_overrides(&mut config)?;
            validate_config(&config)?;
            Ok(config)
        }
    }
}

fn run(config: Config, args: &Args) -> Result<ExitCode, VoxreelError> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let orchestrator = Orchestrator::open(config)?;
    orchestrator.start()?;
    info!("voxreel started");

    let mut submitted = Vec::new();
    for path in &args.audio {
        match orchestrator.submit(path) {
            Ok(response) => {
                info!(job_id = %response.job_id, path = %path.display(), "queued");
                submitted.push(response.job_id);
            }
            Err(e) => error!(path = %path.display(), "could not queue: {}", e),
        }
    }

    let mut failed = 0;
    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(500));
        if !args.once {
            continue;
        }

        let views = submitted
            .iter()
            .map(|id| orchestrator.job(id))
            .collect::<Result<Vec<_>, _>>()?;
        if views
            .iter()
            .all(|v| matches!(v.status, JobStatus::Done | JobStatus::Failed))
        {
            for view in &views {
                match view.status {
                    JobStatus::Done => info!(job_id = %view.id, "done"),
                    _ => {
                        failed += 1;
                        error!(
                            job_id = %view.id,
                            "failed: {}",
                            view.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
            }
            break;
        }
    }

    info!("Shutting down");
    orchestrator.shutdown();

    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
