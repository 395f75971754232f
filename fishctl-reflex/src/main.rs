use anyhow::{Context, Result};
use clap::Parser;
use fishctl::InputCtl;
use fishctl_capture::{DbusBackend, FramePipeline, FrameSource, NegotiationError, Negotiator};
use fishctl_reflex::{
    run_frame_loop, ActionExecutor, Config, DecisionEngine, ExecutorSettings, SystemClock,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fishctl-reflex")]
#[command(about = "Casts, watches the bobber, and reels in on a bite")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/fishctl/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "fishctl_reflex={},fishctl_capture={},fishctl={}",
            level, level, level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())?;
    let settings = ExecutorSettings::from_config(&config)?;
    let cursor_mode = config.capture.cursor_mode()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let backend = runtime
        .block_on(DbusBackend::connect())
        .context("Failed to connect to the session bus")?;
    let mut negotiator = Negotiator::new(backend).with_cursor_mode(cursor_mode);

    // Ctrl-C stops the frame loop and also wakes a negotiation stuck on the portal dialog
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let canceller = negotiator.canceller();
        ctrlc::set_handler(move || {
            info!("stopping");
            running.store(false, Ordering::SeqCst);
            canceller.cancel();
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let input = InputCtl::new().context("Failed to create virtual input device")?;
    let mut executor = ActionExecutor::new(input, SystemClock, settings);
    let mut engine = DecisionEngine::new(config.timing.recast_delay());

    info!("waiting for a screen to be shared");
    let handle = match runtime.block_on(negotiator.begin_capture()) {
        Ok(handle) => handle,
        Err(NegotiationError::Cancelled { stage }) if !running.load(Ordering::SeqCst) => {
            info!(%stage, "interrupted before the screen cast started");
            return Ok(());
        }
        Err(e) => return Err(e).context("Screen cast negotiation failed"),
    };

    let mut pipeline = match FramePipeline::start(handle) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            runtime.block_on(negotiator.terminate());
            return Err(e).context("Failed to start frame pipeline");
        }
    };

    let outcome = run_frame_loop(
        &mut pipeline,
        &mut engine,
        &mut executor,
        &running,
        config.timing.frame_timeout(),
    );

    pipeline.stop();
    runtime.block_on(negotiator.terminate());

    match outcome {
        Ok(summary) => {
            info!(
                frames = summary.frames,
                decode_errors = summary.decode_errors,
                actions = summary.actions,
                catches = engine.catches(),
                "done"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "frame loop failed");
            Err(e.into())
        }
    }
}
