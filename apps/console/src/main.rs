mod cli;
mod commands;
mod render;
mod session;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::Layer;

use cli::{Cli, Commands, ConsoleArgs, ProfilesArgs, RunArgs, SessionArgs};
use commands::ConsoleReply;
use render::{ChartSink, JsonLinesSink, LogSink, NullSink};
use session::AppSession;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "crashsim starting");

    let result = match &cli.command {
        Commands::Run(args) => run_once(args, cli.quiet).await,
        Commands::Console(args) => run_console(args, cli.quiet).await,
        Commands::Profiles(args) => print_profiles(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "command failed");
    }
    result
}

fn init_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else {
        let default_level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let fmt_layer = match cli.log_format {
        cli::LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .boxed(),
        cli::LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        cli::LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn build_session(args: &SessionArgs, quiet: bool) -> Result<AppSession> {
    let sink: Arc<dyn ChartSink> = match &args.frames {
        Some(path) => Arc::new(JsonLinesSink::create(path)?),
        None if quiet => Arc::new(NullSink),
        None => Arc::new(LogSink),
    };
    Ok(AppSession::new(args.session_config(), sink))
}

async fn run_once(args: &RunArgs, quiet: bool) -> Result<()> {
    let sess = build_session(&args.session, quiet)?;
    let duration = Duration::try_from_secs_f64(args.duration).context("invalid --duration")?;

    let started = commands::start(&sess, &args.speed, &args.scenario, args.collision.as_deref())
        .await
        .map_err(anyhow::Error::msg)?;
    println!("{started}");

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        r = tokio::signal::ctrl_c() => {
            r.context("failed to listen for ctrl-c")?;
            info!("interrupted, stopping early");
        }
    }

    println!("{}", commands::stop(&sess).await.map_err(anyhow::Error::msg)?);
    if let Some(out) = &args.output {
        println!("{}", commands::save(&sess, Some(out)).map_err(anyhow::Error::msg)?);
    }
    println!("{}", commands::status(&sess));
    Ok(())
}

async fn run_console(args: &ConsoleArgs, quiet: bool) -> Result<()> {
    let sess = build_session(&args.session, quiet)?;
    println!("{}", commands::CONSOLE_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("read stdin")? {
        match commands::execute(&sess, &line).await {
            ConsoleReply::Silent => {}
            ConsoleReply::Line(s) => println!("{s}"),
            ConsoleReply::Quit => return Ok(()),
        }
    }

    // stdin closed
    sess.stop().await;
    Ok(())
}

fn print_profiles(args: &ProfilesArgs) -> Result<()> {
    let rows = commands::profiles();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!("{:<18} {:<18} {:>7} {:>6} {:>6}  GPS", "Scenario", "Collision", "d", "na", "ng");
    for r in rows {
        let collision = r.collision.map(|c| c.label()).unwrap_or("-");
        println!(
            "{:<18} {:<18} {:>7.1} {:>6.1} {:>6.1}  {}",
            r.scenario.label(),
            collision,
            r.divisor,
            r.accel_noise,
            r.gyro_noise,
            r.gps
        );
    }
    Ok(())
}
