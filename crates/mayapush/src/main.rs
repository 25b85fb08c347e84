use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mayapush::{Action, Dispatcher, Error, Overrides, Settings, StderrReporter};

/// Reload the Maya plugin built from the file you are editing.
#[derive(Parser, Debug)]
#[command(name = "mayapush", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Settings file (JSON)
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "MAYAPUSH_SETTINGS",
        default_value = "mayapush.json"
    )]
    settings: PathBuf,

    /// Override the `host` setting
    #[arg(long, global = true, env = "MAYAPUSH_HOST")]
    host: Option<String>,

    /// Override the `port` setting
    #[arg(long, global = true, env = "MAYAPUSH_PORT")]
    port: Option<u16>,

    /// Resolve plugin paths for this OS instead of the current one (linux, windows)
    #[arg(long, global = true, value_name = "OS")]
    os: Option<String>,

    /// Print the payload instead of sending it
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Unload and reload the plugin, then run its follow-up code
    Test {
        /// File being edited; its directory names the plugin
        file: PathBuf,
    },
    /// Unload the plugin so it can be rebuilt
    Unload {
        /// File being edited; its directory names the plugin
        file: PathBuf,
    },
}

impl Command {
    fn action(&self) -> (Action, &Path) {
        match self {
            Self::Test { file } => (Action::Test, file.as_path()),
            Self::Unload { file } => (Action::Unload, file.as_path()),
        }
    }
}

/// Logs go to stderr; stdout is reserved for `--dry-run` output.
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let (text_layer, json_layer) = if json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };

    let _ = tracing_subscriber::registry()
        .with(log_filter())
        .with(text_layer)
        .with(json_layer)
        .try_init();
}

/// `RUST_LOG` wins when set and valid, otherwise `MAYAPUSH_LOG` picks the
/// crate's level.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("MAYAPUSH_LOG").ok();
        EnvFilter::new(crate_directive(level.as_deref()))
    })
}

fn crate_directive(level: Option<&str>) -> String {
    let level = level
        .and_then(|l| match l.to_ascii_lowercase().as_str() {
            "warning" => Some(Level::WARN),
            other => other.parse().ok(),
        })
        .unwrap_or(Level::INFO);
    format!("mayapush={}", level.as_str().to_ascii_lowercase())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Delivery failures were already shown by the reporter.
            if !matches!(e.downcast_ref::<Error>(), Some(Error::Transmission(_))) {
                eprintln!("error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let (action, file) = args.command.action();
    let file = std::path::absolute(file)
        .with_context(|| format!("invalid file path {}", file.display()))?;

    let settings = Overrides::new(Settings::load(&args.settings)?)
        .set_opt("host", args.host.clone())
        .set_opt("port", args.port);

    let mut dispatcher = Dispatcher::new(&settings);
    if let Some(os) = &args.os {
        dispatcher = dispatcher.with_os(os.as_str());
    }

    if args.dry_run {
        let payload = dispatcher.payload(action, &file)?;
        print!("{}", payload.render());
        return Ok(());
    }

    dispatcher.dispatch(action, &file, StderrReporter)?;
    Ok(())
}
