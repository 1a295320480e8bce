//! # Popstack - nested popup client
//!
//! Maps a cyan toplevel and, on each pointer press, stacks a yellow popup
//! on it and a red popup on that. A third press either drops the topmost
//! popup (grab mode) or repaints the first popup black into a second
//! buffer. Runs until the compositor hangs up.

use anyhow::Result;
use clap::{ArgGroup, Parser};
use log::{debug, info, warn};
use popstack::error::{EXIT_FAILURE, EXIT_OK};
use popstack::{App, Client, GrabMode, PopstackConfig, PopstackError, ShmAllocator};

#[derive(Parser, Debug)]
#[command(name = "popstack")]
#[command(about = "A Wayland client stacking nested xdg popups, with or without pointer grabs")]
#[command(version)]
#[command(group(
    ArgGroup::new("grab")
        .required(true)
        .args(["with_grab", "without_grab"])
))]
struct Cli {
    /// Request an exclusive pointer grab for every popup
    #[arg(long)]
    with_grab: bool,

    /// Create popups without grabbing the pointer
    #[arg(long)]
    without_grab: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/popstack/popstack.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn grab_mode(&self) -> GrabMode {
        if self.with_grab {
            GrabMode::WithGrab
        } else {
            GrabMode::WithoutGrab
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { EXIT_FAILURE } else { EXIT_OK });
        }
    };

    let code = match run(cli) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            eprintln!("popstack: {:#}", e);
            e.downcast_ref::<PopstackError>()
                .map_or(EXIT_FAILURE, PopstackError::exit_code)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    let loaded = PopstackConfig::load(&cli.config);

    // Initialize logging
    let debug = cli.debug || loaded.as_ref().map_or(false, |c| c.general.debug);
    let filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    info!("🚀 Starting popstack");
    info!("📄 Version: {}", popstack::VERSION);
    if let Some(date) = option_env!("BUILD_DATE") {
        debug!("Built {} from {}", date, option_env!("GIT_COMMIT").unwrap_or("unknown commit"));
    }

    let config = match loaded {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            warn!("Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            PopstackConfig::default()
        }
    };

    let grab_mode = cli.grab_mode();
    info!("Popup grab mode: {:?}", grab_mode);

    let allocator = ShmAllocator::from_env()?;
    let app = App::new(&config, grab_mode, allocator)?;
    let client = Client::connect(app)?;
    client.run()?;

    info!("👋 Display connection closed, popstack shutting down");
    Ok(())
}
