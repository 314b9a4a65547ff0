//! # Hosts Redirect
//!
//! Loads the hosts file for the active storage profile into a redirection
//! table and resolves hostnames against it.
//!
//! ## Usage
//!
//! ```bash
//! # Load ./atmosphere/hosts/* and show where a host goes
//! hosts-redirect receive-lp1.dg.srv.nintendo.net
//!
//! # Custom config and storage root
//! hosts-redirect -c /etc/hosts-redirect.yaml --root /sd/atmosphere example.com
//!
//! # Keep running and reload whenever a hosts file changes
//! hosts-redirect --watch -vv
//! ```

use clap::Parser;
use hosts_redirect::config::AppConfig;
use hosts_redirect::{logging, HostRedirector};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Hosts-file driven hostname redirection.
#[derive(Parser, Debug)]
#[command(name = "hosts-redirect")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "HOSTS_REDIRECT_CONFIG")]
    config: Option<PathBuf>,

    /// Storage root containing the hosts/ directory (overrides config)
    #[arg(short, long, env = "HOSTS_REDIRECT_ROOT")]
    root: Option<PathBuf>,

    /// Do not seed the table with the built-in default entries
    #[arg(long)]
    no_defaults: bool,

    /// Keep running and reload when a hosts file changes
    #[arg(short, long)]
    watch: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace, -vvvv trace+deps)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,

    /// Hostnames to resolve against the table
    hostnames: Vec<String>,
}

impl Args {
    /// Converts verbosity count to log level string
    fn log_level(&self) -> Option<String> {
        if self.quiet {
            return Some("error".to_string());
        }
        match self.verbose {
            0 => None,
            1 => Some("info".to_string()),
            2 => Some("debug".to_string()),
            _ => Some("trace".to_string()),
        }
    }

    fn trace_deps(&self) -> bool {
        self.verbose >= 4
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = load_config(&args);
    if let Some(ref root) = args.root {
        config.storage.root = root.clone();
    }
    let add_defaults = config.redirect.add_defaults && !args.no_defaults;

    let _log_guard = match logging::init_logging(&config.logging, args.log_level(), args.trace_deps()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        root = %config.storage.root.display(),
        profile = %config.storage_profile(),
        "Starting hosts-redirect"
    );

    let redirector = HostRedirector::from_config(&config);
    if let Err(e) = redirector.initialize_redirections(add_defaults) {
        error!(error = %e, "Failed to load redirections");
        return ExitCode::FAILURE;
    }

    for hostname in &args.hostnames {
        match redirector.try_get_redirection(hostname) {
            Some(addr) => println!("{} -> {}", hostname, addr),
            None => println!("{} -> (not redirected)", hostname),
        }
    }

    if args.watch || config.redirect.watch {
        let mut rx = match redirector.start_watcher(add_defaults) {
            Ok(rx) => rx,
            Err(e) => {
                error!(error = %e, "Failed to start hosts watcher");
                return ExitCode::FAILURE;
            }
        };
        while let Some(len) = rx.recv().await {
            info!(redirections = len, "Hosts file reloaded");
        }
    }

    ExitCode::SUCCESS
}

/// Load configuration from file or use defaults
fn load_config(args: &Args) -> AppConfig {
    let config_path = args.config.clone().or_else(|| {
        let defaults = [
            "./hosts-redirect.yaml",
            "./hosts-redirect.yml",
            "/etc/hosts-redirect/config.yaml",
        ];
        defaults.into_iter().map(PathBuf::from).find(|p| p.exists())
    });

    match config_path {
        Some(path) => match AppConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Failed to load config from {:?}: {}", path, e);
                eprintln!("Using default configuration");
                AppConfig::default()
            }
        },
        None => AppConfig::default(),
    }
}
