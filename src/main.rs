//! rootls CLI

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rootls::config::{self, Settings};
use rootls::elevation::is_elevated;
use rootls::prompt::TerminalState;
use rootls::{prompt, CredentialGate, ElevatedCommand, ElevationBroker, ElevationOutcome, PkexecMechanism, SudoMechanism};
use tracing_subscriber::EnvFilter;

/// Exit status when the whole run exceeds --timeout.
const EXIT_TIMED_OUT: i32 = 124;

#[derive(Parser)]
#[command(name = "rootls")]
#[command(about = "List privileged directories using polkit, falling back to sudo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Give up after this many seconds (overrides config)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Skip polkit and go straight to the sudo password prompt
    #[arg(long, global = true)]
    no_policy: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory with elevated rights (default: configured directory, /root)
    List {
        /// Directory to list
        dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run an arbitrary command with elevated rights
    Run {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Program followed by its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
        argv: Vec<String>,
    },

    /// Show resolved configuration and elevation tools (for debugging)
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut settings = Settings::load()?;
    if cli.no_policy {
        settings.policy.enabled = false;
    }
    if cli.timeout.is_some() {
        settings.timeout_secs = cli.timeout;
    }

    let (command, json) = match cli.command {
        Commands::Doctor => {
            print_doctor(&settings);
            return Ok(());
        }
        Commands::List { dir, json } => {
            let dir = dir.unwrap_or_else(|| settings.default_dir.clone());
            (ElevatedCommand::list_directory(&dir)?, json)
        }
        Commands::Run { json, argv } => {
            let mut parts = argv.into_iter();
            let program = parts.next().unwrap_or_default();
            (ElevatedCommand::new(program, parts)?, json)
        }
    };

    let terminal = TerminalState::capture();
    let (gate, prompts) = CredentialGate::new();
    let frontend = tokio::spawn(prompt::serve_terminal(prompts));
    let broker = ElevationBroker::from_settings(&settings, gate);

    let timeout = settings.timeout_secs.map(Duration::from_secs);
    let result = broker.run_with_timeout(&command, timeout).await;

    // Closing the gate ends the front-end once it is idle. A read still
    // blocked on the terminal cannot be joined, so put the terminal back.
    drop(broker);
    frontend.abort();
    let _ = frontend.await;
    terminal.restore();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if terminal.is_terminal() {
                eprintln!();
            }
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_TIMED_OUT);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    match outcome {
        ElevationOutcome::Ok(output) => {
            if !json {
                for line in &output.lines {
                    println!("{}", line);
                }
            }
            Ok(())
        }
        ElevationOutcome::Failed(reason) => {
            if !json {
                eprintln!("Error: {}", reason);
            }
            std::process::exit(reason.exit_code());
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_doctor(settings: &Settings) {
    const INDENT: &str = "        ";

    let config_path = config::config_path(&|key: &str| std::env::var(key).ok());
    let policy = PkexecMechanism::from_settings(&settings.policy);
    let credential = SudoMechanism::from_settings(&settings.credential);

    println!(
        "Config file:   {}",
        config_path.map(|p| p.display().to_string()).unwrap_or_else(|| "(none)".to_string())
    );
    println!("Running as root: {}", is_elevated());
    println!("Policy mechanism:");
    println!("{}Program:   {}", INDENT, settings.policy.program);
    println!("{}Enabled:   {}", INDENT, settings.policy.enabled);
    println!("{}Resolved:  {}", INDENT, describe(policy.program()));
    println!("Credential mechanism:");
    println!("{}Program:   {}", INDENT, settings.credential.program);
    println!("{}Enabled:   {}", INDENT, settings.credential.enabled);
    println!("{}Resolved:  {}", INDENT, describe(credential.program()));
    println!(
        "Timeout:       {}",
        settings.timeout_secs.map(|s| format!("{}s", s)).unwrap_or_else(|| "none".to_string())
    );
    println!("Default dir:   {}", settings.default_dir.display());
}

fn describe(path: Option<&PathBuf>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "not available".to_string())
}
