//! cloudsave CLI entry point.

use clap::Parser;
use cloudsave::cli::commands;
use cloudsave::cli::commands::init::InitOptions;
use cloudsave::cli::{Cli, Commands};
use cloudsave::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let config = cli.config.as_deref();
    let save_dir = cli.save_dir.as_deref();

    match &cli.command {
        Commands::Init { backend, game_id, api_url, user_id, force } => {
            let options = InitOptions {
                backend: *backend,
                game_id: game_id.as_deref(),
                api_url: api_url.as_deref(),
                user_id: user_id.as_deref(),
                save_dir,
                force: *force,
            };
            commands::init::execute(config, &options, json)
        }

        // Sync
        Commands::Sync { force } => commands::sync::execute(config, save_dir, *force, json),
        Commands::Watch { poll } => commands::watch::execute(config, save_dir, *poll, json),
        Commands::Plan => commands::plan::execute(config, save_dir, json),
        Commands::Manifest => commands::manifest::execute(config, save_dir, json),
        Commands::Status => commands::status::execute(config, save_dir, json),

        // Account
        Commands::Login { username, password } => commands::auth::login(config, username, password, json),
        Commands::Signup { username, email, password } => {
            commands::auth::signup(config, username, email, password, json)
        }
        Commands::Logout => commands::auth::logout(config, json),

        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(*shell),
    }
}
