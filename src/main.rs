use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use kosty::cli::{self, Cli, Commands, GlobalOptions};
use kosty::errors::KostyError;
use kosty::services::SERVICE_REGISTRY;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let global = GlobalOptions {
        quiet: cli.quiet,
        config_file: cli.config_file.map(Into::into),
        profile: cli.profile,
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding accounts");
            on_interrupt.cancel();
        }
    });

    let result = match cli.command {
        Commands::Run(args) => cli::run::handle_run(&global, args, cancel).await,
        Commands::All(args) => cli::all::handle_all(&global, args, cancel).await,
        Commands::List => {
            print!("{}", cli::list::render_services(&SERVICE_REGISTRY));
            Ok(())
        }
        Commands::Validate => cli::validate::handle_validate(&global).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(err: &KostyError) -> i32 {
    match err {
        KostyError::Config(_) | KostyError::Yaml(_) => 2,
        KostyError::NotInOrganization(_) | KostyError::Scope(_) => 3,
        KostyError::Auth(_) => 4,
        KostyError::UnknownService(_) | KostyError::UnknownOperation { .. } => 5,
        _ => 1,
    }
}
