use clap::Parser;
use color_eyre::Result;
use minit::{Config, Profile, cli::{self, Cli, Commands}};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = Config::load_with_profile(profile)?;
    minit::logging::init(&config.log_filter);

    let store = config.store(profile)?;

    // Migration runs once per launch, before any data is read
    let report = store.run_startup_migration();
    if let Some(path) = &report.path {
        tracing::info!(target: "minit", event = "startup_migrated", path = %path.display());
    }

    match cli.command.unwrap_or(Commands::Migrate) {
        Commands::Migrate => cli::handle_migrate(&report)?,
        Commands::Paths => cli::handle_paths(&store)?,
        Commands::Memo(command) => cli::handle_memo(command, &store)?,
        Commands::Session(command) => cli::handle_session(command, &store)?,
        Commands::Tags => cli::handle_tags(&store)?,
        Commands::Stats { tags } => cli::handle_stats(tags, &store)?,
    }

    Ok(())
}
