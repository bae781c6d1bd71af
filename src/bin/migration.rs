use anyhow::Result;
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use montaz_api::migrator::{self, Migrator};

/// Schema management for the installation orders database.
#[derive(Debug, Parser)]
#[command(name = "migration", version, about)]
struct Cli {
    /// Database URL; falls back to APP__DATABASE_URL, then DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up {
        /// Apply at most this many
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// List migrations and whether they are applied
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

fn database_url(cli: &Cli) -> String {
    cli.database_url
        .clone()
        .or_else(|| std::env::var("APP__DATABASE_URL").ok())
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://montaz.db?mode=rwc".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    montaz_api::config::init_tracing("info", false);

    let cli = Cli::parse();
    let url = database_url(&cli);

    match cli.command.unwrap_or(Command::Up { steps: None }) {
        Command::Up { steps: None } => migrator::run_migration(&url).await?,
        Command::Up { steps } => {
            let db = migrator::connect(&url).await?;
            Migrator::up(&db, steps).await?;
            info!(?steps, "Migrations applied");
        }
        Command::Down { steps } => {
            let db = migrator::connect(&url).await?;
            Migrator::down(&db, Some(steps)).await?;
            info!(steps, "Migrations rolled back");
        }
        Command::Status => {
            let db = migrator::connect(&url).await?;
            Migrator::status(&db).await?;
        }
        Command::Fresh => {
            let db = migrator::connect(&url).await?;
            Migrator::fresh(&db).await?;
            info!("Database recreated");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["migration", "down", "--steps", "2"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Down { steps: 2 })));

        let cli = Cli::try_parse_from(["migration", "--database-url", "sqlite::memory:"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(database_url(&cli), "sqlite::memory:");
    }
}
