//! Maintenance CLI for the roadmap database.
//!
//! # Responsibility
//! - Run schema migrations and rollbacks explicitly.
//! - Inspect and edit organisations and their identifiers from a shell.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use roadmap_core::config::AppConfig;
use roadmap_core::db::migrations::{
    apply_migrations, current_version, latest_version, rollback_migrations,
};
use roadmap_core::db::{open_db, open_db_unmigrated};
use roadmap_core::logging::init_from_config;
use roadmap_core::model::identifier::Identifier;
use roadmap_core::model::org::{NewOrg, OrgId, OrgTypes};
use roadmap_core::repo::identifier_repo::{IdentifierRepository, SqliteIdentifierRepository};
use roadmap_core::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use roadmap_core::search::org_search::{search_orgs, NoExternalRegistry, SearchMode, SearchQuery};
use roadmap_core::service::shibboleth_service::{Discovery, ShibbolethService};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roadmap")]
#[command(author, version, about = "Roadmap organisation maintenance", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured database path
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,

    /// Revert schema migrations down to a version
    Rollback {
        /// Target schema version
        #[arg(long = "to")]
        to: u32,
    },

    /// Show schema and crate versions
    Status,

    /// Manage organisations
    Org {
        #[command(subcommand)]
        command: OrgCommand,
    },

    /// Search organisations by name or abbreviation
    Search {
        name: String,

        /// local, external or combined
        #[arg(long, default_value = "local")]
        mode: String,

        /// Only organisations with a funder registry ID
        #[arg(long)]
        funder_only: bool,
    },

    /// List organisations offered on the Shibboleth discovery page
    ShibDs,
}

#[derive(Subcommand)]
enum OrgCommand {
    /// Register a new organisation
    Create {
        name: String,

        #[arg(long)]
        abbreviation: Option<String>,

        /// Mark the organisation as a funder as well
        #[arg(long)]
        funder: bool,
    },

    /// Print one organisation as JSON
    Show { id: OrgId },

    /// Set (or with an empty value, remove) an identifier
    SetIdentifier {
        org_id: OrgId,
        /// Scheme name, e.g. shibboleth, ror or fundref
        scheme: String,
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = cli.database {
        config.database.path = path;
    }
    init_from_config(&config.logging).context("Failed to initialize logging")?;
    info!(
        "event=cli_start module=cli status=ok version={}",
        roadmap_core::core_version()
    );

    match cli.command {
        Commands::Migrate => {
            let mut conn = open_db_unmigrated(&config.database.path)
                .context("Failed to open database")?;
            apply_migrations(&mut conn).context("Failed to apply migrations")?;
            println!("schema_version={}", current_version(&conn)?);
        }
        Commands::Rollback { to } => {
            let mut conn = open_db_unmigrated(&config.database.path)
                .context("Failed to open database")?;
            rollback_migrations(&mut conn, to)
                .with_context(|| format!("Failed to roll back to version {to}"))?;
            println!("schema_version={}", current_version(&conn)?);
        }
        Commands::Status => {
            let conn = open_db_unmigrated(&config.database.path)
                .context("Failed to open database")?;
            println!("database={}", config.database.path.display());
            println!("schema_version={}", current_version(&conn)?);
            println!("latest_version={}", latest_version());
            println!("core_version={}", roadmap_core::core_version());
        }
        Commands::Org { command } => run_org_command(&config, command)?,
        Commands::Search {
            name,
            mode,
            funder_only,
        } => {
            let conn = open_db(&config.database.path).context("Failed to open database")?;
            let query = SearchQuery {
                term: name,
                mode: SearchMode::parse(&mode),
                funder_only,
            };
            let hits = search_orgs(&conn, &NoExternalRegistry, &query)?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Commands::ShibDs => {
            let conn = open_db(&config.database.path).context("Failed to open database")?;
            let service = ShibbolethService::new(
                SqliteIdentifierRepository::new(&conn),
                config.shibboleth.clone(),
            );
            match service.discovery(false)? {
                Discovery::Choose(holders) => {
                    for holder in holders {
                        println!(
                            "{}\t{}\t{}",
                            holder.org_id, holder.org_name, holder.identifier.value
                        );
                    }
                }
                Discovery::Empty | Discovery::SignedIn => {
                    println!("No organisations are currently registered.");
                }
            }
        }
    }

    Ok(())
}

fn run_org_command(config: &AppConfig, command: OrgCommand) -> Result<()> {
    let mut conn = open_db(&config.database.path).context("Failed to open database")?;
    let mut repo = SqliteOrgRepository::new(&mut conn);

    match command {
        OrgCommand::Create {
            name,
            abbreviation,
            funder,
        } => {
            let mut org = NewOrg::new(name);
            org.abbreviation = abbreviation;
            if funder {
                org.org_type = org.org_type.union(OrgTypes::FUNDER);
            }
            let id = repo.create_org(&org)?;
            println!("org_id={id}");
        }
        OrgCommand::Show { id } => {
            let org = repo
                .get_org(id)?
                .with_context(|| format!("Organisation {id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&org)?);
        }
        OrgCommand::SetIdentifier {
            org_id,
            scheme,
            value,
        } => {
            let Some(scheme) = repo.scheme_by_name(&scheme)? else {
                bail!("Unknown identifier scheme `{scheme}`");
            };
            let org = repo
                .get_org(org_id)?
                .with_context(|| format!("Organisation {org_id} not found"))?;

            let candidate = if value.trim().is_empty() {
                match org.identifier_for_scheme(scheme.id).and_then(|held| held.id) {
                    Some(id) => Identifier::persisted(id, scheme.id, ""),
                    None => {
                        println!("action=ignored");
                        return Ok(());
                    }
                }
            } else {
                repo.find_or_build(org_id, scheme.id, &value)?
            };

            let saved = repo.save_org(&org, &[candidate])?;
            for action in &saved.actions {
                println!("action={}", action.label());
            }
        }
    }

    Ok(())
}
