//! Texel CLI - edit localization files in repositories and local directories.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use texel::session::{commit_pending, merged_list};
use texel::{
    ChangeDriver, DirectoryGrant, Driver, DriverConfig, FileCodec, Project, Settings, Texel, TexelDriver, create_driver,
};

mod cli;

use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("texel")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("texel.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    match &cli.config {
        Some(path) => Settings::load(path),
        None => Settings::load_default(),
    }
}

fn base_driver(cli: &Cli, settings: &Settings, codec: Arc<FileCodec>) -> Result<Driver> {
    let config = match (&cli.dir, &cli.token) {
        (Some(dir), _) => {
            let dir = dir.canonicalize().unwrap_or_else(|_| dir.clone());
            DriverConfig::Directory(DirectoryGrant::from_path(dir))
        }
        (None, Some(token)) => DriverConfig::Bitbucket { token: token.clone() },
        (None, None) => eyre::bail!("Pass --dir for a local directory or --token for Bitbucket"),
    };
    create_driver(config, settings, codec)
}

fn change_driver(settings: &Settings) -> Result<ChangeDriver> {
    ChangeDriver::open(&settings.origin_prefix, &settings.change_db_path()).context("Failed to open change store")
}

fn print_project(project: &Project) {
    let kind = if project.leaf { "leaf".green() } else { "container".blue() };
    println!("{} {} {}", project.id.cyan(), project.name, kind.dimmed());
}

fn print_texels(texels: &[Texel]) {
    if texels.is_empty() {
        println!("{}", "No texels found".dimmed());
        return;
    }

    let mut texels = texels.to_vec();
    texels.sort_by_key(Texel::id);
    for texel in texels {
        let value = match &texel.value {
            Some(value) => value.normal(),
            None => "<deleted>".red(),
        };
        println!(
            "{} {} [{}] {}",
            texel.domain.dimmed(),
            texel.key.cyan(),
            texel.locale,
            value
        );
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli).context("Failed to load settings")?;
    let codec = Arc::new(FileCodec::with_default_locales()?);

    match &cli.command {
        Command::Projects { parent } => {
            let driver = base_driver(&cli, &settings, codec)?;
            let projects = driver.projects(parent.as_deref()).await.context("Failed to list projects")?;
            if projects.is_empty() {
                println!("{}", "No projects found".dimmed());
            }
            for project in &projects {
                print_project(project);
            }
        }

        Command::Project { id } => {
            let driver = base_driver(&cli, &settings, codec)?;
            let project = driver.project(id).await.context("Failed to get project")?;
            print_project(&project);
            if let Some(parent) = &project.parent {
                println!("  {} {}", "parent".dimmed(), parent.id.cyan());
            }
        }

        Command::List { id, pending } => {
            let driver = base_driver(&cli, &settings, codec)?;
            let texels = if *pending {
                let changes = change_driver(&settings)?;
                merged_list(&driver, &changes, id).await
            } else {
                driver.list(id).await
            }
            .context("Failed to list texels")?;
            print_texels(&texels);
        }

        Command::Set {
            id,
            domain,
            key,
            locale,
            value,
        } => {
            codec.domain_to_path(domain, locale)?;
            let changes = change_driver(&settings)?;
            changes
                .update(id, vec![Texel::new(domain, key, locale, value)])
                .await
                .context("Failed to stage value")?;
            println!("{} Staged: {} [{}]", "✓".green(), key.cyan(), locale);
        }

        Command::Delete { id, domain, key, locale } => {
            let changes = change_driver(&settings)?;
            changes
                .update(id, vec![Texel::tombstone(domain, key, locale)])
                .await
                .context("Failed to stage deletion")?;
            println!("{} Staged deletion: {} [{}]", "✓".green(), key.cyan(), locale);
        }

        Command::Pending { id } => {
            let changes = change_driver(&settings)?;
            print_texels(&changes.list(id).await?);
        }

        Command::Commit { id } => {
            let driver = base_driver(&cli, &settings, codec)?;
            let changes = change_driver(&settings)?;
            let count = commit_pending(&driver, &changes, id).await?;
            if count == 0 {
                println!("{}", "Nothing to commit".dimmed());
            } else {
                println!("{} Committed {} change(s) to {}", "✓".green(), count, id.cyan());
            }
        }

        Command::Discard { id } => {
            let changes = change_driver(&settings)?;
            let count = changes.clear(id)?;
            println!("{} Discarded {} change(s)", "✓".green(), count);
        }

        Command::Path { domain, locale } => {
            println!("{}", codec.domain_to_path(domain, locale)?);
        }

        Command::Domain { path } => {
            println!("{}", codec.path_to_domain(path)?);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Starting texel {}", env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    if let Err(e) = rt.block_on(run(cli)) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
