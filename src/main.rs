//! Shiori CLI - browse and search manga sources from the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shiori::config::Config;
use shiori::console::Console;
use shiori::sources::{AtsumaruSource, DirectoryRequest, Source, SourceRegistry};
use tracing::Level;

/// Browse and search manga sources.
#[derive(Parser, Debug)]
#[command(name = "shiori")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log debug output (search strategies, retries, fallbacks).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON instead of formatted text.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search for a title; an empty query browses featured titles.
    Search {
        query: Option<String>,

        /// Page number (1-based).
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Results per page, clamped to the configured range.
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// Show series metadata.
    Info { id: String },
    /// List chapters, newest first.
    Chapters { id: String },
    /// List page images of a chapter.
    Pages { id: String, chapter: String },
    /// Show home page sections.
    Home,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let console = Console::new();

    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let level = if args.verbose || config.source.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let registry = SourceRegistry::new(vec![Box::new(
        AtsumaruSource::new(&config).context("Failed to create Atsumaru source")?,
    )]);

    if let Err(e) = run(args, &registry, &console).await {
        console.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args, registry: &SourceRegistry, console: &Console) -> Result<()> {
    match args.command {
        Command::Search {
            query,
            page,
            per_page,
        } => {
            let source = default_source(registry)?;
            let request = DirectoryRequest {
                query,
                page: Some(page),
                per_page,
            };
            let result = source
                .directory(&request)
                .await
                .context("Directory request failed")?;

            if args.json {
                return print_json(&result);
            }

            console.highlights(&result.results);
            if !result.is_last_page {
                console.info(&format!("More results: --page {}", page + 1));
            }
        }
        Command::Info { id } => {
            let content = source_for(registry, &id)?
                .content(&id)
                .await
                .with_context(|| format!("Failed to fetch content {}", id))?;

            if args.json {
                return print_json(&content);
            }
            console.content(&content);
        }
        Command::Chapters { id } => {
            let chapters = source_for(registry, &id)?
                .chapters(&id)
                .await
                .with_context(|| format!("Failed to fetch chapters of {}", id))?;

            if args.json {
                return print_json(&chapters);
            }
            console.chapters(&chapters);
            console.success(&format!("{} chapters", console.count(chapters.len())));
        }
        Command::Pages { id, chapter } => {
            let data = source_for(registry, &id)?
                .chapter_data(&id, &chapter)
                .await
                .with_context(|| format!("Failed to fetch pages of chapter {}", chapter))?;

            if args.json {
                return print_json(&data);
            }
            console.pages(&data.pages);
        }
        Command::Home => {
            let sections = default_source(registry)?
                .home_sections()
                .await
                .context("Failed to fetch home sections")?;

            if args.json {
                return print_json(&sections);
            }
            for section in &sections {
                console.page_section(section);
            }
        }
    }

    Ok(())
}

fn default_source(registry: &SourceRegistry) -> Result<&dyn Source> {
    registry
        .find_by_key("atsumaru")
        .ok_or_else(|| anyhow::anyhow!("No sources registered"))
}

fn source_for<'a>(registry: &'a SourceRegistry, id: &str) -> Result<&'a dyn Source> {
    registry
        .find_for_id(id)
        .ok_or_else(|| anyhow::anyhow!("No source handles id: {}", id))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
