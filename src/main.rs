//! seshat CLI: versioned graph store with a derived search index.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use seshat::config::Config;
use seshat::index::Filters;
use seshat::repo::{Metadata, Queryable, Readable, Versionable, Writable, metadata};
use seshat::resource::Resource;

#[derive(Parser)]
#[command(name = "seshat", version, about = "Versioned RDF graph store with search")]
struct Cli {
    /// Config file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for persistent storage (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Author recorded in commit headers.
    #[arg(long, global = true, default_value = "seshat-cli")]
    author: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new seshat data directory.
    Init,

    /// Add (or update) resources from a JSON file.
    Add {
        /// Path to a JSON file with one resource or an array of resources.
        #[arg(long)]
        file: PathBuf,
    },

    /// Preview the effect of a write without committing it.
    Stage {
        /// Path to a JSON file with one resource.
        #[arg(long)]
        file: PathBuf,
    },

    /// Fetch a resource from the search index.
    Get {
        /// Resource IRI.
        id: String,
    },

    /// Fetch the authoritative bounded description from the graph store.
    Describe {
        /// Resource IRI.
        id: String,
    },

    /// Delete a resource from the store and the index.
    Delete {
        /// Resource IRI.
        id: String,
    },

    /// Show the commit log for a resource.
    Log {
        /// Resource IRI.
        id: String,
    },

    /// Query the search index.
    Query {
        /// Query text (empty matches everything).
        #[arg(default_value = "")]
        q: String,

        /// Result window offset.
        #[arg(long, default_value = "0")]
        from: usize,

        /// Result window size; omit with --all for the full result set.
        #[arg(long, default_value = "10")]
        size: usize,

        /// Retrieve the entire result set through a scroll cursor.
        #[arg(long)]
        all: bool,

        /// Sort order, e.g. "dateCreated:DESC".
        #[arg(long)]
        sort: Option<String>,

        /// Filters as field=value, repeatable; `.GTE` field suffix for ranges.
        #[arg(long = "filter")]
        filters: Vec<String>,
    },

    /// Reconcile a name against the index for entity linking.
    Reconcile {
        q: String,

        /// Preferred language for names.
        #[arg(long, default_value = "en")]
        lang: String,
    },

    /// Show store and index statistics.
    Info,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).into_diagnostic()?,
        None => Config::default(),
    };
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir.clone();
    }

    let repo = config.open()?;
    let meta = write_metadata(&cli.author);

    match cli.command {
        Commands::Init => {
            let data_dir = config
                .data_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".seshat"));
            let mut config = config.clone();
            config.data_dir = Some(data_dir.clone());
            config.open()?;
            println!("Initialized seshat at {}", data_dir.display());
        }

        Commands::Add { file } => {
            let resources = read_resources(&file)?;
            let count = resources.len();
            repo.add_resources(&resources, &meta)?;
            println!("Committed {count} resource(s)");
        }

        Commands::Stage { file } => {
            let resources = read_resources(&file)?;
            for resource in &resources {
                let staged = repo.stage(resource)?;
                println!("{}", serde_json::to_string_pretty(&staged).into_diagnostic()?);
            }
        }

        Commands::Get { id } => match repo.get_resource(&id)? {
            Some(resource) => {
                println!("{}", serde_json::to_string_pretty(&resource).into_diagnostic()?);
            }
            None => println!("Not found: {id}"),
        },

        Commands::Describe { id } => match repo.store().describe(&id).map_err(seshat::error::SeshatError::from)? {
            Some(resource) => {
                println!("{}", serde_json::to_string_pretty(&resource).into_diagnostic()?);
            }
            None => println!("Not found: {id}"),
        },

        Commands::Delete { id } => match repo.delete_resource(&id, &meta)? {
            Some(resource) => println!("Deleted {}", resource.id()),
            None => println!("Not found: {id}"),
        },

        Commands::Log { id } => {
            let commits = repo.log(&id);
            println!("{}", serde_json::to_string_pretty(&commits).into_diagnostic()?);
        }

        Commands::Query {
            q,
            from,
            size,
            all,
            sort,
            filters,
        } => {
            let filters = parse_filters(&filters);
            let size = if all { None } else { Some(size) };
            let result = repo.query(&q, from, size, sort.as_deref(), &filters, None)?;
            println!(
                "{} of {} hit(s)",
                result.items.len(),
                result.total
            );
            for hit in &result.items {
                match hit.score {
                    Some(score) => println!("{:.3}  {}", score, hit.resource.id()),
                    None => println!("       {}", hit.resource.id()),
                }
            }
        }

        Commands::Reconcile { q, lang } => {
            let hits = repo.reconcile(&q, 0, Some(10), None, &Filters::new(), None, &lang)?;
            println!("{}", serde_json::to_string_pretty(&hits).into_diagnostic()?);
        }

        Commands::Info => {
            let store = repo.store();
            println!("namespace: {}", store.namespace());
            println!(
                "triples:   {}",
                store.len().map_err(seshat::error::SeshatError::from)?
            );
            println!("commits:   {}", store.history_len());
            println!("documents: {}", repo.index().len());
        }
    }

    Ok(())
}

fn write_metadata(author: &str) -> Metadata {
    Metadata::from([
        (metadata::AUTHOR.to_string(), author.to_string()),
        (metadata::DATE.to_string(), chrono::Utc::now().to_rfc3339()),
    ])
}

/// Read one resource or an array of resources from a JSON file.
fn read_resources(path: &std::path::Path) -> Result<Vec<Resource>> {
    let text = std::fs::read_to_string(path).into_diagnostic()?;
    if let Ok(list) = serde_json::from_str::<Vec<Resource>>(&text) {
        return Ok(list);
    }
    let single: Resource = serde_json::from_str(&text).into_diagnostic()?;
    Ok(vec![single])
}

/// Parse repeated `field=value` filter arguments into a filter map.
fn parse_filters(args: &[String]) -> Filters {
    let mut filters = Filters::new();
    for arg in args {
        match arg.split_once('=') {
            Some((field, value)) => {
                filters
                    .entry(field.to_string())
                    .or_default()
                    .push(value.to_string());
            }
            None => tracing::trace!(filter = %arg, "ignoring malformed filter argument"),
        }
    }
    filters
}
