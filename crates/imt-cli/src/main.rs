use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use imt_schemas::Category;

mod commands;

use commands::catalog::Lookup;

#[derive(Parser)]
#[command(name = "imt")]
#[command(about = "Instrument catalog cache CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (base -> local overlay ...)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Warm the instrument cache and query it
    Catalog {
        #[command(subcommand)]
        cmd: CatalogCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connectivity, catalog tables and per-category row counts.
    Status,

    /// Apply SQL migrations.
    Migrate,

    /// Look up an instrument id in the persisted asset index.
    Asset {
        uid: String,
    },
}

#[derive(Subcommand)]
enum CatalogCmd {
    /// Run one initialization pass and print its report.
    Warm,

    /// Print one page of a category.
    List {
        /// bonds | shares | etfs | currencies
        #[arg(value_parser = parse_category)]
        category: Category,

        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: i64,

        /// Page size; 0 prints the whole category
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Look up one instrument by ticker, FIGI, ISIN or uid.
    #[command(group(ArgGroup::new("key").required(true).args(["ticker", "figi", "isin", "uid"])))]
    Find {
        #[arg(long)]
        ticker: Option<String>,

        #[arg(long)]
        figi: Option<String>,

        #[arg(long)]
        isin: Option<String>,

        #[arg(long)]
        uid: Option<String>,
    },
}

fn parse_category(s: &str) -> Result<Category, String> {
    Category::parse(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = imt_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Db { cmd } => {
            let ctx = bootstrap(&cli.config_paths)?;
            match cmd {
                DbCmd::Status => commands::db::status(&ctx).await?,
                DbCmd::Migrate => commands::db::migrate(&ctx).await?,
                DbCmd::Asset { uid } => commands::db::asset(&ctx, &uid).await?,
            }
        }

        Commands::Catalog { cmd } => {
            let ctx = bootstrap(&cli.config_paths)?;
            match cmd {
                CatalogCmd::Warm => commands::catalog::warm(&ctx).await?,
                CatalogCmd::List {
                    category,
                    page,
                    limit,
                } => commands::catalog::list(&ctx, category, page, limit).await?,
                CatalogCmd::Find {
                    ticker,
                    figi,
                    isin,
                    uid,
                } => {
                    let lookup = match (ticker, figi, isin, uid) {
                        (Some(t), _, _, _) => Lookup::Ticker(t),
                        (_, Some(f), _, _) => Lookup::Figi(f),
                        (_, _, Some(i), _) => Lookup::Isin(i),
                        (_, _, _, Some(u)) => Lookup::Uid(u),
                        _ => anyhow::bail!("one of --ticker, --figi, --isin or --uid is required"),
                    };
                    commands::catalog::find(&ctx, lookup).await?
                }
            }
        }
    }

    Ok(())
}

fn bootstrap(config_paths: &[String]) -> Result<commands::AppContext> {
    let ctx = commands::load_context(config_paths)?;
    init_tracing(&ctx.settings.log.level);
    tracing::debug!(config_hash = %ctx.config_hash, secrets = ?ctx.secrets, "config loaded");
    Ok(ctx)
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();
}
