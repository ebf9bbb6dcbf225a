use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use rowcache_core::RowcacheConfig;

mod commands;

use commands::query::{run_query, QueryOptions};

#[derive(Parser, Debug)]
#[command(name = "rowcache")]
#[command(about = "Run a statement on the SQL warehouse and export its cached rows", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ROWCACHE_CONFIG / ./config/rowcache / /etc/rowcache/rowcache)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a statement and export its rows as CSV
    Query {
        /// SQL text to run
        #[arg(long, conflicts_with = "sql_file", required_unless_present = "sql_file")]
        sql: Option<String>,

        /// File containing the SQL text
        #[arg(long)]
        sql_file: Option<PathBuf>,

        /// Output CSV path (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Sort model JSON, e.g. [{"colId":"amount","sort":"desc"}]
        #[arg(long)]
        sort: Option<String>,

        /// Filter model JSON, e.g. {"amount":{"filterType":"number","type":"greaterThan","filter":"100"}}
        #[arg(long)]
        filter: Option<String>,

        /// Cache scope (defaults to cache.scope)
        #[arg(long, env = "ROWCACHE_SCOPE")]
        scope: Option<String>,

        /// Omit the header row
        #[arg(long)]
        no_header: bool,

        /// Prefix the output with a UTF-8 byte-order mark
        #[arg(long)]
        bom: bool,

        /// Print Prometheus metrics to stderr when done
        #[arg(long)]
        print_metrics: bool,
    },

    /// Print the effective configuration (token redacted)
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RowcacheConfig::from_file(path)?,
        None => RowcacheConfig::load()?,
    };
    init_logging(&config.logging.level);

    match cli.command {
        Commands::Query {
            sql,
            sql_file,
            output,
            sort,
            filter,
            scope,
            no_header,
            bom,
            print_metrics,
        } => {
            let sql = match (sql, sql_file) {
                (Some(sql), _) => sql,
                (None, Some(path)) => std::fs::read_to_string(&path)?,
                (None, None) => anyhow::bail!("either --sql or --sql-file is required"),
            };

            run_query(
                &config,
                QueryOptions {
                    sql,
                    output,
                    sort,
                    filter,
                    scope,
                    header: !no_header,
                    bom,
                },
            )
            .await?;

            if print_metrics {
                eprintln!("{}", rowcache_service::metrics::export_prometheus());
            }
            Ok(())
        }

        Commands::ShowConfig => {
            let mut shown = config.clone();
            if !shown.upstream.token.is_empty() {
                shown.upstream.token = "***".to_string();
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
            Ok(())
        }
    }
}

/// Logs go to stderr so CSV on stdout stays clean.
fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
