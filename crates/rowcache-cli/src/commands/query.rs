use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use rowcache_core::{RowcacheConfig, StatementState};
use rowcache_service::{export_csv, ExportOptions, ReportService};
use rowcache_storage::MemoryKvStore;
use rowcache_upstream::{UpstreamClient, WarehouseClient};

pub struct QueryOptions {
    pub sql: String,
    /// CSV destination; stdout when `None`.
    pub output: Option<PathBuf>,
    pub sort: Option<String>,
    pub filter: Option<String>,
    pub scope: Option<String>,
    pub header: bool,
    pub bom: bool,
}

/// Submits the statement, waits for streaming to finish, and exports the rows.
pub async fn run_query(config: &RowcacheConfig, options: QueryOptions) -> Result<()> {
    let store = Arc::new(MemoryKvStore::new(config.cache.max_entries));
    let warehouse = WarehouseClient::new(&config.upstream).context("invalid upstream configuration")?;
    let upstream = UpstreamClient::new(Arc::new(warehouse), config.upstream.poll_interval());

    let mut service = ReportService::new(store, upstream, config);
    if let Some(scope) = options.scope {
        service = service.scoped(scope);
    }

    let statement_id = service
        .submit(&options.sql)
        .await
        .context("statement submission failed")?;

    while service.is_streaming(&statement_id) {
        tokio::time::sleep(config.pager.poll_interval()).await;
    }

    let meta = service.statement_meta(&statement_id).await?;
    if meta.state != StatementState::Succeeded {
        bail!("statement {statement_id} ended in state {}", meta.state);
    }
    info!(statement_id = %statement_id, rows = ?meta.row_count, "Statement finished");

    let out: Box<dyn Write> = match &options.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let export = ExportOptions {
        header: options.header,
        bom: options.bom,
        sort_json: options.sort,
        filter_json: options.filter,
    };
    let written = export_csv(&service, &statement_id, &export, out).await?;

    if let Some(path) = &options.output {
        eprintln!("Wrote {} rows to {}", written, path.display());
    }
    Ok(())
}
