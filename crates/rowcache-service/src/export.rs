//! CSV export of a statement's rows, read block by block through the pager.

use std::io::Write;
use tracing::{debug, info};

use rowcache_core::{CoreError, CoreResult};

use crate::report_service::ReportService;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Write the column names as the first record.
    pub header: bool,
    /// Prefix the output with a UTF-8 byte-order mark.
    pub bom: bool,
    pub sort_json: Option<String>,
    pub filter_json: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            header: true,
            bom: false,
            sort_json: None,
            filter_json: None,
        }
    }
}

fn csv_error(e: csv::Error) -> CoreError {
    CoreError::SerializationError(format!("csv: {e}"))
}

/// Writes every available row of `statement_id` to `out` and returns the number of data rows.
///
/// Blocks of one page are requested until a block comes back empty or the known row count
/// is reached. Records end with CRLF; fields are quoted only when needed.
pub async fn export_csv<W: Write>(
    service: &ReportService,
    statement_id: &str,
    options: &ExportOptions,
    mut out: W,
) -> CoreResult<u64> {
    if options.bom {
        out.write_all(UTF8_BOM)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .quote_style(csv::QuoteStyle::Necessary)
        .flexible(true)
        .from_writer(out);

    let meta = service.statement_meta(statement_id).await?;
    if options.header && !meta.columns.is_empty() {
        writer.write_record(&meta.columns).map_err(csv_error)?;
    }

    let page_size = if meta.page_size == 0 { service.page_size() } else { meta.page_size };
    let block = page_size as u64;
    let mut written = 0u64;
    loop {
        let page = service
            .get_rows_with_models(
                statement_id,
                written,
                written + block,
                options.sort_json.as_deref(),
                options.filter_json.as_deref(),
            )
            .await?;
        if page.is_empty() {
            break;
        }

        for row in &page.rows {
            writer
                .write_record(row.iter().map(|cell| cell.to_string()))
                .map_err(csv_error)?;
        }
        written += page.len() as u64;
        debug!(statement_id, rows = written, "Exported block");

        if page.last_row.is_some_and(|total| written >= total) {
            break;
        }
    }

    writer.flush()?;
    info!(statement_id, rows = written, "CSV export finished");
    Ok(written)
}
