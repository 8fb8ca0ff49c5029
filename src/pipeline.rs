//! End-to-end export: collect, project, encode, verify, deliver.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collector::{PageSource, Paginator};
use crate::config::ExportOptions;
use crate::csv_encoder::RowAccumulator;
use crate::error::ExportError;
use crate::projector::{ExportSummary, Projectable, RecordKind, RecordProjector};
use crate::sink::{ExportPayload, OutputSink};
use crate::validation::validate_payload;

/// Outcome of a delivered export.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub filename: String,
    pub rows_written: usize,
    pub pages_fetched: u32,
    pub summary: ExportSummary,
    /// Where the sink put the file.
    pub location: String,
    /// Set when `partial_on_error` let a failed page through.
    pub partial_error: Option<ExportError>,
}

/// One configured export. Stateless between runs: exporting the same
/// record set twice produces byte-identical payloads.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    projector: RecordProjector,
    options: ExportOptions,
}

impl ExportPipeline {
    /// Builds a pipeline around `projector`. `options.strip_diacritics`,
    /// when set, overrides the projector's own setting.
    pub fn new(projector: RecordProjector, options: ExportOptions) -> Self {
        let projector = match options.strip_diacritics {
            Some(strip) => projector.with_strip_diacritics(strip),
            None => projector,
        };
        Self { projector, options }
    }

    /// Pipeline using the default output shape of `kind`.
    pub fn for_kind(kind: RecordKind, options: ExportOptions) -> Self {
        Self::new(RecordProjector::new(kind.default_shape()), options)
    }

    pub fn projector(&self) -> &RecordProjector {
        &self.projector
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Fetches every page of `source` and delivers one CSV to `sink`.
    ///
    /// # Errors
    ///
    /// - Any page source error, unless `partial_on_error` is set and at
    ///   least one page was collected
    /// - `ExportError::Cancelled` if `cancel` fires before delivery
    /// - `ExportError::MissingExpansion` for an unexpanded subscription
    /// - `ExportError::Encoding` if the payload fails verification or the
    ///   sink cannot write it
    ///
    /// The sink is never called when an error is returned.
    pub async fn export<S, K>(
        &self,
        source: &S,
        sink: &K,
        cancel: &CancellationToken,
    ) -> Result<ExportReport, ExportError>
    where
        S: PageSource,
        S::Item: Projectable,
        K: OutputSink + ?Sized,
    {
        self.export_collected(Paginator::new(source), sink, cancel)
            .await
    }

    /// Finishes a paginator the caller may already have pulled pages
    /// from, then exports everything it holds. Pages already pulled are
    /// not fetched again.
    ///
    /// # Errors
    ///
    /// Same as [`export`](Self::export).
    pub async fn export_collected<S, K>(
        &self,
        mut paginator: Paginator<'_, S>,
        sink: &K,
        cancel: &CancellationToken,
    ) -> Result<ExportReport, ExportError>
    where
        S: PageSource,
        S::Item: Projectable,
        K: OutputSink + ?Sized,
    {
        let mut partial_error = None;

        loop {
            if cancel.is_cancelled() {
                info!("[EXPORT] Cancelled after {} pages", paginator.pages_fetched());
                return Err(ExportError::Cancelled);
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("[EXPORT] Cancelled while a page was in flight");
                    return Err(ExportError::Cancelled);
                }
                result = paginator.next_page() => result.map(|page| page.is_some()),
            };

            match next {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) if self.options.partial_on_error && paginator.pages_fetched() > 0 => {
                    warn!(
                        "[EXPORT] Page fetch failed, exporting {} collected records",
                        paginator.items().len()
                    );
                    partial_error = Some(e);
                    break;
                }
                Err(e) => {
                    error!("[EXPORT] Page fetch failed: {}", e);
                    return Err(e);
                }
            }
        }

        let pages_fetched = paginator.pages_fetched();
        let records = paginator.into_items();

        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        let mut report = self.export_records(&records, sink).await?;
        report.pages_fetched = pages_fetched;
        report.partial_error = partial_error;
        Ok(report)
    }

    /// Exports an already materialized record set.
    ///
    /// # Errors
    ///
    /// `ExportError::MissingExpansion` or `ExportError::Encoding`, see
    /// [`export`](Self::export).
    pub async fn export_records<R, K>(&self, records: &[R], sink: &K) -> Result<ExportReport, ExportError>
    where
        R: Projectable,
        K: OutputSink + ?Sized,
    {
        let filename = self
            .options
            .filename
            .clone()
            .unwrap_or_else(|| R::KIND.default_filename().to_string());
        let summary = ExportSummary::from_records(records);

        let (content, rows_written) = self.encode(records)?;

        info!(
            "[EXPORT] Encoded {} rows ({} bytes) as {:?}",
            rows_written,
            content.len(),
            self.projector.shape()
        );

        let location = sink.deliver(ExportPayload::csv(filename.clone(), content)).await?;

        Ok(ExportReport {
            filename,
            rows_written,
            pages_fetched: 0,
            summary,
            location,
            partial_error: None,
        })
    }

    /// Projects and encodes `records` without delivering them.
    ///
    /// # Errors
    ///
    /// See [`export_records`](Self::export_records).
    pub fn encode<R: Projectable>(&self, records: &[R]) -> Result<(Vec<u8>, usize), ExportError> {
        let headers = self.projector.headers();
        let mut accumulator = RowAccumulator::new(headers)?;

        for record in records {
            if self.options.exclude_canceled && !record.counts_toward_export() {
                continue;
            }
            let row = self.projector.project(record)?;
            accumulator.push_row(row.fields())?;
        }

        let rows_written = accumulator.rows();
        let content = accumulator.finish()?;

        if self.options.verify_output {
            let validation = validate_payload(&content, headers);
            if !validation.ok {
                error!(
                    "[EXPORT] Payload failed verification with {} errors",
                    validation.errors.len()
                );
                return Err(ExportError::Encoding(format!(
                    "Encoded payload failed verification: {:?}",
                    validation.errors[0]
                )));
            }
        }

        Ok((content, rows_written))
    }
}
