use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::clock::Clock;
use crate::db::PaymentStore;
use crate::notify::Notifier;
use crate::rates::ExchangeRates;
use crate::row::{clean, validate, Header, SkipReason, Verdict};
use crate::worker::job::IngestJob;

use super::batch::{BatchPersister, EnrichedRow};
use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{IngestPhase, ProgressEvent, ProgressReporter};
use super::summary::IngestionSummary;

/// Ingests one uploaded CSV file.
pub struct IngestionPipeline {
    config: PipelineConfig,
    rates: Arc<ExchangeRates>,
    persister: BatchPersister,
    notifier: Arc<dyn Notifier>,
}

impl IngestionPipeline {
    pub fn new(
        config: PipelineConfig,
        rates: Arc<ExchangeRates>,
        store: Arc<dyn PaymentStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let persister = BatchPersister::new(store, clock, config.deduplicate_references);
        Self {
            config,
            rates,
            persister,
            notifier,
        }
    }

    /// Runs the whole pipeline for `job`.
    ///
    /// Row problems end up in the summary. Only a rate outage with no
    /// cached fallback, a storage outage, or unreadable CSV framing fail
    /// the run; batches flushed before the failure stay written.
    pub async fn run(
        &self,
        job: IngestJob,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestionSummary, PipelineError> {
        let span = info_span!("ingest",
            job_id = %job.id,
            file_id = %job.file_id,
            source_name = job.source_name.as_deref().unwrap_or("unknown"),
        );
        let mut ctx = PipelineContext::new(job, self.config.error_sample_limit);

        match self.execute(&mut ctx, progress).instrument(span).await {
            Ok(()) => Ok(ctx.summary),
            Err(e) => {
                error!(file_id = %ctx.job.file_id, error = %e, "Ingestion failed");
                progress.report(ProgressEvent::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        report_phase(progress, IngestPhase::Start, "Ingestion started");

        // Step 1: Refresh exchange rates
        let table = self
            .rates
            .refresh()
            .instrument(info_span!("refresh_rates"))
            .await?;
        // One snapshot per run, so every row converts at the same rates
        ctx.rates = Some(table);
        report_phase(progress, IngestPhase::RatesRefreshed, "Exchange rates ready");

        // Step 2+3: Split lines and read the header
        {
            let _step = info_span!("parse").entered();
            self.step_parse(ctx)?;
        }
        if ctx.header.is_none() {
            warn!("CSV content appears empty, nothing to ingest");
            ctx.summary.elapsed = ctx.started.elapsed();
            report_phase(progress, IngestPhase::Done, "Empty file");
            return Ok(());
        }
        report_phase(
            progress,
            IngestPhase::Parsed,
            &format!("{} data rows", ctx.lines.len().saturating_sub(1)),
        );

        // Step 4: Clean, validate, enrich and batch every row
        {
            let _step = info_span!("rows").entered();
            report_phase(progress, IngestPhase::RowLoop, "Processing rows");
            self.step_rows(ctx, progress)?;
        }

        // Step 5: Flush the last partial batch
        {
            let _step = info_span!("final_flush").entered();
            self.flush(ctx, progress)?;
            report_phase(
                progress,
                IngestPhase::BatchesFlushed,
                &format!("{} batches flushed", ctx.batches_flushed),
            );
        }

        // Step 6: Summarize
        self.step_summarize(ctx);
        report_phase(progress, IngestPhase::Summarized, "Summary recorded");

        // Step 7: Alert (best effort)
        if ctx.summary.processed > self.config.alert_threshold {
            self.notifier
                .notify(&ctx.summary.digest())
                .instrument(info_span!("alert"))
                .await;
            report_phase(progress, IngestPhase::Alerted, "Digest sent");
        }

        report_phase(progress, IngestPhase::Done, "Ingestion finished");
        Ok(())
    }

    fn step_parse(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let normalized = ctx
            .job
            .content
            .trim_start_matches('\u{feff}')
            .replace("\r\n", "\n")
            .replace('\r', "\n");

        ctx.lines = normalized
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let Some(first) = ctx.lines.first() else {
            return Ok(());
        };
        let record = parse_line(first).map_err(|reason| PipelineError::MalformedCsv {
            line: 1,
            reason,
        })?;
        let header = Header::from_record(&record);
        debug!(columns = header.width(), "Header parsed");
        ctx.header = Some(header);
        Ok(())
    }

    fn step_rows(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        let (Some(header), Some(rates)) = (ctx.header.clone(), ctx.rates.clone()) else {
            return Ok(());
        };
        let lines = std::mem::take(&mut ctx.lines);

        for (row_number, line) in lines.iter().enumerate().skip(1) {
            ctx.summary.total_rows += 1;

            let record = parse_line(line).map_err(|reason| PipelineError::MalformedCsv {
                line: row_number + 1,
                reason,
            })?;

            if record.len() < header.width() {
                let reason = SkipReason::MissingColumns {
                    expected: header.width(),
                    found: record.len(),
                };
                warn!(row = row_number, found = record.len(), "Skipping row: missing columns");
                ctx.summary.record_skip(row_number, &reason, line);
                continue;
            }

            let cleaned = clean(&header.row(&record));
            let valid = match validate(&cleaned) {
                Verdict::Accepted(valid) => valid,
                Verdict::Skipped(reason) => {
                    debug!(row = row_number, reason = %reason, "Skipping row");
                    ctx.summary.record_skip(row_number, &reason, line);
                    continue;
                }
            };

            let Some(rate) = rates.rate(&valid.currency) else {
                let reason = SkipReason::NoExchangeRate {
                    code: valid.currency.clone(),
                };
                warn!(row = row_number, reason = %reason, "Skipping row");
                ctx.summary.record_skip(row_number, &reason, line);
                continue;
            };

            let Some(enriched) = EnrichedRow::enrich(valid, rate, &ctx.job.file_id) else {
                let reason = SkipReason::AmountOutOfRange;
                warn!(row = row_number, reason = %reason, "Skipping row");
                ctx.summary.record_skip(row_number, &reason, line);
                continue;
            };
            ctx.pending.push(enriched);

            if ctx.pending.len() >= self.config.batch_size {
                self.flush(ctx, progress)?;
            }
        }

        ctx.lines = lines;
        Ok(())
    }

    fn flush(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        if ctx.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut ctx.pending);
        let batch_number = ctx.batches_flushed + 1;

        let outcome = self.persister.persist(&batch, batch_number)?;

        ctx.batches_flushed = batch_number;
        ctx.summary.batches = batch_number;
        ctx.summary.processed += outcome.size as u64;
        ctx.summary.persisted += outcome.written as u64;
        ctx.summary.failed += outcome.failed() as u64;
        ctx.summary.duplicates += outcome.duplicates() as u64;

        progress.report(ProgressEvent::BatchFlushed {
            batch_number,
            size: outcome.size,
            written: outcome.written,
        });
        Ok(())
    }

    fn step_summarize(&self, ctx: &mut PipelineContext) {
        ctx.summary.elapsed = ctx.started.elapsed();
        let summary = &ctx.summary;
        let errors = serde_json::to_string(&summary.errors).unwrap_or_default();

        info!(
            file_id = %summary.file_id,
            total_rows = summary.total_rows,
            processed = summary.processed,
            skipped = summary.skipped,
            persisted = summary.persisted,
            failed = summary.failed,
            duplicates = summary.duplicates,
            batches = summary.batches,
            elapsed_secs = summary.elapsed_secs(),
            errors = %errors,
            "CSV ingestion summary"
        );
    }
}

/// Parses one line with standard CSV quoting.
fn parse_line(line: &str) -> Result<StringRecord, String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => Ok(record),
        Ok(false) => Err("no fields".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn report_phase(progress: &dyn ProgressReporter, phase: IngestPhase, message: &str) {
    progress.report(ProgressEvent::Phase {
        phase,
        message: message.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{payment_repo, Database, PaymentFilter};
    use crate::pipeline::progress::RecordingProgress;
    use crate::testing::{self, usd_lkr, RecordingNotifier};
    use crate::rates::RateTable;
    use rust_decimal_macros::dec;

    const HEADER: &str = "customer_email,reference_no,date_time,currency,amount";

    struct Harness {
        db: Database,
        notifier: Arc<RecordingNotifier>,
        pipeline: IngestionPipeline,
    }

    fn harness(config: PipelineConfig, rates: Option<RateTable>) -> Harness {
        let db = Database::open_in_memory().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = testing::pipeline(&db, config, rates, notifier.clone());
        Harness {
            db,
            notifier,
            pipeline,
        }
    }

    fn payments(db: &Database) -> Vec<crate::model::Payment> {
        payment_repo::query(db, &PaymentFilter::default()).unwrap().0
    }

    #[tokio::test]
    async fn test_one_valid_and_one_missing_amount() {
        let h = harness(PipelineConfig::default(), Some(usd_lkr()));
        let content = format!(
            "{HEADER}\na@x.com,R1,2025-06-01 10:00:00,LKR,100\nb@x.com,R2,2025-06-01 10:00:00,USD,\n"
        );

        let summary = h
            .pipeline
            .run(IngestJob::new("file-1", content), &RecordingProgress::new())
            .await
            .unwrap();

        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors[0].message, "missing field amount");
        assert_eq!(summary.errors[0].row_number, 2);
    }

    #[tokio::test]
    async fn test_enrichment_converts_to_usd() {
        let h = harness(PipelineConfig::default(), Some(usd_lkr()));
        let content = format!("{HEADER}\na@x.com,R1,2025-06-01 10:00:00,LKR,100\n");

        h.pipeline
            .run(IngestJob::new("file-1", content), &RecordingProgress::new())
            .await
            .unwrap();

        let stored = payments(&h.db);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].exchange_rate, dec!(300.0));
        assert_eq!(stored[0].usd_amount, dec!(30000.0));
        assert_eq!(stored[0].file_id.as_deref(), Some("file-1"));
        assert!(!stored[0].processed);
    }

    #[tokio::test]
    async fn test_batches_flush_at_capacity_and_at_end() {
        let config = PipelineConfig {
            batch_size: 2,
            ..PipelineConfig::default()
        };
        let h = harness(config, Some(usd_lkr()));
        let mut content = format!("{HEADER}\n");
        for n in 1..=5 {
            content.push_str(&format!("a@x.com,R{n},2025-06-01,USD,10\n"));
        }
        let progress = RecordingProgress::new();

        let summary = h
            .pipeline
            .run(IngestJob::new("file-1", content), &progress)
            .await
            .unwrap();

        assert_eq!(progress.batch_sizes(), vec![2, 2, 1]);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.processed, 5);
        assert_eq!(payments(&h.db).len(), 5);
    }

    #[tokio::test]
    async fn test_phases_run_in_order() {
        let h = harness(PipelineConfig::default(), Some(usd_lkr()));
        let content = format!("{HEADER}\na@x.com,R1,2025-06-01,USD,10\n");
        let progress = RecordingProgress::new();

        h.pipeline
            .run(IngestJob::new("file-1", content), &progress)
            .await
            .unwrap();

        assert_eq!(
            progress.phases(),
            vec![
                IngestPhase::Start,
                IngestPhase::RatesRefreshed,
                IngestPhase::Parsed,
                IngestPhase::RowLoop,
                IngestPhase::BatchesFlushed,
                IngestPhase::Summarized,
                IngestPhase::Alerted,
                IngestPhase::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_columns_row_is_skipped_and_run_continues() {
        let h = harness(PipelineConfig::default(), Some(usd_lkr()));
        let content = format!(
            "{HEADER}\na@x.com,R1,2025-06-01\nb@x.com,R2,2025-06-01,USD,5\n"
        );

        let summary = h
            .pipeline
            .run(IngestJob::new("file-1", content), &RecordingProgress::new())
            .await
            .unwrap();

        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.errors[0].message, "missing columns");
    }

    #[tokio::test]
    async fn test_crlf_blank_lines_and_quoting() {
        let h = harness(PipelineConfig::default(), Some(usd_lkr()));
        let content = format!(
            "\u{feff}{HEADER}\r\n\r\na@x.com,R1,2025-06-01,LKR,\"1,000\"\r\n   \rb@x.com,R2,01/06/2025 09:00:00,USD,2\r"
        );

        let summary = h
            .pipeline
            .run(IngestJob::new("file-1", content), &RecordingProgress::new())
            .await
            .unwrap();

        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.processed, 2);
        let stored = payments(&h.db);
        let r1 = stored.iter().find(|p| p.reference_no == "R1").unwrap();
        assert_eq!(r1.amount, dec!(1000));
        assert_eq!(r1.usd_amount, dec!(300000));
    }

    #[tokio::test]
    async fn test_currency_without_rate_is_skipped() {
        let h = harness(PipelineConfig::default(), Some(usd_lkr()));
        let content = format!("{HEADER}\na@x.com,R1,2025-06-01,HKD,10\n");

        let summary = h
            .pipeline
            .run(IngestJob::new("file-1", content), &RecordingProgress::new())
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors[0].message, "no exchange rate for HKD");
        assert!(payments(&h.db).is_empty());
    }

    #[tokio::test]
    async fn test_unconvertible_amount_is_skipped_and_run_continues() {
        let h = harness(PipelineConfig::default(), Some(usd_lkr()));
        let content = format!(
            "{HEADER}\na@x.com,R1,2025-06-01,LKR,79228162514264337593543950335\nb@x.com,R2,2025-06-01,USD,5\n"
        );

        let summary = h
            .pipeline
            .run(IngestJob::new("file-1", content), &RecordingProgress::new())
            .await
            .unwrap();

        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.errors[0].message, "amount out of range");
        let stored = payments(&h.db);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].reference_no, "R2");
    }

    #[tokio::test]
    async fn test_empty_file_is_a_no_op() {
        let h = harness(PipelineConfig::default(), Some(usd_lkr()));

        let summary = h
            .pipeline
            .run(IngestJob::new("file-1", "\r\n  \n"), &RecordingProgress::new())
            .await
            .unwrap();

        assert_eq!(summary.total_rows, 0);
        assert_eq!(summary.processed, 0);
        assert!(h.notifier.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_outage_without_cache_fails_run() {
        let h = harness(PipelineConfig::default(), None);
        let content = format!("{HEADER}\na@x.com,R1,2025-06-01,USD,10\n");
        let progress = RecordingProgress::new();

        let err = h
            .pipeline
            .run(IngestJob::new("file-1", content), &progress)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Rates(_)));
        assert!(payments(&h.db).is_empty());
        assert!(matches!(
            progress.events().last(),
            Some(ProgressEvent::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_alert_sent_only_above_threshold() {
        let config = PipelineConfig {
            alert_threshold: 2,
            ..PipelineConfig::default()
        };
        let h = harness(config, Some(usd_lkr()));

        let two = format!("{HEADER}\na@x.com,R1,2025-06-01,USD,1\na@x.com,R2,2025-06-01,USD,1\n");
        h.pipeline
            .run(IngestJob::new("file-1", two), &RecordingProgress::new())
            .await
            .unwrap();
        assert!(h.notifier.messages.lock().unwrap().is_empty());

        let three = format!(
            "{HEADER}\na@x.com,R1,2025-06-01,USD,1\na@x.com,R2,2025-06-01,USD,1\na@x.com,R3,2025-06-01,USD,1\n"
        );
        h.pipeline
            .run(IngestJob::new("file-2", three), &RecordingProgress::new())
            .await
            .unwrap();
        let messages = h.notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("file-2"));
        assert!(messages[0].contains("3 of 3 rows processed"));
    }
}
