use batch_ingest::config::cli::LogFormat;
use batch_ingest::utils::{logger, validation::Validate};
use batch_ingest::{
    BatchReader, CliConfig, DiscardSink, EtlError, LogProgress, Orchestrator, RecordSink,
    Result, RunConfig, RunSummary, SqlSink,
};
use clap::{error::ErrorKind, Parser};
use std::fs::File;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match CliConfig::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    match cli.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    tracing::info!("🚀 Starting batch-ingest");

    let config = match cli.resolve().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(e) => {
            report_fatal(&e);
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(
        "Run config: batch_size={}, max_workers={}, mode={}, table={}, dry_run={}",
        config.batch_size,
        config.max_workers,
        config.mode,
        config.table,
        config.dry_run
    );

    let summary = match run(&cli, &config).await {
        Ok(summary) => summary,
        Err(e) => {
            report_fatal(&e);
            return ExitCode::FAILURE;
        }
    };

    report(&summary, config.max_error_lines);

    if let Some(path) = &cli.summary_json {
        if let Err(e) = write_summary(&summary, path) {
            report_fatal(&e);
            return ExitCode::FAILURE;
        }
        tracing::info!("📁 Summary saved to: {}", path.display());
    }

    if summary.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run(cli: &CliConfig, config: &RunConfig) -> Result<RunSummary> {
    // The source is checked before the store is touched.
    let reader = BatchReader::open(&cli.input, config.batch_size)?;

    if config.dry_run {
        tracing::info!("🔍 DRY RUN MODE - records are validated and transformed but not stored");
        return process(Arc::new(DiscardSink), reader, config).await;
    }

    let sink = Arc::new(SqlSink::connect_lazy(config)?);
    if config.create_table {
        if let Err(e) = sink.ensure_schema().await {
            sink.close().await;
            return Err(e);
        }
    }

    let result = process(sink.clone(), reader, config).await;
    sink.close().await;
    result
}

async fn process(
    sink: Arc<dyn RecordSink>,
    reader: BatchReader<File>,
    config: &RunConfig,
) -> Result<RunSummary> {
    let mut orchestrator = Orchestrator::new(sink, Arc::new(LogProgress::new()), config);
    orchestrator.run_reader(reader).await
}

fn report(summary: &RunSummary, max_error_lines: usize) {
    if summary.success() {
        tracing::info!("✅ Processing completed successfully!");
        tracing::info!("  Records processed: {}", summary.processed);
    } else {
        tracing::warn!("⚠️ Processing completed with errors");
        tracing::warn!("  Records processed: {}", summary.processed);
        tracing::warn!("  Records failed: {}", summary.failed);

        let (shown, omitted) = summary.error_sample(max_error_lines);
        if !shown.is_empty() {
            tracing::error!("Errors encountered:");
            for error in shown {
                tracing::error!("  - {}", error);
            }
            if omitted > 0 {
                tracing::error!("  ... and {} more", omitted);
            }
        }
    }
    tracing::info!("  Duration: {:?}", summary.duration());

    println!(
        "{} {} processed, {} failed ({} batches)",
        if summary.success() { "✅" } else { "⚠️" },
        summary.processed,
        summary.failed,
        summary.batches_completed
    );
}

fn write_summary(summary: &RunSummary, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn report_fatal(e: &EtlError) {
    tracing::error!(
        "❌ Run aborted: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
}
