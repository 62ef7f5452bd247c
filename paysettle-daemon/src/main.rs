mod app;
mod cli;
mod inbox;

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::NaiveDate;
use clap::Parser;
use log::{error, info, warn};
use serde_json::json;
use tokio::sync::broadcast;

use paysettle::invoice::{parse_run_at, InvoiceScheduler};
use paysettle::payments::{NewPaymentRequest, PaymentError};
use paysettle::telemetry::init_logging;
use paysettle::worker::WorkerPool;
use paysettle::{load_config, PaysettleError, Result};

use app::App;
use cli::{Cli, Command};
use inbox::Inbox;

const EXIT_FAILURE: u8 = 1;
const EXIT_INVALID_INPUT: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("paysettle: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    if let Err(e) = init_logging(config.logging.format, &config.logging.level) {
        eprintln!("paysettle: {}", e);
        return ExitCode::from(EXIT_FAILURE);
    }

    info!("Starting paysettle v{}", env!("CARGO_PKG_VERSION"));

    let result = App::open(config).and_then(|app| match cli.command {
        Command::Run { inbox, poll_secs } => {
            run_service(&app, inbox.as_deref(), Duration::from_secs(poll_secs.max(1)))
        }
        Command::Ingest { files } => ingest_files(&app, &files),
        Command::Invoice { date } => invoice_once(&app, date),
        Command::Record { json } => record_payment(&app, json),
        Command::List { page, per_page } => list_payments(&app, page, per_page),
    });

    match result {
        Ok(code) => code,
        Err(PaysettleError::Payment(PaymentError::Validation { errors })) => {
            for message in errors {
                eprintln!("paysettle: {}", message);
            }
            ExitCode::from(EXIT_INVALID_INPUT)
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("paysettle: {}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Uploads each file and waits for its ingestion result.
fn ingest_files(app: &App, files: &[std::path::PathBuf]) -> Result<ExitCode> {
    let pool = WorkerPool::new(app.pipeline()?, app.config.worker_count)?;
    let uploads = app.upload_service(Arc::new(pool.submitter()));
    let mut failed = false;

    // Results are drained per chunk so the bounded queues never fill up.
    for chunk in files.chunks(app.config.worker_count) {
        let mut queued = 0;
        for path in chunk {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let accepted = std::fs::read(path)
                .map_err(PaysettleError::from)
                .and_then(|bytes| Ok(uploads.accept(&name, None, &bytes)?));

            match accepted {
                Ok(receipt) => {
                    print_json(&json!({ "file": name, "receipt": receipt }))?;
                    queued += 1;
                }
                Err(e) => {
                    failed = true;
                    print_json(&json!({ "file": name, "error": e.to_string() }))?;
                }
            }
        }

        for _ in 0..queued {
            let Some(result) = pool.recv_result() else {
                return Err(paysettle::WorkerError::ChannelClosed.into());
            };
            failed |= !result.success;
            print_json(&json!({
                "file_id": result.file_id,
                "success": result.success,
                "summary": result.summary,
                "error": result.error,
            }))?;
        }
    }

    drop(uploads);
    pool.shutdown();
    pool.wait();

    Ok(if failed {
        ExitCode::from(EXIT_FAILURE)
    } else {
        ExitCode::SUCCESS
    })
}

fn invoice_once(app: &App, date: Option<NaiveDate>) -> Result<ExitCode> {
    let job = app.invoice_job()?;
    let report = runtime()?.block_on(async {
        match date {
            Some(date) => job.run_for(date).await,
            None => job.run().await,
        }
    })?;

    print_json(&report)?;
    Ok(if report.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILURE)
    })
}

fn record_payment(app: &App, body: Option<String>) -> Result<ExitCode> {
    let body = match body {
        Some(body) => body,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let request: NewPaymentRequest = serde_json::from_str(&body)?;

    let payment = app.payment_service().record(&request)?;
    print_json(&payment)?;
    Ok(ExitCode::SUCCESS)
}

fn list_payments(app: &App, page: u32, per_page: Option<u32>) -> Result<ExitCode> {
    let page = app.payment_service().list(page, per_page)?;
    print_json(&page)?;
    Ok(ExitCode::SUCCESS)
}

/// Runs the invoice schedule and the optional inbox until SIGINT/SIGTERM.
fn run_service(app: &App, inbox_dir: Option<&Path>, poll_interval: Duration) -> Result<ExitCode> {
    let run_at = parse_run_at(&app.config.invoice.run_at)?;
    let inbox = inbox_dir.map(Inbox::new).transpose()?;
    let pool = Arc::new(WorkerPool::new(app.pipeline()?, app.config.worker_count)?);
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut threads: Vec<JoinHandle<()>> = Vec::new();

    // Consume ingestion results so workers never block on a full queue
    {
        let pool = Arc::clone(&pool);
        let shutdown = Arc::clone(&shutdown);
        threads.push(std::thread::spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                match pool.try_recv_result() {
                    Some(result) if result.success => {
                        let persisted = result.summary.map(|s| s.persisted).unwrap_or(0);
                        info!("File {} ingested, {} payments saved", result.file_id, persisted);
                    }
                    Some(result) => {
                        warn!("File {} failed: {:?}", result.file_id, result.error);
                    }
                    None => std::thread::sleep(Duration::from_millis(100)),
                }
            }
            info!("Result consumer shutting down");
        }));
    }

    if let Some(inbox) = inbox {
        let uploads = app.upload_service(Arc::new(pool.submitter()));
        let shutdown = Arc::clone(&shutdown);

        threads.push(std::thread::spawn(move || {
            if let Err(e) = inbox.watch(&uploads, poll_interval, shutdown) {
                error!("Inbox watcher stopped: {}", e);
            }
        }));
    }

    let scheduler = InvoiceScheduler::new(app.invoice_job()?, run_at, Arc::clone(&app.clock));
    let (trigger_tx, trigger_rx) = broadcast::channel::<()>(4);
    let scheduler_handle = scheduler.start(trigger_rx)?;
    info!("Invoice run scheduled daily at {} UTC", run_at.format("%H:%M"));

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .map_err(|e| std::io::Error::other(e.to_string()))?;

    let _ = stop_rx.recv();
    info!("Shutdown requested");

    scheduler.stop();
    let _ = trigger_tx.send(());
    if scheduler_handle.join().is_err() {
        error!("Invoice scheduler thread panicked");
    }

    shutdown.store(true, Ordering::Relaxed);
    pool.shutdown();
    for handle in threads {
        if handle.join().is_err() {
            error!("Background thread panicked");
        }
    }

    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.wait(),
        Err(_) => warn!("Worker pool still shared at shutdown, not waiting for workers"),
    }

    info!("paysettle stopped");
    Ok(ExitCode::SUCCESS)
}
