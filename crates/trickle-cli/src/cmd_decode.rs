/// Implementation of `trickle decode`.
///
/// Streams the file through a [`ReaderSource`] into an
/// [`IncrementalDecodeTask`] backed by a [`PooledScheduler`], and prints
/// every outcome as it arrives.
///
/// # Output format
///
/// ```text
/// preview  64x48x1  rows 12/48
/// preview  64x48x1  rows 31/48
/// final    64x48x1  rows 48/48
/// ```
///
/// With `--json`, each line is an object instead:
///
/// ```text
/// {"kind":"preview","image":{"width":64,"height":48,"channels":1,"rows_decoded":12}}
/// {"kind":"final","image":{"width":64,"height":48,"channels":1,"rows_decoded":48}}
/// {"kind":"error","error":"decoding failed: decoder produced no artifact from the final buffer"}
/// ```
///
/// A terminal error is printed like any other outcome and then also
/// returned, so the process exits with code 1.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;
use trickle_decoder::{Image, PnmFactory};
use trickle_task::{
    IncrementalDecodeTask, LogHook, PooledScheduler, ReaderSource, SchedulerConfig, TaskConfig,
    spawn_task,
};
use trickle_types::{Outcome, RequestDescriptor};

use crate::DecodeArgs;

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Line<'a> {
    Preview { image: &'a Image },
    Final { image: &'a Image },
    Error { error: String },
}

/// Run the `trickle decode` command.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, the runtime cannot be
/// started, or the task ends with a decode or upstream failure.
pub fn run(args: &DecodeArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(decode(args))
}

async fn decode(args: &DecodeArgs) -> Result<()> {
    let file = tokio::fs::File::open(&args.file)
        .await
        .with_context(|| format!("cannot open {}", args.file.display()))?;

    let mut source = ReaderSource::new(file, args.chunk_size);
    if args.delay_ms > 0 {
        source = source.with_delay(Duration::from_millis(args.delay_ms));
    }

    let scheduler_config = args
        .concurrency
        .map_or_else(SchedulerConfig::default, |n| SchedulerConfig {
            max_concurrent_decodes: n,
        });
    let task_config = TaskConfig {
        progressive_decoding: !args.no_progressive,
    };

    let request = RequestDescriptor::new(format!("file://{}", args.file.display()));
    let (task, channels) = IncrementalDecodeTask::new(
        request,
        task_config,
        Arc::new(PnmFactory),
        Arc::new(PooledScheduler::new(&scheduler_config)),
    );
    let task = task.with_hook(Arc::new(LogHook));
    let mut handle = spawn_task(task, channels, &source);

    let mut failure = None;
    while let Some(outcome) = handle.next().await {
        let line = match &outcome {
            Outcome::Value {
                artifact,
                is_final: false,
            } => Line::Preview { image: artifact },
            Outcome::Value {
                artifact,
                is_final: true,
            } => Line::Final { image: artifact },
            Outcome::Error(err) => Line::Error {
                error: err.to_string(),
            },
        };
        print_line(&line, args.json)?;
        if let Outcome::Error(err) = outcome {
            failure = Some(err);
        }
    }

    if let Some(stats) = handle.join().await {
        debug!(?stats, "decode task finished");
    }

    match failure {
        Some(err) => Err(anyhow::Error::new(err).context(format!("{} failed", handle.request()))),
        None => Ok(()),
    }
}

fn print_line(line: &Line<'_>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(line).context("failed to encode outcome")?);
        return Ok(());
    }
    match line {
        Line::Preview { image } => println!("preview  {}", describe(image)),
        Line::Final { image } => println!("final    {}", describe(image)),
        Line::Error { error } => println!("error    {error}"),
    }
    Ok(())
}

fn describe(image: &Image) -> String {
    format!(
        "{}x{}x{}  rows {}/{}",
        image.width, image.height, image.channels, image.rows_decoded, image.height
    )
}
