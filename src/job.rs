use anyhow::{anyhow, Result};
use futures::future::{join_all, BoxFuture};
use tracing::{error, info};

use crate::collector::Collector;
use crate::config::Config;
use crate::helium;
use crate::price;
use crate::sink::{ConsoleSink, InfluxSink, Sink};

/// Runs one scheduled invocation of the exporter.
///
/// The sink is opened before the collection batch and closed on every
/// exit path, including early collection failures.
pub async fn run(cfg: Config) -> Result<String> {
    if cfg.debug_to_console {
        run_with_sink(&cfg, ConsoleSink).await
    } else {
        let sink = InfluxSink::new(&cfg.influx)?;
        run_with_sink(&cfg, sink).await
    }
}

async fn run_with_sink<S: Sink>(cfg: &Config, sink: S) -> Result<String> {
    let api = helium::Client::new(&cfg.helium)?;
    let price = price::Client::new(&cfg.price)?;

    sink.open()?;

    let collector = Collector::new(cfg, &api, &price, &sink);
    // Currently a single task; the settle-all layer keeps room for more.
    let tasks: Vec<(&'static str, BoxFuture<'_, Result<String>>)> =
        vec![("Helium", Box::pin(collector.run()))];

    let outcome = settle_named_tasks(tasks).await;
    let closed = sink.close().await;

    let summary = outcome?;
    closed?;
    Ok(summary)
}

/// Awaits all named tasks with settle-all semantics: every task's outcome
/// is observed and logged regardless of the others. The first failing
/// task's error becomes the job's error.
pub async fn settle_named_tasks(
    tasks: Vec<(&'static str, BoxFuture<'_, Result<String>>)>,
) -> Result<String> {
    let (names, futures): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    let results = join_all(futures).await;

    let mut first_failure: Option<anyhow::Error> = None;

    for (name, result) in names.into_iter().zip(results) {
        match result {
            Ok(summary) => info!(task = name, %summary, "task succeeded"),
            Err(err) => {
                let chain = format!("{err:#}");
                error!(task = name, error = %chain, "task failed");
                if first_failure.is_none() {
                    first_failure = Some(anyhow!("{name}: {err:#}"));
                }
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok("Done".to_string()),
    }
}
