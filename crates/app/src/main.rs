//! Demo: several request handlers sharing one store through a serial executor.
//!
//! Configure the queue with `SERIALQ_EXECUTOR`, e.g. `ledger;backlog=8;poll_ms=20;`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use tracing::{info, warn};

use serialq_config::{ConfigSource, ExecutorConfig};
use serialq_executor::{Context, SerialExecutor, spawn};

const CONFIG_KEY: &str = "SERIALQ_EXECUTOR";
const PRODUCERS: usize = 4;
const OPS_PER_PRODUCER: usize = 25;

/// Stand-in for the shared connection the queue protects. The mutex is never
/// contended: only the run loop touches it.
type Ledger = Arc<Mutex<BTreeMap<String, i64>>>;

fn main() -> Result<()> {
    serialq_observability::init();
    // A panic outside the queue leaves the ledger in an unknown state.
    serialq_observability::exit_on_panic("app", "serialq-app", run)
}

fn run() -> Result<()> {
    let config = ExecutorConfig::from_source(CONFIG_KEY, &ConfigSource::Env)
        .with_context(|| format!("invalid {CONFIG_KEY}"))?;
    info!(name = %config.name, backlog = config.backlog, "starting executor");

    let root = Context::new();
    let executor = Arc::new(SerialExecutor::from_config(&config));
    executor.initialize(&root)?;
    let handle = spawn(executor.clone()).context("failed to start run loop")?;

    let ledger: Ledger = Arc::default();
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let executor = executor.clone();
            let ledger = ledger.clone();
            thread::spawn(move || -> Result<usize> {
                let account = format!("account-{p}");
                let mut completed = 0;
                for _ in 0..OPS_PER_PRODUCER {
                    let ledger = ledger.clone();
                    let account = account.clone();
                    let done = executor.join_timeout(
                        &Context::new(),
                        Duration::from_secs(1),
                        move |_| {
                            let mut ledger = ledger.lock().unwrap_or_else(|e| e.into_inner());
                            *ledger.entry(account).or_default() += 1;
                        },
                    )?;
                    if done {
                        completed += 1;
                    } else {
                        warn!(producer = p, "operation skipped");
                    }
                }
                Ok(completed)
            })
        })
        .collect();

    let mut completed = 0;
    for producer in producers {
        completed += producer
            .join()
            .map_err(|_| anyhow!("producer thread panicked"))??;
    }

    handle.shutdown().context("failed to stop executor")?;

    let ledger = ledger.lock().unwrap_or_else(|e| e.into_inner());
    let summary = serde_json::json!({
        "completed": completed,
        "ledger": &*ledger,
        "stats": executor.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
