use core::time::Duration;
use std::{
    collections::HashSet,
    io::{BufWriter, Write},
    sync::Arc,
    thread,
    time::Instant,
};

use anyhow::{anyhow, bail};
use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use zsid::{
    MonotonicClock, RandomWorkerIdProvider, Registry, SequentialWorkerIdProvider, SystemClock,
    TimeSource, TimeoutWorkerIdProvider, WorkerIdProvider,
};

use crate::config::{AppConfig, ClockKind, Command, WorkerIdSource};

/// Clock shared by every generator of the registry.
pub type Clock = Arc<dyn TimeSource + Send + Sync>;

/// Worker id source, bounded by the configured assignment timeout.
pub type Provider = TimeoutWorkerIdProvider<Box<dyn WorkerIdProvider>>;

pub type AppRegistry = Registry<Provider, Clock>;

pub fn build_registry(config: &AppConfig) -> anyhow::Result<AppRegistry> {
    let ids: Box<dyn WorkerIdProvider> = match config.worker_ids {
        WorkerIdSource::Sequential => Box::new(SequentialWorkerIdProvider::new(
            config.worker_id_start,
            config.worker_id_max,
        )),
        WorkerIdSource::Random => Box::new(RandomWorkerIdProvider::new(config.worker_id_max)),
    };

    let clock: Clock = match config.clock {
        ClockKind::Monotonic => Arc::new(MonotonicClock::with_epoch(config.epoch)),
        ClockKind::System => Arc::new(SystemClock::with_epoch(config.epoch)),
    };

    let provider = TimeoutWorkerIdProvider::new(ids, config.assign_timeout);
    Ok(Registry::new(config.registry.clone(), provider, clock)?)
}

pub fn run(registry: &AppRegistry, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Next { domain, count } => next(registry, &domain, count),
        Command::Decode { domain, uid } => decode(registry, &domain, uid),
        Command::Stress {
            threads,
            per_thread,
            refresh_every,
        } => stress(
            registry,
            threads,
            per_thread,
            refresh_every.map(Duration::from_millis),
        ),
    }
}

fn next(registry: &AppRegistry, domain: &str, count: usize) -> anyhow::Result<()> {
    let mut out = BufWriter::new(std::io::stdout().lock());
    for _ in 0..count {
        writeln!(out, "{}", registry.next_id(domain)?)?;
    }
    out.flush()?;
    Ok(())
}

fn decode(registry: &AppRegistry, domain: &str, uid: u64) -> anyhow::Result<()> {
    let fields = registry.decode_id(domain, uid)?;
    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}

fn stress(
    registry: &AppRegistry,
    threads: usize,
    per_thread: usize,
    refresh_every: Option<Duration>,
) -> anyhow::Result<()> {
    let domains: Vec<&str> = registry.config().domains().map(|(key, _)| key).collect();
    let done = AtomicBool::new(false);
    let refreshes = AtomicU64::new(0);

    tracing::info!(
        threads,
        per_thread,
        ?refresh_every,
        ?domains,
        "starting stress run"
    );

    let start = Instant::now();
    let (batches, refreshed) = thread::scope(|s| {
        let refresher = refresh_every.map(|period| {
            let (done, refreshes) = (&done, &refreshes);
            s.spawn(move || -> zsid::Result<()> {
                while !done.load(Ordering::Acquire) {
                    thread::sleep(period);
                    registry.refresh_all()?;
                    refreshes.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            })
        });

        let workers: Vec<_> = (0..threads)
            .map(|i| {
                let domain = domains[i % domains.len()];
                s.spawn(move || {
                    (0..per_thread)
                        .map(|_| registry.next_id(domain))
                        .collect::<zsid::Result<Vec<u64>>>()
                })
            })
            .collect();

        let batches: Vec<_> = workers
            .into_iter()
            .map(|worker| match worker.join() {
                Ok(ids) => ids.map_err(anyhow::Error::from),
                Err(_) => Err(anyhow!("stress worker panicked")),
            })
            .collect();

        done.store(true, Ordering::Release);
        let refreshed = match refresher.map(|handle| handle.join()) {
            None | Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(err))) => Err(anyhow::Error::from(err)),
            Some(Err(_)) => Err(anyhow!("refresh thread panicked")),
        };
        (batches, refreshed)
    });
    let elapsed = start.elapsed();
    refreshed?;

    let mut seen = HashSet::with_capacity(threads * per_thread);
    let mut duplicates = 0_usize;
    for batch in batches {
        for uid in batch? {
            if !seen.insert(uid) {
                duplicates += 1;
            }
        }
    }

    let total = threads * per_thread;
    let summary = serde_json::json!({
        "domains": domains,
        "threads": threads,
        "perThread": per_thread,
        "total": total,
        "unique": seen.len(),
        "duplicates": duplicates,
        "refreshes": refreshes.load(Ordering::Relaxed),
        "generation": registry.generation(),
        "elapsedMs": elapsed.as_millis() as u64,
        "idsPerSec": (total as f64 / elapsed.as_secs_f64()) as u64,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if duplicates > 0 {
        bail!("{duplicates} duplicate uids generated");
    }
    Ok(())
}
