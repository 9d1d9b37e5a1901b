use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};
use zsid::{
    BufferConfig, DEFAULT_EPOCH, DEFAULT_USER_DOMAIN, GeneratorVariant, RegistryConfig, UidLayout,
};

/// Runtime configuration for the `zsid` binary.
///
/// Every option can also be set through the environment variable named next
/// to it, or through a `.env` file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "zsid",
    version,
    about = "Generate and decode UIDs from a registry of worker-id-bound generators"
)]
pub struct CliArgs {
    /// Domains served by a direct generator, comma separated.
    ///
    /// Environment variable: `ZSID_DIRECT_DOMAINS`
    #[arg(
        long,
        env = "ZSID_DIRECT_DOMAINS",
        value_delimiter = ',',
        default_value = "DefaultUser"
    )]
    pub direct_domains: Vec<String>,

    /// Domains served by a buffered generator, comma separated.
    ///
    /// Environment variable: `ZSID_BUFFERED_DOMAINS`
    #[arg(
        long,
        env = "ZSID_BUFFERED_DOMAINS",
        value_delimiter = ',',
        default_value = "CacheUser"
    )]
    pub buffered_domains: Vec<String>,

    /// Bits of delta seconds in every UID.
    ///
    /// Environment variable: `ZSID_TIMESTAMP_BITS`
    #[arg(long, env = "ZSID_TIMESTAMP_BITS", default_value_t = UidLayout::DEFAULT.timestamp_bits())]
    pub timestamp_bits: u8,

    /// Bits of worker id in every UID.
    ///
    /// Environment variable: `ZSID_WORKER_ID_BITS`
    #[arg(long, env = "ZSID_WORKER_ID_BITS", default_value_t = UidLayout::DEFAULT.worker_id_bits())]
    pub worker_id_bits: u8,

    /// Bits of sequence in every UID.
    ///
    /// Environment variable: `ZSID_SEQUENCE_BITS`
    #[arg(long, env = "ZSID_SEQUENCE_BITS", default_value_t = UidLayout::DEFAULT.sequence_bits())]
    pub sequence_bits: u8,

    /// Epoch as seconds since 1970-01-01 UTC. Must not lie in the future.
    ///
    /// Environment variable: `ZSID_EPOCH_SECS`
    #[arg(long, env = "ZSID_EPOCH_SECS", default_value_t = DEFAULT_EPOCH.as_secs())]
    pub epoch_secs: u64,

    /// Clock the generators read.
    ///
    /// Environment variable: `ZSID_CLOCK`
    #[arg(long, env = "ZSID_CLOCK", value_enum, default_value_t = ClockKind::Monotonic)]
    pub clock: ClockKind,

    /// Buffered generators hold `2^boost_power` seconds worth of UIDs.
    ///
    /// Environment variable: `ZSID_BOOST_POWER`
    #[arg(long, env = "ZSID_BOOST_POWER", default_value_t = 3)]
    pub boost_power: u32,

    /// Refill a buffer once fewer than this percentage of it remains.
    ///
    /// Environment variable: `ZSID_PADDING_FACTOR`
    #[arg(long, env = "ZSID_PADDING_FACTOR", default_value_t = 50)]
    pub padding_factor: u8,

    /// Also refill buffers on this period, in milliseconds.
    ///
    /// Environment variable: `ZSID_PADDING_INTERVAL_MS`
    #[arg(long, env = "ZSID_PADDING_INTERVAL_MS")]
    pub padding_interval_ms: Option<u64>,

    /// Where worker ids come from.
    ///
    /// Environment variable: `ZSID_WORKER_IDS`
    #[arg(long, env = "ZSID_WORKER_IDS", value_enum, default_value_t = WorkerIdSource::Sequential)]
    pub worker_ids: WorkerIdSource,

    /// First worker id handed out by the sequential source.
    ///
    /// Environment variable: `ZSID_WORKER_ID_START`
    #[arg(long, env = "ZSID_WORKER_ID_START", default_value_t = 1)]
    pub worker_id_start: u64,

    /// Largest worker id either source hands out. Defaults to the largest id
    /// the layout can encode.
    ///
    /// Environment variable: `ZSID_WORKER_ID_MAX`
    #[arg(long, env = "ZSID_WORKER_ID_MAX")]
    pub worker_id_max: Option<u64>,

    /// Deadline for a single worker id assignment, in milliseconds.
    ///
    /// Environment variable: `ZSID_ASSIGN_TIMEOUT_MS`
    #[arg(long, env = "ZSID_ASSIGN_TIMEOUT_MS", default_value_t = 5_000)]
    pub assign_timeout_ms: u64,

    /// Log output format. Logs go to stderr and are filtered by `RUST_LOG`.
    ///
    /// Environment variable: `ZSID_LOG_FORMAT`
    #[arg(long, env = "ZSID_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print freshly generated UIDs, one per line.
    Next {
        #[arg(long, default_value = DEFAULT_USER_DOMAIN)]
        domain: String,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Decode a UID and print its fields as JSON.
    Decode {
        #[arg(long, default_value = DEFAULT_USER_DOMAIN)]
        domain: String,
        uid: u64,
    },
    /// Generate UIDs from many threads across every domain, optionally while
    /// refreshing the registry, and report duplicates.
    Stress {
        #[arg(long, default_value_t = 8)]
        threads: usize,
        #[arg(long, default_value_t = 10_000)]
        per_thread: usize,
        /// Refresh every generator on this period, in milliseconds.
        #[arg(long)]
        refresh_every: Option<u64>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockKind {
    /// Never moves backwards.
    Monotonic,
    /// Follows the wall clock, including steps backwards.
    System,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerIdSource {
    Sequential,
    Random,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub registry: RegistryConfig,
    pub epoch: Duration,
    pub clock: ClockKind,
    pub worker_ids: WorkerIdSource,
    pub worker_id_start: u64,
    pub worker_id_max: u64,
    pub assign_timeout: Duration,
    pub log_format: LogFormat,
    pub command: Command,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let layout = UidLayout::new(args.timestamp_bits, args.worker_id_bits, args.sequence_bits)?;

        let mut registry = RegistryConfig::new().with_layout(layout).with_buffer(BufferConfig {
            boost_power: args.boost_power,
            padding_factor: args.padding_factor,
            padding_interval: args.padding_interval_ms.map(Duration::from_millis),
        });

        let direct = clean_domains(args.direct_domains);
        let buffered = clean_domains(args.buffered_domains);
        if let Some(shared) = direct.iter().find(|key| buffered.contains(key)) {
            bail!("domain `{shared}` is listed as both direct and buffered");
        }
        for key in direct {
            registry = registry.with_domain(key, GeneratorVariant::Direct);
        }
        for key in buffered {
            registry = registry.with_domain(key, GeneratorVariant::Buffered);
        }
        registry.validate()?;

        let worker_id_max = args.worker_id_max.unwrap_or(layout.max_worker_id());
        if worker_id_max > layout.max_worker_id() {
            bail!(
                "ZSID_WORKER_ID_MAX ({worker_id_max}) exceeds the {} bit worker id field (max = {})",
                layout.worker_id_bits(),
                layout.max_worker_id()
            );
        }
        if args.worker_ids == WorkerIdSource::Sequential && args.worker_id_start > worker_id_max {
            bail!(
                "ZSID_WORKER_ID_START ({}) exceeds ZSID_WORKER_ID_MAX ({worker_id_max})",
                args.worker_id_start
            );
        }

        let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
        if args.epoch_secs > now.as_secs() {
            bail!(
                "ZSID_EPOCH_SECS ({}) lies in the future (now = {})",
                args.epoch_secs,
                now.as_secs()
            );
        }

        if args.assign_timeout_ms == 0 {
            bail!("ZSID_ASSIGN_TIMEOUT_MS must be greater than 0");
        }

        if let Command::Stress {
            threads,
            per_thread,
            refresh_every,
        } = &args.command
        {
            if *threads == 0 || *per_thread == 0 {
                bail!("stress needs at least one thread and one id per thread");
            }
            if *refresh_every == Some(0) {
                bail!("--refresh-every must be greater than 0");
            }
        }

        Ok(Self {
            registry,
            epoch: Duration::from_secs(args.epoch_secs),
            clock: args.clock,
            worker_ids: args.worker_ids,
            worker_id_start: args.worker_id_start,
            worker_id_max,
            assign_timeout: Duration::from_millis(args.assign_timeout_ms),
            log_format: args.log_format,
            command: args.command,
        })
    }
}

fn clean_domains(domains: Vec<String>) -> Vec<String> {
    domains
        .into_iter()
        .map(|key| key.trim().to_owned())
        .filter(|key| !key.is_empty())
        .collect()
}
