use anyhow::Context;
use cfbench::benchmark::{BenchSettings, Benchmark};
use cfbench::config::BenchConfig;
use cfbench::error::BenchError;
use cfbench::objectstore::open_store;
use cfbench::progress::ProgressReporter;
use clap::{Parser, ValueEnum};
use directories_next::ProjectDirs;
use log::{debug, error, info, LevelFilter};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const APPLICATION: &str = "cfbench";

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    setup_logging(&opt.log, opt.debug)?;

    info!("cfbench starts");
    debug!("{:#?}", opt);

    let result = run(&opt);
    if let Err(ref e) = result {
        error!("{:#}", e);
        eprintln!("ERROR: {:#}", e);
        result?
    }

    info!("cfbench ends successfully");
    Ok(())
}

fn run(opt: &Opt) -> anyhow::Result<()> {
    opt.check()?;

    let config_file = match opt.config {
        None => default_config()?,
        Some(ref path) => path.to_path_buf(),
    };
    let config = BenchConfig::read(&config_file)?.with_region(opt.region.clone())?;
    info!("using region {}", config.region);

    let store = open_store(&config)?;
    let reporter = ProgressReporter::new(!opt.quiet);
    let settings = BenchSettings {
        workers: opt.workers,
        seed: opt.seed,
        abort_on_error: opt.abort_on_error,
        unicode_names: opt.unicode_names,
        fetch_retries: config.fetch_retries,
        poll: config.poll,
        ..BenchSettings::default()
    };
    let bench = Benchmark::new(store.as_ref(), &reporter, settings);

    bench.connection_test();
    let result = match opt.test {
        Test::Upload => bench.upload(&opt.container, opt.chunk * opt.multi, opt.count)?,
        Test::Fetch => bench.fetch(&opt.container, opt.count, opt.chunk)?,
        Test::Clean => bench.cleanup(&opt.container)?,
    };

    println!("{}", result.summary());
    if result.mismatch_count() > 0 {
        println!("{} mismatched checksums", result.mismatch_count());
    }
    if result.failure_count() > 0 {
        println!("{} failed operations", result.failure_count());
    }
    Ok(())
}

fn default_config() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", APPLICATION)
        .context("can't find a configuration directory")?;
    Ok(dirs.config_dir().join("cfbench.yaml"))
}

fn default_log() -> PathBuf {
    std::env::temp_dir().join("cfbench.log")
}

#[derive(Debug, Parser)]
#[clap(name = "cfbench", about = "Benchmark a Swift / Cloud Files object store")]
struct Opt {
    /// Benchmark to run.
    #[clap(value_enum)]
    test: Test,

    /// Container to use.
    container: String,

    /// Number of objects to upload or fetch.
    #[clap(short = 'n', long, default_value = "10")]
    count: u64,

    /// Chunk size for fetching, in bytes.
    #[clap(short, long, default_value = "8192")]
    chunk: usize,

    /// Size of uploaded objects, as a multiple of the chunk size.
    #[clap(short, long, default_value = "100")]
    multi: usize,

    /// Region to use instead of the configured one.
    #[clap(short, long)]
    region: Option<String>,

    /// Log file.
    #[clap(short, long, parse(from_os_str), default_value_os_t = default_log())]
    log: PathBuf,

    /// Log debug messages.
    #[clap(short = 'D', long)]
    debug: bool,

    /// Configuration file with credentials.
    #[clap(short = 'C', long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Number of concurrent workers.
    #[clap(short, long, default_value = "1")]
    workers: usize,

    /// Stop at the first failed operation.
    #[clap(long)]
    abort_on_error: bool,

    /// Seed for generating data, to repeat an earlier run.
    #[clap(long)]
    seed: Option<u64>,

    /// Use non-ASCII characters in object names.
    #[clap(long)]
    unicode_names: bool,

    /// Don't show a progress bar.
    #[clap(short, long)]
    quiet: bool,
}

impl Opt {
    fn check(&self) -> Result<(), BenchError> {
        let zeroes = [
            ("count", self.count == 0),
            ("chunk", self.chunk == 0),
            ("multi", self.multi == 0),
            ("workers", self.workers == 0),
        ];
        for (name, zero) in zeroes.iter() {
            if *zero {
                return Err(BenchError::InvalidOptions(format!(
                    "--{} must be positive",
                    name
                )));
            }
        }
        if self.chunk.checked_mul(self.multi).is_none() {
            return Err(BenchError::InvalidOptions(
                "--chunk times --multi is too large".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Test {
    Upload,
    Fetch,
    Clean,
}

fn setup_logging(filename: &Path, debug: bool) -> anyhow::Result<()> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)}:cfbench:{l}:{m}{n}",
        )))
        .build(filename)?;

    let config = Config::builder()
        .appender(Appender::builder().build("cfbench", Box::new(logfile)))
        .logger(Logger::builder().build("cfbench", level))
        .build(Root::builder().appender("cfbench").build(level))?;

    log4rs::init_config(config)?;

    Ok(())
}
