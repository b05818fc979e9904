use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use timeout_enforcer::classpath::ClassPath;
use timeout_enforcer::driver::{Action, Driver};
use timeout_enforcer::engine::Classifier;
use timeout_enforcer::policy::{
    PolicyBinding, PolicyRegistry, TimeUnit, TimeoutSpec, DEFAULT_POLICY_NAME, DEFAULT_TIMEOUT,
};
use timeout_enforcer::{parse_class, Config};

#[derive(Parser)]
#[command(name = "timeout-enforcer")]
#[command(about = "Adds a class-wide timeout rule to compiled JUnit 4 test classes")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether class files would receive a timeout rule
    Classify {
        /// Class files
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Directories searched for superclasses
        #[arg(long, value_name = "DIR")]
        classpath: Vec<PathBuf>,
    },

    /// Rewrite every applicable class under the given directories in place
    Enforce {
        /// Class output directories governed by the `test` policy
        #[arg(value_name = "DIR", required_unless_present = "policy")]
        dirs: Vec<PathBuf>,

        /// Timeout amount of the `test` policy
        #[arg(long, default_value_t = DEFAULT_TIMEOUT)]
        timeout: u64,

        /// Unit of the `test` policy's timeout, e.g. SECONDS or MINUTES
        #[arg(long, default_value = "MINUTES")]
        units: String,

        /// Named policy for one class directory, e.g. integrationTest=1:HOURS:build/classes/it
        #[arg(long, value_name = "NAME=AMOUNT:UNIT:DIR")]
        policy: Vec<PolicyBinding>,

        /// Directories searched for superclasses, in addition to the class directories
        #[arg(long, value_name = "DIR")]
        classpath: Vec<PathBuf>,

        /// Stop at the first class that cannot be processed
        #[arg(long)]
        fail_fast: bool,

        /// Classify only, do not write anything
        #[arg(long)]
        dry_run: bool,

        /// Worker threads (0 = one per core)
        #[arg(long)]
        threads: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Classify { paths, classpath } => classify_files(&paths, classpath),
        Commands::Enforce { dirs, timeout, units, policy, classpath, fail_fast, dry_run, threads } => {
            let units: TimeUnit = units.parse()?;
            let mut registry = PolicyRegistry::new();
            if !dirs.is_empty() {
                registry.add(TimeoutSpec::new(DEFAULT_POLICY_NAME, timeout, units));
                for dir in dirs {
                    registry.assign(DEFAULT_POLICY_NAME, dir)?;
                }
            }
            for binding in policy {
                registry.bind(binding)?;
            }
            let mut config = Config::from_env()?;
            config.classpath.extend(classpath);
            config.fail_fast |= fail_fast;
            config.dry_run = dry_run;
            if let Some(threads) = threads {
                config.threads = threads;
            }
            enforce(&registry, config)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let _ = env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

fn classify_files(paths: &[PathBuf], classpath: Vec<PathBuf>) -> Result<()> {
    let classpath = ClassPath::new(classpath);
    let classifier = Classifier::with_hierarchy(&classpath);
    for path in paths {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let class = parse_class(&bytes).with_context(|| format!("parsing {}", path.display()))?;
        let applicability = classifier.classify(&class);
        println!("{}\t{}\t{}", path.display(), applicability, applicability.message());
    }
    Ok(())
}

fn enforce(registry: &PolicyRegistry, config: Config) -> Result<()> {
    let driver = Driver::new(config);
    let mut failures = 0;
    for report in driver.run_registry(registry)? {
        for outcome in &report.outcomes {
            match &outcome.action {
                Action::Transformed { field_name, instrumented, skipped } => {
                    println!(
                        "{}: added {} for {} ({} constructors, {} skipped)",
                        outcome.class_name, field_name, report.policy, instrumented, skipped
                    );
                }
                Action::WouldTransform => {
                    println!("{}: would add timeout rule for {}", outcome.class_name, report.policy)
                }
                Action::Unchanged => log::debug!("{}: {}", outcome.class_name, outcome.applicability.message()),
            }
        }
        for failure in &report.failures {
            eprintln!("{}: {}", failure.path.display(), failure.error);
        }
        failures += report.failures.len();
    }
    if failures > 0 {
        bail!("{} class files could not be processed", failures);
    }
    Ok(())
}
