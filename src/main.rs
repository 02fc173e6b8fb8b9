use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use qadash::config::{Config, LogOutput, LoggingConfig};
use qadash::execution::runner::RunnerSettings;
use qadash::execution::{ExecutionStatus, ExecutionTracker, TestRunner, TestType};
use qadash::logs::{self, LogFilter};

#[derive(Parser)]
#[command(
    name = "qadash",
    about = "Test automation dashboard: log metrics and on-demand test runs",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (default: $QADASH_CONFIG, then ./qadash.toml)
    #[arg(long, global = true, env = "QADASH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print parsed log records, newest first
    Logs {
        /// Only records with this level (case-insensitive)
        #[arg(long)]
        level: Option<String>,

        /// Only files whose name contains this substring
        #[arg(long)]
        file: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print pass/fail metrics over all log files
    Metrics {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List runnable test files
    Tests,

    /// Run one test file and wait for it to finish
    Run {
        /// Test file name inside the test directory
        test_file: String,

        /// Invocation kind: python or pytest
        #[arg(long = "type", default_value = "python")]
        test_type: TestType,
    },
}

fn init_tracing(cfg: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cfg.format {
        LogOutput::Json => builder.json().init(),
        LogOutput::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting qadash server");
            qadash::serve(config).await?;
        }
        Commands::Logs { level, file, json } => {
            let mut records = logs::collect(&config.paths.log_dir, &LogFilter { level, file })?;
            logs::sort_newest_first(&mut records);
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No log records found in {}.", config.paths.log_dir.display());
            } else {
                for r in &records {
                    println!(
                        "{:<19} | {:<8} | {:<24} | {}",
                        r.timestamp, r.level, r.source_file, r.message
                    );
                }
            }
        }
        Commands::Metrics { json } => {
            let records = logs::collect(&config.paths.log_dir, &LogFilter::default())?;
            let m = qadash::metrics::analyze(&records);
            if json {
                println!("{}", serde_json::to_string_pretty(&m)?);
            } else {
                println!("\n=== Test Metrics ===");
                println!("Total tests:  {}", m.total_tests);
                println!("Passed:       {} ({:.2}%)", m.passed, m.pass_rate);
                println!("Failed:       {} ({:.2}%)", m.failed, m.fail_rate);
                println!("Errors:       {}", m.errors);
                println!("Warnings:     {}", m.warnings);
                println!("Duration:     {:.2}s total, {:.2}s avg", m.total_duration, m.avg_duration);
                if !m.test_cases.is_empty() {
                    println!("\n{:<30} | {:<7} | Timestamp", "Test case", "Status");
                    println!("{:-<30}-|-{:-<7}-|-{:-<19}", "", "", "");
                    for case in &m.test_cases {
                        let status = serde_json::to_value(case.status)?;
                        println!(
                            "{:<30} | {:<7} | {}",
                            case.name,
                            status.as_str().unwrap_or_default(),
                            case.timestamp
                        );
                    }
                }
                println!();
            }
        }
        Commands::Tests => {
            let tests = qadash::discovery::list_tests(&config.paths.test_dir)?;
            if tests.is_empty() {
                println!("No test files found in {}.", config.paths.test_dir.display());
            } else {
                println!("{:<30} | {:>8} | Modified", "Name", "Bytes");
                println!("{:-<30}-|-{:->8}-|-{:-<19}", "", "", "");
                for t in tests {
                    println!("{:<30} | {:>8} | {}", t.name, t.size, t.modified);
                }
            }
        }
        Commands::Run {
            test_file,
            test_type,
        } => {
            let tracker = ExecutionTracker::new();
            let runner = TestRunner::new(tracker.clone(), RunnerSettings::from_config(&config));
            let id = tracker.create(&test_file, test_type).await;
            runner.launch(id.clone(), test_file, test_type).await?;

            let Some(exec) = tracker.get(&id).await else {
                anyhow::bail!("execution {} vanished from the tracker", id);
            };
            println!("{}", serde_json::to_string_pretty(&exec)?);

            match exec.status {
                ExecutionStatus::Completed => {
                    let code = exec.exit_code.unwrap_or(0);
                    if code != 0 {
                        std::process::exit(code);
                    }
                }
                _ => anyhow::bail!(
                    "test run {} failed: {}",
                    id,
                    exec.error.unwrap_or_else(|| exec.status.to_string())
                ),
            }
        }
    }

    Ok(())
}
