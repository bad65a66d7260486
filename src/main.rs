use anyhow::Context;
use clap::Parser;
use db_csv_batch::app::jobs;
use db_csv_batch::utils::{logger, validation::Validate};
use db_csv_batch::{BatchConfig, BatchError, CliConfig, ExitStatus, JobLauncher, JobRun, PgMemberRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    // 記錄啟動參數，方便從日誌確認執行了哪個 job
    tracing::info!(
        "##### Batch ##### - Job: {}, Config: {}",
        args.job,
        args.config.display()
    );
    if args.verbose {
        tracing::debug!("CLI config: {:?}", args);
    }

    let run = match launch(&args).await {
        Ok(run) => run,
        Err(e) => {
            let exit_code = match e.downcast_ref::<BatchError>() {
                Some(batch_error) => {
                    tracing::error!(
                        "❌ Batch could not start: {:#} (Category: {:?}, Severity: {:?})",
                        e,
                        batch_error.category(),
                        batch_error.severity()
                    );
                    tracing::error!("💡 Recovery suggestion: {}", batch_error.recovery_suggestion());
                    eprintln!("❌ {}", batch_error.user_friendly_message());
                    eprintln!("💡 {}", batch_error.recovery_suggestion());
                    batch_error.severity().exit_code()
                }
                None => {
                    tracing::error!("❌ Batch could not start: {:#}", e);
                    eprintln!("❌ {:#}", e);
                    1
                }
            };
            std::process::exit(exit_code);
        }
    };

    tracing::info!("📊 Run summary: {}", run.summary());

    match run.exit_status() {
        ExitStatus::Success => {
            println!("✅ {} completed (run id {})", run.job_name, run.run_id);
        }
        ExitStatus::NoData => {
            println!("⚠️ {} found no data (run id {})", run.job_name, run.run_id);
        }
        ExitStatus::Failed => {
            let (kind, message) = run
                .failure()
                .context("failed run has no failed step recorded")?;
            eprintln!(
                "❌ {} failed (run id {}, {}): {}",
                run.job_name, run.run_id, kind, message
            );
            std::process::exit(kind.severity().exit_code());
        }
    }

    Ok(())
}

async fn launch(args: &CliConfig) -> anyhow::Result<JobRun> {
    args.validate()?;
    jobs::ensure_known_job(&args.job)?;

    let mut config = BatchConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    // 命令列參數覆蓋設定檔
    if let Some(source) = &args.source {
        tracing::info!("🔧 csv_to_db.source_path overridden to: {}", source.display());
        config.csv_to_db.source_path = source.clone();
    }
    if let Some(destination) = &args.destination {
        tracing::info!(
            "🔧 db_to_csv.destination_path overridden to: {}",
            destination.display()
        );
        config.db_to_csv.destination_path = destination.clone();
    }

    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated: {}", config.batch.name);

    let repository = PgMemberRepository::connect_lazy(config.database()?)?;
    let registry = jobs::build_registry(repository, &config)?;
    let launcher = JobLauncher::new(registry);

    Ok(launcher.run(&args.job).await?)
}
