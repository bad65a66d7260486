use crate::app::csv_to_db::CsvToDbLogic;
use crate::app::db_to_csv::DbToCsvLogic;
use crate::core::job::{JobBuilder, JobRegistry, Step};
use crate::domain::ports::{ConfigProvider, MemberRepository};
use crate::utils::error::{BatchError, Result};

/// 執行時引數指定的 job 名稱必須和這裡一致
pub const CSV_TO_DB: &str = "CSV_TO_DB";
pub const DB_TO_CSV: &str = "DB_TO_CSV";
pub const JOB_NAMES: [&str; 2] = [CSV_TO_DB, DB_TO_CSV];

/// 在讀取設定檔之前檢查 job 名稱
pub fn ensure_known_job(name: &str) -> Result<()> {
    if JOB_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(BatchError::UnknownJob {
            name: name.to_string(),
        })
    }
}

fn step_name(job_name: &str) -> String {
    format!("{}-step", job_name)
}

/// Registers `CSV_TO_DB` and `DB_TO_CSV`, both backed by `repository`.
pub fn register_jobs<R, C>(registry: &mut JobRegistry, repository: R, config: &C) -> Result<()>
where
    R: MemberRepository + Clone + 'static,
    C: ConfigProvider,
{
    let csv_to_db = CsvToDbLogic::new(repository.clone(), config.csv_source_path());
    registry.register(
        JobBuilder::new(CSV_TO_DB)
            .start(Step::new(step_name(CSV_TO_DB), csv_to_db))
            .build()?,
    )?;

    let db_to_csv = DbToCsvLogic::new(repository, config.csv_destination_path())
        .with_criteria(config.export_criteria());
    registry.register(
        JobBuilder::new(DB_TO_CSV)
            .start(Step::new(step_name(DB_TO_CSV), db_to_csv))
            .build()?,
    )?;

    Ok(())
}

pub fn build_registry<R, C>(repository: R, config: &C) -> Result<JobRegistry>
where
    R: MemberRepository + Clone + 'static,
    C: ConfigProvider,
{
    let mut registry = JobRegistry::new();
    register_jobs(&mut registry, repository, config)?;
    Ok(registry)
}
