use crate::core::csv_io::CsvSource;
use crate::core::job::{StepContext, Tasklet};
use crate::domain::model::{BatchResult, Member};
use crate::domain::ports::MemberRepository;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// CSV 檔案讀取後整批寫入 DB
pub struct CsvToDbLogic<R: MemberRepository> {
    repository: R,
    source_path: PathBuf,
}

impl<R: MemberRepository> CsvToDbLogic<R> {
    pub fn new(repository: R, source_path: impl Into<PathBuf>) -> Self {
        Self {
            repository,
            source_path: source_path.into(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Reads every row of `source_path` and inserts them with one bulk insert.
    ///
    /// Nothing is inserted unless the whole file parses. A file with no data
    /// rows returns `NoData` without touching the repository.
    pub async fn execute(&self, source_path: &Path) -> Result<BatchResult> {
        let members = load_csv_data(source_path).inspect_err(|e| {
            tracing::error!("Failed to load the CSV file {}: {}", source_path.display(), e)
        })?;

        if members.is_empty() {
            tracing::warn!("No data found in the CSV file to insert.");
            return Ok(BatchResult::NoData);
        }

        let inserted = self
            .repository
            .bulk_insert(&members)
            .await
            .inspect_err(|e| tracing::error!("Bulk insert of {} records failed: {}", members.len(), e))?;

        tracing::info!("Successfully inserted {} records into the database.", inserted);
        Ok(BatchResult::Success)
    }
}

// 檔案在這裡開啟並在離開時關閉，包含驗證失敗的路徑
fn load_csv_data(source_path: &Path) -> Result<Vec<Member>> {
    let mut source = CsvSource::open(source_path)?;

    let mut members = Vec::new();
    for member in source.members() {
        members.push(member?);
    }

    tracing::info!(
        "Loaded {} records from the CSV file {}.",
        members.len(),
        source.path().display()
    );
    Ok(members)
}

#[async_trait]
impl<R: MemberRepository> Tasklet for CsvToDbLogic<R> {
    async fn execute(&self, context: &StepContext) -> Result<BatchResult> {
        tracing::debug!(
            "Step {} reading {}",
            context.step_name,
            self.source_path.display()
        );
        CsvToDbLogic::execute(self, &self.source_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MemberCriteria;
    use crate::utils::error::{BatchError, ErrorKind};
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::{NamedTempFile, TempDir};
    use tokio::sync::Mutex;

    const HEADER: &str = "type,name,email,phone,address,deleteFlag\n";

    #[derive(Clone, Default)]
    struct RecordingRepository {
        insert_calls: Arc<Mutex<Vec<Vec<Member>>>>,
        fail_with: Option<String>,
    }

    impl RecordingRepository {
        fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::default()
            }
        }

        async fn calls(&self) -> Vec<Vec<Member>> {
            self.insert_calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl MemberRepository for RecordingRepository {
        async fn bulk_insert(&self, members: &[Member]) -> Result<u64> {
            self.insert_calls.lock().await.push(members.to_vec());
            match &self.fail_with {
                Some(message) => Err(BatchError::persistence(message.clone())),
                None => Ok(members.len() as u64),
            }
        }

        async fn bulk_query(&self, _criteria: MemberCriteria) -> Result<Vec<Member>> {
            Ok(Vec::new())
        }
    }

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_single_row_scenario() {
        let file = csv_file(&format!(
            "{}1,Alice,alice@example.com,555-1234,1 Main St,0\n",
            HEADER
        ));
        let repo = RecordingRepository::default();
        let logic = CsvToDbLogic::new(repo.clone(), file.path());

        let result = logic.execute(file.path()).await.unwrap();

        assert_eq!(result, BatchResult::Success);
        let calls = repo.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            vec![Member {
                member_type: 1,
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                phone: "555-1234".to_string(),
                address: "1 Main St".to_string(),
                delete_flag: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_n_rows_in_one_call_in_file_order() {
        let mut content = HEADER.to_string();
        for i in 1..=25 {
            content.push_str(&format!(
                "{},User {},user{}@example.com,555-{:04},{} Main St,{}\n",
                i % 3,
                i,
                i,
                i,
                i,
                i % 2
            ));
        }
        let file = csv_file(&content);
        let repo = RecordingRepository::default();
        let logic = CsvToDbLogic::new(repo.clone(), file.path());

        assert_eq!(logic.execute(file.path()).await.unwrap(), BatchResult::Success);

        let calls = repo.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 25);
        let names: Vec<String> = calls[0].iter().map(|m| m.name.clone()).collect();
        let expected: Vec<String> = (1..=25).map(|i| format!("User {}", i)).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_header_only_is_no_data() {
        let file = csv_file(HEADER);
        let repo = RecordingRepository::default();
        let logic = CsvToDbLogic::new(repo.clone(), file.path());

        assert_eq!(logic.execute(file.path()).await.unwrap(), BatchResult::NoData);
        assert!(repo.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_file_is_no_data() {
        let file = csv_file("");
        let repo = RecordingRepository::default();
        let logic = CsvToDbLogic::new(repo.clone(), file.path());

        assert_eq!(logic.execute(file.path()).await.unwrap(), BatchResult::NoData);
        assert!(repo.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("member.csv");
        let repo = RecordingRepository::default();
        let logic = CsvToDbLogic::new(repo.clone(), &path);

        let err = logic.execute(&path).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(repo.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_bad_integer_inserts_nothing() {
        let file = csv_file(&format!(
            "{}1,Alice,alice@example.com,555-1234,1 Main St,0\n\
             x,Bob,bob@example.com,555-9999,2 Side St,0\n",
            HEADER
        ));
        let repo = RecordingRepository::default();
        let logic = CsvToDbLogic::new(repo.clone(), file.path());

        let err = logic.execute(file.path()).await.unwrap_err();

        match err {
            BatchError::Validation { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(repo.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_error_is_propagated() {
        let file = csv_file(&format!(
            "{}1,Alice,alice@example.com,555-1234,1 Main St,0\n",
            HEADER
        ));
        let repo = RecordingRepository::failing("connection refused");
        let logic = CsvToDbLogic::new(repo.clone(), file.path());

        let err = logic.execute(file.path()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.to_string().contains("connection refused"));
        // 不自動重試
        assert_eq!(repo.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_tasklet_uses_configured_path() {
        let file = csv_file(&format!(
            "{}2,Carol,carol@example.com,555-2222,3 High St,1\n",
            HEADER
        ));
        let repo = RecordingRepository::default();
        let logic = CsvToDbLogic::new(repo.clone(), file.path());
        let context = StepContext {
            run_id: 1,
            job_name: "CSV_TO_DB".to_string(),
            step_name: "CSV_TO_DB-step".to_string(),
        };

        let result = Tasklet::execute(&logic, &context).await.unwrap();

        assert_eq!(result, BatchResult::Success);
        assert!(repo.calls().await[0][0].delete_flag);
    }
}
