use crate::core::csv_io::CsvSink;
use crate::core::job::{StepContext, Tasklet};
use crate::domain::model::{BatchResult, MemberCriteria};
use crate::domain::ports::MemberRepository;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// DB 的資料整批查詢後輸出成 CSV
pub struct DbToCsvLogic<R: MemberRepository> {
    repository: R,
    destination_path: PathBuf,
    criteria: MemberCriteria,
}

impl<R: MemberRepository> DbToCsvLogic<R> {
    pub fn new(repository: R, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            repository,
            destination_path: destination_path.into(),
            criteria: MemberCriteria::All,
        }
    }

    pub fn with_criteria(mut self, criteria: MemberCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    /// An empty result set returns `NoData` and leaves the destination untouched.
    pub async fn execute(&self, destination_path: &Path) -> Result<BatchResult> {
        let members = self.repository.bulk_query(self.criteria).await?;

        if members.is_empty() {
            tracing::warn!(
                "No data found in the database; {} was not written.",
                destination_path.display()
            );
            return Ok(BatchResult::NoData);
        }

        let mut sink = CsvSink::create(destination_path)?;
        for member in &members {
            sink.write(member)?;
        }
        let written = sink.finish()?;

        tracing::info!(
            "Successfully exported {} records to {}.",
            written,
            destination_path.display()
        );
        Ok(BatchResult::Success)
    }
}

#[async_trait]
impl<R: MemberRepository> Tasklet for DbToCsvLogic<R> {
    async fn execute(&self, context: &StepContext) -> Result<BatchResult> {
        tracing::debug!(
            "Step {} writing {} ({:?})",
            context.step_name,
            self.destination_path.display(),
            self.criteria
        );
        DbToCsvLogic::execute(self, &self.destination_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryMemberRepository;
    use crate::core::csv_io::CsvSource;
    use crate::domain::model::Member;
    use crate::utils::error::{BatchError, ErrorKind};
    use tempfile::TempDir;

    struct BrokenRepository;

    #[async_trait]
    impl MemberRepository for BrokenRepository {
        async fn bulk_insert(&self, _members: &[Member]) -> Result<u64> {
            Ok(0)
        }

        async fn bulk_query(&self, _criteria: MemberCriteria) -> Result<Vec<Member>> {
            Err(BatchError::persistence("relation \"member\" does not exist"))
        }
    }

    fn member(member_type: i16, name: &str, delete_flag: bool) -> Member {
        Member {
            member_type,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "555-0101".to_string(),
            address: "9 Elm St".to_string(),
            delete_flag,
        }
    }

    #[tokio::test]
    async fn test_export_writes_header_and_rows_in_query_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("member.csv");
        let members = vec![member(1, "Alice", false), member(2, "Bob", true)];
        let repo = InMemoryMemberRepository::with_members(members.clone());
        let logic = DbToCsvLogic::new(repo, &path);

        assert_eq!(logic.execute(&path).await.unwrap(), BatchResult::Success);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "type,name,email,phone,address,deleteFlag");
        assert_eq!(lines[1], "1,Alice,alice@example.com,555-0101,9 Elm St,0");
        assert_eq!(lines[2], "2,Bob,bob@example.com,555-0101,9 Elm St,1");

        let mut source = CsvSource::open(&path).unwrap();
        let parsed: Vec<Member> = source.members().collect::<Result<_>>().unwrap();
        assert_eq!(parsed, members);
    }

    #[tokio::test]
    async fn test_empty_table_does_not_create_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("member.csv");
        let logic = DbToCsvLogic::new(InMemoryMemberRepository::new(), &path);

        assert_eq!(logic.execute(&path).await.unwrap(), BatchResult::NoData);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_empty_table_does_not_truncate_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("member.csv");
        std::fs::write(&path, "previous export\n").unwrap();
        let logic = DbToCsvLogic::new(InMemoryMemberRepository::new(), &path);

        assert_eq!(logic.execute(&path).await.unwrap(), BatchResult::NoData);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous export\n");
    }

    #[tokio::test]
    async fn test_active_criteria_skips_deleted_members() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("member.csv");
        let repo = InMemoryMemberRepository::with_members(vec![
            member(1, "Alice", false),
            member(2, "Bob", true),
        ]);
        let logic = DbToCsvLogic::new(repo, &path).with_criteria(MemberCriteria::Active);

        assert_eq!(logic.execute(&path).await.unwrap(), BatchResult::Success);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Alice"));
        assert!(!content.contains("Bob"));
    }

    #[tokio::test]
    async fn test_only_deleted_members_with_active_criteria_is_no_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("member.csv");
        let repo = InMemoryMemberRepository::with_members(vec![member(2, "Bob", true)]);
        let logic = DbToCsvLogic::new(repo, &path).with_criteria(MemberCriteria::Active);

        assert_eq!(logic.execute(&path).await.unwrap(), BatchResult::NoData);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_query_failure_is_propagated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("member.csv");
        let logic = DbToCsvLogic::new(BrokenRepository, &path);

        let err = logic.execute(&path).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unwritable_destination_is_io() {
        let dir = TempDir::new().unwrap();
        let repo = InMemoryMemberRepository::with_members(vec![member(1, "Alice", false)]);
        let logic = DbToCsvLogic::new(repo, dir.path());

        let err = logic.execute(dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
