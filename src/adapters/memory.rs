use crate::domain::model::{Member, MemberCriteria};
use crate::domain::ports::MemberRepository;
use crate::utils::error::{BatchError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 記憶體內的 member 表，可複製共用同一份資料
#[derive(Debug, Clone, Default)]
pub struct InMemoryMemberRepository {
    rows: Arc<Mutex<Vec<Member>>>,
    unique_emails: bool,
}

impl InMemoryMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(members: Vec<Member>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(members)),
            unique_emails: false,
        }
    }

    /// Rejects a whole insert when an email already exists, like a UNIQUE
    /// constraint would.
    pub fn with_unique_emails(mut self) -> Self {
        self.unique_emails = true;
        self
    }

    pub async fn snapshot(&self) -> Vec<Member> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl MemberRepository for InMemoryMemberRepository {
    async fn bulk_insert(&self, members: &[Member]) -> Result<u64> {
        let mut rows = self.rows.lock().await;

        // 先全部檢查，通過才寫入，維持整批原子性
        if self.unique_emails {
            let mut seen: std::collections::HashSet<&str> =
                rows.iter().map(|m| m.email.as_str()).collect();
            for member in members {
                if !seen.insert(member.email.as_str()) {
                    return Err(BatchError::persistence(format!(
                        "duplicate key value violates unique constraint: email={}",
                        member.email
                    )));
                }
            }
        }

        rows.extend_from_slice(members);
        Ok(members.len() as u64)
    }

    async fn bulk_query(&self, criteria: MemberCriteria) -> Result<Vec<Member>> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().filter(|m| criteria.matches(m)).cloned().collect())
    }
}
