use crate::domain::model::{Member, MemberCriteria};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// 持久層邊界：批次寫入與批次查詢。不含重試邏輯。
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Inserts all members in one atomic unit; on error nothing is committed.
    async fn bulk_insert(&self, members: &[Member]) -> Result<u64>;

    /// Returns matching members in table order.
    async fn bulk_query(&self, criteria: MemberCriteria) -> Result<Vec<Member>>;
}

pub trait ConfigProvider: Send + Sync {
    fn csv_source_path(&self) -> &Path;
    fn csv_destination_path(&self) -> &Path;
    fn export_criteria(&self) -> MemberCriteria;
}
