use crate::config::toml_config::DatabaseConfig;
use crate::domain::model::{Member, MemberCriteria};
use crate::domain::ports::MemberRepository;
use crate::utils::error::Result;
use crate::utils::validation::validate_sql_identifier;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Row};
use std::time::Duration;

/// PostgreSQL 一次最多 65535 個 bind 參數，每列 6 個
const INSERT_CHUNK_ROWS: usize = 10_000;

const COLUMNS: &str = r#""type", name, email, phone, address, delete_flag"#;

#[derive(Debug, Clone)]
pub struct PgMemberRepository {
    pool: PgPool,
    table: String,
}

impl PgMemberRepository {
    /// Builds the pool without opening a connection; the first query connects.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        tracing::debug!(
            "Preparing database pool (table: {}, max connections: {})",
            config.table,
            config.max_connections()
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections())
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds()))
            .connect_lazy(&config.url)?;
        Self::new(pool, &config.table)
    }

    pub fn new(pool: PgPool, table: &str) -> Result<Self> {
        validate_sql_identifier("database.table", table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }
}

fn insert_prefix(table: &str) -> String {
    format!("INSERT INTO {} ({}) ", table, COLUMNS)
}

fn select_sql(table: &str, criteria: MemberCriteria) -> String {
    let filter = match criteria {
        MemberCriteria::All => "",
        MemberCriteria::Active => " WHERE delete_flag = 0",
    };
    format!("SELECT {} FROM {}{} ORDER BY id", COLUMNS, table, filter)
}

#[async_trait]
impl MemberRepository for PgMemberRepository {
    async fn bulk_insert(&self, members: &[Member]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }

        // 整批同一個 transaction；失敗時 tx 被 drop 會自動 rollback
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in members.chunks(INSERT_CHUNK_ROWS) {
            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new(insert_prefix(&self.table));

            query_builder.push_values(chunk, |mut b, member| {
                b.push_bind(member.member_type)
                    .push_bind(&member.name)
                    .push_bind(&member.email)
                    .push_bind(&member.phone)
                    .push_bind(&member.address)
                    .push_bind(i16::from(member.delete_flag));
            });

            let result = query_builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        tracing::debug!("Committed {} rows into {}", inserted, self.table);
        Ok(inserted)
    }

    async fn bulk_query(&self, criteria: MemberCriteria) -> Result<Vec<Member>> {
        let sql = select_sql(&self.table, criteria);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<Member> {
                Ok(Member {
                    member_type: row.try_get("type")?,
                    name: row.try_get("name")?,
                    email: row.try_get("email")?,
                    phone: row.try_get("phone")?,
                    address: row.try_get("address")?,
                    delete_flag: row.try_get::<i16, _>("delete_flag")? != 0,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_prefix() {
        assert_eq!(
            insert_prefix("member"),
            r#"INSERT INTO member ("type", name, email, phone, address, delete_flag) "#
        );
    }

    #[test]
    fn test_select_sql_all() {
        assert_eq!(
            select_sql("batch.member", MemberCriteria::All),
            r#"SELECT "type", name, email, phone, address, delete_flag FROM batch.member ORDER BY id"#
        );
    }

    #[test]
    fn test_select_sql_active_only() {
        assert!(select_sql("member", MemberCriteria::Active)
            .ends_with("FROM member WHERE delete_flag = 0 ORDER BY id"));
    }

    #[test]
    fn test_chunk_stays_under_bind_limit() {
        assert!(INSERT_CHUNK_ROWS * Member::FIELD_COUNT <= u16::MAX as usize);
    }
}
