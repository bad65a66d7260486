use crate::utils::error::{BatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 會員資料，一列 CSV 或一筆 DB 資料對應一個 `Member`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_type: i16,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub delete_flag: bool,
}

impl Member {
    pub const FIELD_COUNT: usize = 6;

    /// 寫出 CSV 時固定輸出的表頭
    pub const HEADER: [&'static str; Self::FIELD_COUNT] =
        ["type", "name", "email", "phone", "address", "deleteFlag"];

    /// Builds a member from the six member columns, in `HEADER` order.
    ///
    /// `line` is only used to locate the failure in the returned error.
    pub fn from_row<S: AsRef<str>>(fields: &[S], line: u64) -> Result<Self> {
        if fields.len() != Self::FIELD_COUNT {
            return Err(BatchError::validation(
                line,
                format!(
                    "expected {} fields, found {}",
                    Self::FIELD_COUNT,
                    fields.len()
                ),
            ));
        }

        let member_type = parse_small_int("type", fields[0].as_ref(), line)?;
        let delete_flag = parse_flag("deleteFlag", fields[5].as_ref(), line)?;

        Ok(Self {
            member_type,
            name: fields[1].as_ref().to_string(),
            email: fields[2].as_ref().to_string(),
            phone: fields[3].as_ref().to_string(),
            address: fields[4].as_ref().to_string(),
            delete_flag,
        })
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.member_type.to_string(),
            self.name.clone(),
            self.email.clone(),
            self.phone.clone(),
            self.address.clone(),
            if self.delete_flag { "1" } else { "0" }.to_string(),
        ]
    }
}

fn parse_small_int(column: &str, raw: &str, line: u64) -> Result<i16> {
    raw.parse::<i16>().map_err(|e| {
        BatchError::validation(
            line,
            format!("column '{}' expects a small integer, got '{}' ({})", column, raw, e),
        )
    })
}

fn parse_flag(column: &str, raw: &str, line: u64) -> Result<bool> {
    match raw {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(BatchError::validation(
            line,
            format!("column '{}' expects 0 or 1, got '{}'", column, other),
        )),
    }
}

/// 一次轉檔作業的結果；失敗以 `BatchError` 傳遞
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchResult {
    Success,
    NoData,
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchResult::Success => f.write_str("SUCCESS"),
            BatchResult::NoData => f.write_str("NO_DATA"),
        }
    }
}

/// `bulk_query` 的查詢條件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberCriteria {
    #[default]
    All,
    /// 只取 `delete_flag = 0` 的資料
    Active,
}

impl MemberCriteria {
    pub fn matches(&self, member: &Member) -> bool {
        match self {
            MemberCriteria::All => true,
            MemberCriteria::Active => !member.delete_flag,
        }
    }
}
