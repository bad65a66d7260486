pub mod csv_io;
pub mod job;

pub use crate::domain::model::{BatchResult, Member, MemberCriteria};
pub use crate::domain::ports::{ConfigProvider, MemberRepository};
pub use crate::utils::error::Result;
