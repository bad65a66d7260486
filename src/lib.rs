pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::BatchConfig;

pub use adapters::InMemoryMemberRepository;
#[cfg(feature = "postgres")]
pub use adapters::PgMemberRepository;
pub use core::job::{ExitStatus, JobLauncher, JobRegistry, JobRun, RunStatus};
pub use domain::model::{BatchResult, Member, MemberCriteria};
pub use utils::error::{BatchError, ErrorKind, Result};
