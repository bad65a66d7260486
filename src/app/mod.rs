pub mod csv_to_db;
pub mod db_to_csv;
pub mod jobs;

pub use csv_to_db::CsvToDbLogic;
pub use db_to_csv::DbToCsvLogic;
pub use jobs::{build_registry, register_jobs, CSV_TO_DB, DB_TO_CSV};
