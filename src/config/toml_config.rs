use crate::domain::model::MemberCriteria;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{BatchError, Result};
use crate::utils::validation::{
    validate_database_url, validate_non_empty_string, validate_path, validate_positive_number,
    validate_sql_identifier, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub batch: BatchInfo,
    pub csv_to_db: CsvToDbConfig,
    pub db_to_csv: DbToCsvConfig,
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInfo {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvToDbConfig {
    pub source_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbToCsvConfig {
    pub destination_path: PathBuf,
    /// 匯出時排除 `delete_flag = 1` 的資料
    pub exclude_deleted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub table: String,
    pub max_connections: Option<u32>,
    pub connect_timeout_seconds: Option<u64>,
}

impl DatabaseConfig {
    pub fn max_connections(&self) -> u32 {
        self.max_connections.unwrap_or(5)
    }

    pub fn connect_timeout_seconds(&self) -> u64 {
        self.connect_timeout_seconds.unwrap_or(30)
    }
}

impl BatchConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BatchError::Config {
                message: format!("config file '{}' not found", path.display()),
            },
            _ => BatchError::Io(e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| BatchError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATABASE_URL})，未設定的保留原字串
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("batch.name", &self.batch.name)?;
        validate_path(
            "csv_to_db.source_path",
            &self.csv_to_db.source_path.to_string_lossy(),
        )?;
        validate_path(
            "db_to_csv.destination_path",
            &self.db_to_csv.destination_path.to_string_lossy(),
        )?;

        if let Some(database) = &self.database {
            if database.url.contains("${") {
                return Err(BatchError::MissingConfig {
                    field: format!("database.url (unresolved variable in '{}')", database.url),
                });
            }
            validate_database_url("database.url", &database.url)?;
            validate_sql_identifier("database.table", &database.table)?;
            validate_positive_number("database.max_connections", database.max_connections(), 1)?;
        }

        Ok(())
    }

    pub fn database(&self) -> Result<&DatabaseConfig> {
        crate::utils::validation::validate_required_field("database", &self.database)
    }
}

impl ConfigProvider for BatchConfig {
    fn csv_source_path(&self) -> &Path {
        &self.csv_to_db.source_path
    }

    fn csv_destination_path(&self) -> &Path {
        &self.db_to_csv.destination_path
    }

    fn export_criteria(&self) -> MemberCriteria {
        if self.db_to_csv.exclude_deleted.unwrap_or(false) {
            MemberCriteria::Active
        } else {
            MemberCriteria::All
        }
    }
}

impl Validate for BatchConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
