use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// 系统操作日志保留天数
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,

    /// CORS 允许的 origins 列表，为空时允许所有来源（开发模式）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            log_retention_days: default_log_retention_days(),
            cors_allowed_origins: Vec::new(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

// ---- Dictionaries seed file types (used by `init-dictionaries` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionariesSeedFile {
    #[serde(default)]
    pub dictionaries: Vec<SeedDictionary>,
    #[serde(default)]
    pub dictionary_types: Option<Vec<SeedDictionaryType>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDictionaryType {
    pub dict_type: String,
    pub dict_type_label: String,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDictionary {
    pub dict_type: String,
    pub dict_key: String,
    pub dict_label: String,
    #[serde(default)]
    pub dict_value: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub is_system: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
}

// ---- Regions seed file types (used by `init-regions` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionsSeedFile {
    #[serde(default)]
    pub regions: Vec<SeedRegion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRegion {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub parent_code: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

// ---- Products seed file types (used by `init-products` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductsSeedFile {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

fn default_seed_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 本地数据目录
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// 完整连接 URL；缺省为 `sqlite://<data_dir>/emsurvey.db?mode=rwc`
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            url: None,
        }
    }
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        match self.url {
            Some(ref url) => url.clone(),
            None => format!(
                "sqlite://{}/emsurvey.db?mode=rwc",
                self.data_dir.trim_end_matches('/')
            ),
        }
    }

    /// 日志输出用：隐藏 URL 中的密码部分
    pub fn redacted_url(&self) -> String {
        let url = self.connection_url();
        let Some((scheme, rest)) = url.split_once("://") else {
            return url;
        };
        let Some((userinfo, host)) = rest.split_once('@') else {
            return url;
        };
        match userinfo.split_once(':') {
            Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
            None => url,
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_log_retention_days() -> u32 {
    90
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_expire_secs")]
    pub token_expire_secs: u64,
    #[serde(default = "default_username")]
    pub default_username: String,
    #[serde(default = "default_password")]
    pub default_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expire_secs: default_token_expire_secs(),
            default_username: default_username(),
            default_password: default_password(),
        }
    }
}

fn default_token_expire_secs() -> u64 {
    86400
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "changeme".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// 未启用时提交调研单直接使用兜底报告
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ai_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_ai_provider(),
            api_key: None,
            model: None,
            base_url: None,
            timeout_secs: default_ai_timeout_secs(),
            max_tokens: None,
            temperature: None,
        }
    }
}

fn default_ai_provider() -> String {
    "zhipu".to_string()
}

fn default_ai_timeout_secs() -> u64 {
    120
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
