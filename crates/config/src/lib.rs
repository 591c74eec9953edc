//! 统一配置中心
//!
//! 加载顺序：内置默认值 -> 可选配置文件（`APP_CONFIG_FILE`）-> 环境变量（`APP_` 前缀，
//! 嵌套字段用 `__` 分隔，例如 `APP_SERVER__PORT=5000`）。

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// 服务配置
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    /// 数据库配置
    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseConfig,
    /// 聊天相关配置
    #[serde(default)]
    #[validate(nested)]
    pub chat: ChatConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            cors_origins: vec!["*".into()],
        }
    }
}

/// 数据库配置
///
/// 未配置 `url` 时使用内存消息存储，只适合开发和测试。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    #[validate(url)]
    pub url: Option<String>,
    #[validate(range(min = 1))]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// 历史消息配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_history_limits"))]
pub struct ChatConfig {
    /// 历史接口默认返回的条数
    #[validate(range(min = 1))]
    pub history_limit: u32,
    /// 调用方通过 `?limit=` 能请求的上限
    #[validate(range(min = 1))]
    pub max_history_limit: u32,
    /// 每个连接出站队列的容量，队列满时丢弃发给该连接的事件
    #[validate(range(min = 1))]
    pub outbound_queue_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            max_history_limit: 200,
            outbound_queue_capacity: 1000,
        }
    }
}

fn validate_history_limits(chat: &ChatConfig) -> Result<(), validator::ValidationError> {
    if chat.history_limit > chat.max_history_limit {
        return Err(validator::ValidationError::new("history_limit_exceeds_max"));
    }
    Ok(())
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl AppConfig {
    /// 按默认值 -> 文件 -> 环境变量的顺序加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            figment = merge_file(figment, &path);
        }
        Self::from_figment(figment.merge(Env::prefixed("APP_").split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 日志用的脱敏表示，隐藏数据库地址中的凭据
    pub fn sanitize(&self) -> String {
        let database = match &self.database.url {
            Some(url) => match url.rsplit_once('@') {
                Some((_, host)) => format!("[REDACTED]@{host}"),
                None => url.clone(),
            },
            None => "in-memory".to_string(),
        };
        format!(
            "server={} database={} history_limit={}",
            self.bind_address(),
            database,
            self.chat.history_limit
        )
    }
}

fn merge_file(figment: Figment, path: &str) -> Figment {
    if path.ends_with(".yml") || path.ends_with(".yaml") {
        figment.merge(Yaml::file(path))
    } else if path.ends_with(".json") {
        figment.merge(Json::file(path))
    } else {
        figment.merge(Toml::file(path))
    }
}
