use anyhow::{Result, anyhow};
use std::env;
use std::path::PathBuf;

/// 每个上传缓冲区的默认上限（字节）
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub max_upload_bytes: u64,
    pub trust_anchors_path: Option<PathBuf>,
    pub require_trusted_chain: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            trust_anchors_path: None,
            require_trusted_chain: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // Load .env early so process env reads pick it up.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let max_upload_bytes = env_u64(&lookup, "SSL_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(anyhow!("SSL_MAX_UPLOAD_BYTES must be greater than zero"));
        }
        let trust_anchors_path = lookup("SSL_TRUST_ANCHORS")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let require_trusted_chain = env_bool(&lookup, "SSL_REQUIRE_TRUSTED_CHAIN", false);

        Ok(Self {
            database_url,
            max_upload_bytes,
            trust_anchors_path,
            require_trusted_chain,
        })
    }

    /// 需要访问站点记录的命令使用
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| anyhow!("DATABASE_URL is required for commands that touch sites"))
    }
}

fn env_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key) {
        Some(value) => matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"),
        None => default,
    }
}

fn env_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
