pub mod config;
pub mod entities;
pub mod error;
pub mod models;

// ============ 重新导出常用类型 ============

// 错误处理
pub use error::{Result as SiteSslResult, SiteSslError};

// 配置相关
pub use config::AppConfig;

// 站点 SSL 状态
pub use models::{SslStatus, SslUploadReport};

// 兼容性别名（Result 是更常用的名称）
pub use error::Result;
