//! 站点 SSL 设置的统一错误类型
//!
//! 校验流程内部的失败都收敛成 `Rejection`，这里只多出与站点记录相关的情况。

use sitessl_validator::{RejectReason, Rejection};
use thiserror::Error;

/// 站点 SSL 设置错误
#[derive(Error, Debug)]
pub enum SiteSslError {
    /// 站点不存在 (404)
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 请求参数错误 (400)
    #[error("请求参数错误: {0}")]
    BadRequest(String),

    /// 站点还没有配置自定义域名 (400)
    #[error("Cannot upload SSL certificate until domain is added")]
    DomainRequired,

    /// 私钥或证书未通过校验 (422)
    #[error("{}", .0.message())]
    Rejected(Rejection),

    /// 数据库错误 (500)
    #[error("数据库错误: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// 其他内部错误 (500)
    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SiteSslError {
    /// 创建未找到错误
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// 创建参数错误
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// 校验被拒绝时的原因
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected(rejection) => Some(rejection.reason),
            _ => None,
        }
    }

    /// 判断是否为客户端错误（4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::BadRequest(_) | Self::DomainRequired | Self::Rejected(_)
        )
    }

    /// 获取 HTTP 状态码
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::BadRequest(_) | Self::DomainRequired => 400,
            Self::Rejected(_) => 422,
            _ => 500,
        }
    }
}

impl From<Rejection> for SiteSslError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// 站点 SSL Result 类型别名
pub type Result<T> = std::result::Result<T, SiteSslError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn db_error() -> SiteSslError {
        SiteSslError::Database(sea_orm::DbErr::Conn(sea_orm::RuntimeErr::Internal(
            "test".to_string(),
        )))
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(SiteSslError::not_found("site").http_status_code(), 404);
        assert_eq!(SiteSslError::bad_request("too big").http_status_code(), 400);
        assert_eq!(SiteSslError::DomainRequired.http_status_code(), 400);
        assert_eq!(
            SiteSslError::Rejected(Rejection::new(RejectReason::BrokenChain, "index 0"))
                .http_status_code(),
            422
        );
        assert_eq!(db_error().http_status_code(), 500);
    }

    #[test]
    fn test_classification() {
        assert!(SiteSslError::not_found("site").is_client_error());
        assert!(SiteSslError::DomainRequired.is_client_error());
        assert!(!db_error().is_client_error());
        assert!(!SiteSslError::Internal(anyhow::anyhow!("boom")).is_client_error());
    }

    #[test]
    fn test_rejection_uses_user_message() {
        let err: SiteSslError =
            Rejection::new(RejectReason::CertificateExpired, "expired yesterday").into();
        assert_eq!(err.reject_reason(), Some(RejectReason::CertificateExpired));
        assert!(err.to_string().to_lowercase().contains("ssl certificate has expired"));
    }

    #[test]
    fn test_domain_required_message() {
        let err = SiteSslError::DomainRequired;
        assert_eq!(
            err.to_string(),
            "Cannot upload SSL certificate until domain is added"
        );
        assert_eq!(err.reject_reason(), None);
    }
}
