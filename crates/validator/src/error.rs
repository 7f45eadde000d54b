//! 证书/私钥检查过程中的内部错误
//!
//! 这些错误只在流水线内部流转，由 orchestrator 按所处阶段映射成面向用户的 `RejectReason`。

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SslError {
    /// 找不到 PEM 块，或 base64 内容无法解码
    #[error("malformed PEM: {0}")]
    MalformedPem(String),

    /// 私钥带口令保护
    #[error("private key is passphrase protected")]
    KeyEncrypted,

    /// 不是可识别的私钥结构
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// 不是合法的 X.509 证书
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// 没有任何证书的公钥与上传的私钥匹配
    #[error("no uploaded certificate matches the private key")]
    KeyMismatch,

    /// 证书链在某一环断开
    #[error("certificate at chain index {index} ({subject}) has no valid issuer among the uploaded certificates")]
    BrokenChain { index: usize, subject: String },

    /// 链顶无法追溯到受信任的根证书
    #[error("certificate chain ending at {subject} is not issued by a trusted root")]
    UntrustedChain { subject: String },
}

impl SslError {
    pub fn malformed_pem(msg: impl Into<String>) -> Self {
        Self::MalformedPem(msg.into())
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    pub fn invalid_certificate(msg: impl Into<String>) -> Self {
        Self::InvalidCertificate(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SslError>;
