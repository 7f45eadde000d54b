use serde::Serialize;
use sitessl_validator::{AcceptedPair, CertificateSummary, KeyAlgorithm};
use std::fmt;

/// 站点自定义域名的 SSL 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SslStatus {
    Installed,
    Inactive,
}

impl SslStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Inactive => "inactive",
        }
    }

    /// 私钥与证书都已保存才算已安装
    pub fn from_stored(ssl_key: Option<&str>, ssl_cert: Option<&str>) -> Self {
        match (ssl_key, ssl_cert) {
            (Some(_), Some(_)) => Self::Installed,
            _ => Self::Inactive,
        }
    }
}

impl fmt::Display for SslStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 上传成功后返回给调用方的摘要，不包含私钥
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SslUploadReport {
    pub status: SslStatus,
    pub domain: String,
    pub key_algorithm: KeyAlgorithm,
    pub key_bits: usize,
    pub leaf: CertificateSummary,
    pub chain_length: usize,
}

impl SslUploadReport {
    pub fn new(domain: impl Into<String>, pair: &AcceptedPair) -> Self {
        Self {
            status: SslStatus::Installed,
            domain: domain.into(),
            key_algorithm: pair.key_algorithm,
            key_bits: pair.key_bits,
            leaf: pair.leaf.clone(),
            chain_length: pair.chain_length,
        }
    }
}
