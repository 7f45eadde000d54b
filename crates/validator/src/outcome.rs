//! 校验结果
//!
//! `ValidationOutcome` 是唯一会越过边界进入持久化层的产物。

use crate::cert::CertificateSummary;
use crate::key::KeyAlgorithm;
use serde::Serialize;
use std::fmt;

/// 面向用户的拒绝类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingMaterial,
    CouldNotProcessKey,
    CouldNotProcessCertificate,
    CertificateExpired,
    CertificateNotYetValid,
    DomainNotSigned,
    BrokenChain,
}

impl RejectReason {
    /// 稳定的机器可读代码
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingMaterial => "missing_material",
            Self::CouldNotProcessKey => "could_not_process_key",
            Self::CouldNotProcessCertificate => "could_not_process_certificate",
            Self::CertificateExpired => "certificate_expired",
            Self::CertificateNotYetValid => "certificate_not_yet_valid",
            Self::DomainNotSigned => "domain_not_signed",
            Self::BrokenChain => "broken_chain",
        }
    }

    /// 展示给账户所有者的提示
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingMaterial => "SSL key and certificate are required",
            Self::CouldNotProcessKey => {
                "Could not process SSL key, please make sure it is a valid unencrypted key"
            }
            Self::CouldNotProcessCertificate => {
                "Could not process SSL certificate, please make sure it is valid and matches the key"
            }
            Self::CertificateExpired => "SSL certificate has expired, please create a new one",
            Self::CertificateNotYetValid => "SSL certificate is not valid yet",
            Self::DomainNotSigned => "SSL certificate does not cover your domain",
            Self::BrokenChain => {
                "There is something wrong with your certificate chain, please make sure the certificates are complete and correctly ordered"
            }
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub reason: RejectReason,
    /// 内部失败细节，便于排查
    pub detail: String,
}

impl Rejection {
    pub fn new(reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    pub fn message(&self) -> &'static str {
        self.reason.message()
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason.message())
    }
}

/// 通过校验的私钥与证书
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedPair {
    /// 规范化的私钥 PEM
    #[serde(skip_serializing)]
    pub key_pem: String,
    /// 规范化的证书包 PEM，保持上传顺序
    pub cert_pem: String,
    pub key_algorithm: KeyAlgorithm,
    pub key_bits: usize,
    pub leaf: CertificateSummary,
    pub chain_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Accepted(AcceptedPair),
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn accepted(&self) -> Option<&AcceptedPair> {
        match self {
            Self::Accepted(pair) => Some(pair),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        self.rejection().map(|rejection| rejection.reason)
    }
}

impl From<std::result::Result<AcceptedPair, Rejection>> for ValidationOutcome {
    fn from(result: std::result::Result<AcceptedPair, Rejection>) -> Self {
        match result {
            Ok(pair) => Self::Accepted(pair),
            Err(rejection) => Self::Rejected(rejection),
        }
    }
}
