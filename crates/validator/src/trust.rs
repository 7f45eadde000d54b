//! 信任锚
//!
//! 系统根证书库属于外部能力，这里只定义"某个签发者是否可信"的接口，
//! 另外提供一个从 PEM 文件加载根证书的实现。

use crate::cert::{Certificate, inspect_cert};
use crate::decoder::decode;
use crate::error::{Result, SslError};
use std::fmt;
use tracing::debug;

pub trait TrustAnchors: Send + Sync + fmt::Debug {
    /// 是否配置了任何信任锚；未配置时跳过信任校验
    fn is_configured(&self) -> bool;

    /// `cert` 本身就是信任锚，或由某个信任锚签发
    fn is_trusted_issuer(&self, cert: &Certificate) -> bool;
}

/// 默认实现：不做信任锚校验
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrustAnchors;

impl TrustAnchors for NoTrustAnchors {
    fn is_configured(&self) -> bool {
        false
    }

    fn is_trusted_issuer(&self, _cert: &Certificate) -> bool {
        false
    }
}

/// 从 PEM 证书包加载的根证书集合
#[derive(Debug, Clone, Default)]
pub struct PemTrustStore {
    anchors: Vec<Certificate>,
}

impl PemTrustStore {
    pub fn from_pem(bytes: &[u8]) -> Result<Self> {
        let decoded = decode(bytes)?;
        let anchors = decoded
            .certificate_blocks()
            .into_iter()
            .map(inspect_cert)
            .collect::<Result<Vec<_>>>()?;
        if anchors.is_empty() {
            return Err(SslError::malformed_pem(
                "trust anchor bundle contains no certificates",
            ));
        }
        debug!(anchors = anchors.len(), "loaded trust anchors");
        Ok(Self { anchors })
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl TrustAnchors for PemTrustStore {
    fn is_configured(&self) -> bool {
        !self.anchors.is_empty()
    }

    fn is_trusted_issuer(&self, cert: &Certificate) -> bool {
        self.anchors
            .iter()
            .any(|anchor| anchor.der() == cert.der() || cert.is_issued_by(anchor))
    }
}
