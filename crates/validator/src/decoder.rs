//! PEM 解码
//!
//! 把上传的原始字节拆成一个个带类型的 PEM 块，保持上传时的先后顺序。
//! 一个缓冲区里可以同时有私钥块和多个证书块。

use crate::error::{Result, SslError};
use pem::{EncodeConfig, LineEnding, Pem};
use std::fmt;
use tracing::debug;

/// PEM 块类型（按 BEGIN 标签区分）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// PKCS#1 RSA 私钥
    RsaPrivateKey,
    /// PKCS#8 私钥
    PrivateKey,
    /// SEC1 椭圆曲线私钥
    EcPrivateKey,
    /// PKCS#8 加密私钥
    EncryptedPrivateKey,
    Certificate,
    Other,
}

impl BlockKind {
    fn from_label(label: &str) -> Self {
        match label {
            "RSA PRIVATE KEY" => Self::RsaPrivateKey,
            "PRIVATE KEY" => Self::PrivateKey,
            "EC PRIVATE KEY" => Self::EcPrivateKey,
            "ENCRYPTED PRIVATE KEY" => Self::EncryptedPrivateKey,
            "CERTIFICATE" | "X509 CERTIFICATE" => Self::Certificate,
            _ => Self::Other,
        }
    }

    pub fn is_private_key(&self) -> bool {
        matches!(
            self,
            Self::RsaPrivateKey | Self::PrivateKey | Self::EcPrivateKey | Self::EncryptedPrivateKey
        )
    }
}

/// 单个 PEM 块
#[derive(Clone, PartialEq, Eq)]
pub struct PemBlock {
    kind: BlockKind,
    label: String,
    der: Vec<u8>,
    legacy_encrypted: bool,
}

impl PemBlock {
    fn from_pem(pem: Pem) -> Self {
        // OpenSSL 传统格式的加密私钥：标签不变，靠 Proc-Type 头标记
        let legacy_encrypted = pem
            .headers()
            .get("Proc-Type")
            .is_some_and(|value| value.contains("ENCRYPTED"));
        let label = pem.tag().to_string();
        Self {
            kind: BlockKind::from_label(&label),
            label,
            der: pem.into_contents(),
            legacy_encrypted,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// 是否带口令保护（PKCS#8 加密封装，或传统 Proc-Type 头）
    pub fn is_encrypted(&self) -> bool {
        self.kind == BlockKind::EncryptedPrivateKey || self.legacy_encrypted
    }

    /// 规范化输出：LF 换行，64 列折行，不带任何头字段
    pub fn to_pem(&self) -> String {
        encode_normalized(std::slice::from_ref(self))
    }
}

// 私钥内容不进日志
impl fmt::Debug for PemBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemBlock")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("der_len", &self.der.len())
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

/// 一次上传解码后的全部 PEM 块
#[derive(Debug, Clone)]
pub struct DecodedPem {
    blocks: Vec<PemBlock>,
}

impl DecodedPem {
    pub fn blocks(&self) -> &[PemBlock] {
        &self.blocks
    }

    /// 第一个私钥块
    pub fn key_block(&self) -> Option<&PemBlock> {
        self.blocks.iter().find(|block| block.kind.is_private_key())
    }

    /// 所有证书块，按上传顺序
    pub fn certificate_blocks(&self) -> Vec<&PemBlock> {
        self.blocks
            .iter()
            .filter(|block| block.kind == BlockKind::Certificate)
            .collect()
    }
}

/// 解码原始上传字节。
///
/// 找不到任何 PEM 块，或某个块的 base64 内容无法解码时返回 `MalformedPem`。
pub fn decode(bytes: &[u8]) -> Result<DecodedPem> {
    let parsed = pem::parse_many(bytes).map_err(|err| SslError::malformed_pem(err.to_string()))?;
    if parsed.is_empty() {
        return Err(SslError::malformed_pem("no PEM block found"));
    }

    let blocks: Vec<PemBlock> = parsed.into_iter().map(PemBlock::from_pem).collect();
    debug!(
        blocks = blocks.len(),
        labels = ?blocks.iter().map(|b| b.label.as_str()).collect::<Vec<_>>(),
        "decoded PEM upload"
    );
    Ok(DecodedPem { blocks })
}

/// 把多个块按给定顺序拼成一个规范化 PEM 文本
pub fn encode_normalized(blocks: &[PemBlock]) -> String {
    blocks
        .iter()
        .map(|block| {
            let armored = Pem::new(block.label.clone(), block.der.clone());
            pem::encode_config(&armored, EncodeConfig::new().set_line_ending(LineEnding::LF))
        })
        .collect()
}
