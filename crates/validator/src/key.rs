//! 私钥检查
//!
//! 支持的格式是封闭集合：RSA（PKCS#1 / PKCS#8）与 ECDSA P-256（SEC1 / PKCS#8）。
//! 带口令的私钥一律拒绝，平台必须能够无人值守地加载私钥。

use crate::decoder::{BlockKind, PemBlock};
use crate::error::{Result, SslError};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePrivateKey as _;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    Rsa,
    EcdsaP256,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => write!(f, "RSA"),
            Self::EcdsaP256 => write!(f, "ECDSA P-256"),
        }
    }
}

/// 可与证书公钥直接比较的公钥材料
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyMaterial {
    /// 大端字节，已去掉前导零
    Rsa { modulus: Vec<u8>, exponent: Vec<u8> },
    /// 未压缩 SEC1 点
    EcP256 { point: Vec<u8> },
}

impl PublicKeyMaterial {
    pub fn rsa(modulus: &[u8], exponent: &[u8]) -> Self {
        Self::Rsa {
            modulus: strip_leading_zeros(modulus).to_vec(),
            exponent: strip_leading_zeros(exponent).to_vec(),
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Rsa { .. } => KeyAlgorithm::Rsa,
            Self::EcP256 { .. } => KeyAlgorithm::EcdsaP256,
        }
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// 已确认可用、未加密的私钥
#[derive(Clone)]
pub struct PrivateKey {
    algorithm: KeyAlgorithm,
    bits: usize,
    public_key: PublicKeyMaterial,
    block: PemBlock,
}

impl PrivateKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn public_key(&self) -> &PublicKeyMaterial {
        &self.public_key
    }

    /// 规范化后的私钥 PEM
    pub fn to_pem(&self) -> String {
        self.block.to_pem()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm)
            .field("bits", &self.bits)
            .finish_non_exhaustive()
    }
}

/// 检查私钥块。
///
/// 加密封装返回 `KeyEncrypted`；不是可识别的私钥结构返回 `InvalidKey`。
pub fn inspect_key(block: &PemBlock) -> Result<PrivateKey> {
    if block.is_encrypted() {
        return Err(SslError::KeyEncrypted);
    }

    let der = block.der();
    let (algorithm, bits, public_key) = match block.kind() {
        BlockKind::RsaPrivateKey => {
            let key = RsaPrivateKey::from_pkcs1_der(der)
                .map_err(|err| SslError::invalid_key(format!("PKCS#1: {err}")))?;
            rsa_parts(&key)
        }
        BlockKind::EcPrivateKey => {
            let key = p256::SecretKey::from_sec1_der(der)
                .map_err(|err| SslError::invalid_key(format!("SEC1: {err}")))?;
            p256_parts(&key)
        }
        BlockKind::PrivateKey => pkcs8_parts(der)?,
        _ => {
            return Err(SslError::invalid_key(format!(
                "{} is not a private key",
                block.label()
            )));
        }
    };

    debug!(%algorithm, bits, "inspected private key");
    Ok(PrivateKey {
        algorithm,
        bits,
        public_key,
        block: block.clone(),
    })
}

fn pkcs8_parts(der: &[u8]) -> Result<(KeyAlgorithm, usize, PublicKeyMaterial)> {
    if let Ok(key) = RsaPrivateKey::from_pkcs8_der(der) {
        return Ok(rsa_parts(&key));
    }
    if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
        return Ok(p256_parts(&key));
    }
    Err(SslError::invalid_key(
        "PKCS#8 key is neither RSA nor ECDSA P-256",
    ))
}

fn rsa_parts(key: &RsaPrivateKey) -> (KeyAlgorithm, usize, PublicKeyMaterial) {
    let public_key = PublicKeyMaterial::rsa(&key.n().to_bytes_be(), &key.e().to_bytes_be());
    (KeyAlgorithm::Rsa, key.size() * 8, public_key)
}

fn p256_parts(key: &p256::SecretKey) -> (KeyAlgorithm, usize, PublicKeyMaterial) {
    let point = key.public_key().to_encoded_point(false);
    (
        KeyAlgorithm::EcdsaP256,
        256,
        PublicKeyMaterial::EcP256 {
            point: point.as_bytes().to_vec(),
        },
    )
}
