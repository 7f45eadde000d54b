//! 证书检查
//!
//! 解析单个证书块，提取 CN、SAN DNS 名称（通配符原样保留）、有效期、签发者与公钥。
//! 解析出的 `Certificate` 不可变；签名校验时按需从保存的 DER 重新解析。

use crate::decoder::PemBlock;
use crate::error::{Result, SslError};
use crate::key::PublicKeyMaterial;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use x509_parser::oid_registry::OID_EC_P256;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;
use x509_parser::time::ASN1Time;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    subject_raw: Vec<u8>,
    issuer: String,
    issuer_raw: Vec<u8>,
    common_name: Option<String>,
    dns_names: Vec<String>,
    serial: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    is_ca: bool,
    public_key: Option<PublicKeyMaterial>,
}

/// 面向调用方展示的证书摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub common_name: Option<String>,
    pub dns_names: Vec<String>,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// 解析证书块，失败返回 `InvalidCertificate`
pub fn inspect_cert(block: &PemBlock) -> Result<Certificate> {
    Certificate::from_der(block.der().to_vec())
}

impl Certificate {
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let parsed = {
            let (_, cert) = parse_x509_certificate(&der)
                .map_err(|err| SslError::invalid_certificate(err.to_string()))?;

            let common_name = cert
                .subject()
                .iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok())
                .map(str::to_string);

            let dns_names = match cert.subject_alternative_name() {
                Ok(Some(san)) => san
                    .value
                    .general_names
                    .iter()
                    .filter_map(|name| match name {
                        GeneralName::DNSName(dns) => Some(dns.to_string()),
                        _ => None,
                    })
                    .collect(),
                Ok(None) => Vec::new(),
                Err(err) => {
                    return Err(SslError::invalid_certificate(format!(
                        "subjectAltName: {err}"
                    )));
                }
            };

            let is_ca = cert
                .basic_constraints()
                .ok()
                .flatten()
                .is_some_and(|bc| bc.value.ca);

            Self {
                subject: cert.subject().to_string(),
                subject_raw: cert.subject().as_raw().to_vec(),
                issuer: cert.issuer().to_string(),
                issuer_raw: cert.issuer().as_raw().to_vec(),
                common_name,
                dns_names,
                serial: cert.raw_serial_as_string(),
                not_before: asn1_to_utc(cert.validity().not_before)?,
                not_after: asn1_to_utc(cert.validity().not_after)?,
                is_ca,
                public_key: public_key_material(cert.public_key()),
                der: Vec::new(),
            }
        };
        debug!(
            subject = %parsed.subject,
            issuer = %parsed.issuer,
            not_after = %parsed.not_after,
            "inspected certificate"
        );
        Ok(Self { der, ..parsed })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// `now` 落在有效期内（含两端）
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    pub fn is_ca(&self) -> bool {
        self.is_ca
    }

    /// 不支持的公钥算法返回 `None`，这样的证书无法与任何私钥匹配
    pub fn public_key(&self) -> Option<&PublicKeyMaterial> {
        self.public_key.as_ref()
    }

    pub fn matches_key(&self, key: &PublicKeyMaterial) -> bool {
        self.public_key.as_ref() == Some(key)
    }

    pub fn is_self_issued(&self) -> bool {
        self.names_issuer_of(self)
    }

    /// `issuer` 的主体名等于本证书的签发者名
    pub fn names_issuer_of(&self, child: &Certificate) -> bool {
        self.subject_raw == child.issuer_raw || self.subject == child.issuer
    }

    /// 本证书的签名能用 `issuer` 的公钥验证通过
    pub fn is_signed_by(&self, issuer: &Certificate) -> bool {
        let (Ok((_, child)), Ok((_, parent))) = (
            parse_x509_certificate(&self.der),
            parse_x509_certificate(&issuer.der),
        ) else {
            return false;
        };
        match child.verify_signature(Some(parent.public_key())) {
            Ok(()) => true,
            Err(err) => {
                debug!(
                    subject = %self.subject,
                    issuer = %issuer.subject,
                    error = %err,
                    "signature verification failed"
                );
                false
            }
        }
    }

    /// 名称链接与密码学链接同时成立
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        issuer.names_issuer_of(self) && self.is_signed_by(issuer)
    }

    /// 证书是否覆盖域名 `domain`：
    /// 等于 CN 或某个 SAN；或者某个 `*.X` 条目满足 `domain == X`，
    /// 或 `domain` 恰好是 `X` 的直接子域名。
    pub fn covers_domain(&self, domain: &str) -> bool {
        let domain = normalize_name(domain);
        if domain.is_empty() {
            return false;
        }
        self.common_name
            .iter()
            .chain(self.dns_names.iter())
            .any(|entry| name_matches(&normalize_name(entry), &domain))
    }

    pub fn summary(&self) -> CertificateSummary {
        CertificateSummary {
            subject: self.subject.clone(),
            issuer: self.issuer.clone(),
            common_name: self.common_name.clone(),
            dns_names: self.dns_names.clone(),
            serial: self.serial.clone(),
            not_before: self.not_before,
            not_after: self.not_after,
        }
    }
}

fn public_key_material(spki: &SubjectPublicKeyInfo) -> Option<PublicKeyMaterial> {
    match spki.parsed().ok()? {
        PublicKey::RSA(rsa) => Some(PublicKeyMaterial::rsa(rsa.modulus, rsa.exponent)),
        PublicKey::EC(point) => {
            let curve = spki.algorithm.parameters.as_ref()?.as_oid().ok()?;
            (curve == OID_EC_P256).then(|| PublicKeyMaterial::EcP256 {
                point: point.data().to_vec(),
            })
        }
        _ => None,
    }
}

fn asn1_to_utc(time: ASN1Time) -> Result<DateTime<Utc>> {
    let dt = time.to_datetime();
    DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
        .ok_or_else(|| SslError::invalid_certificate("invalid certificate timestamp"))
}

fn normalize_name(name: &str) -> String {
    let name = name.trim();
    name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase()
}

fn name_matches(pattern: &str, domain: &str) -> bool {
    if pattern == domain {
        return true;
    }
    let Some(base) = pattern.strip_prefix("*.") else {
        return false;
    };
    if base.is_empty() {
        return false;
    }
    if domain == base {
        return true;
    }
    domain
        .strip_suffix(base)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .is_some_and(|label| !label.is_empty() && !label.contains('.'))
}
