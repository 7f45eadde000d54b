//! 上传校验流程
//!
//! 只有这里知道检查的先后顺序。顺序本身就是约定：用户看到的错误优先级依赖它。
//!
//! 1. 私钥与证书都不能为空
//! 2. 私钥解码 + 检查
//! 3. 证书解码 + 逐个检查
//! 4. 用私钥找出叶子证书（多张匹配时优先当前有效的）
//! 5. 叶子有效期
//! 6. 叶子覆盖账户域名
//! 7. 多于一张证书时校验证书链
//! 8. 返回规范化 PEM

use crate::chain::{assemble, validate_chain};
use crate::decoder::{decode, encode_normalized};
use crate::error::SslError;
use crate::key::inspect_key;
use crate::outcome::{AcceptedPair, RejectReason, Rejection, ValidationOutcome};
use crate::trust::{NoTrustAnchors, TrustAnchors};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ValidatorOptions {
    /// 配置了信任锚时，单张证书（没有中间证书）也必须能追溯到信任锚
    pub require_trusted_chain: bool,
}

/// 上传校验器，无内部可变状态，可在多个请求间共享
#[derive(Debug, Clone)]
pub struct UploadValidator {
    anchors: Arc<dyn TrustAnchors>,
    options: ValidatorOptions,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadValidator {
    pub fn new() -> Self {
        Self {
            anchors: Arc::new(NoTrustAnchors),
            options: ValidatorOptions::default(),
        }
    }

    pub fn with_trust_anchors(mut self, anchors: impl TrustAnchors + 'static) -> Self {
        self.anchors = Arc::new(anchors);
        self
    }

    pub fn with_options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate_upload(
        &self,
        key_bytes: &[u8],
        cert_bytes: &[u8],
        domain: &str,
    ) -> ValidationOutcome {
        self.validate_upload_at(key_bytes, cert_bytes, domain, Utc::now())
    }

    /// 以指定时间点做有效期判断
    pub fn validate_upload_at(
        &self,
        key_bytes: &[u8],
        cert_bytes: &[u8],
        domain: &str,
        now: DateTime<Utc>,
    ) -> ValidationOutcome {
        let result = self.run(key_bytes, cert_bytes, domain, now);
        match &result {
            Ok(pair) => info!(
                domain = %domain,
                subject = %pair.leaf.subject,
                not_after = %pair.leaf.not_after,
                chain_length = pair.chain_length,
                "ssl upload accepted"
            ),
            Err(rejection) => info!(
                domain = %domain,
                reason = %rejection.reason,
                detail = %rejection.detail,
                "ssl upload rejected"
            ),
        }
        result.into()
    }

    fn run(
        &self,
        key_bytes: &[u8],
        cert_bytes: &[u8],
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<AcceptedPair, Rejection> {
        if is_blank(key_bytes) || is_blank(cert_bytes) {
            let missing = match (is_blank(key_bytes), is_blank(cert_bytes)) {
                (true, true) => "key and certificate are empty",
                (true, false) => "key is empty",
                _ => "certificate is empty",
            };
            return Err(Rejection::new(RejectReason::MissingMaterial, missing));
        }

        let key = decode(key_bytes)
            .and_then(|decoded| {
                let block = decoded
                    .key_block()
                    .ok_or_else(|| SslError::invalid_key("no private key block found"))?;
                inspect_key(block)
            })
            .map_err(|err| reject(RejectReason::CouldNotProcessKey, err))?;

        let decoded_certs =
            decode(cert_bytes).map_err(|err| reject(RejectReason::CouldNotProcessCertificate, err))?;
        let cert_blocks = decoded_certs.certificate_blocks();
        let bundle = assemble(&cert_blocks)
            .map_err(|err| reject(RejectReason::CouldNotProcessCertificate, err))?;

        let leaf_index = bundle
            .position_of_key(key.public_key(), now)
            .ok_or_else(|| reject(RejectReason::CouldNotProcessCertificate, SslError::KeyMismatch))?;
        let candidates = bundle.into_leaf_first(leaf_index);
        let leaf = &candidates[0];

        if now > leaf.not_after() {
            return Err(Rejection::new(
                RejectReason::CertificateExpired,
                format!("certificate expired at {}", leaf.not_after()),
            ));
        }
        if now < leaf.not_before() {
            return Err(Rejection::new(
                RejectReason::CertificateNotYetValid,
                format!("certificate is not valid before {}", leaf.not_before()),
            ));
        }

        if !leaf.covers_domain(domain) {
            return Err(Rejection::new(
                RejectReason::DomainNotSigned,
                format!("certificate does not cover {domain}"),
            ));
        }

        let (leaf_summary, chain_length) =
            if candidates.len() > 1 || self.must_anchor_single_leaf() {
                let chain = validate_chain(candidates, self.anchors.as_ref())
                    .map_err(|err| reject(RejectReason::BrokenChain, err))?;
                (chain.leaf().summary(), chain.len())
            } else {
                (leaf.summary(), candidates.len())
            };

        let cert_pem = encode_normalized(
            &cert_blocks.into_iter().cloned().collect::<Vec<_>>(),
        );
        Ok(AcceptedPair {
            key_pem: key.to_pem(),
            cert_pem,
            key_algorithm: key.algorithm(),
            key_bits: key.bits(),
            leaf: leaf_summary,
            chain_length,
        })
    }

    fn must_anchor_single_leaf(&self) -> bool {
        self.options.require_trusted_chain && self.anchors.is_configured()
    }
}

/// 使用默认配置（不校验信任锚）校验一次上传
pub fn validate_upload(key_bytes: &[u8], cert_bytes: &[u8], domain: &str) -> ValidationOutcome {
    UploadValidator::new().validate_upload(key_bytes, cert_bytes, domain)
}

fn reject(reason: RejectReason, err: SslError) -> Rejection {
    Rejection::new(reason, err.to_string())
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::inspect_cert;
    use crate::test_support::{
        expired_leaf, fixtures, future_leaf, generate_key, intermediate_ca, leaf_cert_with_key,
        root_ca, valid_leaf,
    };
    use time::{Duration as TimeDuration, OffsetDateTime};
    use crate::trust::PemTrustStore;
    use chrono::Duration;

    const DOMAIN: &str = "derpie-site.com";

    /// 固定样本的证书从生成时刻起生效，用证书自身的时间作为"现在"
    fn fixture_now(cert_pem: &str) -> DateTime<Utc> {
        let decoded = decode(cert_pem.as_bytes()).unwrap();
        inspect_cert(decoded.certificate_blocks()[0]).unwrap().not_before() + Duration::hours(1)
    }

    fn reason(outcome: &ValidationOutcome) -> Option<RejectReason> {
        outcome.reject_reason()
    }

    #[test]
    fn test_self_signed_pair_is_accepted() {
        let leaf = valid_leaf(DOMAIN, None);
        let outcome = validate_upload(leaf.key_pem.as_bytes(), leaf.cert_pem.as_bytes(), DOMAIN);
        let pair = outcome.accepted().expect("应当接受");
        assert_eq!(pair.chain_length, 1);
        assert_eq!(pair.key_pem, leaf.key_pem);
        assert_eq!(pair.cert_pem, leaf.cert_pem);
        assert_eq!(pair.leaf.common_name.as_deref(), Some("*.derpie-site.com"));
    }

    #[test]
    fn test_accepted_material_round_trips() {
        let leaf = valid_leaf(DOMAIN, None);
        let outcome = validate_upload(leaf.key_pem.as_bytes(), leaf.cert_pem.as_bytes(), DOMAIN);
        let pair = outcome.accepted().unwrap();

        let again = validate_upload(pair.key_pem.as_bytes(), pair.cert_pem.as_bytes(), DOMAIN);
        let again = again.accepted().expect("规范化结果应能再次通过");
        assert_eq!(again.leaf, pair.leaf);
        assert_eq!(again.key_pem, pair.key_pem);

        let original_key = decode(leaf.key_pem.as_bytes()).unwrap();
        let normalized_key = decode(pair.key_pem.as_bytes()).unwrap();
        assert_eq!(
            inspect_key(original_key.key_block().unwrap()).unwrap().public_key(),
            inspect_key(normalized_key.key_block().unwrap()).unwrap().public_key()
        );
    }

    #[test]
    fn test_rsa_fixture_pair_is_accepted() {
        let outcome = UploadValidator::new().validate_upload_at(
            fixtures::RSA_KEY.as_bytes(),
            fixtures::RSA_CERT.as_bytes(),
            fixtures::RSA_DOMAIN,
            fixture_now(fixtures::RSA_CERT),
        );
        let pair = outcome.accepted().expect("RSA 样本应当接受");
        assert_eq!(pair.key_bits, 2048);
        assert_eq!(pair.key_pem, fixtures::RSA_KEY);
        assert_eq!(pair.cert_pem, fixtures::RSA_CERT);
    }

    #[test]
    fn test_rsa_fixture_covers_subdomain() {
        let outcome = UploadValidator::new().validate_upload_at(
            fixtures::RSA_PKCS8_KEY.as_bytes(),
            fixtures::RSA_CERT.as_bytes(),
            "www.example-site.com",
            fixture_now(fixtures::RSA_CERT),
        );
        assert!(outcome.is_accepted(), "{outcome:?}");
    }

    #[test]
    fn test_expired_certificate_is_rejected() {
        let leaf = expired_leaf(DOMAIN, None);
        let outcome = validate_upload(leaf.key_pem.as_bytes(), leaf.cert_pem.as_bytes(), DOMAIN);
        assert_eq!(reason(&outcome), Some(RejectReason::CertificateExpired));
    }

    #[test]
    fn test_expiry_wins_over_domain_and_chain() {
        let root = root_ca("Expiry Root");
        let leaf = expired_leaf(DOMAIN, Some(&root));
        let stranger = root_ca("Stranger");
        let bundle = format!("{}{}", leaf.cert_pem, stranger.pem);
        let outcome = validate_upload(leaf.key_pem.as_bytes(), bundle.as_bytes(), "elsewhere.org");
        assert_eq!(reason(&outcome), Some(RejectReason::CertificateExpired));
    }

    #[test]
    fn test_same_pair_flips_on_clock() {
        let leaf = valid_leaf(DOMAIN, None);
        let validator = UploadValidator::new();
        let later = Utc::now() + Duration::days(400);
        let outcome = validator.validate_upload_at(
            leaf.key_pem.as_bytes(),
            leaf.cert_pem.as_bytes(),
            DOMAIN,
            later,
        );
        assert_eq!(reason(&outcome), Some(RejectReason::CertificateExpired));
    }

    #[test]
    fn test_renewed_certificate_wins_over_expired_twin() {
        let key = generate_key();
        let now = OffsetDateTime::now_utc();
        let expired = leaf_cert_with_key(
            &key,
            DOMAIN,
            now - TimeDuration::days(400),
            now - TimeDuration::days(1),
            None,
        );
        let renewed = leaf_cert_with_key(
            &key,
            DOMAIN,
            now - TimeDuration::days(1),
            now + TimeDuration::days(365),
            None,
        );
        let bundle = format!("{}{}", expired.cert_pem, renewed.cert_pem);
        let outcome = validate_upload(renewed.key_pem.as_bytes(), bundle.as_bytes(), DOMAIN);
        let pair = outcome.accepted().expect("续期证书应当被选为叶子");
        assert!(pair.leaf.not_after > Utc::now());
    }

    #[test]
    fn test_not_yet_valid_certificate_is_rejected() {
        let leaf = future_leaf(DOMAIN, None);
        let outcome = validate_upload(leaf.key_pem.as_bytes(), leaf.cert_pem.as_bytes(), DOMAIN);
        assert_eq!(reason(&outcome), Some(RejectReason::CertificateNotYetValid));
    }

    #[test]
    fn test_missing_material() {
        let leaf = valid_leaf(DOMAIN, None);
        for (key, cert) in [
            ("", ""),
            ("", leaf.cert_pem.as_str()),
            (leaf.key_pem.as_str(), ""),
            ("  \n", leaf.cert_pem.as_str()),
        ] {
            let outcome = validate_upload(key.as_bytes(), cert.as_bytes(), DOMAIN);
            assert_eq!(reason(&outcome), Some(RejectReason::MissingMaterial));
        }
    }

    #[test]
    fn test_encrypted_key_is_rejected_even_with_valid_certificate() {
        let outcome = UploadValidator::new().validate_upload_at(
            fixtures::ENCRYPTED_KEY.as_bytes(),
            fixtures::RSA_CERT.as_bytes(),
            fixtures::RSA_DOMAIN,
            fixture_now(fixtures::RSA_CERT),
        );
        let rejection = outcome.rejection().unwrap();
        assert_eq!(rejection.reason, RejectReason::CouldNotProcessKey);
        assert!(rejection.detail.contains("passphrase"));
    }

    #[test]
    fn test_junk_key_is_rejected() {
        let leaf = valid_leaf(DOMAIN, None);
        let outcome = validate_upload(
            fixtures::INDEX_HTML.as_bytes(),
            leaf.cert_pem.as_bytes(),
            DOMAIN,
        );
        assert_eq!(reason(&outcome), Some(RejectReason::CouldNotProcessKey));

        // 把证书当作私钥上传
        let outcome = validate_upload(leaf.cert_pem.as_bytes(), leaf.cert_pem.as_bytes(), DOMAIN);
        assert_eq!(reason(&outcome), Some(RejectReason::CouldNotProcessKey));
    }

    #[test]
    fn test_junk_certificate_is_rejected() {
        let leaf = valid_leaf(DOMAIN, None);
        let outcome = validate_upload(
            leaf.key_pem.as_bytes(),
            fixtures::INDEX_HTML.as_bytes(),
            DOMAIN,
        );
        assert_eq!(reason(&outcome), Some(RejectReason::CouldNotProcessCertificate));

        // 证书缓冲区里只有私钥
        let outcome = validate_upload(leaf.key_pem.as_bytes(), leaf.key_pem.as_bytes(), DOMAIN);
        assert_eq!(reason(&outcome), Some(RejectReason::CouldNotProcessCertificate));
    }

    #[test]
    fn test_key_certificate_mismatch() {
        let leaf = valid_leaf(DOMAIN, None);
        let other = valid_leaf(DOMAIN, None);
        let outcome = validate_upload(leaf.key_pem.as_bytes(), other.cert_pem.as_bytes(), DOMAIN);
        let rejection = outcome.rejection().unwrap();
        assert_eq!(rejection.reason, RejectReason::CouldNotProcessCertificate);
        assert_eq!(rejection.detail, SslError::KeyMismatch.to_string());
    }

    #[test]
    fn test_domain_not_covered() {
        let leaf = valid_leaf(DOMAIN, None);
        let outcome = validate_upload(
            leaf.key_pem.as_bytes(),
            leaf.cert_pem.as_bytes(),
            "someone-else.com",
        );
        assert_eq!(reason(&outcome), Some(RejectReason::DomainNotSigned));
    }

    #[test]
    fn test_leaf_with_intermediate_in_order() {
        let root = root_ca("Pipeline Root");
        let leaf = valid_leaf(DOMAIN, Some(&root));
        let combined = format!("{}\n{}", leaf.cert_pem, root.pem);
        let outcome = validate_upload(leaf.key_pem.as_bytes(), combined.as_bytes(), DOMAIN);
        let pair = outcome.accepted().expect("有序证书包应当接受");
        assert_eq!(pair.chain_length, 2);
        assert_eq!(pair.cert_pem, format!("{}{}", leaf.cert_pem, root.pem));
    }

    #[test]
    fn test_reversed_bundle_is_accepted_in_upload_order() {
        let root = root_ca("Pipeline Root");
        let leaf = valid_leaf(DOMAIN, Some(&root));
        let reversed = format!("{}\n{}", root.pem, leaf.cert_pem);
        let outcome = validate_upload(leaf.key_pem.as_bytes(), reversed.as_bytes(), DOMAIN);
        let pair = outcome.accepted().expect("颠倒顺序应能自我修正");
        assert_eq!(pair.chain_length, 2);
        assert_eq!(pair.cert_pem, format!("{}{}", root.pem, leaf.cert_pem));
    }

    #[test]
    fn test_intermediate_only_bundle_has_no_leaf() {
        let root = root_ca("Pipeline Root");
        let leaf = valid_leaf(DOMAIN, Some(&root));
        let outcome = validate_upload(leaf.key_pem.as_bytes(), root.pem.as_bytes(), DOMAIN);
        assert_eq!(reason(&outcome), Some(RejectReason::CouldNotProcessCertificate));
    }

    #[test]
    fn test_unlinkable_bundle_is_broken_chain() {
        let root = root_ca("Pipeline Root");
        let intermediate = intermediate_ca("Pipeline Intermediate", &root);
        let leaf = valid_leaf(DOMAIN, Some(&intermediate));
        // 缺少中间证书，只附带了根证书
        let bundle = format!("{}{}", leaf.cert_pem, root.pem);
        let outcome = validate_upload(leaf.key_pem.as_bytes(), bundle.as_bytes(), DOMAIN);
        let rejection = outcome.rejection().unwrap();
        assert_eq!(rejection.reason, RejectReason::BrokenChain);
        assert!(rejection.detail.contains("index 0"));
    }

    #[test]
    fn test_rsa_fixture_chain_in_both_orders() {
        let now = fixture_now(fixtures::CHAIN_LEAF_CERT);
        let validator = UploadValidator::new();
        for bundle in [
            format!("{}\n{}", fixtures::CHAIN_LEAF_CERT, fixtures::CHAIN_CA_CERT),
            format!("{}\n{}", fixtures::CHAIN_CA_CERT, fixtures::CHAIN_LEAF_CERT),
        ] {
            let outcome = validator.validate_upload_at(
                fixtures::CHAIN_LEAF_KEY.as_bytes(),
                bundle.as_bytes(),
                fixtures::CHAIN_DOMAIN,
                now,
            );
            assert_eq!(outcome.accepted().map(|p| p.chain_length), Some(2), "{outcome:?}");
        }
    }

    #[test]
    fn test_trust_anchors_gate_chains() {
        let root = root_ca("Anchor Root");
        let intermediate = intermediate_ca("Anchor Intermediate", &root);
        let leaf = valid_leaf(DOMAIN, Some(&intermediate));
        let bundle = format!("{}{}", leaf.cert_pem, intermediate.pem);

        let trusted = UploadValidator::new()
            .with_trust_anchors(PemTrustStore::from_pem(root.pem.as_bytes()).unwrap());
        let outcome = trusted.validate_upload(leaf.key_pem.as_bytes(), bundle.as_bytes(), DOMAIN);
        assert!(outcome.is_accepted(), "{outcome:?}");

        let other = root_ca("Other Root");
        let untrusted = UploadValidator::new()
            .with_trust_anchors(PemTrustStore::from_pem(other.pem.as_bytes()).unwrap());
        let outcome = untrusted.validate_upload(leaf.key_pem.as_bytes(), bundle.as_bytes(), DOMAIN);
        assert_eq!(reason(&outcome), Some(RejectReason::BrokenChain));
    }

    #[test]
    fn test_single_leaf_anchor_requirement_is_optional() {
        let other = root_ca("Other Root");
        let leaf = valid_leaf(DOMAIN, None);
        let anchors = || PemTrustStore::from_pem(other.pem.as_bytes()).unwrap();

        let lenient = UploadValidator::new().with_trust_anchors(anchors());
        let outcome = lenient.validate_upload(leaf.key_pem.as_bytes(), leaf.cert_pem.as_bytes(), DOMAIN);
        assert!(outcome.is_accepted());

        let strict = UploadValidator::new()
            .with_trust_anchors(anchors())
            .with_options(ValidatorOptions {
                require_trusted_chain: true,
            });
        let outcome = strict.validate_upload(leaf.key_pem.as_bytes(), leaf.cert_pem.as_bytes(), DOMAIN);
        assert_eq!(reason(&outcome), Some(RejectReason::BrokenChain));
    }
}
