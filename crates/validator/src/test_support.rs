//! 测试用证书与固定样本

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use time::{Duration, OffsetDateTime};

/// OpenSSL 生成的固定样本（RSA、加密私钥、误传的 HTML 等）
pub(crate) mod fixtures {
    pub const RSA_KEY: &str = include_str!("../testdata/rsa.key");
    pub const RSA_PKCS8_KEY: &str = include_str!("../testdata/rsa-pkcs8.key");
    /// CN=*.example-site.com，SAN 同时包含根域名与通配符
    pub const RSA_CERT: &str = include_str!("../testdata/rsa-selfsigned.pem");
    pub const RSA_DOMAIN: &str = "example-site.com";

    pub const EC_KEY: &str = include_str!("../testdata/ec.key");
    pub const EC_CERT: &str = include_str!("../testdata/ec-selfsigned.pem");

    /// 口令 derpie
    pub const ENCRYPTED_KEY: &str = include_str!("../testdata/encrypted.key");
    pub const ENCRYPTED_PKCS8_KEY: &str = include_str!("../testdata/encrypted-pkcs8.key");

    pub const CHAIN_CA_CERT: &str = include_str!("../testdata/chain-ca.pem");
    pub const CHAIN_LEAF_KEY: &str = include_str!("../testdata/chain-leaf.key");
    pub const CHAIN_LEAF_CERT: &str = include_str!("../testdata/chain-leaf.pem");
    pub const CHAIN_DOMAIN: &str = "chained-site.com";

    pub const INDEX_HTML: &str = include_str!("../testdata/index.html");
}

pub(crate) fn generate_key() -> KeyPair {
    KeyPair::generate().unwrap()
}

/// 可以继续签发证书的 CA
pub(crate) struct TestAuthority {
    pub pem: String,
    issuer: Issuer<'static, KeyPair>,
}

pub(crate) fn root_ca(common_name: &str) -> TestAuthority {
    let key = generate_key();
    let params = ca_params(common_name);
    let cert = params.self_signed(&key).unwrap();
    TestAuthority {
        pem: cert.pem(),
        issuer: Issuer::new(params, key),
    }
}

pub(crate) fn intermediate_ca(common_name: &str, parent: &TestAuthority) -> TestAuthority {
    let key = generate_key();
    let params = ca_params(common_name);
    let cert = params.signed_by(&key, &parent.issuer).unwrap();
    TestAuthority {
        pem: cert.pem(),
        issuer: Issuer::new(params, key),
    }
}

/// 同一主体、同一公钥的两张根证书：一张自签名，一张由 `parent` 交叉签名。
/// 返回的 `TestAuthority` 用这把公钥继续签发，第二个值是交叉签名证书的 PEM。
pub(crate) fn cross_signed_root(
    common_name: &str,
    parent: &TestAuthority,
) -> (TestAuthority, String) {
    let key = generate_key();
    let params = ca_params(common_name);
    let self_signed = params.self_signed(&key).unwrap();
    let cross = params.signed_by(&key, &parent.issuer).unwrap();
    (
        TestAuthority {
            pem: self_signed.pem(),
            issuer: Issuer::new(params, key),
        },
        cross.pem(),
    )
}

fn ca_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params
}

/// 叶子证书及其私钥（PEM 文本）
pub(crate) struct TestLeaf {
    pub key_pem: String,
    pub cert_pem: String,
}

/// 为 `domain` 签发叶子证书：CN 为 `*.domain`，SAN 为根域名与通配符。
/// `issuer` 为 `None` 时自签名。
pub(crate) fn leaf_cert(
    domain: &str,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    issuer: Option<&TestAuthority>,
) -> TestLeaf {
    leaf_cert_with_key(&generate_key(), domain, not_before, not_after, issuer)
}

/// 用指定私钥签发叶子证书，模拟同一把私钥的续期
pub(crate) fn leaf_cert_with_key(
    key: &KeyPair,
    domain: &str,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    issuer: Option<&TestAuthority>,
) -> TestLeaf {
    let mut params =
        CertificateParams::new(vec![domain.to_string(), format!("*.{domain}")]).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, "Site Owner");
    dn.push(DnType::CommonName, format!("*.{domain}"));
    params.distinguished_name = dn;
    params.not_before = not_before;
    params.not_after = not_after;

    let cert = match issuer {
        Some(authority) => params.signed_by(key, &authority.issuer).unwrap(),
        None => params.self_signed(key).unwrap(),
    };
    TestLeaf {
        key_pem: key.serialize_pem(),
        cert_pem: cert.pem(),
    }
}

/// 一年有效期、当前可用的叶子证书
pub(crate) fn valid_leaf(domain: &str, issuer: Option<&TestAuthority>) -> TestLeaf {
    let now = OffsetDateTime::now_utc();
    leaf_cert(domain, now - Duration::days(1), now + Duration::days(365), issuer)
}

/// 昨天已过期
pub(crate) fn expired_leaf(domain: &str, issuer: Option<&TestAuthority>) -> TestLeaf {
    let now = OffsetDateTime::now_utc();
    leaf_cert(domain, now - Duration::days(400), now - Duration::days(1), issuer)
}

/// 下周才生效
pub(crate) fn future_leaf(domain: &str, issuer: Option<&TestAuthority>) -> TestLeaf {
    let now = OffsetDateTime::now_utc();
    leaf_cert(domain, now + Duration::days(7), now + Duration::days(365), issuer)
}
