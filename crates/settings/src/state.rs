use anyhow::{Context, Result};
use sitessl_common::config::AppConfig;
use sitessl_validator::{PemTrustStore, UploadValidator, ValidatorOptions};
use tracing::info;

/// 根据配置构建上传校验器；配置了信任锚文件时一并加载
pub fn build_validator(config: &AppConfig) -> Result<UploadValidator> {
    let options = ValidatorOptions {
        require_trusted_chain: config.require_trusted_chain,
    };
    let validator = UploadValidator::new().with_options(options);

    let Some(path) = config.trust_anchors_path.as_ref() else {
        return Ok(validator);
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read trust anchors {}", path.display()))?;
    let store = PemTrustStore::from_pem(&bytes)
        .with_context(|| format!("invalid trust anchors {}", path.display()))?;
    info!(
        path = %path.display(),
        anchors = store.len(),
        "trust anchors loaded"
    );
    Ok(validator.with_trust_anchors(store))
}
