//! 站点自定义域名的 SSL 设置
//!
//! 校验通过之前不会改动站点记录；被拒绝的上传保留原有的私钥和证书。

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use sitessl_common::entities::sites;
use sitessl_common::{SiteSslError, SiteSslResult, SslStatus, SslUploadReport};
use sitessl_validator::{UploadValidator, ValidationOutcome};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SslSettings {
    db: Arc<DatabaseConnection>,
    validator: UploadValidator,
    max_upload_bytes: u64,
}

impl SslSettings {
    pub fn new(
        db: Arc<DatabaseConnection>,
        validator: UploadValidator,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            db,
            validator,
            max_upload_bytes,
        }
    }

    /// 上传私钥与证书；通过校验后保存规范化的 PEM
    pub async fn upload(
        &self,
        site_id: Uuid,
        key_bytes: &[u8],
        cert_bytes: &[u8],
    ) -> SiteSslResult<SslUploadReport> {
        let site = self.find_site(site_id).await?;

        self.check_size("ssl key", key_bytes)?;
        self.check_size("ssl certificate", cert_bytes)?;

        let domain = site
            .custom_domain()
            .ok_or(SiteSslError::DomainRequired)?
            .to_string();

        let pair = match self.validator.validate_upload(key_bytes, cert_bytes, &domain) {
            ValidationOutcome::Accepted(pair) => pair,
            ValidationOutcome::Rejected(rejection) => {
                info!(
                    site_id = %site_id,
                    domain = %domain,
                    reason = %rejection.reason,
                    "ssl upload left site unchanged"
                );
                return Err(SiteSslError::Rejected(rejection));
            }
        };

        let report = SslUploadReport::new(domain, &pair);
        let mut active: sites::ActiveModel = site.into();
        active.ssl_key = Set(Some(pair.key_pem));
        active.ssl_cert = Set(Some(pair.cert_pem));
        active.updated_at = Set(Utc::now().into());
        active.update(self.db.as_ref()).await?;

        info!(
            site_id = %site_id,
            domain = %report.domain,
            subject = %report.leaf.subject,
            not_after = %report.leaf.not_after,
            "ssl certificate installed"
        );
        Ok(report)
    }

    pub async fn status(&self, site_id: Uuid) -> SiteSslResult<SslStatus> {
        let site = self.find_site(site_id).await?;
        Ok(SslStatus::from_stored(
            site.ssl_key.as_deref(),
            site.ssl_cert.as_deref(),
        ))
    }

    /// 清除已保存的私钥与证书
    pub async fn remove(&self, site_id: Uuid) -> SiteSslResult<SslStatus> {
        let site = self.find_site(site_id).await?;
        if site.ssl_key.is_none() && site.ssl_cert.is_none() {
            return Ok(SslStatus::Inactive);
        }

        let mut active: sites::ActiveModel = site.into();
        active.ssl_key = Set(None);
        active.ssl_cert = Set(None);
        active.updated_at = Set(Utc::now().into());
        active.update(self.db.as_ref()).await?;

        info!(site_id = %site_id, "ssl certificate removed");
        Ok(SslStatus::Inactive)
    }

    async fn find_site(&self, site_id: Uuid) -> SiteSslResult<sites::Model> {
        sites::Entity::find_by_id(site_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| SiteSslError::not_found(format!("site {site_id}")))
    }

    fn check_size(&self, what: &str, bytes: &[u8]) -> SiteSslResult<()> {
        let len = bytes.len() as u64;
        if len > self.max_upload_bytes {
            warn!(
                what,
                len,
                limit = self.max_upload_bytes,
                "ssl upload over size limit"
            );
            return Err(SiteSslError::bad_request(format!(
                "{what} exceeds {} bytes",
                self.max_upload_bytes
            )));
        }
        Ok(())
    }
}
