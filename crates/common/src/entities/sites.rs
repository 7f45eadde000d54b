use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 站点记录，只包含自定义域名 SSL 相关的列
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sites")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    pub domain: Option<String>,
    #[serde(skip_serializing)]
    pub ssl_key: Option<String>,
    pub ssl_cert: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// 已配置的自定义域名；空白视为未配置
    pub fn custom_domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .map(str::trim)
            .filter(|domain| !domain.is_empty())
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        unreachable!("sites has no relations")
    }
}

impl ActiveModelBehavior for ActiveModel {}
