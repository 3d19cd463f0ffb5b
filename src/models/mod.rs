//! 模型列表
//!
//! 把管理端返回的各种模型表示统一为 [`ModelInfo`]，并提供去重、别名替换与排除过滤。

pub mod builder;
pub mod normalize;

use serde::{Deserialize, Serialize};

pub use builder::{
    apply_alias_lookup, build_auth_model_list, convert_configured_models,
    normalize_auth_api_models, AuthApiModel, ConfiguredModel,
};
pub use normalize::{
    dedupe_models, filter_excluded_models, is_truthy_flag, match_exclude_pattern,
    normalize_api_key_list, normalize_text, ApiKeyItem, ExcludeMatcher,
};

/// 统一后的模型信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// 展示用 ID，去重后在同一供应商内唯一（大小写不敏感）
    pub name: String,
    /// 别名替换前的原始 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            description: None,
        }
    }

    pub fn with_alias(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
            description: None,
        }
    }
}
