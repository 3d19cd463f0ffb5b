//! 管理接口返回体的解码
//!
//! 后端字段名存在历史变体，这里统一做宽松解析，调用方只面对规整的结构。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::normalize::{is_truthy_flag, normalize_api_key_list, text_field};
use crate::models::AuthApiModel;

/// 认证文件记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFileRecord {
    /// 文件标识
    pub name: String,
    /// 原始供应商字符串（`provider` 优先，其次 `type`），未转小写
    pub provider: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub unavailable: bool,
}

impl AuthFileRecord {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            disabled: false,
            unavailable: false,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Some(Self {
            name: text_field(value, &["name", "id"]),
            provider: text_field(value, &["provider", "type"]),
            disabled: value.get("disabled").map(is_truthy_flag).unwrap_or(false),
            unavailable: value.get("unavailable").map(is_truthy_flag).unwrap_or(false),
        })
    }

    pub fn is_usable(&self) -> bool {
        !self.disabled && !self.unavailable
    }
}

/// 取出数组：优先读取给定字段，其次接受顶层数组
fn list_under<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_array()))
        .or_else(|| value.as_array())
        .map(|items| items.as_slice())
        .unwrap_or(&[])
}

/// 取出对象：优先读取给定字段，其次接受顶层对象
fn map_under<'a>(value: &'a Value, key: &str) -> Option<&'a serde_json::Map<String, Value>> {
    value
        .get(key)
        .and_then(|v| v.as_object())
        .or_else(|| value.as_object().filter(|obj| !obj.contains_key(key)))
}

pub fn decode_auth_files(value: &Value) -> Vec<AuthFileRecord> {
    list_under(value, &["files", "auth-files"])
        .iter()
        .filter_map(AuthFileRecord::from_value)
        .collect()
}

pub fn decode_model_items(value: &Value) -> Vec<AuthApiModel> {
    list_under(value, &["models", "data"])
        .iter()
        .filter_map(AuthApiModel::from_value)
        .collect()
}

/// 解码 OAuth 模型别名表：provider(小写) → { 原始模型名(小写) → 别名 }
pub fn decode_alias_map(value: &Value) -> HashMap<String, HashMap<String, String>> {
    let Some(providers) = map_under(value, "oauth-model-alias") else {
        return HashMap::new();
    };

    let mut result = HashMap::new();
    for (provider, entries) in providers {
        let provider_key = provider.trim().to_lowercase();
        if provider_key.is_empty() {
            continue;
        }
        let mut lookup = HashMap::new();
        for entry in entries.as_array().map(|v| v.as_slice()).unwrap_or(&[]) {
            let name = text_field(entry, &["name", "from"]);
            let alias = text_field(entry, &["alias", "to"]);
            if name.is_empty() || alias.is_empty() {
                continue;
            }
            lookup.entry(name.to_lowercase()).or_insert(alias);
        }
        if !lookup.is_empty() {
            result.insert(provider_key, lookup);
        }
    }
    result
}

/// 解码 OAuth 排除模型表：provider(小写) → 通配规则列表
pub fn decode_excluded_map(value: &Value) -> HashMap<String, Vec<String>> {
    let Some(providers) = map_under(value, "oauth-excluded-models") else {
        return HashMap::new();
    };

    providers
        .iter()
        .filter_map(|(provider, patterns)| {
            let provider_key = provider.trim().to_lowercase();
            let patterns: Vec<String> = patterns
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .map(crate::models::normalize_text)
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            if provider_key.is_empty() || patterns.is_empty() {
                None
            } else {
                Some((provider_key, patterns))
            }
        })
        .collect()
}

pub fn decode_api_keys(value: &Value) -> Vec<String> {
    normalize_api_key_list(list_under(value, &["api-keys", "apiKeys", "keys"]))
}
