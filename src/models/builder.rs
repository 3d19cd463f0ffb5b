//! 模型列表构建
//!
//! 两种来源的别名方向相反，需要分别保留：
//! - 配置里的供应商：`alias` 是更友好的展示名，转换后作为主名称；
//! - 认证文件供应商（OpenAI 风格列表）：`id` 保持为主名称，`display_name` 作为别名。

use std::collections::HashMap;

use serde_json::Value;

use super::normalize::{dedupe_models, filter_excluded_models, text_field};
use super::ModelInfo;

/// 配置中声明的模型 `{ name, alias? }`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfiguredModel {
    pub name: String,
    pub alias: String,
}

impl ConfiguredModel {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }

    /// 宽松解析：字符串视为仅有 name；对象读取 `name` / `alias`
    pub fn from_value(value: &Value) -> Option<Self> {
        let model = match value {
            Value::String(s) => Self::new(s.trim(), ""),
            Value::Object(_) => Self::new(
                text_field(value, &["name", "id"]),
                text_field(value, &["alias"]),
            ),
            _ => return None,
        };
        Some(model).filter(|m| !m.name.is_empty())
    }
}

/// 认证文件接口返回的模型 `{ id, display_name? }`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthApiModel {
    pub id: String,
    pub display_name: String,
    pub description: String,
}

impl AuthApiModel {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: String::new(),
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let model = match value {
            Value::String(s) => Self::new(s.trim(), ""),
            Value::Object(_) => Self {
                id: text_field(value, &["id", "name"]),
                display_name: text_field(value, &["display_name", "displayName"]),
                description: text_field(value, &["description"]),
            },
            _ => return None,
        };
        Some(model).filter(|m| !m.id.is_empty())
    }
}

/// 配置模型：存在有效别名时，别名成为主名称，原始名称降为别名
pub fn convert_configured_models(items: &[ConfiguredModel]) -> Vec<ModelInfo> {
    let models = items
        .iter()
        .filter_map(|item| {
            let name = item.name.trim();
            if name.is_empty() {
                return None;
            }
            let alias = item.alias.trim();
            if !alias.is_empty() && alias.to_lowercase() != name.to_lowercase() {
                Some(ModelInfo::with_alias(alias, name))
            } else {
                Some(ModelInfo::new(name))
            }
        })
        .collect();
    dedupe_models(models)
}

/// 认证文件模型：`id` 为主名称，不同于 `id` 的 `display_name` 作为别名
pub fn normalize_auth_api_models(items: &[AuthApiModel]) -> Vec<ModelInfo> {
    let models = items
        .iter()
        .filter_map(|item| {
            let id = item.id.trim();
            if id.is_empty() {
                return None;
            }
            let display = item.display_name.trim();
            let alias = Some(display.to_string())
                .filter(|d| !d.is_empty() && d.to_lowercase() != id.to_lowercase());
            let description = Some(item.description.trim().to_string()).filter(|d| !d.is_empty());
            Some(ModelInfo {
                name: id.to_string(),
                alias,
                description,
            })
        })
        .collect();
    dedupe_models(models)
}

/// 应用 OAuth 模型别名映射（key 为小写的原始模型名）
///
/// 命中时首选别名成为主名称，原名称降为 `alias`。
pub fn apply_alias_lookup(models: Vec<ModelInfo>, lookup: &HashMap<String, String>) -> Vec<ModelInfo> {
    if lookup.is_empty() {
        return models;
    }

    let renamed = models
        .into_iter()
        .map(|model| {
            let preferred = lookup
                .get(&model.name.trim().to_lowercase())
                .map(|alias| alias.trim())
                .filter(|alias| !alias.is_empty());
            match preferred {
                Some(alias) if alias.to_lowercase() != model.name.trim().to_lowercase() => {
                    ModelInfo {
                        name: alias.to_string(),
                        alias: Some(model.name),
                        description: model.description,
                    }
                }
                _ => model,
            }
        })
        .collect();
    dedupe_models(renamed)
}

/// 认证文件供应商的完整模型管线：归一化 → 别名替换 → 排除过滤
pub fn build_auth_model_list(
    raw: &[AuthApiModel],
    alias_lookup: Option<&HashMap<String, String>>,
    excluded_patterns: Option<&[String]>,
) -> Vec<ModelInfo> {
    let mut models = normalize_auth_api_models(raw);
    if let Some(lookup) = alias_lookup {
        models = apply_alias_lookup(models, lookup);
    }
    match excluded_patterns {
        Some(patterns) => filter_excluded_models(models, patterns),
        None => models,
    }
}
