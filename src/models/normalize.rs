//! 文本、标记位、API Key 与排除规则的归一化工具

use std::collections::HashSet;

use regex::Regex;
use serde_json::{Map, Value};

use super::ModelInfo;

/// 把任意 JSON 值转为去除首尾空白的字符串
///
/// 字符串、数字和布尔值按字面转换；null、数组和对象视为缺失，返回 `""`。
pub fn normalize_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// 按顺序读取第一个非空字段
pub(crate) fn text_field(obj: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .map(normalize_text)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// 解析后端松散类型的开关字段（disabled / unavailable 等）
pub fn is_truthy_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "y" | "on"
        ),
        _ => false,
    }
}

/// API Key 列表中单个元素的历史表示
///
/// 对象形式依次尝试 `api-key`、`apiKey`、`key`、`Key`，取第一个非空值。
#[derive(Debug, Clone, PartialEq)]
pub enum ApiKeyItem<'a> {
    Plain(&'a str),
    Keyed(&'a Map<String, Value>),
    Unsupported,
}

const API_KEY_FIELDS: [&str; 4] = ["api-key", "apiKey", "key", "Key"];

impl<'a> ApiKeyItem<'a> {
    pub fn decode(value: &'a Value) -> Self {
        match value {
            Value::String(s) => ApiKeyItem::Plain(s),
            Value::Object(map) => ApiKeyItem::Keyed(map),
            _ => ApiKeyItem::Unsupported,
        }
    }

    pub fn key(&self) -> Option<String> {
        let key = match self {
            ApiKeyItem::Plain(s) => s.trim().to_string(),
            ApiKeyItem::Keyed(map) => API_KEY_FIELDS
                .iter()
                .filter_map(|field| map.get(*field))
                .map(normalize_text)
                .find(|text| !text.is_empty())
                .unwrap_or_default(),
            ApiKeyItem::Unsupported => String::new(),
        };
        Some(key).filter(|k| !k.is_empty())
    }
}

/// 归一化 API Key 列表：去空、精确去重、保持原顺序
pub fn normalize_api_key_list(raw: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|item| ApiKeyItem::decode(item).key())
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// 预编译的排除规则
#[derive(Debug, Clone)]
pub enum ExcludeMatcher {
    /// 不含 `*`，大小写不敏感的全等匹配
    Exact(String),
    /// 含 `*`，转换为锚定的正则
    Wildcard(Regex),
}

impl ExcludeMatcher {
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return None;
        }
        if !pattern.contains('*') {
            return Some(ExcludeMatcher::Exact(pattern.to_lowercase()));
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        match Regex::new(&format!("(?i)^{body}$")) {
            Ok(re) => Some(ExcludeMatcher::Wildcard(re)),
            Err(e) => {
                log::warn!("[ModelFilter] 无效的排除规则 {pattern}: {e}");
                None
            }
        }
    }

    pub fn is_match(&self, model: &str) -> bool {
        let model = model.trim();
        match self {
            ExcludeMatcher::Exact(lower) => model.to_lowercase() == *lower,
            ExcludeMatcher::Wildcard(re) => re.is_match(model),
        }
    }
}

/// 判断模型名是否命中排除规则（仅支持 `*` 通配）
pub fn match_exclude_pattern(model: &str, pattern: &str) -> bool {
    ExcludeMatcher::parse(pattern)
        .map(|matcher| matcher.is_match(model))
        .unwrap_or(false)
}

/// 过滤被排除的模型，名称或别名命中任一规则即移除
pub fn filter_excluded_models(models: Vec<ModelInfo>, patterns: &[String]) -> Vec<ModelInfo> {
    let matchers: Vec<ExcludeMatcher> = patterns
        .iter()
        .filter_map(|p| ExcludeMatcher::parse(p))
        .collect();
    if matchers.is_empty() {
        return models;
    }

    models
        .into_iter()
        .filter(|model| {
            !matchers.iter().any(|m| {
                m.is_match(&model.name)
                    || model.alias.as_deref().map(|a| m.is_match(a)).unwrap_or(false)
            })
        })
        .collect()
}

/// 按名称去重（大小写不敏感，先到先得）
///
/// 与名称相同的别名会被丢弃，空描述会被丢弃。
pub fn dedupe_models(models: Vec<ModelInfo>) -> Vec<ModelInfo> {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(models.len());

    for model in models {
        let name = model.name.trim().to_string();
        if name.is_empty() || !seen.insert(name.to_lowercase()) {
            continue;
        }

        let alias = model
            .alias
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty() && a.to_lowercase() != name.to_lowercase());
        let description = model
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        result.push(ModelInfo {
            name,
            alias,
            description,
        });
    }

    result
}
