//! 供应商条目构建
//!
//! 把后端配置与认证文件列表整理成统一的 [`EndpointProviderEntry`] 列表。
//! 每次加载都整体重建，不做增量修改。

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{error_message, AppError};
use crate::management::{derive_proxy_base_url, AuthFileRecord, ManagementApi};
use crate::models::normalize::text_field;
use crate::models::{
    convert_configured_models, filter_excluded_models, is_truthy_flag, normalize_api_key_list,
    normalize_text, ConfiguredModel,
};
use crate::provider::{EndpointProviderEntry, ProviderKeyOption, SourceKind};
use crate::services::model_refresh::ProviderModelsState;

/// 配置中的供应商集合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfiguredKind {
    OpenAi,
    Codex,
    Claude,
    Gemini,
    Vertex,
}

impl ConfiguredKind {
    /// 固定的遍历顺序，决定展示顺序
    pub const ALL: [ConfiguredKind; 5] = [
        ConfiguredKind::OpenAi,
        ConfiguredKind::Codex,
        ConfiguredKind::Claude,
        ConfiguredKind::Gemini,
        ConfiguredKind::Vertex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfiguredKind::OpenAi => "openai",
            ConfiguredKind::Codex => "codex",
            ConfiguredKind::Claude => "claude",
            ConfiguredKind::Gemini => "gemini",
            ConfiguredKind::Vertex => "vertex",
        }
    }

    /// 后端配置中的字段名
    pub fn config_key(&self) -> &'static str {
        match self {
            ConfiguredKind::OpenAi => "openai-compatibility",
            ConfiguredKind::Codex => "codex-api-key",
            ConfiguredKind::Claude => "claude-api-key",
            ConfiguredKind::Gemini => "gemini-api-key",
            ConfiguredKind::Vertex => "vertex-api-key",
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    Some(text).filter(|t| !t.is_empty())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(normalize_text)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn configured_models(item: &Value, excluded: &[String]) -> Vec<crate::models::ModelInfo> {
    let raw: Vec<ConfiguredModel> = item
        .get("models")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(ConfiguredModel::from_value).collect())
        .unwrap_or_default();
    filter_excluded_models(convert_configured_models(&raw), excluded)
}

/// 从后端配置构建 configured-api 条目
///
/// 依次遍历 OpenAI 兼容、Codex、Claude、Gemini、Vertex 五个集合，
/// `order` 在所有集合间连续递增，与配置声明顺序一致。
pub fn build_configured_entries(
    config: &Value,
    base_url: &str,
    key_options: &[ProviderKeyOption],
) -> Vec<EndpointProviderEntry> {
    let mut entries = Vec::new();
    let mut order = 0usize;

    for kind in ConfiguredKind::ALL {
        let items = config
            .get(kind.config_key())
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);

        for (index, item) in items.iter().enumerate() {
            if !item.is_object() || item.get("disabled").map(is_truthy_flag).unwrap_or(false) {
                continue;
            }

            let excluded = string_list(item.get("excluded-models"));
            let base = text_field(item, &["base-url", "baseUrl"]);
            let prefix = text_field(item, &["prefix"]);
            let fallback_name = format!("{}#{}", kind.as_str(), index + 1);

            let (provider_key, name, real_keys) = match kind {
                ConfiguredKind::OpenAi => {
                    let display = text_field(item, &["name"]);
                    let provider_key = if display.is_empty() {
                        kind.as_str().to_string()
                    } else {
                        display.to_lowercase()
                    };
                    let name = [display, prefix, base.clone()]
                        .into_iter()
                        .find(|s| !s.is_empty())
                        .unwrap_or(fallback_name);
                    let mut keys = item
                        .get("api-key-entries")
                        .and_then(|v| v.as_array())
                        .map(|v| normalize_api_key_list(v))
                        .unwrap_or_default();
                    if keys.is_empty() {
                        keys = item
                            .get("api-keys")
                            .and_then(|v| v.as_array())
                            .map(|v| normalize_api_key_list(v))
                            .unwrap_or_default();
                    }
                    (provider_key, name, keys)
                }
                _ => {
                    let name = [prefix, base.clone()]
                        .into_iter()
                        .find(|s| !s.is_empty())
                        .unwrap_or(fallback_name);
                    let key = text_field(item, &["api-key", "apiKey"]);
                    let keys = non_empty(key).into_iter().collect();
                    (kind.as_str().to_string(), name, keys)
                }
            };

            entries.push(EndpointProviderEntry {
                id: format!("configured:{}:{}", kind.as_str(), index),
                source_kind: SourceKind::ConfiguredApi,
                provider_key,
                name,
                order,
                base_url: base_url.to_string(),
                real_base_url: non_empty(base),
                key_options: key_options.to_vec(),
                real_key_options: ProviderKeyOption::from_keys(real_keys),
                configured_models: Some(configured_models(item, &excluded)),
                auth_file_names: None,
                alias_lookup: None,
                excluded_patterns: Some(excluded).filter(|p| !p.is_empty()),
            });
            order += 1;
        }
    }

    entries
}

struct AuthGroup {
    label: String,
    files: IndexSet<String>,
}

/// 从认证文件列表构建 auth-proxy 条目
///
/// 跳过 disabled / unavailable 的文件；按小写 provider 分组，
/// 组的展示名取第一个文件的原始 provider 字符串，顺序按首次出现。
pub fn build_auth_provider_entries(
    files: &[AuthFileRecord],
    alias_map: &HashMap<String, HashMap<String, String>>,
    excluded_map: &HashMap<String, Vec<String>>,
    base_url: &str,
    key_options: &[ProviderKeyOption],
) -> Vec<EndpointProviderEntry> {
    let mut groups: IndexMap<String, AuthGroup> = IndexMap::new();

    for file in files {
        if !file.is_usable() {
            continue;
        }
        let raw_provider = file.provider.trim();
        let name = file.name.trim();
        if raw_provider.is_empty() || name.is_empty() {
            continue;
        }
        groups
            .entry(raw_provider.to_lowercase())
            .or_insert_with(|| AuthGroup {
                label: raw_provider.to_string(),
                files: IndexSet::new(),
            })
            .files
            .insert(name.to_string());
    }

    let mut entries: Vec<EndpointProviderEntry> = groups
        .into_iter()
        .enumerate()
        .map(|(order, (provider_key, group))| EndpointProviderEntry {
            id: format!("auth:{provider_key}"),
            source_kind: SourceKind::AuthProxy,
            name: group.label,
            order,
            base_url: base_url.to_string(),
            real_base_url: None,
            key_options: key_options.to_vec(),
            real_key_options: Vec::new(),
            configured_models: None,
            auth_file_names: Some(group.files),
            alias_lookup: alias_map.get(&provider_key).cloned().filter(|m| !m.is_empty()),
            excluded_patterns: excluded_map
                .get(&provider_key)
                .cloned()
                .filter(|p| !p.is_empty()),
            provider_key,
        })
        .collect();

    entries.sort_by_key(|entry| entry.order);
    entries
}

/// 一次数据加载的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCatalog {
    pub proxy_base_url: String,
    pub key_options: Vec<ProviderKeyOption>,
    /// auth-proxy 条目在前，configured-api 条目在后，各自按 `order` 排序
    pub entries: Vec<EndpointProviderEntry>,
}

impl ProviderCatalog {
    pub fn get(&self, id: &str) -> Option<&EndpointProviderEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }
}

/// 供应商条目加载业务逻辑
pub struct ProviderEntriesService;

impl ProviderEntriesService {
    /// 拉取配置、认证文件、别名表、排除表与代理 Key，并重建全部条目
    ///
    /// 配置获取失败时整体失败；其余数据获取失败时降级为空并记录警告。
    pub async fn load(
        api: &dyn ManagementApi,
        management_base_url: &str,
    ) -> Result<ProviderCatalog, AppError> {
        let (config, files, alias_map, excluded_map, api_keys) = futures::join!(
            api.get_config(),
            api.list_auth_files(),
            api.get_oauth_model_alias(),
            api.get_oauth_excluded_models(),
            api.list_api_keys(),
        );

        let config = config?;
        let files = Self::or_empty("auth-files", files);
        let alias_map = Self::or_empty("oauth-model-alias", alias_map);
        let excluded_map = Self::or_empty("oauth-excluded-models", excluded_map);
        let api_keys = Self::or_empty("api-keys", api_keys);

        let proxy_base_url = derive_proxy_base_url(management_base_url);
        let key_options = ProviderKeyOption::from_keys(api_keys);

        let mut entries = build_auth_provider_entries(
            &files,
            &alias_map,
            &excluded_map,
            &proxy_base_url,
            &key_options,
        );
        entries.extend(build_configured_entries(
            &config,
            &proxy_base_url,
            &key_options,
        ));

        log::info!(
            "[ProviderEntries] 已加载 {} 个供应商（认证文件 {} 个）",
            entries.len(),
            files.len()
        );

        Ok(ProviderCatalog {
            proxy_base_url,
            key_options,
            entries,
        })
    }

    fn or_empty<T: Default>(what: &str, result: Result<T, AppError>) -> T {
        result.unwrap_or_else(|e| {
            log::warn!("[ProviderEntries] 获取 {what} 失败: {}", error_message(&e));
            T::default()
        })
    }
}

/// 按关键字过滤条目：匹配名称、provider key 以及已加载的模型名/别名
pub fn filter_provider_entries<'a>(
    entries: &'a [EndpointProviderEntry],
    states: &HashMap<String, ProviderModelsState>,
    query: &str,
) -> Vec<&'a EndpointProviderEntry> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return entries.iter().collect();
    }

    entries
        .iter()
        .filter(|entry| {
            if entry.name.to_lowercase().contains(&query) || entry.provider_key.contains(&query) {
                return true;
            }
            let models = states
                .get(&entry.id)
                .map(|s| s.models.as_slice())
                .filter(|m| !m.is_empty())
                .or(entry.configured_models.as_deref())
                .unwrap_or(&[]);
            models.iter().any(|model| {
                model.name.to_lowercase().contains(&query)
                    || model
                        .alias
                        .as_deref()
                        .map(|a| a.to_lowercase().contains(&query))
                        .unwrap_or(false)
            })
        })
        .collect()
}
