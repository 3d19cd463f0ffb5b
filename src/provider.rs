use std::collections::HashMap;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::models::ModelInfo;

/// 供应商条目来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// 由认证文件支撑，模型列表需在线获取
    AuthProxy,
    /// 模型列表直接写在后端配置中
    ConfiguredApi,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::AuthProxy => "auth-proxy",
            SourceKind::ConfiguredApi => "configured-api",
        }
    }
}

/// 单个可用凭据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderKeyOption {
    pub api_key: String,
}

impl ProviderKeyOption {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn from_keys<I, S>(keys: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        keys.into_iter().map(Self::new).collect()
    }

    /// 返回遮蔽后的 API Key（用于日志输出与展示）
    ///
    /// 显示前4位和后4位，中间用 `...` 代替；不足8位返回 `***`
    pub fn masked(&self) -> String {
        mask_api_key(&self.api_key)
    }
}

pub fn mask_api_key(key: &str) -> String {
    if key.chars().count() > 8 {
        let prefix: String = key.chars().take(4).collect();
        let suffix: String = key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{prefix}...{suffix}")
    } else {
        "***".to_string()
    }
}

/// 通过管理层暴露的一个逻辑上游供应商
///
/// 每次加载数据时整体重建，构建后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointProviderEntry {
    /// `auth:<providerKey>` 或 `configured:<kind>:<index>`
    pub id: String,
    pub source_kind: SourceKind,
    /// 小写的供应商类型（codex / claude / gemini / vertex / 自定义 OpenAI 兼容名）
    pub provider_key: String,
    pub name: String,
    /// 展示顺序
    pub order: usize,
    /// 管理代理的地址
    pub base_url: String,
    /// 真实上游地址（仅 configured-api）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_base_url: Option<String>,
    /// 通过代理调用时使用的凭据
    #[serde(default)]
    pub key_options: Vec<ProviderKeyOption>,
    /// 直连上游时使用的凭据
    #[serde(default)]
    pub real_key_options: Vec<ProviderKeyOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_models: Option<Vec<ModelInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_file_names: Option<IndexSet<String>>,
    /// 小写原始模型名 → 展示别名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_lookup: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_patterns: Option<Vec<String>>,
}

impl EndpointProviderEntry {
    pub fn is_codex(&self) -> bool {
        self.provider_key == "codex"
    }

    pub fn auth_files(&self) -> impl Iterator<Item = &String> {
        self.auth_file_names.iter().flat_map(|names| names.iter())
    }
}
