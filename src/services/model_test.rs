//! 模型连通性测试服务
//!
//! 直接调用供应商的 `chat/completions` 接口发送最小请求，用于验证地址、凭据与模型是否可用。
//! 测试失败以结果形式返回，不作为错误抛出。

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::error::{error_message, AppError};
use crate::provider::{mask_api_key, EndpointProviderEntry};

/// 模型测试配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTestConfig {
    /// 测试提示词
    pub test_prompt: String,
    /// 超时时间（秒）
    pub timeout_secs: u64,
    /// 最大输出 token
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    1
}

impl Default for ModelTestConfig {
    fn default() -> Self {
        Self {
            test_prompt: "ping".to_string(),
            timeout_secs: 15,
            max_tokens: default_max_tokens(),
        }
    }
}

/// 测试目标：经管理代理，或直连真实上游
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTestTarget {
    Proxy,
    Upstream,
}

/// 模型测试结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTestResult {
    pub success: bool,
    pub message: String,
    pub response_time_ms: Option<u64>,
    pub http_status: Option<u16>,
    pub model_used: String,
    pub tested_at: i64,
}

/// 模型测试服务
pub struct ModelTestService;

impl ModelTestService {
    /// 对条目发起一次连通性测试
    ///
    /// `key_index` 选择使用第几个凭据（越界时使用第一个）。
    pub async fn test_entry(
        client: &Client,
        entry: &EndpointProviderEntry,
        model: &str,
        target: ModelTestTarget,
        key_index: usize,
        config: &ModelTestConfig,
    ) -> ModelTestResult {
        let start = Instant::now();
        let result = match Self::resolve_endpoint(entry, target, key_index) {
            Ok((base_url, api_key)) => {
                log::info!(
                    "[ModelTest] {} ({:?}) 使用 {} 测试模型 {model}",
                    entry.id,
                    target,
                    mask_api_key(&api_key)
                );
                Self::test_chat_completions(client, &base_url, &api_key, model, config).await
            }
            Err(e) => Err(e),
        };

        let response_time = start.elapsed().as_millis() as u64;
        let tested_at = chrono::Utc::now().timestamp();

        match result {
            Ok((status, msg)) => ModelTestResult {
                success: true,
                message: msg,
                response_time_ms: Some(response_time),
                http_status: Some(status),
                model_used: model.to_string(),
                tested_at,
            },
            Err(e) => ModelTestResult {
                success: false,
                message: error_message(&e),
                response_time_ms: Some(response_time),
                http_status: match e {
                    AppError::Http { status, .. } => Some(status),
                    _ => None,
                },
                model_used: model.to_string(),
                tested_at,
            },
        }
    }

    /// 选出测试使用的地址与凭据
    fn resolve_endpoint(
        entry: &EndpointProviderEntry,
        target: ModelTestTarget,
        key_index: usize,
    ) -> Result<(String, String), AppError> {
        let (base_url, keys) = match target {
            ModelTestTarget::Proxy => (Some(entry.base_url.clone()), &entry.key_options),
            ModelTestTarget::Upstream => (entry.real_base_url.clone(), &entry.real_key_options),
        };

        let base_url = base_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::InvalidInput(format!("{} 没有可用的 Base URL", entry.name)))?;
        let api_key = keys
            .get(key_index)
            .or_else(|| keys.first())
            .map(|k| k.api_key.clone())
            .ok_or_else(|| AppError::InvalidInput(format!("{} 未找到 API Key", entry.name)))?;

        Ok((base_url, api_key))
    }

    /// 测试 OpenAI 兼容的 Chat Completions 接口
    pub async fn test_chat_completions(
        client: &Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        config: &ModelTestConfig,
    ) -> Result<(u16, String), AppError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(AppError::InvalidInput("测试模型不能为空".to_string()));
        }

        let url = build_chat_completions_url(base_url);
        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": config.test_prompt
            }],
            "max_tokens": config.max_tokens,
            "stream": false
        });

        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(config.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(AppError::from_request)?;

        let status = response.status().as_u16();

        if response.status().is_success() {
            // 先获取文本，再尝试解析 JSON
            let text = response.text().await.unwrap_or_default();

            if let Ok(data) = serde_json::from_str::<Value>(&text) {
                if let Some(message) = data
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                {
                    return Err(AppError::Message(message.to_string()));
                }
            }

            // 即使无法解析 JSON，只要状态码是 2xx 就认为成功
            Ok((status, "Model test succeeded".to_string()))
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::Http {
                status,
                body: error_text.trim().to_string(),
            })
        }
    }
}

/// 智能拼接 URL，避免重复 /v1
pub fn build_chat_completions_url(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderKeyOption, SourceKind};

    fn entry() -> EndpointProviderEntry {
        EndpointProviderEntry {
            id: "configured:codex:0".to_string(),
            source_kind: SourceKind::ConfiguredApi,
            provider_key: "codex".to_string(),
            name: "codex#1".to_string(),
            order: 0,
            base_url: "http://proxy/v1".to_string(),
            real_base_url: None,
            key_options: ProviderKeyOption::from_keys(["p1", "p2"]),
            real_key_options: Vec::new(),
            configured_models: None,
            auth_file_names: None,
            alias_lookup: None,
            excluded_patterns: None,
        }
    }

    #[test]
    fn test_build_chat_completions_url() {
        assert_eq!(
            build_chat_completions_url("https://api.example.com/v1/"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            build_chat_completions_url("https://api.example.com"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            build_chat_completions_url("https://api.example.com/v1/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn resolve_endpoint_picks_key_by_index() {
        let (url, key) =
            ModelTestService::resolve_endpoint(&entry(), ModelTestTarget::Proxy, 1).expect("ok");
        assert_eq!(url, "http://proxy/v1");
        assert_eq!(key, "p2");

        let (_, key) =
            ModelTestService::resolve_endpoint(&entry(), ModelTestTarget::Proxy, 9).expect("ok");
        assert_eq!(key, "p1");
    }

    #[test]
    fn upstream_target_requires_real_base_url() {
        let err = ModelTestService::resolve_endpoint(&entry(), ModelTestTarget::Upstream, 0)
            .expect_err("no upstream url");
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_default_config() {
        let config = ModelTestConfig::default();
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.max_tokens, 1);
        assert_eq!(config.test_prompt, "ping");
    }
}
