//! CLIProxyAPI 管理接口客户端
//!
//! 所有请求都位于可配置的管理基路径下（默认 `/v0/management`），
//! 使用 `Authorization: Bearer <management key>` 认证。

pub mod types;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::error::AppError;
use crate::http_client::{self, mask_url};
use crate::models::AuthApiModel;
use crate::settings::AppSettings;

pub use types::AuthFileRecord;

/// 管理接口的抽象，便于在测试中替换为内存实现
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// 后端完整配置
    async fn get_config(&self) -> Result<Value, AppError>;

    /// 认证文件列表
    async fn list_auth_files(&self) -> Result<Vec<AuthFileRecord>, AppError>;

    /// 供应商级别的模型定义
    async fn list_model_definitions(&self, provider_key: &str)
        -> Result<Vec<AuthApiModel>, AppError>;

    /// 单个认证文件可用的模型
    async fn list_auth_file_models(&self, file_name: &str) -> Result<Vec<AuthApiModel>, AppError>;

    /// provider(小写) → { 原始模型名(小写) → 别名 }
    async fn get_oauth_model_alias(
        &self,
    ) -> Result<HashMap<String, HashMap<String, String>>, AppError>;

    /// provider(小写) → 排除规则
    async fn get_oauth_excluded_models(&self) -> Result<HashMap<String, Vec<String>>, AppError>;

    /// 代理侧 API Key
    async fn list_api_keys(&self) -> Result<Vec<String>, AppError>;
}

/// 基于 reqwest 的管理接口实现
#[derive(Debug, Clone)]
pub struct ManagementClient {
    client: Client,
    base_url: String,
    management_key: String,
}

impl ManagementClient {
    pub fn new(client: Client, base_url: &str, management_key: &str) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url),
            management_key: management_key.trim().to_string(),
        }
    }

    /// 根据本地设置构建客户端（代理与超时取自设置）
    pub fn from_settings(settings: &AppSettings) -> Result<Self, AppError> {
        let base_url = settings.management_base_url.trim();
        if base_url.is_empty() {
            return Err(AppError::Config("Management base URL is not configured".into()));
        }
        let client = http_client::build_client(
            settings.proxy_url.as_deref(),
            Duration::from_secs(settings.request_timeout_secs),
        )?;
        Ok(Self::new(
            client,
            base_url,
            settings.management_key.as_deref().unwrap_or_default(),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            AppError::Config(format!(
                "Invalid management base URL '{}': {e}",
                mask_url(&self.base_url)
            ))
        })?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                AppError::Config(format!(
                    "Management base URL cannot be a base: {}",
                    mask_url(&self.base_url)
                ))
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn get_json(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Value, AppError> {
        let url = self.endpoint(segments)?;
        log::debug!("[Management] GET {}", url.path());

        let mut request = self.client.get(url.clone()).query(query);
        if !self.management_key.is_empty() {
            request = request.bearer_auth(&self.management_key);
        }

        let response = request.send().await.map_err(AppError::from_request)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[Management] {} returned {}", url.path(), status.as_u16());
            return Err(AppError::Http {
                status: status.as_u16(),
                body: extract_error_message(&body),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AppError::Request(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl ManagementApi for ManagementClient {
    async fn get_config(&self) -> Result<Value, AppError> {
        self.get_json(&["config"], &[]).await
    }

    async fn list_auth_files(&self) -> Result<Vec<AuthFileRecord>, AppError> {
        let value = self.get_json(&["auth-files"], &[]).await?;
        Ok(types::decode_auth_files(&value))
    }

    async fn list_model_definitions(
        &self,
        provider_key: &str,
    ) -> Result<Vec<AuthApiModel>, AppError> {
        let value = self
            .get_json(&["model-definitions", provider_key], &[])
            .await?;
        Ok(types::decode_model_items(&value))
    }

    async fn list_auth_file_models(&self, file_name: &str) -> Result<Vec<AuthApiModel>, AppError> {
        let value = self
            .get_json(&["auth-files", "models"], &[("name", file_name)])
            .await?;
        Ok(types::decode_model_items(&value))
    }

    async fn get_oauth_model_alias(
        &self,
    ) -> Result<HashMap<String, HashMap<String, String>>, AppError> {
        let value = self.get_json(&["oauth-model-alias"], &[]).await?;
        Ok(types::decode_alias_map(&value))
    }

    async fn get_oauth_excluded_models(&self) -> Result<HashMap<String, Vec<String>>, AppError> {
        let value = self.get_json(&["oauth-excluded-models"], &[]).await?;
        Ok(types::decode_excluded_map(&value))
    }

    async fn list_api_keys(&self) -> Result<Vec<String>, AppError> {
        let value = self.get_json(&["api-keys"], &[]).await?;
        Ok(types::decode_api_keys(&value))
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

/// 从错误响应体中提取可读信息：优先 `error.message` / `error` / `message`
fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(|m| m.as_str())
            .or_else(|| value.get("message").and_then(|m| m.as_str()));
        if let Some(message) = message.map(str::trim).filter(|m| !m.is_empty()) {
            return message.to_string();
        }
    }
    trimmed.to_string()
}

/// 从管理基地址推导代理侧的 OpenAI 兼容地址
///
/// `http://host:8317/v0/management` → `http://host:8317/v1`
pub fn derive_proxy_base_url(management_base: &str) -> String {
    let base = management_base.trim().trim_end_matches('/');
    let base = base.strip_suffix("/v0/management").unwrap_or(base);
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return String::new();
    }
    if base.ends_with("/v1") {
        base.to_string()
    } else {
        format!("{base}/v1")
    }
}
