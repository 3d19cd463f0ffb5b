//! 供应商模型刷新
//!
//! 为每个供应商条目获取模型列表并发布 loading / success / error 状态。
//! 同一供应商的多次刷新以开始顺序为准：较早开始的请求即使较晚完成也不会覆盖新结果。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{error_message, AppError};
use crate::management::ManagementApi;
use crate::models::{build_auth_model_list, dedupe_models, ModelInfo};
use crate::provider::{EndpointProviderEntry, SourceKind};
use crate::sequence::SequenceGuard;

/// 每批并发刷新的供应商数量
pub const REFRESH_BATCH_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelsStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// 单个供应商的模型状态
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderModelsState {
    pub status: ModelsStatus,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderModelsState {
    /// 进入 loading，保留已有模型供界面展示
    pub fn loading(previous: Option<&ProviderModelsState>) -> Self {
        Self {
            status: ModelsStatus::Loading,
            models: previous.map(|s| s.models.clone()).unwrap_or_default(),
            error: None,
        }
    }

    pub fn success(models: Vec<ModelInfo>) -> Self {
        Self {
            status: ModelsStatus::Success,
            models,
            error: None,
        }
    }

    pub fn failure(previous: Option<&ProviderModelsState>, message: String) -> Self {
        Self {
            status: ModelsStatus::Error,
            models: previous.map(|s| s.models.clone()).unwrap_or_default(),
            error: Some(message),
        }
    }
}

/// 模型刷新服务
///
/// 状态表与序号守卫由实例持有；克隆后共享同一份状态。
#[derive(Clone)]
pub struct ProviderModelsService {
    api: Arc<dyn ManagementApi>,
    states: Arc<RwLock<HashMap<String, ProviderModelsState>>>,
    sequences: Arc<SequenceGuard<String>>,
    batch_size: usize,
}

impl ProviderModelsService {
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self {
            api,
            states: Arc::new(RwLock::new(HashMap::new())),
            sequences: Arc::new(SequenceGuard::new()),
            batch_size: REFRESH_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn read_states(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ProviderModelsState>> {
        self.states.read().unwrap_or_else(|e| {
            log::warn!("[ModelRefresh] 状态锁已毒化，使用恢复值: {e}");
            e.into_inner()
        })
    }

    fn write_states(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ProviderModelsState>> {
        self.states.write().unwrap_or_else(|e| {
            log::warn!("[ModelRefresh] 状态锁已毒化，使用恢复值: {e}");
            e.into_inner()
        })
    }

    /// 获取单个供应商的状态（未刷新过时为 idle）
    pub fn state(&self, provider_id: &str) -> ProviderModelsState {
        self.read_states()
            .get(provider_id)
            .cloned()
            .unwrap_or_default()
    }

    /// 当前全部状态的快照
    pub fn snapshot(&self) -> HashMap<String, ProviderModelsState> {
        self.read_states().clone()
    }

    /// 丢弃不在本次条目列表中的供应商状态
    pub fn retain_entries(&self, entries: &[EndpointProviderEntry]) {
        let mut states = self.write_states();
        let stale: Vec<String> = states
            .keys()
            .filter(|id| !entries.iter().any(|entry| &entry.id == *id))
            .cloned()
            .collect();
        for id in stale {
            states.remove(&id);
            self.sequences.forget(&id);
        }
    }

    /// 领取序号并发布 loading
    ///
    /// 两步在状态写锁内完成：较早领取序号的调用不会在较新的结果写回后再把状态改回 loading。
    fn begin_loading(&self, provider_id: &str) -> u64 {
        let mut states = self.write_states();
        let seq = self.sequences.begin(&provider_id.to_string());
        let next = ProviderModelsState::loading(states.get(provider_id));
        states.insert(provider_id.to_string(), next);
        seq
    }

    /// 刷新单个供应商的模型
    ///
    /// 返回结果是否被写回；被更新的刷新取代时返回 false。
    pub async fn refresh_single_provider_models(&self, entry: &EndpointProviderEntry) -> bool {
        let seq = self.begin_loading(&entry.id);

        let result = self.resolve_models(entry).await;

        let mut states = self.write_states();
        if !self.sequences.is_latest(&entry.id, seq) {
            log::debug!("[ModelRefresh] 丢弃过期结果: {} (seq {seq})", entry.id);
            return false;
        }

        let next = match result {
            Ok(models) => {
                log::debug!("[ModelRefresh] {} 获取到 {} 个模型", entry.id, models.len());
                ProviderModelsState::success(models)
            }
            Err(e) => {
                let message = error_message(&e);
                log::warn!("[ModelRefresh] {} 获取模型失败: {message}", entry.id);
                ProviderModelsState::failure(states.get(&entry.id), message)
            }
        };
        states.insert(entry.id.clone(), next);
        true
    }

    /// 刷新全部供应商：先全部标记 loading，再按批次（每批并发）依次处理
    ///
    /// 标记时同样领取序号，此前仍在进行的刷新结果会被丢弃。
    pub async fn refresh_all_provider_models(&self, entries: &[EndpointProviderEntry]) {
        for entry in entries {
            self.begin_loading(&entry.id);
        }

        for batch in entries.chunks(self.batch_size) {
            join_all(
                batch
                    .iter()
                    .map(|entry| self.refresh_single_provider_models(entry)),
            )
            .await;
        }

        log::info!("[ModelRefresh] 已刷新 {} 个供应商的模型", entries.len());
    }

    /// 在后台任务中刷新全部供应商，调用方无需等待
    pub fn spawn_refresh_all(
        &self,
        entries: Vec<EndpointProviderEntry>,
    ) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            service.refresh_all_provider_models(&entries).await;
        })
    }

    /// 解析单个条目的模型列表
    pub async fn resolve_models(
        &self,
        entry: &EndpointProviderEntry,
    ) -> Result<Vec<ModelInfo>, AppError> {
        match entry.source_kind {
            SourceKind::ConfiguredApi => Ok(dedupe_models(
                entry.configured_models.clone().unwrap_or_default(),
            )),
            SourceKind::AuthProxy => self.resolve_auth_models(entry).await,
        }
    }

    /// auth-proxy 模型解析
    ///
    /// 1. 先请求供应商级模型定义；
    /// 2. 失败或为空时并行请求每个认证文件的模型列表，任一成功即采用；
    /// 3. 全部失败时抛出模型定义的原始错误；
    /// 4. 最后应用别名映射与排除规则。
    async fn resolve_auth_models(
        &self,
        entry: &EndpointProviderEntry,
    ) -> Result<Vec<ModelInfo>, AppError> {
        let raw = match self.api.list_model_definitions(&entry.provider_key).await {
            Ok(models) if !models.is_empty() => models,
            outcome => {
                let definitions_error = outcome.err();
                if let Some(e) = &definitions_error {
                    log::debug!(
                        "[ModelRefresh] {} 模型定义获取失败，回退到认证文件: {}",
                        entry.id,
                        error_message(e)
                    );
                }

                let results = join_all(
                    entry
                        .auth_files()
                        .map(|name| self.api.list_auth_file_models(name)),
                )
                .await;

                let mut collected = Vec::new();
                let mut any_success = false;
                let mut first_file_error = None;
                for result in results {
                    match result {
                        Ok(models) => {
                            any_success = true;
                            collected.extend(models);
                        }
                        Err(e) => {
                            log::debug!(
                                "[ModelRefresh] {} 认证文件模型获取失败: {}",
                                entry.id,
                                error_message(&e)
                            );
                            first_file_error.get_or_insert(e);
                        }
                    }
                }

                if !any_success {
                    if let Some(e) = definitions_error.or(first_file_error) {
                        return Err(e);
                    }
                }
                collected
            }
        };

        Ok(build_auth_model_list(
            &raw,
            entry.alias_lookup.as_ref(),
            entry.excluded_patterns.as_deref(),
        ))
    }
}
