#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cliproxy_admin_lib::{AppError, AuthApiModel, AuthFileRecord, ManagementApi};
use serde_json::Value;

/// 一次模拟响应：延迟后返回结果
#[derive(Clone)]
pub struct Scripted<T> {
    pub delay: Duration,
    pub result: Result<T, String>,
}

impl<T> Scripted<T> {
    pub fn ok(value: T) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(value),
        }
    }

    pub fn err(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(message.to_string()),
        }
    }

    pub fn after(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }
}

pub fn models(ids: &[&str]) -> Vec<AuthApiModel> {
    ids.iter().map(|id| AuthApiModel::new(*id, "")).collect()
}

/// 内存版管理接口
///
/// 模型定义按 provider 排队：每次调用取出队首的脚本，只剩一个时重复使用。
#[derive(Default)]
pub struct FakeManagementApi {
    pub config: Option<Result<Value, String>>,
    pub auth_files: Vec<AuthFileRecord>,
    pub alias_map: HashMap<String, HashMap<String, String>>,
    pub excluded_map: HashMap<String, Vec<String>>,
    pub api_keys: Vec<String>,
    pub fail_api_keys: bool,
    definitions: Mutex<HashMap<String, Vec<Scripted<Vec<AuthApiModel>>>>>,
    file_models: Mutex<HashMap<String, Scripted<Vec<AuthApiModel>>>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub definition_calls: AtomicUsize,
}

impl FakeManagementApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_definitions(&self, provider: &str, script: Scripted<Vec<AuthApiModel>>) {
        self.definitions
            .lock()
            .unwrap()
            .entry(provider.to_string())
            .or_default()
            .push(script);
    }

    pub fn script_file_models(&self, file: &str, script: Scripted<Vec<AuthApiModel>>) {
        self.file_models
            .lock()
            .unwrap()
            .insert(file.to_string(), script);
    }

    fn next_definition(&self, provider: &str) -> Scripted<Vec<AuthApiModel>> {
        let mut scripts = self.definitions.lock().unwrap();
        match scripts.get_mut(provider) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Scripted::ok(Vec::new()),
        }
    }

    async fn play<T>(&self, script: Scripted<T>) -> Result<T, AppError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        script.result.map_err(AppError::Message)
    }
}

#[async_trait]
impl ManagementApi for FakeManagementApi {
    async fn get_config(&self) -> Result<Value, AppError> {
        match &self.config {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(AppError::Message(message.clone())),
            None => Ok(Value::Object(Default::default())),
        }
    }

    async fn list_auth_files(&self) -> Result<Vec<AuthFileRecord>, AppError> {
        Ok(self.auth_files.clone())
    }

    async fn list_model_definitions(
        &self,
        provider_key: &str,
    ) -> Result<Vec<AuthApiModel>, AppError> {
        self.definition_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.next_definition(provider_key);
        self.play(script).await
    }

    async fn list_auth_file_models(&self, file_name: &str) -> Result<Vec<AuthApiModel>, AppError> {
        let script = self
            .file_models
            .lock()
            .unwrap()
            .get(file_name)
            .cloned()
            .unwrap_or_else(|| Scripted::err("no models for file"));
        self.play(script).await
    }

    async fn get_oauth_model_alias(
        &self,
    ) -> Result<HashMap<String, HashMap<String, String>>, AppError> {
        Ok(self.alias_map.clone())
    }

    async fn get_oauth_excluded_models(&self) -> Result<HashMap<String, Vec<String>>, AppError> {
        Ok(self.excluded_map.clone())
    }

    async fn list_api_keys(&self) -> Result<Vec<String>, AppError> {
        if self.fail_api_keys {
            return Err(AppError::Message("api-keys unavailable".to_string()));
        }
        Ok(self.api_keys.clone())
    }
}
