use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::config::get_app_config_dir;
use crate::error::AppError;
use crate::services::model_test::ModelTestConfig;

fn default_management_base_url() -> String {
    "http://127.0.0.1:8317/v0/management".to_string()
}

fn default_request_timeout_secs() -> u64 {
    crate::http_client::DEFAULT_TIMEOUT_SECS
}

/// 应用设置结构
///
/// 存储设备级别设置，保存在本地 `~/.cliproxy-admin/settings.json`。
/// 其中 `claude_settings_path` 记录上次授权的 Claude 设置文件，便于重启后直接重新打开。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    // ===== 管理接口连接 =====
    #[serde(default = "default_management_base_url")]
    pub management_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_key: Option<String>,
    /// 出站代理（可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    // ===== 界面 =====
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    // ===== 本地文件 =====
    /// 上次选择的 Claude Code settings.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_settings_path: Option<String>,

    // ===== 连通性测试 =====
    #[serde(default)]
    pub model_test: ModelTestConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            management_base_url: default_management_base_url(),
            management_key: None,
            proxy_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            language: None,
            claude_settings_path: None,
            model_test: ModelTestConfig::default(),
        }
    }
}

fn trim_optional(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

impl AppSettings {
    fn normalize(&mut self) {
        self.management_base_url = self
            .management_base_url
            .trim()
            .trim_end_matches('/')
            .to_string();
        if self.management_base_url.is_empty() {
            self.management_base_url = default_management_base_url();
        }
        self.management_key = trim_optional(&self.management_key);
        self.proxy_url = trim_optional(&self.proxy_url);
        self.claude_settings_path = trim_optional(&self.claude_settings_path);

        self.language = self
            .language
            .as_ref()
            .map(|s| s.trim())
            .filter(|s| matches!(*s, "en" | "zh" | "ja"))
            .map(|s| s.to_string());

        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        if self.model_test.timeout_secs == 0 {
            self.model_test.timeout_secs = ModelTestConfig::default().timeout_secs;
        }
    }

    fn load_from_file(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<AppSettings>(&content) {
                Ok(mut settings) => {
                    settings.normalize();
                    settings
                }
                Err(err) => {
                    log::warn!(
                        "解析设置文件失败，将使用默认设置。路径: {}, 错误: {}",
                        path.display(),
                        err
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

fn save_settings_file(path: &Path, settings: &AppSettings) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
    }

    let json =
        serde_json::to_string_pretty(settings).map_err(|e| AppError::JsonSerialize { source: e })?;

    // 设置中含管理密钥，unix 下仅本人可读写
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| AppError::io(path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| AppError::io(path, e))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, json).map_err(|e| AppError::io(path, e))?;
    }

    Ok(())
}

/// 设置存储：文件 + 内存缓存
///
/// 每个实例独立持有路径与缓存，测试可使用临时目录。
pub struct SettingsStore {
    path: PathBuf,
    cache: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = AppSettings::load_from_file(&path);
        Self {
            path,
            cache: RwLock::new(settings),
        }
    }

    /// 打开默认位置 `~/.cliproxy-admin/settings.json`
    pub fn open_default() -> Result<Self, AppError> {
        Ok(Self::open(get_app_config_dir()?.join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> AppSettings {
        self.cache
            .read()
            .unwrap_or_else(|e| {
                log::warn!("设置锁已毒化，使用恢复值: {e}");
                e.into_inner()
            })
            .clone()
    }

    pub fn update(&self, mut new_settings: AppSettings) -> Result<(), AppError> {
        new_settings.normalize();
        save_settings_file(&self.path, &new_settings)?;

        let mut guard = self.cache.write().unwrap_or_else(|e| {
            log::warn!("设置锁已毒化，使用恢复值: {e}");
            e.into_inner()
        });
        *guard = new_settings;
        Ok(())
    }

    pub fn mutate<F>(&self, mutator: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut AppSettings),
    {
        let mut guard = self.cache.write().unwrap_or_else(|e| {
            log::warn!("设置锁已毒化，使用恢复值: {e}");
            e.into_inner()
        });
        let mut next = guard.clone();
        mutator(&mut next);
        next.normalize();
        save_settings_file(&self.path, &next)?;
        *guard = next;
        Ok(())
    }

    /// 从文件重新加载设置到内存缓存
    pub fn reload(&self) {
        let fresh = AppSettings::load_from_file(&self.path);
        let mut guard = self.cache.write().unwrap_or_else(|e| {
            log::warn!("设置锁已毒化，使用恢复值: {e}");
            e.into_inner()
        });
        *guard = fresh;
    }

    // ===== Claude 设置文件 =====

    pub fn claude_settings_path(&self) -> Option<PathBuf> {
        self.get().claude_settings_path.map(PathBuf::from)
    }

    /// 记录（或清除）上次选择的 Claude 设置文件
    pub fn set_claude_settings_path(&self, path: Option<&Path>) -> Result<(), AppError> {
        let value = path.map(|p| p.display().to_string());
        self.mutate(|current| current.claude_settings_path = value)
    }
}
