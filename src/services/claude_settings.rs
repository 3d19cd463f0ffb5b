//! Claude Code 设置文件读写
//!
//! 用户选择一个本地 `settings.json`，路径记录在应用设置中以便重启后直接打开。
//! 每次读写前检查文件权限；写入使用原子替换，失败时原文件保持不变。
//!
//! 设置中的四个模型槽位可带思考等级后缀 `model(level)`，仅 codex 供应商的模型可设置。

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{get_claude_settings_path, read_json_file, write_json_file};
use crate::error::{AccessMode, AppError};
use crate::settings::SettingsStore;

/// 思考等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Low,
    Medium,
    High,
    Xhigh,
}

impl ThinkingLevel {
    pub const ALL: [ThinkingLevel; 4] = [
        ThinkingLevel::Low,
        ThinkingLevel::Medium,
        ThinkingLevel::High,
        ThinkingLevel::Xhigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingLevel::Low => "low",
            ThinkingLevel::Medium => "medium",
            ThinkingLevel::High => "high",
            ThinkingLevel::Xhigh => "xhigh",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == value)
    }
}

/// 拆分后的模型值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelWithThinking {
    pub base_model: String,
    pub thinking: Option<ThinkingLevel>,
}

static THINKING_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)\((low|medium|high|xhigh)\)$").expect("valid thinking suffix regex")
});

/// 解析 `base-model(level)`；没有合法后缀时整个值作为模型名
pub fn parse_model_with_thinking(value: &str) -> ModelWithThinking {
    let value = value.trim();
    if let Some(caps) = THINKING_SUFFIX.captures(value) {
        let base = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let level = caps.get(2).and_then(|m| ThinkingLevel::parse(m.as_str()));
        if !base.is_empty() {
            return ModelWithThinking {
                base_model: base.to_string(),
                thinking: level,
            };
        }
    }
    ModelWithThinking {
        base_model: value.to_string(),
        thinking: None,
    }
}

/// 组合模型名与思考等级
pub fn format_model_with_thinking(base_model: &str, thinking: Option<ThinkingLevel>) -> String {
    let base = base_model.trim();
    match thinking {
        Some(level) if !base.is_empty() => format!("{base}({})", level.as_str()),
        _ => base.to_string(),
    }
}

/// `env` 中的模型槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSlot {
    Main,
    Opus,
    Sonnet,
    Haiku,
}

impl ModelSlot {
    pub const ALL: [ModelSlot; 4] = [
        ModelSlot::Main,
        ModelSlot::Opus,
        ModelSlot::Sonnet,
        ModelSlot::Haiku,
    ];

    pub fn env_key(&self) -> &'static str {
        match self {
            ModelSlot::Main => "ANTHROPIC_MODEL",
            ModelSlot::Opus => "ANTHROPIC_DEFAULT_OPUS_MODEL",
            ModelSlot::Sonnet => "ANTHROPIC_DEFAULT_SONNET_MODEL",
            ModelSlot::Haiku => "ANTHROPIC_DEFAULT_HAIKU_MODEL",
        }
    }
}

fn is_codex_provider(provider_key: &str) -> bool {
    provider_key.trim().eq_ignore_ascii_case("codex")
}

/// Claude Code 设置内容
///
/// 以原始 JSON 对象保存，未识别的字段原样写回。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaudeSettings(Map<String, Value>);

impl ClaudeSettings {
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(format!(
                "top-level value must be a JSON object, got {}",
                json_type_name(&other)
            )),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn model(&self) -> Option<&str> {
        self.0.get("model").and_then(|v| v.as_str())
    }

    pub fn language(&self) -> Option<&str> {
        self.0.get("language").and_then(|v| v.as_str())
    }

    /// 读取槽位的原始值（可能带思考后缀）
    pub fn slot_value(&self, slot: ModelSlot) -> Option<&str> {
        self.0
            .get("env")
            .and_then(|env| env.get(slot.env_key()))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn slot_model(&self, slot: ModelSlot) -> Option<ModelWithThinking> {
        self.slot_value(slot).map(parse_model_with_thinking)
    }

    /// 写入槽位原始值；`None` 或空串删除该键
    pub fn set_slot_value(&mut self, slot: ModelSlot, value: Option<&str>) {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        match value {
            Some(value) => {
                let env = self
                    .0
                    .entry("env".to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !env.is_object() {
                    *env = Value::Object(Map::new());
                }
                if let Some(env) = env.as_object_mut() {
                    env.insert(slot.env_key().to_string(), Value::String(value.to_string()));
                }
            }
            None => {
                if let Some(env) = self.0.get_mut("env").and_then(|v| v.as_object_mut()) {
                    env.remove(slot.env_key());
                }
            }
        }
    }

    /// 为槽位选择模型
    ///
    /// codex 供应商：保留传入值中的思考等级，否则沿用槽位原有等级；
    /// 其他供应商：思考等级被清除。
    pub fn assign_slot_model(&mut self, slot: ModelSlot, model: &str, provider_key: &str) {
        let requested = parse_model_with_thinking(model);
        if requested.base_model.is_empty() {
            self.set_slot_value(slot, None);
            return;
        }

        let thinking = if is_codex_provider(provider_key) {
            requested
                .thinking
                .or_else(|| self.slot_model(slot).and_then(|current| current.thinking))
        } else {
            None
        };
        let value = format_model_with_thinking(&requested.base_model, thinking);
        self.set_slot_value(slot, Some(&value));
    }

    /// 设置槽位的思考等级（仅 codex 供应商的模型可设置，`None` 为清除）
    pub fn set_slot_thinking(
        &mut self,
        slot: ModelSlot,
        thinking: Option<ThinkingLevel>,
        provider_key: &str,
    ) -> Result<(), AppError> {
        let current = self.slot_model(slot).ok_or_else(|| {
            AppError::InvalidInput(format!("{} 尚未选择模型", slot.env_key()))
        })?;
        if thinking.is_some() && !is_codex_provider(provider_key) {
            return Err(AppError::InvalidInput(
                "思考等级仅适用于 codex 供应商的模型".to_string(),
            ));
        }
        let value = format_model_with_thinking(&current.base_model, thinking);
        self.set_slot_value(slot, Some(&value));
        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 已选择的 Claude 设置文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeSettingsFile {
    path: PathBuf,
}

impl ClaudeSettingsFile {
    /// 处理文件选择器的结果：取消视为正常的空结果，仅接受 `.json`
    pub fn pick(selection: Option<PathBuf>) -> Result<Option<Self>, AppError> {
        let Some(path) = selection else {
            return Ok(None);
        };
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if !is_json {
            return Err(AppError::InvalidInput(format!(
                "请选择 .json 文件: {}",
                path.display()
            )));
        }
        Ok(Some(Self { path }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 检查访问权限
    pub fn ensure_permission(&self, mode: AccessMode) -> Result<(), AppError> {
        let map_err = |e: std::io::Error| {
            if e.kind() == ErrorKind::PermissionDenied {
                AppError::permission_denied(&self.path, mode)
            } else {
                AppError::io(&self.path, e)
            }
        };

        match mode {
            AccessMode::Read => {
                fs::File::open(&self.path).map_err(map_err)?;
            }
            AccessMode::ReadWrite => {
                let meta = fs::metadata(&self.path).map_err(map_err)?;
                if meta.permissions().readonly() {
                    return Err(AppError::permission_denied(&self.path, mode));
                }
                fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&self.path)
                    .map_err(map_err)?;
            }
        }
        Ok(())
    }

    /// 读取并解析设置，顶层必须是 JSON 对象
    pub fn read(&self) -> Result<ClaudeSettings, AppError> {
        self.ensure_permission(AccessMode::Read)?;
        let value: Value = read_json_file(&self.path).map_err(|e| match e {
            AppError::Json { path, source } => AppError::InvalidSettingsFile {
                path,
                reason: source.to_string(),
            },
            other => other,
        })?;
        ClaudeSettings::from_value(value).map_err(|reason| AppError::InvalidSettingsFile {
            path: self.path.display().to_string(),
            reason,
        })
    }

    /// 以 2 空格缩进加末尾换行原子写入
    pub fn write(&self, settings: &ClaudeSettings) -> Result<(), AppError> {
        self.ensure_permission(AccessMode::ReadWrite)?;
        write_json_file(&self.path, settings.as_map()).map_err(|e| match e {
            AppError::Io { source, .. } if source.kind() == ErrorKind::PermissionDenied => {
                AppError::permission_denied(&self.path, AccessMode::ReadWrite)
            }
            other => other,
        })?;
        log::info!("[ClaudeSettings] 已写入 {}", self.path.display());
        Ok(())
    }
}

/// 设置文件选择的持久化
pub struct ClaudeSettingsService;

impl ClaudeSettingsService {
    /// 记录选择的文件，下次启动可直接恢复
    pub fn remember(store: &SettingsStore, file: &ClaudeSettingsFile) -> Result<(), AppError> {
        store.set_claude_settings_path(Some(file.path()))
    }

    pub fn forget(store: &SettingsStore) -> Result<(), AppError> {
        store.set_claude_settings_path(None)
    }

    /// 恢复上次选择的文件；文件已不存在时返回 None（保留记录，便于用户恢复文件）
    ///
    /// 从未选择过文件时使用默认位置 `~/.claude/settings.json`（存在时）。
    pub fn restore(store: &SettingsStore) -> Option<ClaudeSettingsFile> {
        Self::restore_with_default(store, get_claude_settings_path().ok())
    }

    fn restore_with_default(
        store: &SettingsStore,
        default_path: Option<PathBuf>,
    ) -> Option<ClaudeSettingsFile> {
        match store.claude_settings_path() {
            Some(path) if path.exists() => Some(ClaudeSettingsFile { path }),
            Some(path) => {
                log::warn!("[ClaudeSettings] 上次选择的文件不存在: {}", path.display());
                None
            }
            None => {
                let path = default_path.filter(|p| p.is_file())?;
                log::info!("[ClaudeSettings] 使用默认设置文件: {}", path.display());
                Some(ClaudeSettingsFile { path })
            }
        }
    }
}
