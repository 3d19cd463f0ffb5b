use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;

/// 获取用户主目录
pub fn get_home_dir() -> Result<PathBuf, AppError> {
    dirs::home_dir().ok_or_else(|| AppError::Config("无法获取用户主目录".to_string()))
}

/// 应用配置目录 `~/.cliproxy-admin`
pub fn get_app_config_dir() -> Result<PathBuf, AppError> {
    Ok(get_home_dir()?.join(".cliproxy-admin"))
}

/// 默认的 Claude Code 设置文件位置 `~/.claude/settings.json`
pub fn get_claude_settings_path() -> Result<PathBuf, AppError> {
    Ok(get_home_dir()?.join(".claude").join("settings.json"))
}

/// 读取 JSON 文件
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let content = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| AppError::json(path, e))
}

/// 以 2 空格缩进写入 JSON 文件（末尾带换行），使用原子写入
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let mut json =
        serde_json::to_string_pretty(value).map_err(|e| AppError::JsonSerialize { source: e })?;
    json.push('\n');
    atomic_write(path, json.as_bytes())
}

/// 原子写入：先写同目录临时文件，再重命名覆盖
///
/// 任一步失败时临时文件被丢弃，原文件保持不变。
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| AppError::io(parent, e))?;
    tmp.write_all(data).map_err(|e| AppError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| AppError::io(tmp.path(), e))?;

    // 保留原文件权限
    if let Ok(meta) = fs::metadata(path) {
        if let Err(e) = fs::set_permissions(tmp.path(), meta.permissions()) {
            log::warn!("保留文件权限失败 {}: {e}", path.display());
        }
    }

    tmp.persist(path).map_err(|e| AppError::io(path, e.error))?;
    Ok(())
}
