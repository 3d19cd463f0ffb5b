//! CLIProxyAPI 管理端的供应商/模型聚合，以及 Claude Code 设置文件的模型槽位编辑。

mod config;
mod error;
mod http_client;
pub mod management;
pub mod models;
mod provider;
mod sequence;
pub mod services;
mod settings;

pub use config::{
    atomic_write, get_app_config_dir, get_claude_settings_path, read_json_file, write_json_file,
};
pub use error::{error_message, AccessMode, AppError, GENERIC_ERROR_MESSAGE};
pub use http_client::{build_client, mask_url, DEFAULT_TIMEOUT_SECS};
pub use management::{derive_proxy_base_url, AuthFileRecord, ManagementApi, ManagementClient};
pub use models::{AuthApiModel, ConfiguredModel, ModelInfo};
pub use provider::{mask_api_key, EndpointProviderEntry, ProviderKeyOption, SourceKind};
pub use sequence::SequenceGuard;
pub use services::{
    ClaudeSettings, ClaudeSettingsFile, ClaudeSettingsService, ModelSlot, ModelTestConfig,
    ModelTestResult, ModelTestService, ModelTestTarget, ModelsStatus, ProviderCatalog,
    ProviderEntriesService, ProviderModelsService, ProviderModelsState, SnippetLanguage,
    SnippetOptions, SnippetService, ThinkingLevel,
};
pub use settings::{AppSettings, SettingsStore};
