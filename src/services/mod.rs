pub mod claude_settings;
pub mod model_refresh;
pub mod model_test;
pub mod provider_entries;
pub mod snippets;

pub use claude_settings::{
    format_model_with_thinking, parse_model_with_thinking, ClaudeSettings, ClaudeSettingsFile,
    ClaudeSettingsService, ModelSlot, ModelWithThinking, ThinkingLevel,
};
pub use model_refresh::{
    ModelsStatus, ProviderModelsService, ProviderModelsState, REFRESH_BATCH_SIZE,
};
pub use model_test::{ModelTestConfig, ModelTestResult, ModelTestService, ModelTestTarget};
pub use provider_entries::{
    build_auth_provider_entries, build_configured_entries, filter_provider_entries,
    ConfiguredKind, ProviderCatalog, ProviderEntriesService,
};
pub use snippets::{SnippetLanguage, SnippetOptions, SnippetService};
