use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use cliproxy_admin_lib::services::build_auth_provider_entries;
use cliproxy_admin_lib::{
    AuthFileRecord, EndpointProviderEntry, ModelInfo, ModelsStatus, ProviderKeyOption,
    ProviderModelsService, SourceKind,
};

#[path = "support.rs"]
mod support;
use support::{models, FakeManagementApi, Scripted};

fn auth_entry(provider: &str, files: &[&str]) -> EndpointProviderEntry {
    auth_entry_with(provider, files, HashMap::new(), HashMap::new())
}

fn auth_entry_with(
    provider: &str,
    files: &[&str],
    alias_map: HashMap<String, HashMap<String, String>>,
    excluded_map: HashMap<String, Vec<String>>,
) -> EndpointProviderEntry {
    let records: Vec<AuthFileRecord> = files
        .iter()
        .map(|name| AuthFileRecord::new(*name, provider))
        .collect();
    build_auth_provider_entries(
        &records,
        &alias_map,
        &excluded_map,
        "http://127.0.0.1:8317/v1",
        &ProviderKeyOption::from_keys(["sk-proxy"]),
    )
    .into_iter()
    .next()
    .expect("auth entry")
}

fn names(models: &[ModelInfo]) -> Vec<&str> {
    models.iter().map(|m| m.name.as_str()).collect()
}

#[tokio::test]
async fn later_refresh_wins_even_when_it_finishes_first() {
    let api = Arc::new(FakeManagementApi::new());
    api.script_definitions("codex", Scripted::ok(models(&["old-model"])).after(120));
    api.script_definitions("codex", Scripted::ok(models(&["new-model"])).after(10));
    let service = ProviderModelsService::new(api.clone());
    let entry = auth_entry("codex", &["codex.json"]);

    let (first, second) = tokio::join!(service.refresh_single_provider_models(&entry), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        service.refresh_single_provider_models(&entry).await
    });

    assert!(!first, "stale result must be discarded");
    assert!(second);
    let state = service.state(&entry.id);
    assert_eq!(state.status, ModelsStatus::Success);
    assert_eq!(names(&state.models), vec!["new-model"]);
}

#[tokio::test]
async fn refresh_all_runs_in_batches_of_four() {
    let api = Arc::new(FakeManagementApi::new());
    let entries: Vec<EndpointProviderEntry> = (0..6)
        .map(|i| {
            let provider = format!("p{i}");
            api.script_definitions(&provider, Scripted::ok(models(&["m"])).after(30));
            auth_entry(&provider, &["f.json"])
        })
        .collect();
    let service = ProviderModelsService::new(api.clone());

    service.refresh_all_provider_models(&entries).await;

    assert_eq!(api.definition_calls.load(Ordering::SeqCst), 6);
    assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 4);
    for entry in &entries {
        assert_eq!(service.state(&entry.id).status, ModelsStatus::Success);
    }
}

#[tokio::test]
async fn refresh_all_marks_every_entry_loading_first() {
    let api = Arc::new(FakeManagementApi::new());
    let entries: Vec<EndpointProviderEntry> = (0..5)
        .map(|i| {
            let provider = format!("slow{i}");
            api.script_definitions(&provider, Scripted::ok(models(&["m"])).after(60));
            auth_entry(&provider, &["f.json"])
        })
        .collect();
    let service = ProviderModelsService::new(api.clone());

    let handle = service.spawn_refresh_all(entries.clone());
    tokio::time::sleep(Duration::from_millis(20)).await;
    // 第五个条目属于第二批，此时尚未开始请求，但已处于 loading
    assert_eq!(service.state(&entries[4].id).status, ModelsStatus::Loading);

    handle.await.expect("refresh task");
    assert_eq!(service.state(&entries[4].id).status, ModelsStatus::Success);
}

#[tokio::test]
async fn file_fallback_accepts_partial_success_and_applies_alias_then_exclusion() {
    let api = Arc::new(FakeManagementApi::new());
    api.script_definitions("codex", Scripted::err("definitions down"));
    api.script_file_models("a.json", Scripted::ok(models(&["gpt-5", "gpt-5-mini"])).after(5));
    api.script_file_models("b.json", Scripted::err("file b broken"));

    let alias_map = HashMap::from([(
        "codex".to_string(),
        HashMap::from([("gpt-5".to_string(), "GPT-5 Pro".to_string())]),
    )]);
    let excluded_map = HashMap::from([("codex".to_string(), vec!["*-MINI".to_string()])]);
    let entry = auth_entry_with("Codex", &["a.json", "b.json"], alias_map, excluded_map);

    let service = ProviderModelsService::new(api.clone());
    assert!(service.refresh_single_provider_models(&entry).await);

    let state = service.state("auth:codex");
    assert_eq!(state.status, ModelsStatus::Success);
    assert_eq!(state.models, vec![ModelInfo::with_alias("GPT-5 Pro", "gpt-5")]);
}

#[tokio::test]
async fn all_sources_failing_surfaces_definitions_error_and_keeps_models() {
    let api = Arc::new(FakeManagementApi::new());
    api.script_definitions("gemini", Scripted::ok(models(&["gemini-2.5-pro"])));
    api.script_definitions("gemini", Scripted::err("definitions down"));
    let entry = auth_entry("gemini", &["g.json"]);
    let service = ProviderModelsService::new(api.clone());

    service.refresh_single_provider_models(&entry).await;
    assert_eq!(service.state(&entry.id).status, ModelsStatus::Success);

    service.refresh_single_provider_models(&entry).await;
    let state = service.state(&entry.id);
    assert_eq!(state.status, ModelsStatus::Error);
    assert_eq!(state.error.as_deref(), Some("definitions down"));
    assert_eq!(names(&state.models), vec!["gemini-2.5-pro"]);
}

#[tokio::test]
async fn empty_definitions_with_failing_files_surface_file_error() {
    let api = Arc::new(FakeManagementApi::new());
    api.script_definitions("claude", Scripted::ok(Vec::new()));
    let entry = auth_entry("claude", &["c.json"]);
    let service = ProviderModelsService::new(api.clone());

    service.refresh_single_provider_models(&entry).await;
    let state = service.state(&entry.id);
    assert_eq!(state.status, ModelsStatus::Error);
    assert_eq!(state.error.as_deref(), Some("no models for file"));
    assert!(state.models.is_empty());
}

#[tokio::test]
async fn configured_entries_resolve_without_network() {
    let api = Arc::new(FakeManagementApi::new());
    let service = ProviderModelsService::new(api.clone());
    let entry = EndpointProviderEntry {
        id: "configured:claude:0".to_string(),
        source_kind: SourceKind::ConfiguredApi,
        provider_key: "claude".to_string(),
        name: "claude#1".to_string(),
        order: 0,
        base_url: "http://127.0.0.1:8317/v1".to_string(),
        real_base_url: Some("https://api.anthropic.com".to_string()),
        key_options: Vec::new(),
        real_key_options: Vec::new(),
        configured_models: Some(vec![
            ModelInfo::new("claude-sonnet-4"),
            ModelInfo::new("Claude-Sonnet-4"),
        ]),
        auth_file_names: None,
        alias_lookup: None,
        excluded_patterns: None,
    };

    assert!(service.refresh_single_provider_models(&entry).await);
    assert_eq!(api.definition_calls.load(Ordering::SeqCst), 0);
    assert_eq!(names(&service.state(&entry.id).models), vec!["claude-sonnet-4"]);
}

#[tokio::test]
async fn retain_entries_drops_stale_states() {
    let api = Arc::new(FakeManagementApi::new());
    api.script_definitions("codex", Scripted::ok(models(&["gpt-5"])));
    api.script_definitions("gemini", Scripted::ok(models(&["gemini-2.5-pro"])));
    let codex = auth_entry("codex", &["a.json"]);
    let gemini = auth_entry("gemini", &["b.json"]);
    let service = ProviderModelsService::new(api.clone());

    service
        .refresh_all_provider_models(&[codex.clone(), gemini.clone()])
        .await;
    service.retain_entries(std::slice::from_ref(&codex));

    let snapshot = service.snapshot();
    assert!(snapshot.contains_key(&codex.id));
    assert!(!snapshot.contains_key(&gemini.id));
    assert_eq!(service.state(&gemini.id).status, ModelsStatus::Idle);
}

fn configured_entry(id: &str, model: &str) -> EndpointProviderEntry {
    EndpointProviderEntry {
        id: id.to_string(),
        source_kind: SourceKind::ConfiguredApi,
        provider_key: "claude".to_string(),
        name: id.to_string(),
        order: 0,
        base_url: "http://127.0.0.1:8317/v1".to_string(),
        real_base_url: None,
        key_options: Vec::new(),
        real_key_options: Vec::new(),
        configured_models: Some(vec![ModelInfo::new(model)]),
        auth_file_names: None,
        alias_lookup: None,
        excluded_patterns: None,
    }
}

// 多线程并发刷新同一条目：全部结束后状态必须落在 success，不能停留在 loading
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_refreshes_never_leave_entry_loading() {
    let api = Arc::new(FakeManagementApi::new());
    let service = ProviderModelsService::new(api.clone());
    let entry = Arc::new(configured_entry("configured:claude:0", "claude-sonnet-4"));

    let mut stuck = 0;
    for _ in 0..2000 {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                let entry = entry.clone();
                tokio::spawn(async move { service.refresh_single_provider_models(&entry).await })
            })
            .collect();
        let mut applied = 0;
        for handle in handles {
            if handle.await.expect("refresh task") {
                applied += 1;
            }
        }
        assert!(applied >= 1, "the latest refresh must be applied");
        if service.state(&entry.id).status != ModelsStatus::Success {
            stuck += 1;
        }
    }
    assert_eq!(stuck, 0);
}

#[tokio::test]
async fn refresh_all_discards_results_of_earlier_in_flight_refresh() {
    let api = Arc::new(FakeManagementApi::new());
    api.script_definitions("slow", Scripted::ok(models(&["s"])).after(100));
    api.script_definitions("codex", Scripted::ok(models(&["old-model"])).after(50));
    api.script_definitions("codex", Scripted::ok(models(&["new-model"])).after(10));
    let slow = auth_entry("slow", &["s.json"]);
    let codex = auth_entry("codex", &["c.json"]);
    let service = ProviderModelsService::new(api.clone()).with_batch_size(1);

    let single = {
        let service = service.clone();
        let codex = codex.clone();
        tokio::spawn(async move { service.refresh_single_provider_models(&codex).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let all = service.spawn_refresh_all(vec![slow.clone(), codex.clone()]);

    // 单独刷新在 50ms 左右返回；批大小为 1，codex 要等 slow 完成后才开始
    tokio::time::sleep(Duration::from_millis(70)).await;
    assert_eq!(service.state(&codex.id).status, ModelsStatus::Loading);
    assert_eq!(service.state(&slow.id).status, ModelsStatus::Loading);

    assert!(!single.await.expect("single refresh"));
    all.await.expect("refresh all");
    let state = service.state(&codex.id);
    assert_eq!(state.status, ModelsStatus::Success);
    assert_eq!(names(&state.models), vec!["new-model"]);
    assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_definitions_fall_back_to_file_models() {
    let api = Arc::new(FakeManagementApi::new());
    api.script_definitions("antigravity", Scripted::ok(Vec::new()));
    api.script_file_models("ag-1.json", Scripted::ok(models(&["gemini-3-pro"])));
    api.script_file_models("ag-2.json", Scripted::ok(models(&["Gemini-3-Pro", "claude-opus-4"])));
    let entry = auth_entry("antigravity", &["ag-1.json", "ag-2.json"]);
    let service = ProviderModelsService::new(api.clone());

    assert!(service.refresh_single_provider_models(&entry).await);
    let state = service.state(&entry.id);
    assert_eq!(state.status, ModelsStatus::Success);
    assert_eq!(names(&state.models), vec!["gemini-3-pro", "claude-opus-4"]);
}
