//! HTTP 客户端构建
//!
//! 管理接口与连通性测试共用同一套客户端配置，可选出站代理。
//! 客户端由调用方持有，不做全局缓存。

use std::time::Duration;

use reqwest::Client;

use crate::error::AppError;

/// 默认请求超时
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 构建 HTTP 客户端
///
/// # Arguments
/// * `proxy_url` - 代理 URL，如 `http://127.0.0.1:7890` 或 `socks5://127.0.0.1:1080`，
///   None 或空字符串表示直连
/// * `timeout` - 单次请求总超时
pub fn build_client(proxy_url: Option<&str>, timeout: Duration) -> Result<Client, AppError> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(4)
        .tcp_keepalive(Duration::from_secs(60));

    let proxy_url = proxy_url.map(str::trim).filter(|s| !s.is_empty());
    if let Some(url) = proxy_url {
        let parsed = url::Url::parse(url).map_err(|e| {
            AppError::Config(format!("Invalid proxy URL '{}': {}", mask_url(url), e))
        })?;

        let scheme = parsed.scheme();
        if !["http", "https", "socks5", "socks5h"].contains(&scheme) {
            return Err(AppError::Config(format!(
                "Invalid proxy scheme '{}' in URL '{}'. Supported: http, https, socks5, socks5h",
                scheme,
                mask_url(url)
            )));
        }

        let proxy = reqwest::Proxy::all(url).map_err(|e| {
            AppError::Config(format!("Invalid proxy URL '{}': {}", mask_url(url), e))
        })?;
        builder = builder.proxy(proxy);
        log::debug!("[HttpClient] Proxy configured: {}", mask_url(url));
    } else {
        builder = builder.no_proxy();
        log::debug!("[HttpClient] Direct connection (no proxy)");
    }

    builder
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))
}

/// 隐藏 URL 中的敏感信息（用于日志）
pub fn mask_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        // 隐藏用户名、密码与路径，保留 scheme、host 和端口
        let host = parsed.host_str().unwrap_or("?");
        match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        }
    } else if url.chars().count() > 20 {
        let head: String = url.chars().take(20).collect();
        format!("{head}...")
    } else {
        url.to_string()
    }
}
