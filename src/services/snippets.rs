//! 接入代码片段生成
//!
//! 为供应商条目与模型生成 curl / Python / Node 调用示例，展示时可对 Key 打码。

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;
use crate::provider::{mask_api_key, EndpointProviderEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetLanguage {
    Curl,
    Python,
    Node,
}

impl SnippetLanguage {
    pub const ALL: [SnippetLanguage; 3] = [
        SnippetLanguage::Curl,
        SnippetLanguage::Python,
        SnippetLanguage::Node,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnippetLanguage::Curl => "curl",
            SnippetLanguage::Python => "python",
            SnippetLanguage::Node => "node",
        }
    }
}

/// 片段生成选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnippetOptions {
    /// 是否对 API Key 打码（用于界面展示，复制时应关闭）
    pub mask_key: bool,
}

pub struct SnippetService;

impl SnippetService {
    pub fn build(
        language: SnippetLanguage,
        base_url: &str,
        api_key: &str,
        model: &str,
        options: SnippetOptions,
    ) -> Result<String, AppError> {
        let base_url = normalize_base_url(base_url);
        let model = model.trim();
        if base_url.is_empty() {
            return Err(AppError::InvalidInput("Base URL 不能为空".to_string()));
        }
        if model.is_empty() {
            return Err(AppError::InvalidInput("模型不能为空".to_string()));
        }

        let key = if options.mask_key {
            mask_api_key(api_key.trim())
        } else {
            api_key.trim().to_string()
        };

        Ok(match language {
            SnippetLanguage::Curl => curl_snippet(&base_url, &key, model),
            SnippetLanguage::Python => python_snippet(&base_url, &key, model),
            SnippetLanguage::Node => node_snippet(&base_url, &key, model),
        })
    }

    /// 使用条目的代理地址与第一个 Key 生成片段
    pub fn build_for_entry(
        language: SnippetLanguage,
        entry: &EndpointProviderEntry,
        model: &str,
        options: SnippetOptions,
    ) -> Result<String, AppError> {
        let api_key = entry
            .key_options
            .first()
            .map(|k| k.api_key.as_str())
            .unwrap_or_default();
        Self::build(language, &entry.base_url, api_key, model, options)
    }
}

/// SDK 需要以 `/v1` 结尾的地址
fn normalize_base_url(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.is_empty() || base.ends_with("/v1") {
        base.to_string()
    } else {
        format!("{base}/v1")
    }
}

/// JSON 字符串字面量，同时可直接用于 Python 与 JavaScript 源码
fn string_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// POSIX shell 单引号转义
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn curl_snippet(base_url: &str, api_key: &str, model: &str) -> String {
    let body = json!({
        "model": model,
        "messages": [{ "role": "user", "content": "Hello" }]
    });
    let body = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
    format!(
        "curl {url} \\\n  -H {content_type} \\\n  -H {auth} \\\n  -d {body}\n",
        url = shell_quote(&format!("{base_url}/chat/completions")),
        content_type = shell_quote("Content-Type: application/json"),
        auth = shell_quote(&format!("Authorization: Bearer {api_key}")),
        body = shell_quote(&body),
    )
}

fn python_snippet(base_url: &str, api_key: &str, model: &str) -> String {
    format!(
        r#"from openai import OpenAI

client = OpenAI(
    base_url={base_url},
    api_key={api_key},
)

response = client.chat.completions.create(
    model={model},
    messages=[{{"role": "user", "content": "Hello"}}],
)
print(response.choices[0].message.content)
"#,
        base_url = string_literal(base_url),
        api_key = string_literal(api_key),
        model = string_literal(model),
    )
}

fn node_snippet(base_url: &str, api_key: &str, model: &str) -> String {
    format!(
        r#"import OpenAI from "openai";

const client = new OpenAI({{
  baseURL: {base_url},
  apiKey: {api_key},
}});

const response = await client.chat.completions.create({{
  model: {model},
  messages: [{{ role: "user", content: "Hello" }}],
}});
console.log(response.choices[0].message.content);
"#,
        base_url = string_literal(base_url),
        api_key = string_literal(api_key),
        model = string_literal(model),
    )
}
