use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

pub const RSM_PREFIX: &str = ":rsm:";
pub const RSM_SUFFIX: &str = "::";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("source must start with '{RSM_PREFIX}'")]
    MissingPrefix,
    #[error("source must end with '{RSM_SUFFIX}'")]
    MissingSuffix,
}

/// Checks the `:rsm: ... ::` envelope and returns the inner body.
pub fn validate_envelope(source: &str) -> Result<&str, EnvelopeError> {
    let trimmed = source.trim();
    let body = trimmed
        .strip_prefix(RSM_PREFIX)
        .ok_or(EnvelopeError::MissingPrefix)?;
    let body = body
        .strip_suffix(RSM_SUFFIX)
        .ok_or(EnvelopeError::MissingSuffix)?;
    Ok(body)
}

/// First `#` heading of the body, falling back to the first non-empty line.
pub fn extract_title(source: &str) -> Option<String> {
    let body = validate_envelope(source).ok()?;
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(heading) = line.strip_prefix("# ") {
            return Some(heading.trim().to_string());
        }
        return Some(line.to_string());
    }
    None
}

/// Splits the body on `##` headings. Content before the first heading is
/// keyed as "abstract".
pub fn split_sections(source: &str) -> Vec<(String, String)> {
    let body = match validate_envelope(source) {
        Ok(body) => body,
        Err(_) => return Vec::new(),
    };

    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current_name = "abstract".to_string();
    let mut current_lines: Vec<&str> = Vec::new();

    for line in body.lines() {
        if let Some(heading) = line.trim().strip_prefix("## ") {
            if !current_lines.iter().all(|l| l.trim().is_empty()) {
                sections.push((current_name.clone(), current_lines.join("\n")));
            }
            current_name = slugify(heading);
            current_lines = Vec::new();
        } else {
            current_lines.push(line);
        }
    }

    if !current_lines.iter().all(|l| l.trim().is_empty()) {
        sections.push((current_name, current_lines.join("\n")));
    }

    sections
}

fn slugify(heading: &str) -> String {
    heading
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Rendering is delegated to an external RSM service. The backend only
/// validates the envelope and hands the source over.
#[async_trait]
pub trait MarkupRenderer: Send + Sync + 'static {
    async fn render(
        &self,
        source: &str,
        handrails: bool,
        assets: Option<&HashMap<String, String>>,
    ) -> Result<String>;
}

pub struct HttpRenderer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRenderer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Deserialize)]
struct RenderResponse {
    html: String,
}

#[async_trait]
impl MarkupRenderer for HttpRenderer {
    async fn render(
        &self,
        source: &str,
        handrails: bool,
        assets: Option<&HashMap<String, String>>,
    ) -> Result<String> {
        validate_envelope(source).context("invalid RSM envelope")?;

        let payload = json!({
            "source": source,
            "handrails": handrails,
            "assets": assets.cloned().unwrap_or_default(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .context("rendering service unreachable")?
            .error_for_status()
            .context("rendering service returned an error")?;

        let parsed: RenderResponse = response
            .json()
            .await
            .context("malformed rendering service response")?;
        Ok(parsed.html)
    }
}

/// Minimal local renderer used when no RSM service endpoint is configured,
/// and by the test harness. Produces headings, paragraphs, and inline asset
/// references; no handrail interactivity beyond the wrapper markup.
pub struct BasicRenderer;

#[async_trait]
impl MarkupRenderer for BasicRenderer {
    async fn render(
        &self,
        source: &str,
        handrails: bool,
        assets: Option<&HashMap<String, String>>,
    ) -> Result<String> {
        let body = validate_envelope(source).map_err(anyhow::Error::from)?;

        let mut html = String::from("<div class=\"manuscriptwrapper\">");
        for block in body.split("\n\n") {
            let block = block.trim();
            if block.is_empty() {
                continue;
            }
            if let Some(heading) = block.strip_prefix("## ") {
                let escaped = html_escape::encode_text(heading.trim());
                if handrails {
                    html.push_str(&format!(
                        "<div class=\"handrail\"><h2>{escaped}</h2></div>"
                    ));
                } else {
                    html.push_str(&format!("<h2>{escaped}</h2>"));
                }
            } else if let Some(heading) = block.strip_prefix("# ") {
                let escaped = html_escape::encode_text(heading.trim());
                html.push_str(&format!("<h1>{escaped}</h1>"));
            } else {
                let mut paragraph = html_escape::encode_text(block).into_owned();
                if let Some(assets) = assets {
                    for (filename, data_uri) in assets {
                        let marker = format!("![{filename}]");
                        if paragraph.contains(&marker) {
                            paragraph = paragraph.replace(
                                &marker,
                                &format!("<img src=\"{data_uri}\" alt=\"{filename}\">"),
                            );
                        }
                    }
                }
                html.push_str(&format!("<p>{paragraph}</p>"));
            }
        }
        html.push_str("</div>");
        Ok(html)
    }
}
