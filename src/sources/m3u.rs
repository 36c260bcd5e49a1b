//! M3U document fetcher
//!
//! Downloads playlists over HTTP(S) and parses `#EXTINF` metadata into
//! [`ChannelRecord`]s. Duplicate keys are kept in document order; collapsing
//! them is the reconciliation engine's job.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::traits::DocumentFetcher;
use crate::config::FetcherConfig;
use crate::errors::{FetchError, SourceError, SourceResult};
use crate::models::ChannelRecord;

const SOURCE_TYPE: &str = "m3u";

/// HTTP fetcher for M3U and M3U8 playlists
#[derive(Clone)]
pub struct HttpM3uFetcher {
    client: Client,
    max_document_size: usize,
}

impl HttpM3uFetcher {
    pub fn new(config: &FetcherConfig) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SourceError::Request {
                url: String::new(),
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            max_document_size: config.max_document_size,
        })
    }

    async fn download(&self, url: &str) -> SourceResult<String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("GET {url} returned {status}"),
            });
        }

        if let Some(length) = response.content_length() {
            check_declared_length(length, self.max_document_size)?;
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SourceError::from_reqwest(url, e))?
        {
            if body.len() + chunk.len() > self.max_document_size {
                return Err(SourceError::TooLarge {
                    size: body.len() + chunk.len(),
                    max_size: self.max_document_size,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl DocumentFetcher for HttpM3uFetcher {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChannelRecord>, FetchError> {
        let content = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(SourceError::Cancelled { url: url.to_string() });
            }
            result = self.download(url) => result?,
        };

        let records = parse_m3u_content(&content)?;
        info!("Parsed {} channels from M3U document: {}", records.len(), url);
        Ok(records)
    }
}

/// Reject a declared Content-Length above the limit
///
/// A length that does not fit in `usize` is too large by definition.
fn check_declared_length(length: u64, max_size: usize) -> SourceResult<()> {
    match usize::try_from(length) {
        Ok(size) if size <= max_size => Ok(()),
        Ok(size) => Err(SourceError::TooLarge { size, max_size }),
        Err(_) => Err(SourceError::TooLarge {
            size: usize::MAX,
            max_size,
        }),
    }
}

/// Parse M3U content into channel records, in document order
pub fn parse_m3u_content(content: &str) -> SourceResult<Vec<ChannelRecord>> {
    let content = content.trim_start_matches('\u{feff}');
    let mut records = Vec::new();
    let mut current: Option<ChannelRecord> = None;
    let mut saw_header = false;
    let mut orphan_urls = 0usize;

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("#EXTM3U") {
            saw_header = true;
        } else if let Some(extinf) = line.strip_prefix("#EXTINF:") {
            if current.is_some() {
                debug!("EXTINF at line {} replaces one without a URL", line_num + 1);
            }
            current = Some(parse_extinf_line(extinf));
        } else if let Some(group) = line.strip_prefix("#EXTGRP:") {
            if let Some(record) = current.as_mut()
                && record.group.is_none()
            {
                record.group = non_empty(group);
            }
        } else if line.starts_with('#') {
            continue;
        } else if let Some(mut record) = current.take() {
            record.media_url = line.to_string();
            records.push(record);
        } else {
            orphan_urls += 1;
            warn!(
                "Found stream URL without EXTINF metadata at line {}: {}",
                line_num + 1,
                line
            );
            records.push(ChannelRecord {
                media_url: line.to_string(),
                ..Default::default()
            });
        }
    }

    if !saw_header && orphan_urls == records.len() && !content.trim().is_empty() {
        return Err(SourceError::parse(
            SOURCE_TYPE,
            "document has no #EXTM3U header and no playlist entries",
        ));
    }

    if orphan_urls > 0 {
        info!("{} stream URLs had no EXTINF metadata", orphan_urls);
    }
    Ok(records)
}

/// Parse the part of an EXTINF line after `#EXTINF:`
///
/// Format: `duration key="value" ...,title`. The title starts after the
/// first comma outside quotes so titles may themselves contain commas.
fn parse_extinf_line(extinf: &str) -> ChannelRecord {
    let (attrs_part, title) = match find_title_separator(extinf) {
        Some(pos) => (&extinf[..pos], extinf[pos + 1..].trim()),
        None => (extinf, ""),
    };

    let attributes = parse_extinf_attributes(attrs_part);
    let attribute = |key: &str| attributes.get(key).and_then(|value| non_empty(value));

    ChannelRecord {
        title: title.to_string(),
        group: attribute("group-title"),
        tvg_id: attribute("tvg-id"),
        media_url: String::new(),
        logo_url: attribute("tvg-logo"),
    }
}

fn find_title_separator(extinf: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (pos, ch) in extinf.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(pos),
            _ => {}
        }
    }
    None
}

/// Parse `key="value"` (or unquoted `key=value`) pairs
fn parse_extinf_attributes(attrs_part: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    let mut chars = attrs_part.chars().peekable();
    let mut current_key = String::new();
    let mut current_value = String::new();
    let mut in_quotes = false;
    let mut in_value = false;

    while let Some(ch) = chars.next() {
        match ch {
            ' ' | '\t' if !in_quotes => {
                if in_value && !current_key.is_empty() {
                    attributes.insert(current_key.to_lowercase(), current_value.clone());
                }
                current_key.clear();
                current_value.clear();
                in_value = false;
            }
            '=' if !in_quotes && !in_value => {
                in_value = true;
                if chars.peek() == Some(&'"') {
                    chars.next();
                    in_quotes = true;
                }
            }
            '"' if in_quotes => {
                in_quotes = false;
                if !current_key.is_empty() {
                    attributes.insert(current_key.to_lowercase(), current_value.clone());
                }
                current_key.clear();
                current_value.clear();
                in_value = false;
            }
            _ => {
                if in_value {
                    current_value.push(ch);
                } else {
                    current_key.push(ch);
                }
            }
        }
    }

    if in_value && !current_key.is_empty() {
        attributes.insert(current_key.to_lowercase(), current_value);
    }

    attributes
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
