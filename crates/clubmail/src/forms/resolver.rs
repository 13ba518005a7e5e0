//! Resolves a form link into its field-identifier mapping.
//!
//! Fetches the page behind the link (following short-link redirects),
//! normalizes the landing URL to the canonical view path, locates the
//! `FB_PUBLIC_LOAD_DATA_` assignment the forms host embeds in the page, and
//! walks its field descriptors. Resolution is best-effort throughout: any
//! failure degrades to an empty mapping.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::fields::{FieldMap, FormField};

/// Variable the forms host assigns its render data to.
const DATA_BLOB_MARKER: &str = "FB_PUBLIC_LOAD_DATA_";

/// Markers of a sign-in wall; gated forms are out of scope for
/// unauthenticated scraping.
const SIGN_IN_MARKERS: &[&str] = &[
    "accounts.google.com/ServiceLogin",
    "accounts.google.com/v3/signin",
];

/// Errors internal to resolution; callers of [`FieldResolver`] never see
/// them.
#[derive(Error, Debug)]
pub enum FormResolveError {
    #[error("Form page fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Capability the message pipeline consumes: link in, best-effort field
/// mapping out.
#[async_trait]
pub trait FieldResolver: Send + Sync {
    /// Resolves a form link into its field mapping. Failures degrade to an
    /// empty mapping; this never errors.
    async fn resolve_fields(&self, url: &str) -> FieldMap;
}

/// HTTP-backed resolver against the live forms host.
pub struct FormFieldResolver {
    http: Client,
}

impl FormFieldResolver {
    /// Creates a resolver. The timeout is deliberately short: a slow form
    /// host must not stall message processing.
    pub fn new(timeout: Duration) -> Result<Self, FormResolveError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FormResolveError::Client(e.to_string()))?;

        Ok(Self { http })
    }

    async fn try_resolve(&self, url: &str) -> Result<FieldMap, FormResolveError> {
        // Redirects (forms.gle short links) are followed by default; the
        // final URL tells us which page we actually landed on.
        let response = self.http.get(url).send().await?;
        let landing_url = response.url().to_string();
        let body = response.text().await?;

        let normalized = normalize_view_url(&landing_url);
        let html = if normalized != landing_url {
            debug!("Refetching normalized form URL {}", normalized);
            self.http.get(&normalized).send().await?.text().await?
        } else {
            body
        };

        Ok(parse_form_fields(&html))
    }
}

#[async_trait]
impl FieldResolver for FormFieldResolver {
    async fn resolve_fields(&self, url: &str) -> FieldMap {
        match self.try_resolve(url).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Field resolution failed for {}: {}", url, e);
                FieldMap::new()
            }
        }
    }
}

/// Normalizes a form URL to its canonical viewing path: edit-mode URLs are
/// rewritten to view-mode, and a missing view suffix is appended. URLs
/// without a forms path segment pass through untouched.
pub fn normalize_view_url(url: &str) -> String {
    if !url.contains("/forms/") {
        return url.to_string();
    }

    let (path, _query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };

    if let Some(idx) = path.find("/edit") {
        return format!("{}/viewform", &path[..idx]);
    }

    if !path.contains("/viewform") {
        return format!("{}/viewform", path.trim_end_matches('/'));
    }

    url.to_string()
}

/// Extracts the field mapping from a fetched form page. Returns an empty
/// mapping when the page is a sign-in wall or carries no data blob.
pub fn parse_form_fields(html: &str) -> FieldMap {
    if SIGN_IN_MARKERS.iter().any(|marker| html.contains(marker)) {
        debug!("Form page is behind a sign-in wall, skipping");
        return FieldMap::new();
    }

    let Some(blob) = locate_data_blob(html) else {
        debug!("No {} assignment found in form page", DATA_BLOB_MARKER);
        return FieldMap::new();
    };

    let Ok(data) = serde_json::from_str::<Value>(blob) else {
        debug!("Form data blob is not valid JSON");
        return FieldMap::new();
    };

    let mut fields = FieldMap::new();
    for (label, field_id) in walk_descriptors(&data) {
        if let Some(field) = FormField::classify(&label) {
            // First matching descriptor wins for each semantic field.
            fields.entry(field).or_insert(field_id);
        }
    }
    fields
}

/// Finds the JSON array assigned to the data blob variable.
fn locate_data_blob(html: &str) -> Option<&str> {
    let marker = html.find(DATA_BLOB_MARKER)?;
    let rest = &html[marker..];
    let assign = rest.find('=')?;
    let after = rest[assign + 1..].trim_start();
    if !after.starts_with('[') {
        return None;
    }
    balanced_array(after)
}

/// Returns the prefix of `s` forming one balanced JSON array, honoring
/// string literals and escapes.
fn balanced_array(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Walks the blob's known nested layout to its field descriptors: the item
/// list sits at `[1][1]`, each item's label at `[1]` and its field
/// identifier at `[4][0][0]`. Malformed items are skipped individually.
fn walk_descriptors(data: &Value) -> Vec<(String, String)> {
    let Some(items) = data.get(1).and_then(|v| v.get(1)).and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut descriptors = Vec::new();
    for item in items {
        let Some(label) = item.get(1).and_then(Value::as_str) else {
            continue;
        };
        let Some(raw_id) = item
            .get(4)
            .and_then(|v| v.get(0))
            .and_then(|v| v.get(0))
        else {
            continue;
        };
        let field_id = match raw_id {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => continue,
        };
        descriptors.push((label.to_string(), field_id));
    }
    descriptors
}
