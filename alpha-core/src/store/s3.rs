//! S3-compatible object store (Cloudflare R2, MinIO, AWS S3).
//!
//! Lists month files with ListObjectsV2 and downloads them with a plain GET,
//! path-style: `{endpoint}/{bucket}/ds/{dataset}/{YYYY.MM}.parquet`.
//! Requests are signed with SigV4 when the credentials carry a key pair and
//! sent anonymously otherwise (public buckets). No retries: the first failed
//! request is returned as a `StoreError`.

use super::sigv4::{canonical_query, uri_encode, Signer};
use super::{dataset_prefix, month_from_file_name, month_object_key, MonthStore, StoreError};
use crate::catalog::{FileLocation, MonthCatalog};
use crate::credentials::StoreCredentials;
use crate::month::MonthKey;
use polars::prelude::*;
use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use std::io::Cursor;
use std::time::Duration;

/// Region R2 expects in the signing scope.
pub const DEFAULT_REGION: &str = "auto";

/// S3-compatible HTTP store.
pub struct S3Store {
    client: Client,
    default_endpoint: Option<String>,
    region: String,
}

impl S3Store {
    /// Store with no default endpoint: every call must carry one in its credentials.
    pub fn new() -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            default_endpoint: None,
            region: DEFAULT_REGION.to_string(),
        })
    }

    /// Endpoint used when the call's credentials do not name one.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.default_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    fn endpoint<'a>(&'a self, credentials: Option<&'a StoreCredentials>) -> Result<&'a str, StoreError> {
        resolve_endpoint(credentials, self.default_endpoint.as_deref())
    }

    /// Send a (possibly signed) GET for `canonical_uri` and return the
    /// successful response.
    fn get(
        &self,
        credentials: Option<&StoreCredentials>,
        canonical_uri: &str,
        query: &[(&str, &str)],
        location: &str,
    ) -> Result<Response, StoreError> {
        let endpoint = self.endpoint(credentials)?;
        let query = canonical_query(query);
        let url = request_url(endpoint, canonical_uri, &query)?;

        let mut request = self.client.get(url.clone());
        if let Some(signer) = credentials.and_then(|c| self.signer(c)) {
            let headers = signer.sign_get(&host_header(&url)?, canonical_uri, &query, chrono::Utc::now());
            request = request
                .header("authorization", headers.authorization)
                .header("x-amz-date", headers.amz_date)
                .header("x-amz-content-sha256", headers.content_sha256);
        }

        tracing::debug!(store = "s3", %url, "GET");
        let response = request.send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                StoreError::NetworkUnreachable(format!("{endpoint}: {e}"))
            } else {
                StoreError::Other(format!("request to {endpoint} failed: {e}"))
            }
        })?;

        check_status(response.status(), location)?;
        Ok(response)
    }

    fn signer<'a>(&'a self, credentials: &'a StoreCredentials) -> Option<Signer<'a>> {
        match (&credentials.access_key_id, &credentials.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Signer {
                access_key_id,
                secret_access_key,
                region: &self.region,
            }),
            _ => None,
        }
    }
}

impl MonthStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    fn list_months(
        &self,
        bucket: &str,
        dataset: &str,
        credentials: Option<&StoreCredentials>,
    ) -> Result<MonthCatalog, StoreError> {
        let prefix = dataset_prefix(dataset);
        let canonical_uri = format!("/{}", uri_encode(bucket, false));
        let mut catalog = MonthCatalog::new();
        let mut token: Option<String> = None;

        loop {
            let mut query = vec![("list-type", "2"), ("prefix", prefix.as_str())];
            if let Some(t) = token.as_deref() {
                query.push(("continuation-token", t));
            }

            let body = self
                .get(credentials, &canonical_uri, &query, bucket)?
                .text()
                .map_err(|e| StoreError::ResponseFormatChanged(format!("listing body: {e}")))?;

            let page = parse_listing(&body, bucket, &prefix)?;
            for (month, location) in page.entries {
                catalog.insert(month, location);
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(catalog)
    }

    fn fetch_month(
        &self,
        bucket: &str,
        dataset: &str,
        month: &MonthKey,
        credentials: Option<&StoreCredentials>,
    ) -> Result<DataFrame, StoreError> {
        let key = month_object_key(dataset, month);
        let location = format!("{bucket}/{key}");
        let canonical_uri = format!("/{}/{}", uri_encode(bucket, false), uri_encode(&key, true));

        let bytes = self
            .get(credentials, &canonical_uri, &[], &location)?
            .bytes()
            .map_err(|e| StoreError::NetworkUnreachable(format!("download {location}: {e}")))?;

        ParquetReader::new(Cursor::new(bytes.to_vec()))
            .finish()
            .map_err(|e| StoreError::Parquet(format!("read {location}: {e}")))
    }
}

fn resolve_endpoint<'a>(
    credentials: Option<&'a StoreCredentials>,
    default: Option<&'a str>,
) -> Result<&'a str, StoreError> {
    credentials
        .and_then(|c| c.endpoint_url.as_deref())
        .or(default)
        .map(|e| e.trim_end_matches('/'))
        .ok_or_else(|| {
            StoreError::Configuration("no endpoint URL in credentials and no store default".into())
        })
}

fn request_url(endpoint: &str, canonical_uri: &str, query: &str) -> Result<Url, StoreError> {
    let raw = if query.is_empty() {
        format!("{endpoint}{canonical_uri}")
    } else {
        format!("{endpoint}{canonical_uri}?{query}")
    };
    Url::parse(&raw).map_err(|e| StoreError::Configuration(format!("invalid endpoint '{endpoint}': {e}")))
}

/// `host[:port]` exactly as the client will send it.
fn host_header(url: &Url) -> Result<String, StoreError> {
    let host = url
        .host_str()
        .ok_or_else(|| StoreError::Configuration(format!("endpoint has no host: {url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn check_status(status: StatusCode, location: &str) -> Result<(), StoreError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::AuthenticationRequired(
            format!("HTTP {} for {location}", status.as_u16()),
        )),
        StatusCode::NOT_FOUND => Err(StoreError::NotFound {
            location: location.to_string(),
        }),
        s => Err(StoreError::Other(format!("HTTP {} for {location}", s.as_u16()))),
    }
}

/// One page of a ListObjectsV2 response.
#[derive(Debug, Default)]
struct ListPage {
    entries: Vec<(MonthKey, FileLocation)>,
    next_token: Option<String>,
}

/// Pull month files out of a ListObjectsV2 XML body.
///
/// Keys directly under `prefix` ending in `.parquet` become catalog entries;
/// anything nested deeper is ignored.
fn parse_listing(body: &str, bucket: &str, prefix: &str) -> Result<ListPage, StoreError> {
    if !body.contains("<ListBucketResult") {
        return Err(StoreError::ResponseFormatChanged(
            "listing is not a ListBucketResult document".into(),
        ));
    }

    let mut page = ListPage::default();
    for contents in tag_values(body, "Contents") {
        let Some(key) = tag_values(contents, "Key").into_iter().next().map(xml_unescape) else {
            continue;
        };
        let Some(file_name) = key.strip_prefix(prefix).filter(|rest| !rest.contains('/')) else {
            continue;
        };
        if let Some(month) = month_from_file_name(file_name) {
            page.entries
                .push((month, FileLocation::new(format!("{bucket}/{key}"))));
        }
    }

    let truncated = tag_values(body, "IsTruncated").first().copied() == Some("true");
    if truncated {
        let token = tag_values(body, "NextContinuationToken")
            .into_iter()
            .next()
            .map(xml_unescape)
            .ok_or_else(|| {
                StoreError::ResponseFormatChanged("truncated listing without continuation token".into())
            })?;
        page.next_token = Some(token);
    }

    Ok(page)
}

/// Inner text of every `<tag>...</tag>` element, in document order.
fn tag_values<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut values = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(&close) else {
            break;
        };
        values.push(&after_open[..end]);
        rest = &after_open[end + close.len()..];
    }
    values
}

/// Decodes the five predefined entities and numeric character references.
/// Anything unrecognised is kept verbatim.
fn xml_unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let ch = match &rest[1..semi] {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                entity => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            ch.map(|ch| (ch, semi))
        });
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
