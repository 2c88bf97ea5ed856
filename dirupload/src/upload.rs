#![doc = "Production blob backend: implements the core `BlobBackend` trait against the Azure Blob REST API."]
//
//! # Azure Blob backend
//!
//! [`AzureBlobClient`] is the networked implementation of
//! [`dirupload_core::contract::BlobBackend`]. It owns transport, request signing and
//! chunking; the core pipeline only ever sees the trait.
//!
//! - Container creation is `PUT {container}?restype=container`. A 409 carrying the
//!   `ContainerAlreadyExists` error code is reported as `AlreadyExists`.
//! - Files up to the block size ceiling go up in one `Put Blob`. Larger files are
//!   sent as sequential `Put Block` calls followed by one `Put Block List`.
//! - Every request is signed with the Shared Key scheme.

use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::time::SystemTime;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dirupload_core::config::StorageCredentials;
use dirupload_core::contract::{BackendError, BlobBackend, ContainerHandle, CreateContainerResponse};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH};
use reqwest::{Body, Client, Method, Response, StatusCode, Url};
use sha2::Sha256;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

pub const API_VERSION: &str = "2021-08-06";

const ERROR_CODE_HEADER: &str = "x-ms-error-code";
const CONTAINER_ALREADY_EXISTS: &str = "ContainerAlreadyExists";

/// Headers that take a fixed slot in the string-to-sign, in order.
const SIGNED_STANDARD_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

pub struct AzureBlobClient {
    http: Client,
    account: String,
    key: Vec<u8>,
    endpoint: Url,
}

impl AzureBlobClient {
    pub fn new(credentials: &StorageCredentials) -> Result<Self> {
        let key = STANDARD
            .decode(credentials.access_key.trim())
            .context("AZURE_STORAGE_ACCESS_KEY is not valid base64")?;
        let endpoint = match &credentials.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.blob.core.windows.net", credentials.account),
        };
        let endpoint = Url::parse(&endpoint)
            .with_context(|| format!("Invalid storage endpoint {endpoint:?}"))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("Storage endpoint {endpoint} cannot carry a path");
        }
        let http = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        tracing::info!(
            account = %credentials.account,
            endpoint = %endpoint,
            "Initialized AzureBlobClient"
        );
        Ok(Self {
            http,
            account: credentials.account.clone(),
            key,
            endpoint,
        })
    }

    /// URL of `segments` below the endpoint, each segment percent-encoded.
    pub fn resource_url<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn blob_url(&self, container: &ContainerHandle, blob_name: &str) -> Url {
        self.resource_url(std::iter::once(container.name()).chain(blob_name.split('/')))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        mut headers: HeaderMap,
        body: Body,
        content_length: u64,
    ) -> Result<Response, BackendError> {
        let date = httpdate::fmt_http_date(SystemTime::now());
        headers.insert("x-ms-date", header_value(&date)?);
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));

        let to_sign = string_to_sign(&method, &url, &self.account, &headers);
        let signature = sign(&self.key, &to_sign)?;
        let authorization = format!("SharedKey {}:{}", self.account, signature);
        headers.insert(AUTHORIZATION, header_value(&authorization)?);

        tracing::debug!(%method, url = %url, "Sending storage request");
        self.http
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))
    }

    async fn put_blob(&self, url: Url, file: &File, size: u64) -> Result<(), BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        let body = file_body(file, 0, size).await?;
        let response = self.send(Method::PUT, url, headers, body, size).await?;
        ensure_success(response).await
    }

    async fn put_blocks(
        &self,
        url: Url,
        file: &File,
        size: u64,
        max_block_size: u64,
    ) -> Result<(), BackendError> {
        let mut block_ids = Vec::new();
        let mut offset = 0;
        while offset < size {
            let len = max_block_size.min(size - offset);
            let id = block_id(block_ids.len());
            let mut block_url = url.clone();
            block_url
                .query_pairs_mut()
                .append_pair("comp", "block")
                .append_pair("blockid", &id);
            tracing::debug!(url = %url, block = block_ids.len(), size = len, "Uploading block");
            let body = file_body(file, offset, len).await?;
            let response = self
                .send(Method::PUT, block_url, HeaderMap::new(), body, len)
                .await?;
            ensure_success(response).await?;
            block_ids.push(id);
            offset += len;
        }

        let mut list_url = url;
        list_url.query_pairs_mut().append_pair("comp", "blocklist");
        let xml = block_list_xml(&block_ids);
        let length = xml.len() as u64;
        let response = self
            .send(Method::PUT, list_url, HeaderMap::new(), Body::from(xml), length)
            .await?;
        ensure_success(response).await
    }
}

#[async_trait]
impl BlobBackend for AzureBlobClient {
    async fn create_container(&self, name: &str) -> CreateContainerResponse {
        let mut url = self.resource_url([name]);
        url.query_pairs_mut().append_pair("restype", "container");
        tracing::info!(container = name, url = %url, "Creating container");

        let response = match self
            .send(Method::PUT, url, HeaderMap::new(), Body::from(Vec::new()), 0)
            .await
        {
            Ok(response) => response,
            Err(e) => return CreateContainerResponse::Failed(e),
        };
        let status = response.status();
        let code = error_code(&response);
        let message = response.text().await.unwrap_or_default();
        classify_create_container(status, code.as_deref(), message)
    }

    async fn upload_blob(
        &self,
        container: &ContainerHandle,
        blob_name: &str,
        file: &mut File,
        max_block_size: u64,
    ) -> Result<(), BackendError> {
        let url = self.blob_url(container, blob_name);
        let size = file.metadata().await?.len();
        tracing::debug!(blob = blob_name, size, max_block_size, "Uploading blob");

        if size <= max_block_size {
            self.put_blob(url, file, size).await
        } else {
            self.put_blocks(url, file, size, max_block_size).await
        }
    }
}

/// Maps a create-container answer onto the three outcomes the pipeline knows.
pub fn classify_create_container(
    status: StatusCode,
    error_code: Option<&str>,
    message: String,
) -> CreateContainerResponse {
    if status.is_success() {
        CreateContainerResponse::Created
    } else if status == StatusCode::CONFLICT && error_code == Some(CONTAINER_ALREADY_EXISTS) {
        CreateContainerResponse::AlreadyExists
    } else {
        CreateContainerResponse::Failed(BackendError::Status {
            code: status.as_u16(),
            message: error_code.map(str::to_string).unwrap_or(message),
        })
    }
}

async fn ensure_success(response: Response) -> Result<(), BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let code = error_code(&response);
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        code: status.as_u16(),
        message: code.unwrap_or(body),
    })
}

fn error_code(response: &Response) -> Option<String> {
    response
        .headers()
        .get(ERROR_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Streams `len` bytes of `file` from `offset` without buffering them in memory.
///
/// The clone shares the OS cursor with `file`, so blocks must be sent one at a time.
async fn file_body(file: &File, offset: u64, len: u64) -> Result<Body, BackendError> {
    let mut reader = file.try_clone().await?;
    reader.seek(SeekFrom::Start(offset)).await?;
    Ok(Body::wrap_stream(ReaderStream::new(reader.take(len))))
}

fn header_value(value: &str) -> Result<HeaderValue, BackendError> {
    HeaderValue::from_str(value).map_err(|e| BackendError::Transport(format!("invalid header value: {e}")))
}

/// Fixed-width base64 block id; all ids of one blob must have the same length.
pub fn block_id(index: usize) -> String {
    STANDARD.encode(format!("block-{index:08}"))
}

pub fn block_list_xml(block_ids: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for id in block_ids {
        xml.push_str("<Latest>");
        xml.push_str(id);
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

/// Shared Key string-to-sign for a blob service request.
pub fn string_to_sign(method: &Method, url: &Url, account: &str, headers: &HeaderMap) -> String {
    let mut parts: Vec<String> = vec![method.as_str().to_string()];
    for name in SIGNED_STANDARD_HEADERS {
        let value = headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        // A zero length is signed as the empty string.
        let value = if name == "content-length" && value == "0" { "" } else { value };
        parts.push(value.to_string());
    }

    let mut canonical = parts.join("\n");
    canonical.push('\n');

    let ms_headers: BTreeMap<&str, &str> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v.trim())))
        .collect();
    for (name, value) in ms_headers {
        canonical.push_str(&format!("{name}:{value}\n"));
    }

    canonical.push_str(&format!("/{account}{}", url.path()));
    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        query
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in query {
        values.sort();
        canonical.push_str(&format!("\n{name}:{}", values.join(",")));
    }
    canonical
}

/// Base64 HMAC-SHA256 of `to_sign` under the decoded account key.
pub fn sign(key: &[u8], to_sign: &str) -> Result<String, BackendError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| BackendError::Transport(format!("invalid signing key: {e}")))?;
    mac.update(to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
