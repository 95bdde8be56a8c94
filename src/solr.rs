use anyhow::{Context, anyhow};
use async_trait::async_trait;
use base64::prelude::*;
use http::StatusCode;
use http::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::Duration;
use url::Url;

use crate::cli::Cli;
use crate::error::{Result, SolrDumpError};
use crate::transport::{Method, SolrRequest, Transport};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse the Solr URL and extract the base URL and auth credentials
pub fn parse_input_url(args: &Cli) -> anyhow::Result<(Url, Option<String>, Option<String>)> {
    let input_url = Url::parse(&args.url).context("Failed to parse Solr URL")?;
    log::debug!("Parsed Solr URL: {}", input_url);

    if !matches!(input_url.scheme(), "http" | "https") {
        return Err(anyhow!("Unknown scheme '{}'", input_url.scheme()));
    }

    // --- Base URL: scheme, host, port and path prefix, without credentials ---
    let host_str = input_url.host_str().unwrap_or("localhost");
    let port_str = input_url
        .port()
        .map_or("".to_string(), |p| format!(":{}", p));
    let path = input_url.path().trim_end_matches('/');
    let base_url_str = format!("{}://{}{}{}", input_url.scheme(), host_str, port_str, path);
    let base_url = Url::parse(&base_url_str)?;
    log::debug!("Extracted base URL: {}", base_url);

    // --- Authentication ---
    // Priority: Flags > URL > None
    let url_username = input_url.username();
    let url_password = input_url.password();

    let auth_username = args
        .username
        .as_deref()
        .or_else(|| {
            if !url_username.is_empty() {
                Some(url_username)
            } else {
                None
            }
        })
        .map(|s| s.to_string());

    let auth_password = args
        .password
        .as_deref()
        .or(url_password)
        .map(|s| s.to_string());

    Ok((base_url, auth_username, auth_password))
}

/// Build the HTTP transport used for every Solr call
pub fn create_transport(
    base_url: Url,
    auth_username: Option<String>,
    auth_password: Option<String>,
    enable_compression: bool,
    accept_invalid_certs: bool,
) -> anyhow::Result<HttpTransport> {
    log::debug!("Setting up Solr client for {}", base_url.as_str());

    let mut headers = HeaderMap::new();

    if let (Some(user), Some(pass)) = (auth_username.as_deref(), auth_password.as_deref()) {
        log::info!("Using basic authentication for user: {}", user);
        let auth_str = format!("{}:{}", user, pass);
        let auth_val = format!("Basic {}", BASE64_STANDARD.encode(auth_str));
        let mut value = HeaderValue::from_str(&auth_val)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        log::debug!("Adding authorization header");
    } else if auth_username.is_some() || auth_password.is_some() {
        log::warn!(
            "Partial basic auth credentials provided (username or password missing), ignoring."
        );
    }

    if !enable_compression {
        log::debug!("Disabling response compression by setting Accept-Encoding: identity");
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    }

    if accept_invalid_certs {
        log::warn!("TLS certificate verification is disabled");
    }

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .context("Failed to build HTTP client")?;

    log::debug!("Solr client created successfully");
    Ok(HttpTransport {
        client,
        base_url: base_url.as_str().trim_end_matches('/').to_string(),
    })
}

/// [`Transport`] over a basic-auth `reqwest` session
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: SolrRequest) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, request.path);
        let method = request.method;
        let http_method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        log::debug!("{} {} {:?}", method, url, request.params);
        let mut builder = self.client.request(http_method, &url).query(&request.params);
        if let Some(payload) = request.payload {
            builder = builder
                .header(CONTENT_TYPE, payload.content_type())
                .body(payload.into_bytes());
        }

        let response = builder.send().await.map_err(|e| SolrDumpError::Transport {
            method,
            url: url.clone(),
            status: None,
            body: e.to_string(),
        })?;

        let status = response.status();
        let full_url = response.url().to_string();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SolrDumpError::Auth { url: full_url });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SolrDumpError::Transport {
                method,
                url: full_url.clone(),
                status: Some(status.as_u16()),
                body: format!("failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body).into_owned();
            log::error!("{} - {} - {}", method, full_url, text);
            return Err(SolrDumpError::Transport {
                method,
                url: full_url,
                status: Some(status.as_u16()),
                body: text,
            });
        }

        log::debug!("{} {} -> {} ({} bytes)", method, full_url, status, body.len());
        Ok(body.to_vec())
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
