//! HTTP transport for the catalog service with rate limiting and
//! cancellation
//!
//! Implements `CatalogApi` on top of `reqwest`. Every request waits on a
//! `governor` rate limiter and races the client's cancellation token.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::api_types::{
    CategoryResponse, DetailResponse, EvolutionChainResponse, ListResponse, SpeciesResponse,
};
use super::config::{ApiConfig, pokeapi};
use crate::catalog::api::{CatalogApi, ListPage, PageRequest, SpeciesEntry};
use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::domain::{EvolutionNode, SpeciesDetail, SpeciesStub};

/// Rate-limited catalog client
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    base_url: Url,
    config: ApiConfig,
    cancellation_token: CancellationToken,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .gzip(true)
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base URL: {}", config.base_url))?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            base_url,
            config,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Ties every request of this client to `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// `base_url` with `segments` appended as path segments.
    pub fn endpoint(&self, segments: &[&str]) -> CatalogResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CatalogError::InvalidInput(format!("base URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn list_url(&self, request: PageRequest) -> CatalogResult<Url> {
        let mut url = self.endpoint(&[pokeapi::LIST_PATH])?;
        url.query_pairs_mut()
            .append_pair("offset", &request.offset.to_string())
            .append_pair("limit", &request.limit.to_string());
        Ok(url)
    }

    /// Fetches `url` and decodes the JSON body, honoring the rate limit and
    /// the cancellation token at every await point.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> CatalogResult<T> {
        let token = &self.cancellation_token;
        if token.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }

        tokio::select! {
            () = self.rate_limiter.until_ready() => {},
            () = token.cancelled() => return Err(CatalogError::Cancelled),
        }

        tracing::debug!("Fetching URL: {}", url);
        let response = tokio::select! {
            result = self.client.get(url).send() => {
                result.map_err(|e| CatalogError::Network(format!("{url}: {e}")))?
            },
            () = token.cancelled() => {
                tracing::warn!("🛑 HTTP request cancelled for URL: {}", url);
                return Err(CatalogError::Cancelled);
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("HTTP request failed with status {}: {}", status, url);
            return Err(CatalogError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = tokio::select! {
            result = response.bytes() => {
                result.map_err(|e| CatalogError::Network(format!("{url}: {e}")))?
            },
            () = token.cancelled() => return Err(CatalogError::Cancelled),
        };

        serde_json::from_slice(&body).map_err(|e| CatalogError::Decode(format!("{url}: {e}")))
    }
}

#[async_trait]
impl CatalogApi for HttpClient {
    async fn fetch_list_page(&self, request: PageRequest) -> CatalogResult<ListPage> {
        let url = self.list_url(request)?;
        let response: ListResponse = self.get_json(url.as_str()).await?;
        Ok(response.into())
    }

    async fn fetch_detail(&self, locator: &str) -> CatalogResult<SpeciesDetail> {
        let response: DetailResponse = self.get_json(locator).await?;
        Ok(response.into())
    }

    async fn fetch_category(&self, category: &str) -> CatalogResult<Vec<SpeciesStub>> {
        let url = self.endpoint(&[pokeapi::CATEGORY_PATH, category])?;
        let response: CategoryResponse = self.get_json(url.as_str()).await?;
        Ok(response.into_stubs())
    }

    async fn fetch_species(&self, numeric_id: u32) -> CatalogResult<SpeciesEntry> {
        let url = self.endpoint(&[pokeapi::SPECIES_PATH, &numeric_id.to_string()])?;
        let response: SpeciesResponse = self.get_json(url.as_str()).await?;
        Ok(response.into())
    }

    async fn fetch_evolution_chain(&self, locator: &str) -> CatalogResult<EvolutionNode> {
        let response: EvolutionChainResponse = self.get_json(locator).await?;
        Ok(response.chain.into())
    }
}
