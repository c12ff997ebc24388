//! HTTP session against the exchange-rate API.

use jiff::civil::Date;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{ConversionResponse, RatesResponse, Validate, decode};

pub const DEFAULT_API_URL: &str = "https://api.exchangerate.host/";

/// Parameters shared by the `latest` and historical endpoints.
#[derive(Debug, Clone)]
pub struct RateQuery {
    /// Base currency; the provider picks its own default when absent
    pub base: Option<String>,
    /// Target currencies, comma separated; all currencies when absent
    pub symbols: Option<String>,
    pub amount: u32,
}

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub from: String,
    pub to: String,
    pub amount: u32,
    pub date: Option<Date>,
}

/// One connection pool for the whole run, shared by reference between requests.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    access_key: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, access_key: Option<String>) -> Result<Self> {
        // Endpoints are joined relative to the base, which only works with a trailing slash
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&base_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self {
            http: Client::new(),
            base_url,
            access_key,
        })
    }

    /// Current rates from `query.base` to `query.symbols`.
    pub async fn latest(&self, query: &RateQuery) -> Result<RatesResponse> {
        self.get("latest", rate_params(query)).await
    }

    /// Rates as published on `date`.
    pub async fn historical(&self, query: &RateQuery, date: Date) -> Result<RatesResponse> {
        self.get(&date.to_string(), rate_params(query)).await
    }

    /// Convert an amount, on `request.date` if given.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResponse> {
        let mut params = vec![
            ("from", request.from.clone()),
            ("to", request.to.clone()),
            ("amount", request.amount.to_string()),
        ];
        if let Some(date) = request.date {
            params.push(("date", date.to_string()));
        }
        self.get("convert", params).await
    }

    async fn get<T>(&self, endpoint: &str, mut params: Vec<(&str, String)>) -> Result<T>
    where
        T: DeserializeOwned + Validate,
    {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        debug!(%url, ?params, "requesting");

        if let Some(key) = &self.access_key {
            params.push(("access_key", key.clone()));
        }

        let resp = self.http.get(url).query(&params).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(endpoint, %status, bytes = body.len(), "response received");

        if !status.is_success() {
            return Err(Error::Status { status, body });
        }
        decode(&body)
    }
}

fn rate_params(query: &RateQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(3);
    if let Some(base) = &query.base {
        params.push(("base", base.clone()));
    }
    if let Some(symbols) = &query.symbols {
        params.push(("symbols", symbols.clone()));
    }
    params.push(("amount", query.amount.to_string()));
    params
}
