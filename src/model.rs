//! Typed responses from the exchange-rate API and their console rendering.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Response of the `latest` and `{date}` endpoints.
#[derive(Debug, Deserialize)]
pub struct RatesResponse {
    pub success: bool,
    pub base: Option<String>,
    pub date: Option<Date>,
    #[serde(default)]
    pub rates: BTreeMap<String, Decimal>,
    pub error: Option<ApiError>,
}

/// Response of the `convert` endpoint.
#[derive(Debug, Deserialize)]
pub struct ConversionResponse {
    pub success: bool,
    pub query: Option<ConversionQuery>,
    pub info: Option<ConversionInfo>,
    pub date: Option<Date>,
    pub historical: Option<bool>,
    pub result: Option<Decimal>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct ConversionQuery {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ConversionInfo {
    /// Value of 1 unit of the base currency in the target currency
    #[serde(alias = "quote")]
    pub rate: Option<Decimal>,
    pub timestamp: Option<i64>,
}

/// Failure details reported by the provider alongside `success: false`.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub info: Option<String>,
}

/// Decode a response body and check that a successful response carries what it claims to.
pub(crate) fn decode<T>(body: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let decoded: T =
        serde_json::from_str(body).map_err(|e| Error::MalformedResponse(e.to_string()))?;
    decoded.validate()?;
    Ok(decoded)
}

pub(crate) trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for RatesResponse {
    fn validate(&self) -> Result<()> {
        if !self.success {
            return Ok(());
        }
        if self.base.is_none() {
            return Err(Error::MalformedResponse("missing field `base`".into()));
        }
        if self.date.is_none() {
            return Err(Error::MalformedResponse("missing field `date`".into()));
        }
        Ok(())
    }
}

impl Validate for ConversionResponse {
    fn validate(&self) -> Result<()> {
        if self.success && self.result.is_none() {
            return Err(Error::MalformedResponse("missing field `result`".into()));
        }
        Ok(())
    }
}

struct Flag(bool);

impl Display for Flag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0 { "True" } else { "False" })
    }
}

struct OrDash<'a, T>(&'a Option<T>);

impl<T: Display> Display for OrDash<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("-"),
        }
    }
}

/// Write `{'key': value, ...}`; values are already rendered.
fn write_map<'a>(
    f: &mut Formatter<'_>,
    entries: impl IntoIterator<Item = (&'a str, String)>,
) -> fmt::Result {
    f.write_str("{")?;
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "'{key}': {value}")?;
    }
    f.write_str("}")
}

fn quoted(s: &str) -> String {
    format!("'{s}'")
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut entries = Vec::new();
        if let Some(code) = self.code {
            entries.push(("code", code.to_string()));
        }
        if let Some(kind) = &self.kind {
            entries.push(("type", quoted(kind)));
        }
        if let Some(info) = &self.info {
            entries.push(("info", quoted(info)));
        }
        write_map(f, entries)
    }
}

impl Display for RatesResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", Flag(self.success))?;
        if let Some(error) = &self.error {
            return writeln!(f, "{error}");
        }
        writeln!(f, "{}", OrDash(&self.base))?;
        writeln!(f, "{}", OrDash(&self.date))?;
        write_map(
            f,
            self.rates
                .iter()
                .map(|(code, rate)| (code.as_str(), rate.to_string())),
        )?;
        writeln!(f)
    }
}

impl Display for ConversionResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", Flag(self.success))?;
        if let Some(error) = &self.error {
            return writeln!(f, "{error}");
        }
        match &self.query {
            Some(query) => write_map(
                f,
                [
                    ("from", quoted(&query.from)),
                    ("to", quoted(&query.to)),
                    ("amount", query.amount.to_string()),
                ],
            )?,
            None => f.write_str("-")?,
        }
        writeln!(f)?;
        match &self.info {
            Some(info) => {
                let mut entries = Vec::new();
                if let Some(rate) = info.rate {
                    entries.push(("rate", rate.to_string()));
                }
                if let Some(timestamp) = info.timestamp {
                    entries.push(("timestamp", timestamp.to_string()));
                }
                write_map(f, entries)?;
            }
            None => f.write_str("-")?,
        }
        writeln!(f)?;
        writeln!(f, "{}", OrDash(&self.date))?;
        writeln!(f, "{}", OrDash(&self.result))
    }
}
