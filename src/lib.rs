use std::ffi::OsString;
use std::io::Write;
use std::num::NonZeroUsize;

use clap::{Parser, Subcommand, ValueEnum};
use jiff::Zoned;
use jiff::civil::Date;
use tracing::debug;

pub mod client;
pub mod dates;
pub mod error;
pub mod history;
pub mod model;

pub use client::{ApiClient, ConversionRequest, DEFAULT_API_URL, RateQuery};
pub use error::{Error, Result};
pub use history::{BatchReport, fan_out};

pub const DEFAULT_CONCURRENCY: NonZeroUsize = NonZeroUsize::new(100).unwrap();

/// Show currency exchange rates: current, converted, or over a range of days.
///
/// Rates come from exchangerate.host. Dates accept ISO 8601 (YYYY-MM-DD) as well as common
/// layouts such as 31.01.2024, 01/31/2024 or "January 31, 2024".
#[derive(Parser, Debug)]
#[command(name = "xrates", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Provider access key, sent with every request
    #[arg(long, global = true, value_name = "KEY")]
    pub access_key: Option<String>,

    #[arg(long, global = true, hide = true, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Maximum number of requests in flight while fetching a history
    #[arg(long, global = true, value_name = "N", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: NonZeroUsize,

    /// Date to convert on when `convert` is called without --date
    #[arg(long, global = true, value_enum, default_value_t = MissingDate::Omit)]
    pub missing_date: MissingDate,

    /// More logging on stderr (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Current rates from one currency to others
    Symbols {
        /// Base currency
        #[arg(long = "currency_from", visible_alias = "from", value_name = "CURRENCY")]
        currency_from: Option<String>,
        /// Currencies to quote, comma separated
        #[arg(long = "currency_to", visible_alias = "to", value_name = "CURRENCIES")]
        currency_to: Option<String>,
        /// Amount of the base currency
        #[arg(short, long, default_value_t = 1)]
        amount: u32,
    },
    /// Convert an amount, today or on a chosen date
    Convert {
        /// Currency to convert from
        #[arg(long = "currency_from", visible_alias = "from", value_name = "CURRENCY")]
        currency_from: String,
        /// Currency to convert to
        #[arg(long = "currency_to", visible_alias = "to", value_name = "CURRENCY")]
        currency_to: String,
        /// Date of the conversion
        #[arg(short, long, value_parser = dates::parse_date)]
        date: Option<Date>,
        /// Amount of currency
        amount_convert: u32,
    },
    /// Rates for every day between two dates
    History {
        /// Base currency
        #[arg(long = "currency_from", visible_alias = "from", value_name = "CURRENCY")]
        currency_from: Option<String>,
        /// Currencies to quote, comma separated
        #[arg(long = "currency_to", visible_alias = "to", value_name = "CURRENCIES")]
        currency_to: Option<String>,
        /// First day of the range
        #[arg(long = "df", visible_alias = "date_from", value_parser = dates::parse_date)]
        date_from: Date,
        /// Last day of the range, included
        #[arg(long = "dt", visible_alias = "date_to", value_parser = dates::parse_date)]
        date_to: Date,
        /// Amount of currency
        amount_history: u32,
    },
}

/// What `convert` asks the provider for when no date was given.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingDate {
    /// Send no date; the provider uses its latest rates
    Omit,
    /// Send the local current date
    Today,
}

impl MissingDate {
    fn resolve(self) -> Option<Date> {
        match self {
            MissingDate::Omit => None,
            MissingDate::Today => Some(Zoned::now().date()),
        }
    }
}

/// Rewrite the single-dash long spellings (`-from USD`, `-date_to=2024-01-31`) to the long
/// flags clap understands. Short flags are single characters, so clap can't parse these itself.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    const SPELLINGS: [(&str, &str); 4] = [
        ("-from", "--currency_from"),
        ("-to", "--currency_to"),
        ("-date_from", "--df"),
        ("-date_to", "--dt"),
    ];

    args.into_iter()
        .map(|arg| {
            let arg: OsString = arg.into();
            let Some(text) = arg.to_str() else {
                return arg;
            };
            for (single, long) in SPELLINGS {
                if text == single {
                    return long.into();
                }
                if let Some(value) = text.strip_prefix(single).and_then(|s| s.strip_prefix('=')) {
                    return format!("{long}={value}").into();
                }
            }
            arg
        })
        .collect()
}

/// Run the selected command, writing results to `out`.
pub async fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    let client = ApiClient::new(&cli.api_url, cli.access_key.clone())?;
    debug!(command = ?cli.command, "dispatching");

    match &cli.command {
        Command::Symbols {
            currency_from,
            currency_to,
            amount,
        } => {
            let query = RateQuery {
                base: currency_from.clone(),
                symbols: currency_to.clone(),
                amount: *amount,
            };
            let rates = client.latest(&query).await?;
            write!(out, "{rates}")?;
        }
        Command::Convert {
            currency_from,
            currency_to,
            date,
            amount_convert,
        } => {
            let request = ConversionRequest {
                from: currency_from.clone(),
                to: currency_to.clone(),
                amount: *amount_convert,
                date: date.or_else(|| cli.missing_date.resolve()),
            };
            let conversion = client.convert(&request).await?;
            write!(out, "{conversion}")?;
        }
        Command::History {
            currency_from,
            currency_to,
            date_from,
            date_to,
            amount_history,
        } => {
            let query = RateQuery {
                base: currency_from.clone(),
                symbols: currency_to.clone(),
                amount: *amount_history,
            };
            let report = history::history(
                &client,
                &query,
                *date_from,
                *date_to,
                cli.concurrency.get(),
                out,
            )
            .await?;

            if !report.is_complete() {
                return Err(Error::IncompleteHistory {
                    failed: report.failed.len(),
                    total: report.len(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Cli, Command, Error, MissingDate, normalize_args, run};
    use clap::Parser;
    use jiff::civil::date;
    use mockito::Matcher;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(normalize_args(args.iter().copied()))
    }

    #[test]
    fn test_single_dash_spellings() {
        let cli = parse(&[
            "xrates", "history", "-from", "USD", "-to=EUR,GBP", "-date_from", "2024-01-01",
            "-date_to", "31.01.2024", "5",
        ])
        .unwrap();
        match cli.command {
            Command::History {
                currency_from,
                currency_to,
                date_from,
                date_to,
                amount_history,
            } => {
                assert_eq!(currency_from.as_deref(), Some("USD"));
                assert_eq!(currency_to.as_deref(), Some("EUR,GBP"));
                assert_eq!(date_from, date(2024, 1, 1));
                assert_eq!(date_to, date(2024, 1, 31));
                assert_eq!(amount_history, 5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_long_flags_and_defaults() {
        let cli = parse(&["xrates", "symbols", "--currency_from", "USD", "--to", "EUR"]).unwrap();
        assert_eq!(cli.concurrency.get(), 100);
        assert_eq!(cli.missing_date, MissingDate::Omit);
        assert!(matches!(cli.command, Command::Symbols { amount: 1, .. }));

        let cli = parse(&[
            "xrates", "convert", "--from", "USD", "--to", "EUR", "-d", "January 15, 2024", "20",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Convert { date: Some(d), amount_convert: 20, .. } if d == date(2024, 1, 15)
        ));
    }

    #[test]
    fn test_usage_errors() {
        // Unknown subcommand
        assert!(parse(&["xrates", "rates"]).is_err());
        // Negative amount
        assert!(parse(&["xrates", "convert", "-from", "USD", "-to", "EUR", "--", "-3"]).is_err());
        // Unparseable date
        assert!(
            parse(&[
                "xrates", "history", "--df", "someday", "--dt", "2024-01-01", "1"
            ])
            .is_err()
        );
        // Zero concurrency
        assert!(
            parse(&[
                "xrates", "--concurrency", "0", "history", "--df", "2024-01-01", "--dt",
                "2024-01-01", "1",
            ])
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_run_symbols() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/latest")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("base".into(), "USD".into()),
                Matcher::UrlEncoded("symbols".into(), "EUR".into()),
            ]))
            .with_body(
                r#"{"success": true, "base": "USD", "date": "2024-01-01", "rates": {"EUR": 0.9}}"#,
            )
            .create_async()
            .await;

        let url = server.url();
        let cli = parse(&[
            "xrates", "--api-url", url.as_str(), "symbols", "-from", "USD", "-to", "EUR",
        ])
        .unwrap();
        let mut out = Vec::new();
        run(&cli, &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "True\nUSD\n2024-01-01\n{'EUR': 0.9}\n"
        );
    }

    #[tokio::test]
    async fn test_run_convert_today() {
        let mut server = mockito::Server::new_async().await;
        let today = jiff::Zoned::now().date().to_string();
        let mock = server
            .mock("GET", "/convert")
            .match_query(Matcher::UrlEncoded("date".into(), today.clone()))
            .with_body(format!(r#"{{"success": true, "date": "{today}", "result": 0.9}}"#))
            .create_async()
            .await;

        let url = server.url();
        let cli = parse(&[
            "xrates", "--api-url", url.as_str(), "--missing-date", "today", "convert", "-from", "USD",
            "-to", "EUR", "1",
        ])
        .unwrap();
        run(&cli, &mut Vec::new()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_history_with_huge_concurrency() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/2024-01-01")
            .match_query(Matcher::Any)
            .with_body(
                r#"{"success": true, "base": "USD", "date": "2024-01-01", "rates": {"EUR": 0.9}}"#,
            )
            .create_async()
            .await;

        let url = server.url();
        let cli = parse(&[
            "xrates", "--api-url", url.as_str(), "--concurrency", "18446744073709551615",
            "history", "--df", "2024-01-01", "--dt", "2024-01-01", "1",
        ])
        .unwrap();
        let mut out = Vec::new();
        run(&cli, &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().contains("{'EUR': 0.9}"));
    }

    #[tokio::test]
    async fn test_run_incomplete_history() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/2024-01-01")
            .match_query(Matcher::Any)
            .with_body(
                r#"{"success": true, "base": "USD", "date": "2024-01-01", "rates": {"EUR": 0.9}}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/2024-01-02")
            .match_query(Matcher::Any)
            .with_status(502)
            .create_async()
            .await;

        let url = server.url();
        let cli = parse(&[
            "xrates", "--api-url", url.as_str(), "history", "--df", "2024-01-01", "--dt", "2024-01-02",
            "1",
        ])
        .unwrap();
        let mut out = Vec::new();
        let err = run(&cli, &mut out).await.unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteHistory {
                failed: 1,
                total: 2
            }
        ));
        // The day that succeeded was still printed
        assert!(String::from_utf8(out).unwrap().contains("2024-01-01"));
    }
}
