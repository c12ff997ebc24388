//! Rates for every day of a range, fetched concurrently under a fixed ceiling.

use std::future::Future;
use std::io::Write;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use jiff::civil::Date;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::client::{ApiClient, RateQuery};
use crate::dates::days_in_range;
use crate::error::{Error, Result};
use crate::model::RatesResponse;

/// Outcome of a fan-out, in completion order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: Vec<(Date, T)>,
    pub failed: Vec<(Date, Error)>,
}

impl<T> BatchReport<T> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run `fetch` once per day with at most `limit` calls in flight at a time.
///
/// Every day runs to completion regardless of how its siblings fare. `on_done` sees each
/// outcome as soon as it is available, before it is filed into the report.
pub async fn fan_out<T, F, Fut>(
    days: &[Date],
    limit: usize,
    fetch: F,
    mut on_done: impl FnMut(Date, &Result<T>),
) -> BatchReport<T>
where
    F: Fn(Date) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let permits = Semaphore::new(limit.min(Semaphore::MAX_PERMITS));
    let mut pending: FuturesUnordered<_> = days
        .iter()
        .map(|&day| {
            let permits = &permits;
            let fetch = &fetch;
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .expect("semaphore is never closed");
                (day, fetch(day).await)
            }
        })
        .collect();

    let mut report = BatchReport {
        succeeded: Vec::with_capacity(days.len()),
        failed: Vec::new(),
    };
    while let Some((day, outcome)) = pending.next().await {
        on_done(day, &outcome);
        match outcome {
            Ok(value) => report.succeeded.push((day, value)),
            Err(e) => report.failed.push((day, e)),
        }
    }
    report
}

/// Print the rates of every day from `start` to `end` as each one arrives.
pub async fn history<W: Write>(
    client: &ApiClient,
    query: &RateQuery,
    start: Date,
    end: Date,
    limit: usize,
    out: &mut W,
) -> Result<BatchReport<RatesResponse>> {
    let days = days_in_range(start, end)?;
    info!(%start, %end, days = days.len(), limit, "fetching history");

    let mut write_error = None;
    let report = fan_out(
        &days,
        limit,
        |day| client.historical(query, day),
        |day, outcome| match outcome {
            Ok(rates) => {
                // Stop writing after the first failure, keep fetching
                if write_error.is_some() {
                    return;
                }
                if let Err(e) = write!(out, "{rates}") {
                    error!(%day, "could not write rates: {e}");
                    write_error = Some(e);
                }
            }
            Err(e) => warn!(%day, "request failed: {e}"),
        },
    )
    .await;

    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "history complete"
    );
    match write_error {
        Some(e) => Err(Error::Io(e)),
        None => Ok(report),
    }
}
