use reqwest::StatusCode;

/// Everything that can go wrong while querying the exchange-rate provider.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not parse date '{0}'")]
    InvalidDate(String),

    #[error("end date {end} is before start date {start}")]
    InvalidRange {
        start: jiff::civil::Date,
        end: jiff::civil::Date,
    },

    #[error("failure while accessing the exchange-rate API: {0}")]
    Http(#[from] reqwest::Error),

    #[error("exchange-rate API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid API url: {0}")]
    InvalidUrl(String),

    #[error("{failed} of {total} days could not be retrieved")]
    IncompleteHistory { failed: usize, total: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
