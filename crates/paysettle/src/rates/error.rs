use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateFetchError {
    #[error("Exchange rate request failed: {0}")]
    Transport(String),

    #[error("Exchange rate provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("Exchange rate provider reported '{0}'")]
    ProviderFailure(String),

    #[error("Malformed exchange rate response: {0}")]
    Malformed(String),

    #[error("No cached exchange rates to fall back on: {source}")]
    NoFallback {
        #[source]
        source: Box<RateFetchError>,
    },
}

impl From<reqwest::Error> for RateFetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RateFetchError::Malformed(err.to_string())
        } else {
            RateFetchError::Transport(err.to_string())
        }
    }
}
