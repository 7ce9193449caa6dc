use std::str::Utf8Error;

use thiserror::Error;

/// Topic could not be mapped to a known sensor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected topic format: {0}")]
    UnexpectedFormat(String),

    #[error("unknown sensor category: {0}")]
    UnknownCategory(String),
}

/// Payload could not be turned into a numeric reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("payload is not valid UTF-8")]
    Encoding(#[from] Utf8Error),

    #[error("could not parse reading: {0:?}")]
    Parse(String),
}

/// InfluxDB did not accept a point.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("InfluxDB write timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("InfluxDB request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("InfluxDB rejected write with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for WriteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WriteError::Timeout(err)
        } else {
            WriteError::Transport(err)
        }
    }
}

/// Failure to reach the broker or the store during startup.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("MQTT broker {host}:{port} unreachable after {attempts} attempts")]
    BrokerUnavailable {
        host: String,
        port: u16,
        attempts: u32,
        #[source]
        source: rumqttc::ConnectionError,
    },

    #[error("InfluxDB at {url} not ready after {attempts} attempts")]
    StoreUnavailable { url: String, attempts: u32 },

    #[error("invalid InfluxDB URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("MQTT request failed")]
    Request(#[from] rumqttc::ClientError),

    #[error("MQTT event loop closed")]
    Closed,
}

/// Reason a single inbound message produced no point.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Write(#[from] WriteError),
}
