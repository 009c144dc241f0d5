//! Error types for the Slack file bot.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Slack Web API and file transport errors.
#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("HTTP error calling {method}: {reason}")]
    Http { method: String, reason: String },

    #[error("Slack API {method} returned error: {error}")]
    Api { method: String, error: String },

    #[error("Unexpected HTTP status {status} from {method}")]
    Status { method: String, status: u16 },

    #[error("Invalid response from {method}: {reason}")]
    InvalidResponse { method: String, reason: String },
}

/// Failure reported by a processor while transforming a file.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Failed to decode {format}: {reason}")]
    Decode { format: String, reason: String },

    #[error("Failed to encode {format}: {reason}")]
    Encode { format: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// A processor was selected but did not complete.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Processor '{processor}' failed on {filename}: {source}")]
    Failed {
        processor: String,
        filename: String,
        #[source]
        source: ProcessorError,
    },

    #[error("Processor '{processor}' panicked on {filename}")]
    Panicked { processor: String, filename: String },
}

impl DispatchError {
    /// Description of the processor that failed.
    pub fn processor(&self) -> &str {
        match self {
            Self::Failed { processor, .. } | Self::Panicked { processor, .. } => processor,
        }
    }
}

/// Step of the file-event flow an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Event,
    FetchMetadata,
    Download,
    Dispatch,
    Deliver,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::FetchMetadata => "fetch_metadata",
            Self::Download => "download",
            Self::Dispatch => "dispatch",
            Self::Deliver => "deliver",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event-local failures of the file pipeline. None of these escape the listener.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Failed to fetch metadata for file {file_id}: {source}")]
    Metadata {
        file_id: String,
        #[source]
        source: SlackError,
    },

    #[error("File {file_id} has no private download URL")]
    NoContentLocation { file_id: String },

    #[error("Failed to download file {file_id}: {source}")]
    Download {
        file_id: String,
        #[source]
        source: SlackError,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Failed to deliver result to channel {channel}: {source}")]
    Delivery {
        channel: String,
        #[source]
        source: SlackError,
    },
}

impl PipelineError {
    /// The step this error aborted.
    pub fn stage(&self) -> Stage {
        match self {
            Self::MalformedEvent(_) | Self::NoContentLocation { .. } => Stage::Event,
            Self::Metadata { .. } => Stage::FetchMetadata,
            Self::Download { .. } => Stage::Download,
            Self::Dispatch(_) => Stage::Dispatch,
            Self::Delivery { .. } => Stage::Deliver,
        }
    }
}
