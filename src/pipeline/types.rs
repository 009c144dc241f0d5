//! Shared types for the file processing pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{SlackError, Stage};

// ── Inbound event ───────────────────────────────────────────────────

/// An upload notification, reduced to what the pipeline needs.
///
/// Transport adapters convert their native event into this struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Platform file id.
    pub file_id: String,
    /// Channel the file was shared into.
    pub channel_id: String,
    /// User who shared the file (may be empty).
    pub user_id: String,
}

// ── File metadata ───────────────────────────────────────────────────

/// Metadata of an uploaded file as reported by the platform.
///
/// Field names follow the `files.info` response so the record deserializes directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default)]
    pub id: String,
    /// Owning (uploading) user id.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_filename")]
    pub name: String,
    #[serde(default = "default_mimetype")]
    pub mimetype: String,
    #[serde(default)]
    pub size: u64,
    /// Authenticated download location.
    #[serde(default)]
    pub url_private: Option<String>,
    #[serde(default)]
    pub shares: FileShares,
}

fn default_filename() -> String {
    "unknown".to_string()
}

fn default_mimetype() -> String {
    "application/octet-stream".to_string()
}

/// Where a file has been shared: visibility → channel id → share records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileShares {
    #[serde(default)]
    pub public: HashMap<String, Vec<ShareRecord>>,
    #[serde(default)]
    pub private: HashMap<String, Vec<ShareRecord>>,
}

/// One message that shared the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRecord {
    /// Timestamp of the sharing message.
    pub ts: String,
    /// Parent thread, when the file was shared as a thread reply.
    #[serde(default)]
    pub thread_ts: Option<String>,
}

impl ShareRecord {
    /// Timestamp a reply should be threaded under.
    pub fn anchor(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

impl FileShares {
    /// Resolve the thread anchor for a channel.
    ///
    /// Public shares win over private shares for the same channel; the first
    /// share record of the winning visibility is used.
    pub fn thread_anchor(&self, channel_id: &str) -> Option<&str> {
        self.public
            .get(channel_id)
            .and_then(|shares| shares.first())
            .or_else(|| self.private.get(channel_id).and_then(|shares| shares.first()))
            .map(ShareRecord::anchor)
    }
}

// ── Guard result ────────────────────────────────────────────────────

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardResult {
    pub skip: bool,
    pub reason: Option<String>,
}

impl GuardResult {
    /// Let the file through.
    pub fn proceed() -> Self {
        Self {
            skip: false,
            reason: None,
        }
    }

    /// Veto processing.
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            skip: true,
            reason: Some(reason.into()),
        }
    }
}

// ── Processor input / output ────────────────────────────────────────

/// Everything a processor gets to see about one file.
#[derive(Debug, Clone)]
pub struct ProcessorInput {
    pub filename: String,
    /// Lowercased last `.`-segment of the filename, empty if none.
    pub extension: String,
    pub mimetype: String,
    pub content: Vec<u8>,
    pub user_id: String,
    pub channel_id: String,
    pub thread_ts: Option<String>,
}

impl ProcessorInput {
    pub fn new(
        filename: impl Into<String>,
        mimetype: impl Into<String>,
        content: Vec<u8>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        thread_ts: Option<String>,
    ) -> Self {
        let filename = filename.into();
        let extension = file_extension(&filename);
        Self {
            filename,
            extension,
            mimetype: mimetype.into(),
            content,
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            thread_ts,
        }
    }

    /// Filename without its last extension.
    pub fn stem(&self) -> &str {
        self.filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.filename)
    }
}

/// Lowercased extension of a filename: the segment after the last `.`.
pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// A file produced by a processor, to be uploaded back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedFile {
    pub content: Vec<u8>,
    pub filename: String,
    pub title: Option<String>,
}

/// What a processor wants posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain text message.
    Text(String),
    /// File upload, optionally with a caption.
    File {
        file: DerivedFile,
        caption: Option<String>,
    },
}

/// Result of a processor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorOutput {
    /// `None` means the processor ran but has nothing visible to say.
    pub reply: Option<Reply>,
    /// Thread the reply under the original share when an anchor exists.
    pub reply_in_thread: bool,
}

impl ProcessorOutput {
    pub fn silent() -> Self {
        Self {
            reply: None,
            reply_in_thread: true,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            reply: Some(Reply::Text(text.into())),
            reply_in_thread: true,
        }
    }

    pub fn file(file: DerivedFile, caption: Option<String>) -> Self {
        Self {
            reply: Some(Reply::File { file, caption }),
            reply_in_thread: true,
        }
    }

    /// Post at channel level instead of in the thread.
    pub fn in_channel(mut self) -> Self {
        self.reply_in_thread = false;
        self
    }

    /// Reply text, or the upload caption.
    pub fn text_part(&self) -> Option<&str> {
        match &self.reply {
            Some(Reply::Text(text)) => Some(text),
            Some(Reply::File { caption, .. }) => caption.as_deref(),
            None => None,
        }
    }

    pub fn file_part(&self) -> Option<&DerivedFile> {
        match &self.reply {
            Some(Reply::File { file, .. }) => Some(file),
            _ => None,
        }
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// The single delivery a processed file results in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    PostMessage {
        channel: String,
        text: String,
        thread_ts: Option<String>,
    },
    UploadFile {
        channel: String,
        file: DerivedFile,
        caption: Option<String>,
        thread_ts: Option<String>,
    },
}

impl OutboundAction {
    /// Map a processor output onto a delivery. `None` when there is nothing to send.
    pub fn from_output(
        output: ProcessorOutput,
        channel_id: &str,
        thread_anchor: Option<&str>,
    ) -> Option<Self> {
        let thread_ts = if output.reply_in_thread {
            thread_anchor.map(str::to_string)
        } else {
            None
        };

        match output.reply? {
            Reply::File { file, caption } => Some(Self::UploadFile {
                channel: channel_id.to_string(),
                file,
                caption,
                thread_ts,
            }),
            Reply::Text(text) => Some(Self::PostMessage {
                channel: channel_id.to_string(),
                text,
                thread_ts,
            }),
        }
    }

    pub fn kind(&self) -> DeliveryKind {
        match self {
            Self::PostMessage { .. } => DeliveryKind::Message,
            Self::UploadFile { .. } => DeliveryKind::Upload,
        }
    }
}

/// Which delivery call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Message,
    Upload,
}

// ── Event outcome ───────────────────────────────────────────────────

/// How handling of one file event ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A guard vetoed processing.
    Vetoed { reason: String },
    /// No processor claims this file.
    Unsupported,
    /// A processor ran but produced nothing to send.
    NoResponse,
    /// Exactly one delivery was made.
    Delivered(DeliveryKind),
    /// The event was abandoned after a failure.
    Dropped { stage: Stage, reason: String },
}

impl EventOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Vetoed { .. } => "vetoed",
            Self::Unsupported => "unsupported",
            Self::NoResponse => "no_response",
            Self::Delivered(_) => "delivered",
            Self::Dropped { .. } => "dropped",
        }
    }
}

// ── Collaborator traits ─────────────────────────────────────────────

/// Fetches file metadata and content from the platform.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Look up metadata for a file id.
    async fn file_info(&self, file_id: &str) -> Result<FileMetadata, SlackError>;

    /// Download raw bytes from a private content location.
    async fn download(&self, url: &str) -> Result<Vec<u8>, SlackError>;
}

/// Sends results back into a conversation.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Post a text message, optionally threaded.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), SlackError>;

    /// Upload a file with an optional caption, optionally threaded.
    async fn upload_file(
        &self,
        channel: &str,
        file: &DerivedFile,
        caption: Option<&str>,
        thread_ts: Option<&str>,
    ) -> Result<(), SlackError>;

    /// Perform an outbound action.
    async fn deliver(&self, action: &OutboundAction) -> Result<(), SlackError> {
        match action {
            OutboundAction::PostMessage {
                channel,
                text,
                thread_ts,
            } => self.post_message(channel, text, thread_ts.as_deref()).await,
            OutboundAction::UploadFile {
                channel,
                file,
                caption,
                thread_ts,
            } => {
                self.upload_file(channel, file, caption.as_deref(), thread_ts.as_deref())
                    .await
            }
        }
    }
}
