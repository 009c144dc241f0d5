//! File event handler: the end-to-end flow for one upload notification.
//!
//! Flow:
//! 1. Fetch file metadata
//! 2. Guard chain (may veto silently)
//! 3. Download content
//! 4. Dispatch to the matching processor
//! 5. Deliver the processor's reply back to the channel
//!
//! Every failure is logged and turned into [`EventOutcome::Dropped`]; nothing
//! escapes to the listener and nothing is retried.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::pipeline::dispatcher::{Dispatched, Dispatcher};
use crate::pipeline::guards::GuardChain;
use crate::pipeline::types::{
    Delivery, EventOutcome, FileEvent, FileSource, OutboundAction, ProcessorInput,
};

/// Handles `file_shared` events.
pub struct FileEventHandler {
    files: Arc<dyn FileSource>,
    delivery: Arc<dyn Delivery>,
    guards: Arc<GuardChain>,
    dispatcher: Dispatcher,
    bot_user_id: Option<String>,
}

impl FileEventHandler {
    pub fn new(
        files: Arc<dyn FileSource>,
        delivery: Arc<dyn Delivery>,
        guards: Arc<GuardChain>,
        dispatcher: Dispatcher,
        bot_user_id: Option<String>,
    ) -> Self {
        Self {
            files,
            delivery,
            guards,
            dispatcher,
            bot_user_id,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one event to completion. Never fails.
    pub async fn handle(&self, event: &FileEvent) -> EventOutcome {
        match self.run(event).await {
            Ok(outcome) => {
                debug!(
                    file_id = %event.file_id,
                    channel = %event.channel_id,
                    outcome = outcome.label(),
                    "File event handled"
                );
                outcome
            }
            Err(err) => {
                let stage = err.stage();
                match &err {
                    PipelineError::MalformedEvent(_) | PipelineError::NoContentLocation { .. } => {
                        warn!(
                            file_id = %event.file_id,
                            channel = %event.channel_id,
                            stage = %stage,
                            error = %err,
                            "Dropping file event"
                        );
                    }
                    PipelineError::Dispatch(dispatch) => {
                        error!(
                            file_id = %event.file_id,
                            channel = %event.channel_id,
                            stage = %stage,
                            processor = %dispatch.processor(),
                            error = %err,
                            "Processor failed; dropping file event"
                        );
                    }
                    _ => {
                        error!(
                            file_id = %event.file_id,
                            channel = %event.channel_id,
                            stage = %stage,
                            error = %err,
                            "File event failed"
                        );
                    }
                }
                EventOutcome::Dropped {
                    stage,
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn run(&self, event: &FileEvent) -> Result<EventOutcome, PipelineError> {
        if event.file_id.is_empty() {
            return Err(PipelineError::MalformedEvent("missing file_id".into()));
        }
        if event.channel_id.is_empty() {
            return Err(PipelineError::MalformedEvent("missing channel_id".into()));
        }

        let metadata = self
            .files
            .file_info(&event.file_id)
            .await
            .map_err(|source| PipelineError::Metadata {
                file_id: event.file_id.clone(),
                source,
            })?;

        let verdict = self.guards.evaluate(&metadata, self.bot_user_id.as_deref());
        if verdict.skip {
            let reason = verdict.reason.unwrap_or_default();
            debug!(file_id = %event.file_id, reason = %reason, "Skipping file");
            return Ok(EventOutcome::Vetoed { reason });
        }

        let url = metadata
            .url_private
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PipelineError::NoContentLocation {
                file_id: event.file_id.clone(),
            })?;

        let content = self
            .files
            .download(url)
            .await
            .map_err(|source| PipelineError::Download {
                file_id: event.file_id.clone(),
                source,
            })?;

        let thread_anchor = metadata
            .shares
            .thread_anchor(&event.channel_id)
            .map(str::to_string);

        let user_id = if event.user_id.is_empty() {
            metadata.user.clone().unwrap_or_default()
        } else {
            event.user_id.clone()
        };

        let input = ProcessorInput::new(
            metadata.name.clone(),
            metadata.mimetype.clone(),
            content,
            user_id,
            event.channel_id.clone(),
            thread_anchor.clone(),
        );

        let output = match self.dispatcher.route_blocking(input).await? {
            Dispatched::Unsupported => return Ok(EventOutcome::Unsupported),
            Dispatched::Processed { output: None, .. } => return Ok(EventOutcome::NoResponse),
            Dispatched::Processed {
                output: Some(output),
                ..
            } => output,
        };

        let Some(action) =
            OutboundAction::from_output(output, &event.channel_id, thread_anchor.as_deref())
        else {
            return Ok(EventOutcome::NoResponse);
        };

        self.delivery
            .deliver(&action)
            .await
            .map_err(|source| PipelineError::Delivery {
                channel: event.channel_id.clone(),
                source,
            })?;

        info!(
            file_id = %event.file_id,
            filename = %metadata.name,
            channel = %event.channel_id,
            "Processed file"
        );
        Ok(EventOutcome::Delivered(action.kind()))
    }
}
