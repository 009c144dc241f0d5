//! Event listener: drains queued Slack events one at a time.

use std::sync::Arc;

use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::pipeline::orchestrator::FileEventHandler;
use crate::pipeline::types::{Delivery, EventOutcome, FileEvent};
use crate::slack::events::{MessageEvent, SlackEvent};

/// Messages that ask for the capability listing.
const HELP_PATTERN: &str = r"(?i)help|도움|지원";

/// What the listener did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    File(EventOutcome),
    Help,
    Ignored,
}

/// Routes Slack events: file uploads to the pipeline, mentions and help
/// keywords to the capability listing.
pub struct EventListener {
    files: FileEventHandler,
    delivery: Arc<dyn Delivery>,
    bot_user_id: Option<String>,
    help_pattern: Regex,
}

impl EventListener {
    pub fn new(
        files: FileEventHandler,
        delivery: Arc<dyn Delivery>,
        bot_user_id: Option<String>,
    ) -> Self {
        Self {
            files,
            delivery,
            bot_user_id,
            help_pattern: Regex::new(HELP_PATTERN).expect("help pattern is a valid regex"),
        }
    }

    /// Handle one event to completion.
    pub async fn handle(&self, event: SlackEvent) -> Handled {
        match event {
            SlackEvent::FileShared(shared) => {
                let outcome = self.files.handle(&FileEvent::from(&shared)).await;
                Handled::File(outcome)
            }
            SlackEvent::AppMention(mention) => {
                let text = format!(
                    "Hi! I'm a file processor bot. Upload a file and I'll process it.\n\n\
                     *Supported file types:*\n{}",
                    self.supported_types()
                );
                self.reply(&mention, &text).await;
                Handled::Help
            }
            SlackEvent::Message(message) if self.is_help_request(&message) => {
                let text = format!(
                    "*Supported file types:*\n{}\n\n\
                     Just upload a file and I'll process it automatically!",
                    self.supported_types()
                );
                self.reply(&message, &text).await;
                Handled::Help
            }
            other => {
                debug!(event = other.label(), "Ignoring event");
                Handled::Ignored
            }
        }
    }

    /// Consume events until the sender side closes.
    pub async fn run(self, mut events: mpsc::Receiver<SlackEvent>) {
        info!("Event listener started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("Event listener stopped");
    }

    fn supported_types(&self) -> String {
        self.files.dispatcher().registry().supported_types()
    }

    fn is_help_request(&self, message: &MessageEvent) -> bool {
        if message.is_from_bot() || message.channel.is_empty() {
            return false;
        }
        // Mentions are answered through app_mention.
        if let Some(bot) = &self.bot_user_id
            && message.text.contains(&format!("<@{bot}>"))
        {
            return false;
        }
        self.help_pattern.is_match(&message.text)
    }

    async fn reply(&self, message: &MessageEvent, text: &str) {
        if let Err(e) = self
            .delivery
            .post_message(&message.channel, text, message.reply_thread())
            .await
        {
            error!(channel = %message.channel, error = %e, "Failed to send help reply");
        }
    }
}

/// Spawn the listener on its own task.
pub fn spawn_listener(
    listener: EventListener,
    events: mpsc::Receiver<SlackEvent>,
) -> JoinHandle<()> {
    tokio::spawn(listener.run(events))
}
