//! Dispatcher: registry lookup plus a single processor invocation.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::DispatchError;
use crate::pipeline::registry::ProcessorRegistry;
use crate::pipeline::types::{ProcessorInput, ProcessorOutput};

/// Result of routing a file to a processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// No processor claims this file.
    Unsupported,
    /// A processor ran.
    Processed {
        processor: String,
        output: Option<ProcessorOutput>,
    },
}

impl Dispatched {
    pub fn into_output(self) -> Option<ProcessorOutput> {
        match self {
            Self::Unsupported => None,
            Self::Processed { output, .. } => output,
        }
    }
}

/// Looks up and invokes the processor for a file.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ProcessorRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProcessorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Run the matching processor on the current thread.
    ///
    /// `Ok(None)` covers both "unsupported type" and "processor had nothing to say".
    pub fn dispatch(
        &self,
        input: &ProcessorInput,
    ) -> Result<Option<ProcessorOutput>, DispatchError> {
        self.route(input).map(Dispatched::into_output)
    }

    /// Like [`dispatch`](Self::dispatch), but tells "unsupported" apart.
    pub fn route(&self, input: &ProcessorInput) -> Result<Dispatched, DispatchError> {
        let Some(entry) = self.registry.find(&input.filename, &input.mimetype) else {
            info!(
                filename = %input.filename,
                mimetype = %input.mimetype,
                "No processor found for file (unsupported)"
            );
            return Ok(Dispatched::Unsupported);
        };

        info!(
            filename = %input.filename,
            processor = %entry.description,
            "Processing file"
        );

        let output = entry
            .processor
            .process(input)
            .map_err(|source| DispatchError::Failed {
                processor: entry.description.clone(),
                filename: input.filename.clone(),
                source,
            })?;

        Ok(Dispatched::Processed {
            processor: entry.description.clone(),
            output,
        })
    }

    /// Route on the blocking thread pool.
    ///
    /// A panicking processor surfaces as [`DispatchError::Panicked`] instead of
    /// tearing down the caller.
    pub async fn route_blocking(&self, input: ProcessorInput) -> Result<Dispatched, DispatchError> {
        let Some(entry) = self.registry.find(&input.filename, &input.mimetype) else {
            info!(
                filename = %input.filename,
                mimetype = %input.mimetype,
                "No processor found for file (unsupported)"
            );
            return Ok(Dispatched::Unsupported);
        };

        let processor = Arc::clone(&entry.processor);
        let description = entry.description.clone();
        let filename = input.filename.clone();

        info!(filename = %filename, processor = %description, "Processing file");

        let joined = tokio::task::spawn_blocking(move || processor.process(&input)).await;

        match joined {
            Ok(Ok(output)) => {
                debug!(filename = %filename, has_reply = output.is_some(), "Processor finished");
                Ok(Dispatched::Processed {
                    processor: description,
                    output,
                })
            }
            Ok(Err(source)) => Err(DispatchError::Failed {
                processor: description,
                filename,
                source,
            }),
            Err(_) => Err(DispatchError::Panicked {
                processor: description,
                filename,
            }),
        }
    }
}
