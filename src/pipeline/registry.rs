//! Processor registry: maps file extensions and MIME types to processors.
//!
//! Entries are scanned in registration order and the first entry claiming
//! either the file's extension or its MIME type wins. A file can match by
//! either key and a processor claims several of each, so this is a list,
//! not a map.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::ProcessorError;
use crate::pipeline::types::{ProcessorInput, ProcessorOutput, file_extension};

/// A file transformation.
///
/// Processors are synchronous and CPU-bound; the dispatcher runs them off the
/// async runtime.
pub trait FileProcessor: Send + Sync {
    /// Transform one file. `Ok(None)` means there is nothing to report.
    fn process(&self, input: &ProcessorInput) -> Result<Option<ProcessorOutput>, ProcessorError>;
}

/// Wraps a closure as a processor.
pub struct FnProcessor<F>(pub F);

impl<F> FileProcessor for FnProcessor<F>
where
    F: Fn(&ProcessorInput) -> Result<Option<ProcessorOutput>, ProcessorError> + Send + Sync,
{
    fn process(&self, input: &ProcessorInput) -> Result<Option<ProcessorOutput>, ProcessorError> {
        (self.0)(input)
    }
}

/// One registered processor and what it claims.
#[derive(Clone)]
pub struct ProcessorEntry {
    /// Lowercased extensions, in declaration order.
    pub extensions: Vec<String>,
    pub mimetypes: BTreeSet<String>,
    pub description: String,
    pub processor: Arc<dyn FileProcessor>,
}

impl ProcessorEntry {
    /// Whether this entry claims the given extension or MIME type.
    pub fn matches(&self, extension: &str, mimetype: &str) -> bool {
        (!extension.is_empty() && self.extensions.iter().any(|e| e == extension))
            || self.mimetypes.contains(mimetype)
    }
}

impl std::fmt::Debug for ProcessorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorEntry")
            .field("extensions", &self.extensions)
            .field("mimetypes", &self.mimetypes)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registry of available processors.
///
/// Append-only; built once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct ProcessorRegistry {
    entries: Vec<ProcessorEntry>,
}

impl ProcessorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor. Earlier registrations win on overlapping claims.
    pub fn register<E, M>(
        &mut self,
        extensions: E,
        mimetypes: M,
        description: &str,
        processor: Arc<dyn FileProcessor>,
    ) where
        E: IntoIterator,
        E::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let extensions: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty() && seen.insert(e.clone()))
            .collect();
        let mimetypes = mimetypes
            .into_iter()
            .map(|m| m.as_ref().to_string())
            .collect();

        debug!(
            description,
            extensions = %extensions.join(", "),
            "Registered processor"
        );

        self.entries.push(ProcessorEntry {
            extensions,
            mimetypes,
            description: description.to_string(),
            processor,
        });
    }

    /// Register a closure processor.
    pub fn register_fn<E, M, F>(&mut self, extensions: E, mimetypes: M, description: &str, f: F)
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
        F: Fn(&ProcessorInput) -> Result<Option<ProcessorOutput>, ProcessorError>
            + Send
            + Sync
            + 'static,
    {
        self.register(extensions, mimetypes, description, Arc::new(FnProcessor(f)));
    }

    /// First entry claiming the file's extension or MIME type.
    pub fn find(&self, filename: &str, mimetype: &str) -> Option<&ProcessorEntry> {
        let extension = file_extension(filename);
        self.entries
            .iter()
            .find(|entry| entry.matches(&extension, mimetype))
    }

    /// `(extensions, description)` per entry, in registration order.
    pub fn describe_all(&self) -> Vec<(&[String], &str)> {
        self.entries
            .iter()
            .map(|e| (e.extensions.as_slice(), e.description.as_str()))
            .collect()
    }

    /// Human-readable listing, one line per entry.
    pub fn supported_types(&self) -> String {
        self.describe_all()
            .into_iter()
            .map(|(extensions, description)| {
                format!("• {}: {}", extensions.join(", "), description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get the number of registered processors.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
