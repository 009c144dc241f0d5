//! Skip guards evaluated before any file is downloaded.
//!
//! Built-ins, in order:
//! - files uploaded by the bot itself → skip (prevents reply loops)
//! - filenames carrying a derived-output marker (`-resized`, ...) → skip
//! - files above the size limit → skip
//!
//! Guards are total: a guard that cannot decide lets the file through.

use tracing::debug;

use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::pipeline::types::{FileMetadata, GuardResult};

/// Filename fragments the bot's own processors emit.
pub const DERIVED_FILENAME_MARKERS: &[&str] =
    &["-resized", "-processed", "-thumbnail", "-converted"];

/// What a guard sees: the file plus the bot's own identity.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub file_user_id: Option<&'a str>,
    pub bot_user_id: Option<&'a str>,
    pub filename: &'a str,
    pub size: u64,
    pub mimetype: &'a str,
}

impl<'a> GuardContext<'a> {
    pub fn new(metadata: &'a FileMetadata, bot_user_id: Option<&'a str>) -> Self {
        Self {
            file_user_id: metadata.user.as_deref(),
            bot_user_id,
            filename: &metadata.name,
            size: metadata.size,
            mimetype: &metadata.mimetype,
        }
    }
}

/// A single veto condition.
pub trait Guard: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Decide whether the file must be skipped. Must not panic or block.
    fn check(&self, ctx: &GuardContext<'_>) -> GuardResult;
}

/// Skips files the bot uploaded itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct BotUploadGuard;

impl Guard for BotUploadGuard {
    fn name(&self) -> &str {
        "bot_upload"
    }

    fn check(&self, ctx: &GuardContext<'_>) -> GuardResult {
        match (ctx.file_user_id, ctx.bot_user_id) {
            (Some(owner), Some(bot)) if !owner.is_empty() && owner == bot => {
                GuardResult::skip("File uploaded by bot itself")
            }
            _ => GuardResult::proceed(),
        }
    }
}

/// Skips filenames that look like processor output.
#[derive(Debug, Clone)]
pub struct DerivedFilenameGuard {
    markers: Vec<String>,
}

impl DerivedFilenameGuard {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for DerivedFilenameGuard {
    fn default() -> Self {
        Self::new(DERIVED_FILENAME_MARKERS.iter().copied())
    }
}

impl Guard for DerivedFilenameGuard {
    fn name(&self) -> &str {
        "derived_filename"
    }

    fn check(&self, ctx: &GuardContext<'_>) -> GuardResult {
        if self.markers.iter().any(|m| ctx.filename.contains(m.as_str())) {
            return GuardResult::skip(format!(
                "Filename contains skip pattern: {}",
                ctx.filename
            ));
        }
        GuardResult::proceed()
    }
}

/// Skips files above a byte limit. Exactly-at-limit passes.
#[derive(Debug, Clone, Copy)]
pub struct MaxSizeGuard {
    max_bytes: u64,
}

impl MaxSizeGuard {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl Default for MaxSizeGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl Guard for MaxSizeGuard {
    fn name(&self) -> &str {
        "max_size"
    }

    fn check(&self, ctx: &GuardContext<'_>) -> GuardResult {
        if ctx.size > self.max_bytes {
            return GuardResult::skip(format!("File too large: {} bytes", ctx.size));
        }
        GuardResult::proceed()
    }
}

/// Skips MIME types starting with any configured prefix (e.g. `video/`).
#[derive(Debug, Clone)]
pub struct MimePrefixGuard {
    prefixes: Vec<String>,
}

impl MimePrefixGuard {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }
}

impl Guard for MimePrefixGuard {
    fn name(&self) -> &str {
        "mime_prefix"
    }

    fn check(&self, ctx: &GuardContext<'_>) -> GuardResult {
        match self.prefixes.iter().find(|p| ctx.mimetype.starts_with(p.as_str())) {
            Some(prefix) => GuardResult::skip(format!(
                "MIME type {} excluded ({prefix})",
                ctx.mimetype
            )),
            None => GuardResult::proceed(),
        }
    }
}

/// Wraps a closure as a guard.
pub struct FnGuard<F> {
    name: String,
    check: F,
}

impl<F> Guard for FnGuard<F>
where
    F: Fn(&GuardContext<'_>) -> GuardResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, ctx: &GuardContext<'_>) -> GuardResult {
        (self.check)(ctx)
    }
}

/// Ordered list of guards; the first skip wins.
///
/// Populated at startup, read-only afterwards.
pub struct GuardChain {
    guards: Vec<Box<dyn Guard>>,
}

impl GuardChain {
    /// The built-in guards with the given size limit.
    pub fn with_defaults(max_file_size: u64) -> Self {
        let mut chain = Self::empty();
        chain.push(BotUploadGuard);
        chain.push(DerivedFilenameGuard::default());
        chain.push(MaxSizeGuard::new(max_file_size));
        chain
    }

    /// A chain with no guards (for testing).
    pub fn empty() -> Self {
        Self { guards: Vec::new() }
    }

    /// Append a guard; it runs after every guard already present.
    pub fn push(&mut self, guard: impl Guard + 'static) {
        debug!(guard = guard.name(), "Registered guard");
        self.guards.push(Box::new(guard));
    }

    /// Append a closure guard.
    pub fn push_fn<F>(&mut self, name: &str, check: F)
    where
        F: Fn(&GuardContext<'_>) -> GuardResult + Send + Sync + 'static,
    {
        self.push(FnGuard {
            name: name.to_string(),
            check,
        });
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Run guards in order, returning the first skip.
    pub fn evaluate(&self, metadata: &FileMetadata, bot_user_id: Option<&str>) -> GuardResult {
        let ctx = GuardContext::new(metadata, bot_user_id);

        for guard in &self.guards {
            let result = guard.check(&ctx);
            if result.skip {
                debug!(
                    guard = guard.name(),
                    filename = %ctx.filename,
                    reason = result.reason.as_deref().unwrap_or(""),
                    "File matched skip guard"
                );
                return result;
            }
        }

        GuardResult::proceed()
    }
}

impl Default for GuardChain {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_MAX_FILE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "UBOT";

    fn make_file(user: &str, name: &str, size: u64, mimetype: &str) -> FileMetadata {
        FileMetadata {
            id: "F1".into(),
            user: Some(user.into()),
            name: name.into(),
            mimetype: mimetype.into(),
            size,
            ..Default::default()
        }
    }

    #[test]
    fn skips_bot_upload() {
        let chain = GuardChain::default();
        let file = make_file(BOT, "photo.png", 100, "image/png");
        let result = chain.evaluate(&file, Some(BOT));
        assert!(result.skip);
        assert_eq!(result.reason.as_deref(), Some("File uploaded by bot itself"));
    }

    #[test]
    fn bot_upload_needs_both_ids() {
        let chain = GuardChain::default();
        let file = make_file(BOT, "photo.png", 100, "image/png");
        assert!(!chain.evaluate(&file, None).skip);

        let mut anonymous = file.clone();
        anonymous.user = None;
        assert!(!chain.evaluate(&anonymous, Some(BOT)).skip);
    }

    #[test]
    fn skips_every_derived_marker() {
        let chain = GuardChain::default();
        for name in [
            "photo-resized.png",
            "doc-processed.pdf",
            "cat-thumbnail.jpg",
            "sheet-converted.docx",
        ] {
            let file = make_file("U1", name, 1, "application/octet-stream");
            let result = chain.evaluate(&file, Some(BOT));
            assert!(result.skip, "{name} should be skipped");
            assert!(result.reason.unwrap().contains(name));
        }
    }

    #[test]
    fn derived_marker_is_case_sensitive_substring() {
        let chain = GuardChain::default();
        let file = make_file("U1", "resized.png", 1, "image/png");
        assert!(!chain.evaluate(&file, Some(BOT)).skip);
    }

    #[test]
    fn size_limit_is_inclusive() {
        let chain = GuardChain::with_defaults(1000);
        let at_limit = make_file("U1", "a.png", 1000, "image/png");
        assert!(!chain.evaluate(&at_limit, Some(BOT)).skip);

        let over = make_file("U1", "a.png", 1001, "image/png");
        let result = chain.evaluate(&over, Some(BOT));
        assert!(result.skip);
        assert!(result.reason.unwrap().contains("1001"));
    }

    #[test]
    fn bot_guard_runs_first() {
        let chain = GuardChain::with_defaults(10);
        let file = make_file(BOT, "big-resized.png", 10_000, "image/png");
        let result = chain.evaluate(&file, Some(BOT));
        assert_eq!(result.reason.as_deref(), Some("File uploaded by bot itself"));
    }

    #[test]
    fn appended_guard_runs_after_builtins() {
        let mut chain = GuardChain::with_defaults(10);
        chain.push(MimePrefixGuard::new(vec!["video/".into()]));
        assert_eq!(chain.len(), 4);

        let video = make_file("U1", "clip.mp4", 5, "video/mp4");
        let result = chain.evaluate(&video, Some(BOT));
        assert!(result.skip);
        assert!(result.reason.unwrap().contains("video/mp4"));

        // Size guard vetoes first when both apply.
        let big_video = make_file("U1", "clip.mp4", 50, "video/mp4");
        let result = chain.evaluate(&big_video, Some(BOT));
        assert!(result.reason.unwrap().starts_with("File too large"));
    }

    #[test]
    fn closure_guard() {
        let mut chain = GuardChain::empty();
        chain.push_fn("no_gifs", |ctx| {
            if ctx.mimetype == "image/gif" {
                GuardResult::skip("GIFs not supported")
            } else {
                GuardResult::proceed()
            }
        });

        let gif = make_file("U1", "a.gif", 1, "image/gif");
        assert_eq!(
            chain.evaluate(&gif, None).reason.as_deref(),
            Some("GIFs not supported")
        );
        let png = make_file("U1", "a.png", 1, "image/png");
        assert!(!chain.evaluate(&png, None).skip);
    }

    #[test]
    fn empty_chain_passes_everything() {
        let chain = GuardChain::empty();
        assert!(chain.is_empty());
        let file = make_file(BOT, "x-resized.png", u64::MAX, "video/mp4");
        assert_eq!(chain.evaluate(&file, Some(BOT)), GuardResult::proceed());
    }
}
