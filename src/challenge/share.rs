//! Sharing
//!
//! A challenge goes out through the first share strategy that works:
//! native share sheet, then clipboard, then a manual copy field. Failures
//! only move the chain along; they never surface as a hard error.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Title passed to native share sheets.
pub const SHARE_TITLE: &str = "Location Guessing Game";

/// Share errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ShareError {
    /// The platform lacks this share method.
    #[error("share method unavailable")]
    Unavailable,
    /// The user dismissed the share sheet.
    #[error("share cancelled")]
    Cancelled,
    /// The platform reported a failure.
    #[error("share failed: {0}")]
    Failed(String),
    /// No items captured yet.
    #[error("nothing to share")]
    NothingToShare,
}

/// Share methods, in fallback order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareMethod {
    /// Platform share sheet.
    Native,
    /// Clipboard write.
    Clipboard,
    /// Text field the user copies from.
    Manual,
}

impl std::fmt::Display for ShareMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShareMethod::Native => write!(f, "native share"),
            ShareMethod::Clipboard => write!(f, "clipboard"),
            ShareMethod::Manual => write!(f, "manual copy"),
        }
    }
}

/// What gets shared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    /// Share sheet title.
    pub title: String,
    /// Message body (includes the link).
    pub text: String,
    /// Challenge link.
    pub url: String,
}

impl SharePayload {
    /// Build the standard payload for a set of items and a challenge link.
    pub fn for_challenge(items: &[String], url: String) -> Self {
        Self {
            title: SHARE_TITLE.to_string(),
            text: share_text(items, &url),
            url,
        }
    }
}

/// Message listing the items and linking to the challenge.
pub fn share_text(items: &[String], url: &str) -> String {
    format!(
        "\u{1F3AF} {SHARE_TITLE}!\n\nI found these items in a photo:\n{}\n\nCan you guess where I took this photo? {url}",
        items.join(", ")
    )
}

/// One way of getting a payload to another person.
pub trait ShareStrategy: Send {
    /// Which method this is.
    fn method(&self) -> ShareMethod;

    /// Attempt the share.
    fn share<'a>(&'a mut self, payload: &'a SharePayload) -> BoxFuture<'a, Result<(), ShareError>>;
}

/// Last-resort strategy: hand the text to the UI for manual copying.
#[derive(Debug, Default)]
pub struct ManualCopy {
    shown: Option<String>,
}

impl ManualCopy {
    /// New, empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text the UI should display, once a share fell through to here.
    pub fn shown(&self) -> Option<&str> {
        self.shown.as_deref()
    }
}

impl ShareStrategy for ManualCopy {
    fn method(&self) -> ShareMethod {
        ShareMethod::Manual
    }

    fn share<'a>(&'a mut self, payload: &'a SharePayload) -> BoxFuture<'a, Result<(), ShareError>> {
        Box::pin(async move {
            self.shown = Some(payload.text.clone());
            Ok(())
        })
    }
}

/// Result of running a share chain.
#[derive(Clone, Debug, PartialEq)]
pub struct ShareOutcome {
    /// Method that succeeded, if any did.
    pub method: Option<ShareMethod>,
    /// Methods tried before it, with why they failed.
    pub failures: Vec<(ShareMethod, ShareError)>,
}

impl ShareOutcome {
    /// Whether some method succeeded.
    pub fn succeeded(&self) -> bool {
        self.method.is_some()
    }
}

/// Ordered share strategies.
#[derive(Default)]
pub struct ShareChain {
    strategies: Vec<Box<dyn ShareStrategy>>,
}

impl ShareChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy.
    pub fn with(mut self, strategy: impl ShareStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Number of strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the chain has no strategies.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy in order until one succeeds.
    pub async fn run(&mut self, payload: &SharePayload) -> ShareOutcome {
        let mut failures = Vec::new();

        for strategy in self.strategies.iter_mut() {
            let method = strategy.method();
            match strategy.share(payload).await {
                Ok(()) => {
                    info!("Shared via {}", method);
                    return ShareOutcome { method: Some(method), failures };
                }
                Err(e) => {
                    warn!("Share via {} failed: {}", method, e);
                    failures.push((method, e));
                }
            }
        }

        ShareOutcome { method: None, failures }
    }
}

/// External QR renderer. Takes the challenge JSON, returns an image.
pub trait QrRenderer {
    /// Render `payload` as a scannable image.
    fn render(&mut self, payload: &str) -> Result<Vec<u8>, ShareError>;
}
