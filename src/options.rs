//! Subscription options.

use crate::filter::ContentFilterOptions;
use crate::types::QosProfile;

/// Environment toggle for the loaned-message default. Only the literal
/// value `"1"` disables loaning; everything else (unset, `"0"`, arbitrary
/// text) leaves it enabled.
pub const DISABLE_LOANED_MESSAGES_ENV: &str = "COURIER_DISABLE_LOANED_MESSAGES";

/// Immutable-once-built configuration for a subscription.
///
/// The subscription stores its own copy at init; mutating a caller-held
/// value afterwards has no effect on a live subscription.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionOptions {
    /// Requested QoS. The transport may negotiate a different profile;
    /// the actual one is queryable after init.
    pub qos: QosProfile,

    /// Opt out of zero-copy loans even when the transport supports them.
    pub disable_loaned_message: bool,

    /// Filter applied at endpoint creation (None = no filtering requested).
    pub content_filter: Option<ContentFilterOptions>,
}

impl SubscriptionOptions {
    /// Default options with the loan toggle resolved from the process
    /// environment. The variable is read once, here; nothing deeper in the
    /// core re-reads it.
    pub fn default_from_env() -> Self {
        let raw = std::env::var(DISABLE_LOANED_MESSAGES_ENV).ok();
        Self {
            disable_loaned_message: resolve_loan_disable(raw.as_deref()),
            ..Self::default()
        }
    }

    /// Attach a content filter to apply at init.
    pub fn with_content_filter(mut self, filter: ContentFilterOptions) -> Self {
        self.content_filter = Some(filter);
        self
    }
}

/// Resolve the loan-disable default from the raw environment value.
///
/// Only the literal string `"1"` disables loaning.
pub fn resolve_loan_disable(raw: Option<&str>) -> bool {
    raw == Some("1")
}
