mod bridge;
mod oauth;

pub use bridge::{BridgeError, UPSTREAM_BODY_PREVIEW_CHARS};
pub use oauth::OauthError;

/// Whether a caller could reasonably try the same request again.
///
/// The bridge itself never acts on this; it is exposed for the host that owns retry policy.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
