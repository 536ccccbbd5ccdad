//! Host-native action effects.
//!
//! `open` and `copy` actions never reach an extension; the session hands
//! them to an implementation of [`ActionEffects`] provided by the platform
//! layer.

use crate::error::BeaconResult;

/// Side effects the host performs on behalf of an action.
pub trait ActionEffects: Send + Sync {
    /// Open a URL or path with the default handler.
    fn open(&self, target: &str) -> BeaconResult<()>;

    /// Replace the clipboard contents.
    fn copy(&self, text: &str) -> BeaconResult<()>;
}
