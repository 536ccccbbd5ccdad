//! Host-native effects for beacon actions.
//!
//! `open` goes through the `open` crate and `copy` through `arboard`, both
//! behind small traits so the session can be exercised without a desktop.

mod shared;
mod traits;

pub use shared::{ArboardClipboard, OpenCrateOpener};
pub use traits::{ClipboardAccess, SystemOpen};

use beacon_core::{ActionEffects, BeaconResult};

/// Aggregate of the platform implementations backing [`ActionEffects`]
pub struct SystemEffects {
    pub clipboard: Box<dyn ClipboardAccess>,
    pub opener: Box<dyn SystemOpen>,
}

impl SystemEffects {
    pub fn new(clipboard: Box<dyn ClipboardAccess>, opener: Box<dyn SystemOpen>) -> Self {
        Self { clipboard, opener }
    }

    /// Effects backed by the real clipboard and opener
    pub fn current() -> Self {
        Self::new(Box::new(ArboardClipboard::new()), Box::new(OpenCrateOpener))
    }
}

impl ActionEffects for SystemEffects {
    fn open(&self, target: &str) -> BeaconResult<()> {
        tracing::debug!("Opening {}", target);
        self.opener.open(target)
    }

    fn copy(&self, text: &str) -> BeaconResult<()> {
        tracing::debug!("Copying {} byte(s) to the clipboard", text.len());
        self.clipboard.set_text(text)
    }
}
