use std::sync::Mutex;

use beacon_core::{BeaconError, BeaconResult};

use crate::traits::{ClipboardAccess, SystemOpen};

/// Cross-platform clipboard using arboard
///
/// The handle is opened on first use so hosts without a display can still
/// run commands that never copy. It is kept open afterwards because some
/// platforms drop the contents together with the owning handle.
#[derive(Default)]
pub struct ArboardClipboard {
    clipboard: Mutex<Option<arboard::Clipboard>>,
}

impl ArboardClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardAccess for ArboardClipboard {
    fn set_text(&self, content: &str) -> BeaconResult<()> {
        let mut guard = self
            .clipboard
            .lock()
            .map_err(|e| BeaconError::Clipboard(e.to_string()))?;

        if guard.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|e| BeaconError::Clipboard(e.to_string()))?;
            *guard = Some(clipboard);
        }

        match guard.as_mut() {
            Some(clipboard) => clipboard
                .set_text(content)
                .map_err(|e| BeaconError::Clipboard(e.to_string())),
            None => Err(BeaconError::Clipboard("clipboard unavailable".to_string())),
        }
    }
}

/// Cross-platform file/URL opening using the `open` crate
pub struct OpenCrateOpener;

impl SystemOpen for OpenCrateOpener {
    fn open(&self, target: &str) -> BeaconResult<()> {
        open::that(target)
            .map_err(|e| BeaconError::Platform(format!("cannot open {}: {}", target, e)))
    }
}
