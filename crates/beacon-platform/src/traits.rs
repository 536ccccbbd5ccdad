use beacon_core::BeaconResult;

/// Write the system clipboard
pub trait ClipboardAccess: Send + Sync {
    fn set_text(&self, content: &str) -> BeaconResult<()>;
}

/// Open URLs and files with the system default handler
pub trait SystemOpen: Send + Sync {
    fn open(&self, target: &str) -> BeaconResult<()>;
}
