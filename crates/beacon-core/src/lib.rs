pub mod config;
pub mod effects;
pub mod error;
pub mod extensions;
pub mod process;
pub mod session;

pub use config::{Config, ExtensionConfig, Oneliner, RootItem};
pub use effects::ActionEffects;
pub use error::{BeaconError, BeaconResult, ErrorClass};
pub use process::{
    CancelToken, CommandRunner, Invocation, ProcessOutput, ProcessRunner, Termination,
};
pub use session::{Failure, Session, SessionState, Transition};
