//! Editor-integration shim for the `ffi_navigator` language server.
//!
//! Verifies the analysis package is installed, resolves the interpreter,
//! and brings the language session up and down in lockstep with the host
//! lifecycle. All navigation and analysis logic lives in the external
//! server process; this crate is configuration plus process-launch glue.

pub mod config;
pub mod lifecycle;
pub mod notify;
pub mod probe;
pub mod selector;

pub use config::{HostSettings, SettingsError, DEFAULT_INTERPRETER, PYTHONPATH_KEY};
pub use lifecycle::{
    server_launch, ClientSession, Extension, LifecycleState, LspLauncher, SessionLauncher,
    SERVER_MODULE,
};
pub use notify::{LogNotifier, Notifier, INSTALL_HINT};
pub use probe::{PackageProbe, PipProbe, ProbeError, PACKAGE_NAME};
pub use selector::{document_selectors, DocumentSelector};
