//! Activation lifecycle for the language session.
//!
//! The extension is an explicit lifecycle object: the host creates it,
//! calls [`Extension::activate`] once when its activation conditions are
//! met, polls for session events, and hands it back through
//! [`Extension::deactivate`] on shutdown. There is no module-level client
//! state.

use crate::config::HostSettings;
use crate::notify::{LogNotifier, Notifier, INSTALL_HINT};
use crate::probe::{PackageProbe, PipProbe};
use crate::selector::{document_selectors, DocumentSelector};
use ffi_navigator_lsp::{LaunchConfig, LspSession, SessionEvent, SessionOptions, StopSignal};
use std::io;
use std::path::PathBuf;

/// Module invoked to start the server. The arguments are fixed; only the
/// interpreter varies.
pub const SERVER_MODULE: &str = "ffi_navigator.langserver";

/// Builds the launch configuration for the navigator server.
pub fn server_launch(interpreter: &str) -> LaunchConfig {
    LaunchConfig::new(
        interpreter,
        vec!["-m".to_string(), SERVER_MODULE.to_string()],
    )
}

/// Lifecycle phases of the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, not yet activated.
    Uninitialized,
    /// Session launched, waiting for the initialize response.
    Starting,
    /// The server answered initialize.
    Active,
    /// Stop requested, shutdown in flight.
    Stopping,
    /// Terminal: activation failed its precheck, or the session ended.
    Inactive,
}

/// Live session as seen by the controller.
pub trait ClientSession {
    /// Requests a graceful stop; returns the pending completion signal.
    fn stop(&mut self) -> StopSignal;
    /// Whether the session loop is still running.
    fn is_running(&self) -> bool;
    /// Next pending session event, if any.
    fn try_recv_event(&self) -> Option<SessionEvent>;
}

impl ClientSession for LspSession {
    fn stop(&mut self) -> StopSignal {
        LspSession::stop(self)
    }

    fn is_running(&self) -> bool {
        LspSession::is_running(self)
    }

    fn try_recv_event(&self) -> Option<SessionEvent> {
        LspSession::try_recv_event(self)
    }
}

/// Creates the session bound to a launch configuration.
pub trait SessionLauncher {
    fn launch(
        &self,
        config: LaunchConfig,
        options: SessionOptions,
    ) -> io::Result<Box<dyn ClientSession>>;
}

/// Launcher backed by the real protocol client.
#[derive(Debug, Default)]
pub struct LspLauncher;

impl SessionLauncher for LspLauncher {
    fn launch(
        &self,
        config: LaunchConfig,
        options: SessionOptions,
    ) -> io::Result<Box<dyn ClientSession>> {
        Ok(Box::new(LspSession::start(config, options)))
    }
}

/// The activation controller: brings the language session up and down in
/// lockstep with the host lifecycle. At most one session exists per
/// activation.
pub struct Extension {
    settings: HostSettings,
    workspace_root: Option<PathBuf>,
    probe: Box<dyn PackageProbe>,
    launcher: Box<dyn SessionLauncher>,
    notifier: Box<dyn Notifier>,
    selectors: Vec<DocumentSelector>,
    session: Option<Box<dyn ClientSession>>,
    state: LifecycleState,
}

impl Extension {
    /// Creates the extension with production collaborators.
    pub fn new(settings: HostSettings, workspace_root: Option<PathBuf>) -> Self {
        Self::with_parts(
            settings,
            workspace_root,
            Box::new(PipProbe),
            Box::new(LspLauncher),
            Box::new(LogNotifier),
        )
    }

    /// Creates the extension with explicit collaborators.
    pub fn with_parts(
        settings: HostSettings,
        workspace_root: Option<PathBuf>,
        probe: Box<dyn PackageProbe>,
        launcher: Box<dyn SessionLauncher>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            workspace_root,
            probe,
            launcher,
            notifier,
            selectors: Vec::new(),
            session: None,
            state: LifecycleState::Uninitialized,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether a session handle currently exists.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// The selector set bound at activation; empty before activation.
    pub fn selectors(&self) -> &[DocumentSelector] {
        &self.selectors
    }

    /// Whether the bound selector set covers the given document.
    pub fn covers(&self, scheme: &str, language: &str) -> bool {
        self.selectors.iter().any(|s| s.matches(scheme, language))
    }

    /// Brings the session up.
    ///
    /// Never panics: a failed availability check surfaces one user-visible
    /// notification and leaves the extension inactive with no session.
    pub fn activate(&mut self) {
        if self.state != LifecycleState::Uninitialized {
            log::warn!("activate called in state {:?}, ignoring", self.state);
            return;
        }

        let interpreter = self.settings.interpreter().to_string();
        if let Err(e) = self.probe.check(&interpreter) {
            log::warn!("Availability check failed: {}", e);
            self.notifier.error(INSTALL_HINT);
            self.state = LifecycleState::Inactive;
            return;
        }

        let config = server_launch(&interpreter);
        let options = SessionOptions {
            root_path: self.workspace_root.clone(),
        };
        match self.launcher.launch(config, options) {
            Ok(session) => {
                self.session = Some(session);
                self.selectors = document_selectors();
                self.state = LifecycleState::Starting;
                log::info!("Language session starting with interpreter '{}'", interpreter);
            }
            Err(e) => {
                // Fatal to this activation attempt; no retry.
                log::error!("Failed to launch language session: {}", e);
                self.state = LifecycleState::Inactive;
            }
        }
    }

    /// Drains pending session events, advancing the lifecycle, and returns
    /// them for the host to display.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if let Some(session) = &self.session {
            while let Some(event) = session.try_recv_event() {
                match event {
                    SessionEvent::Ready { .. } if self.state == LifecycleState::Starting => {
                        self.state = LifecycleState::Active;
                    }
                    SessionEvent::Exited { .. } => {
                        self.state = LifecycleState::Inactive;
                    }
                    _ => {}
                }
                events.push(event);
            }
        }

        if self.state == LifecycleState::Inactive {
            self.session = None;
        }
        if self.session.is_none() && self.state == LifecycleState::Stopping {
            self.state = LifecycleState::Inactive;
        }

        events
    }

    /// Requests a graceful stop of the session.
    ///
    /// Returns the pending completion signal, or `None` when no session
    /// exists: deactivation before a successful activation is a no-op.
    pub fn deactivate(&mut self) -> Option<StopSignal> {
        let mut session = self.session.take()?;
        self.state = LifecycleState::Stopping;
        Some(session.stop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_INTERPRETER, PYTHONPATH_KEY};
    use crate::probe::ProbeError;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::rc::Rc;
    use std::time::Duration;

    /// Shared record of everything the fakes observed.
    #[derive(Default)]
    struct Record {
        probed: RefCell<Vec<String>>,
        launches: RefCell<Vec<LaunchConfig>>,
        stops: RefCell<usize>,
        notifications: RefCell<Vec<String>>,
        events: RefCell<VecDeque<SessionEvent>>,
    }

    struct FakeProbe {
        record: Rc<Record>,
        fail: bool,
    }

    impl PackageProbe for FakeProbe {
        fn check(&self, interpreter: &str) -> Result<(), ProbeError> {
            self.record.probed.borrow_mut().push(interpreter.to_string());
            if self.fail {
                Err(ProbeError::Missing {
                    command: interpreter.to_string(),
                    status: ExitStatus::from_raw(256),
                })
            } else {
                Ok(())
            }
        }
    }

    struct FakeSession {
        record: Rc<Record>,
    }

    impl ClientSession for FakeSession {
        fn stop(&mut self) -> StopSignal {
            *self.record.stops.borrow_mut() += 1;
            StopSignal::ready()
        }

        fn is_running(&self) -> bool {
            true
        }

        fn try_recv_event(&self) -> Option<SessionEvent> {
            self.record.events.borrow_mut().pop_front()
        }
    }

    struct FakeLauncher {
        record: Rc<Record>,
    }

    impl SessionLauncher for FakeLauncher {
        fn launch(
            &self,
            config: LaunchConfig,
            _options: SessionOptions,
        ) -> io::Result<Box<dyn ClientSession>> {
            self.record.launches.borrow_mut().push(config);
            Ok(Box::new(FakeSession {
                record: self.record.clone(),
            }))
        }
    }

    struct FailingLauncher;

    impl SessionLauncher for FailingLauncher {
        fn launch(
            &self,
            _config: LaunchConfig,
            _options: SessionOptions,
        ) -> io::Result<Box<dyn ClientSession>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no interpreter"))
        }
    }

    struct FakeNotifier {
        record: Rc<Record>,
    }

    impl Notifier for FakeNotifier {
        fn error(&self, message: &str) {
            self.record.notifications.borrow_mut().push(message.to_string());
        }
    }

    fn extension(settings: HostSettings, probe_fails: bool) -> (Extension, Rc<Record>) {
        let record = Rc::new(Record::default());
        let ext = Extension::with_parts(
            settings,
            None,
            Box::new(FakeProbe {
                record: record.clone(),
                fail: probe_fails,
            }),
            Box::new(FakeLauncher {
                record: record.clone(),
            }),
            Box::new(FakeNotifier {
                record: record.clone(),
            }),
        );
        (ext, record)
    }

    #[test]
    fn failed_probe_creates_no_session_and_notifies_once() {
        let (mut ext, record) = extension(HostSettings::new(), true);
        ext.activate();

        assert!(!ext.has_session());
        assert_eq!(ext.state(), LifecycleState::Inactive);
        assert_eq!(record.notifications.borrow().len(), 1);
        assert_eq!(record.launches.borrow().len(), 0);

        // Activation aborted cleanly; the later deactivate is a no-op.
        assert!(ext.deactivate().is_none());
        assert_eq!(*record.stops.borrow(), 0);
    }

    #[test]
    fn default_interpreter_is_probed_and_launched() {
        let (mut ext, record) = extension(HostSettings::new(), false);
        ext.activate();

        assert_eq!(record.probed.borrow().as_slice(), [DEFAULT_INTERPRETER]);
        assert_eq!(record.launches.borrow()[0].command, DEFAULT_INTERPRETER);
        assert_eq!(ext.state(), LifecycleState::Starting);
    }

    #[test]
    fn configured_interpreter_overrides_default() {
        let mut settings = HostSettings::new();
        settings.set(PYTHONPATH_KEY, "/opt/venv/bin/python");
        let (mut ext, record) = extension(settings, false);
        ext.activate();

        assert_eq!(record.probed.borrow().as_slice(), ["/opt/venv/bin/python"]);
        assert_eq!(record.launches.borrow()[0].command, "/opt/venv/bin/python");
    }

    #[test]
    fn server_arguments_are_fixed() {
        let mut settings = HostSettings::new();
        settings.set(PYTHONPATH_KEY, "/opt/venv/bin/python");
        let (mut ext, record) = extension(settings, false);
        ext.activate();

        assert_eq!(
            record.launches.borrow()[0].args,
            ["-m", "ffi_navigator.langserver"]
        );
    }

    #[test]
    fn deactivate_before_activate_is_a_noop() {
        let (mut ext, record) = extension(HostSettings::new(), false);
        assert!(ext.deactivate().is_none());
        assert_eq!(*record.stops.borrow(), 0);
        assert_eq!(ext.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn deactivate_issues_one_stop_and_returns_its_signal() {
        let (mut ext, record) = extension(HostSettings::new(), false);
        ext.activate();

        let signal = ext.deactivate().expect("a session was active");
        assert!(signal.wait_timeout(Duration::from_secs(1)));
        assert_eq!(*record.stops.borrow(), 1);
        assert!(!ext.has_session());

        // A second deactivate has nothing left to stop.
        assert!(ext.deactivate().is_none());
        assert_eq!(*record.stops.borrow(), 1);
    }

    #[test]
    fn repeated_activation_is_ignored() {
        let (mut ext, record) = extension(HostSettings::new(), false);
        ext.activate();
        ext.activate();

        assert_eq!(record.launches.borrow().len(), 1);
        assert_eq!(record.probed.borrow().len(), 1);
    }

    #[test]
    fn ready_event_marks_the_session_active() {
        let (mut ext, record) = extension(HostSettings::new(), false);
        ext.activate();
        record.events.borrow_mut().push_back(SessionEvent::Ready {
            capabilities: "definition".to_string(),
        });

        let events = ext.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(ext.state(), LifecycleState::Active);
    }

    #[test]
    fn server_exit_marks_the_session_inactive() {
        let (mut ext, record) = extension(HostSettings::new(), false);
        ext.activate();
        record
            .events
            .borrow_mut()
            .push_back(SessionEvent::Exited { code: Some(1) });

        ext.poll();
        assert_eq!(ext.state(), LifecycleState::Inactive);
        assert!(!ext.has_session());
    }

    #[test]
    fn stopping_settles_inactive_on_the_next_poll() {
        let (mut ext, _record) = extension(HostSettings::new(), false);
        ext.activate();

        let signal = ext.deactivate().unwrap();
        assert_eq!(ext.state(), LifecycleState::Stopping);
        signal.wait();

        ext.poll();
        assert_eq!(ext.state(), LifecycleState::Inactive);
    }

    #[test]
    fn launch_failure_is_fatal_without_notification() {
        let record = Rc::new(Record::default());
        let mut ext = Extension::with_parts(
            HostSettings::new(),
            None,
            Box::new(FakeProbe {
                record: record.clone(),
                fail: false,
            }),
            Box::new(FailingLauncher),
            Box::new(FakeNotifier {
                record: record.clone(),
            }),
        );
        ext.activate();

        assert!(!ext.has_session());
        assert_eq!(ext.state(), LifecycleState::Inactive);
        assert_eq!(record.notifications.borrow().len(), 0);
    }

    #[test]
    fn selectors_bind_at_activation() {
        let (mut ext, _record) = extension(HostSettings::new(), false);
        assert!(!ext.covers("file", "python"));

        ext.activate();
        assert!(ext.covers("file", "python"));
        assert!(ext.covers("file", "c"));
        assert!(ext.covers("file", "cpp"));
        assert!(ext.covers("file", "plaintext"));
        assert!(!ext.covers("file", "rust"));
        assert!(!ext.covers("untitled", "python"));
    }
}
