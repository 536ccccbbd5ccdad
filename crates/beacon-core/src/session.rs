//! Interactive session state machine.
//!
//! A [`Session`] drives one user through the extension protocol:
//!
//! ```text
//! Discovering -> Ready -> Invoking -> Rendering | Erroring | Reloading | Exiting
//! ```
//!
//! Every rendered view is a page on a navigation stack. A `run` action
//! pushes a page; a reload replaces the top page in place. Silent and tty
//! commands leave the stack untouched.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::effects::ActionEffects;
use crate::error::{BeaconError, BeaconResult, ErrorClass};
use crate::extensions::{
    ActionKind, CommandMode, ExtensionHost, InvocationRequest, Outcome, PreparedInvocation,
    Prompter, RootEntry, RootTarget, View,
};
use crate::process::CancelToken;

/// Where the session is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Discovering,
    Ready,
    Invoking,
    Rendering,
    Reloading,
    Erroring,
    Exiting,
}

/// What an operation did to the displayed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new page was pushed.
    Rendered,
    /// The top page was replaced in place.
    Refreshed,
    /// A command without output finished.
    Completed,
    /// Nothing visible changed.
    Unchanged,
    /// The top page (or error) was closed.
    Dismissed,
    /// The host should close its UI.
    Exit,
}

/// The error shown in place of a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub class: ErrorClass,
    pub message: String,
}

struct Page {
    invocation: PreparedInvocation,
    view: View,
}

/// One user's walk through extension commands.
pub struct Session {
    host: ExtensionHost,
    effects: Box<dyn ActionEffects>,
    state: SessionState,
    pages: Vec<Page>,
    /// `(extension, command)` pairs whose reload has not finished.
    pending_reloads: HashSet<(String, String)>,
    cancel: CancelToken,
    last_error: Option<Failure>,
    /// Working directory passed to commands that do not set one.
    cwd: Option<PathBuf>,
}

impl Session {
    pub fn new(host: ExtensionHost, effects: Box<dyn ActionEffects>) -> Self {
        Self {
            host,
            effects,
            state: SessionState::Discovering,
            pages: Vec::new(),
            pending_reloads: HashSet::new(),
            cancel: CancelToken::new(),
            last_error: None,
            cwd: None,
        }
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn host(&self) -> &ExtensionHost {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut ExtensionHost {
        &mut self.host
    }

    /// Number of stacked pages.
    pub fn depth(&self) -> usize {
        self.pages.len()
    }

    pub fn current_view(&self) -> Option<&View> {
        self.pages.last().map(|page| &page.view)
    }

    /// The invocation that produced the current view.
    pub fn current_invocation(&self) -> Option<&PreparedInvocation> {
        self.pages.last().map(|page| &page.invocation)
    }

    pub fn last_error(&self) -> Option<&Failure> {
        self.last_error.as_ref()
    }

    /// Handle for cancelling the outstanding invocation from another thread.
    ///
    /// The token is cleared when a user action starts, so a cancel raised
    /// while parameters are being prompted for still stops the spawn.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Discover every extension and return the combined root menu.
    pub fn open_root(&mut self) -> Vec<RootEntry> {
        self.state = SessionState::Discovering;
        self.pages.clear();
        self.last_error = None;

        for (alias, err) in self.host.discover_all() {
            tracing::debug!("'{}' left out of the root menu: {}", alias, err);
        }

        self.state = SessionState::Ready;
        self.host.root_menu()
    }

    /// Activate a root menu entry.
    pub fn select(
        &mut self,
        entry: &RootEntry,
        prompter: &mut dyn Prompter,
    ) -> BeaconResult<Transition> {
        self.cancel.reset();
        match &entry.target {
            RootTarget::Command {
                extension,
                command,
                params,
            } => {
                let request =
                    InvocationRequest::new(extension.as_str(), command.as_str())
                        .with_params(params.clone());
                self.run(request, prompter)
            }
            RootTarget::Oneliner { alias } => {
                self.begin(SessionState::Invoking);
                match self.host.run_oneliner(alias) {
                    Ok(true) => Ok(self.exit()),
                    Ok(false) => {
                        self.settle();
                        Ok(Transition::Completed)
                    }
                    Err(e) => Err(self.fail(e)),
                }
            }
        }
    }

    /// Invoke a command, pushing its view if it has one.
    pub fn run(
        &mut self,
        request: InvocationRequest,
        prompter: &mut dyn Prompter,
    ) -> BeaconResult<Transition> {
        self.cancel.reset();
        let max_depth = self.host.settings().max_run_depth;
        if self.pages.len() >= max_depth {
            return Err(self.fail(BeaconError::RunDepthExceeded(max_depth)));
        }

        self.begin(SessionState::Invoking);
        match self.invoke(request, prompter) {
            Ok((invocation, Outcome::View(view))) => {
                self.pages.push(Page { invocation, view });
                self.state = SessionState::Rendering;
                Ok(Transition::Rendered)
            }
            Ok((_, Outcome::Done)) => {
                self.settle();
                Ok(Transition::Completed)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Re-run the current list command with a new query.
    ///
    /// Ignored when the current command is not a list.
    pub fn set_query(&mut self, query: impl Into<String>) -> BeaconResult<Transition> {
        self.cancel.reset();
        let Some(page) = self.pages.last() else {
            return Ok(Transition::Unchanged);
        };
        if page.invocation.mode != CommandMode::List {
            return Ok(Transition::Unchanged);
        }

        let mut invocation = page.invocation.clone();
        invocation.payload.query = Some(query.into());

        self.begin(SessionState::Invoking);
        match self.host.execute(&invocation, &self.cancel) {
            Ok(Outcome::View(view)) => {
                self.replace_top(invocation, view);
                Ok(Transition::Refreshed)
            }
            Ok(Outcome::Done) => {
                self.settle();
                Ok(Transition::Unchanged)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Index of the action whose key or title matches `needle`.
    pub fn find_action(&self, item: Option<usize>, needle: &str) -> Option<usize> {
        let actions = self.current_view()?.actions(item)?;
        actions
            .iter()
            .position(|a| a.key.as_deref() == Some(needle))
            .or_else(|| {
                actions
                    .iter()
                    .position(|a| a.title.eq_ignore_ascii_case(needle))
            })
    }

    /// Trigger action `index` of list item `item` (or of the detail).
    pub fn trigger(
        &mut self,
        item: Option<usize>,
        index: usize,
        prompter: &mut dyn Prompter,
    ) -> BeaconResult<Transition> {
        self.cancel.reset();
        let Some(page) = self.pages.last() else {
            return Err(self.fail(BeaconError::NoSuchAction(
                "nothing is displayed".to_string(),
            )));
        };
        let Some(action) = page
            .view
            .actions(item)
            .and_then(|actions| actions.get(index))
            .cloned()
        else {
            let target = match item {
                Some(item) => format!("item {} has no action {}", item, index),
                None => format!("view has no action {}", index),
            };
            return Err(self.fail(BeaconError::NoSuchAction(target)));
        };

        let origin_extension = page.invocation.extension.clone();
        let exit = action.exit;
        tracing::debug!("Triggering action '{}'", action.title);

        let effect = match action.kind {
            ActionKind::Open { url } => self.effects.open(&url),
            ActionKind::Copy { text } => self.effects.copy(&text),
            ActionKind::Run {
                command,
                params,
                extension,
                reload,
            } => {
                let request =
                    InvocationRequest::new(extension.unwrap_or(origin_extension), command)
                        .with_params(params);
                return if exit {
                    self.run_then_exit(request, prompter)
                } else if reload {
                    self.reload(Some(request), prompter)
                } else {
                    self.run(request, prompter)
                };
            }
            ActionKind::Reload => {
                let transition = self.reload(None, prompter)?;
                return Ok(if exit { self.exit() } else { transition });
            }
        };

        match effect {
            Ok(()) if exit => Ok(self.exit()),
            Ok(()) => Ok(Transition::Unchanged),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Close the error or the top page.
    pub fn dismiss(&mut self) -> Transition {
        if self.state == SessionState::Erroring {
            self.last_error = None;
            self.settle();
            return Transition::Dismissed;
        }

        if self.pages.pop().is_none() {
            return self.exit();
        }
        self.settle();
        Transition::Dismissed
    }

    fn run_then_exit(
        &mut self,
        request: InvocationRequest,
        prompter: &mut dyn Prompter,
    ) -> BeaconResult<Transition> {
        self.begin(SessionState::Invoking);
        match self.invoke(request, prompter) {
            Ok(_) => Ok(self.exit()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Run `target` (if any), then re-invoke the command of the top page.
    fn reload(
        &mut self,
        target: Option<InvocationRequest>,
        prompter: &mut dyn Prompter,
    ) -> BeaconResult<Transition> {
        let Some(origin) = self.current_invocation().cloned() else {
            return Err(self.fail(BeaconError::NoSuchAction(
                "nothing to reload".to_string(),
            )));
        };
        let key = (origin.extension.clone(), origin.command().to_string());

        if !self.pending_reloads.insert(key.clone()) {
            return Err(self.fail(BeaconError::ReloadCycle {
                extension: key.0,
                command: key.1,
            }));
        }

        self.begin(SessionState::Reloading);
        let result = self.reload_cycle(target, &origin, prompter);
        self.pending_reloads.remove(&key);

        match result {
            Ok(view) => {
                self.replace_top(origin, view);
                Ok(Transition::Refreshed)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn reload_cycle(
        &mut self,
        target: Option<InvocationRequest>,
        origin: &PreparedInvocation,
        prompter: &mut dyn Prompter,
    ) -> BeaconResult<View> {
        if let Some(request) = target {
            let (prepared, outcome) = self.invoke(request, prompter)?;
            if matches!(outcome, Outcome::View(_)) {
                tracing::debug!(
                    "Discarding view of {}/{} before reload",
                    prepared.extension,
                    prepared.command()
                );
            }
        }

        tracing::info!("Reloading {}/{}", origin.extension, origin.command());
        match self.host.execute(origin, &self.cancel)? {
            Outcome::View(view) => Ok(view),
            Outcome::Done => Err(BeaconError::ProtocolViolation {
                extension: origin.extension.clone(),
                command: origin.command().to_string(),
                message: "reload produced no view".to_string(),
                stderr: String::new(),
            }),
        }
    }

    fn invoke(
        &mut self,
        mut request: InvocationRequest,
        prompter: &mut dyn Prompter,
    ) -> BeaconResult<(PreparedInvocation, Outcome)> {
        if request.cwd.is_none() {
            request.cwd = self.cwd.clone();
        }
        let prepared = self.host.prepare(&request, prompter)?;
        let outcome = self.host.execute(&prepared, &self.cancel)?;
        Ok((prepared, outcome))
    }

    fn replace_top(&mut self, invocation: PreparedInvocation, view: View) {
        match self.pages.last_mut() {
            Some(top) => *top = Page { invocation, view },
            None => self.pages.push(Page { invocation, view }),
        }
        self.state = SessionState::Rendering;
    }

    fn begin(&mut self, state: SessionState) {
        self.state = state;
        self.last_error = None;
    }

    /// Return to the previous view, or the root menu.
    fn settle(&mut self) {
        self.state = if self.pages.is_empty() {
            SessionState::Ready
        } else {
            SessionState::Rendering
        };
    }

    fn exit(&mut self) -> Transition {
        tracing::debug!("Session exiting");
        self.state = SessionState::Exiting;
        Transition::Exit
    }

    fn fail(&mut self, err: BeaconError) -> BeaconError {
        if err.class() == ErrorClass::Cancelled {
            tracing::info!("{}", err);
            self.settle();
        } else {
            tracing::warn!("{}", err);
            self.state = SessionState::Erroring;
            self.last_error = Some(Failure {
                class: err.class(),
                message: err.to_string(),
            });
        }
        err
    }
}
