//! Registration lifecycle.
//!
//! A registration moves `parsed -> installing -> installed -> activating ->
//! activated`. A failed first install makes it `redundant`; the host may
//! retry the install later. A failed re-install of an activated registration
//! leaves it in control. Fetches are only intercepted once activated.

use serde::Serialize;

use docscan_core::{Error, Request};

use crate::agent::{
    ActivateEvent, ActivateReport, FetchDecision, FetchEvent, InstallEvent, InstallReport, OfflineAgent,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationState {
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl RegistrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::Parsed => "parsed",
            RegistrationState::Installing => "installing",
            RegistrationState::Installed => "installed",
            RegistrationState::Activating => "activating",
            RegistrationState::Activated => "activated",
            RegistrationState::Redundant => "redundant",
        }
    }
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered agent version and where it is in its lifecycle.
#[derive(Debug)]
pub struct Registration {
    agent: OfflineAgent,
    state: RegistrationState,
}

impl Registration {
    pub fn new(agent: OfflineAgent) -> Self {
        Self { agent, state: RegistrationState::Parsed }
    }

    pub fn agent(&self) -> &OfflineAgent {
        &self.agent
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    /// Whether fetches from open pages are routed through the agent.
    pub fn controls_clients(&self) -> bool {
        self.state == RegistrationState::Activated
    }

    /// Run the install handler.
    ///
    /// Installing again with the same version refreshes the precached
    /// entries and keeps the registration in control if it already was,
    /// whether or not the refresh succeeds.
    pub async fn install(&mut self) -> Result<InstallReport, Error> {
        if matches!(self.state, RegistrationState::Installing | RegistrationState::Activating) {
            return Err(Error::InvalidState(format!("cannot install while {}", self.state)));
        }

        let previous = self.state;
        self.state = RegistrationState::Installing;
        match self.agent.install(InstallEvent).await {
            Ok(report) => {
                self.state = if previous == RegistrationState::Activated {
                    RegistrationState::Activated
                } else {
                    RegistrationState::Installed
                };
                Ok(report)
            }
            Err(e) if previous == RegistrationState::Activated => {
                tracing::warn!(generation = %self.agent.version(), error = %e, "re-install failed; keeping control");
                self.state = RegistrationState::Activated;
                Err(e)
            }
            Err(e) => {
                tracing::error!(generation = %self.agent.version(), error = %e, "install failed");
                self.state = RegistrationState::Redundant;
                Err(e)
            }
        }
    }

    /// Run the activate handler. Only an installed version can activate.
    pub async fn activate(&mut self) -> Result<ActivateReport, Error> {
        if !matches!(self.state, RegistrationState::Installed | RegistrationState::Activated) {
            return Err(Error::InvalidState(format!("cannot activate while {}", self.state)));
        }

        let previous = self.state;
        self.state = RegistrationState::Activating;
        match self.agent.activate(ActivateEvent).await {
            Ok(report) => {
                self.state = RegistrationState::Activated;
                Ok(report)
            }
            Err(e) => {
                self.state = previous;
                Err(e)
            }
        }
    }

    /// Route a page request. Requests are left to the host until the
    /// registration controls clients.
    pub async fn dispatch_fetch(&self, request: Request) -> FetchDecision {
        if !self.controls_clients() {
            return FetchDecision::Bypass;
        }
        self.agent.handle_fetch(FetchEvent::new(request)).await
    }
}
