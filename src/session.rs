use std::sync::Arc;

use crate::actions::{ActionContext, ActionKind};
use crate::config::Config;
use crate::error::FlatpakError;
use crate::flatpak::{CancellationToken, FlatpakCli, PackageService};

#[derive(Debug, Clone)]
struct ActiveAction {
    ticket: u64,
    kind: ActionKind,
    cancel: CancellationToken,
}

/// Process-wide state shared by every window: the service handle, the
/// configuration and the actions currently running.
pub struct Session {
    service: Arc<dyn PackageService>,
    config: Config,
    default_arch: String,
    next_ticket: u64,
    active: Vec<ActiveAction>,
}

impl Session {
    /// Connects to the `flatpak` binary for the configured installation.
    pub fn connect(config: Config) -> Result<Self, FlatpakError> {
        let service = FlatpakCli::new(config.installation)?;
        Self::with_service(Arc::new(service), config)
    }

    pub fn with_service(service: Arc<dyn PackageService>, config: Config) -> Result<Self, FlatpakError> {
        let default_arch = service.default_arch()?;
        log::debug!("default architecture is {}", default_arch);
        Ok(Self {
            service,
            config,
            default_arch,
            next_ticket: 0,
            active: Vec::new(),
        })
    }

    pub fn service(&self) -> Arc<dyn PackageService> {
        Arc::clone(&self.service)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn default_arch(&self) -> &str {
        &self.default_arch
    }

    pub fn remote_name(&self) -> &str {
        &self.config.remote_name
    }

    pub fn context(&self) -> ActionContext {
        ActionContext {
            remote_name: self.config.remote_name.clone(),
            default_arch: self.default_arch.clone(),
        }
    }

    /// Registers a new action. Only one update-all may run at a time.
    pub fn begin(&mut self, kind: ActionKind) -> Result<(u64, CancellationToken), FlatpakError> {
        if kind == ActionKind::UpdateAll && self.is_updating_all() {
            log::warn!("refusing a second update of all applications");
            return Err(FlatpakError::ActionInProgress);
        }
        self.next_ticket += 1;
        let cancel = CancellationToken::new();
        self.active.push(ActiveAction {
            ticket: self.next_ticket,
            kind,
            cancel: cancel.clone(),
        });
        log::debug!("action #{} ({}) registered", self.next_ticket, kind.title());
        Ok((self.next_ticket, cancel))
    }

    pub fn finish(&mut self, ticket: u64) {
        self.active.retain(|action| action.ticket != ticket);
    }

    /// Requests cancellation; the action still reports `Finished` on its own.
    pub fn cancel(&self, ticket: u64) -> bool {
        match self.active.iter().find(|action| action.ticket == ticket) {
            Some(action) => {
                log::info!("cancelling action #{}", ticket);
                action.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for action in &self.active {
            action.cancel.cancel();
        }
    }

    pub fn is_updating_all(&self) -> bool {
        self.active.iter().any(|action| action.kind == ActionKind::UpdateAll)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("default_arch", &self.default_arch)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatpak::MockPackageService;

    fn session() -> Session {
        let mut service = MockPackageService::new();
        service.expect_default_arch().returning(|| Ok("x86_64".to_string()));
        Session::with_service(Arc::new(service), Config::default()).unwrap()
    }

    #[test]
    fn second_update_all_is_refused_until_first_finishes() {
        let mut session = session();
        let (ticket, _) = session.begin(ActionKind::UpdateAll).unwrap();
        assert!(session.is_updating_all());
        assert_eq!(session.begin(ActionKind::UpdateAll).unwrap_err(), FlatpakError::ActionInProgress);
        assert!(session.begin(ActionKind::Install).is_ok());

        session.finish(ticket);
        assert!(!session.is_updating_all());
        assert!(session.begin(ActionKind::UpdateAll).is_ok());
    }

    #[test]
    fn cancel_reaches_the_action_token() {
        let mut session = session();
        let (ticket, token) = session.begin(ActionKind::UpdateAll).unwrap();
        let (_, other) = session.begin(ActionKind::Install).unwrap();
        assert!(session.cancel(ticket));
        assert!(token.is_cancelled());
        assert!(!other.is_cancelled());
        assert!(!session.cancel(999));

        session.cancel_all();
        assert!(other.is_cancelled());
    }

    #[test]
    fn context_carries_remote_and_arch() {
        let session = session();
        let ctx = session.context();
        assert_eq!(ctx.remote_name, "flathub");
        assert_eq!(ctx.default_arch, "x86_64");
    }
}
