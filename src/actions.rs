use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::stream::{self, Stream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::catalog::{self, DisplayRow};
use crate::error::FlatpakError;
use crate::flatpak::{
    CancellationToken, ErrorPolicy, Operation, PackageService, RefDescriptor, RefId, RefKind, Transaction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Install,
    Uninstall,
    UpdateAll,
    InstallFromFile,
}

impl ActionKind {
    pub fn title(&self) -> &'static str {
        match self {
            ActionKind::Install => "Install",
            ActionKind::Uninstall => "Uninstall",
            ActionKind::UpdateAll => "Update All",
            ActionKind::InstallFromFile => "Install from File",
        }
    }

    fn progressive(&self) -> &'static str {
        match self {
            ActionKind::Install | ActionKind::InstallFromFile => "Installing",
            ActionKind::Uninstall => "Uninstalling",
            ActionKind::UpdateAll => "Updating",
        }
    }

    pub fn started_text(&self) -> String {
        match self {
            ActionKind::InstallFromFile => "Installing from file...".to_string(),
            _ => format!("{}...", self.progressive()),
        }
    }

    pub fn operation_text(&self, name: &str) -> String {
        format!("{}: {}", self.progressive(), name)
    }

    pub fn operation_failed_text(&self, name: &str) -> String {
        let participle = match self {
            ActionKind::Install | ActionKind::InstallFromFile => "installed",
            ActionKind::Uninstall => "uninstalled",
            ActionKind::UpdateAll => "updated",
        };
        format!("Not {}: {}", participle, name)
    }

    pub fn completed_text(&self) -> String {
        format!("{} completed!", self.progressive())
    }

    pub fn failed_text(&self) -> &'static str {
        match self {
            ActionKind::Install | ActionKind::InstallFromFile => "Error at installation!",
            ActionKind::Uninstall => "Error at uninstalling!",
            ActionKind::UpdateAll => "Error at updating!",
        }
    }

    pub fn cancelled_text(&self) -> String {
        format!("{} canceled!", self.progressive())
    }

    /// Single-target actions refresh one row and abort when their own target fails.
    pub fn is_single_target(&self) -> bool {
        matches!(self, ActionKind::Install | ActionKind::Uninstall | ActionKind::InstallFromFile)
    }
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    Install { id: RefId, remote: String },
    Uninstall { id: RefId },
    UpdateAll,
    InstallFromFile { descriptor: RefDescriptor, bytes: Vec<u8> },
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::Install { .. } => ActionKind::Install,
            ActionRequest::Uninstall { .. } => ActionKind::Uninstall,
            ActionRequest::UpdateAll => ActionKind::UpdateAll,
            ActionRequest::InstallFromFile { .. } => ActionKind::InstallFromFile,
        }
    }

    /// Application ID of the primary target, if the action has one.
    pub fn primary(&self) -> Option<&str> {
        match self {
            ActionRequest::Install { id, .. } | ActionRequest::Uninstall { id } => Some(&id.name),
            ActionRequest::InstallFromFile { descriptor, .. } => Some(&descriptor.name),
            ActionRequest::UpdateAll => None,
        }
    }

    pub fn label(&self) -> String {
        match self.primary() {
            Some(name) => format!("{}: {}", self.kind().title(), name),
            None => self.kind().title().to_string(),
        }
    }
}

/// Session values an action needs once it left the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    pub remote_name: String,
    pub default_arch: String,
}

/// How the catalog should change once an action finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh {
    None,
    Row { id: RefId, row: DisplayRow },
    Remove(RefId),
    Catalog(Vec<DisplayRow>),
    Failed(FlatpakError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    pub kind: ActionKind,
    pub primary: Option<String>,
    pub succeeded: bool,
    pub cancelled: bool,
    pub failed: Vec<(String, String)>,
    pub refresh: Refresh,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionEvent {
    Status(String),
    /// Fraction in `0.0..=1.0` for the running operation.
    Progress(f32),
    Finished(ActionReport),
}

const OUTCOME_PENDING: u8 = 0;
const OUTCOME_DONE: u8 = 1;
const OUTCOME_FAILED: u8 = 2;

/// Result of the primary target, as seen through its own done/error event.
#[derive(Clone, Default)]
struct PrimaryOutcome(Arc<AtomicU8>);

impl PrimaryOutcome {
    fn set(&self, value: u8) {
        self.0.store(value, Ordering::SeqCst);
    }

    fn get(&self) -> u8 {
        self.0.load(Ordering::SeqCst)
    }
}

fn send(tx: &UnboundedSender<ActionEvent>, event: ActionEvent) {
    // the receiving panel may already be closed
    if tx.send(event).is_err() {
        log::trace!("action event dropped, receiver is gone");
    }
}

/// Extension refs (`<app>.Locale`, `<app>.Debug`) that go away with the app.
fn related_refs(service: &dyn PackageService, id: &RefId) -> Vec<RefId> {
    let prefix = format!("{}.", id.name);
    match service.list_installed() {
        Ok(installed) => installed
            .into_iter()
            .filter(|r| r.kind == RefKind::Runtime && r.id.arch == id.arch)
            .filter(|r| {
                r.id.name
                    .strip_prefix(&prefix)
                    .map_or(false, |suffix| matches!(suffix, "Locale" | "Debug"))
            })
            .map(|r| r.id)
            .collect(),
        Err(err) => {
            log::warn!("could not look up extensions of {}: {}", id, err);
            Vec::new()
        }
    }
}

fn build_transaction(service: &dyn PackageService, request: &ActionRequest) -> Result<Transaction, FlatpakError> {
    let mut transaction = Transaction::new();
    match request {
        ActionRequest::Install { id, remote } => transaction.add_install(remote, id.clone()),
        ActionRequest::Uninstall { id } => {
            for related in related_refs(service, id) {
                transaction.add_uninstall(related);
            }
            transaction.add_uninstall(id.clone());
        }
        ActionRequest::UpdateAll => {
            for installed in service.list_updates()? {
                transaction.add_update(installed.id);
            }
        }
        ActionRequest::InstallFromFile { descriptor, bytes } => {
            transaction.add_install_from_ref_bytes(descriptor.clone(), bytes.clone())
        }
    }
    Ok(transaction)
}

fn subscribe(transaction: &mut Transaction, request: &ActionRequest, tx: &UnboundedSender<ActionEvent>) -> PrimaryOutcome {
    let kind = request.kind();
    let primary = request.primary().map(str::to_string);
    let outcome = PrimaryOutcome::default();

    let start_tx = tx.clone();
    transaction.on_operation_start(move |op| {
        send(&start_tx, ActionEvent::Status(kind.operation_text(op.name())));
        send(&start_tx, ActionEvent::Progress(0.0));
    });

    let progress_tx = tx.clone();
    transaction.on_progress_changed(move |_, percent| {
        send(&progress_tx, ActionEvent::Progress(percent.min(100) as f32 / 100.0));
    });

    let done_outcome = outcome.clone();
    let done_primary = primary.clone();
    transaction.on_operation_done(move |op: &Operation| {
        if done_primary.as_deref() == Some(op.name()) {
            done_outcome.set(OUTCOME_DONE);
        }
    });

    let error_tx = tx.clone();
    let error_outcome = outcome.clone();
    transaction.on_operation_error(move |op, err| {
        log::warn!("{}", kind.operation_failed_text(op.name()));
        send(&error_tx, ActionEvent::Status(kind.operation_failed_text(op.name())));
        if primary.as_deref() == Some(op.name()) {
            error_outcome.set(OUTCOME_FAILED);
            if kind.is_single_target() {
                log::debug!("primary target failed: {}", err);
                return ErrorPolicy::Abort;
            }
        }
        ErrorPolicy::Continue
    });

    outcome
}

fn refresh_after(service: &dyn PackageService, request: &ActionRequest, ctx: &ActionContext) -> Refresh {
    let id = match request {
        ActionRequest::Install { id, .. } | ActionRequest::Uninstall { id } => id,
        ActionRequest::UpdateAll => {
            return match catalog::load_catalog(service, &ctx.remote_name, &ctx.default_arch) {
                Ok(rows) => Refresh::Catalog(rows),
                Err(err) => Refresh::Failed(err),
            }
        }
        ActionRequest::InstallFromFile { descriptor, .. } => return installed_from(service, descriptor, ctx),
    };
    match catalog::lookup_row(service, &ctx.remote_name, id) {
        Ok(Some(row)) => Refresh::Row { id: id.clone(), row },
        Ok(None) => Refresh::Remove(id.clone()),
        Err(err) => Refresh::Failed(err),
    }
}

/// Row of the application a descriptor just installed. The descriptor names
/// no architecture, so the default one is assumed.
fn installed_from(service: &dyn PackageService, descriptor: &RefDescriptor, ctx: &ActionContext) -> Refresh {
    let installed = match service.list_installed() {
        Ok(installed) => installed,
        Err(err) => return Refresh::Failed(err),
    };
    installed
        .into_iter()
        .find(|r| {
            r.kind == RefKind::App
                && r.id.name == descriptor.name
                && r.id.arch == ctx.default_arch
                && descriptor.branch.as_ref().map_or(true, |branch| &r.id.branch == branch)
        })
        .map_or(Refresh::None, |r| Refresh::Row {
            row: DisplayRow::from_installed(&r),
            id: r.id,
        })
}

/// Runs `request` to completion on the calling thread, streaming events into `tx`.
///
/// The last event sent is always `Finished`, carrying the same report that is
/// returned.
pub fn execute(
    service: &dyn PackageService,
    request: &ActionRequest,
    ctx: &ActionContext,
    cancel: &CancellationToken,
    tx: &UnboundedSender<ActionEvent>,
) -> ActionReport {
    let kind = request.kind();
    log::info!("starting {}", request.label());
    send(tx, ActionEvent::Status(kind.started_text()));

    let mut report = ActionReport {
        kind,
        primary: request.primary().map(str::to_string),
        succeeded: false,
        cancelled: false,
        failed: Vec::new(),
        refresh: Refresh::None,
    };

    let result = build_transaction(service, request).and_then(|mut transaction| {
        if transaction.is_empty() {
            log::info!("nothing to do for {}", request.label());
        } else {
            log::debug!("{} operation(s) queued", transaction.operations().len());
        }
        let outcome = subscribe(&mut transaction, request, tx);
        transaction.run(service, cancel).map(|summary| (summary, outcome))
    });

    let status = match result {
        Ok((summary, outcome)) => {
            if !summary.is_clean() {
                log::warn!("{} operation(s) failed during {}", summary.failed.len(), request.label());
            }
            report.succeeded = !kind.is_single_target() || outcome.get() == OUTCOME_DONE;
            report.failed = summary.failed;
            if report.succeeded {
                kind.completed_text()
            } else {
                kind.failed_text().to_string()
            }
        }
        Err(FlatpakError::Cancelled) => {
            report.cancelled = true;
            kind.cancelled_text()
        }
        Err(err) => {
            log::error!("{} failed: {}", request.label(), err);
            if let FlatpakError::TransactionAborted { name, reason } = &err {
                report.failed.push((name.clone(), reason.clone()));
            }
            kind.failed_text().to_string()
        }
    };

    send(tx, ActionEvent::Progress(if report.succeeded { 1.0 } else { 0.0 }));
    send(tx, ActionEvent::Status(status));
    report.refresh = refresh_after(service, request, ctx);
    log::info!(
        "{} finished (succeeded: {}, cancelled: {})",
        request.label(),
        report.succeeded,
        report.cancelled
    );
    send(tx, ActionEvent::Finished(report.clone()));
    report
}

/// Starts `request` on a blocking tokio task; must be called inside a runtime.
pub fn spawn(
    service: Arc<dyn PackageService>,
    request: ActionRequest,
    ctx: ActionContext,
    cancel: CancellationToken,
) -> UnboundedReceiver<ActionEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        execute(service.as_ref(), &request, &ctx, &cancel, &tx);
    });
    rx
}

enum StreamState {
    Pending {
        service: Arc<dyn PackageService>,
        request: ActionRequest,
        ctx: ActionContext,
        cancel: CancellationToken,
    },
    Running(UnboundedReceiver<ActionEvent>),
}

/// Action events as a stream; the task is spawned on first poll.
pub fn event_stream(
    service: Arc<dyn PackageService>,
    request: ActionRequest,
    ctx: ActionContext,
    cancel: CancellationToken,
) -> impl Stream<Item = ActionEvent> + Send + 'static {
    let initial = StreamState::Pending {
        service,
        request,
        ctx,
        cancel,
    };
    stream::unfold(initial, |state| async move {
        let mut rx = match state {
            StreamState::Pending {
                service,
                request,
                ctx,
                cancel,
            } => spawn(service, request, ctx, cancel),
            StreamState::Running(rx) => rx,
        };
        rx.recv().await.map(|event| (event, StreamState::Running(rx)))
    })
}
