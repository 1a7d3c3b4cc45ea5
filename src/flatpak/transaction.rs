use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::FlatpakError;
use crate::flatpak::descriptor::RefDescriptor;
use crate::flatpak::refs::RefId;
use crate::flatpak::PackageService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Install,
    Uninstall,
    Update,
    InstallFromRef,
}

/// One unit of work inside a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Install { id: RefId, remote: String },
    Uninstall { id: RefId },
    Update { id: RefId },
    InstallFromRef { descriptor: RefDescriptor, bytes: Vec<u8> },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Install { .. } => OperationKind::Install,
            Operation::Uninstall { .. } => OperationKind::Uninstall,
            Operation::Update { .. } => OperationKind::Update,
            Operation::InstallFromRef { .. } => OperationKind::InstallFromRef,
        }
    }

    /// Application ID the operation acts on.
    pub fn name(&self) -> &str {
        match self {
            Operation::Install { id, .. } | Operation::Uninstall { id } | Operation::Update { id } => &id.name,
            Operation::InstallFromRef { descriptor, .. } => &descriptor.name,
        }
    }
}

/// Cooperative cancellation shared between the UI and a running transaction.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-operation progress listener handed to the service.
///
/// Attached when an operation starts and detached when it finishes; reports
/// arriving after `detach` are dropped so they never bleed into the next
/// operation.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Arc<dyn Fn(u32) + Send + Sync>,
    attached: Arc<AtomicBool>,
    last: Arc<AtomicU32>,
}

impl ProgressReporter {
    pub fn new(callback: impl Fn(u32) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
            attached: Arc::new(AtomicBool::new(true)),
            last: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn silent() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, percent: u32) {
        if !self.is_attached() {
            return;
        }
        let percent = percent.min(100);
        self.last.store(percent, Ordering::SeqCst);
        (self.callback)(percent);
    }

    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn last_percent(&self) -> u32 {
        self.last.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("attached", &self.is_attached())
            .field("last", &self.last_percent())
            .finish()
    }
}

/// What an `on_operation_error` subscriber wants the transaction to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Continue,
    Abort,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionSummary {
    pub completed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl TransactionSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

type StartHandler = Arc<dyn Fn(&Operation) + Send + Sync>;
type DoneHandler = Arc<dyn Fn(&Operation) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&Operation, &FlatpakError) -> ErrorPolicy + Send + Sync>;
type ProgressHandler = Arc<dyn Fn(&Operation, u32) + Send + Sync>;

/// Ordered batch of operations run against a `PackageService`.
#[derive(Default)]
pub struct Transaction {
    operations: Vec<Operation>,
    on_start: Option<StartHandler>,
    on_done: Option<DoneHandler>,
    on_error: Option<ErrorHandler>,
    on_progress: Option<ProgressHandler>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_install(&mut self, remote: &str, id: RefId) {
        self.operations.push(Operation::Install {
            id,
            remote: remote.to_string(),
        });
    }

    pub fn add_uninstall(&mut self, id: RefId) {
        self.operations.push(Operation::Uninstall { id });
    }

    pub fn add_update(&mut self, id: RefId) {
        self.operations.push(Operation::Update { id });
    }

    pub fn add_install_from_ref_bytes(&mut self, descriptor: RefDescriptor, bytes: Vec<u8>) {
        self.operations.push(Operation::InstallFromRef { descriptor, bytes });
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn on_operation_start(&mut self, handler: impl Fn(&Operation) + Send + Sync + 'static) {
        self.on_start = Some(Arc::new(handler));
    }

    pub fn on_operation_done(&mut self, handler: impl Fn(&Operation) + Send + Sync + 'static) {
        self.on_done = Some(Arc::new(handler));
    }

    pub fn on_operation_error(
        &mut self,
        handler: impl Fn(&Operation, &FlatpakError) -> ErrorPolicy + Send + Sync + 'static,
    ) {
        self.on_error = Some(Arc::new(handler));
    }

    pub fn on_progress_changed(&mut self, handler: impl Fn(&Operation, u32) + Send + Sync + 'static) {
        self.on_progress = Some(Arc::new(handler));
    }

    /// Runs every operation in order, blocking the calling thread.
    ///
    /// Failed operations are handed to the error subscriber; without one the
    /// transaction aborts on the first failure.
    pub fn run(
        &self,
        service: &dyn PackageService,
        cancel: &CancellationToken,
    ) -> Result<TransactionSummary, FlatpakError> {
        let mut summary = TransactionSummary::default();

        for operation in &self.operations {
            if cancel.is_cancelled() {
                log::info!("transaction cancelled before {}", operation.name());
                return Err(FlatpakError::Cancelled);
            }

            if let Some(handler) = &self.on_start {
                handler(operation);
            }
            let reporter = self.attach_progress(operation);
            let result = service.run_operation(operation, &reporter, cancel);
            reporter.detach();

            match result {
                Ok(()) => {
                    log::debug!("operation on {} done", operation.name());
                    summary.completed.push(operation.name().to_string());
                    if let Some(handler) = &self.on_done {
                        handler(operation);
                    }
                }
                Err(FlatpakError::Cancelled) => return Err(FlatpakError::Cancelled),
                Err(err) => {
                    log::warn!("operation on {} failed: {}", operation.name(), err);
                    let policy = self
                        .on_error
                        .as_ref()
                        .map(|handler| handler(operation, &err))
                        .unwrap_or(ErrorPolicy::Abort);
                    if policy == ErrorPolicy::Abort {
                        return Err(FlatpakError::TransactionAborted {
                            name: operation.name().to_string(),
                            reason: err.to_string(),
                        });
                    }
                    summary.failed.push((operation.name().to_string(), err.to_string()));
                }
            }
        }

        Ok(summary)
    }

    fn attach_progress(&self, operation: &Operation) -> ProgressReporter {
        match &self.on_progress {
            Some(handler) => {
                let handler = Arc::clone(handler);
                let operation = operation.clone();
                ProgressReporter::new(move |percent| handler(&operation, percent))
            }
            None => ProgressReporter::silent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatpak::MockPackageService;
    use std::sync::Mutex;

    fn maps() -> RefId {
        RefId::new("org.gnome.Maps", "x86_64", "stable")
    }

    fn gimp() -> RefId {
        RefId::new("org.gimp.GIMP", "x86_64", "stable")
    }

    #[test]
    fn events_arrive_in_service_order() {
        let mut service = MockPackageService::new();
        service.expect_run_operation().returning(|_, progress, _| {
            progress.report(40);
            progress.report(100);
            Ok(())
        });

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut transaction = Transaction::new();
        transaction.add_install("flathub", maps());
        let l = Arc::clone(&log);
        transaction.on_operation_start(move |op| l.lock().unwrap().push(format!("start {}", op.name())));
        let l = Arc::clone(&log);
        transaction.on_progress_changed(move |_, pct| l.lock().unwrap().push(format!("progress {}", pct)));
        let l = Arc::clone(&log);
        transaction.on_operation_done(move |op| l.lock().unwrap().push(format!("done {}", op.name())));

        let summary = transaction.run(&service, &CancellationToken::new()).unwrap();
        assert!(summary.is_clean());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "start org.gnome.Maps",
                "progress 40",
                "progress 100",
                "done org.gnome.Maps"
            ]
        );
    }

    #[test]
    fn stale_reporter_is_detached_after_operation() {
        let kept: Arc<Mutex<Option<ProgressReporter>>> = Arc::new(Mutex::new(None));
        let keep = Arc::clone(&kept);
        let mut service = MockPackageService::new();
        service.expect_run_operation().returning(move |_, progress, _| {
            keep.lock().unwrap().get_or_insert_with(|| progress.clone());
            Ok(())
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let mut transaction = Transaction::new();
        transaction.add_update(maps());
        transaction.add_update(gimp());
        transaction.on_progress_changed(move |op, pct| s.lock().unwrap().push((op.name().to_string(), pct)));
        transaction.run(&service, &CancellationToken::new()).unwrap();

        let stale = kept.lock().unwrap().clone().unwrap();
        assert!(!stale.is_attached());
        stale.report(77);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn error_without_subscriber_aborts() {
        let mut service = MockPackageService::new();
        service.expect_run_operation().times(1).returning(|op, _, _| {
            Err(FlatpakError::OperationFailed {
                name: op.name().to_string(),
                reason: "network".into(),
            })
        });

        let mut transaction = Transaction::new();
        transaction.add_update(maps());
        transaction.add_update(gimp());
        let err = transaction.run(&service, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, FlatpakError::TransactionAborted { ref name, .. } if name == "org.gnome.Maps"));
    }

    #[test]
    fn continue_policy_records_failure_and_moves_on() {
        let mut service = MockPackageService::new();
        service.expect_run_operation().times(2).returning(|op, _, _| {
            if op.name() == "org.gnome.Maps" {
                Err(FlatpakError::OperationFailed {
                    name: op.name().to_string(),
                    reason: "conflict".into(),
                })
            } else {
                Ok(())
            }
        });

        let mut transaction = Transaction::new();
        transaction.add_update(maps());
        transaction.add_update(gimp());
        transaction.on_operation_error(|_, _| ErrorPolicy::Continue);
        let summary = transaction.run(&service, &CancellationToken::new()).unwrap();
        assert_eq!(summary.completed, vec!["org.gimp.GIMP".to_string()]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "org.gnome.Maps");
    }

    #[test]
    fn cancellation_stops_before_next_operation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut service = MockPackageService::new();
        service.expect_run_operation().times(1).returning(move |_, _, _| {
            trigger.cancel();
            Ok(())
        });

        let mut transaction = Transaction::new();
        transaction.add_update(maps());
        transaction.add_update(gimp());
        assert_eq!(transaction.run(&service, &cancel), Err(FlatpakError::Cancelled));
    }

    #[test]
    fn operation_names_cover_descriptor_installs() {
        let descriptor = RefDescriptor {
            name: "org.gnome.Maps".into(),
            branch: None,
            title: None,
            url: None,
            is_runtime: false,
        };
        let mut transaction = Transaction::new();
        transaction.add_install_from_ref_bytes(descriptor, b"[Flatpak Ref]".to_vec());
        let op = &transaction.operations()[0];
        assert_eq!(op.name(), "org.gnome.Maps");
        assert_eq!(op.kind(), OperationKind::InstallFromRef);
    }
}
