use std::collections::HashSet;
use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use tempfile::NamedTempFile;

use crate::config::Installation;
use crate::error::FlatpakError;
use crate::utils::{parse_human_size, parse_progress_percent, run_flatpak};

pub mod descriptor;
pub mod refs;
pub mod transaction;

pub use descriptor::RefDescriptor;
pub use refs::{InstalledRef, PackageRef, RefId, RefKind, RemoteRef};
pub use transaction::{
    CancellationToken, ErrorPolicy, Operation, OperationKind, ProgressReporter, Transaction, TransactionSummary,
};

/// The package-installation service the catalog and the actions sit on.
#[cfg_attr(test, mockall::automock)]
pub trait PackageService: Send + Sync {
    fn default_arch(&self) -> Result<String, FlatpakError>;
    fn list_installed(&self) -> Result<Vec<InstalledRef>, FlatpakError>;
    fn list_remote(&self, remote: &str) -> Result<Vec<RemoteRef>, FlatpakError>;
    /// Installed references that have an update pending.
    fn list_updates(&self) -> Result<Vec<InstalledRef>, FlatpakError>;
    fn launch(&self, id: &RefId) -> Result<(), FlatpakError>;
    /// Extra `Key: Value` metadata for the info window.
    fn details(&self, entry: &PackageRef) -> Result<Vec<(String, String)>, FlatpakError>;
    /// Runs one operation to completion, reporting percentages as they appear.
    fn run_operation(
        &self,
        operation: &Operation,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), FlatpakError>;
}

const INSTALLED_COLUMNS: &str = "--columns=application,arch,branch,origin,size,name,version,active,latest";
const REMOTE_COLUMNS: &str = "--columns=application,arch,branch,download-size,installed-size,commit";

/// `PackageService` backed by the `flatpak` command-line tool.
pub struct FlatpakCli {
    installation: Installation,
}

impl FlatpakCli {
    pub fn new(installation: Installation) -> Result<Self, FlatpakError> {
        log::debug!("checking that flatpak is available");
        let version = run_flatpak(&["--version"])?;
        log::info!("using {} ({} installation)", version.trim(), installation.as_str());
        Ok(Self { installation })
    }

    fn scope(&self) -> &'static str {
        self.installation.flag()
    }

    fn list_installed_kind(&self, kind: RefKind) -> Result<Vec<InstalledRef>, FlatpakError> {
        let output = run_flatpak(&["list", self.scope(), kind.list_flag(), INSTALLED_COLUMNS])?;
        Ok(parse_installed_table(&output, kind))
    }

    fn list_remote_kind(&self, remote: &str, kind: RefKind) -> Result<Vec<RemoteRef>, FlatpakError> {
        let output = run_flatpak(&["remote-ls", self.scope(), kind.list_flag(), REMOTE_COLUMNS, remote])?;
        Ok(parse_remote_table(&output, kind, remote))
    }

    /// Command-line arguments for `operation`. The temporary descriptor, if
    /// any, is deleted when the returned guard is dropped.
    fn operation_args(&self, operation: &Operation) -> Result<(Vec<String>, Option<NamedTempFile>), FlatpakError> {
        let mut descriptor_file = None;
        let mut args = match operation {
            Operation::Install { id, remote } => vec!["install".to_string(), remote.clone(), id.to_string()],
            Operation::Uninstall { id } => vec!["uninstall".to_string(), id.to_string()],
            Operation::Update { id } => vec!["update".to_string(), id.to_string()],
            Operation::InstallFromRef { descriptor, bytes } => {
                let file = write_descriptor(&descriptor.name, bytes)?;
                let path = file.path().display().to_string();
                descriptor_file = Some(file);
                vec!["install".to_string(), "--from".to_string(), path]
            }
        };
        args.insert(1, self.scope().to_string());
        args.insert(2, "--noninteractive".to_string());
        args.insert(3, "-y".to_string());
        Ok((args, descriptor_file))
    }
}

fn write_descriptor(name: &str, bytes: &[u8]) -> Result<NamedTempFile, FlatpakError> {
    let failed = |e: std::io::Error| FlatpakError::ReadFailed {
        path: format!("{}.flatpakref", name),
        reason: e.to_string(),
    };
    let mut file = tempfile::Builder::new()
        .prefix(&format!("flatnest-{}-", name))
        .suffix(".flatpakref")
        .tempfile()
        .map_err(failed)?;
    file.write_all(bytes).map_err(failed)?;
    file.flush().map_err(failed)?;
    Ok(file)
}

/// Waits for `child` on a background thread so it never lingers as a zombie.
fn reap(mut child: Child, label: String) -> JoinHandle<Option<ExitStatus>> {
    std::thread::spawn(move || match child.wait() {
        Ok(status) => {
            log::debug!("{} exited with {}", label, status);
            Some(status)
        }
        Err(e) => {
            log::warn!("could not wait for {}: {}", label, e);
            None
        }
    })
}

/// Runs `command` to completion, feeding percentages from its stdout to
/// `progress`. Stderr is drained concurrently and its last line becomes the
/// failure reason.
fn drive(mut command: Command, name: &str, progress: &ProgressReporter, cancel: &CancellationToken) -> Result<(), FlatpakError> {
    let mut child = command.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;

    let stderr_reader = child.stderr.take().map(|mut err| {
        std::thread::spawn(move || {
            let mut text = String::new();
            let _ = err.read_to_string(&mut text);
            text
        })
    });
    let collect_stderr = |reader: Option<JoinHandle<String>>| reader.and_then(|h| h.join().ok()).unwrap_or_default();

    // flatpak redraws its progress line with carriage returns
    if let Some(mut stdout) = child.stdout.take() {
        let mut buf = [0u8; 512];
        let mut line = Vec::new();
        loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                collect_stderr(stderr_reader);
                return Err(FlatpakError::Cancelled);
            }
            let read = stdout.read(&mut buf)?;
            if read == 0 {
                break;
            }
            for &byte in &buf[..read] {
                if byte == b'\r' || byte == b'\n' {
                    if let Some(pct) = parse_progress_percent(&String::from_utf8_lossy(&line)) {
                        progress.report(pct);
                    }
                    line.clear();
                } else {
                    line.push(byte);
                }
            }
        }
    }

    let status = child.wait()?;
    let stderr = collect_stderr(stderr_reader);
    if status.success() {
        progress.report(100);
        Ok(())
    } else {
        Err(FlatpakError::OperationFailed {
            name: name.to_string(),
            reason: last_line(&stderr).unwrap_or_else(|| format!("exit code {:?}", status.code())),
        })
    }
}

impl PackageService for FlatpakCli {
    fn default_arch(&self) -> Result<String, FlatpakError> {
        let arch = run_flatpak(&["--default-arch"])?.trim().to_string();
        if arch.is_empty() {
            return Err(FlatpakError::Parse("empty default architecture".to_string()));
        }
        Ok(arch)
    }

    fn list_installed(&self) -> Result<Vec<InstalledRef>, FlatpakError> {
        let mut refs = self.list_installed_kind(RefKind::App)?;
        refs.extend(self.list_installed_kind(RefKind::Runtime)?);
        log::debug!("{} installed references", refs.len());
        Ok(refs)
    }

    fn list_remote(&self, remote: &str) -> Result<Vec<RemoteRef>, FlatpakError> {
        let mut refs = self.list_remote_kind(remote, RefKind::App)?;
        refs.extend(self.list_remote_kind(remote, RefKind::Runtime)?);
        log::debug!("{} references in remote {}", refs.len(), remote);
        Ok(refs)
    }

    fn list_updates(&self) -> Result<Vec<InstalledRef>, FlatpakError> {
        let output = run_flatpak(&["remote-ls", self.scope(), "--updates", "--columns=application,arch,branch"])?;
        let pending: HashSet<RefId> = output.lines().filter_map(|line| table_id(&split_row(line))).collect();
        let updates: Vec<InstalledRef> = self
            .list_installed()?
            .into_iter()
            .filter(|r| pending.contains(&r.id))
            .collect();
        log::debug!("{} references have updates", updates.len());
        Ok(updates)
    }

    fn launch(&self, id: &RefId) -> Result<(), FlatpakError> {
        log::info!("launching {}", id);
        Command::new("flatpak")
            .arg("run")
            .arg(format!("--arch={}", id.arch))
            .arg(format!("--branch={}", id.branch))
            .arg(&id.name)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|child| {
                reap(child, id.name.clone());
            })
            .map_err(|e| {
                log::warn!("could not launch {}: {}", id, e);
                FlatpakError::LaunchFailed(id.name.clone())
            })
    }

    fn details(&self, entry: &PackageRef) -> Result<Vec<(String, String)>, FlatpakError> {
        let full_ref = entry.id().format_ref(entry.kind());
        let output = match entry {
            PackageRef::Installed(_) => run_flatpak(&["info", self.scope(), &full_ref])?,
            PackageRef::Remote(r) => run_flatpak(&["remote-info", self.scope(), &r.remote_name, &full_ref])?,
        };
        Ok(parse_details(&output))
    }

    fn run_operation(
        &self,
        operation: &Operation,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), FlatpakError> {
        let (args, _descriptor_file) = self.operation_args(operation)?;
        log::debug!("{:?} {}: flatpak {}", operation.kind(), operation.name(), args.join(" "));
        let mut command = Command::new("flatpak");
        command.args(&args).env("LC_ALL", "C");
        drive(command, operation.name(), progress, cancel)
    }
}

fn split_row(line: &str) -> Vec<&str> {
    line.split('\t').map(str::trim).collect()
}

fn non_empty(value: Option<&&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(|v| v.to_string())
}

/// Identity from the first three columns; header and blank rows yield `None`.
fn table_id(fields: &[&str]) -> Option<RefId> {
    if fields.len() < 3 || fields[0] == "Application ID" {
        return None;
    }
    if fields[..3].iter().any(|f| f.is_empty() || f.contains(' ')) {
        return None;
    }
    Some(RefId::new(fields[0], fields[1], fields[2]))
}

fn parse_installed_table(output: &str, kind: RefKind) -> Vec<InstalledRef> {
    output
        .lines()
        .filter_map(|line| {
            let fields = split_row(line);
            let id = table_id(&fields)?;
            Some(InstalledRef {
                kind,
                id,
                origin: fields.get(3).map(|s| s.to_string()).unwrap_or_default(),
                installed_size: fields.get(4).and_then(|s| parse_human_size(s)),
                appdata_name: non_empty(fields.get(5)),
                version: non_empty(fields.get(6)),
                commit: non_empty(fields.get(7)),
                latest_commit: non_empty(fields.get(8)),
            })
        })
        .collect()
}

fn parse_remote_table(output: &str, kind: RefKind, remote: &str) -> Vec<RemoteRef> {
    output
        .lines()
        .filter_map(|line| {
            let fields = split_row(line);
            let id = table_id(&fields)?;
            Some(RemoteRef {
                kind,
                id,
                remote_name: remote.to_string(),
                download_size: fields.get(3).and_then(|s| parse_human_size(s)),
                installed_size: fields.get(4).and_then(|s| parse_human_size(s)),
                commit: non_empty(fields.get(5)),
            })
        })
        .collect()
}

/// Output of `flatpak info` / `remote-info`: a `Name - Summary` headline
/// followed by `Key: Value` lines.
fn parse_details(output: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let headline = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| !line.contains(':'));
    if let Some((name, summary)) = headline.and_then(|line| line.split_once(" - ")) {
        pairs.push(("Name".to_string(), name.trim().to_string()));
        pairs.push(("Summary".to_string(), summary.trim().to_string()));
    }
    pairs.extend(parse_key_values(output));
    pairs
}

fn parse_key_values(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty() && key.split_whitespace().count() <= 3)
        .collect()
}

fn last_line(text: &str) -> Option<String> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_installed_list_rows() {
        let output = "org.gnome.Maps\tx86_64\tstable\tflathub\t10.5 MB\tMaps\t45.1\t1a2b3c\t1a2b3c\n\
                      org.gimp.GIMP\tx86_64\tstable\tflathub\t300 MB\t\t\t\t\n";
        let refs = parse_installed_table(output, RefKind::App);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, RefId::new("org.gnome.Maps", "x86_64", "stable"));
        assert_eq!(refs[0].origin, "flathub");
        assert_eq!(refs[0].installed_size, Some(10_500_000));
        assert_eq!(refs[0].appdata_name.as_deref(), Some("Maps"));
        assert_eq!(refs[1].appdata_name, None);
        assert_eq!(refs[1].version, None);
    }

    #[test]
    fn skips_header_and_blank_rows() {
        let output = "Application ID\tArch\tBranch\tDownload\tInstalled\tCommit\n\
                      \n\
                      org.gnome.Maps\tx86_64\tstable\t5.0 MB\t12.0 MB\tabc123\n";
        let refs = parse_remote_table(output, RefKind::App, "flathub");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].remote_name, "flathub");
        assert_eq!(refs[0].download_size, Some(5_000_000));
        assert_eq!(refs[0].installed_size, Some(12_000_000));
        assert_eq!(refs[0].commit.as_deref(), Some("abc123"));
    }

    #[test]
    fn parses_info_key_values() {
        let output = "\nMaps - Find places around the world\n\n\
                      ID: org.gnome.Maps\n\
                      Ref: app/org.gnome.Maps/x86_64/stable\n\
                      License: GPL-2.0+\n\
                      Installed Size: 10.5 MB\n";
        let pairs = parse_key_values(output);
        assert!(pairs.contains(&("License".to_string(), "GPL-2.0+".to_string())));
        assert!(pairs.contains(&("Installed Size".to_string(), "10.5 MB".to_string())));
        assert!(pairs.iter().all(|(k, _)| k != "Maps - Find places around the world"));

        let details = parse_details(output);
        assert_eq!(details[0], ("Name".to_string(), "Maps".to_string()));
        assert_eq!(details[1], ("Summary".to_string(), "Find places around the world".to_string()));
    }

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    fn recording() -> (ProgressReporter, std::sync::Arc<std::sync::Mutex<Vec<u32>>>) {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        (ProgressReporter::new(move |pct| sink.lock().unwrap().push(pct)), seen)
    }

    #[test]
    fn descriptor_file_is_removed_with_its_guard() {
        let cli = FlatpakCli {
            installation: Installation::User,
        };
        let operation = Operation::InstallFromRef {
            descriptor: RefDescriptor {
                name: "org.gnome.Maps".into(),
                branch: None,
                title: None,
                url: None,
                is_runtime: false,
            },
            bytes: b"[Flatpak Ref]\nName=org.gnome.Maps\n".to_vec(),
        };
        let (args, guard) = cli.operation_args(&operation).unwrap();
        assert_eq!(&args[..4], &["install", "--user", "--noninteractive", "-y"]);
        let path = std::path::PathBuf::from(args.last().unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[Flatpak Ref]\nName=org.gnome.Maps\n");

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn plain_operations_need_no_descriptor_file() {
        let cli = FlatpakCli {
            installation: Installation::System,
        };
        let operation = Operation::Uninstall {
            id: RefId::new("org.gnome.Maps", "x86_64", "stable"),
        };
        let (args, guard) = cli.operation_args(&operation).unwrap();
        assert!(guard.is_none());
        assert_eq!(args.last().unwrap(), "org.gnome.Maps/x86_64/stable");
    }

    #[test]
    fn noisy_stderr_does_not_stall_progress() {
        // well past a pipe buffer of warnings before any progress appears
        let script = "i=0; while [ $i -lt 3000 ]; do echo \"Warning: line $i of runtime noise\" >&2; i=$((i+1)); done; printf '42%%\\r'; printf '100%%\\n'";
        let (progress, seen) = recording();
        drive(sh(script), "org.gnome.Maps", &progress, &CancellationToken::new()).unwrap();
        let seen = seen.lock().unwrap();
        assert!(seen.contains(&42));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn failure_reason_is_last_stderr_line() {
        let err = drive(
            sh("echo 'Looking for matches' >&2; echo 'error: No remote refs found' >&2; exit 1"),
            "org.gnome.Maps",
            &ProgressReporter::silent(),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            FlatpakError::OperationFailed {
                name: "org.gnome.Maps".into(),
                reason: "error: No remote refs found".into(),
            }
        );
    }

    #[test]
    fn cancelled_token_kills_the_child() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = drive(sh("sleep 30"), "org.gnome.Maps", &ProgressReporter::silent(), &cancel).unwrap_err();
        assert_eq!(err, FlatpakError::Cancelled);
    }

    #[test]
    fn reaped_child_reports_its_exit_status() {
        let child = Command::new("true").spawn().unwrap();
        let status = reap(child, "true".into()).join().unwrap();
        assert!(status.unwrap().success());
    }

    #[test]
    fn last_line_ignores_trailing_blank_lines() {
        assert_eq!(last_line("warning\nerror: No remote refs found\n\n"), Some("error: No remote refs found".to_string()));
        assert_eq!(last_line(""), None);
    }
}
