use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tokio::sync::mpsc;

use crate::actions::{self, ActionEvent, ActionRequest};
use crate::catalog::{self, CatalogStore, SortColumn, SortOrder};
use crate::flatpak::{CancellationToken, PackageRef, RefId, RefKind};
use crate::info;
use crate::session::Session;
use crate::utils::{confirm, print_error, print_info, print_success, print_warning};

#[derive(Parser)]
#[clap(name = "flatnest", version)]
#[clap(about = "A graphical manager for Flatpak applications", long_about = "A graphical manager for Flatpak applications.\n\nWithout arguments the catalog window opens. Pass a .flatpakref file to open the install window for it, or use one of the subcommands to work from the terminal.")]
pub struct Cli {
    /// .flatpakref file to install
    pub file: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short, long, parse(from_occurrences), global = true)]
    pub verbose: u8,
    /// Use the per-user installation instead of the configured one
    #[clap(long, global = true)]
    pub user: bool,
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available applications
    List {
        /// Show only installed applications
        #[clap(short, long)]
        installed: bool,
        /// Only show applications whose ID or name contains this text
        #[clap(short, long)]
        query: Option<String>,
        /// Column to sort by (real-name, arch, branch, remote, installed-size, download-size, name)
        #[clap(short, long)]
        sort: Option<SortColumn>,
        /// Sort in descending order
        #[clap(short, long)]
        descending: bool,
    },
    /// Show details about an application
    Info {
        /// Application ID, e.g. org.gnome.Maps
        app_id: String,
    },
    /// Install an application from the configured remote
    Install {
        app_id: String,
        /// Don't ask for confirmation
        #[clap(short, long)]
        yes: bool,
    },
    /// Uninstall an application
    Uninstall {
        app_id: String,
        /// Don't ask for confirmation
        #[clap(short, long)]
        yes: bool,
    },
    /// Update every installed application
    UpdateAll {
        /// Don't ask for confirmation
        #[clap(short, long)]
        yes: bool,
    },
    /// Run an installed application
    Run { app_id: String },
}

impl Commands {
    pub fn run(self, session: &Session) -> Result<()> {
        match self {
            Commands::List {
                installed,
                query,
                sort,
                descending,
            } => list(session, installed, query, sort, descending),
            Commands::Info { app_id } => {
                let entry = resolve(session, &app_id)?;
                let report = info::load(session.service().as_ref(), &entry)?;
                println!("{}", report.get("Name").unwrap_or(&report.app_id).bold().underline());
                for (key, value) in &report.fields {
                    println!("{:>15}: {}", key.bold(), value);
                }
                println!("{:>15}: {}", "Flathub".bold(), report.flathub_url());
                Ok(())
            }
            Commands::Install { app_id, yes } => {
                let entry = resolve(session, &app_id)?;
                let PackageRef::Remote(remote) = entry else {
                    print_warning(&format!("{} is already installed", app_id));
                    return Ok(());
                };
                if !yes && !confirm(&format!("Install {}?", remote.id))? {
                    print_info("Cancelled");
                    return Ok(());
                }
                run_action(
                    session,
                    ActionRequest::Install {
                        id: remote.id,
                        remote: remote.remote_name,
                    },
                )
            }
            Commands::Uninstall { app_id, yes } => {
                let entry = resolve(session, &app_id)?;
                if !entry.is_installed() {
                    bail!("{} is not installed", app_id);
                }
                if !yes && !confirm(&format!("Uninstall {}?", entry.id()))? {
                    print_info("Cancelled");
                    return Ok(());
                }
                run_action(session, ActionRequest::Uninstall { id: entry.id().clone() })
            }
            Commands::UpdateAll { yes } => {
                let pending = session.service().list_updates()?;
                if pending.is_empty() {
                    print_success("All applications are up to date");
                    return Ok(());
                }
                for installed in &pending {
                    println!("  {}", installed.id);
                }
                if !yes && !confirm(&format!("Update {} application(s)?", pending.len()))? {
                    print_info("Cancelled");
                    return Ok(());
                }
                run_action(session, ActionRequest::UpdateAll)
            }
            Commands::Run { app_id } => {
                let entry = resolve(session, &app_id)?;
                if !entry.is_installed() {
                    bail!("{} is not installed", app_id);
                }
                session.service().launch(entry.id())?;
                print_success(&format!("Started {}", app_id));
                Ok(())
            }
        }
    }
}

/// Accepts a bare application ID or a full `[app/]name/arch/branch` reference.
fn resolve(session: &Session, app_id: &str) -> Result<PackageRef> {
    if app_id.contains('/') {
        let (kind, id) = RefId::parse(app_id)?;
        if kind == Some(RefKind::Runtime) {
            bail!("{} is a runtime, not an application", app_id);
        }
        return Ok(catalog::resolve_ref(session.service().as_ref(), session.remote_name(), &id)?);
    }
    let app_id = info::validate_app_id(app_id)?;
    Ok(catalog::resolve(
        session.service().as_ref(),
        session.remote_name(),
        app_id,
        session.default_arch(),
    )?)
}

fn list(
    session: &Session,
    installed_only: bool,
    query: Option<String>,
    sort: Option<SortColumn>,
    descending: bool,
) -> Result<()> {
    let rows = catalog::load_catalog(session.service().as_ref(), session.remote_name(), session.default_arch())?;
    let mut store = CatalogStore::new(installed_only);
    store.set_rows(rows);
    if let Some(query) = query {
        store.set_query(query);
    }
    if let Some(column) = sort {
        let order = if descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        store.set_sort(column, order);
    }

    println!(
        "{}",
        format!(
            "{:<45} {:<8} {:<8} {:<10} {:>14} {:>14}  {}",
            "Real Name", "Arch", "Branch", "Remote", "Installed", "Download", "Name"
        )
        .bold()
    );
    for row in store.visible() {
        let line = format!(
            "{:<45} {:<8} {:<8} {:<10} {:>14} {:>14}  {}",
            row.real_name,
            row.arch,
            row.branch,
            row.remote_label,
            row.installed_size_label,
            row.download_size_label,
            row.friendly_name
        );
        if row.is_installed() {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
    print_info(&format!("{} of {} applications shown", store.visible_len(), store.len()));
    Ok(())
}

/// Runs one action on a worker thread and prints its events as they arrive.
fn run_action(session: &Session, request: ActionRequest) -> Result<()> {
    let service = session.service();
    let ctx = session.context();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = std::thread::spawn(move || actions::execute(service.as_ref(), &request, &ctx, &CancellationToken::new(), &tx));

    let mut progress_shown = false;
    while let Some(event) = rx.blocking_recv() {
        match event {
            ActionEvent::Status(line) => {
                if progress_shown {
                    println!();
                    progress_shown = false;
                }
                print_info(&line);
            }
            ActionEvent::Progress(fraction) => {
                print!("\r  {:>3}%", (fraction * 100.0).round() as u32);
                std::io::stdout().flush()?;
                progress_shown = true;
            }
            ActionEvent::Finished(_) => {}
        }
    }
    if progress_shown {
        println!();
    }

    let report = worker.join().map_err(|_| anyhow!("action worker panicked"))?;
    for (name, reason) in &report.failed {
        print_error(&format!("{}: {}", name, reason));
    }
    if report.succeeded {
        print_success(&report.kind.completed_text());
        Ok(())
    } else if report.cancelled {
        bail!(report.kind.cancelled_text())
    } else {
        bail!(report.kind.failed_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_argument_opens_install_window() {
        let cli = Cli::try_parse_from(["flatnest", "maps.flatpakref"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("maps.flatpakref")));
        assert!(cli.command.is_none());
    }

    #[test]
    fn list_flags_parse() {
        let cli = Cli::try_parse_from(["flatnest", "-vv", "list", "--installed", "--sort", "download-size", "-d"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Commands::List {
                installed,
                sort,
                descending,
                query,
            }) => {
                assert!(installed);
                assert!(descending);
                assert_eq!(sort, Some(SortColumn::DownloadSize));
                assert!(query.is_none());
            }
            _ => panic!("expected list subcommand"),
        }
    }

    #[test]
    fn unknown_sort_column_is_rejected() {
        assert!(Cli::try_parse_from(["flatnest", "list", "--sort", "colour"]).is_err());
    }
}
