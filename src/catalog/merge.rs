use std::collections::HashSet;

use crate::catalog::row::DisplayRow;
use crate::flatpak::{InstalledRef, PackageRef, RefId, RefKind, RemoteRef};

/// Merges installed and remote references into one list, one entry per
/// `(name, arch, branch)`.
///
/// Installed entries come first and win over remote entries with the same
/// identity. Kind and architecture are not looked at here.
pub fn merge(installed: Vec<InstalledRef>, remote: Vec<RemoteRef>) -> Vec<PackageRef> {
    let mut seen: HashSet<RefId> = HashSet::with_capacity(installed.len() + remote.len());
    let mut merged = Vec::with_capacity(installed.len() + remote.len());

    for entry in installed {
        if seen.insert(entry.id.clone()) {
            merged.push(PackageRef::Installed(entry));
        }
    }
    for entry in remote {
        if seen.insert(entry.id.clone()) {
            merged.push(PackageRef::Remote(entry));
        }
    }

    merged
}

/// Only applications for the host architecture are shown.
pub fn is_displayable(entry: &PackageRef, default_arch: &str) -> bool {
    entry.kind() == RefKind::App && entry.id().arch == default_arch
}

pub fn build_rows(entries: &[PackageRef], default_arch: &str) -> Vec<DisplayRow> {
    entries
        .iter()
        .filter(|entry| is_displayable(entry, default_arch))
        .map(DisplayRow::from_ref)
        .collect()
}
