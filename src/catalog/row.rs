use crate::catalog::sort::SortColumn;
use crate::flatpak::{InstalledRef, PackageRef, RefId, RemoteRef};
use crate::utils::format_optional_size;

/// One line of the catalog table.
///
/// Installed rows carry `installed_size_label` and a `friendly_name`; rows
/// that only exist in a remote carry `download_size_label` and an empty
/// `friendly_name`. Empty strings mean "not applicable".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub real_name: String,
    pub arch: String,
    pub branch: String,
    pub remote_label: String,
    pub installed_size_label: String,
    pub download_size_label: String,
    pub friendly_name: String,
}

impl DisplayRow {
    pub fn from_ref(entry: &PackageRef) -> Self {
        match entry {
            PackageRef::Installed(installed) => Self::from_installed(installed),
            PackageRef::Remote(remote) => Self::from_remote(remote),
        }
    }

    pub fn from_installed(installed: &InstalledRef) -> Self {
        Self {
            real_name: installed.id.name.clone(),
            arch: installed.id.arch.clone(),
            branch: installed.id.branch.clone(),
            remote_label: installed.origin.clone(),
            installed_size_label: format_optional_size(installed.installed_size),
            download_size_label: String::new(),
            friendly_name: friendly_name(installed),
        }
    }

    pub fn from_remote(remote: &RemoteRef) -> Self {
        Self {
            real_name: remote.id.name.clone(),
            arch: remote.id.arch.clone(),
            branch: remote.id.branch.clone(),
            remote_label: remote.remote_name.clone(),
            installed_size_label: String::new(),
            download_size_label: format_optional_size(remote.download_size),
            friendly_name: String::new(),
        }
    }

    pub fn id(&self) -> RefId {
        RefId::new(&self.real_name, &self.arch, &self.branch)
    }

    pub fn matches(&self, id: &RefId) -> bool {
        self.real_name == id.name && self.arch == id.arch && self.branch == id.branch
    }

    pub fn is_installed(&self) -> bool {
        !self.friendly_name.is_empty()
    }

    pub fn column(&self, column: SortColumn) -> &str {
        match column {
            SortColumn::RealName => &self.real_name,
            SortColumn::Arch => &self.arch,
            SortColumn::Branch => &self.branch,
            SortColumn::Remote => &self.remote_label,
            SortColumn::InstalledSize => &self.installed_size_label,
            SortColumn::DownloadSize => &self.download_size_label,
            SortColumn::Name => &self.friendly_name,
        }
    }
}

// Installed apps without appdata still need a non-empty label, since the
// label is what marks the row as installed.
fn friendly_name(installed: &InstalledRef) -> String {
    installed
        .appdata_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            installed
                .id
                .name
                .rsplit('.')
                .next()
                .unwrap_or(&installed.id.name)
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatpak::RefKind;

    fn installed(name: &str, size: Option<u64>, appdata: Option<&str>) -> InstalledRef {
        InstalledRef {
            kind: RefKind::App,
            id: RefId::new(name, "x86_64", "stable"),
            origin: "flathub".into(),
            installed_size: size,
            appdata_name: appdata.map(str::to_string),
            version: None,
            commit: None,
            latest_commit: None,
        }
    }

    fn remote(name: &str, size: Option<u64>) -> RemoteRef {
        RemoteRef {
            kind: RefKind::App,
            id: RefId::new(name, "x86_64", "stable"),
            remote_name: "flathub".into(),
            download_size: size,
            installed_size: Some(99 * 1_048_576),
            commit: None,
        }
    }

    #[test]
    fn installed_rows_have_installed_shape() {
        let row = DisplayRow::from_installed(&installed("org.gnome.Maps", Some(10 * 1_048_576), Some("Maps")));
        assert_eq!(row.installed_size_label, "10.00 MiB");
        assert_eq!(row.download_size_label, "");
        assert_eq!(row.remote_label, "flathub");
        assert_eq!(row.friendly_name, "Maps");
        assert!(row.is_installed());
    }

    #[test]
    fn remote_rows_have_remote_shape() {
        let row = DisplayRow::from_remote(&remote("org.gimp.GIMP", Some(5 * 1_048_576)));
        assert_eq!(row.installed_size_label, "");
        assert_eq!(row.download_size_label, "5.00 MiB");
        assert_eq!(row.remote_label, "flathub");
        assert_eq!(row.friendly_name, "");
        assert!(!row.is_installed());
    }

    #[test]
    fn at_most_one_size_label_is_populated() {
        let rows = [
            DisplayRow::from_installed(&installed("a.b.C", Some(1), Some("C"))),
            DisplayRow::from_installed(&installed("a.b.D", None, None)),
            DisplayRow::from_remote(&remote("a.b.E", Some(1))),
            DisplayRow::from_remote(&remote("a.b.F", None)),
        ];
        for row in &rows {
            assert!(row.installed_size_label.is_empty() || row.download_size_label.is_empty());
        }
        assert_eq!(rows[1].installed_size_label, "");
        assert_eq!(rows[3].download_size_label, "");
    }

    #[test]
    fn missing_appdata_name_falls_back_to_id_tail() {
        let row = DisplayRow::from_installed(&installed("org.gnome.Maps", Some(1), None));
        assert_eq!(row.friendly_name, "Maps");
        assert!(row.is_installed());
    }

    #[test]
    fn identity_round_trips_through_row() {
        let row = DisplayRow::from_remote(&remote("org.gimp.GIMP", None));
        let id = row.id();
        assert!(row.matches(&id));
        assert!(!row.matches(&RefId::new("org.gimp.GIMP", "aarch64", "stable")));
    }
}
