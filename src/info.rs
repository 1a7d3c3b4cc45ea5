use crate::error::FlatpakError;
use crate::flatpak::{PackageRef, PackageService};
use crate::utils::format_optional_size;

const NONE: &str = "None";

/// Text report shown in the info window and by `flatnest info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoReport {
    pub app_id: String,
    pub fields: Vec<(String, String)>,
}

impl InfoReport {
    pub fn build(entry: &PackageRef, details: &[(String, String)]) -> Self {
        let detail = |keys: &[&str]| -> Option<String> {
            details
                .iter()
                .find(|(key, _)| keys.iter().any(|k| key.eq_ignore_ascii_case(k)))
                .map(|(_, value)| value.clone())
                .filter(|value| !value.is_empty())
        };
        let id = entry.id();
        let mut fields: Vec<(&str, Option<String>)> = vec![
            ("Real Name", Some(id.name.clone())),
            ("Arch", Some(id.arch.clone())),
            ("Branch", Some(id.branch.clone())),
            ("Collection ID", detail(&["Collection", "Collection ID"])),
            ("Commit", entry.commit().map(str::to_string).or_else(|| detail(&["Commit"]))),
            ("Is Installed", Some(if entry.is_installed() { "Yes" } else { "No" }.to_string())),
            ("License", detail(&["License"])),
        ];

        match entry {
            PackageRef::Installed(installed) => {
                fields.push(("Name", installed.appdata_name.clone().or_else(|| detail(&["Name"]))));
                fields.push(("Summary", detail(&["Summary"])));
                fields.push(("Version", installed.version.clone().or_else(|| detail(&["Version"]))));
                fields.push(("Origin", Some(installed.origin.clone())));
                fields.push(("Installed Size", Some(format_optional_size(installed.installed_size))));
                fields.push(("Latest Commit", installed.latest_commit.clone()));
            }
            PackageRef::Remote(remote) => {
                fields.push(("Name", detail(&["Name"])));
                fields.push(("Summary", detail(&["Summary"])));
                fields.push(("Version", detail(&["Version"])));
                fields.push(("Remote Name", Some(remote.remote_name.clone())));
                fields.push(("Installed Size", Some(format_optional_size(remote.installed_size))));
                fields.push(("Download Size", Some(format_optional_size(remote.download_size))));
            }
        }
        fields.push(("EOL Reason", detail(&["End-of-life", "EOL"])));
        fields.push(("EOL Rebase", detail(&["End-of-life-rebase", "EOL Rebase"])));

        Self {
            app_id: id.name.clone(),
            fields: fields
                .into_iter()
                .map(|(key, value)| {
                    let value = value.filter(|v| !v.is_empty()).unwrap_or_else(|| NONE.to_string());
                    (key.to_string(), value)
                })
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn flathub_url(&self) -> String {
        flathub_url(&self.app_id)
    }
}

/// Re-queries the service so the report reflects the current state.
pub fn load(service: &dyn PackageService, entry: &PackageRef) -> Result<InfoReport, FlatpakError> {
    log::debug!("loading details for {}", entry.id());
    let details = service.details(entry)?;
    Ok(InfoReport::build(entry, &details))
}

pub fn flathub_url(app_id: &str) -> String {
    format!("https://flathub.org/apps/details/{}", app_id)
}

/// Checks that `input` looks like a reverse-DNS application ID.
pub fn validate_app_id(input: &str) -> Result<&str, FlatpakError> {
    let app_id = input.trim();
    let segments: Vec<&str> = app_id.split('.').collect();
    if segments.len() < 3 || segments.iter().any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
        return Err(FlatpakError::InvalidInput(app_id.to_string()));
    }
    Ok(app_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatpak::{InstalledRef, MockPackageService, RefId, RefKind, RemoteRef};

    fn installed() -> PackageRef {
        PackageRef::Installed(InstalledRef {
            kind: RefKind::App,
            id: RefId::new("org.gnome.Maps", "x86_64", "stable"),
            origin: "flathub".into(),
            installed_size: Some(10 * 1_048_576),
            appdata_name: Some("Maps".into()),
            version: Some("45.1".into()),
            commit: Some("abc".into()),
            latest_commit: Some("def".into()),
        })
    }

    fn remote() -> PackageRef {
        PackageRef::Remote(RemoteRef {
            kind: RefKind::App,
            id: RefId::new("org.gimp.GIMP", "x86_64", "stable"),
            remote_name: "flathub".into(),
            download_size: Some(5 * 1_048_576),
            installed_size: None,
            commit: None,
        })
    }

    #[test]
    fn installed_report_prefers_local_metadata() {
        let details = vec![
            ("License".to_string(), "GPL-2.0+".to_string()),
            ("Collection".to_string(), "org.flathub.Stable".to_string()),
        ];
        let report = InfoReport::build(&installed(), &details);
        assert_eq!(report.get("Name"), Some("Maps"));
        assert_eq!(report.get("Is Installed"), Some("Yes"));
        assert_eq!(report.get("Collection ID"), Some("org.flathub.Stable"));
        assert_eq!(report.get("Origin"), Some("flathub"));
        assert_eq!(report.get("Installed Size"), Some("10.00 MiB"));
        assert_eq!(report.get("Latest Commit"), Some("def"));
        assert_eq!(report.get("Summary"), Some("None"));
        assert!(report.text().starts_with("Real Name: org.gnome.Maps\nArch: x86_64"));
    }

    #[test]
    fn remote_report_fills_missing_values_with_none() {
        let report = InfoReport::build(&remote(), &[]);
        assert_eq!(report.get("Is Installed"), Some("No"));
        assert_eq!(report.get("Remote Name"), Some("flathub"));
        assert_eq!(report.get("Installed Size"), Some("None"));
        assert_eq!(report.get("Download Size"), Some("5.00 MiB"));
        assert_eq!(report.get("Commit"), Some("None"));
        assert_eq!(report.get("Origin"), None);
        assert_eq!(report.flathub_url(), "https://flathub.org/apps/details/org.gimp.GIMP");
    }

    #[test]
    fn load_surfaces_service_errors() {
        let mut service = MockPackageService::new();
        service
            .expect_details()
            .returning(|_| Err(FlatpakError::CommandFailed {
                command: "info".into(),
                stderr: "error: not installed".into(),
            }));
        assert!(load(&service, &installed()).is_err());
    }

    #[test]
    fn app_id_needs_three_segments() {
        assert_eq!(validate_app_id(" org.gnome.Maps "), Ok("org.gnome.Maps"));
        assert!(validate_app_id("gnome.Maps").is_err());
        assert!(validate_app_id("org..Maps").is_err());
        assert!(validate_app_id("").is_err());
        assert!(validate_app_id("org.gnome.Map s").is_err());
    }
}
