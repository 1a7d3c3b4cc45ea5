use crate::error::FlatpakError;
use crate::flatpak::{PackageRef, PackageService, RefId};

pub mod filter;
pub mod merge;
pub mod row;
pub mod sort;
pub mod store;

pub use filter::visible;
pub use merge::{build_rows, is_displayable, merge};
pub use row::DisplayRow;
pub use sort::{compare_size, compare_text, SortColumn, SortOrder};
pub use store::CatalogStore;

/// Queries both lists and merges them. Either query failing fails the whole
/// load; no partial catalog is returned.
pub fn load_entries(service: &dyn PackageService, remote: &str) -> Result<Vec<PackageRef>, FlatpakError> {
    log::debug!("loading catalog from installed refs and remote {}", remote);
    let installed = service.list_installed()?;
    let remote_refs = service.list_remote(remote)?;
    let merged = merge(installed, remote_refs);
    log::debug!("merged catalog holds {} references", merged.len());
    Ok(merged)
}

pub fn load_catalog(
    service: &dyn PackageService,
    remote: &str,
    default_arch: &str,
) -> Result<Vec<DisplayRow>, FlatpakError> {
    let entries = load_entries(service, remote)?;
    let rows = build_rows(&entries, default_arch);
    log::info!("{} applications available for {}", rows.len(), default_arch);
    Ok(rows)
}

/// Displayable application named `name`, installed copies first.
pub fn resolve(
    service: &dyn PackageService,
    remote: &str,
    name: &str,
    default_arch: &str,
) -> Result<PackageRef, FlatpakError> {
    load_entries(service, remote)?
        .into_iter()
        .find(|entry| entry.id().name == name && is_displayable(entry, default_arch))
        .ok_or_else(|| FlatpakError::NotFound(name.to_string()))
}

/// Entry with exactly this identity, installed copy first.
pub fn resolve_ref(service: &dyn PackageService, remote: &str, id: &RefId) -> Result<PackageRef, FlatpakError> {
    load_entries(service, remote)?
        .into_iter()
        .find(|entry| entry.id() == id)
        .ok_or_else(|| FlatpakError::NotFound(id.to_string()))
}

/// Current state of one reference, used to replace a single row after an action.
///
/// `None` means the reference is neither installed nor offered by `remote`.
pub fn lookup_row(
    service: &dyn PackageService,
    remote: &str,
    id: &RefId,
) -> Result<Option<DisplayRow>, FlatpakError> {
    if let Some(installed) = service.list_installed()?.into_iter().find(|r| &r.id == id) {
        return Ok(Some(DisplayRow::from_installed(&installed)));
    }
    Ok(service
        .list_remote(remote)?
        .into_iter()
        .find(|r| &r.id == id)
        .map(|r| DisplayRow::from_remote(&r)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatpak::{InstalledRef, MockPackageService, RefKind, RemoteRef};

    fn installed_maps() -> InstalledRef {
        InstalledRef {
            kind: RefKind::App,
            id: RefId::new("org.gnome.Maps", "x86_64", "stable"),
            origin: "flathub".into(),
            installed_size: Some(1_048_576),
            appdata_name: Some("Maps".into()),
            version: Some("45.1".into()),
            commit: None,
            latest_commit: None,
        }
    }

    fn remote_ref(name: &str, arch: &str) -> RemoteRef {
        RemoteRef {
            kind: RefKind::App,
            id: RefId::new(name, arch, "stable"),
            remote_name: "flathub".into(),
            download_size: Some(2 * 1_048_576),
            installed_size: None,
            commit: None,
        }
    }

    #[test]
    fn failed_remote_listing_builds_no_catalog() {
        let mut service = MockPackageService::new();
        service.expect_list_installed().returning(|| Ok(vec![installed_maps()]));
        service
            .expect_list_remote()
            .returning(|_| Err(FlatpakError::ServiceUnavailable("no network".into())));
        assert!(load_catalog(&service, "flathub", "x86_64").is_err());
    }

    #[test]
    fn catalog_uses_configured_remote() {
        let mut service = MockPackageService::new();
        service.expect_list_installed().returning(|| Ok(vec![installed_maps()]));
        service
            .expect_list_remote()
            .withf(|remote| remote == "flathub-beta")
            .returning(|_| Ok(vec![remote_ref("org.gimp.GIMP", "x86_64"), remote_ref("org.gimp.GIMP", "aarch64")]));
        let rows = load_catalog(&service, "flathub-beta", "x86_64").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].download_size_label, "2.00 MiB");
    }

    #[test]
    fn resolve_skips_foreign_arch() {
        let mut service = MockPackageService::new();
        service.expect_list_installed().returning(|| Ok(Vec::new()));
        service
            .expect_list_remote()
            .returning(|_| Ok(vec![remote_ref("org.gimp.GIMP", "aarch64"), remote_ref("org.gimp.GIMP", "x86_64")]));
        let entry = resolve(&service, "flathub", "org.gimp.GIMP", "x86_64").unwrap();
        assert_eq!(entry.id().arch, "x86_64");
        assert_eq!(
            resolve(&service, "flathub", "org.gnome.Maps", "x86_64").unwrap_err(),
            FlatpakError::NotFound("org.gnome.Maps".into())
        );
    }

    #[test]
    fn resolve_ref_matches_full_identity() {
        let mut service = MockPackageService::new();
        service.expect_list_installed().returning(|| Ok(vec![installed_maps()]));
        service.expect_list_remote().returning(|_| Ok(vec![remote_ref("org.gnome.Maps", "x86_64")]));
        let maps = resolve_ref(&service, "flathub", &RefId::new("org.gnome.Maps", "x86_64", "stable")).unwrap();
        assert!(maps.is_installed());
        assert!(resolve_ref(&service, "flathub", &RefId::new("org.gnome.Maps", "x86_64", "beta")).is_err());
    }

    #[test]
    fn lookup_prefers_installed_state() {
        let mut service = MockPackageService::new();
        service.expect_list_installed().returning(|| Ok(vec![installed_maps()]));
        service.expect_list_remote().returning(|_| Ok(vec![remote_ref("org.gimp.GIMP", "x86_64")]));

        let maps = lookup_row(&service, "flathub", &RefId::new("org.gnome.Maps", "x86_64", "stable")).unwrap();
        assert!(maps.unwrap().is_installed());
        let gimp = lookup_row(&service, "flathub", &RefId::new("org.gimp.GIMP", "x86_64", "stable")).unwrap();
        assert!(!gimp.unwrap().is_installed());
        let missing = lookup_row(&service, "flathub", &RefId::new("org.example.Gone", "x86_64", "stable")).unwrap();
        assert!(missing.is_none());
    }
}
