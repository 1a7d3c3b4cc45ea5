use crate::catalog::row::DisplayRow;

/// Whether `row` is shown for the current search text and installed-only toggle.
pub fn visible(row: &DisplayRow, query: &str, installed_only: bool) -> bool {
    if installed_only && !row.is_installed() {
        return false;
    }
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    row.real_name.to_lowercase().contains(&needle) || row.friendly_name.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(real_name: &str, friendly_name: &str) -> DisplayRow {
        DisplayRow {
            real_name: real_name.into(),
            arch: "x86_64".into(),
            branch: "stable".into(),
            remote_label: "flathub".into(),
            installed_size_label: if friendly_name.is_empty() { String::new() } else { "1.00 MiB".into() },
            download_size_label: if friendly_name.is_empty() { "1.00 MiB".into() } else { String::new() },
            friendly_name: friendly_name.into(),
        }
    }

    #[test]
    fn empty_query_shows_everything() {
        assert!(visible(&row("org.gnome.Maps", "Maps"), "", false));
        assert!(visible(&row("org.gimp.GIMP", ""), "", false));
    }

    #[test]
    fn whitespace_query_is_a_plain_substring() {
        assert!(!visible(&row("org.gnome.Maps", "Maps"), " ", false));
        assert!(visible(&row("org.gnome.Maps", "GNOME Maps"), " ", false));
        assert!(!visible(&row("org.gnome.Maps", "GNOME Maps"), " maps ", false));
    }

    #[test]
    fn installed_only_with_empty_query_follows_row_shape() {
        for r in [row("org.gnome.Maps", "Maps"), row("org.gimp.GIMP", "")] {
            assert_eq!(visible(&r, "", true), !r.friendly_name.is_empty());
        }
    }

    #[test]
    fn query_matches_either_name_case_insensitively() {
        let maps = row("org.gnome.Maps", "GNOME Maps");
        assert!(visible(&maps, "MAPS", false));
        assert!(visible(&maps, "gnome", false));
        assert!(!visible(&maps, "gimp", false));

        let gimp = row("org.gimp.GIMP", "");
        assert!(visible(&gimp, "Gimp", false));
    }

    #[test]
    fn query_and_installed_only_combine() {
        assert!(visible(&row("org.gnome.Maps", "Maps"), "maps", true));
        assert!(!visible(&row("org.gnome.Maps", ""), "maps", true));
        assert!(!visible(&row("org.gnome.Weather", "Weather"), "maps", true));
    }
}
