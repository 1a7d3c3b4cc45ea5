use crate::catalog::filter::visible;
use crate::catalog::row::DisplayRow;
use crate::catalog::sort::{SortColumn, SortOrder};
use crate::flatpak::RefId;

/// Display rows plus the current filter and sort.
///
/// The visible view is a list of indices into `rows`, rebuilt after every
/// mutation so callers only ever read a consistent filtered, sorted order.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    rows: Vec<DisplayRow>,
    query: String,
    installed_only: bool,
    sort: Option<(SortColumn, SortOrder)>,
    view: Vec<usize>,
}

impl CatalogStore {
    pub fn new(installed_only: bool) -> Self {
        Self {
            installed_only,
            ..Self::default()
        }
    }

    pub fn set_rows(&mut self, rows: Vec<DisplayRow>) {
        self.rows = rows;
        self.refresh_view();
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.view.clear();
    }

    /// Replaces the row whose identity is `id`, or appends when it is absent.
    pub fn replace(&mut self, id: &RefId, row: DisplayRow) {
        match self.rows.iter_mut().find(|r| r.matches(id)) {
            Some(existing) => *existing = row,
            None => self.rows.push(row),
        }
        self.refresh_view();
    }

    pub fn remove(&mut self, id: &RefId) -> Option<DisplayRow> {
        let index = self.rows.iter().position(|r| r.matches(id))?;
        let row = self.rows.remove(index);
        self.refresh_view();
        Some(row)
    }

    pub fn find(&self, id: &RefId) -> Option<&DisplayRow> {
        self.rows.iter().find(|r| r.matches(id))
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.refresh_view();
    }

    pub fn set_installed_only(&mut self, installed_only: bool) {
        self.installed_only = installed_only;
        self.refresh_view();
    }

    pub fn set_sort(&mut self, column: SortColumn, order: SortOrder) {
        self.sort = Some((column, order));
        self.refresh_view();
    }

    /// Header click: same column flips direction, a new column starts ascending.
    pub fn toggle_sort(&mut self, column: SortColumn) {
        let order = match self.sort {
            Some((current, order)) if current == column => order.toggled(),
            _ => SortOrder::Ascending,
        };
        self.set_sort(column, order);
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn installed_only(&self) -> bool {
        self.installed_only
    }

    pub fn sort(&self) -> Option<(SortColumn, SortOrder)> {
        self.sort
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn visible(&self) -> impl Iterator<Item = &DisplayRow> + '_ {
        self.view.iter().map(move |&i| &self.rows[i])
    }

    pub fn visible_len(&self) -> usize {
        self.view.len()
    }

    fn refresh_view(&mut self) {
        let rows = &self.rows;
        let mut view: Vec<usize> = (0..rows.len())
            .filter(|&i| visible(&rows[i], &self.query, self.installed_only))
            .collect();
        if let Some((column, order)) = self.sort {
            view.sort_by(|&a, &b| order.apply(column.compare(&rows[a], &rows[b])));
        }
        self.view = view;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed(name: &str, mib: &str, friendly: &str) -> DisplayRow {
        DisplayRow {
            real_name: name.into(),
            arch: "x86_64".into(),
            branch: "stable".into(),
            remote_label: "flathub".into(),
            installed_size_label: mib.into(),
            download_size_label: String::new(),
            friendly_name: friendly.into(),
        }
    }

    fn remote(name: &str, mib: &str) -> DisplayRow {
        DisplayRow {
            real_name: name.into(),
            arch: "x86_64".into(),
            branch: "stable".into(),
            remote_label: "flathub".into(),
            installed_size_label: String::new(),
            download_size_label: mib.into(),
            friendly_name: String::new(),
        }
    }

    fn names(store: &CatalogStore) -> Vec<&str> {
        store.visible().map(|r| r.real_name.as_str()).collect()
    }

    fn sample() -> CatalogStore {
        let mut store = CatalogStore::new(false);
        store.set_rows(vec![
            installed("org.gnome.Maps", "10.00 MiB", "Maps"),
            remote("org.gimp.GIMP", "120.00 MiB"),
            remote("org.videolan.VLC", "9.50 MiB"),
        ]);
        store
    }

    #[test]
    fn keeps_insertion_order_without_sort() {
        let store = sample();
        assert_eq!(names(&store), vec!["org.gnome.Maps", "org.gimp.GIMP", "org.videolan.VLC"]);
    }

    #[test]
    fn filters_apply_to_view_only() {
        let mut store = sample();
        store.set_installed_only(true);
        assert_eq!(names(&store), vec!["org.gnome.Maps"]);
        assert_eq!(store.len(), 3);

        store.set_installed_only(false);
        store.set_query("vlc");
        assert_eq!(names(&store), vec!["org.videolan.VLC"]);
    }

    #[test]
    fn size_sort_puts_empty_first_and_toggles() {
        let mut store = sample();
        store.toggle_sort(SortColumn::DownloadSize);
        assert_eq!(names(&store), vec!["org.gnome.Maps", "org.videolan.VLC", "org.gimp.GIMP"]);

        store.toggle_sort(SortColumn::DownloadSize);
        assert_eq!(store.sort(), Some((SortColumn::DownloadSize, SortOrder::Descending)));
        assert_eq!(names(&store), vec!["org.gimp.GIMP", "org.videolan.VLC", "org.gnome.Maps"]);

        store.toggle_sort(SortColumn::RealName);
        assert_eq!(store.sort(), Some((SortColumn::RealName, SortOrder::Ascending)));
        assert_eq!(names(&store), vec!["org.gimp.GIMP", "org.gnome.Maps", "org.videolan.VLC"]);
    }

    #[test]
    fn replace_flips_row_shape_and_keeps_position() {
        let mut store = sample();
        let gimp = store.visible().nth(1).unwrap().id();
        store.replace(&gimp, installed("org.gimp.GIMP", "400.00 MiB", "GNU Image Manipulation Program"));
        let row = store.find(&gimp).unwrap();
        assert!(row.is_installed());
        assert_eq!(row.download_size_label, "");
        assert_eq!(store.len(), 3);
        assert_eq!(names(&store)[1], "org.gimp.GIMP");
    }

    #[test]
    fn replace_appends_unknown_identity_and_reapplies_filter() {
        let mut store = sample();
        store.set_installed_only(true);
        let id = RefId::new("org.gnome.Weather", "x86_64", "stable");
        store.replace(&id, installed("org.gnome.Weather", "3.00 MiB", "Weather"));
        assert_eq!(names(&store), vec!["org.gnome.Maps", "org.gnome.Weather"]);
    }

    #[test]
    fn remove_drops_row() {
        let mut store = sample();
        let id = RefId::new("org.gnome.Maps", "x86_64", "stable");
        assert!(store.remove(&id).is_some());
        assert!(store.find(&id).is_none());
        assert!(store.remove(&id).is_none());
        assert_eq!(store.visible_len(), 2);
    }
}
