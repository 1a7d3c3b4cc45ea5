use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::catalog::row::DisplayRow;
use crate::error::FlatpakError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    RealName,
    Arch,
    Branch,
    Remote,
    InstalledSize,
    DownloadSize,
    Name,
}

impl SortColumn {
    pub const ALL: [SortColumn; 7] = [
        SortColumn::RealName,
        SortColumn::Arch,
        SortColumn::Branch,
        SortColumn::Remote,
        SortColumn::InstalledSize,
        SortColumn::DownloadSize,
        SortColumn::Name,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            SortColumn::RealName => "Real Name",
            SortColumn::Arch => "Arch",
            SortColumn::Branch => "Branch",
            SortColumn::Remote => "Remote Name",
            SortColumn::InstalledSize => "Installed Size",
            SortColumn::DownloadSize => "Download Size",
            SortColumn::Name => "Name",
        }
    }

    pub fn is_size(&self) -> bool {
        matches!(self, SortColumn::InstalledSize | SortColumn::DownloadSize)
    }

    pub fn compare(&self, a: &DisplayRow, b: &DisplayRow) -> Ordering {
        let (left, right) = (a.column(*self), b.column(*self));
        if self.is_size() {
            compare_size(left, right)
        } else {
            compare_text(left, right)
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for SortColumn {
    type Err = FlatpakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "realname" | "id" => Ok(SortColumn::RealName),
            "arch" => Ok(SortColumn::Arch),
            "branch" => Ok(SortColumn::Branch),
            "remote" | "remotename" | "origin" => Ok(SortColumn::Remote),
            "installedsize" | "installed" => Ok(SortColumn::InstalledSize),
            "downloadsize" | "download" => Ok(SortColumn::DownloadSize),
            "name" => Ok(SortColumn::Name),
            _ => Err(FlatpakError::InvalidInput(format!("unknown sort column '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortOrder::Ascending => "▲",
            SortOrder::Descending => "▼",
        }
    }
}

/// Empty values first, then plain lexicographic order.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

/// Orders `"12.34 MiB"` labels numerically. Labels that don't parse sort with
/// the empty ones.
pub fn compare_size(a: &str, b: &str) -> Ordering {
    match (size_value(a), size_value(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(&y),
    }
}

fn size_value(label: &str) -> Option<f64> {
    let number = label.trim().trim_end_matches("MiB").trim();
    if number.is_empty() {
        return None;
    }
    number.parse::<f64>().ok().filter(|v| v.is_finite())
}
