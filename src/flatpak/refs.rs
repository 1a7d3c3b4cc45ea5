use std::fmt;

use crate::error::FlatpakError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    App,
    Runtime,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::App => "app",
            RefKind::Runtime => "runtime",
        }
    }

    /// The `flatpak list` / `remote-ls` switch selecting this kind.
    pub fn list_flag(&self) -> &'static str {
        match self {
            RefKind::App => "--app",
            RefKind::Runtime => "--runtime",
        }
    }
}

/// Identity of a reference. Provenance and kind are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId {
    pub name: String,
    pub arch: String,
    pub branch: String,
}

impl RefId {
    pub fn new(name: impl Into<String>, arch: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arch: arch.into(),
            branch: branch.into(),
        }
    }

    /// Parses `name/arch/branch` or `kind/name/arch/branch`.
    pub fn parse(value: &str) -> Result<(Option<RefKind>, RefId), FlatpakError> {
        let parts: Vec<&str> = value.trim().split('/').collect();
        let (kind, rest) = match parts.as_slice() {
            ["app", rest @ ..] if rest.len() == 3 => (Some(RefKind::App), rest),
            ["runtime", rest @ ..] if rest.len() == 3 => (Some(RefKind::Runtime), rest),
            // a kind prefix with only two more segments is a truncated full ref
            ["app" | "runtime", ..] => return Err(FlatpakError::InvalidRef(value.to_string())),
            rest if rest.len() == 3 => (None, rest),
            _ => return Err(FlatpakError::InvalidRef(value.to_string())),
        };
        if rest.iter().any(|part| part.is_empty()) {
            return Err(FlatpakError::InvalidRef(value.to_string()));
        }
        Ok((kind, RefId::new(rest[0], rest[1], rest[2])))
    }

    pub fn format_ref(&self, kind: RefKind) -> String {
        format!("{}/{}", kind.as_str(), self)
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.name, self.arch, self.branch)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstalledRef {
    pub kind: RefKind,
    pub id: RefId,
    pub origin: String,
    pub installed_size: Option<u64>,
    pub appdata_name: Option<String>,
    pub version: Option<String>,
    pub commit: Option<String>,
    pub latest_commit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRef {
    pub kind: RefKind,
    pub id: RefId,
    pub remote_name: String,
    pub download_size: Option<u64>,
    pub installed_size: Option<u64>,
    pub commit: Option<String>,
}

/// A reference together with where its display data comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageRef {
    Installed(InstalledRef),
    Remote(RemoteRef),
}

impl PackageRef {
    pub fn id(&self) -> &RefId {
        match self {
            PackageRef::Installed(r) => &r.id,
            PackageRef::Remote(r) => &r.id,
        }
    }

    pub fn kind(&self) -> RefKind {
        match self {
            PackageRef::Installed(r) => r.kind,
            PackageRef::Remote(r) => r.kind,
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, PackageRef::Installed(_))
    }

    pub fn commit(&self) -> Option<&str> {
        match self {
            PackageRef::Installed(r) => r.commit.as_deref(),
            PackageRef::Remote(r) => r.commit.as_deref(),
        }
    }
}
