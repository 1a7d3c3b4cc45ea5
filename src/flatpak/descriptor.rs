use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::FlatpakError;

const GROUP: &str = "[Flatpak Ref]";

/// The parts of a `.flatpakref` file the install window needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefDescriptor {
    pub name: String,
    pub branch: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub is_runtime: bool,
}

impl RefDescriptor {
    pub fn parse(contents: &str) -> Result<Self, FlatpakError> {
        let mut in_group = false;
        let mut seen_group = false;
        let mut name = None;
        let mut branch = None;
        let mut title = None;
        let mut url = None;
        let mut is_runtime = false;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_group = line == GROUP;
                seen_group |= in_group;
                continue;
            }
            if !in_group {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(FlatpakError::InvalidDescriptor(format!("malformed line: {}", line)));
            };
            let value = value.trim().to_string();
            match key.trim() {
                "Name" => name = Some(value),
                "Branch" => branch = Some(value),
                "Title" => title = Some(value),
                "Url" => url = Some(value),
                "IsRuntime" => is_runtime = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if !seen_group {
            return Err(FlatpakError::InvalidDescriptor(format!("missing {} group", GROUP)));
        }
        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| FlatpakError::InvalidDescriptor("missing Name key".to_string()))?;

        Ok(Self {
            name,
            branch,
            title,
            url,
            is_runtime,
        })
    }

    /// Reads and validates a descriptor file, keeping the raw bytes for the
    /// install operation.
    pub fn load(path: &Path) -> Result<(Self, Vec<u8>), FlatpakError> {
        let display = path.display().to_string();
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FlatpakError::FileNotFound(display.clone()),
            _ => FlatpakError::ReadFailed {
                path: display.clone(),
                reason: e.to_string(),
            },
        })?;
        let contents = String::from_utf8_lossy(&bytes);
        let descriptor = Self::parse(&contents)?;
        if descriptor.is_runtime {
            return Err(FlatpakError::NotAnApplication(descriptor.name));
        }
        log::debug!("loaded flatpakref for {} from {}", descriptor.name, display);
        Ok((descriptor, bytes))
    }

    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = "[Flatpak Ref]\n\
        Title=GNOME Maps\n\
        Name=org.gnome.Maps\n\
        Branch=stable\n\
        Url=https://dl.flathub.org/repo/\n\
        IsRuntime=false\n\
        GPGKey=mQINBFlD2sABEADsiUZUO\n";

    #[test]
    fn parses_application_descriptor() {
        let descriptor = RefDescriptor::parse(MAPS).unwrap();
        assert_eq!(descriptor.name, "org.gnome.Maps");
        assert_eq!(descriptor.branch.as_deref(), Some("stable"));
        assert_eq!(descriptor.display_name(), "GNOME Maps");
        assert!(!descriptor.is_runtime);
    }

    #[test]
    fn requires_group_and_name() {
        assert!(matches!(
            RefDescriptor::parse("Name=org.gnome.Maps\n"),
            Err(FlatpakError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            RefDescriptor::parse("[Flatpak Ref]\nTitle=Maps\n"),
            Err(FlatpakError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn ignores_other_groups() {
        let text = "[Other]\nName=wrong\n[Flatpak Ref]\nName=org.gnome.Maps\n";
        assert_eq!(RefDescriptor::parse(text).unwrap().name, "org.gnome.Maps");
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let path = std::env::temp_dir().join("flatnest-does-not-exist.flatpakref");
        assert!(matches!(RefDescriptor::load(&path), Err(FlatpakError::FileNotFound(_))));
    }

    #[test]
    fn runtime_descriptor_is_a_kind_mismatch() {
        let path = std::env::temp_dir().join(format!("flatnest-runtime-{}.flatpakref", std::process::id()));
        fs::write(&path, "[Flatpak Ref]\nName=org.gnome.Platform\nIsRuntime=true\n").unwrap();
        let result = RefDescriptor::load(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(result.unwrap_err(), FlatpakError::NotAnApplication("org.gnome.Platform".into()));
    }
}
