use iced::Color;

/// Window palette; persisted as `dark_theme` in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn is_dark(&self) -> bool {
        *self == Theme::Dark
    }

    pub fn toggled(&self) -> Self {
        Self::from_dark(!self.is_dark())
    }

    pub fn iced(&self) -> iced::Theme {
        match self {
            Theme::Light => iced::Theme::Light,
            Theme::Dark => iced::Theme::Dark,
        }
    }

    pub fn background(&self) -> Color {
        match self {
            Theme::Light => Color::from_rgb(0.95, 0.96, 0.97),
            Theme::Dark => Color::from_rgb(0.10, 0.11, 0.13),
        }
    }

    pub fn card_background(&self) -> Color {
        match self {
            Theme::Light => Color::WHITE,
            Theme::Dark => Color::from_rgb(0.16, 0.17, 0.20),
        }
    }

    /// Alternate table row shade.
    pub fn stripe(&self) -> Color {
        match self {
            Theme::Light => Color::from_rgb(0.97, 0.98, 0.99),
            Theme::Dark => Color::from_rgb(0.13, 0.14, 0.16),
        }
    }

    pub fn text(&self) -> Color {
        match self {
            Theme::Light => Color::from_rgb(0.08, 0.09, 0.10),
            Theme::Dark => Color::from_rgb(0.93, 0.94, 0.95),
        }
    }

    pub fn secondary_text(&self) -> Color {
        match self {
            Theme::Light => Color::from_rgb(0.38, 0.40, 0.45),
            Theme::Dark => Color::from_rgb(0.65, 0.67, 0.72),
        }
    }

    /// Flatpak blue.
    pub fn primary(&self) -> Color {
        match self {
            Theme::Light => Color::from_rgb(0.16, 0.40, 0.75),
            Theme::Dark => Color::from_rgb(0.36, 0.60, 0.95),
        }
    }

    pub fn on_primary(&self) -> Color {
        Color::WHITE
    }

    pub fn success(&self) -> Color {
        match self {
            Theme::Light => Color::from_rgb(0.15, 0.55, 0.30),
            Theme::Dark => Color::from_rgb(0.40, 0.80, 0.50),
        }
    }

    pub fn danger(&self) -> Color {
        match self {
            Theme::Light => Color::from_rgb(0.80, 0.18, 0.18),
            Theme::Dark => Color::from_rgb(0.95, 0.40, 0.40),
        }
    }
}
