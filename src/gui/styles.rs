use iced::widget::button::{Appearance as ButtonAppearance, StyleSheet as ButtonStyleSheet};
use iced::widget::checkbox::{Appearance as CheckboxAppearance, StyleSheet as CheckboxStyleSheet};
use iced::widget::container::{Appearance as ContainerAppearance, StyleSheet as ContainerStyleSheet};
use iced::widget::scrollable::{Appearance as ScrollableAppearance, StyleSheet as ScrollableStyleSheet};
use iced::widget::text_input::{Appearance as TextInputAppearance, StyleSheet as TextInputStyleSheet};
use iced::{Background, Border, Color, Shadow, Vector};

use crate::gui::theme::Theme as AppTheme;

const RADIUS: f32 = 8.0;

fn with_alpha(color: Color, a: f32) -> Color {
    Color { a, ..color }
}

fn shade(color: Color, factor: f32) -> Color {
    Color {
        r: (color.r * factor).min(1.0),
        g: (color.g * factor).min(1.0),
        b: (color.b * factor).min(1.0),
        a: color.a,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Primary,
    Secondary,
    Danger,
    /// Flat column header in the catalog table.
    Header,
}

pub struct ActionButtonStyle {
    pub kind: ButtonKind,
    pub palette: AppTheme,
}

impl ActionButtonStyle {
    pub fn new(kind: ButtonKind, palette: AppTheme) -> Self {
        Self { kind, palette }
    }

    fn base(&self) -> Color {
        match self.kind {
            ButtonKind::Primary => self.palette.primary(),
            ButtonKind::Danger => self.palette.danger(),
            ButtonKind::Secondary => self.palette.card_background(),
            ButtonKind::Header => Color::TRANSPARENT,
        }
    }
}

impl ButtonStyleSheet for ActionButtonStyle {
    type Style = iced::Theme;

    fn active(&self, _style: &Self::Style) -> ButtonAppearance {
        let filled = matches!(self.kind, ButtonKind::Primary | ButtonKind::Danger);
        ButtonAppearance {
            background: Some(Background::Color(self.base())),
            border: Border {
                radius: RADIUS.into(),
                width: if self.kind == ButtonKind::Secondary { 1.0 } else { 0.0 },
                color: with_alpha(self.palette.secondary_text(), 0.4),
            },
            text_color: if filled {
                self.palette.on_primary()
            } else {
                self.palette.text()
            },
            shadow: Shadow {
                color: with_alpha(Color::BLACK, if filled { 0.25 } else { 0.0 }),
                offset: Vector::new(0.0, 2.0),
                blur_radius: 6.0,
            },
            shadow_offset: Vector::default(),
        }
    }

    fn hovered(&self, style: &Self::Style) -> ButtonAppearance {
        let mut appearance = self.active(style);
        let hover = match self.kind {
            ButtonKind::Header => with_alpha(self.palette.primary(), 0.12),
            ButtonKind::Secondary => shade(self.base(), if self.palette.is_dark() { 1.25 } else { 0.95 }),
            _ => shade(self.base(), 1.12),
        };
        appearance.background = Some(Background::Color(hover));
        appearance
    }

    fn pressed(&self, style: &Self::Style) -> ButtonAppearance {
        let mut appearance = self.hovered(style);
        appearance.shadow = Shadow::default();
        appearance
    }

    fn disabled(&self, style: &Self::Style) -> ButtonAppearance {
        let mut appearance = self.active(style);
        appearance.background = Some(Background::Color(with_alpha(self.base(), 0.35)));
        appearance.text_color = with_alpha(appearance.text_color, 0.45);
        appearance.shadow = Shadow::default();
        appearance
    }
}

/// Catalog row rendered as a button so the whole line is clickable.
pub struct TableRowStyle {
    pub selected: bool,
    pub striped: bool,
    pub palette: AppTheme,
}

impl ButtonStyleSheet for TableRowStyle {
    type Style = iced::Theme;

    fn active(&self, _style: &Self::Style) -> ButtonAppearance {
        let background = if self.selected {
            with_alpha(self.palette.primary(), 0.35)
        } else if self.striped {
            self.palette.stripe()
        } else {
            self.palette.card_background()
        };
        ButtonAppearance {
            background: Some(Background::Color(background)),
            border: Border {
                radius: 4.0.into(),
                width: if self.selected { 1.0 } else { 0.0 },
                color: self.palette.primary(),
            },
            text_color: self.palette.text(),
            shadow: Shadow::default(),
            shadow_offset: Vector::default(),
        }
    }

    fn hovered(&self, style: &Self::Style) -> ButtonAppearance {
        let mut appearance = self.active(style);
        if !self.selected {
            appearance.background = Some(Background::Color(with_alpha(self.palette.primary(), 0.15)));
        }
        appearance
    }
}

pub struct CardStyle {
    pub palette: AppTheme,
    pub elevated: bool,
}

impl ContainerStyleSheet for CardStyle {
    type Style = iced::Theme;

    fn appearance(&self, _style: &Self::Style) -> ContainerAppearance {
        ContainerAppearance {
            background: Some(Background::Color(self.palette.card_background())),
            border: Border {
                radius: RADIUS.into(),
                width: 1.0,
                color: with_alpha(self.palette.secondary_text(), 0.2),
            },
            shadow: Shadow {
                color: with_alpha(Color::BLACK, if self.elevated { 0.35 } else { 0.0 }),
                offset: Vector::new(0.0, 4.0),
                blur_radius: 12.0,
            },
            text_color: Some(self.palette.text()),
        }
    }
}

/// Full-window background, and the dimmed backdrop behind dialogs.
pub struct BackdropStyle {
    pub color: Color,
}

impl ContainerStyleSheet for BackdropStyle {
    type Style = iced::Theme;

    fn appearance(&self, _style: &Self::Style) -> ContainerAppearance {
        ContainerAppearance {
            background: Some(Background::Color(self.color)),
            ..Default::default()
        }
    }
}

pub struct TableScrollStyle {
    pub palette: AppTheme,
}

impl TableScrollStyle {
    fn with_scroller_alpha(&self, alpha: f32) -> ScrollableAppearance {
        ScrollableAppearance {
            container: ContainerAppearance::default(),
            scrollbar: iced::widget::scrollable::Scrollbar {
                background: None,
                border: Border::default(),
                scroller: iced::widget::scrollable::Scroller {
                    color: with_alpha(self.palette.primary(), alpha),
                    border: Border {
                        radius: 4.0.into(),
                        width: 0.0,
                        color: Color::TRANSPARENT,
                    },
                },
            },
            gap: None,
        }
    }
}

impl ScrollableStyleSheet for TableScrollStyle {
    type Style = iced::Theme;

    fn active(&self, _style: &Self::Style) -> ScrollableAppearance {
        self.with_scroller_alpha(0.4)
    }

    fn hovered(&self, _style: &Self::Style, is_mouse_over_scrollbar: bool) -> ScrollableAppearance {
        self.with_scroller_alpha(if is_mouse_over_scrollbar { 0.8 } else { 0.55 })
    }

    fn dragging(&self, _style: &Self::Style) -> ScrollableAppearance {
        self.with_scroller_alpha(0.9)
    }
}

pub struct SearchInputStyle {
    pub palette: AppTheme,
}

impl SearchInputStyle {
    fn bordered(&self, width: f32, color: Color) -> TextInputAppearance {
        TextInputAppearance {
            background: Background::Color(self.palette.background()),
            border: Border {
                radius: RADIUS.into(),
                width,
                color,
            },
            icon_color: self.palette.secondary_text(),
        }
    }
}

impl TextInputStyleSheet for SearchInputStyle {
    type Style = iced::Theme;

    fn active(&self, _style: &Self::Style) -> TextInputAppearance {
        self.bordered(1.0, with_alpha(self.palette.secondary_text(), 0.5))
    }

    fn focused(&self, _style: &Self::Style) -> TextInputAppearance {
        self.bordered(2.0, self.palette.primary())
    }

    fn placeholder_color(&self, _style: &Self::Style) -> Color {
        with_alpha(self.palette.secondary_text(), 0.7)
    }

    fn value_color(&self, _style: &Self::Style) -> Color {
        self.palette.text()
    }

    fn disabled_color(&self, _style: &Self::Style) -> Color {
        with_alpha(self.palette.text(), 0.4)
    }

    fn selection_color(&self, _style: &Self::Style) -> Color {
        with_alpha(self.palette.primary(), 0.35)
    }

    fn disabled(&self, style: &Self::Style) -> TextInputAppearance {
        let mut appearance = self.active(style);
        appearance.background = Background::Color(self.palette.stripe());
        appearance
    }
}

pub struct ToggleStyle {
    pub palette: AppTheme,
}

impl CheckboxStyleSheet for ToggleStyle {
    type Style = iced::Theme;

    fn active(&self, _style: &Self::Style, is_checked: bool) -> CheckboxAppearance {
        CheckboxAppearance {
            background: Background::Color(if is_checked {
                self.palette.primary()
            } else {
                self.palette.background()
            }),
            icon_color: self.palette.on_primary(),
            border: Border {
                radius: 4.0.into(),
                width: 1.0,
                color: if is_checked {
                    self.palette.primary()
                } else {
                    self.palette.secondary_text()
                },
            },
            text_color: Some(self.palette.text()),
        }
    }

    fn hovered(&self, style: &Self::Style, is_checked: bool) -> CheckboxAppearance {
        let mut appearance = self.active(style, is_checked);
        appearance.border.color = self.palette.primary();
        appearance
    }

    fn disabled(&self, style: &Self::Style, is_checked: bool) -> CheckboxAppearance {
        let mut appearance = self.active(style, is_checked);
        appearance.background = Background::Color(self.palette.stripe());
        appearance.text_color = Some(with_alpha(self.palette.text(), 0.5));
        appearance
    }
}
