use iced::{
    alignment,
    widget::{button, column, container, progress_bar, row, scrollable, text, Space},
    Element, Length, Padding,
};

use crate::actions::{ActionEvent, ActionKind, ActionReport, ActionRequest};
use crate::gui::styles::{ActionButtonStyle, ButtonKind, CardStyle, TableScrollStyle};
use crate::gui::theme::Theme as AppTheme;

const VISIBLE_LINES: usize = 6;

/// Progress view of one running (or finished) action.
#[derive(Debug, Clone)]
pub struct ActionPanel {
    pub ticket: u64,
    pub kind: ActionKind,
    pub label: String,
    pub lines: Vec<String>,
    pub progress: f32,
    pub report: Option<ActionReport>,
    pub cancel_requested: bool,
}

impl ActionPanel {
    pub fn new(ticket: u64, request: &ActionRequest) -> Self {
        Self {
            ticket,
            kind: request.kind(),
            label: request.label(),
            lines: Vec::new(),
            progress: 0.0,
            report: None,
            cancel_requested: false,
        }
    }

    pub fn apply(&mut self, event: &ActionEvent) {
        match event {
            ActionEvent::Status(line) => self.lines.push(line.clone()),
            ActionEvent::Progress(fraction) => self.progress = fraction.clamp(0.0, 1.0),
            ActionEvent::Finished(report) => self.report = Some(report.clone()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.report.is_some()
    }

    pub fn status(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or_default()
    }

    /// Only update-all and installs can be interrupted between operations.
    pub fn can_cancel(&self) -> bool {
        !self.is_finished()
            && !self.cancel_requested
            && matches!(self.kind, ActionKind::UpdateAll | ActionKind::Install | ActionKind::InstallFromFile)
    }

    pub fn view<'a, M: Clone + 'a>(&'a self, palette: AppTheme, on_cancel: M, on_close: M) -> Element<'a, M> {
        let status_color = match &self.report {
            Some(report) if report.succeeded => palette.success(),
            Some(report) if !report.cancelled => palette.danger(),
            _ => palette.text(),
        };

        let log = self
            .lines
            .iter()
            .rev()
            .take(VISIBLE_LINES)
            .rev()
            .fold(column![].spacing(2), |col, line| {
                col.push(text(line).size(12).style(iced::theme::Text::Color(palette.secondary_text())))
            });

        let mut cancel = button(text("Cancel").size(13))
            .style(iced::theme::Button::Custom(Box::new(ActionButtonStyle::new(ButtonKind::Danger, palette))))
            .padding(Padding::from([6, 12]));
        if self.can_cancel() {
            cancel = cancel.on_press(on_cancel);
        }

        let close = button(text(if self.is_finished() { "Close" } else { "Hide" }).size(13))
            .on_press(on_close)
            .style(iced::theme::Button::Custom(Box::new(ActionButtonStyle::new(ButtonKind::Secondary, palette))))
            .padding(Padding::from([6, 12]));

        container(
            column![
                row![
                    text(&self.label).size(15).width(Length::Fill),
                    cancel,
                    close,
                ]
                .spacing(8)
                .align_items(alignment::Alignment::Center),
                text(self.status()).size(13).style(iced::theme::Text::Color(status_color)),
                progress_bar(0.0..=1.0, self.progress).height(Length::Fixed(8.0)),
                scrollable(log)
                    .height(Length::Fixed(90.0))
                    .style(iced::theme::Scrollable::Custom(Box::new(TableScrollStyle { palette }))),
                Space::with_height(Length::Fixed(2.0)),
            ]
            .spacing(8),
        )
        .padding(Padding::new(12.0))
        .width(Length::Fill)
        .style(iced::theme::Container::Custom(Box::new(CardStyle { palette, elevated: true })))
        .into()
    }
}
