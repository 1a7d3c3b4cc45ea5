use std::path::{Path, PathBuf};

use iced::{
    alignment, executor,
    widget::{button, column, container, row, text, Space},
    window, Application, Command, Element, Length, Padding, Pixels, Settings, Theme as IcedTheme,
};

use crate::actions::{self, ActionEvent, ActionRequest};
use crate::error::FlatpakError;
use crate::flatpak::RefDescriptor;
use crate::gui::action_panel::ActionPanel;
use crate::gui::styles::{ActionButtonStyle, BackdropStyle, ButtonKind, CardStyle};
use crate::gui::theme::Theme as AppTheme;
use crate::session::Session;

#[derive(Debug, Clone)]
pub enum Message {
    Install,
    Action(ActionEvent),
    Cancel,
    Close,
}

/// Window opened for `flatnest <FILE>`: installs one `.flatpakref` descriptor.
#[derive(Debug)]
pub struct InstallDialog {
    session: Session,
    path: PathBuf,
    loaded: Result<(RefDescriptor, Vec<u8>), FlatpakError>,
    ticket: Option<u64>,
    panel: Option<ActionPanel>,
    theme: AppTheme,
}

impl InstallDialog {
    pub fn new(session: Session, path: &Path) -> Self {
        let loaded = RefDescriptor::load(path);
        match &loaded {
            Ok((descriptor, _)) => log::info!("loaded {} from {}", descriptor.name, path.display()),
            Err(err) => log::error!("could not load {}: {}", path.display(), err),
        }
        Self {
            theme: AppTheme::from_dark(session.config().dark_theme),
            session,
            path: path.to_path_buf(),
            loaded,
            ticket: None,
            panel: None,
        }
    }

    pub fn run_separate_window(session: Session, path: &Path) -> iced::Result {
        let dialog = Self::new(session, path);

        let window_settings = window::Settings {
            size: iced::Size::new(560.0, 460.0),
            min_size: Some(iced::Size::new(460.0, 360.0)),
            resizable: true,
            ..Default::default()
        };

        <InstallDialog as Application>::run(Settings {
            window: window_settings,
            flags: dialog,
            default_text_size: Pixels(14.0),
            antialiasing: true,
            id: None,
            fonts: Vec::new(),
            default_font: iced::Font::DEFAULT,
        })
    }

    fn is_running(&self) -> bool {
        self.panel.as_ref().map_or(false, |panel| !panel.is_finished())
    }

    fn styled_button(&self, label: &str, kind: ButtonKind, on_press: Option<Message>) -> Element<Message> {
        let mut b = button(text(label).size(14))
            .style(iced::theme::Button::Custom(Box::new(ActionButtonStyle::new(kind, self.theme))))
            .padding(Padding::from([8, 16]));
        if let Some(message) = on_press {
            b = b.on_press(message);
        }
        b.into()
    }

    fn view_error(&self, err: &FlatpakError) -> Element<Message> {
        column![
            text(err.title()).size(20).style(iced::theme::Text::Color(self.theme.danger())),
            text(err.to_string()).size(14),
            Space::with_height(Length::Fill),
            row![
                Space::with_width(Length::Fill),
                self.styled_button("Close", ButtonKind::Secondary, Some(Message::Close)),
            ],
        ]
        .spacing(14)
        .into()
    }

    fn view_descriptor(&self, descriptor: &RefDescriptor) -> Element<Message> {
        let palette = self.theme;
        let detail = |label: &str, value: Option<&str>| {
            row![
                text(label.to_string())
                    .size(13)
                    .width(Length::Fixed(90.0))
                    .style(iced::theme::Text::Color(palette.secondary_text())),
                text(value.unwrap_or("None").to_string()).size(13),
            ]
            .spacing(8)
        };

        let started = self.panel.is_some();
        let panel: Element<Message> = match &self.panel {
            Some(panel) => panel.view(palette, Message::Cancel, Message::Close),
            None => Space::with_height(Length::Fill).into(),
        };

        column![
            text(format!("Install {}", descriptor.display_name())).size(20),
            detail("Name", Some(descriptor.name.as_str())),
            detail("Branch", descriptor.branch.as_deref()),
            detail("Title", descriptor.title.as_deref()),
            detail("Remote", descriptor.url.as_deref()),
            detail("File", Some(self.path.display().to_string().as_str())),
            panel,
            row![
                Space::with_width(Length::Fill),
                self.styled_button(
                    "Close",
                    ButtonKind::Secondary,
                    (!self.is_running()).then_some(Message::Close),
                ),
                self.styled_button("Install", ButtonKind::Primary, (!started).then_some(Message::Install)),
            ]
            .spacing(10)
            .align_items(alignment::Alignment::Center),
        ]
        .spacing(10)
        .into()
    }
}

impl Application for InstallDialog {
    type Message = Message;
    type Theme = IcedTheme;
    type Executor = executor::Default;
    type Flags = Self;

    fn new(flags: Self) -> (Self, Command<Message>) {
        (flags, Command::none())
    }

    fn title(&self) -> String {
        match &self.loaded {
            Ok((descriptor, _)) => format!("Install {} - Flatnest", descriptor.display_name()),
            Err(err) => format!("{} - Flatnest", err.title()),
        }
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::Install => {
                let (descriptor, bytes) = match &self.loaded {
                    Ok(loaded) if self.panel.is_none() => loaded.clone(),
                    _ => return Command::none(),
                };
                let request = ActionRequest::InstallFromFile { descriptor, bytes };
                let (ticket, cancel) = match self.session.begin(request.kind()) {
                    Ok(started) => started,
                    Err(err) => {
                        self.loaded = Err(err);
                        return Command::none();
                    }
                };
                self.ticket = Some(ticket);
                self.panel = Some(ActionPanel::new(ticket, &request));
                let events = actions::event_stream(self.session.service(), request, self.session.context(), cancel);
                Command::run(events, Message::Action)
            }
            Message::Action(event) => {
                if let Some(panel) = &mut self.panel {
                    panel.apply(&event);
                }
                if let (ActionEvent::Finished(_), Some(ticket)) = (&event, self.ticket) {
                    self.session.finish(ticket);
                }
                Command::none()
            }
            Message::Cancel => {
                if let Some(ticket) = self.ticket {
                    if let Some(panel) = &mut self.panel {
                        panel.cancel_requested = true;
                    }
                    self.session.cancel(ticket);
                }
                Command::none()
            }
            Message::Close => {
                self.session.cancel_all();
                window::close(window::Id::MAIN)
            }
        }
    }

    fn view(&self) -> Element<Message> {
        let palette = self.theme;
        let body = match &self.loaded {
            Ok((descriptor, _)) => self.view_descriptor(descriptor),
            Err(err) => self.view_error(err),
        };

        container(
            container(body)
                .padding(Padding::new(20.0))
                .width(Length::Fill)
                .height(Length::Fill)
                .style(iced::theme::Container::Custom(Box::new(CardStyle { palette, elevated: true }))),
        )
        .padding(Padding::new(16.0))
        .width(Length::Fill)
        .height(Length::Fill)
        .style(iced::theme::Container::Custom(Box::new(BackdropStyle {
            color: palette.background(),
        })))
        .into()
    }

    fn theme(&self) -> IcedTheme {
        self.theme.iced()
    }
}
