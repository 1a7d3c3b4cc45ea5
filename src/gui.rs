use std::path::PathBuf;

use iced::{
    alignment, executor,
    widget::{button, checkbox, column, container, row, scrollable, text, text_input, Space},
    Application, Command, Element, Length, Padding, Pixels, Settings, Theme as IcedTheme,
};

use crate::actions::{self, ActionEvent, ActionRequest, Refresh};
use crate::catalog::{self, CatalogStore, DisplayRow, SortColumn};
use crate::error::FlatpakError;
use crate::flatpak::{PackageRef, RefDescriptor, RefId};
use crate::info::{self, InfoReport};
use crate::session::Session;

mod action_panel;
pub mod install_dialog;
mod styles;
mod theme;

use action_panel::ActionPanel;
use styles::{
    ActionButtonStyle, BackdropStyle, ButtonKind, CardStyle, SearchInputStyle, TableRowStyle, TableScrollStyle,
    ToggleStyle,
};
use theme::Theme as AppTheme;

pub fn run(session: Session) -> iced::Result {
    log::debug!("starting catalog window");
    let window = iced::window::Settings {
        size: iced::Size::new(1200.0, 800.0),
        min_size: Some(iced::Size::new(800.0, 560.0)),
        resizable: true,
        ..Default::default()
    };
    FlatnestGUI::run(Settings {
        id: None,
        window,
        flags: session,
        fonts: Vec::new(),
        default_font: iced::Font::DEFAULT,
        default_text_size: Pixels(14.0),
        antialiasing: true,
    })
}

/// Runs blocking service work off the UI thread.
fn blocking<T, F>(job: F, map: fn(Result<T, FlatpakError>) -> Message) -> Command<Message>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FlatpakError> + Send + 'static,
{
    Command::perform(
        async move {
            tokio::task::spawn_blocking(job)
                .await
                .unwrap_or_else(|e| Err(FlatpakError::ServiceUnavailable(e.to_string())))
        },
        map,
    )
}

fn pick_descriptor() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Install from File")
        .add_filter("Flatpak reference", &["flatpakref"])
        .pick_file()
}

fn open_url(url: &str) {
    log::info!("opening {}", url);
    if let Err(e) = std::process::Command::new("xdg-open").arg(url).spawn() {
        log::warn!("could not open {}: {}", url, e);
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Reload,
    CatalogLoaded(Result<Vec<DisplayRow>, FlatpakError>),
    QueryChanged(String),
    InstalledOnlyToggled(bool),
    SortBy(SortColumn),
    RowSelected(RefId),
    RunPressed,
    InstallPressed,
    UninstallPressed,
    UpdateAllPressed,
    InfoPressed,
    Launched(Result<(), FlatpakError>),
    InfoLoaded(Result<InfoReport, FlatpakError>),
    CopyInfo,
    OpenFlathub,
    InstallEntryOpened,
    InstallEntryChanged(String),
    InstallEntrySubmitted,
    EntryResolved(Result<PackageRef, FlatpakError>),
    InstallFromFilePressed,
    FileChosen(Option<PathBuf>),
    FileLoaded(Result<(RefDescriptor, Vec<u8>), FlatpakError>),
    AboutPressed,
    ThemeToggled,
    Action(u64, ActionEvent),
    CancelAction(u64),
    ClosePanel(u64),
    DismissDialog,
}

#[derive(Debug, Clone)]
enum Dialog {
    Error(FlatpakError),
    Info { report: Option<InfoReport>, copied: bool },
    InstallEntry { input: String, resolving: bool },
    About,
}

#[derive(Debug)]
pub struct FlatnestGUI {
    session: Session,
    theme: AppTheme,
    store: CatalogStore,
    loading: bool,
    load_error: Option<FlatpakError>,
    selected: Option<RefId>,
    panels: Vec<ActionPanel>,
    dialog: Option<Dialog>,
}

impl Application for FlatnestGUI {
    type Message = Message;
    type Theme = IcedTheme;
    type Executor = executor::Default;
    type Flags = Session;

    fn new(session: Session) -> (FlatnestGUI, Command<Message>) {
        let gui = FlatnestGUI {
            theme: AppTheme::from_dark(session.config().dark_theme),
            store: CatalogStore::new(session.config().show_installed_only),
            session,
            loading: true,
            load_error: None,
            selected: None,
            panels: Vec::new(),
            dialog: None,
        };
        let cmd = gui.load_catalog();
        (gui, cmd)
    }

    fn title(&self) -> String {
        String::from("Flatnest - Flatpak Manager")
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::Reload => {
                self.loading = true;
                self.load_catalog()
            }
            Message::CatalogLoaded(Ok(rows)) => {
                self.loading = false;
                self.load_error = None;
                self.store.set_rows(rows);
                self.drop_stale_selection();
                Command::none()
            }
            Message::CatalogLoaded(Err(err)) => {
                log::error!("could not load catalog: {}", err);
                self.loading = false;
                self.store.clear();
                self.load_error = Some(err.clone());
                self.dialog = Some(Dialog::Error(err));
                Command::none()
            }
            Message::QueryChanged(query) => {
                self.store.set_query(query);
                Command::none()
            }
            Message::InstalledOnlyToggled(installed_only) => {
                self.store.set_installed_only(installed_only);
                Command::none()
            }
            Message::SortBy(column) => {
                self.store.toggle_sort(column);
                Command::none()
            }
            Message::RowSelected(id) => {
                self.selected = Some(id);
                Command::none()
            }
            Message::RunPressed => match self.selected_row() {
                Ok(row) => {
                    let id = row.id();
                    let service = self.session.service();
                    blocking(move || service.launch(&id), Message::Launched)
                }
                Err(err) => self.show_error(err),
            },
            Message::Launched(Ok(())) => Command::none(),
            Message::Launched(Err(err)) => self.show_error(err),
            Message::InstallPressed => match self.selected_row() {
                Ok(row) => {
                    let request = ActionRequest::Install {
                        id: row.id(),
                        remote: row.remote_label.clone(),
                    };
                    self.start_action(request)
                }
                Err(err) => self.show_error(err),
            },
            Message::UninstallPressed => match self.selected_row() {
                Ok(row) => {
                    let request = ActionRequest::Uninstall { id: row.id() };
                    self.start_action(request)
                }
                Err(err) => self.show_error(err),
            },
            Message::UpdateAllPressed => self.start_action(ActionRequest::UpdateAll),
            Message::InfoPressed => match self.selected_row() {
                Ok(row) => {
                    self.dialog = Some(Dialog::Info {
                        report: None,
                        copied: false,
                    });
                    let service = self.session.service();
                    let remote = self.session.remote_name().to_string();
                    let id = row.id();
                    blocking(
                        move || {
                            let entry = catalog::resolve_ref(service.as_ref(), &remote, &id)?;
                            info::load(service.as_ref(), &entry)
                        },
                        Message::InfoLoaded,
                    )
                }
                Err(err) => self.show_error(err),
            },
            Message::InfoLoaded(Ok(report)) => {
                if let Some(Dialog::Info { report: slot, .. }) = &mut self.dialog {
                    *slot = Some(report);
                }
                Command::none()
            }
            Message::InfoLoaded(Err(err)) => self.show_error(err),
            Message::CopyInfo => match &mut self.dialog {
                Some(Dialog::Info {
                    report: Some(report),
                    copied,
                }) => {
                    *copied = true;
                    iced::clipboard::write(report.text())
                }
                _ => Command::none(),
            },
            Message::OpenFlathub => {
                if let Some(Dialog::Info {
                    report: Some(report), ..
                }) = &self.dialog
                {
                    open_url(&report.flathub_url());
                }
                Command::none()
            }
            Message::InstallEntryOpened => {
                self.dialog = Some(Dialog::InstallEntry {
                    input: String::new(),
                    resolving: false,
                });
                Command::none()
            }
            Message::InstallEntryChanged(value) => {
                if let Some(Dialog::InstallEntry { input, .. }) = &mut self.dialog {
                    *input = value;
                }
                Command::none()
            }
            Message::InstallEntrySubmitted => {
                let input = match &self.dialog {
                    Some(Dialog::InstallEntry { input, resolving: false }) => input.clone(),
                    _ => return Command::none(),
                };
                let app_id = match info::validate_app_id(&input) {
                    Ok(app_id) => app_id.to_string(),
                    Err(err) => return self.show_error(err),
                };
                self.dialog = Some(Dialog::InstallEntry { input, resolving: true });
                let service = self.session.service();
                let remote = self.session.remote_name().to_string();
                let arch = self.session.default_arch().to_string();
                blocking(
                    move || catalog::resolve(service.as_ref(), &remote, &app_id, &arch),
                    Message::EntryResolved,
                )
            }
            Message::EntryResolved(Ok(PackageRef::Remote(remote))) => {
                self.dialog = None;
                self.start_action(ActionRequest::Install {
                    id: remote.id,
                    remote: remote.remote_name,
                })
            }
            Message::EntryResolved(Ok(PackageRef::Installed(installed))) => self.show_error(
                FlatpakError::InvalidInput(format!("{} is already installed", installed.id.name)),
            ),
            Message::EntryResolved(Err(err)) => self.show_error(err),
            Message::InstallFromFilePressed => blocking(
                || Ok(pick_descriptor()),
                |picked: Result<Option<PathBuf>, FlatpakError>| Message::FileChosen(picked.ok().flatten()),
            ),
            Message::FileChosen(None) => Command::none(),
            Message::FileChosen(Some(path)) => {
                log::info!("installing from {}", path.display());
                blocking(move || RefDescriptor::load(&path), Message::FileLoaded)
            }
            Message::FileLoaded(Ok((descriptor, bytes))) => {
                self.start_action(ActionRequest::InstallFromFile { descriptor, bytes })
            }
            Message::FileLoaded(Err(err)) => self.show_error(err),
            Message::AboutPressed => {
                self.dialog = Some(Dialog::About);
                Command::none()
            }
            Message::ThemeToggled => {
                self.theme = self.theme.toggled();
                self.session.config_mut().dark_theme = self.theme.is_dark();
                if let Err(e) = self.session.config().save() {
                    log::warn!("could not save theme choice: {}", e);
                }
                Command::none()
            }
            Message::Action(ticket, event) => self.apply_action_event(ticket, event),
            Message::CancelAction(ticket) => {
                if let Some(panel) = self.panels.iter_mut().find(|p| p.ticket == ticket) {
                    panel.cancel_requested = true;
                }
                self.session.cancel(ticket);
                Command::none()
            }
            Message::ClosePanel(ticket) => {
                // actions that cannot be interrupted keep running once hidden
                if let Some(panel) = self.panels.iter().find(|p| p.ticket == ticket) {
                    if panel.can_cancel() {
                        self.session.cancel(ticket);
                    }
                }
                self.panels.retain(|p| p.ticket != ticket);
                Command::none()
            }
            Message::DismissDialog => {
                self.dialog = None;
                Command::none()
            }
        }
    }

    fn view(&self) -> Element<Message> {
        let palette = self.theme;
        let content: Element<Message> = match &self.dialog {
            Some(dialog) => self.view_dialog(dialog),
            None => column![self.view_toolbar(), self.view_table(), self.view_actions(), self.view_panels()]
                .spacing(12)
                .into(),
        };

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(Padding::new(16.0))
            .style(iced::theme::Container::Custom(Box::new(BackdropStyle {
                color: palette.background(),
            })))
            .into()
    }

    fn theme(&self) -> IcedTheme {
        self.theme.iced()
    }
}

impl FlatnestGUI {
    fn load_catalog(&self) -> Command<Message> {
        let service = self.session.service();
        let remote = self.session.remote_name().to_string();
        let arch = self.session.default_arch().to_string();
        blocking(
            move || catalog::load_catalog(service.as_ref(), &remote, &arch),
            Message::CatalogLoaded,
        )
    }

    fn selected_row(&self) -> Result<DisplayRow, FlatpakError> {
        self.selected
            .as_ref()
            .and_then(|id| self.store.find(id))
            .cloned()
            .ok_or(FlatpakError::SelectionRequired)
    }

    fn drop_stale_selection(&mut self) {
        if let Some(id) = &self.selected {
            if self.store.find(id).is_none() {
                self.selected = None;
            }
        }
    }

    fn show_error(&mut self, err: FlatpakError) -> Command<Message> {
        log::warn!("{}: {}", err.title(), err);
        self.dialog = Some(Dialog::Error(err));
        Command::none()
    }

    fn start_action(&mut self, request: ActionRequest) -> Command<Message> {
        let (ticket, cancel) = match self.session.begin(request.kind()) {
            Ok(started) => started,
            Err(err) => return self.show_error(err),
        };
        self.panels.push(ActionPanel::new(ticket, &request));
        let events = actions::event_stream(self.session.service(), request, self.session.context(), cancel);
        Command::run(events, move |event| Message::Action(ticket, event))
    }

    fn apply_action_event(&mut self, ticket: u64, event: ActionEvent) -> Command<Message> {
        if let Some(panel) = self.panels.iter_mut().find(|p| p.ticket == ticket) {
            panel.apply(&event);
        }
        let ActionEvent::Finished(report) = event else {
            return Command::none();
        };
        self.session.finish(ticket);
        match report.refresh {
            Refresh::None => {}
            Refresh::Row { id, row } => self.store.replace(&id, row),
            Refresh::Remove(id) => {
                self.store.remove(&id);
                self.drop_stale_selection();
            }
            Refresh::Catalog(rows) => {
                self.store.set_rows(rows);
                self.drop_stale_selection();
            }
            Refresh::Failed(err) => return self.show_error(err),
        }
        Command::none()
    }

    fn styled_button(&self, label: &str, kind: ButtonKind, on_press: Option<Message>) -> Element<Message> {
        let mut b = button(text(label).size(14))
            .style(iced::theme::Button::Custom(Box::new(ActionButtonStyle::new(kind, self.theme))))
            .padding(Padding::from([8, 14]));
        if let Some(message) = on_press {
            b = b.on_press(message);
        }
        b.into()
    }

    fn view_toolbar(&self) -> Element<Message> {
        let palette = self.theme;
        container(
            row![
                text_input("Search applications...", self.store.query())
                    .on_input(Message::QueryChanged)
                    .padding(Padding::new(10.0))
                    .width(Length::Fill)
                    .style(iced::theme::TextInput::Custom(Box::new(SearchInputStyle { palette }))),
                checkbox("Installed only", self.store.installed_only())
                    .on_toggle(Message::InstalledOnlyToggled)
                    .style(iced::theme::Checkbox::Custom(Box::new(ToggleStyle { palette }))),
                self.styled_button("Reload", ButtonKind::Secondary, (!self.loading).then_some(Message::Reload)),
                self.styled_button("Install by ID", ButtonKind::Secondary, Some(Message::InstallEntryOpened)),
                self.styled_button("Install from File", ButtonKind::Secondary, Some(Message::InstallFromFilePressed)),
                self.styled_button(
                    "Update All",
                    ButtonKind::Primary,
                    (!self.session.is_updating_all()).then_some(Message::UpdateAllPressed),
                ),
                self.styled_button(
                    if palette.is_dark() { "Light" } else { "Dark" },
                    ButtonKind::Secondary,
                    Some(Message::ThemeToggled),
                ),
                self.styled_button("About", ButtonKind::Secondary, Some(Message::AboutPressed)),
            ]
            .spacing(10)
            .align_items(alignment::Alignment::Center),
        )
        .padding(Padding::new(12.0))
        .width(Length::Fill)
        .style(iced::theme::Container::Custom(Box::new(CardStyle { palette, elevated: true })))
        .into()
    }

    fn view_table(&self) -> Element<Message> {
        let palette = self.theme;
        let header = SortColumn::ALL.iter().fold(row![].spacing(4), |header, &column| {
            let label = match self.store.sort() {
                Some((current, order)) if current == column => format!("{} {}", column.title(), order.arrow()),
                _ => column.title().to_string(),
            };
            header.push(
                button(text(label).size(13))
                    .on_press(Message::SortBy(column))
                    .width(Length::FillPortion(column_weight(column)))
                    .style(iced::theme::Button::Custom(Box::new(ActionButtonStyle::new(ButtonKind::Header, palette))))
                    .padding(Padding::from([6, 8])),
            )
        });

        let body: Element<Message> = if self.loading {
            container(text("Loading applications...").size(16))
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x()
                .center_y()
                .into()
        } else if let Some(err) = &self.load_error {
            container(text(err.to_string()).style(iced::theme::Text::Color(palette.danger())))
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x()
                .center_y()
                .into()
        } else if self.store.is_empty() {
            container(text("No applications available").size(16))
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x()
                .center_y()
                .into()
        } else {
            let rows = self
                .store
                .visible()
                .enumerate()
                .fold(column![].spacing(1), |rows, (index, display)| {
                    rows.push(self.view_row(index, display))
                });
            scrollable(rows)
                .height(Length::Fill)
                .style(iced::theme::Scrollable::Custom(Box::new(TableScrollStyle { palette })))
                .into()
        };

        container(column![header, body].spacing(6))
            .padding(Padding::new(8.0))
            .width(Length::Fill)
            .height(Length::Fill)
            .style(iced::theme::Container::Custom(Box::new(CardStyle { palette, elevated: false })))
            .into()
    }

    fn view_row<'a>(&self, index: usize, display: &'a DisplayRow) -> Element<'a, Message> {
        let palette = self.theme;
        let selected = self.selected.as_ref().map_or(false, |id| display.matches(id));
        let cells = SortColumn::ALL.iter().fold(row![].spacing(4), |cells, &column| {
            cells.push(
                text(display.column(column))
                    .size(13)
                    .width(Length::FillPortion(column_weight(column))),
            )
        });
        button(cells)
            .on_press(Message::RowSelected(display.id()))
            .width(Length::Fill)
            .padding(Padding::from([6, 8]))
            .style(iced::theme::Button::Custom(Box::new(TableRowStyle {
                selected,
                striped: index % 2 == 1,
                palette,
            })))
            .into()
    }

    fn view_actions(&self) -> Element<Message> {
        let palette = self.theme;
        let selection = self.selected_row().ok();
        // without a selection every button stays pressable and reports the missing selection
        let (can_run, can_install) = match &selection {
            Some(row) => (row.is_installed(), !row.is_installed()),
            None => (true, true),
        };
        let summary = format!("{} of {} applications shown", self.store.visible_len(), self.store.len());
        let selected_label = selection
            .as_ref()
            .map(|row| row.real_name.clone())
            .unwrap_or_else(|| "No application selected".to_string());

        row![
            column![
                text(selected_label).size(15),
                text(summary).size(12).style(iced::theme::Text::Color(palette.secondary_text())),
            ]
            .width(Length::Fill),
            self.styled_button("Info", ButtonKind::Secondary, Some(Message::InfoPressed)),
            self.styled_button("Run", ButtonKind::Secondary, can_run.then_some(Message::RunPressed)),
            self.styled_button("Uninstall", ButtonKind::Danger, can_run.then_some(Message::UninstallPressed)),
            self.styled_button("Install", ButtonKind::Primary, can_install.then_some(Message::InstallPressed)),
        ]
        .spacing(10)
        .align_items(alignment::Alignment::Center)
        .into()
    }

    fn view_panels(&self) -> Element<Message> {
        self.panels
            .iter()
            .fold(column![].spacing(8), |panels, panel| {
                panels.push(panel.view(
                    self.theme,
                    Message::CancelAction(panel.ticket),
                    Message::ClosePanel(panel.ticket),
                ))
            })
            .into()
    }

    fn view_dialog<'a>(&'a self, dialog: &'a Dialog) -> Element<'a, Message> {
        let palette = self.theme;
        let close = self.styled_button("Close", ButtonKind::Secondary, Some(Message::DismissDialog));

        let body: Element<Message> = match dialog {
            Dialog::Error(err) => column![
                text(err.title()).size(20).style(iced::theme::Text::Color(palette.danger())),
                text(err.to_string()).size(14),
                row![Space::with_width(Length::Fill), close],
            ]
            .spacing(14)
            .into(),
            Dialog::Info { report: None, .. } => column![
                text("Information").size(20),
                text("Loading details...").size(14),
                row![Space::with_width(Length::Fill), close],
            ]
            .spacing(14)
            .into(),
            Dialog::Info {
                report: Some(report),
                copied,
            } => {
                let fields = report.fields.iter().fold(column![].spacing(4), |fields, (key, value)| {
                    fields.push(
                        row![
                            text(key).size(13).width(Length::Fixed(140.0)).style(iced::theme::Text::Color(
                                palette.secondary_text()
                            )),
                            text(value).size(13).width(Length::Fill),
                        ]
                        .spacing(8),
                    )
                });
                column![
                    text(&report.app_id).size(20),
                    scrollable(fields)
                        .height(Length::Fixed(380.0))
                        .style(iced::theme::Scrollable::Custom(Box::new(TableScrollStyle { palette }))),
                    row![
                        self.styled_button(
                            if *copied { "Copied" } else { "Copy to Clipboard" },
                            ButtonKind::Secondary,
                            Some(Message::CopyInfo),
                        ),
                        self.styled_button("Flathub Page", ButtonKind::Secondary, Some(Message::OpenFlathub)),
                        Space::with_width(Length::Fill),
                        close,
                    ]
                    .spacing(10),
                ]
                .spacing(14)
                .into()
            }
            Dialog::InstallEntry { input, resolving } => {
                let mut entry = text_input("org.example.Application", input)
                    .padding(Padding::new(10.0))
                    .style(iced::theme::TextInput::Custom(Box::new(SearchInputStyle { palette })));
                if !resolving {
                    entry = entry
                        .on_input(Message::InstallEntryChanged)
                        .on_submit(Message::InstallEntrySubmitted);
                }
                column![
                    text("Install by Application ID").size(20),
                    entry,
                    row![
                        text(if *resolving { "Looking up application..." } else { "" })
                            .size(13)
                            .width(Length::Fill),
                        close,
                        self.styled_button(
                            "Install",
                            ButtonKind::Primary,
                            (!resolving).then_some(Message::InstallEntrySubmitted),
                        ),
                    ]
                    .spacing(10)
                    .align_items(alignment::Alignment::Center),
                ]
                .spacing(14)
                .into()
            }
            Dialog::About => column![
                text("Flatnest").size(22),
                text(format!("Version {}", env!("CARGO_PKG_VERSION"))).size(14),
                text(env!("CARGO_PKG_DESCRIPTION")).size(14),
                text(format!(
                    "Remote: {} | Architecture: {} | Installation: {}",
                    self.session.remote_name(),
                    self.session.default_arch(),
                    self.session.config().installation.as_str()
                ))
                .size(12)
                .style(iced::theme::Text::Color(palette.secondary_text())),
                row![Space::with_width(Length::Fill), close],
            ]
            .spacing(12)
            .into(),
        };

        container(
            container(body)
                .padding(Padding::new(24.0))
                .max_width(640)
                .style(iced::theme::Container::Custom(Box::new(CardStyle { palette, elevated: true }))),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x()
        .center_y()
        .into()
    }
}

fn column_weight(column: SortColumn) -> u16 {
    match column {
        SortColumn::RealName => 4,
        SortColumn::Name => 3,
        SortColumn::InstalledSize | SortColumn::DownloadSize => 2,
        SortColumn::Arch | SortColumn::Branch | SortColumn::Remote => 1,
    }
}
