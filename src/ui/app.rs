use std::mem;
use std::path::PathBuf;

use anyhow::{Error, Result};
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap,
};
use ratatui::Frame;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::{
    delete_book, delete_user, get_copy_summary, insert_book, insert_user, update_book,
    update_inventory, update_user,
};
use crate::error::StoreResult;
use crate::export::{export_catalog, ExportNaming};
use crate::models::{BookDraft, UserDraft};
use crate::session::{BookListing, Listing, PanelSession, SearchQuery, UserListing};
use crate::validation::{Validation, BOOK_FIELDS, USER_FIELDS};

use super::forms::{ConfirmUserDelete, FormState, InventoryForm, INVENTORY_LABELS};
use super::helpers::{book_status_style, centered_rect, surface_error, user_status_style};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
const TABS_HEIGHT: u16 = 3;

/// Which panel is in front. Each panel keeps its own session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Books,
    Users,
}

impl Tab {
    fn other(self) -> Self {
        match self {
            Tab::Books => Tab::Users,
            Tab::Users => Tab::Books,
        }
    }

    fn index(self) -> usize {
        match self {
            Tab::Books => 0,
            Tab::Users => 1,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Tab::Books => "book",
            Tab::Users => "user",
        }
    }
}

/// Modal states layered over the active panel.
enum Mode {
    Normal,
    /// Create/edit form for the active tab's entity.
    Editing(FormState),
    Searching(SearchState),
    GoToPage(String),
    Inventory(InventoryForm),
    ConfirmUserDelete(ConfirmUserDelete),
}

/// Search bar contents while it is being typed.
struct SearchState {
    query: String,
    exact: bool,
}

impl From<&SearchQuery> for SearchState {
    fn from(query: &SearchQuery) -> Self {
        Self {
            query: query.term.clone(),
            exact: query.exact,
        }
    }
}

/// Pager actions shared by both panels.
enum Nav {
    Next,
    Previous,
    GoTo(String),
    CyclePageSize,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    conn: Connection,
    tab: Tab,
    books: PanelSession<BookListing>,
    users: PanelSession<UserListing>,
    mode: Mode,
    status: Option<StatusMessage>,
    export_dir: PathBuf,
    export_naming: ExportNaming,
}

impl App {
    /// Build the app and load the first page of both panels.
    pub fn new(conn: Connection, config: &AppConfig) -> Result<Self> {
        let mut app = Self {
            conn,
            tab: Tab::Books,
            books: PanelSession::new(config.page_size),
            users: PanelSession::new(config.page_size),
            mode: Mode::Normal,
            status: None,
            export_dir: config.export_dir.clone(),
            export_naming: config.export_naming,
        };
        app.books.refresh(&app.conn)?;
        app.users.refresh(&app.conn)?;
        Ok(app)
    }

    /// Route a key press to the active mode. Returns `true` when the user
    /// asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mut mode = mem::replace(&mut self.mode, Mode::Normal);

        mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::Editing(form) => self.handle_form(code, form)?,
            Mode::Searching(state) => self.handle_search(code, state)?,
            Mode::GoToPage(input) => self.handle_go_to_page(code, input)?,
            Mode::Inventory(form) => self.handle_inventory(code, form)?,
            Mode::ConfirmUserDelete(confirm) => self.handle_confirm_user_delete(code, confirm)?,
        };

        self.mode = mode;
        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                *exit = true;
            }
            KeyCode::Tab | KeyCode::BackTab => self.switch_tab(self.tab.other()),
            KeyCode::Char('1') => self.switch_tab(Tab::Books),
            KeyCode::Char('2') => self.switch_tab(Tab::Users),
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Home => match self.tab {
                Tab::Books => self.books.select_first(),
                Tab::Users => self.users.select_first(),
            },
            KeyCode::End => match self.tab {
                Tab::Books => self.books.select_last(),
                Tab::Users => self.users.select_last(),
            },
            KeyCode::Left | KeyCode::PageUp => self.navigate(Nav::Previous),
            KeyCode::Right | KeyCode::PageDown => self.navigate(Nav::Next),
            KeyCode::Char('z') => self.navigate(Nav::CyclePageSize),
            KeyCode::Char('g') => return Ok(Mode::GoToPage(String::new())),
            KeyCode::Char('f') | KeyCode::Char('/') => {
                let state = match self.tab {
                    Tab::Books => SearchState::from(self.books.query()),
                    Tab::Users => SearchState::from(self.users.query()),
                };
                return Ok(Mode::Searching(state));
            }
            KeyCode::Char('t') => self.toggle_exact(),
            KeyCode::Char('c') => self.apply_search("", self.active_query().exact),
            KeyCode::Char('+') | KeyCode::Char('a') => return Ok(self.open_new_form()),
            KeyCode::Char('e') | KeyCode::Enter => return Ok(self.open_edit_form()),
            KeyCode::Char('-') | KeyCode::Char('d') => return Ok(self.delete_selected()),
            KeyCode::Char('i') => return Ok(self.open_inventory()),
            KeyCode::Char('x') => self.export(),
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_form(&mut self, code: KeyCode, mut form: FormState) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Left => form.cycle_choice(false),
            KeyCode::Right => form.cycle_choice(true),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => keep_open = !self.save_form(&mut form),
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::Editing(form))
        } else {
            self.set_editing(None);
            Ok(Mode::Normal)
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Search cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => {
                self.apply_search(&state.query, state.exact);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::BackTab => state.exact = !state.exact,
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) => state.query.push(ch),
            _ => {}
        }
        Ok(Mode::Searching(state))
    }

    fn handle_go_to_page(&mut self, code: KeyCode, mut input: String) -> Result<Mode> {
        match code {
            KeyCode::Esc => return Ok(Mode::Normal),
            KeyCode::Enter => {
                self.navigate(Nav::GoTo(input));
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(ch) if ch.is_ascii_digit() => input.push(ch),
            _ => {}
        }
        Ok(Mode::GoToPage(input))
    }

    fn handle_inventory(&mut self, code: KeyCode, mut form: InventoryForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Inventory edit cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_inventory(&form) {
                Ok(message) => {
                    self.set_status(message, StatusKind::Info);
                    return Ok(Mode::Normal);
                }
                Err(err) => {
                    let message = err.to_string();
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::Inventory(form))
    }

    fn handle_confirm_user_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmUserDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_user_delete(&confirm) {
                    Ok(_) => Ok(Mode::Normal),
                    Err(err) => {
                        self.report_error(&err);
                        Ok(Mode::ConfirmUserDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmUserDelete(confirm)),
        }
    }

    /// Ctrl-U resets the open form to its defaults, or empties the search bar.
    pub(crate) fn handle_ctrl_u(&mut self) -> Result<()> {
        match &mut self.mode {
            Mode::Editing(form) => {
                form.clear();
                self.set_editing(None);
                self.set_status("Form cleared.", StatusKind::Info);
            }
            Mode::Searching(state) => state.query.clear(),
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(TABS_HEIGHT),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(area);

        self.draw_tabs(frame, chunks[0]);
        self.draw_filter_line(frame, chunks[1]);
        match self.tab {
            Tab::Books => self.draw_books(frame, chunks[2]),
            Tab::Users => self.draw_users(frame, chunks[2]),
        }
        self.draw_pager(frame, chunks[3]);
        self.draw_footer(frame, chunks[4]);

        match &self.mode {
            Mode::Editing(form) => self.draw_form(frame, area, form),
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::GoToPage(input) => self.draw_go_to_page(frame, area, input),
            Mode::Inventory(form) => self.draw_inventory(frame, area, form),
            Mode::ConfirmUserDelete(confirm) => self.draw_confirm_user(frame, area, confirm),
            Mode::Normal => {}
        }
    }

    fn draw_tabs(&self, frame: &mut Frame, area: Rect) {
        let tabs = Tabs::new(vec!["[1] Books", "[2] Users"])
            .select(self.tab.index())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Library Manager"),
            )
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn draw_filter_line(&self, frame: &mut Frame, area: Rect) {
        let query = self.active_query();
        let mode = if query.exact { "exact" } else { "contains" };
        let line = if query.is_active() {
            Line::from(vec![
                Span::raw(" Filter: "),
                Span::styled(
                    format!("\"{}\"", query.term.trim()),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(format!(" ({mode})"), Style::default().fg(Color::Gray)),
            ])
        } else {
            Line::from(Span::styled(
                format!(" No filter ({mode} match)"),
                Style::default().fg(Color::DarkGray),
            ))
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_books(&self, frame: &mut Frame, area: Rect) {
        let header = ["Book #", "Title", "Author", "Language", "Genre", "Status"];
        let widths = vec![
            Constraint::Length(8),
            Constraint::Percentage(32),
            Constraint::Percentage(22),
            Constraint::Percentage(12),
            Constraint::Percentage(14),
            Constraint::Length(14),
        ];
        let rows = self
            .books
            .rows()
            .iter()
            .map(|book| {
                Row::new(vec![
                    Cell::from(book.book_number.to_string()),
                    Cell::from(book.title.clone()),
                    Cell::from(book.author.clone()),
                    Cell::from(book.language.clone()),
                    Cell::from(book.genre.clone()),
                    Cell::from(book.status.as_str()).style(book_status_style(book.status)),
                ])
            })
            .collect();
        self.render_table(frame, area, "Catalog", &header, widths, rows, &self.books);
    }

    fn draw_users(&self, frame: &mut Frame, area: Rect) {
        let header = ["Name", "Email", "Phone", "Membership", "Status"];
        let widths = vec![
            Constraint::Percentage(26),
            Constraint::Percentage(32),
            Constraint::Percentage(16),
            Constraint::Length(12),
            Constraint::Length(10),
        ];
        let rows = self
            .users
            .rows()
            .iter()
            .map(|user| {
                Row::new(vec![
                    Cell::from(user.name.clone()),
                    Cell::from(user.email.clone()),
                    Cell::from(user.phone.clone()),
                    Cell::from(user.membership_type.as_str()),
                    Cell::from(user.status.as_str()).style(user_status_style(user.status)),
                ])
            })
            .collect();
        self.render_table(frame, area, "Members", &header, widths, rows, &self.users);
    }

    #[allow(clippy::too_many_arguments)]
    fn render_table<L: Listing>(
        &self,
        frame: &mut Frame,
        area: Rect,
        title: &str,
        header: &[&'static str],
        widths: Vec<Constraint>,
        rows: Vec<Row<'static>>,
        session: &PanelSession<L>,
    ) {
        let block = Block::default().borders(Borders::ALL).title(title.to_string());
        if rows.is_empty() {
            let message = if session.is_filtered() {
                format!("No {}s match the current filter.", self.tab.noun())
            } else {
                format!("No {}s yet. Press '+' to add one.", self.tab.noun())
            };
            let paragraph = Paragraph::new(message)
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let header_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let table = Table::new(rows, widths)
            .header(Row::new(header.to_vec()).style(header_style))
            .block(block)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = TableState::default().with_selected(Some(session.selected_index()));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_pager(&self, frame: &mut Frame, area: Rect) {
        let pager = match self.tab {
            Tab::Books => self.books.pager(),
            Tab::Users => self.users.pager(),
        };
        let line = Line::from(vec![
            Span::raw(format!(" {}", pager.label())),
            Span::styled(
                format!(" | {} per page", pager.page_size()),
                Style::default().fg(Color::Gray),
            ),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let pairs: &[(&str, &str)] = match (&self.mode, self.tab) {
            (Mode::Editing(_), _) => &[
                ("[Tab]", " Next field   "),
                ("[←→]", " Change choice   "),
                ("[Enter]", " Save   "),
                ("[Ctrl-U]", " Clear   "),
                ("[Esc]", " Cancel"),
            ],
            (Mode::Searching(_), _) => &[
                ("[Enter]", " Apply   "),
                ("[Tab]", " Toggle exact   "),
                ("[Ctrl-U]", " Clear   "),
                ("[Esc]", " Cancel"),
            ],
            (Mode::GoToPage(_), _) => &[("[Enter]", " Go   "), ("[Esc]", " Cancel")],
            (Mode::Inventory(_), _) => &[
                ("[Tab]", " Next counter   "),
                ("[Enter]", " Save   "),
                ("[Esc]", " Cancel"),
            ],
            (Mode::ConfirmUserDelete(_), _) => &[("[Y]", " Delete   "), ("[N]", " Keep")],
            (Mode::Normal, Tab::Books) => &[
                ("[+]", " Add   "),
                ("[e]", " Edit   "),
                ("[-]", " Delete   "),
                ("[i]", " Inventory   "),
                ("[f]", " Search   "),
                ("[←→]", " Page   "),
                ("[g]", " Go to   "),
                ("[z]", " Page size   "),
                ("[x]", " Export   "),
                ("[q]", " Quit"),
            ],
            (Mode::Normal, Tab::Users) => &[
                ("[+]", " Add   "),
                ("[e]", " Edit   "),
                ("[-]", " Delete   "),
                ("[f]", " Search   "),
                ("[t]", " Exact   "),
                ("[←→]", " Page   "),
                ("[g]", " Go to   "),
                ("[z]", " Page size   "),
                ("[q]", " Quit"),
            ],
        };

        Line::from(
            pairs
                .iter()
                .flat_map(|(key, label)| {
                    [
                        Span::styled(key.to_string(), key_style),
                        Span::raw(label.to_string()),
                    ]
                })
                .collect::<Vec<_>>(),
        )
    }

    fn draw_form(&self, frame: &mut Frame, area: Rect, form: &FormState) {
        let popup_area = centered_rect(70, 70, area);
        frame.render_widget(Clear, popup_area);

        let action = if form.editing.is_some() { "Edit" } else { "Add" };
        let title = match self.tab {
            Tab::Books => format!("{action} Book"),
            Tab::Users => format!("{action} User"),
        };
        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = (0..form.specs.len())
            .map(|idx| form.build_line(idx))
            .collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • ←→ to pick • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        frame.render_widget(Paragraph::new(lines), inner);
        frame.set_cursor_position((
            inner.x + form.cursor_offset(),
            inner.y + form.active as u16,
        ));
    }

    fn draw_inventory(&self, frame: &mut Frame, area: Rect, form: &InventoryForm) {
        let popup_area = centered_rect(50, 45, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!("Copies of {}", form.title))
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = INVENTORY_LABELS
            .iter()
            .zip(form.values.iter())
            .enumerate()
            .map(|(idx, (label, value))| {
                let style = if idx == form.active {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                };
                Line::from(vec![
                    Span::raw(format!("{label}: ")),
                    Span::styled(value.clone(), style),
                ])
            })
            .collect();
        lines.push(Line::from(Span::styled(
            format!("Total: {}", form.preview_total()),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        frame.render_widget(Paragraph::new(lines), inner);

        let label = INVENTORY_LABELS[form.active];
        let cursor_x = inner.x
            + label.len() as u16
            + 2
            + form.values[form.active].chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y + form.active as u16));
    }

    fn draw_confirm_user(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmUserDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Confirm Delete")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!("Delete {}?", confirm.label)),
            Line::from("This cannot be undone."),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let title = if state.exact {
            "Search (exact match)"
        } else {
            "Search (contains)"
        };
        let block = Block::default().borders(Borders::ALL).title(title);
        let paragraph = Paragraph::new(Span::raw(format!("Search: {}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Search: ".len() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_go_to_page(&self, frame: &mut Frame, area: Rect, input: &str) {
        let popup_area = centered_rect(40, 20, area);
        frame.render_widget(Clear, popup_area);

        let total_pages = match self.tab {
            Tab::Books => self.books.pager().total_pages(),
            Tab::Users => self.users.pager().total_pages(),
        };
        let block = Block::default()
            .title(format!("Go to page (1-{total_pages})"))
            .borders(Borders::ALL);
        let paragraph = Paragraph::new(format!("Page: {input}")).block(block.clone());
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Page: ".len() as u16 + input.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    /// Show the innermost cause in the footer and keep the full chain in the log.
    fn report_error(&mut self, err: &Error) {
        warn!("operation failed: {err:#}");
        self.set_status(surface_error(err), StatusKind::Error);
    }

    fn active_query(&self) -> &SearchQuery {
        match self.tab {
            Tab::Books => self.books.query(),
            Tab::Users => self.users.query(),
        }
    }

    fn set_editing(&mut self, id: Option<i64>) {
        match self.tab {
            Tab::Books => self.books.set_editing(id),
            Tab::Users => self.users.set_editing(id),
        }
    }

    fn switch_tab(&mut self, tab: Tab) {
        if self.tab != tab {
            self.tab = tab;
            self.status = None;
        }
    }

    fn move_selection(&mut self, offset: isize) {
        match self.tab {
            Tab::Books => self.books.move_selection(offset),
            Tab::Users => self.users.move_selection(offset),
        }
    }

    fn navigate(&mut self, nav: Nav) {
        let result = match self.tab {
            Tab::Books => navigate_session(&mut self.books, &self.conn, &nav),
            Tab::Users => navigate_session(&mut self.users, &self.conn, &nav),
        };
        match result {
            Ok(Some(message)) => self.set_status(message, StatusKind::Info),
            Ok(None) => {}
            Err(err) => self.report_error(&err.into()),
        }
    }

    fn apply_search(&mut self, term: &str, exact: bool) {
        let result = match self.tab {
            Tab::Books => self.books.apply_search(&self.conn, term, exact),
            Tab::Users => self.users.apply_search(&self.conn, term, exact),
        };
        if let Err(err) = result {
            self.report_error(&err.into());
            return;
        }

        let (filtered, total) = match self.tab {
            Tab::Books => (self.books.is_filtered(), self.books.pager().total()),
            Tab::Users => (self.users.is_filtered(), self.users.pager().total()),
        };
        let message = if filtered {
            format!("Found {total} matching {}(s).", self.tab.noun())
        } else {
            format!("Showing all {}s.", self.tab.noun())
        };
        self.set_status(message, StatusKind::Info);
    }

    fn toggle_exact(&mut self) {
        let result = match self.tab {
            Tab::Books => self.books.toggle_exact(&self.conn),
            Tab::Users => self.users.toggle_exact(&self.conn),
        };
        match result {
            Ok(true) => self.set_status("Exact match on.", StatusKind::Info),
            Ok(false) => self.set_status("Exact match off.", StatusKind::Info),
            Err(err) => self.report_error(&err.into()),
        }
    }

    fn open_new_form(&mut self) -> Mode {
        self.set_editing(None);
        match self.tab {
            Tab::Books => Mode::Editing(FormState::blank(BOOK_FIELDS)),
            Tab::Users => Mode::Editing(FormState::blank(USER_FIELDS)),
        }
    }

    fn open_edit_form(&mut self) -> Mode {
        let selected = match self.tab {
            Tab::Books => self
                .books
                .current_row()
                .map(|book| (book.id, BOOK_FIELDS, book.form_values())),
            Tab::Users => self
                .users
                .current_row()
                .map(|user| (user.id, USER_FIELDS, user.form_values())),
        };
        let Some((id, specs, values)) = selected else {
            self.set_status(
                format!("No {} selected to edit.", self.tab.noun()),
                StatusKind::Error,
            );
            return Mode::Normal;
        };
        self.set_editing(Some(id));
        Mode::Editing(FormState::for_edit(specs, id, values))
    }

    /// Validate and persist the form. Returns `true` when it can close.
    fn save_form(&mut self, form: &mut FormState) -> bool {
        let validation = form.validate();
        if let Err(err) = validation.ensure_valid() {
            let message = err.to_string();
            form.error = Some(message.clone());
            self.set_status(message, StatusKind::Error);
            return false;
        }

        let result = match self.tab {
            Tab::Books => self.save_book(&validation, form.editing),
            Tab::Users => self.save_user(&validation, form.editing),
        };
        match result {
            Ok(message) => {
                self.set_status(message, StatusKind::Info);
                self.resync_active();
                true
            }
            Err(err) => {
                let message = err.to_string();
                let fields = err.highlight_fields();
                if fields.is_empty() {
                    form.error = Some(message.clone());
                } else {
                    form.mark(fields, message.clone());
                }
                self.set_status(message, StatusKind::Error);
                false
            }
        }
    }

    fn save_book(&mut self, validation: &Validation, editing: Option<i64>) -> StoreResult<String> {
        let draft = BookDraft::from_validation(validation)?;
        match editing {
            Some(id) => {
                update_book(&self.conn, id, &draft)?;
                Ok(format!("Updated \"{}\".", draft.title))
            }
            None => {
                let book = insert_book(&self.conn, &draft)?;
                Ok(format!(
                    "Added \"{}\" (Book Number: {}).",
                    book.title, book.book_number
                ))
            }
        }
    }

    fn save_user(&mut self, validation: &Validation, editing: Option<i64>) -> StoreResult<String> {
        let draft = UserDraft::from_validation(validation)?;
        match editing {
            Some(id) => {
                update_user(&self.conn, id, &draft)?;
                Ok(format!("Updated {}.", draft.name))
            }
            None => {
                let user = insert_user(&self.conn, &draft)?;
                Ok(format!("Added {user}."))
            }
        }
    }

    /// Reload the active panel after a write, keeping its filter.
    fn resync_active(&mut self) {
        let result = match self.tab {
            Tab::Books => self.books.resync(&self.conn),
            Tab::Users => self.users.resync(&self.conn),
        };
        if let Err(err) = result {
            self.report_error(&err.into());
        }
    }

    /// Books go immediately; users need a confirmation first.
    fn delete_selected(&mut self) -> Mode {
        match self.tab {
            Tab::Books => {
                let Some((id, title)) = self
                    .books
                    .current_row()
                    .map(|book| (book.id, book.title.clone()))
                else {
                    self.set_status("No book selected to delete.", StatusKind::Error);
                    return Mode::Normal;
                };
                match delete_book(&self.conn, id) {
                    Ok(()) => {
                        self.set_status(format!("Deleted \"{title}\"."), StatusKind::Info);
                        self.resync_active();
                    }
                    Err(err) => self.report_error(&err.into()),
                }
                Mode::Normal
            }
            Tab::Users => match self.users.current_row() {
                Some(user) => Mode::ConfirmUserDelete(ConfirmUserDelete::from(user)),
                None => {
                    self.set_status("No user selected to delete.", StatusKind::Error);
                    Mode::Normal
                }
            },
        }
    }

    fn perform_user_delete(&mut self, confirm: &ConfirmUserDelete) -> Result<()> {
        delete_user(&self.conn, confirm.id)?;
        self.users.resync(&self.conn)?;
        self.set_status(format!("Deleted {}.", confirm.label), StatusKind::Info);
        Ok(())
    }

    fn open_inventory(&mut self) -> Mode {
        if self.tab != Tab::Books {
            self.set_status("Inventory is only tracked for books.", StatusKind::Error);
            return Mode::Normal;
        }
        let Some((id, title)) = self
            .books
            .current_row()
            .map(|book| (book.id, book.title.clone()))
        else {
            self.set_status("No book selected.", StatusKind::Error);
            return Mode::Normal;
        };
        match get_copy_summary(&self.conn, id) {
            Ok(summary) => Mode::Inventory(InventoryForm::new(id, title, summary)),
            Err(err) => {
                self.report_error(&err.into());
                Mode::Normal
            }
        }
    }

    fn save_inventory(&mut self, form: &InventoryForm) -> StoreResult<String> {
        let update = form.to_update()?;
        if update.is_empty() {
            return Ok("Inventory unchanged.".to_string());
        }
        let summary = update_inventory(&self.conn, form.book_id, &update)?;
        Ok(format!(
            "Inventory saved for \"{}\": {} copies in total.",
            form.title, summary.total
        ))
    }

    fn export(&mut self) {
        match export_catalog(&self.conn, &self.export_dir, self.export_naming) {
            Ok(path) => {
                info!(path = %path.display(), "export requested from the catalog panel");
                self.set_status(
                    format!("Exported catalog to {}.", path.display()),
                    StatusKind::Info,
                );
            }
            Err(err) => self.report_error(&err.into()),
        }
    }
}

/// Apply a pager action to one panel. Returns a status line when the action
/// has something to announce.
fn navigate_session<L: Listing>(
    session: &mut PanelSession<L>,
    conn: &Connection,
    nav: &Nav,
) -> StoreResult<Option<String>> {
    match nav {
        Nav::Next => {
            session.next_page(conn)?;
            Ok(None)
        }
        Nav::Previous => {
            session.previous_page(conn)?;
            Ok(None)
        }
        Nav::GoTo(input) => {
            session.go_to_page(conn, input)?;
            Ok(None)
        }
        Nav::CyclePageSize => {
            let size = session.cycle_page_size(conn)?;
            Ok(Some(format!("Showing {size} rows per page.")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_books, count_users, test_connection};

    fn app() -> App {
        App::new(test_connection(), &AppConfig::default()).unwrap()
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    fn add_book(app: &mut App, number: &str, title: &str, author: &str) {
        app.handle_key(KeyCode::Char('+')).unwrap();
        type_text(app, number);
        app.handle_key(KeyCode::Tab).unwrap();
        type_text(app, title);
        app.handle_key(KeyCode::Tab).unwrap();
        type_text(app, author);
        app.handle_key(KeyCode::Enter).unwrap();
    }

    #[test]
    fn adding_a_book_closes_the_form_and_lists_it() {
        let mut app = app();
        add_book(&mut app, "7", "Dune", "Frank Herbert");
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.books.rows().len(), 1);
        assert_eq!(app.books.rows()[0].title, "Dune");
        assert_eq!(app.books.pager().label(), "Page 1 of 1 | Total: 1");
    }

    #[test]
    fn empty_form_marks_every_required_field() {
        let mut app = app();
        app.handle_key(KeyCode::Char('+')).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();
        let Mode::Editing(form) = &app.mode else {
            panic!("form should stay open");
        };
        assert_eq!(form.invalid, vec!["book_number", "title", "author"]);
        assert_eq!(count_books(&app.conn).unwrap(), 0);
    }

    #[test]
    fn duplicate_title_highlights_the_title_field() {
        let mut app = app();
        add_book(&mut app, "1", "Dune", "Frank Herbert");
        add_book(&mut app, "2", "Dune", "Someone Else");
        let Mode::Editing(form) = &app.mode else {
            panic!("form should stay open");
        };
        assert_eq!(form.invalid, vec!["title"]);
        assert_eq!(form.active, 1);
        assert_eq!(count_books(&app.conn).unwrap(), 1);
    }

    #[test]
    fn editing_keeps_the_same_natural_key() {
        let mut app = app();
        add_book(&mut app, "1", "Dune", "Frank Herbert");
        app.handle_key(KeyCode::Char('e')).unwrap();
        assert_eq!(app.books.editing(), Some(app.books.rows()[0].id));
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.books.editing(), None);
    }

    #[test]
    fn user_delete_waits_for_confirmation() {
        let mut app = app();
        app.handle_key(KeyCode::Char('2')).unwrap();
        app.handle_key(KeyCode::Char('+')).unwrap();
        type_text(&mut app, "Ada");
        app.handle_key(KeyCode::Tab).unwrap();
        type_text(&mut app, "ada@example.com");
        app.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(count_users(&app.conn).unwrap(), 1);

        app.handle_key(KeyCode::Char('d')).unwrap();
        assert!(matches!(app.mode, Mode::ConfirmUserDelete(_)));
        app.handle_key(KeyCode::Char('n')).unwrap();
        assert_eq!(count_users(&app.conn).unwrap(), 1);

        app.handle_key(KeyCode::Char('d')).unwrap();
        app.handle_key(KeyCode::Char('y')).unwrap();
        assert_eq!(count_users(&app.conn).unwrap(), 0);
        assert!(app.users.rows().is_empty());
    }

    #[test]
    fn book_delete_is_immediate() {
        let mut app = app();
        add_book(&mut app, "1", "Dune", "Frank Herbert");
        app.handle_key(KeyCode::Char('-')).unwrap();
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(count_books(&app.conn).unwrap(), 0);
    }

    #[test]
    fn search_filters_and_clear_restores() {
        let mut app = app();
        add_book(&mut app, "1", "Alice in Wonderland", "Lewis Carroll");
        add_book(&mut app, "2", "Dune", "Frank Herbert");

        app.handle_key(KeyCode::Char('f')).unwrap();
        type_text(&mut app, "ali");
        app.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(app.books.pager().total(), 1);

        app.handle_key(KeyCode::Char('t')).unwrap();
        assert_eq!(app.books.pager().total(), 0);

        app.handle_key(KeyCode::Char('c')).unwrap();
        assert_eq!(app.books.pager().total(), 2);
    }

    #[test]
    fn inventory_dialog_saves_changed_counters() {
        let mut app = app();
        add_book(&mut app, "1", "Dune", "Frank Herbert");
        let id = app.books.rows()[0].id;

        app.handle_key(KeyCode::Char('i')).unwrap();
        app.handle_key(KeyCode::Tab).unwrap();
        app.handle_key(KeyCode::Backspace).unwrap();
        type_text(&mut app, "2");
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(matches!(app.mode, Mode::Normal));

        let summary = get_copy_summary(&app.conn, id).unwrap();
        assert_eq!(summary.lent, 2);
        assert_eq!(summary.total, 2);
    }

    #[test]
    fn ctrl_u_turns_an_edit_into_a_new_record() {
        let mut app = app();
        add_book(&mut app, "1", "Dune", "Frank Herbert");
        app.handle_key(KeyCode::Char('e')).unwrap();
        app.handle_ctrl_u().unwrap();
        let Mode::Editing(form) = &app.mode else {
            panic!("form should stay open");
        };
        assert_eq!(form.editing, None);
        assert!(form.values[1].is_empty());
    }
}
