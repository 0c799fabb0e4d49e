use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
};
use std::io::stdout;

use crate::matcher::stars;
use crate::models::{parse_deadline, ApplicationRecord, ApplicationStatus};
use crate::store::{sort_by_deadline, ApplicationStore};

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    Normal,
    EditDeadline(String),
}

#[derive(Debug, PartialEq)]
enum Action {
    Continue,
    Save,
    Quit,
}

struct AppState {
    records: Vec<ApplicationRecord>,
    selected: usize,
    mode: Mode,
    dirty: bool,
    quit_armed: bool,
    message: Option<String>,
}

impl AppState {
    fn new(mut records: Vec<ApplicationRecord>) -> Self {
        sort_by_deadline(&mut records);
        Self {
            records,
            selected: 0,
            mode: Mode::Normal,
            dirty: false,
            quit_armed: false,
            message: None,
        }
    }

    fn current(&self) -> Option<&ApplicationRecord> {
        self.records.get(self.selected)
    }

    fn next(&mut self) {
        if !self.records.is_empty() && self.selected < self.records.len() - 1 {
            self.selected += 1;
        }
    }

    fn prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn set_status(&mut self, status: ApplicationStatus) {
        if let Some(record) = self.records.get_mut(self.selected) {
            if record.status != status {
                record.status = status;
                self.dirty = true;
            }
            self.message = Some(format!("Status set to {}", status));
        }
    }

    fn begin_deadline_edit(&mut self) {
        if let Some(record) = self.current() {
            let current = record.deadline.map(|d| d.to_string()).unwrap_or_default();
            self.mode = Mode::EditDeadline(current);
        }
    }

    fn commit_deadline(&mut self, input: &str) {
        match parse_deadline(input) {
            Ok(deadline) => {
                if let Some(record) = self.records.get_mut(self.selected) {
                    if record.deadline != deadline {
                        record.deadline = deadline;
                        self.dirty = true;
                    }
                }
                self.message = Some(match deadline {
                    Some(d) => format!("Deadline set to {}", d),
                    None => "Deadline cleared".to_string(),
                });
            }
            Err(e) => self.message = Some(e.to_string()),
        }
        self.mode = Mode::Normal;
    }

    fn handle_key(&mut self, code: KeyCode) -> Action {
        if let Mode::EditDeadline(buffer) = &mut self.mode {
            match code {
                KeyCode::Enter => {
                    let input = buffer.clone();
                    self.commit_deadline(&input);
                }
                KeyCode::Esc => self.mode = Mode::Normal,
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) if c.is_ascii_alphanumeric() || c == '-' => buffer.push(c),
                _ => {}
            }
            return Action::Continue;
        }

        let armed = std::mem::take(&mut self.quit_armed);
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if self.dirty && !armed {
                    self.quit_armed = true;
                    self.message = Some("Unsaved changes: s to save, q again to discard".to_string());
                } else {
                    return Action::Quit;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.prev(),
            KeyCode::Char('a') => self.set_status(ApplicationStatus::Applied),
            KeyCode::Char('i') => self.set_status(ApplicationStatus::Interviewing),
            KeyCode::Char('x') => self.set_status(ApplicationStatus::Rejected),
            KeyCode::Char('h') => self.set_status(ApplicationStatus::Hired),
            KeyCode::Char('d') => self.begin_deadline_edit(),
            KeyCode::Char('s') => return Action::Save,
            _ => {}
        }
        Action::Continue
    }
}

pub fn run_tracker(store: &ApplicationStore) -> Result<()> {
    let records = store.load()?;
    if records.is_empty() {
        println!("No applications tracked yet.");
        return Ok(());
    }

    let mut state = AppState::new(records);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, store);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    store: &ApplicationStore,
) -> Result<()> {
    let mut table_state = TableState::default().with_selected(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut table_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match state.handle_key(key.code) {
                Action::Quit => break,
                Action::Save => match store.overwrite(&state.records) {
                    Ok(()) => {
                        state.dirty = false;
                        state.message = Some(format!("Tracker updated ({} rows)", state.records.len()));
                    }
                    Err(e) => state.message = Some(format!("Save failed: {}", e)),
                },
                Action::Continue => {}
            }
            table_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn status_style(status: ApplicationStatus) -> Style {
    match status {
        ApplicationStatus::Applied => Style::default().fg(Color::Cyan),
        ApplicationStatus::Interviewing => Style::default().fg(Color::Yellow),
        ApplicationStatus::Rejected => Style::default().fg(Color::Red),
        ApplicationStatus::Hired => Style::default().fg(Color::Green),
    }
}

fn draw(frame: &mut Frame, state: &AppState, table_state: &mut TableState) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(outer[0]);

    let header = Row::new(["", "Job Title", "Company", "Status", "Deadline"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = state
        .records
        .iter()
        .map(|r| {
            Row::new(vec![
                Cell::from(r.status.match_label()),
                Cell::from(r.title.clone()),
                Cell::from(r.company.clone()),
                Cell::from(Span::styled(r.status.as_str(), status_style(r.status))),
                Cell::from(r.deadline.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(3),
        Constraint::Percentage(40),
        Constraint::Percentage(25),
        Constraint::Length(13),
        Constraint::Length(11),
    ];

    let title = format!(
        " Applications ({}){} ",
        state.records.len(),
        if state.dirty { " *" } else { "" }
    );
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(table, chunks[0], table_state);

    let detail = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, chunks[1]);

    let status_line = match &state.mode {
        Mode::EditDeadline(buffer) => format!(" Deadline (YYYY-MM-DD, empty clears): {}_", buffer),
        Mode::Normal => state.message.clone().unwrap_or_default(),
    };
    frame.render_widget(
        Paragraph::new(status_line).style(Style::default().fg(Color::Yellow)),
        outer[1],
    );

    let help = Paragraph::new(
        " j/k:navigate  a:applied i:interviewing x:rejected h:hired  d:deadline  s:save  q:quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, outer[2]);
}

fn build_detail(state: &AppState) -> Text<'_> {
    let Some(record) = state.current() else {
        return Text::raw("No application selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    for line in textwrap::wrap(&record.title, 40) {
        lines.push(Line::from(Span::styled(
            line.into_owned(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(format!("at {}", record.company)));
    if let Some(location) = &record.location {
        lines.push(Line::from(format!("Location: {}", location)));
    }
    lines.push(Line::from(""));

    lines.push(Line::from(Span::styled(
        format!("Status: {}", record.status),
        status_style(record.status),
    )));
    if let Some(score) = record.match_score {
        lines.push(Line::from(format!("Match: {}% {}", score, stars(score))));
    }
    if let Some(deadline) = record.deadline {
        lines.push(Line::from(format!("Deadline: {}", deadline)));
    }
    if !record.link.is_empty() {
        lines.push(Line::from(format!("Link: {}", record.link)));
    }
    if !record.cover_letter_path.is_empty() {
        lines.push(Line::from(format!("Cover letter: {}", record.cover_letter_path)));
    }

    Text::from(lines)
}
