use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::catalog::{Category, Topic};
use crate::progress::{topic_key, ProgressTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Row {
    Category(usize),
    Topic(usize, usize),
}

/// Category headers, plus the topics of expanded categories.
fn visible_rows(categories: &[Category], tracker: &ProgressTracker) -> Vec<Row> {
    let mut rows = Vec::new();
    for (ci, category) in categories.iter().enumerate() {
        rows.push(Row::Category(ci));
        if tracker.is_expanded(&category.category) {
            rows.extend((0..category.topics.len()).map(|ti| Row::Topic(ci, ti)));
        }
    }
    rows
}

struct Theme {
    text: Color,
    background: Color,
    accent: Color,
    muted: Color,
}

impl Theme {
    fn for_mode(dark: bool) -> Self {
        if dark {
            Self { text: Color::Gray, background: Color::Black, accent: Color::Cyan, muted: Color::DarkGray }
        } else {
            Self { text: Color::Reset, background: Color::Reset, accent: Color::Blue, muted: Color::DarkGray }
        }
    }
}

struct AppState<'t, 'a> {
    categories: &'t [Category],
    tracker: &'t mut ProgressTracker<'a>,
    rows: Vec<Row>,
    selected: usize,
    scroll_offset: u16,
    status: Option<String>,
}

impl<'t, 'a> AppState<'t, 'a> {
    fn new(categories: &'t [Category], tracker: &'t mut ProgressTracker<'a>) -> Self {
        let rows = visible_rows(categories, tracker);
        Self { categories, tracker, rows, selected: 0, scroll_offset: 0, status: None }
    }

    fn current(&self) -> Option<Row> {
        self.rows.get(self.selected).copied()
    }

    fn current_topic(&self) -> Option<(&'t Category, &'t Topic)> {
        match self.current()? {
            Row::Topic(ci, ti) => {
                let category = self.categories.get(ci)?;
                Some((category, category.topics.get(ti)?))
            }
            Row::Category(_) => None,
        }
    }

    fn next(&mut self) {
        if !self.rows.is_empty() && self.selected < self.rows.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    /// Expands or collapses the category under the cursor, or the one that
    /// owns the selected topic.
    fn toggle_category(&mut self) {
        let ci = match self.current() {
            Some(Row::Category(ci)) | Some(Row::Topic(ci, _)) => ci,
            None => return,
        };
        let Some(category) = self.categories.get(ci) else { return };
        self.tracker.toggle_expanded(&category.category);
        self.rows = visible_rows(self.categories, self.tracker);
        self.selected = self
            .rows
            .iter()
            .position(|row| *row == Row::Category(ci))
            .unwrap_or(0);
    }

    fn toggle_complete(&mut self) {
        let Some((category, topic)) = self.current_topic() else { return };
        let key = topic_key(&category.category, &topic.name);
        self.status = Some(match self.tracker.toggle_complete(&key) {
            Ok(true) => format!("Completed {}", topic.name),
            Ok(false) => format!("Marked {} as not done", topic.name),
            Err(e) => format!("Failed to save progress: {}", e),
        });
    }

    fn toggle_bookmark(&mut self) {
        let Some((category, topic)) = self.current_topic() else { return };
        let key = topic_key(&category.category, &topic.name);
        self.status = Some(match self.tracker.toggle_bookmark(&key) {
            Ok(true) => format!("Bookmarked {}", topic.name),
            Ok(false) => format!("Removed bookmark from {}", topic.name),
            Err(e) => format!("Failed to save bookmark: {}", e),
        });
    }

    fn toggle_dark_mode(&mut self) {
        if let Err(e) = self.tracker.toggle_dark_mode() {
            self.status = Some(format!("Failed to save preference: {}", e));
        }
    }
}

pub fn run_browse(categories: &[Category], tracker: &mut ProgressTracker) -> Result<()> {
    if categories.is_empty() {
        println!("No topics found.");
        return Ok(());
    }

    let mut state = AppState::new(categories, tracker);

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    state.tracker.flush();
    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Enter | KeyCode::Char(' ') => state.toggle_category(),
                KeyCode::Char('c') => state.toggle_complete(),
                KeyCode::Char('b') => state.toggle_bookmark(),
                KeyCode::Char('d') => state.toggle_dark_mode(),
                _ => {}
            }
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let theme = Theme::for_mode(state.tracker.dark_mode());
    let base = Style::default().fg(theme.text).bg(theme.background);
    frame.render_widget(Block::default().style(base), frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(frame.area());

    let items: Vec<ListItem> = state
        .rows
        .iter()
        .map(|row| match *row {
            Row::Category(ci) => {
                let category = &state.categories[ci];
                let arrow = if state.tracker.is_expanded(&category.category) { "v" } else { ">" };
                let done = state.tracker.completed_in(&category.category);
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{} {}", arrow, category.category),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("  {}/{}", done, category.topics.len()),
                        Style::default().fg(theme.muted),
                    ),
                ]))
            }
            Row::Topic(ci, ti) => {
                let category = &state.categories[ci];
                let topic = &category.topics[ti];
                let key = topic_key(&category.category, &topic.name);
                let check = if state.tracker.is_completed(&key) { "[x]" } else { "[ ]" };
                let mark = if state.tracker.is_bookmarked(&key) { " *" } else { "" };
                ListItem::new(format!("    {} {}{}", check, topic.name, mark))
            }
        })
        .collect();

    let total: usize = state.categories.iter().map(|c| c.topics.len()).sum();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Topics ({}/{} done) ",
            state.tracker.completed_count(),
            total
        )))
        .style(base)
        .highlight_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    let detail_width = chunks[1].width.saturating_sub(4).max(20) as usize;
    let detail = Paragraph::new(build_detail(state, &theme, detail_width))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .style(base)
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail, chunks[1]);

    let help_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let help = match &state.status {
        Some(status) => format!(" {}", status),
        None => " j/k:navigate  enter:expand  c:complete b:bookmark d:dark mode  J/K:scroll  q:quit"
            .to_string(),
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(theme.muted)),
        help_area[1],
    );
}

fn build_detail<'a>(state: &'a AppState, theme: &Theme, width: usize) -> Text<'a> {
    let Some((category, topic)) = state.current_topic() else {
        let hint = match state.current() {
            Some(Row::Category(ci)) => format!(
                "{}: press enter to show its topics",
                state.categories[ci].category
            ),
            _ => "No topic selected".to_string(),
        };
        return Text::raw(hint);
    };
    let key = topic_key(&category.category, &topic.name);

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(Span::styled(
        topic.name.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    )));

    let mut meta = category.category.clone();
    if let Some(difficulty) = &category.difficulty {
        meta.push_str(&format!(" · {}", difficulty));
    }
    lines.push(Line::from(Span::styled(meta, Style::default().fg(theme.muted))));

    let progress = match (state.tracker.is_completed(&key), state.tracker.is_bookmarked(&key)) {
        (true, true) => "Completed, bookmarked",
        (true, false) => "Completed",
        (false, true) => "Bookmarked",
        (false, false) => "Not started",
    };
    lines.push(Line::from(Span::styled(progress, Style::default().fg(theme.accent))));
    lines.push(Line::from(""));

    if !topic.description.is_empty() {
        for line in textwrap::fill(&topic.description, width).lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::from(""));
    }

    if let Some(video) = &topic.youtube_id {
        lines.push(Line::from(format!("Video: https://www.youtube.com/watch?v={}", video)));
        lines.push(Line::from(""));
    }

    if !topic.key_points.is_empty() {
        lines.push(Line::from(Span::styled(
            "KEY POINTS",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for point in &topic.key_points {
            for (i, line) in textwrap::wrap(point, width.saturating_sub(4).max(10)).iter().enumerate() {
                let bullet = if i == 0 { "  - " } else { "    " };
                lines.push(Line::from(format!("{}{}", bullet, line)));
            }
        }
        lines.push(Line::from(""));
    }

    if !topic.resources.is_empty() {
        lines.push(Line::from(Span::styled(
            "RESOURCES",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for resource in &topic.resources {
            let kind = resource.kind.as_deref().map(|k| format!(" ({})", k)).unwrap_or_default();
            lines.push(Line::from(format!("  {}{}", resource.title, kind)));
            lines.push(Line::from(Span::styled(
                format!("    {}", resource.url),
                Style::default().fg(theme.muted),
            )));
        }
        lines.push(Line::from(""));
    }

    if let Some(note) = state.tracker.note(&key) {
        lines.push(Line::from(Span::styled(
            "NOTE",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for line in textwrap::fill(note, width).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    Text::from(lines)
}
