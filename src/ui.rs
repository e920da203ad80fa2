use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use once_cell::sync::Lazy;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use regex::Regex;
use textwrap::wrap;
use unicode_width::UnicodeWidthStr;

use crate::controller::{Level, Notifier, PanelController};
use crate::intent::{NavigationIntent, Selector};
use crate::search;

const TICK_INTERVAL: Duration = Duration::from_millis(100);
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TOAST_BASE_DELAY: Duration = Duration::from_secs(2);
const TOAST_STACK_DELAY: Duration = Duration::from_secs(1);

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new("<[^>]*>").expect("tag pattern"));

/// Markup fragments come from the panel renderer; the terminal shows their
/// text content only.
pub fn strip_markup(fragment: &str) -> String {
    let text = TAG_PATTERN.replace_all(fragment, "");
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x2F;", "/")
        .replace("&#x60;", "`")
        .replace("&#x3D;", "=")
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: Level,
    expires_at: Instant,
}

/// Transient message stack. Each queued toast extends the next one's
/// lifetime so rapid notifications stay readable.
#[derive(Debug, Default)]
pub struct ToastRack {
    toasts: Vec<Toast>,
}

impl ToastRack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prune(&mut self) -> bool {
        let now = Instant::now();
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.expires_at > now);
        before != self.toasts.len()
    }

    pub fn visible(&self) -> &[Toast] {
        &self.toasts
    }
}

impl Notifier for ToastRack {
    fn notify(&mut self, message: &str, level: Level) {
        let delay = TOAST_BASE_DELAY + TOAST_STACK_DELAY * self.toasts.len() as u32;
        self.toasts.push(Toast {
            message: message.to_string(),
            level,
            expires_at: Instant::now() + delay,
        });
    }
}

#[derive(Debug, Clone)]
struct NavEntry {
    label: String,
    selector: Selector,
}

pub struct Options {
    pub controller: PanelController,
    pub categories: Vec<String>,
    pub status_message: String,
    pub config_path: String,
}

pub struct Model {
    controller: PanelController,
    surface: crate::render::MemorySurface,
    toasts: ToastRack,
    nav_entries: Vec<NavEntry>,
    nav_index: usize,
    search_input: Option<String>,
    status_message: String,
    config_path: String,
    spinner_frame: usize,
    needs_redraw: bool,
    should_quit: bool,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let mut nav_entries = vec![
            NavEntry {
                label: "today".into(),
                selector: Selector::Today,
            },
            NavEntry {
                label: "popular".into(),
                selector: Selector::Popular,
            },
            NavEntry {
                label: "on this day".into(),
                selector: Selector::History,
            },
            NavEntry {
                label: "search".into(),
                selector: Selector::Search,
            },
        ];
        for slug in &options.categories {
            nav_entries.push(NavEntry {
                label: format!("#{slug}"),
                selector: Selector::Category(slug.clone()),
            });
        }

        Self {
            controller: options.controller,
            surface: crate::render::MemorySurface::new(),
            toasts: ToastRack::new(),
            nav_entries,
            nav_index: 0,
            search_input: None,
            status_message: options.status_message,
            config_path: options.config_path,
            spinner_frame: 0,
            needs_redraw: true,
            should_quit: false,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode().context("enable raw mode")?;
        let mut stdout = io::stdout();
        stdout
            .execute(EnterAlternateScreen)
            .context("enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("create terminal")?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode().ok();
        terminal
            .backend_mut()
            .execute(LeaveAlternateScreen)
            .ok();
        terminal.show_cursor().ok();

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let size = terminal.size().context("query terminal size")?;
        self.controller.viewport_resized(size.width, &mut self.surface);
        self.controller.restore(&mut self.surface)?;

        let mut last_tick = Instant::now();
        loop {
            if self.should_quit {
                return Ok(());
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            if event::poll(TICK_INTERVAL).context("poll terminal events")? {
                match event::read().context("read terminal event")? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key.code)?;
                    }
                    Event::Resize(width, _) => {
                        if self
                            .controller
                            .viewport_resized(width, &mut self.surface)
                            .is_some()
                        {
                            self.mark_dirty();
                        }
                    }
                    _ => {}
                }
            }

            if self.controller.poll(&mut self.surface, &mut self.toasts) {
                self.mark_dirty();
            }
            if self.toasts.prune() {
                self.mark_dirty();
            }
            if last_tick.elapsed() >= TICK_INTERVAL {
                last_tick = Instant::now();
                if self.surface.loading {
                    self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
                    self.mark_dirty();
                }
            }
        }
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<()> {
        if let Some(input) = self.search_input.as_mut() {
            match code {
                KeyCode::Esc => {
                    self.search_input = None;
                }
                KeyCode::Enter => {
                    let term = input.clone();
                    self.search_input = None;
                    if let Some(params) = search::quick_search(&term) {
                        self.dispatch(
                            NavigationIntent::new(Selector::Search).search_keys(params),
                        )?;
                    }
                }
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(ch) => {
                    input.push(ch);
                }
                _ => {}
            }
            self.mark_dirty();
            return Ok(());
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if self.nav_index + 1 < self.nav_entries.len() {
                    self.nav_index += 1;
                    self.mark_dirty();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.nav_index > 0 {
                    self.nav_index -= 1;
                    self.mark_dirty();
                }
            }
            KeyCode::Enter => {
                let selector = self.nav_entries[self.nav_index].selector.clone();
                self.dispatch(NavigationIntent::new(selector))?;
            }
            KeyCode::Char('r') => {
                self.dispatch(NavigationIntent::new(Selector::Today).refresh())?;
            }
            KeyCode::Char('/') => {
                self.search_input = Some(String::new());
                self.mark_dirty();
            }
            KeyCode::Tab => {
                self.cycle_tab()?;
            }
            KeyCode::Char('[') => {
                self.step_page(-1)?;
            }
            KeyCode::Char(']') => {
                self.step_page(1)?;
            }
            KeyCode::End => {
                self.jump_to_last_page()?;
            }
            KeyCode::Char('m') => {
                self.show_more()?;
            }
            KeyCode::Char('y') => {
                self.cycle_year()?;
            }
            KeyCode::Char(digit @ '1'..='9') => {
                let index = digit as usize - '1' as usize;
                self.toggle_exclusion(index)?;
            }
            KeyCode::PageDown => {
                self.scroll_panel(8)?;
            }
            KeyCode::PageUp => {
                self.scroll_panel(-8)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn dispatch(&mut self, intent: NavigationIntent) -> Result<()> {
        self.controller.apply(intent, &mut self.surface)?;
        self.mark_dirty();
        Ok(())
    }

    fn active_selector(&self) -> Result<Selector> {
        Ok(self
            .controller
            .prefs()
            .active_selector()?
            .unwrap_or(Selector::Today))
    }

    fn cycle_tab(&mut self) -> Result<()> {
        let Some(tabs) = self.surface.tabs.clone() else {
            return Ok(());
        };
        if tabs.is_empty() {
            return Ok(());
        }
        let active = tabs.iter().position(|tab| tab.active).unwrap_or(0);
        let next = &tabs[(active + 1) % tabs.len()];
        let selector = Selector::from_slug(&next.selector);
        self.dispatch(NavigationIntent::new(selector).tab(next.name.clone()))
    }

    fn step_page(&mut self, direction: i64) -> Result<()> {
        let Some(pagination) = self.surface.pagination.clone() else {
            if direction > 0 && self.surface.show_more {
                return self.show_more();
            }
            return Ok(());
        };
        let target = pagination.current as i64 + direction;
        if target < 1 || target > pagination.total as i64 {
            return Ok(());
        }
        let selector = self.active_selector()?;
        self.dispatch(NavigationIntent::new(selector).page(target as u32))
    }

    fn jump_to_last_page(&mut self) -> Result<()> {
        let Some(pagination) = self.surface.pagination.clone() else {
            return Ok(());
        };
        let selector = self.active_selector()?;
        self.dispatch(NavigationIntent::new(selector).page(pagination.total))
    }

    fn show_more(&mut self) -> Result<()> {
        if !self.surface.show_more {
            return Ok(());
        }
        // Hidden immediately; the next render decides whether it returns.
        self.surface.show_more = false;
        let selector = self.active_selector()?;
        self.dispatch(NavigationIntent::new(selector).page(2))
    }

    fn cycle_year(&mut self) -> Result<()> {
        let Some(options) = self.surface.year_options.clone() else {
            return Ok(());
        };
        if options.is_empty() {
            return Ok(());
        }
        let selected = options.iter().position(|option| option.selected);
        let next = match selected {
            Some(index) => options[(index + 1) % options.len()].year,
            None => options[0].year,
        };
        self.dispatch(NavigationIntent::new(Selector::History).year(next))
    }

    fn toggle_exclusion(&mut self, index: usize) -> Result<()> {
        let Some(entries) = self.surface.exclusions.clone() else {
            return Ok(());
        };
        let Some(entry) = entries.get(index) else {
            return Ok(());
        };
        self.dispatch(
            NavigationIntent::new(Selector::Popular).toggle_exclusion(entry.id.clone()),
        )
    }

    fn scroll_panel(&mut self, delta: i64) -> Result<()> {
        if self.controller.is_compact() {
            return Ok(());
        }
        let max = self.surface.items.len().saturating_sub(1) as i64;
        let next = (self.surface.scroll + delta).clamp(0, max);
        if next == self.surface.scroll {
            return Ok(());
        }
        self.surface.scroll = next;
        self.controller.prefs().set_scroll_offset(next)?;
        self.mark_dirty();
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        frame.render_widget(
            Block::default().style(Style::default().bg(COLOR_BG)),
            area,
        );

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(2)])
            .split(area);

        if self.controller.is_compact() {
            self.draw_compact(frame, rows[0]);
        } else {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(38), Constraint::Min(20)])
                .split(rows[0]);
            self.draw_navigation(frame, columns[0]);
            self.draw_panel(frame, columns[1]);
        }
        self.draw_status(frame, rows[1]);
    }

    fn draw_compact(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_IDLE))
            .title("threads");
        let text = vec![
            Line::from(Span::styled(
                "compact layout",
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )),
            Line::from(Span::styled(
                "The navigation panel is hidden at this width; widen the terminal to browse.",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )),
        ];
        frame.render_widget(
            Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
            area,
        );
    }

    fn draw_navigation(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .nav_entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let style = if index == self.nav_index {
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(COLOR_TEXT_PRIMARY)
                };
                ListItem::new(Line::from(Span::styled(entry.label.clone(), style)))
            })
            .collect();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_FOCUSED))
            .title("sections");
        frame.render_widget(List::new(items).block(block), area);
    }

    fn draw_panel(&self, frame: &mut Frame, area: Rect) {
        let mut title = self.surface.title.clone();
        if title.is_empty() {
            title = "threads".into();
        }
        if let Some(notice) = &self.surface.refresh_notice {
            title.push(' ');
            title.push_str(notice);
        }
        if self.surface.loading {
            title.push(' ');
            title.push_str(SPINNER_FRAMES[self.spinner_frame]);
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_IDLE))
            .title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let mut lines: Vec<Line> = Vec::new();

        if let Some(tabs) = &self.surface.tabs {
            let mut spans: Vec<Span> = Vec::new();
            for tab in tabs {
                let style = if tab.active {
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::UNDERLINED)
                } else {
                    Style::default().fg(COLOR_TEXT_SECONDARY)
                };
                spans.push(Span::styled(format!(" {} ", tab.label), style));
            }
            lines.push(Line::from(spans));
        }

        if let Some(years) = &self.surface.year_options {
            let mut spans: Vec<Span> = vec![Span::styled(
                "year: ",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )];
            for option in years {
                let style = if option.selected {
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(COLOR_TEXT_SECONDARY)
                };
                spans.push(Span::styled(format!("{} ", option.year), style));
            }
            lines.push(Line::from(spans));
        }

        let width = inner.width.saturating_sub(1) as usize;
        let offset = self.surface.scroll.max(0) as usize;
        for row in self.surface.items.iter().skip(offset) {
            let text = strip_markup(row);
            for wrapped in wrap(&text, width.max(10)) {
                lines.push(Line::from(Span::styled(
                    wrapped.into_owned(),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )));
            }
        }

        if let Some(pagination) = &self.surface.pagination {
            lines.push(Line::from(Span::styled(
                format!(
                    "page {} of {}  ([ prev, ] next, End last)",
                    pagination.current, pagination.total
                ),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }

        if self.surface.show_more {
            lines.push(Line::from(Span::styled(
                "m: show more",
                Style::default().fg(COLOR_ACCENT),
            )));
        }

        if let Some(entries) = &self.surface.exclusions {
            let mut spans: Vec<Span> = vec![Span::styled(
                "mute: ",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )];
            for (index, entry) in entries.iter().enumerate() {
                let marker = if entry.active { "■" } else { "□" };
                spans.push(Span::styled(
                    format!("{} {}#{} ", marker, index + 1, entry.label),
                    Style::default().fg(if entry.active {
                        COLOR_ERROR
                    } else {
                        COLOR_TEXT_SECONDARY
                    }),
                ));
            }
            lines.push(Line::from(spans));
        }

        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        if let Some(input) = &self.search_input {
            lines.push(Line::from(Span::styled(
                format!("search: {input}_"),
                Style::default().fg(COLOR_ACCENT),
            )));
        } else if let Some(toast) = self.toasts.visible().last() {
            let style = match toast.level {
                Level::Error => Style::default().fg(COLOR_ERROR),
                Level::Info => Style::default().fg(COLOR_TEXT_PRIMARY),
            };
            lines.push(Line::from(Span::styled(toast.message.clone(), style)));
        } else {
            let mut status = self.status_message.clone();
            if UnicodeWidthStr::width(status.as_str()) > area.width as usize {
                status = status.chars().take(area.width as usize).collect();
            }
            lines.push(Line::from(Span::styled(
                status,
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }
        lines.push(Line::from(Span::styled(
            format!("config: {}", self.config_path),
            Style::default().fg(COLOR_BORDER_IDLE),
        )));
        frame.render_widget(Paragraph::new(lines), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_markup_removes_tags_and_entities() {
        let row = "<li><a href=\"/threads/x/\">a &amp; b<small>3</small></a></li>";
        assert_eq!(strip_markup(row), "a & b3");
    }

    #[test]
    fn strip_markup_keeps_escaped_script_text() {
        let row = "<li>&lt;script&gt;boom&lt;&#x2F;script&gt;</li>";
        assert_eq!(strip_markup(row), "<script>boom</script>");
    }

    #[test]
    fn toast_rack_stacks_delays() {
        let mut rack = ToastRack::new();
        rack.notify("first", Level::Info);
        rack.notify("second", Level::Error);
        assert_eq!(rack.visible().len(), 2);
        let gap = rack.visible()[1]
            .expires_at
            .duration_since(rack.visible()[0].expires_at);
        assert!(gap >= TOAST_STACK_DELAY);
    }

    #[test]
    fn toast_rack_prunes_expired() {
        let mut rack = ToastRack::new();
        rack.toasts.push(Toast {
            message: "old".into(),
            level: Level::Info,
            expires_at: Instant::now() - Duration::from_secs(1),
        });
        assert!(rack.prune());
        assert!(rack.visible().is_empty());
    }
}
