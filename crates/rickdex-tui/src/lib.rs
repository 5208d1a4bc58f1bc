use std::io;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use rickdex_bus::{EventBus, Topic};
use rickdex_core::{BrowserView, Command, ControllerHandle, LoadStatus};
use rickdex_schema::{BusMessage, Notice};
use tokio::sync::mpsc;

const MAX_ITEMS: usize = 200;
const MAX_TOASTS: usize = 3;

#[derive(Clone, Copy, PartialEq, Debug)]
enum Panel {
    Episodes,
    Activity,
}

impl Panel {
    fn next(self) -> Self {
        match self {
            Panel::Episodes => Panel::Activity,
            Panel::Activity => Panel::Episodes,
        }
    }
}

#[derive(Debug, Clone)]
struct Toast {
    notice: Notice,
    expires_at: Instant,
}

struct App {
    view: BrowserView,
    activity: Vec<String>,
    toasts: Vec<Toast>,
    notice_ttl: Duration,
    focus: Panel,
    scroll_offset: [usize; 2],
    input_mode: bool,
    input: String,
    should_quit: bool,
}

impl App {
    fn new(view: BrowserView, notice_ttl: Duration) -> Self {
        Self {
            view,
            activity: vec![format!(
                "[{}] browser started",
                chrono::Local::now().format("%H:%M:%S")
            )],
            toasts: Vec::new(),
            notice_ttl,
            focus: Panel::Episodes,
            scroll_offset: [0; 2],
            input_mode: false,
            input: String::new(),
            should_quit: false,
        }
    }

    /// Apply a key press; returns the command to forward to the controller.
    fn on_key(&mut self, key: KeyCode) -> Option<Command> {
        if self.input_mode {
            match key {
                KeyCode::Enter => {
                    self.input_mode = false;
                    return Some(Command::Search(std::mem::take(&mut self.input)));
                }
                KeyCode::Esc => {
                    self.input_mode = false;
                    self.input.clear();
                }
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) => {
                    self.input.push(c);
                }
                _ => {}
            }
            return None;
        }

        match key {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => {
                self.input_mode = true;
                self.input.clear();
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => {
                self.input_mode = true;
                self.input = c.to_string();
            }
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('p') => {
                self.scroll_offset = [0; 2];
                return Some(Command::Previous);
            }
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('n') => {
                self.scroll_offset = [0; 2];
                return Some(Command::Next);
            }
            KeyCode::Char('r') => return Some(Command::Reload),
            KeyCode::Esc => self.toasts.clear(),
            KeyCode::Tab => {
                self.focus = self.focus.next();
            }
            KeyCode::Up => {
                let idx = self.focus as usize;
                if self.scroll_offset[idx] > 0 {
                    self.scroll_offset[idx] -= 1;
                }
            }
            KeyCode::Down => {
                let idx = self.focus as usize;
                let max = match self.focus {
                    Panel::Episodes => self.view.episodes.len(),
                    Panel::Activity => self.activity.len(),
                };
                if self.scroll_offset[idx] < max.saturating_sub(1) {
                    self.scroll_offset[idx] += 1;
                }
            }
            _ => {}
        }
        None
    }

    fn set_view(&mut self, view: BrowserView) {
        if view.episodes.len() <= self.scroll_offset[Panel::Episodes as usize] {
            self.scroll_offset[Panel::Episodes as usize] = 0;
        }
        self.view = view;
    }

    fn push_activity(&mut self, line: String) {
        self.activity.push(line);
        if self.activity.len() > MAX_ITEMS {
            self.activity.remove(0);
        }
    }

    fn push_toast(&mut self, notice: Notice, now: Instant) {
        self.toasts.push(Toast {
            notice,
            expires_at: now + self.notice_ttl,
        });
        if self.toasts.len() > MAX_TOASTS {
            self.toasts.remove(0);
        }
    }

    fn expire_toasts(&mut self, now: Instant) {
        self.toasts.retain(|t| t.expires_at > now);
    }

    fn handle_bus_message(&mut self, msg: BusMessage, now: Instant) {
        let ts = chrono::Local::now().format("%H:%M:%S");
        match msg {
            BusMessage::IdentifierChanged { id } => {
                self.push_activity(format!("[{ts}] IdentifierChanged id={id}"));
            }
            BusMessage::CharacterLoaded {
                id,
                ref name,
                episode_count,
            } => {
                self.push_activity(format!(
                    "[{ts}] CharacterLoaded id={id} {name} ({episode_count} episodes)"
                ));
            }
            BusMessage::CharacterMissing { id } => {
                self.push_activity(format!("[{ts}] CharacterMissing id={id}"));
            }
            BusMessage::EpisodesResolved { character, count } => {
                self.push_activity(format!(
                    "[{ts}] EpisodesResolved id={character} count={count}"
                ));
            }
            BusMessage::EpisodesFailed {
                character,
                ref error,
            } => {
                let preview: String = error.chars().take(60).collect();
                self.push_activity(format!("[{ts}] EpisodesFailed id={character}: {preview}"));
            }
            BusMessage::NoticeRaised { notice, .. } => {
                self.push_activity(format!("[{ts}] Notice: {notice}"));
                self.push_toast(notice, now);
            }
        }
    }
}

pub struct BusReceivers {
    receivers: Vec<mpsc::Receiver<BusMessage>>,
}

impl BusReceivers {
    fn drain_all(&mut self, app: &mut App) {
        let now = Instant::now();
        for rx in &mut self.receivers {
            while let Ok(msg) = rx.try_recv() {
                app.handle_bus_message(msg, now);
            }
        }
    }
}

pub async fn subscribe_all(bus: &EventBus) -> BusReceivers {
    let mut receivers = Vec::with_capacity(Topic::ALL.len());
    for topic in Topic::ALL {
        receivers.push(bus.subscribe(topic).await);
    }
    BusReceivers { receivers }
}

pub async fn run_tui_from_receivers(
    receivers: BusReceivers,
    handle: ControllerHandle,
    notice_ttl: Duration,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(handle.view(), notice_ttl);
    let run_result = run_app(&mut terminal, &mut app, receivers, &handle);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut receivers: BusReceivers,
    handle: &ControllerHandle,
) -> Result<()> {
    loop {
        receivers.drain_all(app);
        app.set_view(handle.view());
        app.expire_toasts(Instant::now());

        terminal.draw(|frame| ui(frame, app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(cmd) = app.on_key(key.code) {
                        if let Err(e) = handle.dispatch(cmd) {
                            tracing::warn!(error = %e, "command dropped");
                        }
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_layout[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(cols[1]);

    render_character(frame, cols[0], &app.view);

    let episodes: Vec<String> = app.view.episodes.iter().map(|e| e.to_string()).collect();
    let episodes_title = match app.view.episode_status {
        LoadStatus::Loading => " Episodes (loading...) ".to_string(),
        LoadStatus::Failed => " Episodes (unavailable) ".to_string(),
        _ => format!(" Episodes ({}) ", episodes.len()),
    };
    render_list_panel(
        frame,
        right[0],
        &episodes_title,
        &episodes,
        app.scroll_offset[Panel::Episodes as usize],
        app.focus == Panel::Episodes,
        Color::Green,
    );

    render_list_panel(
        frame,
        right[1],
        " Activity ",
        &app.activity,
        app.scroll_offset[Panel::Activity as usize],
        app.focus == Panel::Activity,
        Color::Magenta,
    );

    render_search(frame, main_layout[1], app);
    render_status(frame, main_layout[2], app);
    render_toasts(frame, frame.area(), &app.toasts);
}

fn render_character(frame: &mut Frame, area: Rect, view: &BrowserView) {
    let label = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let lines: Vec<Line> = match (&view.character, view.character_status) {
        (Some(c), _) => {
            let mut lines = vec![
                Line::from(Span::styled(
                    c.name.clone(),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                field("STATUS", &c.status, label),
                field("SPECIES", &c.species, label),
            ];
            if !c.kind.is_empty() {
                lines.push(field("TYPE", &c.kind, label));
            }
            lines.extend([
                field("GENDER", &c.gender, label),
                field("ORIGIN", &c.origin.name, label),
                field("LOCATION", &c.location.name, label),
                field("CREATED", &c.created_label(), label),
                field("IMAGE", &c.image, label),
            ]);
            if view.character_status == LoadStatus::Loading {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    format!("loading character {}...", view.identifier),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            lines
        }
        (None, LoadStatus::Failed) => vec![Line::from(Span::styled(
            format!("No character with id {}", view.identifier),
            Style::default().fg(Color::Red),
        ))],
        (None, _) => vec![Line::from(Span::styled(
            format!("loading character {}...", view.identifier),
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let border = if view.error { Color::Red } else { Color::Cyan };
    let card = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(format!(" Character #{} ", view.identifier))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    );
    frame.render_widget(card, area);
}

fn field<'a>(name: &'a str, value: &str, label: Style) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{name}: "), label),
        Span::raw(value.to_string()),
    ])
}

fn render_search(frame: &mut Frame, area: Rect, app: &App) {
    let (text, style) = if app.input_mode {
        (
            format!("{}_", app.input),
            Style::default().fg(Color::Yellow),
        )
    } else {
        (
            app.view.search_text.clone(),
            Style::default().fg(Color::White),
        )
    };
    let search = Paragraph::new(Line::from(Span::styled(text, style))).block(
        Block::default()
            .title(" Character ID ")
            .borders(Borders::ALL)
            .border_style(if app.input_mode {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            }),
    );
    frame.render_widget(search, area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let key = Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    let hint = Style::default().fg(Color::DarkGray);

    let mut spans = vec![
        Span::styled(" [q]", key),
        Span::styled(" quit ", hint),
        Span::styled("[←→]", key),
        Span::styled(" prev/next ", hint),
        Span::styled("[/]", key),
        Span::styled(" search ", hint),
        Span::styled("[r]", key),
        Span::styled(" reload ", hint),
        Span::styled("[Tab]", key),
        Span::styled(" focus ", hint),
        Span::styled("[Esc]", key),
        Span::styled(" dismiss ", hint),
    ];
    if app.input_mode {
        spans.push(Span::styled(
            "| Enter to search ",
            Style::default().fg(Color::Yellow),
        ));
    }
    spans.push(Span::styled(
        concat!("| rickdex v", env!("CARGO_PKG_VERSION"), " "),
        hint,
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_toasts(frame: &mut Frame, area: Rect, toasts: &[Toast]) {
    if toasts.is_empty() {
        return;
    }
    let width = area.width.min(48);
    let height = (toasts.len() as u16 + 2).min(area.height);
    let rect = Rect::new(area.x + area.width - width, area.y, width, height);

    let lines: Vec<Line> = toasts
        .iter()
        .map(|t| {
            Line::from(Span::styled(
                t.notice.to_string(),
                Style::default().fg(Color::White),
            ))
        })
        .collect();
    let popup = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(" ! ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)),
    );
    frame.render_widget(Clear, rect);
    frame.render_widget(popup, rect);
}

fn render_list_panel(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    items: &[String],
    scroll_offset: usize,
    focused: bool,
    color: Color,
) {
    let border_style = if focused {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let visible: Vec<ListItem> = items
        .iter()
        .skip(scroll_offset)
        .map(|item| {
            let style = if focused {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::Gray)
            };
            ListItem::new(Line::from(Span::styled(item.as_str(), style)))
        })
        .collect();

    let list = List::new(visible).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style),
    );

    frame.render_widget(list, area);
}
