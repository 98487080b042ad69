use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use solve_sixteen::{
    ApiClient, DropTarget, FetchRequest, FetchResult, GroupColor, Session, GRID_COLUMNS, GRID_SIZE,
};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(100);

/// Runs one fetch to completion on a worker thread
type Fetcher = Arc<dyn Fn(FetchRequest) -> FetchResult + Send + Sync>;

/// Which zone the cursor is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Grid(usize),
    Pool(usize),
}

pub struct App {
    pub session: Session,
    pub focus: Focus,
    /// Entry picked up with Space, waiting to be dropped
    pub held: Option<String>,
    fetcher: Fetcher,
    tx: Sender<FetchResult>,
    rx: Receiver<FetchResult>,
    loading: usize,
}

impl App {
    pub fn new(client: ApiClient) -> Self {
        let client = Arc::new(client);
        Self::with_fetcher(Arc::new(move |request: FetchRequest| client.execute(request)))
    }

    fn with_fetcher(fetcher: Fetcher) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            session: Session::new(),
            focus: Focus::Pool(0),
            held: None,
            fetcher,
            tx,
            rx,
            loading: 0,
        }
    }

    /// Run a fetch on a worker thread; exactly one result comes back through the channel
    fn spawn_fetch(&mut self, request: FetchRequest) {
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        self.loading += 1;
        thread::spawn(move || {
            let fallback = request.clone();
            let result = panic::catch_unwind(AssertUnwindSafe(|| (*fetcher)(request)))
                .unwrap_or_else(|_| fallback.failed("fetch worker panicked"));
            let _ = tx.send(result);
        });
    }

    fn request(&mut self, request: Option<FetchRequest>) {
        if let Some(request) = request {
            self.spawn_fetch(request);
        }
    }

    /// Apply finished fetches, one at a time, on the UI thread
    fn drain_results(&mut self) {
        while let Ok(result) = self.rx.try_recv() {
            self.loading = self.loading.saturating_sub(1);
            let applied = self.session.apply(result);
            if applied.reloaded {
                // The old board and any lift on it are gone
                self.held = None;
                self.focus = Focus::Pool(0);
            }
            self.request(applied.follow_up);
        }
    }

    fn tick(&mut self) {
        self.drain_results();
        self.session.expire_message(Instant::now());
        self.clamp_focus();
    }

    fn clamp_focus(&mut self) {
        let pool_len = self.session.arrangement().pool().len();
        if let Focus::Pool(i) = self.focus {
            if pool_len == 0 {
                self.focus = Focus::Grid(0);
            } else if i >= pool_len {
                self.focus = Focus::Pool(pool_len - 1);
            }
        }
    }

    /// Entry id under the cursor
    pub fn focused_id(&self) -> Option<String> {
        let arrangement = self.session.arrangement();
        match self.focus {
            Focus::Grid(slot) => arrangement.slot(slot).map(str::to_string),
            Focus::Pool(i) => arrangement.pool().get(i).cloned(),
        }
    }

    fn move_cursor(&mut self, dx: isize, dy: isize) {
        let cols = GRID_COLUMNS as isize;
        let (index, len) = match self.focus {
            Focus::Grid(slot) => (slot as isize, GRID_SIZE as isize),
            Focus::Pool(i) => (i as isize, self.session.arrangement().pool().len() as isize),
        };
        if len == 0 {
            return;
        }
        let next = (index + dx + dy * cols).clamp(0, len - 1) as usize;
        self.focus = match self.focus {
            Focus::Grid(_) => Focus::Grid(next),
            Focus::Pool(_) => Focus::Pool(next),
        };
    }

    fn toggle_zone(&mut self) {
        self.focus = match self.focus {
            Focus::Grid(_) if !self.session.arrangement().pool().is_empty() => Focus::Pool(0),
            Focus::Grid(slot) => Focus::Grid(slot),
            Focus::Pool(_) => Focus::Grid(0),
        };
    }

    /// Space: lift the focused entry, or drop the held one on the focused zone
    fn lift_or_drop(&mut self) {
        match self.held.take() {
            None => {
                if let Some(id) = self.focused_id() {
                    self.session.drag_start(&id);
                    self.held = Some(id);
                }
            }
            Some(id) => {
                let target = match self.focus {
                    Focus::Grid(slot) => DropTarget::Slot(slot),
                    Focus::Pool(_) => DropTarget::Pool,
                };
                self.session.drag_end(&id, Some(target));
            }
        }
    }

    /// Enter: quick move of the focused entry, abandoning any pending drag
    fn quick_move(&mut self) {
        if let Some(id) = self.focused_id() {
            self.cancel_drag();
            self.session.click_move(&id, Instant::now());
        }
    }

    fn reset(&mut self) {
        self.cancel_drag();
        self.session.reset_all();
    }

    /// Esc while holding: dropped outside every zone
    fn cancel_drag(&mut self) -> bool {
        match self.held.take() {
            Some(id) => {
                self.session.drag_end(&id, None);
                true
            }
            None => false,
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let first = app.session.start();
    app.spawn_fetch(first);

    loop {
        app.tick();
        terminal.draw(|f| ui(f, app))?;

        if !event::poll(TICK)? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Esc => {
                    if !app.cancel_drag() {
                        return Ok(());
                    }
                }
                KeyCode::Left | KeyCode::Char('h') => app.move_cursor(-1, 0),
                KeyCode::Right | KeyCode::Char('l') => app.move_cursor(1, 0),
                KeyCode::Up | KeyCode::Char('k') => app.move_cursor(0, -1),
                KeyCode::Down | KeyCode::Char('j') => app.move_cursor(0, 1),
                KeyCode::Tab => app.toggle_zone(),
                KeyCode::Char(' ') => app.lift_or_drop(),
                KeyCode::Enter => app.quick_move(),
                KeyCode::Char('m') => {
                    if let Some(id) = app.focused_id() {
                        app.session.mark_solved(&id);
                    }
                }
                KeyCode::Char('r') => app.reset(),
                KeyCode::Char('s') => app.session.submit(Instant::now()),
                KeyCode::Char('[') => {
                    let request = app.session.newer_date();
                    app.request(request);
                }
                KeyCode::Char(']') => {
                    let request = app.session.older_date();
                    app.request(request);
                }
                _ => {}
            }
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn group_color(color: GroupColor) -> Color {
    match color {
        GroupColor::Yellow => Color::Yellow,
        GroupColor::Green => Color::Green,
        GroupColor::Blue => Color::Blue,
        GroupColor::Purple => Color::Magenta,
    }
}

fn ui(f: &mut Frame, app: &App) {
    let banners = app.session.solved_banners();
    let pool_rows = app.session.arrangement().pool().len().div_ceil(GRID_COLUMNS).max(1);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                          // Header with date
            Constraint::Length(banners.len() as u16 * 2),   // Solved groups
            Constraint::Length(GRID_SIZE as u16 / GRID_COLUMNS as u16 * 3 + 2), // Grid
            Constraint::Length(pool_rows as u16 * 3 + 2),   // Pool
            Constraint::Min(1),                             // Message
            Constraint::Length(3),                          // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_banners(f, chunks[1], &banners);
    render_grid(f, chunks[2], app);
    render_pool(f, chunks[3], app);
    render_message(f, chunks[4], app);
    render_status_bar(f, chunks[5], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let date = app
        .session
        .selected_date()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "latest".to_string());

    let mut spans = vec![
        Span::styled("Solve Sixteen", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::raw("  |  "),
        Span::styled(format!("Date: {}", date), Style::default().fg(Color::White)),
        Span::raw("  |  "),
        Span::styled(
            format!("{} dates", app.session.dates().len()),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if app.loading > 0 {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled("Loading...", Style::default().fg(Color::Cyan)));
    }

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_banners(f: &mut Frame, area: Rect, banners: &[solve_sixteen::SolvedBanner]) {
    if banners.is_empty() {
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(banners.iter().map(|_| Constraint::Length(2)).collect::<Vec<_>>())
        .split(area);

    for (banner, row) in banners.iter().zip(rows.iter()) {
        let style = Style::default().bg(group_color(banner.color)).fg(Color::Black);
        let text = vec![
            Line::from(Span::styled(banner.category.clone(), style.add_modifier(Modifier::BOLD))),
            Line::from(Span::styled(banner.words.join(", "), style)),
        ];
        f.render_widget(Paragraph::new(text).style(style).alignment(Alignment::Center), *row);
    }
}

fn render_card(f: &mut Frame, area: Rect, text: &str, focused: bool, held: bool) {
    let border = if held {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let card = Paragraph::new(text.to_uppercase())
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL).border_style(border));

    f.render_widget(card, area);
}

/// Split an area into rows of four equal cells, `row_count` rows of height 3
fn cells(area: Rect, row_count: usize) -> Vec<Rect> {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints((0..row_count).map(|_| Constraint::Length(3)).collect::<Vec<_>>())
        .split(area);

    rows.iter()
        .flat_map(|row| {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints((0..GRID_COLUMNS).map(|_| Constraint::Ratio(1, GRID_COLUMNS as u32)).collect::<Vec<_>>())
                .split(*row)
                .to_vec()
        })
        .collect()
}

fn render_grid(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(format!(" Grid ({}/{}) ", app.session.arrangement().placed_count(), GRID_SIZE));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let held = app.held.as_deref();
    for (slot, cell) in cells(inner, GRID_SIZE / GRID_COLUMNS).into_iter().enumerate() {
        let focused = app.focus == Focus::Grid(slot);
        match app.session.arrangement().slot(slot) {
            Some(id) => {
                let text = app.session.entry(id).map(|e| e.text.as_str()).unwrap_or(id);
                render_card(f, cell, text, focused, held == Some(id));
            }
            None => render_card(f, cell, "", focused, false),
        }
    }
}

fn render_pool(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(" Unplaced ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let pool = app.session.arrangement().pool();
    let row_count = pool.len().div_ceil(GRID_COLUMNS).max(1);
    let held = app.held.as_deref();

    for (i, (id, cell)) in pool.iter().zip(cells(inner, row_count)).enumerate() {
        let text = app.session.entry(id).map(|e| e.text.as_str()).unwrap_or(id);
        render_card(f, cell, text, app.focus == Focus::Pool(i), held == Some(id.as_str()));
    }
}

fn render_message(f: &mut Frame, area: Rect, app: &App) {
    if let Some(message) = app.session.message() {
        let paragraph = Paragraph::new(message)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Yellow));
        f.render_widget(paragraph, area);
    }
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    if let Some(held) = &app.held {
        let text = app.session.entry(held).map(|e| e.text.clone()).unwrap_or_default();
        status_spans.push(Span::styled(format!(" Holding {} ", text), Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw("| "));
    }

    for (key, label) in [
        ("←↑↓→", " Move | "),
        ("Tab", " Zone | "),
        ("Space", " Pick/Drop | "),
        ("Enter", " Quick move | "),
        ("m", " Mark solved | "),
        ("r", " Reset | "),
        ("s", " Submit | "),
        ("[/]", " Date | "),
    ] {
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}
