use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use crx_packager::crx::{
    assembler::{assemble_with_keys, PackOptions},
    constants::MANIFEST_FILE,
    keys::KeySet,
};
use std::{
    fs,
    io::{self, Stdout},
    path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
enum AppState {
    DirBrowser,
    Processing,
    Success(String),
    Error(String),
}

#[derive(Debug)]
struct App {
    state: AppState,
    staging_dirs: Vec<PathBuf>,
    selected_dir: ListState,
    root: PathBuf,
    output_dir: PathBuf,
    keys: KeySet,
    options: PackOptions,
}

impl App {
    fn new(
        root: PathBuf,
        output_dir: PathBuf,
        keys: KeySet,
        options: PackOptions,
    ) -> Result<App, Box<dyn std::error::Error>> {
        let mut app = App {
            state: AppState::DirBrowser,
            staging_dirs: Vec::new(),
            selected_dir: ListState::default(),
            root,
            output_dir,
            keys,
            options,
        };

        app.refresh_staging_dirs()?;
        if !app.staging_dirs.is_empty() {
            app.selected_dir.select(Some(0));
        }

        Ok(app)
    }

    fn refresh_staging_dirs(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.staging_dirs.clear();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() && path.join(MANIFEST_FILE).is_file() {
                self.staging_dirs.push(path);
            }
        }

        self.staging_dirs.sort();
        Ok(())
    }

    fn next_dir(&mut self) {
        if self.staging_dirs.is_empty() {
            return;
        }

        let i = match self.selected_dir.selected() {
            Some(i) => {
                if i >= self.staging_dirs.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.selected_dir.select(Some(i));
    }

    fn previous_dir(&mut self) {
        if self.staging_dirs.is_empty() {
            return;
        }

        let i = match self.selected_dir.selected() {
            Some(i) => {
                if i == 0 {
                    self.staging_dirs.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.selected_dir.select(Some(i));
    }

    fn pack_selected_dir(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(selected) = self.selected_dir.selected() {
            if selected < self.staging_dirs.len() {
                let staging_dir = self.staging_dirs[selected].clone();
                self.state = AppState::Processing;

                match self.pack_staging_dir(&staging_dir) {
                    Ok(output_path) => {
                        self.state = AppState::Success(output_path);
                    }
                    Err(e) => {
                        self.state = AppState::Error(e.to_string());
                    }
                }
            }
        }
        Ok(())
    }

    fn pack_staging_dir(&self, staging_dir: &Path) -> Result<String, Box<dyn std::error::Error>> {
        let packaged = assemble_with_keys(staging_dir, &self.keys, &self.options)?;

        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir)?;
        }

        let dir_name = staging_dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(&packaged.extension_id);

        let output_file = self.output_dir.join(format!("{}.crx", dir_name));
        fs::write(&output_file, &packaged.crx)?;

        Ok(format!(
            "{}\n\nExtension id: {}",
            output_file.to_string_lossy(),
            packaged.extension_id
        ))
    }

    fn reset_to_browser(&mut self) {
        self.state = AppState::DirBrowser;
    }
}

pub fn run_tui(
    root: PathBuf,
    output_dir: PathBuf,
    keys: KeySet,
    options: PackOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(root, output_dir, keys, options)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                match &app.state {
                    AppState::DirBrowser => match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Down | KeyCode::Char('j') => app.next_dir(),
                        KeyCode::Up | KeyCode::Char('k') => app.previous_dir(),
                        KeyCode::Enter => {
                            app.pack_selected_dir()?;
                        }
                        KeyCode::Char('r') => {
                            app.refresh_staging_dirs()?;
                        }
                        _ => {}
                    },
                    AppState::Processing => {
                        // Wait for processing to complete
                    }
                    AppState::Success(_) | AppState::Error(_) => match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Enter | KeyCode::Char(' ') => app.reset_to_browser(),
                        _ => {}
                    },
                }
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    // Header
    let header = Paragraph::new("crxpack")
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    // Footer with instructions
    let instructions = match &app.state {
        AppState::DirBrowser => "↑/↓: Navigate | Enter: Pack | R: Refresh | Q/Esc: Quit",
        AppState::Processing => "Processing...",
        AppState::Success(_) | AppState::Error(_) => {
            "Enter/Space: Back to directory list | Q/Esc: Quit"
        }
    };

    let footer = Paragraph::new(instructions)
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[2]);

    // Main content
    match &app.state {
        AppState::DirBrowser => {
            render_dir_browser(f, chunks[1], app);
        }
        AppState::Processing => {
            render_processing(f, chunks[1]);
        }
        AppState::Success(output_path) => {
            render_success(f, chunks[1], output_path);
        }
        AppState::Error(error_msg) => {
            render_error(f, chunks[1], error_msg);
        }
    }
}

fn render_dir_browser(f: &mut Frame, area: ratatui::layout::Rect, app: &App) {
    let block = Block::default()
        .title("Staging directories")
        .borders(Borders::ALL)
        .style(Style::default());

    if app.staging_dirs.is_empty() {
        let no_dirs = Paragraph::new("No directories with a manifest.json found")
            .style(Style::default().fg(Color::Yellow))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(block);
        f.render_widget(no_dirs, area);
    } else {
        let items: Vec<ListItem> = app
            .staging_dirs
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let dir_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("unknown");

                let style = if Some(i) == app.selected_dir.selected() {
                    Style::default().fg(Color::Black).bg(Color::White)
                } else {
                    Style::default()
                };

                ListItem::new(Line::from(Span::styled(dir_name, style)))
            })
            .collect();

        let dirs_list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White));

        f.render_stateful_widget(dirs_list, area, &mut app.selected_dir.clone());
    }
}

fn render_processing(f: &mut Frame, area: ratatui::layout::Rect) {
    let processing = Paragraph::new("Signing and packing...\n\nPlease wait...")
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center)
        .block(Block::default().title("Processing").borders(Borders::ALL));

    f.render_widget(processing, area);
}

fn render_success(f: &mut Frame, area: ratatui::layout::Rect, output_path: &str) {
    let success_msg = format!(
        "✓ Package built!\n\nOutput file: {}\n\nPress Enter or Space to continue",
        output_path
    );

    let success = Paragraph::new(success_msg)
        .style(Style::default().fg(Color::Green))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Success").borders(Borders::ALL));

    f.render_widget(success, area);
}

fn render_error(f: &mut Frame, area: ratatui::layout::Rect, error_msg: &str) {
    let error_text = format!(
        "✗ Packing failed:\n\n{}\n\nPress Enter or Space to continue",
        error_msg
    );

    let error = Paragraph::new(error_text)
        .style(Style::default().fg(Color::Red))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Error").borders(Borders::ALL));

    f.render_widget(error, area);
}
