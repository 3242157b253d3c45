use drillcall::command::{Command, GroupColor};
use drillcall::session::SessionPhase;
use drillcall::util::{format_time, humanize_since, truncate_to_width};
use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};

use crate::{App, Row, Screen};

const HORIZONTAL_MARGIN: u16 = 2;

fn group_color(color: GroupColor) -> Color {
    match color {
        GroupColor::Blue => Color::Blue,
        GroupColor::Green => Color::Green,
        GroupColor::Orange => Color::Rgb(255, 165, 0),
        GroupColor::Purple => Color::Magenta,
        GroupColor::Red => Color::Red,
        GroupColor::Yellow => Color::Yellow,
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(1), // tab bar
                Constraint::Min(1),    // body
                Constraint::Length(1), // status / input
                Constraint::Length(1), // key help
            ])
            .split(area);

        render_tabs(self, chunks[0], buf);

        match self.screen {
            Screen::Session => render_session(self, chunks[1], buf),
            Screen::Library if self.show_presets => render_presets(self, chunks[1], buf),
            Screen::Library => render_library(self, chunks[1], buf),
            Screen::Setup => render_setup(self, chunks[1], buf),
        }

        render_status(self, chunks[2], buf);
        render_help(self, chunks[3], buf);
    }
}

fn render_tabs(app: &App, area: Rect, buf: &mut Buffer) {
    let tab = |label: &str, active: bool| {
        if active {
            Span::styled(
                format!(" {label} "),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED),
            )
        } else {
            Span::styled(format!(" {label} "), Style::default().fg(Color::DarkGray))
        }
    };

    let line = Line::from(vec![
        Span::styled("drillcall ", Style::default().add_modifier(Modifier::BOLD)),
        tab("library", app.screen == Screen::Library),
        tab("setup", app.screen == Screen::Setup),
        tab("session", app.screen == Screen::Session),
    ]);
    Paragraph::new(line).render(area, buf);
}

fn command_line<'a>(app: &App, cmd: &'a Command, selected_row: bool) -> Line<'a> {
    let marker = if cmd.selected { "[x]" } else { "[ ]" };
    let audio = if cmd.has_audio() { "♪" } else { "∅" };

    let mut style = Style::default();
    if selected_row {
        style = style.add_modifier(Modifier::REVERSED);
    }
    if !cmd.selected {
        style = style.add_modifier(Modifier::DIM);
    }

    let last = app
        .last_played
        .get(&cmd.id)
        .map(|at| {
            let ago = (chrono::Local::now() - *at).num_seconds().max(0) as u64;
            humanize_since(ago)
        })
        .unwrap_or_else(|| "never".to_string());

    Line::from(vec![
        Span::styled(format!("  {marker} "), style),
        Span::styled(format!("{audio} "), style),
        Span::styled(format!("{:<24}", truncate_to_width(&cmd.name, 24)), style),
        Span::styled(format!(" x{:<3}", cmd.session_count), style),
        Span::styled(
            format!(" {:>4} plays", cmd.play_count),
            style.add_modifier(Modifier::DIM),
        ),
        Span::styled(format!("  {last}"), style.add_modifier(Modifier::DIM)),
    ])
}

fn render_library(app: &App, area: Rect, buf: &mut Buffer) {
    let rows = app.visible_rows();
    if rows.is_empty() {
        let empty = Paragraph::new("no commands yet: press 'a' to add one")
            .style(Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM))
            .alignment(Alignment::Center);
        empty.render(area, buf);
        return;
    }

    let height = area.height as usize;
    let first = app.cursor.saturating_sub(height.saturating_sub(1));

    let mut lines: Vec<Line> = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(first).take(height) {
        let at_cursor = idx == app.cursor;
        match row {
            Row::Group(id) => {
                if let Some(group) = app.library.group(id) {
                    let members = app
                        .library
                        .commands
                        .iter()
                        .filter(|c| c.group_id.as_deref() == Some(id.as_str()))
                        .count();
                    let mut style = Style::default()
                        .fg(group_color(group.color))
                        .add_modifier(Modifier::BOLD);
                    if at_cursor {
                        style = style.add_modifier(Modifier::REVERSED);
                    }
                    lines.push(Line::from(Span::styled(
                        format!("▸ {} ({members})", group.name),
                        style,
                    )));
                }
            }
            Row::Command(id) => {
                if let Some(cmd) = app.library.command(id) {
                    lines.push(command_line(app, cmd, at_cursor));
                }
            }
        }
    }

    Paragraph::new(lines).render(area, buf);
}

fn render_presets(app: &App, area: Rect, buf: &mut Buffer) {
    let block = Block::default().borders(Borders::ALL).title("presets");

    let mut lines: Vec<Line> = Vec::new();
    if app.library.presets.is_empty() {
        lines.push(Line::from(Span::styled(
            "no presets saved: 's' in the library captures the current counts",
            Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
        )));
    }
    for (idx, preset) in app.library.presets.iter().enumerate() {
        let mut style = Style::default();
        if idx == app.preset_cursor {
            style = style.add_modifier(Modifier::REVERSED);
        }
        let counted = preset.session_counts.values().filter(|c| **c > 0).count();
        lines.push(Line::from(Span::styled(
            format!(
                " {}  ({} commands, saved {})",
                preset.name,
                counted,
                preset.created_at.format("%Y-%m-%d")
            ),
            style,
        )));
    }

    Paragraph::new(lines).block(block).render(area, buf);
}

fn render_setup(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // settings
            Constraint::Length(1),
            Constraint::Min(1), // preview
        ])
        .split(area);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut settings = vec![
        Line::from(vec![
            Span::raw("session length  "),
            Span::styled(format_time(app.config.duration_secs), bold),
            Span::styled("   (Up/Down)", Style::default().add_modifier(Modifier::DIM)),
        ]),
        Line::from(vec![
            Span::raw("min break       "),
            Span::styled(format!("{:.0}s", app.config.min_break_secs), bold),
            Span::styled(
                "   (Left/Right)",
                Style::default().add_modifier(Modifier::DIM),
            ),
        ]),
        Line::from(vec![
            Span::raw("max break       "),
            Span::styled(format!("{:.0}s", app.config.max_break_secs), bold),
            Span::styled("   ([/])", Style::default().add_modifier(Modifier::DIM)),
        ]),
    ];
    if app.config.max_break_secs < app.config.min_break_secs {
        settings.push(Line::from(Span::styled(
            format!(
                "break window inverted, fixed gap of {:.0}s will be used",
                app.config.min_break_secs
            ),
            Style::default().fg(Color::Yellow),
        )));
    }
    Paragraph::new(settings).render(chunks[0], buf);

    let ready = app.library.training_ready();
    let blockers = app.library.start_blockers();

    let mut preview: Vec<Line> = Vec::new();
    if ready.is_empty() {
        preview.push(Line::from(Span::styled(
            "select commands with counts and audio in the library first",
            Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
        )));
    } else {
        let total: u32 = ready.iter().map(|p| p.repeats).sum();
        preview.push(Line::from(Span::styled(
            format!("{} commands, {total} cues planned", ready.len()),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for item in app
            .library
            .commands
            .iter()
            .filter(|c| c.selected && c.session_count > 0 && c.has_audio())
            .sorted_by_key(|c| c.order)
        {
            preview.push(Line::from(format!(
                "  {}  x{}",
                truncate_to_width(&item.name, 30),
                item.session_count
            )));
        }
    }
    for blocker in blockers {
        preview.push(Line::from(Span::styled(
            format!("  {} has no audio, start blocked", blocker.name),
            Style::default().fg(Color::Yellow),
        )));
    }
    if app.library.can_start() {
        preview.push(Line::from(""));
        preview.push(Line::from(Span::styled(
            "press Enter to start",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
    }

    Paragraph::new(preview)
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);
}

fn render_session(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(session) = app.session.as_ref() else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // banner
            Constraint::Length(1),
            Constraint::Length(1), // gauge
            Constraint::Length(1), // timer line
            Constraint::Length(1),
            Constraint::Min(1), // tally
        ])
        .split(area);

    let banner = match session.phase() {
        SessionPhase::Completed | SessionPhase::Terminated => Paragraph::new(Span::styled(
            "session complete, nice work",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        SessionPhase::Paused => Paragraph::new(Span::styled(
            "paused",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        ))
        .alignment(Alignment::Center),
        _ => match app.now_playing.as_ref() {
            Some((name, _)) => Paragraph::new(Span::styled(
                format!("▶ {name}"),
                Style::default()
                    .fg(Color::Rgb(255, 165, 0))
                    .add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
            None => Paragraph::new(Span::styled(
                "listen for the next command…",
                Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
            ))
            .alignment(Alignment::Center),
        },
    };
    banner.render(chunks[0], buf);

    Gauge::default()
        .ratio(session.progress())
        .gauge_style(Style::default().fg(Color::Cyan))
        .label(format!(
            "{} / {}",
            format_time(session.elapsed_secs()),
            format_time(session.duration_secs())
        ))
        .render(chunks[2], buf);

    let next = match session.next_cue_offset() {
        Some(offset) => {
            let wait = (offset - session.elapsed_secs() as f64).max(0.0) as u64;
            format!("next cue in {}", format_time(wait))
        }
        None => "no cues left".to_string(),
    };
    Paragraph::new(Line::from(vec![
        Span::raw(next),
        Span::styled(
            format!(
                "   {} of {} cues played",
                session.cues_played(),
                session.cues_planned()
            ),
            Style::default().add_modifier(Modifier::DIM),
        ),
    ]))
    .render(chunks[3], buf);

    let mut tally_lines: Vec<Line> = vec![Line::from(Span::styled(
        "completion",
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    for cmd in app
        .library
        .commands
        .iter()
        .filter(|c| c.selected && c.session_count > 0)
        .sorted_by_key(|c| c.order)
    {
        let done = session.tally().get(&cmd.id).copied().unwrap_or(0);
        tally_lines.push(Line::from(format!(
            "  {:<24} {done} / {}",
            truncate_to_width(&cmd.name, 24),
            cmd.session_count
        )));
    }
    Paragraph::new(tally_lines).render(chunks[5], buf);
}

fn render_status(app: &App, area: Rect, buf: &mut Buffer) {
    if let Some(input) = app.input.as_ref() {
        Paragraph::new(Line::from(vec![
            Span::styled(
                format!("{}: ", input.prompt()),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw(input.buffer.clone()),
            Span::styled("█", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]))
        .render(area, buf);
    } else if let Some(status) = app.status.as_ref() {
        Paragraph::new(Span::styled(
            status.clone(),
            Style::default().fg(Color::Yellow),
        ))
        .render(area, buf);
    }
}

fn render_help(app: &App, area: Rect, buf: &mut Buffer) {
    let help = if app.input.is_some() {
        "enter confirm · esc cancel"
    } else {
        match app.screen {
            Screen::Library if app.show_presets => "enter apply · d delete · esc close",
            Screen::Library => {
                "space select · a/A add · r rename · d delete · m audio · +/- count · c batch · g group · [/] move · s/p presets · tab setup · q quit"
            }
            Screen::Setup => "enter start · tab library · q quit",
            Screen::Session => "space pause/resume · e end · q quit",
        }
    };
    Paragraph::new(Span::styled(
        help,
        Style::default().add_modifier(Modifier::DIM),
    ))
    .render(area, buf);
}
