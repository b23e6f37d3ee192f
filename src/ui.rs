use std::collections::BTreeMap;
use std::time::SystemTime;

use crossterm::event::KeyCode;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line as TextLine, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::controller::{SessionController, TestResult};
use crate::events::SessionObserver;
use crate::input::{PAUSE_KEY, RESET_KEY};
use crate::session::{SessionPhase, SessionState};
use crate::snippet::Line;

const HORIZONTAL_MARGIN: u16 = 2;
const GUTTER_WIDTH: usize = 4;
const TAB_WIDTH: usize = 4;

/// Where a snippet line sits relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStatus {
    Completed,
    Current,
    Pending,
}

struct Styles {
    typed: Style,
    cursor: Style,
    cursor_error: Style,
    untyped: Style,
    skipped: Style,
    gutter: Style,
    gutter_current: Style,
}

impl Styles {
    fn new() -> Self {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        Self {
            typed: bold.fg(Color::Green),
            cursor: bold.add_modifier(Modifier::UNDERLINED),
            cursor_error: bold.fg(Color::White).bg(Color::Red),
            untyped: Style::default(),
            skipped: Style::default().fg(Color::DarkGray),
            gutter: Style::default().fg(Color::DarkGray),
            gutter_current: Style::default().fg(Color::Yellow),
        }
    }
}

/// Full-screen view of a session at instant `now`.
pub struct SessionView<'a, O: SessionObserver> {
    controller: &'a SessionController<O>,
    now: SystemTime,
}

impl<'a, O: SessionObserver> SessionView<'a, O> {
    pub fn new(controller: &'a SessionController<O>, now: SystemTime) -> Self {
        Self { controller, now }
    }
}

impl<O: SessionObserver> Widget for SessionView<'_, O> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(1), // title
                Constraint::Min(1),    // code
                Constraint::Length(1), // stats bar
                Constraint::Length(1), // legend
            ])
            .split(area);

        let c = self.controller;
        let title = Paragraph::new(Span::styled(
            format!(
                "treetype · {} · {}",
                c.language(),
                c.preset().rules().description
            ),
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center);
        title.render(chunks[0], buf);

        render_code(c.lines(), c.state(), chunks[1], buf);
        render_stats_bar(c, self.now, chunks[2], buf);

        let legend = Paragraph::new(Span::styled(
            legend_text(c.phase()),
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center);
        legend.render(chunks[3], buf);

        match (c.phase(), c.result()) {
            (SessionPhase::Paused, _) => render_pause_overlay(area, buf),
            (SessionPhase::Complete, Some(result)) => render_result_panel(result, area, buf),
            _ => {}
        }
    }
}

fn legend_text(phase: SessionPhase) -> String {
    match phase {
        SessionPhase::Idle => format!(
            "start typing to begin / ({}) reset / (ctrl+p) mode / (ctrl+l) language / (ctrl+c) quit",
            key_name(RESET_KEY)
        ),
        SessionPhase::Running | SessionPhase::Paused => format!(
            "({}) pause / ({}) reset / (ctrl+p) mode / (ctrl+c) quit",
            key_name(PAUSE_KEY),
            key_name(RESET_KEY)
        ),
        SessionPhase::Complete => format!(
            "({}) again / (ctrl+l) language / (ctrl+c) quit",
            key_name(RESET_KEY)
        ),
    }
}

fn key_name(code: KeyCode) -> String {
    match code {
        KeyCode::Tab => "tab".to_string(),
        KeyCode::Esc => "esc".to_string(),
        KeyCode::Enter => "enter".to_string(),
        KeyCode::Char(c) => c.to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}

fn render_code(lines: &[Line], state: &SessionState, area: Rect, buf: &mut Buffer) {
    let height = area.height as usize;
    if height == 0 {
        return;
    }
    // keep the current line roughly centered
    let first = state
        .current_line_index
        .saturating_sub(height / 2)
        .min(lines.len().saturating_sub(height));

    let styles = Styles::new();
    let rendered: Vec<TextLine> = lines
        .iter()
        .enumerate()
        .skip(first)
        .take(height)
        .map(|(idx, line)| {
            let status = if idx == state.current_line_index && !state.is_complete() {
                LineStatus::Current
            } else if state.completed_lines.contains(&idx) {
                LineStatus::Completed
            } else {
                LineStatus::Pending
            };
            render_line(line, status, state, &styles)
        })
        .collect();

    Paragraph::new(rendered).render(area, buf);
}

fn render_line<'a>(
    line: &'a Line,
    status: LineStatus,
    state: &SessionState,
    styles: &Styles,
) -> TextLine<'a> {
    let gutter_style = if status == LineStatus::Current {
        styles.gutter_current
    } else {
        styles.gutter
    };
    let mut spans = vec![Span::styled(
        format!("{:>width$} ", line.line_number + 1, width = GUTTER_WIDTH - 1),
        gutter_style,
    )];

    // first typing-sequence index of every typeable token
    let token_starts: BTreeMap<usize, usize> = line
        .char_map
        .iter()
        .rev()
        .map(|(seq_idx, pos)| (pos.token_idx, *seq_idx))
        .collect();

    let mut col = 0;
    for (token_idx, token) in line.tokens.iter().enumerate() {
        if token.start_col > col {
            spans.push(Span::raw(" ".repeat(token.start_col - col)));
            col = token.start_col;
        }
        let text = token.text.replace('\t', &" ".repeat(TAB_WIDTH));
        col += text.width();

        match (token_starts.get(&token_idx), status) {
            (None, _) => spans.push(Span::styled(text, styles.skipped)),
            (Some(_), LineStatus::Completed) => spans.push(Span::styled(text, styles.typed)),
            (Some(_), LineStatus::Pending) => spans.push(Span::styled(text, styles.untyped)),
            (Some(&start), LineStatus::Current) => {
                for (offset, ch) in text.chars().enumerate() {
                    let seq_idx = start + offset;
                    let style = if seq_idx < state.current_char_index {
                        styles.typed
                    } else if seq_idx == state.current_char_index {
                        if state.error_on_current_char {
                            styles.cursor_error
                        } else {
                            styles.cursor
                        }
                    } else {
                        styles.untyped
                    };
                    spans.push(Span::styled(ch.to_string(), style));
                }
            }
        }
    }

    TextLine::from(spans)
}

fn render_stats_bar<O: SessionObserver>(
    c: &SessionController<O>,
    now: SystemTime,
    area: Rect,
    buf: &mut Buffer,
) {
    let stats = c.live_stats(now);
    let text = format!(
        "{} · {}   line {}/{}   {}   {} wpm   {}% acc   {}",
        stats.language,
        stats.preset_name,
        stats.line.min(stats.total_lines.max(1)),
        stats.total_lines,
        stats.char_progress,
        stats.wpm,
        stats.accuracy,
        crate::clock::format_time(c.elapsed(now)),
    );
    Paragraph::new(Span::styled(text, Style::default().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(area, buf);
}

fn render_pause_overlay(area: Rect, buf: &mut Buffer) {
    let hint = format!(
        "{} to resume / {} to reset",
        key_name(PAUSE_KEY),
        key_name(RESET_KEY)
    );
    let popup = centered(area, hint.width() as u16 + 6, 4);
    Clear.render(popup, buf);
    Paragraph::new(vec![
        TextLine::from(Span::styled(
            "PAUSED",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        TextLine::from(hint),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL))
    .render(popup, buf);
}

fn render_result_panel(result: &TestResult, area: Rect, buf: &mut Buffer) {
    let popup = centered(area, 36, 6);
    Clear.render(popup, buf);
    Paragraph::new(vec![
        TextLine::from(Span::styled(
            "Test complete",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )),
        TextLine::from(format!("{} wpm   {}% acc", result.wpm, result.accuracy)),
        TextLine::from(format!("time {}", result.time_display)),
        TextLine::from(Span::styled(
            format!("({}) again", key_name(RESET_KEY)),
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL))
    .render(popup, buf);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
