use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph},
    Frame,
};

use crate::metrics::{Series, Snapshot};
use crate::output::format_bytes;

const DARK_BG: Color = Color::Black;
const NEON_CYAN: Color = Color::Rgb(0, 255, 255); // Headers
const BRIGHT_WHITE: Color = Color::White;
const SILVER: Color = Color::Rgb(192, 192, 192); // Secondary text
const CPU_RED: Color = Color::Rgb(220, 20, 60);
const RAM_BLUE: Color = Color::Rgb(65, 105, 225);
const LOW_GREEN: Color = Color::Rgb(50, 205, 50);
const MID_YELLOW: Color = Color::Rgb(255, 215, 0);

const GAUGE_COLUMN_WIDTH: u16 = 30;

/// What the top view currently shows
#[derive(Debug, Clone)]
pub struct TopState {
    pub backend: String,
    pub snapshot: Option<Snapshot>,
}

impl TopState {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            snapshot: None,
        }
    }

    /// Replace the displayed snapshot; the previous one is dropped
    pub fn update(&mut self, snapshot: Snapshot) {
        self.snapshot = Some(snapshot);
    }
}

/// Bar colour for a usage percentage
pub fn usage_color(percent: i64) -> Color {
    if percent <= 25 {
        LOW_GREEN
    } else if percent > 75 {
        CPU_RED
    } else {
        MID_YELLOW
    }
}

/// Draw the whole cluster view
pub fn draw_top(f: &mut Frame, state: &TopState) {
    let bg_block = Block::default().style(Style::default().bg(DARK_BG));
    f.render_widget(bg_block, f.size());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Header
            Constraint::Min(10),   // CPU and RAM rows
            Constraint::Length(3), // Footer
        ])
        .split(f.size());

    draw_header(f, chunks[0], state);

    match &state.snapshot {
        Some(snapshot) => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(chunks[1]);

            draw_resource_row(
                f,
                rows[0],
                ResourceRow {
                    name: "CPU",
                    color: CPU_RED,
                    current: snapshot.current_cpu_percent,
                    peak: snapshot.max_cpu_percent,
                    rate: &snapshot.cpu_rate,
                },
            );
            draw_resource_row(
                f,
                rows[1],
                ResourceRow {
                    name: "RAM",
                    color: RAM_BLUE,
                    current: snapshot.current_memory_percent,
                    peak: snapshot.max_memory_percent,
                    rate: &snapshot.memory_rate,
                },
            );
        }
        None => {
            let waiting = Paragraph::new(format!("Waiting for metrics from {} ...", state.backend))
                .style(Style::default().fg(SILVER))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(BRIGHT_WHITE)));
            f.render_widget(waiting, chunks[1]);
        }
    }

    draw_footer(f, chunks[2]);
}

fn draw_header(f: &mut Frame, area: Rect, state: &TopState) {
    let title = match &state.snapshot {
        Some(snapshot) => format!(
            "Cluster Monitoring - Last Updated: {}",
            snapshot.observed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => "Cluster Monitoring".to_string(),
    };

    let lines = match &state.snapshot {
        Some(snapshot) => vec![
            Line::from(vec![
                Span::styled("Total CPU Cores: ", Style::default().fg(SILVER)),
                Span::styled(snapshot.total_cpu.to_string(), Style::default().fg(BRIGHT_WHITE)),
            ]),
            Line::from(vec![
                Span::styled("Total Memory: ", Style::default().fg(SILVER)),
                Span::styled(
                    format_bytes(snapshot.total_memory_bytes),
                    Style::default().fg(BRIGHT_WHITE),
                ),
            ]),
        ],
        None => vec![Line::from(Span::styled(
            format!("Backend: {}", state.backend),
            Style::default().fg(SILVER),
        ))],
    };

    let header = Paragraph::new(lines).block(
        Block::default()
            .title(title)
            .title_style(Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BRIGHT_WHITE)),
    );
    f.render_widget(header, area);
}

struct ResourceRow<'a> {
    name: &'static str,
    color: Color,
    current: i64,
    peak: i64,
    rate: &'a Series,
}

fn draw_resource_row(f: &mut Frame, area: Rect, row: ResourceRow<'_>) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(GAUGE_COLUMN_WIDTH), Constraint::Min(10)])
        .split(area);

    let gauges = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[0]);

    draw_gauge(f, gauges[0], &format!("Current {}", row.name), row.color, row.current);
    draw_gauge(f, gauges[1], &format!("Peak {}", row.name), row.color, row.peak);
    draw_rate_chart(f, columns[1], row.name, row.color, row.rate);
}

fn draw_gauge(f: &mut Frame, area: Rect, title: &str, title_color: Color, percent: i64) {
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(title.to_string())
                .title_style(Style::default().fg(title_color).add_modifier(Modifier::BOLD))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(BRIGHT_WHITE)),
        )
        .gauge_style(Style::default().fg(usage_color(percent)).bg(DARK_BG))
        // Values outside 0..=100 are shown as-is but the bar is clamped
        .percent(percent.clamp(0, 100) as u16)
        .label(format!("{percent}%"));
    f.render_widget(gauge, area);
}

fn draw_rate_chart(f: &mut Frame, area: Rect, name: &str, color: Color, rate: &Series) {
    let block = Block::default()
        .title(name.to_string())
        .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BRIGHT_WHITE));

    // Braille markers fit two samples per cell
    let window = rate.tail(area.width.saturating_sub(2) as usize * 2);
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        let message = Paragraph::new(format!("No {name} data in range"))
            .style(Style::default().fg(SILVER))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(message, area);
        return;
    };

    let origin = first.time;
    let data: Vec<(f64, f64)> = window
        .iter()
        .map(|p| ((p.time - origin).num_milliseconds() as f64 / 1000.0, p.value as f64))
        .collect();

    let x_max = ((last.time - origin).num_milliseconds() as f64 / 1000.0).max(1.0);
    let y_max = window.max_value().unwrap_or(0).max(100) as f64;
    let middle = origin + (last.time - origin) / 2;

    let datasets = vec![Dataset::default()
        .name(format!("{name} %"))
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&data)];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(SILVER))
                .bounds([0.0, x_max])
                .labels(vec![
                    Span::raw(time_label(origin)),
                    Span::raw(time_label(middle)),
                    Span::raw(time_label(last.time)),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(SILVER))
                .bounds([0.0, y_max])
                .labels(vec![
                    Span::raw("0"),
                    Span::raw(format!("{}", y_max as i64 / 2)),
                    Span::raw(format!("{}", y_max as i64)),
                ]),
        );
    f.render_widget(chart, area);
}

fn time_label(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%H:%M").to_string()
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let help = Paragraph::new("q / Esc / Ctrl-C: Quit")
        .style(Style::default().fg(SILVER))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(BRIGHT_WHITE)));
    f.render_widget(help, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Point;
    use chrono::TimeZone;
    use ratatui::{backend::TestBackend, Terminal};

    fn snapshot() -> Snapshot {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let series = |values: &[i64]| {
            Series::from_points(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Point::new(start + chrono::Duration::seconds(i as i64 * 15), *v))
                    .collect(),
            )
            .unwrap()
        };

        Snapshot {
            total_cpu: 16,
            total_memory_bytes: 64_000_000_000,
            current_cpu_percent: 12,
            max_cpu_percent: 81,
            cpu_rate: series(&[10, 12, 30, 81, 12]),
            current_memory_percent: 55,
            max_memory_percent: 60,
            memory_rate: series(&[50, 55, 60, 55]),
            observed_at: start + chrono::Duration::seconds(60),
        }
    }

    fn render(state: &TopState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw_top(f, state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_usage_color_thresholds() {
        assert_eq!(usage_color(0), LOW_GREEN);
        assert_eq!(usage_color(25), LOW_GREEN);
        assert_eq!(usage_color(26), MID_YELLOW);
        assert_eq!(usage_color(75), MID_YELLOW);
        assert_eq!(usage_color(76), CPU_RED);
    }

    #[test]
    fn test_waiting_screen_before_first_snapshot() {
        let text = render(&TopState::new("http://prometheus:9090/"));
        assert!(text.contains("Waiting for metrics"));
        assert!(text.contains("Quit"));
    }

    #[test]
    fn test_renders_all_panels() {
        let mut state = TopState::new("http://prometheus:9090/");
        state.update(snapshot());
        let text = render(&state);

        for expected in [
            "Total CPU Cores: 16",
            "Total Memory: 64 GB",
            "Current CPU",
            "Peak CPU",
            "Current RAM",
            "Peak RAM",
            "81%",
            "55%",
        ] {
            assert!(text.contains(expected), "missing {expected:?}");
        }
    }

    #[test]
    fn test_out_of_range_percent_does_not_panic() {
        let mut snapshot = snapshot();
        snapshot.current_cpu_percent = 250;
        snapshot.max_memory_percent = -5;
        let mut state = TopState::new("backend");
        state.update(snapshot);

        let text = render(&state);
        assert!(text.contains("250%"));
    }

    #[test]
    fn test_empty_series_shows_placeholder() {
        let mut snapshot = snapshot();
        snapshot.memory_rate = Series::new();
        let mut state = TopState::new("backend");
        state.update(snapshot);

        assert!(render(&state).contains("No RAM data in range"));
    }
}
