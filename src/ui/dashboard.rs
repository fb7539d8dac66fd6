use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget},
};

use crate::event::WsConnectionStatus;
use crate::view::{format, Highlight, Sign, ViewRow};

const HEADERS: [&str; 7] = [
    "Symbol",
    "Time",
    "Day Open",
    "Current",
    "vs Day Open (%)",
    "🟢/🔴",
    "vs Lst Bar Close (%)",
];

const SHADED_BG: Color = Color::Indexed(236);

fn sign_style(sign: Sign) -> Style {
    match sign {
        Sign::Positive => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
        Sign::Negative => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Sign::Zero => Style::default(),
    }
}

fn row_style(highlight: Highlight) -> Style {
    match highlight {
        Highlight::Gain => Style::default().bg(Color::LightGreen).fg(Color::Black),
        Highlight::Loss => Style::default().bg(Color::LightRed).fg(Color::Black),
        Highlight::Band { shaded: true } => Style::default().bg(SHADED_BG),
        Highlight::Band { shaded: false } => Style::default(),
    }
}

pub struct FeedTable<'a> {
    rows: &'a [ViewRow],
}

impl<'a> FeedTable<'a> {
    pub fn new(rows: &'a [ViewRow]) -> Self {
        Self { rows }
    }
}

impl Widget for FeedTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let header = Row::new(HEADERS.iter().map(|h| Cell::from(*h))).style(
            Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );

        let rows = self.rows.iter().map(|r| {
            let t = &r.tick;
            Row::new(vec![
                Cell::from(t.symbol.as_str()).style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(format::tick_time(&t.time)),
                Cell::from(format::price(t.day_open)),
                Cell::from(format::price(t.price)).style(sign_style(r.change_sign)),
                Cell::from(format::pct(t.pct_vs_day_open)).style(sign_style(r.pct_vs_day_open_sign)),
                Cell::from(t.direction.as_str()).style(sign_style(r.pct_vs_last_close_sign)),
                Cell::from(format::pct(t.pct_vs_last_close))
                    .style(sign_style(r.pct_vs_last_close_sign)),
            ])
            .style(row_style(r.highlight))
        });

        let block = Block::default()
            .title(" Stockfeed ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        Table::new(rows, [Constraint::Ratio(1, 7); 7])
            .header(header)
            .block(block)
            .render(area, buf);
    }
}

pub struct LogPanel<'a> {
    messages: &'a [String],
}

impl<'a> LogPanel<'a> {
    pub fn new(messages: &'a [String]) -> Self {
        Self { messages }
    }
}

impl Widget for LogPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let visible = area.height.saturating_sub(2) as usize;
        let start = self.messages.len().saturating_sub(visible);
        let lines: Vec<Line> = self.messages[start..]
            .iter()
            .map(|msg| {
                let color = if msg.starts_with("[ERR]") {
                    Color::Red
                } else if msg.starts_with("[WARN]") {
                    Color::Yellow
                } else {
                    Color::Gray
                };
                Line::from(Span::styled(msg.as_str(), Style::default().fg(color)))
            })
            .collect();

        let block = Block::default()
            .title(" System Log ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        Paragraph::new(lines).block(block).render(area, buf);
    }
}

pub struct StatusBar<'a> {
    pub date: String,
    pub clock: String,
    pub ws_status: &'a WsConnectionStatus,
    pub tick_count: u64,
    pub buffered: usize,
    pub capacity: usize,
    pub rejected: u64,
    pub persist_failures: u64,
}

pub fn connection_label(status: &WsConnectionStatus) -> (String, Color) {
    match status {
        WsConnectionStatus::Connected => ("CONNECTED".to_string(), Color::Green),
        WsConnectionStatus::Connecting { attempt, .. } => {
            (format!("CONNECTING (#{})", attempt), Color::Yellow)
        }
        WsConnectionStatus::Reconnecting { attempt, delay_ms } => (
            format!("RECONNECTING in {}s (#{})", delay_ms.div_ceil(1_000), attempt),
            Color::Yellow,
        ),
        WsConnectionStatus::Disconnected => ("DISCONNECTED".to_string(), Color::Red),
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (conn_label, conn_color) = connection_label(self.ws_status);
        let sep = || Span::styled(" | ", Style::default().fg(Color::DarkGray));

        let mut spans = vec![
            Span::styled(
                " STOCKFEED ",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(self.date, Style::default().fg(Color::White)),
            Span::styled(format!(" [{}]", self.clock), Style::default().fg(Color::Gray)),
            sep(),
            Span::styled(conn_label, Style::default().fg(conn_color)),
            sep(),
            Span::styled(
                format!("ticks: {}", self.tick_count),
                Style::default().fg(Color::DarkGray),
            ),
            sep(),
            Span::styled(
                format!("buffer: {}/{}", self.buffered, self.capacity),
                Style::default().fg(Color::DarkGray),
            ),
        ];
        if self.rejected > 0 {
            spans.push(sep());
            spans.push(Span::styled(
                format!("dropped: {}", self.rejected),
                Style::default().fg(Color::Yellow),
            ));
        }
        if self.persist_failures > 0 {
            spans.push(sep());
            spans.push(Span::styled(
                format!("save errors: {}", self.persist_failures),
                Style::default().fg(Color::Red),
            ));
        }

        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}

pub struct KeybindBar {
    pub sounds_enabled: bool,
}

impl Widget for KeybindBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut spans = vec![
            Span::styled(" [C]", Style::default().fg(Color::Yellow)),
            Span::styled("lear all  ", Style::default().fg(Color::DarkGray)),
        ];
        if !self.sounds_enabled {
            spans.push(Span::styled("[S]", Style::default().fg(Color::Yellow)));
            spans.push(Span::styled("ounds on  ", Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::styled("[Q]", Style::default().fg(Color::Yellow)));
        spans.push(Span::styled("uit", Style::default().fg(Color::DarkGray)));

        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_label_rounds_delay_up_to_seconds() {
        let (label, color) = connection_label(&WsConnectionStatus::Reconnecting {
            attempt: 3,
            delay_ms: 2_500,
        });
        assert_eq!(label, "RECONNECTING in 3s (#3)");
        assert_eq!(color, Color::Yellow);
        assert_eq!(
            connection_label(&WsConnectionStatus::Disconnected).0,
            "DISCONNECTED"
        );
    }

    #[test]
    fn highlighted_rows_get_backgrounds() {
        assert_eq!(row_style(Highlight::Gain).bg, Some(Color::LightGreen));
        assert_eq!(row_style(Highlight::Loss).bg, Some(Color::LightRed));
        assert_eq!(row_style(Highlight::Band { shaded: true }).bg, Some(SHADED_BG));
        assert_eq!(row_style(Highlight::Band { shaded: false }).bg, None);
    }
}
