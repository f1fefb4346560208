use {
    super::renderer::{format_price, format_volume},
    crate::{
        aggregator_core::{AggregateSnapshot, BoardState, DashboardView},
        trade::Side,
    },
    ratatui::{
        layout::{Alignment, Constraint, Direction, Layout as RatLayout, Rect},
        style::{Color, Modifier, Style},
        symbols,
        text::{Line, Span},
        widgets::{Axis, BarChart, Block, Borders, Chart, Dataset, GraphType, Paragraph, Row, Table, Wrap},
        Frame,
    },
};

pub const EMPTY_MESSAGE: &str = "No trades in the database yet. Start the producer to see live data.";

const SERIES_COLORS: [Color; 7] = [
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Green,
    Color::LightRed,
    Color::LightBlue,
    Color::White,
];

/// Render the whole dashboard for the current board state
pub fn render_layout(f: &mut Frame, area: Rect, board: &BoardState, window_size: usize) {
    let chunks = RatLayout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Body
            Constraint::Length(3), // Footer/Status
        ])
        .split(area);

    render_header(f, chunks[0]);

    match &board.view {
        DashboardView::NoData => render_empty(f, chunks[1]),
        DashboardView::Ready(snapshot) => render_snapshot(f, chunks[1], snapshot, window_size),
    }

    render_footer(f, chunks[2], board);
}

fn render_header(f: &mut Frame, area: Rect) {
    let text = vec![Line::from(vec![
        Span::styled("Tradeflow", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" - Real-Time Trades Dashboard  "),
        Span::styled("(q/Esc to quit)", Style::default().fg(Color::DarkGray)),
    ])];

    f.render_widget(
        Paragraph::new(text).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn render_empty(f: &mut Frame, area: Rect) {
    let message = Paragraph::new(EMPTY_MESSAGE)
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Waiting for data"));
    f.render_widget(message, area);
}

fn render_snapshot(f: &mut Frame, area: Rect, snapshot: &AggregateSnapshot, window_size: usize) {
    let rows = RatLayout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    render_kpis(f, rows[0], snapshot, window_size);

    let columns = RatLayout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    render_trades_table(f, columns[0], snapshot);

    let charts = RatLayout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(columns[1]);

    render_price_chart(f, charts[0], snapshot);
    render_volume_chart(f, charts[1], snapshot);
}

fn render_kpis(f: &mut Frame, area: Rect, snapshot: &AggregateSnapshot, window_size: usize) {
    let cells = RatLayout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    let kpis = [
        (format!("Trades (last {})", window_size), snapshot.trade_count.to_string()),
        ("Avg Price".to_string(), format_price(snapshot.mean_price)),
        ("Total Volume".to_string(), format_volume(snapshot.total_volume)),
        ("Most Active Ticker".to_string(), snapshot.top_ticker.clone()),
    ];

    for (cell, (title, value)) in cells.iter().zip(kpis) {
        let widget = Paragraph::new(Span::styled(
            value,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(widget, *cell);
    }
}

fn render_trades_table(f: &mut Frame, area: Rect, snapshot: &AggregateSnapshot) {
    let header = Row::new(vec!["Time", "Ticker", "Side", "Price", "Volume", "Trade ID"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    // Only what fits
    let visible = area.height.saturating_sub(3) as usize;

    let rows: Vec<Row> = snapshot
        .recent_trades
        .iter()
        .take(visible)
        .map(|trade| {
            let side_color = match trade.side {
                Side::Buy => Color::Green,
                Side::Sell => Color::Red,
            };
            let short_id: String = trade.trade_id.chars().take(8).collect();

            Row::new(vec![
                trade.timestamp.format("%H:%M:%S").to_string(),
                trade.ticker.clone(),
                trade.side.as_str().to_uppercase(),
                format_price(trade.price),
                format_volume(u64::from(trade.volume)),
                short_id,
            ])
            .style(Style::default().fg(side_color))
        })
        .collect();

    let widths = [
        Constraint::Length(10), // Time
        Constraint::Length(7),  // Ticker
        Constraint::Length(5),  // Side
        Constraint::Length(11), // Price
        Constraint::Length(7),  // Volume
        Constraint::Min(8),     // Trade ID
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Most Recent Trades"));

    f.render_widget(table, area);
}

fn render_price_chart(f: &mut Frame, area: Rect, snapshot: &AggregateSnapshot) {
    let origin = snapshot
        .price_series
        .values()
        .filter_map(|points| points.first())
        .map(|p| p.timestamp)
        .min();
    let Some(origin) = origin else {
        return;
    };

    // x = seconds since the oldest trade in the window
    let series: Vec<(&String, Vec<(f64, f64)>)> = snapshot
        .price_series
        .iter()
        .map(|(ticker, points)| {
            let xy = points
                .iter()
                .map(|p| {
                    let secs = (p.timestamp - origin).num_milliseconds() as f64 / 1000.0;
                    (secs, p.price)
                })
                .collect();
            (ticker, xy)
        })
        .collect();

    let (mut min_x, mut max_x) = (0.0f64, 0.0f64);
    let (mut min_y, mut max_y) = (f64::MAX, f64::MIN);
    for (_, xy) in &series {
        for &(x, y) in xy {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }
    if max_x <= min_x {
        max_x = min_x + 1.0;
    }
    let pad = ((max_y - min_y) * 0.05).max(1.0);
    let (min_y, max_y) = (min_y - pad, max_y + pad);

    let datasets: Vec<Dataset> = series
        .iter()
        .enumerate()
        .map(|(i, (ticker, xy))| {
            Dataset::default()
                .name(ticker.as_str())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                .data(xy)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title("Price by Ticker"))
        .x_axis(
            Axis::default()
                .title("seconds")
                .style(Style::default().fg(Color::Gray))
                .bounds([min_x, max_x])
                .labels(vec![
                    Span::raw(format!("{:.0}", min_x)),
                    Span::raw(format!("{:.0}", max_x)),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("price")
                .style(Style::default().fg(Color::Gray))
                .bounds([min_y, max_y])
                .labels(vec![
                    Span::raw(format_price(min_y)),
                    Span::raw(format_price(max_y)),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_volume_chart(f: &mut Frame, area: Rect, snapshot: &AggregateSnapshot) {
    let bars: Vec<(&str, u64)> = snapshot
        .volume_ranking
        .iter()
        .map(|tv| (tv.ticker.as_str(), tv.volume))
        .collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Volume by Ticker"))
        .data(bars.as_slice())
        .bar_width(6)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    f.render_widget(chart, area);
}

fn render_footer(f: &mut Frame, area: Rect, board: &BoardState) {
    let refreshed = board
        .published_at
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    let text = vec![Line::from(vec![
        Span::styled("Last refresh: ", Style::default().fg(Color::Cyan)),
        Span::raw(refreshed),
    ])];

    f.render_widget(
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Status")),
        area,
    );
}
