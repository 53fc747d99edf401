//! TUI rendering.
//!
//! ┌──────────────────────────────────────────────────────┐
//! │  🦠 outbreak   running  day 42  1f3c…  ⟳             │
//! ├────────────────────────────┬─────────────────────────┤
//! │  ╭ S / I / R               │   ·  ·─·   contact      │
//! │  │ ~~~~~~~~~~~~~~          │  ·─●─·  ·   graph       │
//! │  ╰─────────────────────    │   ·   ·─●               │
//! ├────────────────────────────┴─────────────────────────┤
//! │  Day 42                                              │
//! │  lockdown 50%   vaccinate 10%   N=500 …              │
//! ├──────────────────────────────────────────────────────┤
//! │  enter start  space step  a auto  l lockdown  q quit │
//! └──────────────────────────────────────────────────────┘

use super::app::App;
use outbreak_core::{NodeStatus, SessionState};
use ratatui::{
    prelude::*,
    widgets::canvas::{Canvas, Line as CanvasLine, Points},
    widgets::*,
};

const SUSCEPTIBLE: Color = Color::Rgb(0x22, 0xc5, 0x5e);
const INFECTED: Color = Color::Rgb(0xef, 0x44, 0x44);
const RECOVERED: Color = Color::Rgb(0x3b, 0x82, 0xf6);
const UNKNOWN: Color = Color::Rgb(0x99, 0x99, 0x99);

pub fn status_color(status: NodeStatus) -> Color {
    match status {
        NodeStatus::Susceptible => SUSCEPTIBLE,
        NodeStatus::Infected => INFECTED,
        NodeStatus::Recovered => RECOVERED,
        NodeStatus::Unknown => UNKNOWN,
    }
}

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(10),   // chart + graph
            Constraint::Length(6), // status
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[1]);
    draw_chart(f, cols[0], app);
    draw_graph(f, cols[1], app);

    draw_status(f, rows[2], app);
    draw_keys(f, rows[3]);
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let view = app.view();
    let state_color = match view.state {
        SessionState::Idle => Color::DarkGray,
        SessionState::Running => Color::Green,
        SessionState::AutoPlaying => Color::Yellow,
        SessionState::Paused => Color::Blue,
    };
    let day = view.day.map(|d| format!("  day {d}")).unwrap_or_default();
    let id = view
        .session_id
        .map(|id| {
            let s = id.to_string();
            format!("  {}…", &s[..8])
        })
        .unwrap_or_default();
    let spin = if view.busy { "  ⟳" } else { "" };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(" 🦠 outbreak ", Style::default().bold().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(view.state.label(), Style::default().bold().fg(state_color)),
            Span::styled(
                format!("{day}{id}{spin} "),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

    f.render_widget(block, area);
}

fn draw_chart(f: &mut Frame, area: Rect, app: &App) {
    let view = app.view();

    if view.series.is_empty() {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Compartments ");
        let p = Paragraph::new("Press enter to start a simulation")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(p, area);
        return;
    }

    let pick = |which: fn(&outbreak_core::SeriesPoint) -> u64| -> Vec<(f64, f64)> {
        view.series
            .iter()
            .map(|p| (f64::from(p.day), which(p) as f64))
            .collect()
    };
    let s = pick(|p| p.susceptible);
    let i = pick(|p| p.infected);
    let r = pick(|p| p.recovered);

    let latest = view.series[view.series.len() - 1];
    let datasets = vec![
        Dataset::default()
            .name(format!("S {}", latest.susceptible))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(SUSCEPTIBLE))
            .data(&s),
        Dataset::default()
            .name(format!("I {}", latest.infected))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(INFECTED))
            .data(&i),
        Dataset::default()
            .name(format!("R {}", latest.recovered))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(RECOVERED))
            .data(&r),
    ];

    let first_day = f64::from(view.series[0].day);
    let x_max = f64::from(latest.day).max(first_day + 10.0);
    let y_max = (view.y_bound() as f64).max(1.0);

    let x_axis = Axis::default()
        .bounds([first_day, x_max])
        .labels([format!("{first_day:.0}"), format!("{x_max:.0}")]);
    let y_axis = Axis::default()
        .bounds([0.0, y_max])
        .labels(["0".to_string(), format!("{y_max:.0}")]);

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Compartments  last {} days ", view.series.len())),
        )
        .x_axis(x_axis)
        .y_axis(y_axis);

    f.render_widget(chart, area);
}

fn draw_graph(f: &mut Frame, area: Rect, app: &App) {
    let frame = &app.view().graph;
    let title = if frame.nodes.is_empty() {
        " Contacts ".to_string()
    } else if frame.settling {
        format!(" Contacts  {} nodes  settling… ", frame.nodes.len())
    } else {
        format!(" Contacts  {} nodes ", frame.nodes.len())
    };

    let (w, h) = (frame.viewport.width, frame.viewport.height);
    let mut by_status: [(NodeStatus, Vec<(f64, f64)>); 4] = [
        (NodeStatus::Susceptible, Vec::new()),
        (NodeStatus::Recovered, Vec::new()),
        (NodeStatus::Unknown, Vec::new()),
        (NodeStatus::Infected, Vec::new()),
    ];
    for node in &frame.nodes {
        if let Some((_, coords)) = by_status.iter_mut().find(|(s, _)| *s == node.status) {
            // Canvas y grows upwards, layout y grows downwards.
            coords.push((node.x, h - node.y));
        }
    }

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(symbols::Marker::Braille)
        .x_bounds([0.0, w])
        .y_bounds([0.0, h])
        .paint(|ctx| {
            for &((x1, y1), (x2, y2)) in &frame.edges {
                ctx.draw(&CanvasLine {
                    x1,
                    y1: h - y1,
                    x2,
                    y2: h - y2,
                    color: Color::DarkGray,
                });
            }
            ctx.layer();
            // Infected last so they stay visible on top.
            for (status, coords) in &by_status {
                ctx.draw(&Points {
                    coords,
                    color: status_color(*status),
                });
            }
        });

    f.render_widget(canvas, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let view = app.view();
    let status_style = if view.status.starts_with("Error") {
        Style::default().fg(Color::Red).bold()
    } else {
        Style::default().fg(Color::White).bold()
    };

    // Rejection details can be multi-line JSON; fold them into one wrapped line.
    let words: Vec<&str> = view.status.split_whitespace().collect();
    let p = app.params();

    let mut lines = vec![
        Line::from(Span::styled(words.join(" "), status_style)),
        Line::from(vec![
            Span::styled(
                format!(
                    "lockdown {:.0}%   vaccinate {:.0}%",
                    app.lockdown_strength() * 100.0,
                    app.vaccination_fraction() * 100.0
                ),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw("   "),
            Span::styled(
                format!(
                    "N={}  I0={}  β={:.2}  recovery={}d  masks×{:.2}  k={}  p={:.2}",
                    p.population_size,
                    p.initial_infected,
                    p.transmission_prob,
                    p.recovery_time,
                    p.mask_multiplier,
                    p.avg_degree,
                    p.rewire_prob
                ),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
    ];
    if let Some(notice) = app.notice() {
        lines.push(Line::from(Span::styled(
            notice.to_string(),
            Style::default().fg(Color::Cyan),
        )));
    }

    let block = Block::default().borders(Borders::TOP).title(" Status ");
    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(
        " enter start  space step  a auto  x stop  l/v lockdown/vaccinate  [ ] - + levels  r reset  e export  q quit",
    )
    .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}
