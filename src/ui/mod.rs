mod theme;

use crate::app::{AppModel, Focus, Panel, Popup, PopupKind, detail_bounds, panel_bounds};
use crate::domain::{Bounds, HierarchyLevel, render_task_detail};
use ratatui::prelude::*;
use ratatui::widgets::*;
use unicode_width::UnicodeWidthStr;

const MENU_HINTS: &str = "F5:REFRESH | G:GC | F12:EXIT";

pub fn render(frame: &mut Frame, model: &AppModel) {
    let full_area = frame.area();
    if full_area.width == 0 || full_area.height == 0 {
        return;
    }

    render_menu_bar(frame, full_area, model);

    let size = (full_area.width, full_area.height);
    let focus = model.focus();
    for panel in &model.panels {
        let focused = focus == Focus::Panel(panel.level);
        render_panel(frame, bounds_rect(panel_bounds(size, panel.level), full_area), model, panel, focused);
    }

    if let Some(detail) = &model.detail {
        let area = bounds_rect(detail_bounds(size), full_area);
        frame.render_widget(Clear, area);
        let body = render_task_detail(detail);
        let paragraph = Paragraph::new(body)
            .wrap(Wrap { trim: false })
            .block(panel_block("Task", focus == Focus::Detail));
        frame.render_widget(paragraph, area);
    }

    if let Some(popup) = &model.popup {
        render_popup(frame, full_area, popup);
    }
}

fn bounds_rect(bounds: Bounds, area: Rect) -> Rect {
    Rect {
        x: bounds.x0,
        y: bounds.y0,
        width: bounds.width(),
        height: bounds.height(),
    }
    .intersection(area)
}

fn render_menu_bar(frame: &mut Frame, area: Rect, model: &AppModel) {
    let bar_area = Rect {
        x: area.x,
        y: area.y,
        width: area.width,
        height: 1,
    };

    let base_style = Style::default().fg(theme::FG).bg(theme::BAR_BG);
    let title_style = Style::default()
        .fg(theme::ACCENT)
        .bg(theme::BAR_BG)
        .add_modifier(Modifier::BOLD);
    let hint_style = Style::default().fg(theme::MUTED).bg(theme::BAR_BG);

    let title = " Trek ";
    let hints = format!("  {MENU_HINTS}");
    let right = match (&model.notice, &model.active_cluster) {
        (Some(notice), _) => format!("{notice} "),
        (None, Some(cluster)) => format!("cluster: {cluster} "),
        (None, None) => String::new(),
    };
    let right_style = if model.notice.is_some() {
        Style::default().fg(theme::SUCCESS).bg(theme::BAR_BG)
    } else {
        base_style
    };

    let used = title.width() + hints.width() + right.width();
    let gap = (bar_area.width as usize).saturating_sub(used);

    let spans = vec![
        Span::styled(title, title_style),
        Span::styled(hints, hint_style),
        Span::styled(" ".repeat(gap), base_style),
        Span::styled(right, right_style),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)).style(base_style), bar_area);
}

fn panel_block(title: &str, focused: bool) -> Block<'_> {
    let border = if focused { theme::ACCENT } else { theme::BORDER };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title)
}

fn render_panel(frame: &mut Frame, area: Rect, model: &AppModel, panel: &Panel, focused: bool) {
    frame.render_widget(Clear, area);
    let block = panel_block(panel.level.title(), focused);
    let rows = model.nav.panel_rows(panel.level);

    if rows.is_empty() {
        let empty = Paragraph::new(empty_message(panel.level))
            .style(Style::default().fg(theme::DIM))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items = rows.into_iter().map(ListItem::new).collect::<Vec<_>>();
    let highlight = if focused {
        Style::default()
            .fg(theme::ACCENT)
            .bg(theme::ACCENT_BG)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme::FG).add_modifier(Modifier::BOLD)
    };
    let list = List::new(items)
        .block(block)
        .highlight_style(highlight)
        .highlight_symbol("▸ ");

    let mut state = ListState::default()
        .with_offset(panel.cursor.origin)
        .with_selected(Some(panel.cursor.y));
    frame.render_stateful_widget(list, area, &mut state);
}

fn empty_message(level: HierarchyLevel) -> String {
    format!("No {}.", level.title().to_lowercase())
}

fn render_popup(frame: &mut Frame, area: Rect, popup: &Popup) {
    let popup_area = centered_rect(60, 30, area);
    frame.render_widget(Clear, popup_area);

    let accent = match popup.kind {
        PopupKind::Info => theme::ACCENT,
        PopupKind::Error => theme::ERROR,
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent))
        .title(Span::styled(
            popup.title.as_str(),
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ))
        .padding(Padding::horizontal(1));

    let lines = vec![
        Line::from(popup.message.as_str()),
        Line::from(""),
        Line::from(Span::styled(
            "Enter/Esc to dismiss",
            Style::default().fg(theme::DIM),
        )),
    ];
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
    frame.render_widget(paragraph, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
