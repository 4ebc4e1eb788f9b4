use anyhow::Error;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};

use crate::models::{BookStatus, UserStatus};

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the most relevant error message from a chained error.
pub(crate) fn surface_error(err: &Error) -> String {
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

pub(crate) fn book_status_style(status: BookStatus) -> Style {
    let color = match status {
        BookStatus::Available => Color::Green,
        BookStatus::NotAvailable => Color::Yellow,
        BookStatus::Missing => Color::Red,
        BookStatus::Damaged => Color::Gray,
    };
    Style::default().fg(color)
}

pub(crate) fn user_status_style(status: UserStatus) -> Style {
    let color = match status {
        UserStatus::Active => Color::Green,
        UserStatus::Inactive => Color::Gray,
        UserStatus::Suspended => Color::Red,
    };
    Style::default().fg(color)
}
