//! Month grid for day selection.
//!
//! Layout: a title row, a Monday-first weekday header, the weeks of the month
//! padded with blank cells, then `<` / `>` navigation.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

use crate::events::{Choice, ChoiceButton};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const WEEKDAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

/// `(year, month)` one month before/after, wrapping the year.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// `(year, month)` of `now` as seen at `offset`.
pub fn current_month(now: DateTime<Utc>, offset: FixedOffset) -> (i32, u32) {
    let local = now.with_timezone(&offset).date_naive();
    (local.year(), local.month())
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = shift_month(year, month, 1);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

fn blank() -> ChoiceButton {
    ChoiceButton::new(" ", &Choice::Ignore)
}

/// Button rows for `month` (1-based) of `year`. Out-of-range input yields an empty grid.
pub fn month_grid(year: i32, month: u32) -> Vec<Vec<ChoiceButton>> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    rows.push(vec![ChoiceButton::new(
        format!("{} {}", MONTH_NAMES[month as usize - 1], year),
        &Choice::Ignore,
    )]);
    rows.push(
        WEEKDAYS
            .iter()
            .map(|d| ChoiceButton::new(*d, &Choice::Ignore))
            .collect(),
    );

    let mut week: Vec<ChoiceButton> = (0..first.weekday().num_days_from_monday())
        .map(|_| blank())
        .collect();

    for day in 1..=days_in_month(year, month) {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            week.push(ChoiceButton::new(day.to_string(), &Choice::Day(date)));
        }
        if week.len() == 7 {
            rows.push(std::mem::take(&mut week));
        }
    }
    if !week.is_empty() {
        week.resize_with(7, blank);
        rows.push(week);
    }

    let (prev_year, prev_month) = shift_month(year, month, -1);
    let (next_year, next_month) = shift_month(year, month, 1);
    rows.push(vec![
        ChoiceButton::new(
            "<",
            &Choice::CalendarNav {
                year: prev_year,
                month: prev_month,
            },
        ),
        ChoiceButton::new(
            ">",
            &Choice::CalendarNav {
                year: next_year,
                month: next_month,
            },
        ),
    ]);

    rows
}
