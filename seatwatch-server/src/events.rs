//! Inbound events and outbound replies.
//!
//! The transport hands us either free text or a choice id (the payload of a
//! pressed button). Choice ids are plain strings such as
//! `station_select_dep:Ankara` or `calendar_day:2026-11-02`.

use chrono::NaiveDate;
use serde::Serialize;

const DEPARTURE_PREFIX: &str = "station_select_dep:";
const ARRIVAL_PREFIX: &str = "station_select_arr:";
const DAY_PREFIX: &str = "calendar_day:";
const NAV_PREFIX: &str = "calendar_nav:";
const TOGGLE_PREFIX: &str = "multi_time_toggle:";
const SEAT_PREFIX: &str = "seat_select:";
const CALENDAR_IGNORE: &str = "calendar_ignore";
const TIMES_DONE: &str = "multi_time_done";
const CANCEL: &str = "cancel";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `/start`: reset the user's request
    Start,
    /// `/stop`: cancel active monitoring
    Stop,
    Text(String),
    Choice(Choice),
}

impl Event {
    /// Classify a text message. Unrecognised slash-commands yield `None`.
    pub fn from_text(text: &str) -> Option<Event> {
        let trimmed = text.trim();
        if let Some(command) = trimmed.strip_prefix('/') {
            // Telegram appends the bot name in groups: /start@seatwatch_bot
            let command = command.split('@').next().unwrap_or_default();
            return match command {
                "start" => Some(Event::Start),
                "stop" => Some(Event::Stop),
                _ => None,
            };
        }
        Some(Event::Text(text.to_string()))
    }

    pub fn from_choice(id: &str) -> Option<Event> {
        Choice::parse(id).map(Event::Choice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    DepartureStation(String),
    ArrivalStation(String),
    Day(NaiveDate),
    CalendarNav { year: i32, month: u32 },
    /// Padding and header cells of the calendar grid
    Ignore,
    ToggleTime(String),
    TimesDone,
    Seat(String),
    Cancel,
}

impl Choice {
    pub fn parse(id: &str) -> Option<Choice> {
        if let Some(key) = id.strip_prefix(DEPARTURE_PREFIX) {
            return non_empty(key).map(Choice::DepartureStation);
        }
        if let Some(key) = id.strip_prefix(ARRIVAL_PREFIX) {
            return non_empty(key).map(Choice::ArrivalStation);
        }
        if let Some(date) = id.strip_prefix(DAY_PREFIX) {
            return NaiveDate::parse_from_str(date, "%Y-%m-%d").ok().map(Choice::Day);
        }
        if let Some(ym) = id.strip_prefix(NAV_PREFIX) {
            let (year, month) = ym.split_once('-')?;
            let year: i32 = year.parse().ok()?;
            let month: u32 = month.parse().ok()?;
            return (1..=12)
                .contains(&month)
                .then_some(Choice::CalendarNav { year, month });
        }
        if let Some(time) = id.strip_prefix(TOGGLE_PREFIX) {
            return non_empty(time).map(Choice::ToggleTime);
        }
        if let Some(seat) = id.strip_prefix(SEAT_PREFIX) {
            return non_empty(seat).map(Choice::Seat);
        }
        match id {
            CALENDAR_IGNORE => Some(Choice::Ignore),
            TIMES_DONE => Some(Choice::TimesDone),
            CANCEL => Some(Choice::Cancel),
            _ => None,
        }
    }

    pub fn id(&self) -> String {
        match self {
            Choice::DepartureStation(key) => format!("{DEPARTURE_PREFIX}{key}"),
            Choice::ArrivalStation(key) => format!("{ARRIVAL_PREFIX}{key}"),
            Choice::Day(date) => format!("{DAY_PREFIX}{}", date.format("%Y-%m-%d")),
            Choice::CalendarNav { year, month } => format!("{NAV_PREFIX}{year}-{month:02}"),
            Choice::Ignore => CALENDAR_IGNORE.to_string(),
            Choice::ToggleTime(time) => format!("{TOGGLE_PREFIX}{time}"),
            Choice::TimesDone => TIMES_DONE.to_string(),
            Choice::Seat(seat) => format!("{SEAT_PREFIX}{seat}"),
            Choice::Cancel => CANCEL.to_string(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// A button the transport should render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceButton {
    pub label: String,
    pub choice_id: String,
}

impl ChoiceButton {
    pub fn new(label: impl Into<String>, choice: &Choice) -> Self {
        Self {
            label: label.into(),
            choice_id: choice.id(),
        }
    }
}

/// One outbound message, optionally with rows of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Vec<ChoiceButton>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    pub fn with_choices(text: impl Into<String>, choices: Vec<Vec<ChoiceButton>>) -> Self {
        Self {
            text: text.into(),
            choices,
        }
    }

    /// Every choice id on this reply, row by row.
    pub fn choice_ids(&self) -> Vec<&str> {
        self.choices
            .iter()
            .flatten()
            .map(|b| b.choice_id.as_str())
            .collect()
    }
}
