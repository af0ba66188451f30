//! User-facing message text.

use chrono::NaiveDate;
use std::collections::BTreeSet;

pub const WELCOME: &str =
    "Hi! Let's watch for train seats.\n\nPlease type the departure station (e.g. Ankara, Eskişehir, Söğütlüçeşme):";
pub const START_FAILED: &str =
    "Sorry, something went wrong while starting your request. Please try again later.";
pub const NOT_AUTHORIZED: &str = "Sorry, you are not allowed to use this bot.";
pub const NO_ACTIVE_REQUEST: &str = "Please use /start to begin.";
pub const START_OVER: &str =
    "This request is finished or was cancelled. Use /start to begin a new search.";
pub const STILL_PROCESSING: &str =
    "Your request is being processed or waiting for a selection. Use /start to begin a new search.";
pub const MONITORING_ACTIVE: &str =
    "Seat monitoring is active. You will be notified when a seat opens up. Use /stop to cancel.";
pub const NOTHING_TO_STOP: &str =
    "There is no active monitoring to stop. Use /start to begin a new search.";
pub const STOPPED: &str = "Seat monitoring stopped.";
pub const GENERIC_FAILURE: &str = "Sorry, something went wrong. Please try again.";
pub const UNEXPECTED_STATE: &str =
    "Something unexpected happened. Please use /start to begin again.";
pub const MISSING_ROUTE: &str =
    "Something went wrong (route information is missing). Please use /start to try again.";
pub const ORACLE_FAILED: &str =
    "Could not fetch trip information. Please try again later or use /start to begin again.";
pub const PICK_DAY: &str = "Please pick the travel day:";
pub const SELECT_AT_LEAST_ONE: &str =
    "Please select at least one departure time, or use /start to cancel.";
pub const DONE_LABEL: &str = "Done ✅";
pub const CANCEL_LABEL: &str = "Stop monitoring";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Departure,
    Arrival,
}

impl Leg {
    pub fn label(self) -> &'static str {
        match self {
            Leg::Departure => "Departure",
            Leg::Arrival => "Arrival",
        }
    }
}

pub fn nothing_to_stop_in(status: &str) -> String {
    format!("There is no active monitoring to stop (current status: {status}). Use /start to begin a new search.")
}

pub fn station_not_found(input: &str) -> String {
    format!("No station found for '{input}'. Please try again (e.g. Ankara, Söğütlüçeşme, Eskişehir).")
}

pub fn station_ambiguous(input: &str) -> String {
    format!("Several stations match '{input}'. Please choose one:")
}

pub fn station_set(leg: Leg, key: &str) -> String {
    let next = match leg {
        Leg::Departure => "Now type the arrival station:",
        Leg::Arrival => PICK_DAY,
    };
    format!("{} station set to '{key}'.\n{next}", leg.label())
}

pub fn checking_day(date: NaiveDate) -> String {
    format!("Day {date} selected.\nChecking trips and seats, this can take a while... ⏳")
}

fn route_header(date: NaiveDate, departure: &str, arrival: &str) -> String {
    format!("Date: {date}\nFrom: {departure}\nTo: {arrival}")
}

pub fn no_trips(date: NaiveDate, departure: &str, arrival: &str) -> String {
    format!(
        "{}\n\nNo trips found for this date.",
        route_header(date, departure, arrival)
    )
}

pub fn pick_times(date: NaiveDate, departure: &str, arrival: &str) -> String {
    format!(
        "{}\n\nSelect the departure times to watch (several allowed), then press Done:",
        route_header(date, departure, arrival)
    )
}

fn joined(times: &BTreeSet<String>) -> String {
    times.iter().cloned().collect::<Vec<_>>().join(", ")
}

pub fn pick_seat_type(times: &BTreeSet<String>) -> String {
    format!("Selected times: {}\n\nNow choose the seat type to watch:", joined(times))
}

pub fn no_seat_types(times: &BTreeSet<String>) -> String {
    format!(
        "Selected times: {}\n\nNo selectable seat types were found for these trips (wheelchair seating excluded).",
        joined(times)
    )
}

pub fn monitoring_confirmed(
    date: NaiveDate,
    times: &BTreeSet<String>,
    departure: &str,
    arrival: &str,
    seat_type: &str,
) -> String {
    format!(
        "Your selection is saved:\n- Date: {date}\n- Times: {}\n- From: {departure}\n- To: {arrival}\n- Seat type: {seat_type}\n\nYou will be notified when a matching seat is available.",
        joined(times)
    )
}

pub fn seats_found(
    date: NaiveDate,
    time: &str,
    seat_type: &str,
    count: u32,
    booking_url: Option<&str>,
) -> String {
    let mut text = format!(
        "🎉 Good news! {count} free '{seat_type}' seat(s) found on the {date} {time} trip!"
    );
    if let Some(url) = booking_url {
        text.push_str(&format!("\nBook now: {url}"));
    }
    text
}
