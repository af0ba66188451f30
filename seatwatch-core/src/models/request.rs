use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Seat-class names containing any of these are accessibility seating and
/// never offered as a selectable class.
const ACCESSIBLE_CLASS_MARKERS: &[&str] = &["tekerlekli sandalye", "wheelchair"];

/// Lifecycle of a monitoring request.
///
/// Stored as its snake_case name. Any stored value this build does not know
/// about deserializes to `Unknown` so callers can fail safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestStatus {
    AwaitingDeparture,
    AwaitingDepartureChoice,
    AwaitingArrival,
    AwaitingArrivalChoice,
    AwaitingDay,
    ProcessingRequest,
    AwaitingMultiTimeSelection,
    AwaitingSeatTypeSelection,
    Monitoring,
    Completed,
    Cancelled,
    Unknown(String),
}

impl RequestStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RequestStatus::AwaitingDeparture => "awaiting_departure",
            RequestStatus::AwaitingDepartureChoice => "awaiting_departure_choice",
            RequestStatus::AwaitingArrival => "awaiting_arrival",
            RequestStatus::AwaitingArrivalChoice => "awaiting_arrival_choice",
            RequestStatus::AwaitingDay => "awaiting_day",
            RequestStatus::ProcessingRequest => "processing_request",
            RequestStatus::AwaitingMultiTimeSelection => "awaiting_multi_time_selection",
            RequestStatus::AwaitingSeatTypeSelection => "awaiting_seat_type_selection",
            RequestStatus::Monitoring => "monitoring",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Unknown(raw) => raw,
        }
    }

    /// `completed` and `cancelled` are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

impl FromStr for RequestStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "awaiting_departure" => RequestStatus::AwaitingDeparture,
            "awaiting_departure_choice" => RequestStatus::AwaitingDepartureChoice,
            "awaiting_arrival" => RequestStatus::AwaitingArrival,
            "awaiting_arrival_choice" => RequestStatus::AwaitingArrivalChoice,
            "awaiting_day" => RequestStatus::AwaitingDay,
            "processing_request" => RequestStatus::ProcessingRequest,
            "awaiting_multi_time_selection" => RequestStatus::AwaitingMultiTimeSelection,
            "awaiting_seat_type_selection" => RequestStatus::AwaitingSeatTypeSelection,
            "monitoring" => RequestStatus::Monitoring,
            "completed" => RequestStatus::Completed,
            "cancelled" => RequestStatus::Cancelled,
            other => RequestStatus::Unknown(other.to_string()),
        })
    }
}

impl From<String> for RequestStatus {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<RequestStatus> for String {
    fn from(status: RequestStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One departure returned by the availability oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// `HH:MM`
    pub time: String,
    /// Free seats per seat-class name. The scraper script emits this as `details`.
    #[serde(rename = "seatCounts", alias = "details", default)]
    pub seat_counts: BTreeMap<String, u32>,
}

impl TimeSlot {
    pub fn new(time: impl Into<String>, seat_counts: &[(&str, u32)]) -> Self {
        Self {
            time: time.into(),
            seat_counts: seat_counts
                .iter()
                .map(|(name, count)| (name.to_string(), *count))
                .collect(),
        }
    }
}

pub fn is_accessible_class(name: &str) -> bool {
    let lowered = crate::stations::normalize(name);
    ACCESSIBLE_CLASS_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// The single monitoring request a user owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringRequest {
    pub user_id: String,
    pub status: RequestStatus,
    pub departure_input: Option<String>,
    pub arrival_input: Option<String>,
    pub mapped_departure: Option<String>,
    pub mapped_arrival: Option<String>,
    pub selected_date: Option<NaiveDate>,
    /// `None` once cleared.
    pub last_check_results: Option<Vec<TimeSlot>>,
    pub selected_times: BTreeSet<String>,
    pub seat_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MonitoringRequest {
    /// A fresh request waiting for the departure station.
    pub fn new(user_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            status: RequestStatus::AwaitingDeparture,
            departure_input: None,
            arrival_input: None,
            mapped_departure: None,
            mapped_arrival: None,
            selected_date: None,
            last_check_results: None,
            selected_times: BTreeSet::new(),
            seat_type: None,
            created_at,
        }
    }

    /// Names of the fields the scheduler needs but this request lacks.
    pub fn missing_monitor_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.mapped_departure.is_none() {
            missing.push("mapped_departure");
        }
        if self.mapped_arrival.is_none() {
            missing.push("mapped_arrival");
        }
        if self.selected_date.is_none() {
            missing.push("selected_date");
        }
        if self.seat_type.is_none() {
            missing.push("seat_type");
        }
        if self.selected_times.is_empty() {
            missing.push("selected_times");
        }
        missing
    }

    /// Seat classes offered across the selected slots, accessibility seating excluded.
    pub fn selectable_seat_classes(&self) -> BTreeSet<String> {
        self.last_check_results
            .iter()
            .flatten()
            .filter(|slot| self.selected_times.contains(&slot.time))
            .flat_map(|slot| slot.seat_counts.keys())
            .filter(|name| !is_accessible_class(name))
            .cloned()
            .collect()
    }

    pub fn offers_time(&self, time: &str) -> bool {
        self.last_check_results
            .iter()
            .flatten()
            .any(|slot| slot.time == time)
    }
}
