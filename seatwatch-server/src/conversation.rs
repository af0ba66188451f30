//! Conversation state machine: turns a user's messages and button presses
//! into a validated monitoring request.
//!
//! Every event loads the user's request from the store, applies one
//! transition, and writes the full row back. The store is the only source of
//! truth; nothing about a conversation is kept in memory between events.
//!
//! Events for the same user are handled one at a time (per-user lock), so a
//! second day pick cannot start another oracle call while the first one is
//! still running: by the time it is handled the status has moved on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use tokio::sync::Mutex;

use seatwatch_core::access::{check_access, AllowList};
use seatwatch_core::oracle::{check_with_timeout, AvailabilityOracle};
use seatwatch_core::stations::{StationCatalog, StationMatch};
use seatwatch_core::store::{RequestStore, StoreError};
use seatwatch_core::{MonitoringRequest, RequestStatus};

use crate::calendar;
use crate::events::{Choice, ChoiceButton, Event, Reply};
use crate::prompts::{self, Leg};

const TIMES_PER_ROW: usize = 3;

/// Result of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rejected by the allow-list; nothing was read or written.
    Denied(Reply),
    Replies(Vec<Reply>),
}

impl Outcome {
    pub fn replies(&self) -> &[Reply] {
        match self {
            Outcome::Denied(reply) => std::slice::from_ref(reply),
            Outcome::Replies(replies) => replies,
        }
    }
}

#[derive(Debug)]
enum Input {
    Text(String),
    Choice(Choice),
}

pub struct ConversationService {
    store: Arc<dyn RequestStore>,
    allow_list: Arc<dyn AllowList>,
    stations: Arc<StationCatalog>,
    oracle: Arc<dyn AvailabilityOracle>,
    oracle_timeout: Duration,
    local_offset: FixedOffset,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn RequestStore>,
        allow_list: Arc<dyn AllowList>,
        stations: Arc<StationCatalog>,
        oracle: Arc<dyn AvailabilityOracle>,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            store,
            allow_list,
            stations,
            oracle,
            oracle_timeout,
            local_offset: Utc.fix(),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Offset used to decide which month the day picker opens on. Defaults to UTC.
    pub fn with_local_offset(mut self, offset: FixedOffset) -> Self {
        self.local_offset = offset;
        self
    }

    /// Gate the event through the allow-list, then apply it.
    pub async fn handle(&self, user_id: &str, event: Event) -> Outcome {
        if !check_access(self.allow_list.as_ref(), user_id).await {
            tracing::info!(user_id, "Denied inbound event");
            return Outcome::Denied(Reply::text(prompts::NOT_AUTHORIZED));
        }

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let replies = match event {
            Event::Start => self.start(user_id).await,
            Event::Stop => self.stop(user_id).await,
            Event::Text(text) => self.advance(user_id, Input::Text(text)).await,
            Event::Choice(choice) => self.advance(user_id, Input::Choice(choice)).await,
        };
        Outcome::Replies(replies)
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    // ========================================================================
    // Session commands
    // ========================================================================

    async fn start(&self, user_id: &str) -> Vec<Reply> {
        let request = MonitoringRequest::new(user_id, Utc::now());
        match self.store.upsert(&request).await {
            Ok(()) => {
                tracing::info!(user_id, "Request reset to awaiting_departure");
                vec![Reply::text(prompts::WELCOME)]
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to reset request");
                vec![Reply::text(prompts::START_FAILED)]
            }
        }
    }

    async fn stop(&self, user_id: &str) -> Vec<Reply> {
        let Some(request) = self.load(user_id).await else {
            return vec![Reply::text(prompts::NOTHING_TO_STOP)];
        };

        match request.status.clone() {
            RequestStatus::Monitoring => self.cancel_monitoring(request).await,
            RequestStatus::Unknown(raw) => self.fail_safe(request, &raw).await,
            status if !status.is_terminal() => {
                vec![Reply::text(prompts::nothing_to_stop_in(status.as_str()))]
            }
            _ => vec![Reply::text(prompts::NOTHING_TO_STOP)],
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    async fn advance(&self, user_id: &str, input: Input) -> Vec<Reply> {
        let Some(request) = self.load(user_id).await else {
            return vec![Reply::text(prompts::NO_ACTIVE_REQUEST)];
        };

        match (request.status.clone(), input) {
            (RequestStatus::AwaitingDeparture, Input::Text(text)) => {
                self.station_input(request, Leg::Departure, &text).await
            }
            (RequestStatus::AwaitingArrival, Input::Text(text)) => {
                self.station_input(request, Leg::Arrival, &text).await
            }
            (
                RequestStatus::AwaitingDepartureChoice,
                Input::Choice(Choice::DepartureStation(key)),
            ) => self.station_chosen(request, Leg::Departure, key).await,
            (RequestStatus::AwaitingArrivalChoice, Input::Choice(Choice::ArrivalStation(key))) => {
                self.station_chosen(request, Leg::Arrival, key).await
            }
            (RequestStatus::AwaitingDay, Input::Choice(Choice::Day(date))) => {
                self.day_chosen(request, date).await
            }
            (RequestStatus::AwaitingDay, Input::Choice(Choice::CalendarNav { year, month })) => {
                vec![Reply::with_choices(
                    prompts::PICK_DAY,
                    calendar::month_grid(year, month),
                )]
            }
            (RequestStatus::AwaitingMultiTimeSelection, Input::Choice(Choice::ToggleTime(time))) => {
                self.toggle_time(request, time).await
            }
            (RequestStatus::AwaitingMultiTimeSelection, Input::Choice(Choice::TimesDone)) => {
                self.times_done(request).await
            }
            (RequestStatus::AwaitingSeatTypeSelection, Input::Choice(Choice::Seat(seat))) => {
                self.seat_chosen(request, seat).await
            }
            (RequestStatus::Monitoring, Input::Choice(Choice::Cancel)) => {
                self.cancel_monitoring(request).await
            }
            (RequestStatus::Monitoring, Input::Text(_)) => {
                vec![Reply::text(prompts::MONITORING_ACTIVE)]
            }
            (
                RequestStatus::ProcessingRequest
                | RequestStatus::AwaitingMultiTimeSelection
                | RequestStatus::AwaitingSeatTypeSelection,
                Input::Text(_),
            ) => vec![Reply::text(prompts::STILL_PROCESSING)],
            (RequestStatus::Completed | RequestStatus::Cancelled, _) => {
                vec![Reply::text(prompts::START_OVER)]
            }
            (RequestStatus::Unknown(raw), _) => self.fail_safe(request, &raw).await,
            // Free text while a button is expected, or a button that does not
            // belong to the current step.
            (
                RequestStatus::AwaitingDeparture
                | RequestStatus::AwaitingDepartureChoice
                | RequestStatus::AwaitingArrival
                | RequestStatus::AwaitingArrivalChoice
                | RequestStatus::AwaitingDay
                | RequestStatus::ProcessingRequest
                | RequestStatus::AwaitingMultiTimeSelection
                | RequestStatus::AwaitingSeatTypeSelection
                | RequestStatus::Monitoring,
                input,
            ) => {
                tracing::debug!(user_id, status = %request.status, ?input, "Ignoring input");
                Vec::new()
            }
        }
    }

    async fn station_input(
        &self,
        mut request: MonitoringRequest,
        leg: Leg,
        text: &str,
    ) -> Vec<Reply> {
        let input = text.trim().to_string();

        match self.stations.lookup(&input) {
            StationMatch::NotFound => {
                tracing::info!(user_id = %request.user_id, ?leg, input = %input, "No station match");
                vec![Reply::text(prompts::station_not_found(&input))]
            }
            StationMatch::Unique(key) => {
                *raw_input_mut(&mut request, leg) = Some(input);
                self.accept_station(request, leg, key).await
            }
            StationMatch::Ambiguous(candidates) => {
                tracing::info!(
                    user_id = %request.user_id,
                    ?leg,
                    candidates = candidates.len(),
                    "Ambiguous station input"
                );
                let rows = candidates
                    .into_iter()
                    .map(|key| {
                        let choice = match leg {
                            Leg::Departure => Choice::DepartureStation(key.clone()),
                            Leg::Arrival => Choice::ArrivalStation(key.clone()),
                        };
                        vec![ChoiceButton::new(key, &choice)]
                    })
                    .collect();
                let reply = Reply::with_choices(prompts::station_ambiguous(&input), rows);

                *raw_input_mut(&mut request, leg) = Some(input);
                request.status = match leg {
                    Leg::Departure => RequestStatus::AwaitingDepartureChoice,
                    Leg::Arrival => RequestStatus::AwaitingArrivalChoice,
                };
                self.persist(&request, vec![reply]).await
            }
        }
    }

    /// A station button was pressed. Only candidates for the stored raw input count.
    async fn station_chosen(
        &self,
        mut request: MonitoringRequest,
        leg: Leg,
        key: String,
    ) -> Vec<Reply> {
        let raw = raw_input_mut(&mut request, leg).clone().unwrap_or_default();
        if !self.stations.resolve(&raw).contains(&key) {
            tracing::debug!(user_id = %request.user_id, key = %key, "Station choice not among candidates");
            return Vec::new();
        }
        self.accept_station(request, leg, key).await
    }

    async fn accept_station(
        &self,
        mut request: MonitoringRequest,
        leg: Leg,
        key: String,
    ) -> Vec<Reply> {
        let reply = match leg {
            Leg::Departure => Reply::text(prompts::station_set(leg, &key)),
            Leg::Arrival => {
                let (year, month) = calendar::current_month(Utc::now(), self.local_offset);
                Reply::with_choices(
                    prompts::station_set(leg, &key),
                    calendar::month_grid(year, month),
                )
            }
        };

        match leg {
            Leg::Departure => {
                request.mapped_departure = Some(key);
                request.status = RequestStatus::AwaitingArrival;
            }
            Leg::Arrival => {
                request.mapped_arrival = Some(key);
                request.status = RequestStatus::AwaitingDay;
            }
        }
        self.persist(&request, vec![reply]).await
    }

    async fn day_chosen(&self, mut request: MonitoringRequest, date: NaiveDate) -> Vec<Reply> {
        request.selected_date = Some(date);
        request.status = RequestStatus::ProcessingRequest;
        if let Err(e) = self.store.upsert(&request).await {
            return write_failed(&request, e);
        }

        let mut replies = vec![Reply::text(prompts::checking_day(date))];

        let (Some(departure), Some(arrival)) =
            (request.mapped_departure.clone(), request.mapped_arrival.clone())
        else {
            tracing::error!(user_id = %request.user_id, "Route missing at processing_request");
            request.status = RequestStatus::Cancelled;
            replies.push(Reply::text(prompts::MISSING_ROUTE));
            return self.persist(&request, replies).await;
        };

        let result = check_with_timeout(
            self.oracle.as_ref(),
            &departure,
            &arrival,
            date,
            self.oracle_timeout,
        )
        .await;

        match result {
            Err(e) => {
                tracing::warn!(
                    user_id = %request.user_id,
                    oracle = self.oracle.name(),
                    error = %e,
                    "Availability check failed"
                );
                request.status = RequestStatus::Cancelled;
                request.last_check_results = None;
                replies.push(Reply::text(prompts::ORACLE_FAILED));
            }
            Ok(slots) if slots.is_empty() => {
                request.status = RequestStatus::Completed;
                request.last_check_results = None;
                replies.push(Reply::text(prompts::no_trips(date, &departure, &arrival)));
            }
            Ok(slots) => {
                tracing::info!(user_id = %request.user_id, slots = slots.len(), "Trips found");
                request.status = RequestStatus::AwaitingMultiTimeSelection;
                request.last_check_results = Some(slots);
                request.selected_times.clear();
                replies.push(time_picker(&request));
            }
        }
        self.persist(&request, replies).await
    }

    async fn toggle_time(&self, mut request: MonitoringRequest, time: String) -> Vec<Reply> {
        if !request.offers_time(&time) {
            tracing::debug!(user_id = %request.user_id, time = %time, "Toggle for unknown time");
            return Vec::new();
        }
        if !request.selected_times.remove(&time) {
            request.selected_times.insert(time);
        }
        let reply = time_picker(&request);
        self.persist(&request, vec![reply]).await
    }

    async fn times_done(&self, mut request: MonitoringRequest) -> Vec<Reply> {
        if request.selected_times.is_empty() {
            return vec![Reply::text(prompts::SELECT_AT_LEAST_ONE)];
        }

        let classes = request.selectable_seat_classes();
        if classes.is_empty() {
            let reply = Reply::text(prompts::no_seat_types(&request.selected_times));
            request.status = RequestStatus::Completed;
            request.last_check_results = None;
            request.selected_times.clear();
            return self.persist(&request, vec![reply]).await;
        }

        let rows = classes
            .into_iter()
            .map(|name| {
                let choice = Choice::Seat(name.clone());
                vec![ChoiceButton::new(name, &choice)]
            })
            .collect();
        let reply = Reply::with_choices(prompts::pick_seat_type(&request.selected_times), rows);
        request.status = RequestStatus::AwaitingSeatTypeSelection;
        self.persist(&request, vec![reply]).await
    }

    async fn seat_chosen(&self, mut request: MonitoringRequest, seat: String) -> Vec<Reply> {
        if !request.selectable_seat_classes().contains(&seat) {
            tracing::debug!(user_id = %request.user_id, seat = %seat, "Seat type not offered");
            return Vec::new();
        }

        let reply = Reply::with_choices(
            prompts::monitoring_confirmed(
                request.selected_date.unwrap_or_default(),
                &request.selected_times,
                request.mapped_departure.as_deref().unwrap_or_default(),
                request.mapped_arrival.as_deref().unwrap_or_default(),
                &seat,
            ),
            vec![vec![ChoiceButton::new(prompts::CANCEL_LABEL, &Choice::Cancel)]],
        );
        request.seat_type = Some(seat);
        request.last_check_results = None;
        request.status = RequestStatus::Monitoring;
        self.persist(&request, vec![reply]).await
    }

    async fn cancel_monitoring(&self, mut request: MonitoringRequest) -> Vec<Reply> {
        request.status = RequestStatus::Cancelled;
        self.persist(&request, vec![Reply::text(prompts::STOPPED)]).await
    }

    /// A status this build does not understand: cancel so the user is not stuck.
    async fn fail_safe(&self, mut request: MonitoringRequest, raw: &str) -> Vec<Reply> {
        tracing::error!(user_id = %request.user_id, status = raw, "Unhandled status, cancelling");
        request.status = RequestStatus::Cancelled;
        if let Err(e) = self.store.upsert(&request).await {
            tracing::error!(user_id = %request.user_id, error = %e, "Failed to cancel request");
        }
        vec![Reply::text(prompts::UNEXPECTED_STATE)]
    }

    // ========================================================================
    // Store helpers
    // ========================================================================

    /// Read failures count as "no active request".
    async fn load(&self, user_id: &str) -> Option<MonitoringRequest> {
        match self.store.get(user_id).await {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to read request state");
                None
            }
        }
    }

    async fn persist(&self, request: &MonitoringRequest, replies: Vec<Reply>) -> Vec<Reply> {
        match self.store.upsert(request).await {
            Ok(()) => {
                tracing::info!(user_id = %request.user_id, status = %request.status, "Request updated");
                replies
            }
            Err(e) => write_failed(request, e),
        }
    }
}

fn write_failed(request: &MonitoringRequest, e: StoreError) -> Vec<Reply> {
    tracing::error!(
        user_id = %request.user_id,
        status = %request.status,
        error = %e,
        "Failed to write request state"
    );
    vec![Reply::text(prompts::GENERIC_FAILURE)]
}

fn raw_input_mut(request: &mut MonitoringRequest, leg: Leg) -> &mut Option<String> {
    match leg {
        Leg::Departure => &mut request.departure_input,
        Leg::Arrival => &mut request.arrival_input,
    }
}

/// Time buttons three to a row, selected ones ticked, then a Done row.
fn time_picker(request: &MonitoringRequest) -> Reply {
    let buttons: Vec<ChoiceButton> = request
        .last_check_results
        .iter()
        .flatten()
        .map(|slot| {
            let label = if request.selected_times.contains(&slot.time) {
                format!("✅ {}", slot.time)
            } else {
                slot.time.clone()
            };
            ChoiceButton::new(label, &Choice::ToggleTime(slot.time.clone()))
        })
        .collect();

    let mut rows: Vec<Vec<ChoiceButton>> = buttons
        .chunks(TIMES_PER_ROW)
        .map(|chunk| chunk.to_vec())
        .collect();
    rows.push(vec![ChoiceButton::new(prompts::DONE_LABEL, &Choice::TimesDone)]);

    Reply::with_choices(
        prompts::pick_times(
            request.selected_date.unwrap_or_default(),
            request.mapped_departure.as_deref().unwrap_or_default(),
            request.mapped_arrival.as_deref().unwrap_or_default(),
        ),
        rows,
    )
}
