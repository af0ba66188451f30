//! Seat monitor: periodic re-check of every `monitoring` request.
//!
//! Each tick:
//! 1. Lists requests with status `monitoring` (oldest first)
//! 2. Skips requests missing route, date, seat type or times
//! 3. Asks the oracle for the request's route/date (bounded timeout)
//! 4. Walks the selected times in order; the first slot with a free seat of
//!    the requested type is the match
//! 5. Re-reads the request and, if it is still the same `monitoring` request,
//!    notifies the user. Only after a successful send is it marked `completed`
//!
//! Requests are checked one after another. A failure on one request (oracle,
//! notifier or store) is logged and counted, never fatal to the tick. There is
//! no backoff between ticks: a request that failed is simply tried again on
//! the next one.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use seatwatch_core::notify::Notifier;
use seatwatch_core::oracle::{check_with_timeout, AvailabilityOracle};
use seatwatch_core::store::{RequestStore, StoreError};
use seatwatch_core::{MonitoringRequest, RequestStatus, TimeSlot};

use crate::prompts;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Counters from one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub scanned: usize,
    pub skipped_incomplete: usize,
    pub oracle_failures: usize,
    pub matched: usize,
    pub notified: usize,
    pub notify_failures: usize,
    pub store_failures: usize,
    /// Another tick was still running, nothing was done.
    pub skipped_busy: bool,
}

/// First selected time with a free seat of the requested type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatMatch {
    pub time: String,
    pub seat_type: String,
    pub count: u32,
}

/// Everything a tick needs. Shared by the background loop and the manual trigger.
pub struct MonitorContext {
    store: Arc<dyn RequestStore>,
    oracle: Arc<dyn AvailabilityOracle>,
    notifier: Arc<dyn Notifier>,
    oracle_timeout: Duration,
    booking_url: Option<String>,
    tick_guard: Mutex<()>,
}

impl MonitorContext {
    pub fn new(
        store: Arc<dyn RequestStore>,
        oracle: Arc<dyn AvailabilityOracle>,
        notifier: Arc<dyn Notifier>,
        oracle_timeout: Duration,
        booking_url: Option<String>,
    ) -> Self {
        Self {
            store,
            oracle,
            notifier,
            oracle_timeout,
            booking_url,
            tick_guard: Mutex::new(()),
        }
    }
}

/// Match rule: selected times in order, first slot whose `seat_type` count is positive.
pub fn find_match(request: &MonitoringRequest, slots: &[TimeSlot]) -> Option<SeatMatch> {
    let seat_type = request.seat_type.as_deref()?;

    request.selected_times.iter().find_map(|time| {
        let slot = slots.iter().find(|s| &s.time == time)?;
        let count = slot.seat_counts.get(seat_type).copied().unwrap_or(0);
        (count > 0).then(|| SeatMatch {
            time: time.clone(),
            seat_type: seat_type.to_string(),
            count,
        })
    })
}

/// Run one pass over all `monitoring` requests.
///
/// Returns immediately with `skipped_busy` set when a tick is already in
/// progress, so manual triggers never overlap the background loop.
pub async fn run_monitor_tick(ctx: &MonitorContext) -> Result<TickReport> {
    let Ok(_guard) = ctx.tick_guard.try_lock() else {
        tracing::info!("Monitor tick skipped: previous tick still running");
        return Ok(TickReport {
            skipped_busy: true,
            ..TickReport::default()
        });
    };

    let requests = ctx.store.list_by_status(&RequestStatus::Monitoring).await?;
    let mut report = TickReport {
        scanned: requests.len(),
        ..TickReport::default()
    };
    tracing::debug!("Monitor tick: {} active requests", requests.len());

    for request in requests {
        check_request(ctx, request, &mut report).await;
    }

    Ok(report)
}

/// Called from main.rs to start the background monitor loop
pub async fn run_monitor_loop(
    ctx: Arc<MonitorContext>,
    interval_minutes: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    let interval = tokio::time::Duration::from_secs(interval_minutes.max(1) * 60);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!("Monitor loop started (interval: {}min)", interval_minutes);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_monitor_tick(&ctx).await {
                    Ok(report) => tracing::info!(
                        "Monitor tick complete: {} scanned, {} matched, {} notified, {} oracle failures",
                        report.scanned,
                        report.matched,
                        report.notified,
                        report.oracle_failures
                    ),
                    Err(e) => tracing::error!("Monitor tick error: {}", e),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Monitor loop shutting down");
                break;
            }
        }
    }
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

async fn check_request(ctx: &MonitorContext, request: MonitoringRequest, report: &mut TickReport) {
    let user_id = request.user_id.clone();

    let missing = request.missing_monitor_fields();
    let (Some(departure), Some(arrival), Some(date), true) = (
        request.mapped_departure.as_deref(),
        request.mapped_arrival.as_deref(),
        request.selected_date,
        missing.is_empty(),
    ) else {
        tracing::warn!(user_id = %user_id, ?missing, "Skipping incomplete monitoring request");
        report.skipped_incomplete += 1;
        return;
    };

    let slots = match check_with_timeout(
        ctx.oracle.as_ref(),
        departure,
        arrival,
        date,
        ctx.oracle_timeout,
    )
    .await
    {
        Ok(slots) => slots,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                oracle = ctx.oracle.name(),
                error = %e,
                "Availability check failed, retrying next tick"
            );
            report.oracle_failures += 1;
            return;
        }
    };

    let Some(found) = find_match(&request, &slots) else {
        tracing::debug!(user_id = %user_id, slots = slots.len(), "No free seats yet");
        return;
    };
    report.matched += 1;
    tracing::info!(
        user_id = %user_id,
        time = %found.time,
        seat_type = %found.seat_type,
        count = found.count,
        "Seats available"
    );

    match is_still_monitored(ctx, &request).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(user_id = %user_id, "Request changed during check, not notifying");
            return;
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Failed to re-read request before notifying");
            report.store_failures += 1;
            return;
        }
    }

    let text = prompts::seats_found(
        date,
        &found.time,
        &found.seat_type,
        found.count,
        ctx.booking_url.as_deref(),
    );
    if let Err(e) = ctx.notifier.notify(&user_id, &text).await {
        tracing::error!(user_id = %user_id, error = %e, "Notification failed, request stays monitoring");
        report.notify_failures += 1;
        return;
    }
    report.notified += 1;

    mark_completed(ctx, &request, report).await;
}

/// Same request as the one listed at the start of the tick, and still `monitoring`.
fn is_same_monitoring(current: &MonitoringRequest, listed: &MonitoringRequest) -> bool {
    current.status == RequestStatus::Monitoring && current.created_at == listed.created_at
}

async fn is_still_monitored(
    ctx: &MonitorContext,
    request: &MonitoringRequest,
) -> Result<bool, StoreError> {
    let current = ctx.store.get(&request.user_id).await?;
    Ok(current.is_some_and(|current| is_same_monitoring(&current, request)))
}

/// Re-read before writing so a stop or restart that landed during the send wins.
async fn mark_completed(ctx: &MonitorContext, request: &MonitoringRequest, report: &mut TickReport) {
    let current = match ctx.store.get(&request.user_id).await {
        Ok(current) => current,
        Err(e) => {
            tracing::error!(user_id = %request.user_id, error = %e, "Failed to re-read request");
            report.store_failures += 1;
            return;
        }
    };

    match current {
        Some(mut current) if is_same_monitoring(&current, request) => {
            current.status = RequestStatus::Completed;
            match ctx.store.upsert(&current).await {
                Ok(()) => tracing::info!(user_id = %request.user_id, "Request completed"),
                Err(e) => {
                    tracing::error!(user_id = %request.user_id, error = %e, "Failed to mark request completed");
                    report.store_failures += 1;
                }
            }
        }
        _ => tracing::info!(
            user_id = %request.user_id,
            "Request changed during check, leaving it as is"
        ),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
