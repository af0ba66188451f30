//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, Offset, Utc};

use seatwatch_core::notify::{Notifier, NotifyError};
use seatwatch_core::oracle::{AvailabilityOracle, OracleError};
use seatwatch_core::store::{RequestStore, StoreError};
use seatwatch_core::{
    MemoryRequestStore, MonitoringRequest, RequestStatus, StaticAllowList, StationCatalog, TimeSlot,
};
use seatwatch_server::conversation::ConversationService;
use seatwatch_server::events::{Event, Reply};

pub const USER: &str = "4242";

pub const CATALOG: &str = r#"{
    "Ankara": "Ankara",
    "Eskişehir": "Eskişehir",
    "Eskipazar": "Eskipazar",
    "İstanbul(Pendik)": "Pendik",
    "İstanbul(Söğütlüçeşme)": "Söğütlüçeşme",
    "Konya": "Konya"
}"#;

/// Oracle answering with whatever slots are currently set; `None` fails the call.
pub struct FakeOracle {
    slots: Mutex<Option<Vec<TimeSlot>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeOracle {
    pub fn returning(slots: Vec<TimeSlot>) -> Self {
        Self {
            slots: Mutex::new(Some(slots)),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            slots: Mutex::new(None),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_slots(&self, slots: Option<Vec<TimeSlot>>) {
        *self.slots.lock().unwrap() = slots;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvailabilityOracle for FakeOracle {
    async fn check(
        &self,
        _origin: &str,
        _destination: &str,
        _date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let slots = self.slots.lock().unwrap().clone();
        slots.ok_or_else(|| OracleError::MalformedPayload("scripted failure".to_string()))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Notifier that records every message and can be switched to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: &str, text: &str) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::RetryExhausted { attempts: 1 });
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Memory store whose reads and writes can be made to fail independently.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryRequestStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RequestStore for FlakyStore {
    async fn get(&self, user_id: &str) -> Result<Option<MonitoringRequest>, StoreError> {
        self.check_reads()?;
        self.inner.get(user_id).await
    }

    async fn upsert(&self, request: &MonitoringRequest) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write refused".to_string()));
        }
        self.inner.upsert(request).await
    }

    async fn list_by_status(
        &self,
        status: &RequestStatus,
    ) -> Result<Vec<MonitoringRequest>, StoreError> {
        self.check_reads()?;
        self.inner.list_by_status(status).await
    }

    async fn health(&self) -> Result<String, StoreError> {
        self.inner.health().await
    }
}

/// A conversation over a flaky memory store with [`USER`] allowed.
pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub oracle: Arc<FakeOracle>,
    pub service: ConversationService,
}

impl Harness {
    pub fn new(oracle: FakeOracle) -> Self {
        Self::configured(oracle, Duration::from_secs(5), Utc.fix())
    }

    pub fn configured(oracle: FakeOracle, oracle_timeout: Duration, local_offset: FixedOffset) -> Self {
        let store = Arc::new(FlakyStore::default());
        let oracle = Arc::new(oracle);
        let stations = StationCatalog::from_json(CATALOG).expect("catalog");
        let service = ConversationService::new(
            store.clone(),
            Arc::new(StaticAllowList::new([USER])),
            Arc::new(stations),
            oracle.clone(),
            oracle_timeout,
        )
        .with_local_offset(local_offset);
        Self {
            store,
            oracle,
            service,
        }
    }

    pub async fn text(&self, text: &str) -> Vec<Reply> {
        let event = Event::from_text(text).expect("recognised text");
        self.service.handle(USER, event).await.replies().to_vec()
    }

    pub async fn choose(&self, id: &str) -> Vec<Reply> {
        let event = Event::from_choice(id).expect("valid choice id");
        self.service.handle(USER, event).await.replies().to_vec()
    }

    pub async fn request(&self) -> MonitoringRequest {
        self.store
            .get(USER)
            .await
            .expect("store read")
            .expect("request exists")
    }

    pub async fn status(&self) -> RequestStatus {
        self.request().await.status
    }

    /// Drive the conversation to `awaiting_day` on Ankara → Eskişehir.
    pub async fn reach_day_selection(&self) {
        self.text("/start").await;
        self.text("Ankara").await;
        self.text("Es").await;
        self.choose("station_select_arr:Eskişehir").await;
        assert_eq!(self.status().await, RequestStatus::AwaitingDay);
    }
}

/// Scenario slots: 09:00 sold out, 14:30 with five economy seats.
pub fn scenario_slots() -> Vec<TimeSlot> {
    vec![
        TimeSlot::new("09:00", &[("Ekonomi", 0)]),
        TimeSlot::new("14:30", &[("Ekonomi", 5)]),
    ]
}

pub fn all_text(replies: &[Reply]) -> String {
    replies
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
