use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use super::{RequestStore, StoreError};
use crate::models::{MonitoringRequest, RequestStatus, TimeSlot};

const SELECT_COLUMNS: &str = r#"
    SELECT chat_id, status, departure_input, arrival_input, mapped_departure,
           mapped_arrival, selected_date, last_check_results, selected_times,
           seat_type, created_at
    FROM user_requests
"#;

#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    chat_id: String,
    status: String,
    departure_input: Option<String>,
    arrival_input: Option<String>,
    mapped_departure: Option<String>,
    mapped_arrival: Option<String>,
    selected_date: Option<NaiveDate>,
    last_check_results: Option<Json<Vec<TimeSlot>>>,
    selected_times: Option<Vec<String>>,
    seat_type: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RequestRow> for MonitoringRequest {
    fn from(row: RequestRow) -> Self {
        Self {
            user_id: row.chat_id,
            status: RequestStatus::from(row.status),
            departure_input: row.departure_input,
            arrival_input: row.arrival_input,
            mapped_departure: row.mapped_departure,
            mapped_arrival: row.mapped_arrival,
            selected_date: row.selected_date,
            last_check_results: row.last_check_results.map(|j| j.0),
            selected_times: row.selected_times.unwrap_or_default().into_iter().collect(),
            seat_type: row.seat_type,
            created_at: row.created_at,
        }
    }
}

/// Postgres-backed store over the `user_requests` table.
#[derive(Debug, Clone)]
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn get(&self, user_id: &str) -> Result<Option<MonitoringRequest>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE chat_id = $1 ORDER BY created_at DESC LIMIT 1");
        let row: Option<RequestRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MonitoringRequest::from))
    }

    async fn upsert(&self, request: &MonitoringRequest) -> Result<(), StoreError> {
        let selected_times: Vec<String> = request.selected_times.iter().cloned().collect();

        sqlx::query(
            r#"
            INSERT INTO user_requests (
                chat_id, status, departure_input, arrival_input, mapped_departure,
                mapped_arrival, selected_date, last_check_results, selected_times,
                seat_type, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            ON CONFLICT (chat_id) DO UPDATE SET
                status = EXCLUDED.status,
                departure_input = EXCLUDED.departure_input,
                arrival_input = EXCLUDED.arrival_input,
                mapped_departure = EXCLUDED.mapped_departure,
                mapped_arrival = EXCLUDED.mapped_arrival,
                selected_date = EXCLUDED.selected_date,
                last_check_results = EXCLUDED.last_check_results,
                selected_times = EXCLUDED.selected_times,
                seat_type = EXCLUDED.seat_type,
                created_at = EXCLUDED.created_at,
                updated_at = NOW()
            "#,
        )
        .bind(&request.user_id)
        .bind(request.status.as_str())
        .bind(&request.departure_input)
        .bind(&request.arrival_input)
        .bind(&request.mapped_departure)
        .bind(&request.mapped_arrival)
        .bind(request.selected_date)
        .bind(request.last_check_results.clone().map(Json))
        .bind(selected_times)
        .bind(&request.seat_type)
        .bind(request.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(user_id = %request.user_id, status = %request.status, "Request upserted");
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: &RequestStatus,
    ) -> Result<Vec<MonitoringRequest>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE status = $1 ORDER BY created_at ASC");
        let rows: Vec<RequestRow> = sqlx::query_as(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(MonitoringRequest::from).collect())
    }

    async fn health(&self) -> Result<String, StoreError> {
        Ok(crate::db::health_check(&self.pool).await?)
    }
}
