// Archivo: event_persistence.rs
// Propósito: bitácora de eventos sobre Diesel. El locking optimista se
// resuelve dentro de una transacción y la restricción UNIQUE(stream, cursor)
// cubre a dos escritores que lean la misma versión.
use crate::connection::{build_pool, database_url_from_env, DbConn, DbPool, PooledConn};
use crate::domain_persistence::redact;
use crate::schema;
use crate::schema::events::dsl as ev_dsl;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use events::{EventError, EventRecord, EventRepository, PersistResult};
use log::info;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct DieselEventRepository {
    pool: Arc<DbPool>,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::events)]
struct EventRow {
    pub id: String,
    pub stream: String,
    pub cursor: i64,
    pub key: String,
    pub payload: String,
    pub metadata: String,
    pub command_id: Option<String>,
    pub created_at_ts: i64,
}

impl EventRow {
    fn from_record(r: &EventRecord) -> Self {
        Self { id: r.id.to_string(),
               stream: r.stream.clone(),
               cursor: r.cursor,
               key: r.key.clone(),
               payload: r.payload.to_string(),
               metadata: r.metadata.to_string(),
               command_id: r.command_id.map(|c| c.to_string()),
               created_at_ts: r.created_at.timestamp_micros() }
    }

    fn into_record(self) -> Result<EventRecord, EventError> {
        let parse_uuid = |s: &str| Uuid::parse_str(s).map_err(|e| EventError::Storage(format!("invalid uuid: {}", e)));
        let id = parse_uuid(&self.id)?;
        let command_id = self.command_id.as_deref().map(parse_uuid).transpose()?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(self.created_at_ts)
            .ok_or_else(|| EventError::Storage(format!("timestamp inválido: {}", self.created_at_ts)))?;
        Ok(EventRecord { id,
                         stream: self.stream,
                         cursor: self.cursor,
                         key: self.key,
                         payload: serde_json::from_str(&self.payload).unwrap_or(serde_json::json!({})),
                         metadata: serde_json::from_str(&self.metadata).unwrap_or(serde_json::json!({})),
                         command_id,
                         created_at })
    }
}

fn storage(e: DieselError) -> EventError {
    EventError::Storage(format!("db: {}", e))
}

impl DieselEventRepository {
    pub fn new(database_url: &str) -> Result<Self, EventError> {
        let pool = build_pool(database_url).map_err(EventError::Storage)?;
        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn from_pool(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConn, EventError> {
        self.pool.get().map_err(|e| EventError::Storage(format!("pool: {}", e)))
    }
}

fn current_version(conn: &mut DbConn, stream: &str) -> Result<i64, DieselError> {
    ev_dsl::events.filter(ev_dsl::stream.eq(stream)).count().get_result::<i64>(conn)
}

impl EventRepository for DieselEventRepository {
    fn stream_version(&self, stream: &str) -> Result<i64, EventError> {
        let mut pooled = self.conn()?;
        let conn: &mut DbConn = &mut pooled;
        current_version(conn, stream).map_err(storage)
    }

    fn append(&self, record: &EventRecord, expected_version: i64) -> Result<PersistResult, EventError> {
        let mut pooled = self.conn()?;
        let conn: &mut DbConn = &mut pooled;
        let row = EventRow::from_record(record);
        let res = conn.transaction::<PersistResult, DieselError, _>(|conn| {
                          let current = current_version(conn, &row.stream)?;
                          if let Some(cmd) = &row.command_id {
                              let seen = ev_dsl::events.filter(ev_dsl::stream.eq(&row.stream))
                                                       .filter(ev_dsl::command_id.eq(cmd))
                                                       .count()
                                                       .get_result::<i64>(conn)?;
                              if seen > 0 {
                                  return Ok(PersistResult::Ok { new_version: current });
                              }
                          }
                          if current != expected_version || row.cursor != current + 1 {
                              return Ok(PersistResult::Conflict);
                          }
                          diesel::insert_into(ev_dsl::events).values(&row).execute(conn)?;
                          Ok(PersistResult::Ok { new_version: current + 1 })
                      });
        match res {
            Ok(r) => Ok(r),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(PersistResult::Conflict),
            Err(e) => Err(storage(e)),
        }
    }

    fn read_stream(&self, stream: &str, from_cursor: i64) -> Result<Vec<EventRecord>, EventError> {
        let mut pooled = self.conn()?;
        let conn: &mut DbConn = &mut pooled;
        let rows = ev_dsl::events.filter(ev_dsl::stream.eq(stream))
                                 .filter(ev_dsl::cursor.gt(from_cursor))
                                 .order(ev_dsl::cursor.asc())
                                 .load::<EventRow>(conn)
                                 .map_err(storage)?;
        rows.into_iter().map(EventRow::into_record).collect()
    }

    fn read_all(&self) -> Result<Vec<EventRecord>, EventError> {
        let mut pooled = self.conn()?;
        let conn: &mut DbConn = &mut pooled;
        let rows = ev_dsl::events.order((ev_dsl::created_at_ts.asc(), ev_dsl::stream.asc(), ev_dsl::cursor.asc()))
                                 .load::<EventRow>(conn)
                                 .map_err(storage)?;
        rows.into_iter().map(EventRow::into_record).collect()
    }
}

/// Crea la bitácora desde `AQUA_DB_URL` / `DATABASE_URL`.
pub fn new_events_from_env() -> Result<DieselEventRepository, EventError> {
    let url = database_url_from_env().map_err(EventError::Storage)?;
    info!("bitácora de eventos sobre {}", redact(&url));
    DieselEventRepository::new(&url)
}
