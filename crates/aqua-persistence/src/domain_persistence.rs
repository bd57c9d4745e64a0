use crate::connection::{build_pool, database_url_from_env, DbConn, DbPool, PooledConn};
use crate::schema;
use crate::schema::assignments::dsl as asg_dsl;
use crate::schema::failure_reports::dsl as fr_dsl;
use crate::schema::flow_requests::dsl as req_dsl;
use crate::schema::maintenance_reports::dsl as mr_dsl;
use aqua_domain::{current_assignment, Assignment, AssignmentTarget, Change, ChangeSet, CommitHook, DomainError,
                  DomainRepository, FailureReport, FlowRequest, Guard, MaintenanceReport, RecordId, RecordStatus};
use aqua_providers::{LotId, UserId};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;

/// Repo Diesel que implementa `DomainRepository`.
#[derive(Clone)]
pub struct DieselDomainRepository {
  pool: Arc<DbPool>,
}

impl DieselDomainRepository {
  pub fn new(database_url: &str) -> Result<Self, DomainError> {
    let pool = build_pool(database_url).map_err(DomainError::ExternalError)?;
    Ok(Self { pool: Arc::new(pool) })
  }

  /// Comparte un pool ya construido (por ejemplo con la bitácora).
  pub fn from_pool(pool: Arc<DbPool>) -> Self {
    Self { pool }
  }

  fn conn(&self) -> Result<PooledConn, DomainError> {
    self.pool.get().map_err(|e| DomainError::ExternalError(format!("pool: {}", e)))
  }
}

// Diesel row structs
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::flow_requests)]
struct FlowRequestRow {
  pub id: String,
  pub lot_id: String,
  pub kind: String,
  pub status: String,
  pub created_by: String,
  pub created_at_ts: i64,
  pub payload: String,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::failure_reports)]
struct FailureReportRow {
  pub id: String,
  pub kind: String,
  pub lot_id: Option<String>,
  pub status: String,
  pub created_by: String,
  pub created_at_ts: i64,
  pub payload: String,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::assignments)]
struct AssignmentRow {
  pub id: String,
  pub target_type: String,
  pub target_id: String,
  pub assigned_by: String,
  pub assigned_to: String,
  pub reassigned: bool,
  pub assigned_at_ts: i64,
  pub payload: String,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::maintenance_reports)]
struct MaintenanceReportRow {
  pub id: String,
  pub assignment_id: String,
  pub approved: bool,
  pub created_at_ts: i64,
  pub payload: String,
}

impl FlowRequestRow {
  fn from_entity(r: &FlowRequest) -> Result<Self, DomainError> {
    Ok(Self { id: r.id().to_string(),
              lot_id: r.lot().to_string(),
              kind: r.kind().code().to_string(),
              status: r.status().label().to_string(),
              created_by: r.created_by().to_string(),
              created_at_ts: r.created_at().timestamp_micros(),
              payload: serde_json::to_string(r)? })
  }

  fn into_entity(self) -> Result<FlowRequest, DomainError> {
    Ok(serde_json::from_str(&self.payload)?)
  }
}

impl FailureReportRow {
  fn from_entity(r: &FailureReport) -> Result<Self, DomainError> {
    Ok(Self { id: r.id().to_string(),
              kind: r.kind().code().to_string(),
              lot_id: r.lot().map(|l| l.to_string()),
              status: r.status().label().to_string(),
              created_by: r.created_by().to_string(),
              created_at_ts: r.created_at().timestamp_micros(),
              payload: serde_json::to_string(r)? })
  }

  fn into_entity(self) -> Result<FailureReport, DomainError> {
    Ok(serde_json::from_str(&self.payload)?)
  }
}

impl AssignmentRow {
  fn from_entity(a: &Assignment) -> Result<Self, DomainError> {
    Ok(Self { id: a.id().to_string(),
              target_type: a.target().code().to_string(),
              target_id: a.target().id().to_string(),
              assigned_by: a.assigned_by().to_string(),
              assigned_to: a.assigned_to().to_string(),
              reassigned: a.reassigned(),
              assigned_at_ts: a.assignment_date().timestamp_micros(),
              payload: serde_json::to_string(a)? })
  }

  fn into_entity(self) -> Result<Assignment, DomainError> {
    Ok(serde_json::from_str(&self.payload)?)
  }
}

impl MaintenanceReportRow {
  fn from_entity(m: &MaintenanceReport) -> Result<Self, DomainError> {
    Ok(Self { id: m.id().to_string(),
              assignment_id: m.assignment_id().to_string(),
              approved: m.is_approved(),
              created_at_ts: m.created_at().timestamp_micros(),
              payload: serde_json::to_string(m)? })
  }

  fn into_entity(self) -> Result<MaintenanceReport, DomainError> {
    Ok(serde_json::from_str(&self.payload)?)
  }
}

/// Error interno de transacción: Diesel o dominio.
#[derive(Debug, Error)]
enum TxError {
  #[error(transparent)]
  Db(#[from] DieselError),
  #[error(transparent)]
  Domain(#[from] DomainError),
}

impl From<TxError> for DomainError {
  fn from(e: TxError) -> Self {
    match e {
      TxError::Db(db) => map_db_error(db),
      TxError::Domain(d) => d,
    }
  }
}

/// Las violaciones de unicidad son conflictos de negocio, el resto son
/// fallos del almacenamiento.
fn map_db_error(e: DieselError) -> DomainError {
  match e {
    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
      DomainError::Conflict(format!("restricción de unicidad: {}", info.message()))
    }
    other => DomainError::ExternalError(format!("db: {}", other)),
  }
}

fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T, DomainError> {
  res.map_err(map_db_error)
}

fn put_change(conn: &mut DbConn, change: &Change) -> Result<(), TxError> {
  match change {
    Change::PutFlowRequest(r) => {
      let row = FlowRequestRow::from_entity(r)?;
      diesel::delete(req_dsl::flow_requests.filter(req_dsl::id.eq(&row.id))).execute(conn)?;
      diesel::insert_into(req_dsl::flow_requests).values(&row).execute(conn)?;
    }
    Change::PutFailureReport(r) => {
      let row = FailureReportRow::from_entity(r)?;
      diesel::delete(fr_dsl::failure_reports.filter(fr_dsl::id.eq(&row.id))).execute(conn)?;
      diesel::insert_into(fr_dsl::failure_reports).values(&row).execute(conn)?;
    }
    Change::PutAssignment(a) => {
      let row = AssignmentRow::from_entity(a)?;
      diesel::delete(asg_dsl::assignments.filter(asg_dsl::id.eq(&row.id))).execute(conn)?;
      diesel::insert_into(asg_dsl::assignments).values(&row).execute(conn)?;
    }
    Change::PutMaintenanceReport(m) => {
      let row = MaintenanceReportRow::from_entity(m)?;
      diesel::delete(mr_dsl::maintenance_reports.filter(mr_dsl::id.eq(&row.id))).execute(conn)?;
      diesel::insert_into(mr_dsl::maintenance_reports).values(&row).execute(conn)?;
    }
  }
  Ok(())
}

impl DomainRepository for DieselDomainRepository {
  fn get_flow_request(&self, id: &RecordId) -> Result<Option<FlowRequest>, DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let row = map_db_err(req_dsl::flow_requests.filter(req_dsl::id.eq(id.as_str()))
                                               .first::<FlowRequestRow>(conn)
                                               .optional())?;
    row.map(FlowRequestRow::into_entity).transpose()
  }

  fn get_failure_report(&self, id: &RecordId) -> Result<Option<FailureReport>, DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let row = map_db_err(fr_dsl::failure_reports.filter(fr_dsl::id.eq(id.as_str()))
                                                .first::<FailureReportRow>(conn)
                                                .optional())?;
    row.map(FailureReportRow::into_entity).transpose()
  }

  fn get_assignment(&self, id: &RecordId) -> Result<Option<Assignment>, DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let row = map_db_err(asg_dsl::assignments.filter(asg_dsl::id.eq(id.as_str()))
                                             .first::<AssignmentRow>(conn)
                                             .optional())?;
    row.map(AssignmentRow::into_entity).transpose()
  }

  fn get_maintenance_report(&self, id: &RecordId) -> Result<Option<MaintenanceReport>, DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let row = map_db_err(mr_dsl::maintenance_reports.filter(mr_dsl::id.eq(id.as_str()))
                                                    .first::<MaintenanceReportRow>(conn)
                                                    .optional())?;
    row.map(MaintenanceReportRow::into_entity).transpose()
  }

  fn list_flow_requests(&self) -> Result<Vec<FlowRequest>, DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let rows = map_db_err(req_dsl::flow_requests.order((req_dsl::created_at_ts.asc(), req_dsl::id.asc()))
                                                .load::<FlowRequestRow>(conn))?;
    rows.into_iter().map(FlowRequestRow::into_entity).collect()
  }

  fn list_open_requests_for_lot(&self, lot: &LotId) -> Result<Vec<FlowRequest>, DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let rows = map_db_err(req_dsl::flow_requests.filter(req_dsl::lot_id.eq(lot.as_str()))
                                                .filter(req_dsl::status.ne(RecordStatus::Finalized.label()))
                                                .order((req_dsl::created_at_ts.asc(), req_dsl::id.asc()))
                                                .load::<FlowRequestRow>(conn))?;
    rows.into_iter().map(FlowRequestRow::into_entity).collect()
  }

  fn list_failure_reports(&self) -> Result<Vec<FailureReport>, DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let rows = map_db_err(fr_dsl::failure_reports.order((fr_dsl::created_at_ts.asc(), fr_dsl::id.asc()))
                                                 .load::<FailureReportRow>(conn))?;
    rows.into_iter().map(FailureReportRow::into_entity).collect()
  }

  fn list_assignments_for_target(&self, target: &AssignmentTarget) -> Result<Vec<Assignment>, DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let rows = map_db_err(asg_dsl::assignments.filter(asg_dsl::target_type.eq(target.code()))
                                              .filter(asg_dsl::target_id.eq(target.id().as_str()))
                                              .order((asg_dsl::assigned_at_ts.asc(), asg_dsl::id.asc()))
                                              .load::<AssignmentRow>(conn))?;
    rows.into_iter().map(AssignmentRow::into_entity).collect()
  }

  fn list_assignments_for_user(&self, user: &UserId) -> Result<Vec<Assignment>, DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let rows = map_db_err(asg_dsl::assignments.filter(asg_dsl::assigned_to.eq(user.as_str()))
                                              .order((asg_dsl::assigned_at_ts.asc(), asg_dsl::id.asc()))
                                              .load::<AssignmentRow>(conn))?;
    rows.into_iter().map(AssignmentRow::into_entity).collect()
  }

  fn find_report_for_assignment(&self, assignment_id: &RecordId) -> Result<Option<MaintenanceReport>, DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let row = map_db_err(mr_dsl::maintenance_reports.filter(mr_dsl::assignment_id.eq(assignment_id.as_str()))
                                                    .first::<MaintenanceReportRow>(conn)
                                                    .optional())?;
    row.map(MaintenanceReportRow::into_entity).transpose()
  }

  fn id_exists(&self, id: &RecordId) -> Result<bool, DomainError> {
    use diesel::dsl::exists;
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let key = id.as_str();
    let found =
      map_db_err(diesel::select(exists(req_dsl::flow_requests.filter(req_dsl::id.eq(key)))).get_result::<bool>(conn))?
      || map_db_err(diesel::select(exists(fr_dsl::failure_reports.filter(fr_dsl::id.eq(key)))).get_result::<bool>(conn))?
      || map_db_err(diesel::select(exists(asg_dsl::assignments.filter(asg_dsl::id.eq(key)))).get_result::<bool>(conn))?
      || map_db_err(diesel::select(exists(mr_dsl::maintenance_reports.filter(mr_dsl::id.eq(key))))
                      .get_result::<bool>(conn))?;
    Ok(found)
  }

  fn commit(&self, changes: ChangeSet, hook: CommitHook<'_>) -> Result<(), DomainError> {
    let mut pooled = self.conn()?;
    let conn: &mut DbConn = &mut pooled;
    let writes = changes.changes().len();
    run_transaction(conn, &changes, hook)?;
    debug!("unidad de trabajo confirmada ({} escrituras)", writes);
    Ok(())
  }
}

/// En Postgres, bajo READ COMMITTED, dos transacciones podrían evaluar la
/// misma guarda a la vez; un bloqueo consultivo por clave las serializa.
/// Las claves llegan ordenadas para no provocar interbloqueos.
#[cfg(feature = "pg")]
fn run_transaction(conn: &mut DbConn, changes: &ChangeSet, hook: CommitHook<'_>) -> Result<(), TxError> {
  conn.transaction::<(), TxError, _>(|conn| {
        for key in changes.lock_keys() {
          diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))").bind::<diesel::sql_types::Text, _>(key)
                                                                         .execute(conn)?;
        }
        write_changes(conn, changes, hook)
      })
}

/// SQLite admite un solo escritor: `BEGIN IMMEDIATE` toma el bloqueo de
/// escritura antes de leer las guardas.
#[cfg(not(feature = "pg"))]
fn run_transaction(conn: &mut DbConn, changes: &ChangeSet, hook: CommitHook<'_>) -> Result<(), TxError> {
  conn.immediate_transaction::<(), TxError, _>(|conn| write_changes(conn, changes, hook))
}

fn write_changes(conn: &mut DbConn, changes: &ChangeSet, hook: CommitHook<'_>) -> Result<(), TxError> {
  for guard in changes.guards() {
    check_guard(conn, guard)?;
  }
  for change in changes.changes() {
    put_change(conn, change)?;
  }
  hook()?;
  Ok(())
}

fn check_guard(conn: &mut DbConn, guard: &Guard) -> Result<(), TxError> {
  match guard {
    Guard::NoOpenRequests { lot, kinds } => {
      let codes: Vec<&str> = kinds.iter().map(|k| k.code()).collect();
      let open = req_dsl::flow_requests.filter(req_dsl::lot_id.eq(lot.as_str()))
                                       .filter(req_dsl::kind.eq_any(codes))
                                       .filter(req_dsl::status.ne(RecordStatus::Finalized.label()))
                                       .count()
                                       .get_result::<i64>(conn)?;
      if open > 0 {
        let msg = format!("Ya existe una solicitud abierta que bloquea el lote {}", lot);
        return Err(DomainError::Conflict(msg).into());
      }
    }
    Guard::Status { record, status } => {
      let found = match record {
        AssignmentTarget::FlowRequest(id) => req_dsl::flow_requests.filter(req_dsl::id.eq(id.as_str()))
                                                                   .select(req_dsl::status)
                                                                   .first::<String>(conn)
                                                                   .optional()?,
        AssignmentTarget::FailureReport(id) => fr_dsl::failure_reports.filter(fr_dsl::id.eq(id.as_str()))
                                                                      .select(fr_dsl::status)
                                                                      .first::<String>(conn)
                                                                      .optional()?,
      };
      if found.as_deref() != Some(status.label()) {
        return Err(DomainError::Conflict(format!("{} cambió de estado ({}) antes de confirmar",
                                                 record,
                                                 found.as_deref().unwrap_or("inexistente"))).into());
      }
    }
    Guard::CurrentAssignment { target, expected } => {
      let rows = asg_dsl::assignments.filter(asg_dsl::target_type.eq(target.code()))
                                     .filter(asg_dsl::target_id.eq(target.id().as_str()))
                                     .load::<AssignmentRow>(conn)?;
      let siblings = rows.into_iter().map(AssignmentRow::into_entity).collect::<Result<Vec<_>, _>>()?;
      if current_assignment(&siblings).map(|a| a.id()) != expected.as_ref() {
        let msg = format!("La asignación vigente de {} cambió antes de confirmar", target);
        return Err(DomainError::Conflict(msg).into());
      }
    }
  }
  Ok(())
}

/// Crear repo desde las variables de entorno (`AQUA_DB_URL`, luego
/// `DATABASE_URL`; sin ellas, SQLite en memoria compartida).
pub fn new_domain_from_env() -> Result<DieselDomainRepository, DomainError> {
  let url = database_url_from_env().map_err(DomainError::ExternalError)?;
  info!("repositorio de dominio sobre {}", redact(&url));
  DieselDomainRepository::new(&url)
}

/// Oculta credenciales de una URL de conexión antes de registrarla.
pub(crate) fn redact(url: &str) -> String {
  match url.split_once('@') {
    Some((_, host)) => format!("***@{}", host),
    None => url.to_string(),
  }
}
