use crate::{current_assignment, Assignment, AssignmentTarget, DomainError, FailureReport, FlowRequest,
            MaintenanceReport, RecordId, RecordStatus, RequestKind};
use aqua_providers::{LotId, UserId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Escritura pendiente dentro de una unidad de trabajo. Cada variante
/// inserta o reemplaza la entidad por su id.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
  PutFlowRequest(FlowRequest),
  PutFailureReport(FailureReport),
  PutAssignment(Assignment),
  PutMaintenanceReport(MaintenanceReport),
}

/// Condición que se vuelve a comprobar dentro de la transacción, antes de
/// cualquier escritura. Si no se cumple, el commit devuelve `Conflict`.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
  /// No debe existir ninguna solicitud abierta de `kinds` sobre `lot`.
  NoOpenRequests { lot: LotId, kinds: Vec<RequestKind> },
  /// La solicitud o el reporte conserva el estado con el que se leyó.
  Status { record: AssignmentTarget, status: RecordStatus },
  /// La asignación vigente de `target` sigue siendo `expected`; `None`
  /// exige que aún no tenga ninguna.
  CurrentAssignment { target: AssignmentTarget, expected: Option<RecordId> },
}

impl Guard {
  /// Clave de serialización: dos guardas con la misma clave no pueden
  /// evaluarse a la vez en backends que admiten bloqueos explícitos.
  pub fn lock_key(&self) -> String {
    match self {
      Guard::NoOpenRequests { lot, .. } => format!("lot:{}", lot),
      Guard::Status { record, .. } | Guard::CurrentAssignment { target: record, .. } => {
        format!("{}:{}", record.code(), record.id())
      }
    }
  }
}

/// Unidad de trabajo: guardas más escrituras, confirmadas todas o ninguna.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
  guards: Vec<Guard>,
  changes: Vec<Change>,
}

impl ChangeSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn guard_open_requests(mut self, lot: &LotId, kinds: &[RequestKind]) -> Self {
    self.guards.push(Guard::NoOpenRequests { lot: lot.clone(), kinds: kinds.to_vec() });
    self
  }

  pub fn guard_status(mut self, record: &AssignmentTarget, status: RecordStatus) -> Self {
    self.guards.push(Guard::Status { record: record.clone(), status });
    self
  }

  pub fn guard_current_assignment(mut self, target: &AssignmentTarget, expected: Option<&RecordId>) -> Self {
    self.guards.push(Guard::CurrentAssignment { target: target.clone(), expected: expected.cloned() });
    self
  }

  pub fn put_flow_request(mut self, request: FlowRequest) -> Self {
    self.changes.push(Change::PutFlowRequest(request));
    self
  }

  pub fn put_failure_report(mut self, report: FailureReport) -> Self {
    self.changes.push(Change::PutFailureReport(report));
    self
  }

  pub fn put_assignment(mut self, assignment: Assignment) -> Self {
    self.changes.push(Change::PutAssignment(assignment));
    self
  }

  pub fn put_maintenance_report(mut self, report: MaintenanceReport) -> Self {
    self.changes.push(Change::PutMaintenanceReport(report));
    self
  }

  pub fn guards(&self) -> &[Guard] {
    &self.guards
  }

  /// Claves de bloqueo de las guardas, ordenadas y sin repetir.
  pub fn lock_keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.guards.iter().map(Guard::lock_key).collect();
    keys.sort();
    keys.dedup();
    keys
  }

  pub fn changes(&self) -> &[Change] {
    &self.changes
  }

  pub fn is_empty(&self) -> bool {
    self.changes.is_empty()
  }
}

/// Efecto externo que se ejecuta dentro de la transacción, después de
/// comprobar las guardas. Si falla, nada se confirma.
pub type CommitHook<'a> = &'a mut dyn FnMut() -> Result<(), DomainError>;

/// Trait que define operaciones de persistencia para el flujo de
/// solicitudes, reportes, asignaciones e informes.
pub trait DomainRepository: Send + Sync {
  fn get_flow_request(&self, id: &RecordId) -> Result<Option<FlowRequest>, DomainError>;

  fn get_failure_report(&self, id: &RecordId) -> Result<Option<FailureReport>, DomainError>;

  fn get_assignment(&self, id: &RecordId) -> Result<Option<Assignment>, DomainError>;

  fn get_maintenance_report(&self, id: &RecordId) -> Result<Option<MaintenanceReport>, DomainError>;

  /// Todas las solicitudes, ordenadas por fecha de creación.
  fn list_flow_requests(&self) -> Result<Vec<FlowRequest>, DomainError>;

  /// Solicitudes no finalizadas de un lote.
  fn list_open_requests_for_lot(&self, lot: &LotId) -> Result<Vec<FlowRequest>, DomainError>;

  fn list_failure_reports(&self) -> Result<Vec<FailureReport>, DomainError>;

  /// Asignaciones de una solicitud/reporte, en orden de asignación.
  fn list_assignments_for_target(&self, target: &AssignmentTarget) -> Result<Vec<Assignment>, DomainError>;

  /// Asignaciones recibidas por un usuario, en orden de asignación.
  fn list_assignments_for_user(&self, user: &UserId) -> Result<Vec<Assignment>, DomainError>;

  fn find_report_for_assignment(&self, assignment_id: &RecordId) -> Result<Option<MaintenanceReport>, DomainError>;

  /// Indica si el id ya está ocupado por cualquier entidad.
  fn id_exists(&self, id: &RecordId) -> Result<bool, DomainError>;

  /// Confirma la unidad de trabajo de forma atómica. Devuelve
  /// `DomainError::Conflict` si una guarda o una restricción de unicidad
  /// falla; el `hook` corre antes de confirmar y su error aborta todo.
  fn commit(&self, changes: ChangeSet, hook: CommitHook<'_>) -> Result<(), DomainError>;

  /// Confirma sin efecto externo.
  fn apply(&self, changes: ChangeSet) -> Result<(), DomainError> {
    self.commit(changes, &mut || Ok::<(), DomainError>(()))
  }
}

#[derive(Clone, Default)]
struct Tables {
  flow_requests: BTreeMap<RecordId, FlowRequest>,
  failure_reports: BTreeMap<RecordId, FailureReport>,
  assignments: BTreeMap<RecordId, Assignment>,
  maintenance_reports: BTreeMap<RecordId, MaintenanceReport>,
}

impl Tables {
  fn status_of(&self, record: &AssignmentTarget) -> Option<RecordStatus> {
    match record {
      AssignmentTarget::FlowRequest(id) => self.flow_requests.get(id).map(|r| r.status()),
      AssignmentTarget::FailureReport(id) => self.failure_reports.get(id).map(|r| r.status()),
    }
  }

  fn check_guards(&self, guards: &[Guard]) -> Result<(), DomainError> {
    for guard in guards {
      match guard {
        Guard::NoOpenRequests { lot, kinds } => {
          if let Some(open) = self.flow_requests
                                  .values()
                                  .find(|r| r.is_open() && r.lot() == lot && kinds.contains(&r.kind()))
          {
            return Err(DomainError::Conflict(format!("Ya existe una {} abierta ({}) para el lote {}",
                                                     open.kind().label(),
                                                     open.id(),
                                                     lot)));
          }
        }
        Guard::Status { record, status } => {
          let found = self.status_of(record);
          if found != Some(*status) {
            return Err(DomainError::Conflict(format!("{} cambió de estado ({}) antes de confirmar",
                                                     record,
                                                     found.map(|s| s.label()).unwrap_or("inexistente"))));
          }
        }
        Guard::CurrentAssignment { target, expected } => {
          let siblings: Vec<Assignment> =
            self.assignments.values().filter(|a| a.target() == target).cloned().collect();
          let current = current_assignment(&siblings).map(|a| a.id());
          if current != expected.as_ref() {
            return Err(DomainError::Conflict(format!("La asignación vigente de {} cambió antes de confirmar",
                                                     target)));
          }
        }
      }
    }
    Ok(())
  }

  /// Replica los índices únicos parciales del esquema sobre el estado
  /// resultante: una solicitud abierta por `(lot, kind)`, una asignación
  /// inicial por petición y un informe por asignación.
  fn check_unique(&self, changes: &[Change]) -> Result<(), DomainError> {
    for change in changes {
      match change {
        Change::PutFlowRequest(req) if req.is_open() => {
          let clash = self.flow_requests
                          .values()
                          .any(|r| r.id() != req.id() && r.is_open() && r.lot() == req.lot() && r.kind() == req.kind());
          if clash {
            return Err(DomainError::Conflict(format!("Ya existe una {} abierta para el lote {}",
                                                     req.kind().label(),
                                                     req.lot())));
          }
        }
        Change::PutAssignment(asg) if !asg.reassigned() => {
          let clash = self.assignments
                          .values()
                          .any(|a| a.id() != asg.id() && !a.reassigned() && a.target() == asg.target());
          if clash {
            return Err(DomainError::Conflict(format!("{} ya tiene una asignación inicial", asg.target())));
          }
        }
        Change::PutMaintenanceReport(rep) => {
          let clash = self.maintenance_reports
                          .values()
                          .any(|m| m.id() != rep.id() && m.assignment_id() == rep.assignment_id());
          if clash {
            return Err(DomainError::Conflict(format!("La asignación {} ya tiene un informe de mantenimiento",
                                                     rep.assignment_id())));
          }
        }
        _ => {}
      }
    }
    Ok(())
  }

  fn put(&mut self, change: Change) {
    match change {
      Change::PutFlowRequest(r) => {
        self.flow_requests.insert(r.id().clone(), r);
      }
      Change::PutFailureReport(r) => {
        self.failure_reports.insert(r.id().clone(), r);
      }
      Change::PutAssignment(a) => {
        self.assignments.insert(a.id().clone(), a);
      }
      Change::PutMaintenanceReport(m) => {
        self.maintenance_reports.insert(m.id().clone(), m);
      }
    }
  }
}

/// Implementación en memoria para tests y desarrollo.
#[derive(Clone, Default)]
pub struct InMemoryDomainRepository {
  tables: Arc<Mutex<Tables>>,
}

impl InMemoryDomainRepository {
  pub fn new() -> Self {
    Self::default()
  }

  // Helper to map poisoned mutex errors into DomainError
  fn lock_tables(&self) -> Result<MutexGuard<'_, Tables>, DomainError> {
    self.tables
        .lock()
        .map_err(|e| DomainError::ExternalError(format!("Mutex 'tables' poisoned: {}", e)))
  }
}

impl DomainRepository for InMemoryDomainRepository {
  fn get_flow_request(&self, id: &RecordId) -> Result<Option<FlowRequest>, DomainError> {
    Ok(self.lock_tables()?.flow_requests.get(id).cloned())
  }

  fn get_failure_report(&self, id: &RecordId) -> Result<Option<FailureReport>, DomainError> {
    Ok(self.lock_tables()?.failure_reports.get(id).cloned())
  }

  fn get_assignment(&self, id: &RecordId) -> Result<Option<Assignment>, DomainError> {
    Ok(self.lock_tables()?.assignments.get(id).cloned())
  }

  fn get_maintenance_report(&self, id: &RecordId) -> Result<Option<MaintenanceReport>, DomainError> {
    Ok(self.lock_tables()?.maintenance_reports.get(id).cloned())
  }

  fn list_flow_requests(&self) -> Result<Vec<FlowRequest>, DomainError> {
    let mut out: Vec<FlowRequest> = self.lock_tables()?.flow_requests.values().cloned().collect();
    out.sort_by_key(|r| r.created_at());
    Ok(out)
  }

  fn list_open_requests_for_lot(&self, lot: &LotId) -> Result<Vec<FlowRequest>, DomainError> {
    let tables = self.lock_tables()?;
    let mut out: Vec<FlowRequest> = tables.flow_requests
                                          .values()
                                          .filter(|r| r.is_open() && r.lot() == lot)
                                          .cloned()
                                          .collect();
    out.sort_by_key(|r| r.created_at());
    Ok(out)
  }

  fn list_failure_reports(&self) -> Result<Vec<FailureReport>, DomainError> {
    let mut out: Vec<FailureReport> = self.lock_tables()?.failure_reports.values().cloned().collect();
    out.sort_by_key(|r| r.created_at());
    Ok(out)
  }

  fn list_assignments_for_target(&self, target: &AssignmentTarget) -> Result<Vec<Assignment>, DomainError> {
    let tables = self.lock_tables()?;
    let mut out: Vec<Assignment> = tables.assignments.values().filter(|a| a.target() == target).cloned().collect();
    out.sort_by_key(|a| a.assignment_date());
    Ok(out)
  }

  fn list_assignments_for_user(&self, user: &UserId) -> Result<Vec<Assignment>, DomainError> {
    let tables = self.lock_tables()?;
    let mut out: Vec<Assignment> = tables.assignments.values().filter(|a| a.assigned_to() == user).cloned().collect();
    out.sort_by_key(|a| a.assignment_date());
    Ok(out)
  }

  fn find_report_for_assignment(&self, assignment_id: &RecordId) -> Result<Option<MaintenanceReport>, DomainError> {
    let tables = self.lock_tables()?;
    Ok(tables.maintenance_reports.values().find(|m| m.assignment_id() == assignment_id).cloned())
  }

  fn id_exists(&self, id: &RecordId) -> Result<bool, DomainError> {
    let tables = self.lock_tables()?;
    Ok(tables.flow_requests.contains_key(id)
       || tables.failure_reports.contains_key(id)
       || tables.assignments.contains_key(id)
       || tables.maintenance_reports.contains_key(id))
  }

  fn commit(&self, changes: ChangeSet, hook: CommitHook<'_>) -> Result<(), DomainError> {
    // Se mantiene el candado durante toda la unidad de trabajo.
    let mut tables = self.lock_tables()?;
    tables.check_guards(&changes.guards)?;
    // Las escrituras se validan sobre una copia para no dejar estados
    // intermedios si una restricción falla a mitad.
    let mut staged = (*tables).clone();
    for change in changes.changes {
      staged.check_unique(std::slice::from_ref(&change))?;
      staged.put(change);
    }
    hook()?;
    *tables = staged;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;

  fn cancel(id: &str, kind: RequestKind) -> FlowRequest {
    FlowRequest::new(RecordId::new(id),
                     kind,
                     LotId::new("L1"),
                     None,
                     UserId::new("1001"),
                     Some("cancelar por cosecha".into()),
                     Utc::now()).unwrap()
  }

  #[test]
  fn commit_and_read_back() -> Result<(), DomainError> {
    let repo = InMemoryDomainRepository::new();
    let req = cancel("10000001", RequestKind::TemporaryCancel);
    repo.apply(ChangeSet::new().put_flow_request(req.clone()))?;
    assert_eq!(repo.get_flow_request(req.id())?, Some(req.clone()));
    assert!(repo.id_exists(req.id())?);
    assert_eq!(repo.list_open_requests_for_lot(&LotId::new("L1"))?.len(), 1);
    Ok(())
  }

  #[test]
  fn guard_blocks_conflicting_open_request() -> Result<(), DomainError> {
    let repo = InMemoryDomainRepository::new();
    repo.apply(ChangeSet::new().put_flow_request(cancel("10000001", RequestKind::DefinitiveCancel)))?;
    let second = cancel("10000002", RequestKind::TemporaryCancel);
    let res = repo.apply(ChangeSet::new().guard_open_requests(second.lot(), RequestKind::TemporaryCancel.blocked_by())
                                         .put_flow_request(second.clone()));
    assert!(matches!(res, Err(DomainError::Conflict(_))));
    assert!(!repo.id_exists(second.id())?);
    Ok(())
  }

  #[test]
  fn open_request_uniqueness_per_lot_and_kind() -> Result<(), DomainError> {
    let repo = InMemoryDomainRepository::new();
    repo.apply(ChangeSet::new().put_flow_request(cancel("10000001", RequestKind::TemporaryCancel)))?;
    let res = repo.apply(ChangeSet::new().put_flow_request(cancel("10000002", RequestKind::TemporaryCancel)));
    assert!(matches!(res, Err(DomainError::Conflict(_))));
    Ok(())
  }

  fn assignment(id: &str, to: &str, reassigned: bool) -> Assignment {
    Assignment::new(RecordId::new(id),
                    AssignmentTarget::FlowRequest(RecordId::new("10000001")),
                    UserId::new("9001"),
                    UserId::new(to),
                    Utc::now(),
                    reassigned).unwrap()
  }

  #[test]
  fn status_guard_rejects_a_stale_read() -> Result<(), DomainError> {
    let repo = InMemoryDomainRepository::new();
    let mut req = cancel("10000001", RequestKind::TemporaryCancel);
    repo.apply(ChangeSet::new().put_flow_request(req.clone()))?;
    let target = AssignmentTarget::FlowRequest(req.id().clone());

    let mut rejected = req.clone();
    rejected.reject("sin agua en el canal", Utc::now())?;
    repo.apply(ChangeSet::new().guard_status(&target, RecordStatus::Pending)
                               .put_flow_request(rejected))?;

    req.approve(Utc::now())?;
    let res = repo.apply(ChangeSet::new().guard_status(&target, RecordStatus::Pending)
                                         .put_flow_request(req.clone()));
    assert!(matches!(res, Err(DomainError::Conflict(_))));
    assert_eq!(repo.get_flow_request(req.id())?.unwrap().is_approved(), Some(false));
    Ok(())
  }

  #[test]
  fn only_one_initial_assignment_per_target() -> Result<(), DomainError> {
    let repo = InMemoryDomainRepository::new();
    repo.apply(ChangeSet::new().put_assignment(assignment("30000001", "2002", false)))?;
    let res = repo.apply(ChangeSet::new().put_assignment(assignment("30000002", "2003", false)));
    assert!(matches!(res, Err(DomainError::Conflict(_))));
    repo.apply(ChangeSet::new().put_assignment(assignment("30000003", "2003", true)))?;
    assert_eq!(repo.list_assignments_for_user(&UserId::new("2003"))?.len(), 1);
    Ok(())
  }

  #[test]
  fn current_assignment_guard_detects_a_concurrent_handover() -> Result<(), DomainError> {
    let repo = InMemoryDomainRepository::new();
    let target = AssignmentTarget::FlowRequest(RecordId::new("10000001"));
    let first = assignment("30000001", "2002", false);
    repo.apply(ChangeSet::new().guard_current_assignment(&target, None)
                               .put_assignment(first.clone()))?;

    let res = repo.apply(ChangeSet::new().guard_current_assignment(&target, None)
                                         .put_assignment(assignment("30000002", "2003", true)));
    assert!(matches!(res, Err(DomainError::Conflict(_))));

    repo.apply(ChangeSet::new().guard_current_assignment(&target, Some(first.id()))
                               .put_assignment(assignment("30000003", "2003", true)))?;
    let stale = repo.apply(ChangeSet::new().guard_current_assignment(&target, Some(first.id()))
                                           .put_assignment(assignment("30000004", "2004", true)));
    assert!(matches!(stale, Err(DomainError::Conflict(_))));
    assert_eq!(repo.list_assignments_for_target(&target)?.len(), 2);
    Ok(())
  }

  #[test]
  fn lock_keys_are_sorted_and_unique() {
    let lot = LotId::new("L1");
    let target = AssignmentTarget::FlowRequest(RecordId::new("10000001"));
    let changes = ChangeSet::new().guard_status(&target, RecordStatus::Pending)
                                  .guard_open_requests(&lot, &[RequestKind::ChangeFlow])
                                  .guard_current_assignment(&target, None);
    assert_eq!(changes.lock_keys(), vec!["flow_request:10000001".to_string(), "lot:L1".to_string()]);
  }

  #[test]
  fn failed_hook_discards_every_write() -> Result<(), DomainError> {
    let repo = InMemoryDomainRepository::new();
    let mut req = cancel("10000001", RequestKind::TemporaryCancel);
    repo.apply(ChangeSet::new().put_flow_request(req.clone()))?;
    req.approve(Utc::now())?;
    let res = repo.commit(ChangeSet::new().put_flow_request(req.clone()),
                          &mut || Err::<(), _>(DomainError::ExternalError("válvula caída".into())));
    assert!(res.is_err());
    let stored = repo.get_flow_request(req.id())?.unwrap();
    assert!(stored.is_open());
    Ok(())
  }
}
