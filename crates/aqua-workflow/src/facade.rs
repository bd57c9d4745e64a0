// Archivo: facade.rs
// Propósito: superficie del flujo de riego. Cada operación confirma su
// cambio, registra los eventos en la bitácora y los despacha; la bitácora
// y el despacho nunca deshacen lo confirmado.
use crate::assignments::AssignmentManager;
use crate::config::WorkflowConfig;
use crate::context::WorkflowContext;
use crate::errors::WorkflowError;
use crate::failure_reports::FailureReportService;
use crate::maintenance::{MaintenanceService, NewMaintenanceReport};
use crate::notifications::WorkflowEvent;
use crate::requests::{NewFlowRequest, RequestService};
use aqua_domain::{Assignment, AssignmentTarget, DomainRepository, FailureKind, FailureReport, FlowRequest,
                  HashedIdGenerator, InMemoryDomainRepository, MaintenanceReport, RecordId, RecordStatus};
use aqua_persistence::{build_pool, database_url_from_env, DieselDomainRepository, DieselEventRepository};
use aqua_providers::{InMemoryDistrict, LotId, UserId};
use chrono::{DateTime, Utc};
use events::{EventDispatcher, EventLog, EventRecord, EventRepository, InMemoryEventRepository, NotificationDispatcher};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Solicitud o reporte sin finalizar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenItem {
  pub id: RecordId,
  pub record_type: String,
  pub subtype: String,
  pub status: RecordStatus,
  pub created_by: UserId,
  pub created_at: DateTime<Utc>,
}

pub struct IrrigationWorkflow {
  ctx: WorkflowContext,
  requests: RequestService,
  failures: FailureReportService,
  assignments: AssignmentManager,
  maintenance: MaintenanceService,
  journal: EventLog,
  dispatcher: EventDispatcher,
}

impl IrrigationWorkflow {
  pub fn new(ctx: WorkflowContext,
             events: Arc<dyn EventRepository>,
             notifier: Arc<dyn NotificationDispatcher>)
             -> Self {
    let mut dispatcher = EventDispatcher::new(ctx.config.notification_timeout);
    dispatcher.register_all(notifier);
    Self { requests: RequestService::new(ctx.clone()),
           failures: FailureReportService::new(ctx.clone()),
           assignments: AssignmentManager::new(ctx.clone()),
           maintenance: MaintenanceService::new(ctx.clone()),
           journal: EventLog::new(events),
           dispatcher,
           ctx }
  }

  /// Todo en memoria sobre un distrito dado.
  pub fn in_memory(district: Arc<InMemoryDistrict>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
    let ctx = WorkflowContext::new(Arc::new(InMemoryDomainRepository::new()),
                                   district.clone(),
                                   district.clone(),
                                   district,
                                   Arc::new(HashedIdGenerator),
                                   WorkflowConfig::default());
    Self::new(ctx, Arc::new(InMemoryEventRepository::new()), notifier)
  }

  /// Configuración y base de datos desde el entorno (`.env`,
  /// `AQUA_DB_URL`/`DATABASE_URL`); lotes, válvulas y capacidades desde
  /// `district`.
  pub fn from_env(district: Arc<InMemoryDistrict>,
                  notifier: Arc<dyn NotificationDispatcher>)
                  -> Result<Self, WorkflowError> {
    let config = WorkflowConfig::from_env()?;
    let url = database_url_from_env().map_err(WorkflowError::Persistence)?;
    let pool = Arc::new(build_pool(&url).map_err(WorkflowError::Persistence)?);
    let repo: Arc<dyn DomainRepository> = Arc::new(DieselDomainRepository::from_pool(pool.clone()));
    let events: Arc<dyn EventRepository> = Arc::new(DieselEventRepository::from_pool(pool));
    let ctx = WorkflowContext::new(repo,
                                   district.clone(),
                                   district.clone(),
                                   district,
                                   Arc::new(HashedIdGenerator),
                                   config);
    info!("flujo de riego listo sobre base persistente");
    Ok(Self::new(ctx, events, notifier))
  }

  pub fn context(&self) -> &WorkflowContext {
    &self.ctx
  }

  /// Registra y despacha los eventos de una operación ya confirmada.
  fn publish(&self, events: &[WorkflowEvent]) {
    for event in events {
      match serde_json::to_value(event) {
        Ok(body) => {
          if let Err(e) = self.journal.record(event.entity_id.as_str(), event.kind.code(), body, Some(event.id)) {
            warn!("evento {} de {} no quedó en la bitácora: {}", event.kind, event.entity_id, e);
          }
        }
        Err(e) => warn!("evento {} de {} no serializable: {}", event.kind, event.entity_id, e),
      }
      let payload = event.payload(self.ctx.oracle.as_ref());
      let report = self.dispatcher.dispatch(event.kind.code(), &payload);
      if event.kind.is_creation() && report.elapsed > self.ctx.config.creation_notice_target {
        warn!("notificación de {} tardó {:?} (objetivo {:?})",
              event.entity_id,
              report.elapsed,
              self.ctx.config.creation_notice_target);
      }
    }
  }

  pub fn create_flow_request(&self, requester: &UserId, input: NewFlowRequest) -> Result<FlowRequest, WorkflowError> {
    let outcome = self.requests.create(requester, input)?;
    self.publish(&outcome.events);
    Ok(outcome.entity)
  }

  pub fn approve_flow_request(&self, actor: &UserId, id: &RecordId) -> Result<FlowRequest, WorkflowError> {
    let outcome = self.requests.approve(actor, id)?;
    self.publish(&outcome.events);
    Ok(outcome.entity)
  }

  pub fn reject_flow_request(&self,
                             actor: &UserId,
                             id: &RecordId,
                             observations: &str)
                             -> Result<FlowRequest, WorkflowError> {
    let outcome = self.requests.reject(actor, id, observations)?;
    self.publish(&outcome.events);
    Ok(outcome.entity)
  }

  pub fn file_failure_report(&self,
                             reporter: &UserId,
                             kind: FailureKind,
                             lot: Option<LotId>,
                             observations: &str)
                             -> Result<FailureReport, WorkflowError> {
    let outcome = self.failures.file(reporter, kind, lot, observations)?;
    self.publish(&outcome.events);
    Ok(outcome.entity)
  }

  pub fn create_assignment(&self,
                           actor: &UserId,
                           assigned_to: &UserId,
                           target: &AssignmentTarget)
                           -> Result<Assignment, WorkflowError> {
    let outcome = self.assignments.create(actor, assigned_to, target)?;
    self.publish(&outcome.events);
    Ok(outcome.entity)
  }

  pub fn reassign_assignment(&self,
                             actor: &UserId,
                             assignment_id: &RecordId,
                             new_assigned_to: &UserId)
                             -> Result<Assignment, WorkflowError> {
    let outcome = self.assignments.reassign(actor, assignment_id, new_assigned_to)?;
    self.publish(&outcome.events);
    Ok(outcome.entity)
  }

  pub fn list_assignments_for_user(&self, user: &UserId) -> Result<Vec<Assignment>, WorkflowError> {
    self.assignments.list_assigned_to(user)
  }

  pub fn file_maintenance_report(&self,
                                 technician: &UserId,
                                 assignment_id: &RecordId,
                                 input: NewMaintenanceReport)
                                 -> Result<MaintenanceReport, WorkflowError> {
    let outcome = self.maintenance.file_report(technician, assignment_id, input)?;
    self.publish(&outcome.events);
    Ok(outcome.entity)
  }

  pub fn approve_maintenance_report(&self,
                                    supervisor: &UserId,
                                    report_id: &RecordId)
                                    -> Result<MaintenanceReport, WorkflowError> {
    let outcome = self.maintenance.approve_report(supervisor, report_id)?;
    self.publish(&outcome.events);
    Ok(outcome.entity)
  }

  /// Solicitudes y reportes sin finalizar, del más reciente al más antiguo.
  pub fn list_open_items(&self) -> Result<Vec<OpenItem>, WorkflowError> {
    let requests = self.ctx.repo.list_flow_requests()?;
    let reports = self.ctx.repo.list_failure_reports()?;
    let mut items: Vec<OpenItem> =
      requests.into_iter()
              .filter(|r| r.is_open())
              .map(|r| OpenItem { id: r.id().clone(),
                                  record_type: r.record_type().to_string(),
                                  subtype: r.kind().label().to_string(),
                                  status: r.status(),
                                  created_by: r.created_by().clone(),
                                  created_at: r.created_at() })
              .chain(reports.into_iter()
                            .filter(|r| r.is_open())
                            .map(|r| OpenItem { id: r.id().clone(),
                                                record_type: r.record_type().to_string(),
                                                subtype: r.kind().label().to_string(),
                                                status: r.status(),
                                                created_by: r.created_by().clone(),
                                                created_at: r.created_at() }))
              .collect();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    Ok(items)
  }

  pub fn flow_request(&self, id: &RecordId) -> Result<FlowRequest, WorkflowError> {
    self.ctx.load_flow_request(id)
  }

  pub fn failure_report(&self, id: &RecordId) -> Result<FailureReport, WorkflowError> {
    self.ctx.load_failure_report(id)
  }

  pub fn assignment(&self, id: &RecordId) -> Result<Assignment, WorkflowError> {
    self.ctx.load_assignment(id)
  }

  pub fn maintenance_report(&self, id: &RecordId) -> Result<MaintenanceReport, WorkflowError> {
    self.ctx.load_maintenance_report(id)
  }

  /// Eventos registrados para una entidad, en orden.
  pub fn history(&self, id: &RecordId) -> Result<Vec<EventRecord>, WorkflowError> {
    self.journal
        .history(id.as_str())
        .map_err(|e| WorkflowError::Persistence(e.to_string()))
  }
}
