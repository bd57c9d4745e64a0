// Archivo: maintenance.rs
// Propósito: informes de mantenimiento y su aprobación, que cierra la
// solicitud o el reporte asignado.
use crate::context::WorkflowContext;
use crate::errors::WorkflowError;
use crate::notifications::{EventKind, WorkflowEvent};
use crate::outcome::WorkflowOutcome;
use crate::requests::{decision_event, RequestService};
use crate::valve::commit_with_valve;
use crate::work_item::WorkItem;
use aqua_domain::{current_assignment, ChangeSet, EntityKind, InterventionStatus, MaintenanceReport, RecordId,
                  RecordStatus};
use aqua_providers::{Capability, UserId};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

const MAINTENANCE_RECORD_TYPE: &str = "Informe de mantenimiento";

/// Datos que el técnico entrega tras intervenir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaintenanceReport {
  pub intervention_date: DateTime<Utc>,
  pub description: Option<String>,
  pub images: Vec<String>,
  pub status: InterventionStatus,
}

impl NewMaintenanceReport {
  pub fn finished(intervention_date: DateTime<Utc>, description: &str) -> Self {
    Self { intervention_date,
           description: Some(description.to_string()),
           images: Vec::new(),
           status: InterventionStatus::Finished }
  }
}

pub struct MaintenanceService {
  ctx: WorkflowContext,
  requests: RequestService,
}

impl MaintenanceService {
  pub fn new(ctx: WorkflowContext) -> Self {
    let requests = RequestService::new(ctx.clone());
    Self { ctx, requests }
  }

  /// Registra el informe de la asignación vigente y deja la petición a la
  /// espera de aprobación.
  pub fn file_report(&self,
                     technician: &UserId,
                     assignment_id: &RecordId,
                     input: NewMaintenanceReport)
                     -> Result<WorkflowOutcome<MaintenanceReport>, WorkflowError> {
    let assignment = self.ctx.load_assignment(assignment_id)?;
    if assignment.assigned_to() != technician {
      return Err(WorkflowError::Permission(format!("La asignación {} no pertenece a {}", assignment_id, technician)));
    }
    let siblings = self.ctx.repo.list_assignments_for_target(assignment.target())?;
    if current_assignment(&siblings).map(|a| a.id() != assignment.id()).unwrap_or(false) {
      return Err(WorkflowError::Validation(format!("La asignación {} fue reemplazada por una reasignación",
                                                   assignment_id)));
    }
    if let Some(existing) = self.ctx.repo.find_report_for_assignment(assignment_id)? {
      return Err(WorkflowError::Validation(format!("La asignación {} ya tiene el informe {}",
                                                   assignment_id,
                                                   existing.id())));
    }
    let mut item = WorkItem::load(&self.ctx, assignment.target())?;
    item.ensure_open()?;
    let guarded = item.guard(ChangeSet::new()).guard_current_assignment(assignment.target(), Some(assignment_id));

    let now = self.ctx.now();
    let NewMaintenanceReport { intervention_date,
                               description,
                               images,
                               status, } = input;
    let id = self.ctx.allocate_id(EntityKind::MaintenanceReport)?;
    let report = MaintenanceReport::new(id, &assignment, intervention_date, description, images, status, now)?;
    item.await_approval()?;

    let event = WorkflowEvent::new(EventKind::MaintenanceReportFiled,
                                   report.id(),
                                   MAINTENANCE_RECORD_TYPE,
                                   item.subtype(),
                                   technician,
                                   now).related_to(item.id())
                                       .notify(&[assignment.assigned_by()])
                                       .with_status(item.status(), None);
    self.ctx.repo.apply(item.stage(guarded).put_maintenance_report(report.clone()))?;
    info!("informe {} ({}) registrado para la asignación {}", report.id(), status.label(), assignment_id);
    Ok(WorkflowOutcome::new(report, vec![event]))
  }

  /// Aprueba el informe y finaliza la petición asignada. En solicitudes de
  /// caudal el cambio de válvula forma parte de la misma confirmación.
  ///
  /// Solo se aprueba el informe de la asignación vigente y con la petición
  /// a la espera de aprobación: tras una reasignación el informe anterior
  /// queda como historial.
  pub fn approve_report(&self,
                        supervisor: &UserId,
                        report_id: &RecordId)
                        -> Result<WorkflowOutcome<MaintenanceReport>, WorkflowError> {
    self.ctx.require(supervisor, Capability::Administrator, "aprobar informes")?;
    let mut report = self.ctx.load_maintenance_report(report_id)?;
    if report.is_approved() {
      return Err(WorkflowError::AlreadyApproved(report_id.to_string()));
    }
    let siblings = self.ctx.repo.list_assignments_for_target(report.target())?;
    if current_assignment(&siblings).map(|a| a.id()) != Some(report.assignment_id()) {
      return Err(WorkflowError::Validation(format!("El informe {} pertenece a la asignación {}, que fue reemplazada",
                                                   report_id,
                                                   report.assignment_id())));
    }
    let item = WorkItem::load(&self.ctx, report.target())?;
    item.ensure_open()?;
    if item.status() != RecordStatus::AwaitingApproval {
      return Err(WorkflowError::Validation(format!("{} {} no está a espera de aprobación ({})",
                                                   item.record_type(),
                                                   item.id(),
                                                   item.status())));
    }
    let guarded = item.guard(ChangeSet::new()).guard_current_assignment(report.target(), Some(report.assignment_id()));

    let now = self.ctx.now();
    report.approve(supervisor, now)?;
    let decision = match item {
      WorkItem::Request(mut request) => {
        let effect = self.requests.approve_from_maintenance(&mut request, now)?;
        let changes = guarded.put_flow_request(request.clone())
                             .put_maintenance_report(report.clone());
        commit_with_valve(&self.ctx, changes, &effect)?;
        info!("solicitud {} finalizada por el informe {}", request.id(), report_id);
        decision_event(&request, supervisor, now).related_to(report.id())
      }
      WorkItem::Report(mut failure) => {
        failure.resolve(now)?;
        self.ctx
            .repo
            .apply(guarded.put_failure_report(failure.clone())
                          .put_maintenance_report(report.clone()))?;
        info!("reporte {} resuelto por el informe {}", failure.id(), report_id);
        WorkflowEvent::new(EventKind::FailureReportResolved,
                           failure.id(),
                           failure.record_type(),
                           failure.kind().label(),
                           supervisor,
                           now).related_to(report.id())
                               .notify(&[failure.created_by()])
                               .with_status(failure.status(), failure.is_approved())
      }
    };

    let approved = WorkflowEvent::new(EventKind::MaintenanceReportApproved,
                                      report.id(),
                                      MAINTENANCE_RECORD_TYPE,
                                      report.status().label(),
                                      supervisor,
                                      now).related_to(report.target().id())
                                          .notify(&[report.filed_by()])
                                          .with_status(RecordStatus::Finalized, Some(true));
    Ok(WorkflowOutcome::new(report, vec![approved, decision]))
  }
}
