// Archivo: failure_reports.rs
// Propósito: registro de reportes de fallo. Siempre se delegan a un
// técnico; se cierran al aprobarse el informe de mantenimiento.
use crate::context::WorkflowContext;
use crate::errors::WorkflowError;
use crate::notifications::{EventKind, WorkflowEvent};
use crate::outcome::WorkflowOutcome;
use aqua_domain::{ChangeSet, EntityKind, FailureKind, FailureReport};
use aqua_providers::{LotId, UserId};
use log::info;

pub struct FailureReportService {
  ctx: WorkflowContext,
}

impl FailureReportService {
  pub fn new(ctx: WorkflowContext) -> Self {
    Self { ctx }
  }

  /// Un fallo de suministro exige un lote propio, habilitado y sin otro
  /// reporte de suministro abierto del mismo usuario; un fallo del
  /// aplicativo no lleva lote.
  pub fn file(&self,
              reporter: &UserId,
              kind: FailureKind,
              lot: Option<LotId>,
              observations: &str)
              -> Result<WorkflowOutcome<FailureReport>, WorkflowError> {
    if let (FailureKind::WaterSupply, Some(lot)) = (kind, lot.as_ref()) {
      let owner = self.ctx.lots.resolve_owner(lot)?;
      if &owner != reporter {
        return Err(WorkflowError::Ownership(format!("{} no es dueño del lote {}", reporter, lot)));
      }
      if !self.ctx.lots.is_active(lot)? {
        return Err(WorkflowError::Validation(format!("El lote {} está inhabilitado", lot)));
      }
      let duplicated = self.ctx
                           .repo
                           .list_failure_reports()?
                           .into_iter()
                           .any(|r| {
                             r.is_open()
                             && r.kind() == FailureKind::WaterSupply
                             && r.created_by() == reporter
                             && r.lot() == Some(lot)
                           });
      if duplicated {
        return Err(WorkflowError::Validation(format!("Ya existe un reporte de suministro en curso para el lote {}",
                                                     lot)));
      }
    }

    let now = self.ctx.now();
    let id = self.ctx.allocate_id(EntityKind::FailureReport)?;
    let report = FailureReport::new(id, kind, lot, reporter.clone(), observations, now)?;
    self.ctx.repo.apply(ChangeSet::new().put_failure_report(report.clone()))?;
    info!("reporte {} ({}) registrado por {}", report.id(), kind.code(), reporter);

    let event = WorkflowEvent::new(EventKind::FailureReportFiled,
                                   report.id(),
                                   report.record_type(),
                                   kind.label(),
                                   reporter,
                                   now).notify(&[reporter])
                                       .with_status(report.status(), None);
    Ok(WorkflowOutcome::new(report, vec![event]))
  }
}
