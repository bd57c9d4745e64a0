// Archivo: work_item.rs
// Propósito: vista uniforme de la solicitud o el reporte al que apunta una
// asignación, para que asignaciones e informes no repitan el `match`.
use crate::context::WorkflowContext;
use crate::errors::WorkflowError;
use aqua_domain::{AssignmentTarget, ChangeSet, DomainError, FailureReport, FlowRequest, RecordId, RecordStatus};

#[derive(Debug, Clone)]
pub(crate) enum WorkItem {
  Request(FlowRequest),
  Report(FailureReport),
}

impl WorkItem {
  pub(crate) fn load(ctx: &WorkflowContext, target: &AssignmentTarget) -> Result<Self, WorkflowError> {
    match target {
      AssignmentTarget::FlowRequest(id) => ctx.load_flow_request(id).map(WorkItem::Request),
      AssignmentTarget::FailureReport(id) => ctx.load_failure_report(id).map(WorkItem::Report),
    }
  }

  pub(crate) fn id(&self) -> &RecordId {
    match self {
      WorkItem::Request(r) => r.id(),
      WorkItem::Report(r) => r.id(),
    }
  }

  pub(crate) fn target(&self) -> AssignmentTarget {
    match self {
      WorkItem::Request(r) => AssignmentTarget::FlowRequest(r.id().clone()),
      WorkItem::Report(r) => AssignmentTarget::FailureReport(r.id().clone()),
    }
  }

  pub(crate) fn record_type(&self) -> &'static str {
    match self {
      WorkItem::Request(r) => r.record_type(),
      WorkItem::Report(r) => r.record_type(),
    }
  }

  pub(crate) fn subtype(&self) -> &'static str {
    match self {
      WorkItem::Request(r) => r.kind().label(),
      WorkItem::Report(r) => r.kind().label(),
    }
  }

  pub(crate) fn status(&self) -> RecordStatus {
    match self {
      WorkItem::Request(r) => r.status(),
      WorkItem::Report(r) => r.status(),
    }
  }

  pub(crate) fn requires_delegation(&self) -> bool {
    match self {
      WorkItem::Request(r) => r.requires_delegation(),
      WorkItem::Report(r) => r.requires_delegation(),
    }
  }

  pub(crate) fn ensure_open(&self) -> Result<(), DomainError> {
    match self {
      WorkItem::Request(r) => r.ensure_open(),
      WorkItem::Report(r) => r.ensure_open(),
    }
  }

  pub(crate) fn start_progress(&mut self) -> Result<(), DomainError> {
    match self {
      WorkItem::Request(r) => r.start_progress(),
      WorkItem::Report(r) => r.start_progress(),
    }
  }

  pub(crate) fn await_approval(&mut self) -> Result<(), DomainError> {
    match self {
      WorkItem::Request(r) => r.await_approval(),
      WorkItem::Report(r) => r.await_approval(),
    }
  }

  /// Exige al confirmar que la entidad siga en el estado actual. Se llama
  /// antes de cualquier transición.
  pub(crate) fn guard(&self, changes: ChangeSet) -> ChangeSet {
    changes.guard_status(&self.target(), self.status())
  }

  /// Agrega la entidad a la unidad de trabajo.
  pub(crate) fn stage(self, changes: ChangeSet) -> ChangeSet {
    match self {
      WorkItem::Request(r) => changes.put_flow_request(r),
      WorkItem::Report(r) => changes.put_failure_report(r),
    }
  }
}
