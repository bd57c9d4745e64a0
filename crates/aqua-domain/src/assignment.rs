// Archivo: assignment.rs
// Propósito: vínculo entre una solicitud o reporte abierto y el técnico
// que lo atiende.
use crate::{DomainError, RecordId, REPORT_RECORD_TYPE, REQUEST_RECORD_TYPE};
use aqua_providers::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exactamente una solicitud de caudal o un reporte de fallo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AssignmentTarget {
  FlowRequest(RecordId),
  FailureReport(RecordId),
}

impl AssignmentTarget {
  pub fn id(&self) -> &RecordId {
    match self {
      AssignmentTarget::FlowRequest(id) | AssignmentTarget::FailureReport(id) => id,
    }
  }

  pub fn record_type(&self) -> &'static str {
    match self {
      AssignmentTarget::FlowRequest(_) => REQUEST_RECORD_TYPE,
      AssignmentTarget::FailureReport(_) => REPORT_RECORD_TYPE,
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      AssignmentTarget::FlowRequest(_) => "flow_request",
      AssignmentTarget::FailureReport(_) => "failure_report",
    }
  }

  pub fn from_code(code: &str, id: RecordId) -> Option<Self> {
    match code {
      "flow_request" => Some(AssignmentTarget::FlowRequest(id)),
      "failure_report" => Some(AssignmentTarget::FailureReport(id)),
      _ => None,
    }
  }
}

impl fmt::Display for AssignmentTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.record_type(), self.id())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
  id: RecordId,
  target: AssignmentTarget,
  assigned_by: UserId,
  assigned_to: UserId,
  assignment_date: DateTime<Utc>,
  reassigned: bool,
}

impl Assignment {
  /// Nadie puede asignarse trabajo a sí mismo.
  pub fn new(id: RecordId,
             target: AssignmentTarget,
             assigned_by: UserId,
             assigned_to: UserId,
             assignment_date: DateTime<Utc>,
             reassigned: bool)
             -> Result<Self, DomainError> {
    if assigned_to == assigned_by {
      return Err(DomainError::ValidationError("No puedes asignarte una solicitud/reporte a ti mismo".to_string()));
    }
    Ok(Self { id, target, assigned_by, assigned_to, assignment_date, reassigned })
  }

  pub fn id(&self) -> &RecordId {
    &self.id
  }

  pub fn target(&self) -> &AssignmentTarget {
    &self.target
  }

  pub fn assigned_by(&self) -> &UserId {
    &self.assigned_by
  }

  pub fn assigned_to(&self) -> &UserId {
    &self.assigned_to
  }

  pub fn assignment_date(&self) -> DateTime<Utc> {
    self.assignment_date
  }

  pub fn reassigned(&self) -> bool {
    self.reassigned
  }
}

/// Asignación vigente entre las de una misma petición: la más reciente, y
/// ante empate de fecha la reasignación.
pub fn current_assignment(assignments: &[Assignment]) -> Option<&Assignment> {
  assignments.iter().max_by_key(|a| (a.assignment_date(), a.reassigned()))
}
