// Archivo: notifications.rs
// Propósito: eventos de dominio que cada operación devuelve tras confirmar,
// y su traducción a la carga que recibe el notificador externo.
use aqua_domain::{RecordId, RecordStatus};
use aqua_providers::{CapabilityOracle, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  FlowRequestCreated,
  /// Cancelación temporal finalizada por una cancelación definitiva.
  FlowRequestSuperseded,
  FlowRequestDecided,
  FailureReportFiled,
  FailureReportResolved,
  AssignmentCreated,
  MaintenanceReportFiled,
  MaintenanceReportApproved,
}

impl EventKind {
  pub fn code(&self) -> &'static str {
    match self {
      EventKind::FlowRequestCreated => "flow_request_created",
      EventKind::FlowRequestSuperseded => "flow_request_superseded",
      EventKind::FlowRequestDecided => "flow_request_decided",
      EventKind::FailureReportFiled => "failure_report_filed",
      EventKind::FailureReportResolved => "failure_report_resolved",
      EventKind::AssignmentCreated => "assignment_created",
      EventKind::MaintenanceReportFiled => "maintenance_report_filed",
      EventKind::MaintenanceReportApproved => "maintenance_report_approved",
    }
  }

  /// Eventos de creación, sujetos al objetivo de entrega más estricto.
  pub fn is_creation(&self) -> bool {
    matches!(self, EventKind::FlowRequestCreated | EventKind::FailureReportFiled)
  }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.code())
  }
}

/// Hecho confirmado del flujo. Se construye dentro de la operación y se
/// publica después de confirmar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
  pub id: Uuid,
  pub kind: EventKind,
  /// Entidad a la que se refiere el evento.
  pub entity_id: RecordId,
  /// "Solicitud", "Reporte", "Asignación" o "Informe de mantenimiento".
  pub entity_type: String,
  /// Tipo concreto (etiqueta de la solicitud, del fallo o de la solicitud
  /// asignada).
  pub subtype: String,
  /// Solicitud o reporte subyacente para asignaciones e informes.
  pub related_id: Option<RecordId>,
  pub actor: UserId,
  pub recipients: Vec<UserId>,
  /// Estado resultante de la solicitud/reporte afectado.
  pub status: Option<RecordStatus>,
  pub approved: Option<bool>,
  pub occurred_at: DateTime<Utc>,
}

impl WorkflowEvent {
  pub fn new(kind: EventKind,
             entity_id: &RecordId,
             entity_type: &str,
             subtype: &str,
             actor: &UserId,
             occurred_at: DateTime<Utc>)
             -> Self {
    Self { id: Uuid::new_v4(),
           kind,
           entity_id: entity_id.clone(),
           entity_type: entity_type.to_string(),
           subtype: subtype.to_string(),
           related_id: None,
           actor: actor.clone(),
           recipients: Vec::new(),
           status: None,
           approved: None,
           occurred_at }
  }

  pub fn related_to(mut self, id: &RecordId) -> Self {
    self.related_id = Some(id.clone());
    self
  }

  /// Agrega destinatarios sin repetirlos.
  pub fn notify(mut self, users: &[&UserId]) -> Self {
    for user in users {
      if !self.recipients.contains(*user) {
        self.recipients.push((*user).clone());
      }
    }
    self
  }

  pub fn with_status(mut self, status: RecordStatus, approved: Option<bool>) -> Self {
    self.status = Some(status);
    self.approved = approved;
    self
  }

  /// Carga para el notificador: id, tipo, nombres de los actores, fecha y,
  /// en decisiones, el estado resultante.
  pub fn payload(&self, oracle: &dyn CapabilityOracle) -> JsonValue {
    let person = |u: &UserId| json!({ "id": u.as_str(), "name": oracle.display_name(u) });
    let recipients: Vec<JsonValue> = self.recipients.iter().map(person).collect();
    json!({
      "event": self.kind.code(),
      "event_id": self.id.to_string(),
      "id": self.entity_id.as_str(),
      "type": self.entity_type,
      "kind": self.subtype,
      "related_id": self.related_id.as_ref().map(|r| r.as_str()),
      "actor": person(&self.actor),
      "recipients": recipients,
      "status": self.status.map(|s| s.label()),
      "is_approved": self.approved,
      "timestamp": self.occurred_at.to_rfc3339(),
    })
  }
}
