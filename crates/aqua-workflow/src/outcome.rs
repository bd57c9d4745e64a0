use crate::notifications::WorkflowEvent;

/// Entidad confirmada y los eventos que la operación produjo. Los eventos
/// se publican sólo después de confirmar.
#[derive(Debug, Clone)]
pub struct WorkflowOutcome<T> {
  pub entity: T,
  pub events: Vec<WorkflowEvent>,
}

impl<T> WorkflowOutcome<T> {
  pub fn new(entity: T, events: Vec<WorkflowEvent>) -> Self {
    Self { entity, events }
  }
}
