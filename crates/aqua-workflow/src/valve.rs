// Archivo: valve.rs
// Propósito: efecto sobre la válvula de una solicitud aprobada y su
// aplicación dentro de la confirmación de la unidad de trabajo.
//
// La válvula se modifica en el gancho de `DomainRepository::commit`: si el
// registro de válvulas falla no se confirma nada; si la confirmación falla
// después de mover la válvula se restaura el caudal anterior.
use crate::context::WorkflowContext;
use crate::errors::WorkflowError;
use aqua_domain::{ChangeSet, DomainError, FlowRequest, RequestKind};
use aqua_providers::{LotId, ProviderError, ValveRegistry};
use log::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ValveEffect {
  pub lot: LotId,
  pub target_flow: f64,
  /// Además de cerrar la válvula, inhabilita el lote.
  pub deactivate_lot: bool,
}

impl ValveEffect {
  /// Cambio de caudal y activación fijan el caudal pedido; las
  /// cancelaciones lo llevan a 0 y la definitiva inhabilita el lote.
  pub fn for_approved(request: &FlowRequest) -> Self {
    Self { lot: request.lot().clone(),
           target_flow: request.target_flow(),
           deactivate_lot: request.kind() == RequestKind::DefinitiveCancel }
  }

  /// Aplica el efecto y devuelve el caudal previo.
  pub fn apply(&self, valves: &dyn ValveRegistry) -> Result<Option<f64>, ProviderError> {
    let previous = valves.get_current_flow(&self.lot)?;
    valves.set_current_flow(&self.lot, self.target_flow)?;
    if self.deactivate_lot {
      if let Err(e) = valves.deactivate_lot(&self.lot) {
        self.compensate(valves, previous);
        return Err(e);
      }
    }
    Ok(previous)
  }

  /// Restaura el caudal previo. Un lote ya inhabilitado no se reactiva.
  pub fn compensate(&self, valves: &dyn ValveRegistry, previous: Option<f64>) {
    let restored = previous.unwrap_or(0.0);
    match valves.set_current_flow(&self.lot, restored) {
      Ok(()) => info!("válvula del lote {} restaurada a {} L/s", self.lot, restored),
      Err(e) => error!("no se pudo restaurar la válvula del lote {} a {} L/s: {}", self.lot, restored, e),
    }
    if self.deactivate_lot {
      error!("el lote {} quedó inhabilitado aunque la aprobación no se confirmó", self.lot);
    }
  }
}

/// Confirma `changes` aplicando `effect` dentro de la misma unidad de
/// trabajo.
pub(crate) fn commit_with_valve(ctx: &WorkflowContext,
                                changes: ChangeSet,
                                effect: &ValveEffect)
                                -> Result<(), WorkflowError> {
  let valves = ctx.valves.clone();
  let mut previous: Option<Option<f64>> = None;
  let mut valve_failure: Option<ProviderError> = None;
  let result = {
    let mut hook = || match effect.apply(valves.as_ref()) {
      Ok(prev) => {
        previous = Some(prev);
        Ok(())
      }
      Err(e) => {
        let msg = e.to_string();
        valve_failure = Some(e);
        Err(DomainError::ExternalError(msg))
      }
    };
    ctx.repo.commit(changes, &mut hook)
  };
  match result {
    Ok(()) => {
      info!("válvula del lote {} fijada en {} L/s", effect.lot, effect.target_flow);
      Ok(())
    }
    Err(err) => {
      if let Some(e) = valve_failure {
        return Err(WorkflowError::ExternalDependency(format!("registro de válvulas: {}", e)));
      }
      if let Some(prev) = previous {
        effect.compensate(valves.as_ref(), prev);
      }
      Err(err.into())
    }
  }
}
