// Archivo: registry.rs
// Propósito: contratos de los colaboradores externos. Las implementaciones
// reales (ORM del distrito, gateway MQTT de válvulas, backend de identidad)
// viven fuera de este workspace.
use crate::capability::Capability;
use crate::errors::ProviderError;
use crate::ids::{LotId, UserId};

/// Registro de lotes: dueño y estado habilitado.
pub trait LotOwnership: Send + Sync {
    /// Devuelve el dueño del predio al que pertenece el lote.
    fn resolve_owner(&self, lot: &LotId) -> Result<UserId, ProviderError>;

    /// Indica si el lote está habilitado para recibir caudal.
    fn is_active(&self, lot: &LotId) -> Result<bool, ProviderError>;
}

/// Registro de válvulas. Expone un único atributo mutable por lote: el
/// caudal actual en L/s.
pub trait ValveRegistry: Send + Sync {
    /// Indica si el lote tiene una válvula asociada.
    fn has_valve(&self, lot: &LotId) -> Result<bool, ProviderError>;

    /// Caudal actual. `None` o `Some(0.0)` significan válvula inactiva.
    fn get_current_flow(&self, lot: &LotId) -> Result<Option<f64>, ProviderError>;

    /// Fija el caudal actual de la válvula del lote.
    fn set_current_flow(&self, lot: &LotId, flow: f64) -> Result<(), ProviderError>;

    /// Inhabilita el lote (cancelación definitiva).
    fn deactivate_lot(&self, lot: &LotId) -> Result<(), ProviderError>;
}

/// Oráculo de identidad y permisos.
pub trait CapabilityOracle: Send + Sync {
    /// Indica si el usuario tiene la capacidad pedida. Usuarios
    /// desconocidos no tienen ninguna.
    fn has(&self, user: &UserId, capability: Capability) -> bool;

    /// Nombre visible del usuario para las notificaciones.
    fn display_name(&self, user: &UserId) -> String {
        user.to_string()
    }
}
