// capability.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capacidades nombradas que el workflow consulta. No asume ningún modelo
/// concreto de grupos o roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Puede delegar solicitudes/reportes a un técnico.
    CanAssign,
    /// Puede recibir asignaciones (técnicos, operadores).
    CanBeAssigned,
    /// Decide solicitudes y aprueba informes de mantenimiento.
    Administrator,
}

impl Capability {
    pub fn code(&self) -> &'static str {
        match self {
            Capability::CanAssign => "can_assign",
            Capability::CanBeAssigned => "can_be_assigned",
            Capability::Administrator => "administrator",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
