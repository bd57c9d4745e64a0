// Archivo: ids.rs
// Propósito: identificadores de las entidades del flujo. Cada tipo de
// entidad usa un prefijo propio para que los ids nunca colisionen entre
// tipos; el generador se inyecta en el workflow.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Tipo de entidad identificable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
  FlowRequest,
  FailureReport,
  Assignment,
  MaintenanceReport,
}

impl EntityKind {
  pub const ALL: [EntityKind; 4] =
    [EntityKind::FlowRequest, EntityKind::FailureReport, EntityKind::Assignment, EntityKind::MaintenanceReport];

  /// Prefijo numérico del id.
  pub fn prefix(&self) -> &'static str {
    match self {
      EntityKind::FlowRequest => "10",
      EntityKind::FailureReport => "20",
      EntityKind::Assignment => "30",
      EntityKind::MaintenanceReport => "40",
    }
  }

  fn index(&self) -> usize {
    match self {
      EntityKind::FlowRequest => 0,
      EntityKind::FailureReport => 1,
      EntityKind::Assignment => 2,
      EntityKind::MaintenanceReport => 3,
    }
  }
}

/// Identificador de una solicitud, reporte, asignación o informe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Deduce el tipo de entidad a partir del prefijo.
  pub fn kind(&self) -> Option<EntityKind> {
    EntityKind::ALL.into_iter().find(|k| self.0.starts_with(k.prefix()))
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Fuente de identificadores. No garantiza unicidad por sí sola: quien
/// asigna ids debe comprobar contra el repositorio y reintentar.
pub trait IdGenerator: Send + Sync {
  fn next_id(&self, kind: EntityKind) -> RecordId;
}

/// Prefijo del tipo seguido de seis dígitos derivados del SHA-256 de un
/// UUID v4 nuevo.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashedIdGenerator;

impl IdGenerator for HashedIdGenerator {
  fn next_id(&self, kind: EntityKind) -> RecordId {
    let digest = Sha256::digest(Uuid::new_v4().as_bytes());
    let n = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % 1_000_000;
    RecordId(format!("{}{:06}", kind.prefix(), n))
  }
}

/// Contador monótono por tipo de entidad. Determinista, pensado para
/// pruebas y demos.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
  counters: [AtomicU64; 4],
}

impl SequentialIdGenerator {
  pub fn new() -> Self {
    Self::default()
  }
}

impl IdGenerator for SequentialIdGenerator {
  fn next_id(&self, kind: EntityKind) -> RecordId {
    let n = self.counters[kind.index()].fetch_add(1, Ordering::SeqCst) + 1;
    RecordId(format!("{}{:06}", kind.prefix(), n))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hashed_ids_carry_kind_prefix() {
    let generator = HashedIdGenerator;
    for kind in EntityKind::ALL {
      let id = generator.next_id(kind);
      assert_eq!(id.as_str().len(), 8);
      assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
      assert_eq!(id.kind(), Some(kind));
    }
  }

  #[test]
  fn sequential_counters_are_independent_per_kind() {
    let generator = SequentialIdGenerator::new();
    assert_eq!(generator.next_id(EntityKind::FlowRequest).as_str(), "10000001");
    assert_eq!(generator.next_id(EntityKind::FlowRequest).as_str(), "10000002");
    assert_eq!(generator.next_id(EntityKind::Assignment).as_str(), "30000001");
  }

  #[test]
  fn unknown_prefix_has_no_kind() {
    assert_eq!(RecordId::new("99000001").kind(), None);
  }
}
