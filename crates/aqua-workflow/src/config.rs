// Archivo: config.rs
// Propósito: parámetros del flujo. Los valores por defecto reproducen las
// reglas del distrito; `from_env` permite ajustar los tiempos de
// notificación y los reintentos de ids sin recompilar.
use crate::errors::WorkflowError;
use aqua_domain::FlowRange;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
  /// Caudal admitido en L/s: mínimo inclusivo, máximo exclusivo.
  pub flow_range: FlowRange,
  /// Espera máxima por entrega de notificación.
  pub notification_timeout: Duration,
  /// Objetivo de entrega para las notificaciones de creación; superarlo
  /// sólo se registra.
  pub creation_notice_target: Duration,
  /// Intentos para encontrar un id libre antes de rendirse.
  pub max_id_attempts: u32,
}

impl Default for WorkflowConfig {
  fn default() -> Self {
    WorkflowConfig { flow_range: FlowRange::default(),
                     notification_timeout: Duration::from_secs(300),
                     creation_notice_target: Duration::from_secs(60),
                     max_id_attempts: 16 }
  }
}

fn read_u64(var: &str) -> Result<Option<u64>, WorkflowError> {
  match std::env::var(var) {
    Ok(raw) => raw.trim()
                  .parse::<u64>()
                  .map(Some)
                  .map_err(|_| WorkflowError::Validation(format!("{} debe ser un entero positivo: {:?}", var, raw))),
    Err(_) => Ok(None),
  }
}

impl WorkflowConfig {
  /// Carga `.env` y aplica `AQUA_NOTIFY_TIMEOUT_SECS`,
  /// `AQUA_CREATION_NOTICE_SECS` y `AQUA_MAX_ID_ATTEMPTS` sobre los valores
  /// por defecto.
  pub fn from_env() -> Result<Self, WorkflowError> {
    dotenvy::dotenv().ok();
    let mut cfg = WorkflowConfig::default();
    if let Some(secs) = read_u64("AQUA_NOTIFY_TIMEOUT_SECS")? {
      cfg.notification_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = read_u64("AQUA_CREATION_NOTICE_SECS")? {
      cfg.creation_notice_target = Duration::from_secs(secs);
    }
    if let Some(n) = read_u64("AQUA_MAX_ID_ATTEMPTS")? {
      if n == 0 {
        return Err(WorkflowError::Validation("AQUA_MAX_ID_ATTEMPTS debe ser mayor que cero".into()));
      }
      cfg.max_id_attempts = u32::try_from(n).unwrap_or(u32::MAX);
    }
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> Result<(), WorkflowError> {
    if !(self.flow_range.min < self.flow_range.max) {
      return Err(WorkflowError::Validation("rango de caudal vacío".into()));
    }
    if self.creation_notice_target > self.notification_timeout {
      return Err(WorkflowError::Validation("el objetivo de notificación de creación excede el tiempo máximo".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_district_rules() {
    let cfg = WorkflowConfig::default();
    assert_eq!(cfg.flow_range.min, 1.0);
    assert_eq!(cfg.flow_range.max, 11.7);
    assert_eq!(cfg.notification_timeout, Duration::from_secs(300));
    assert_eq!(cfg.creation_notice_target, Duration::from_secs(60));
    assert!(cfg.validate().is_ok());
  }

  #[test]
  fn env_overrides_and_rejects_garbage() {
    std::env::set_var("AQUA_NOTIFY_TIMEOUT_SECS", "120");
    std::env::set_var("AQUA_CREATION_NOTICE_SECS", "30");
    let cfg = WorkflowConfig::from_env().unwrap();
    assert_eq!(cfg.notification_timeout, Duration::from_secs(120));
    assert_eq!(cfg.creation_notice_target, Duration::from_secs(30));

    std::env::set_var("AQUA_MAX_ID_ATTEMPTS", "muchos");
    assert!(matches!(WorkflowConfig::from_env(), Err(WorkflowError::Validation(_))));
    std::env::remove_var("AQUA_MAX_ID_ATTEMPTS");
    std::env::remove_var("AQUA_NOTIFY_TIMEOUT_SECS");
    std::env::remove_var("AQUA_CREATION_NOTICE_SECS");
  }
}
