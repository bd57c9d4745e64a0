use crate::domain_repository::{ChangeSet, DomainRepository, InMemoryDomainRepository};
use crate::{DomainError, FailureKind, FailureReport, FlowRequest, RecordId, RequestKind};
use aqua_providers::{Capability, InMemoryDistrict, LotId, UserId};
use chrono::Utc;

/// Datos de ejemplo compartidos por pruebas, demos y la consola.
pub struct DomainStubs;

impl DomainStubs {
  pub const OWNER: &'static str = "1001";
  pub const NEIGHBOUR: &'static str = "1002";
  pub const TECHNICIAN: &'static str = "2002";
  pub const SECOND_TECHNICIAN: &'static str = "2003";
  pub const ADMIN: &'static str = "9001";
  /// Lote con válvula activa a 4 L/s.
  pub const ACTIVE_LOT: &'static str = "L1";
  /// Lote con válvula cerrada (caudal 0).
  pub const IDLE_LOT: &'static str = "L2";
  /// Lote sin válvula.
  pub const BARE_LOT: &'static str = "L3";

  /// Distrito en memoria con un dueño, un vecino, dos técnicos y un
  /// administrador que además puede asignar.
  pub fn sample_district() -> InMemoryDistrict {
    let district = InMemoryDistrict::new();
    let owner = UserId::new(Self::OWNER);
    let neighbour = UserId::new(Self::NEIGHBOUR);
    let tech = UserId::new(Self::TECHNICIAN);
    let tech2 = UserId::new(Self::SECOND_TECHNICIAN);
    let admin = UserId::new(Self::ADMIN);

    district.add_user(&owner, "Ana Dueña");
    district.add_user(&neighbour, "Luis Vecino");
    district.add_user(&tech, "Tomás Técnico");
    district.add_user(&tech2, "Teresa Técnica");
    district.add_user(&admin, "Sara Supervisora");
    district.grant(&tech, Capability::CanBeAssigned);
    district.grant(&tech2, Capability::CanBeAssigned);
    district.grant(&admin, Capability::Administrator);
    district.grant(&admin, Capability::CanAssign);

    district.add_lot(&LotId::new(Self::ACTIVE_LOT), &owner, Some(4.0));
    district.add_lot(&LotId::new(Self::IDLE_LOT), &owner, Some(0.0));
    district.add_lot_without_valve(&LotId::new(Self::BARE_LOT), &owner);
    district
  }

  /// Repositorio en memoria con una cancelación definitiva pendiente sobre
  /// el lote activo y un reporte de fallo del aplicativo.
  pub fn sample_repo() -> Result<InMemoryDomainRepository, DomainError> {
    let repo = InMemoryDomainRepository::new();
    let now = Utc::now();
    let request = FlowRequest::new(RecordId::new("10999001"),
                                   RequestKind::DefinitiveCancel,
                                   LotId::new(Self::ACTIVE_LOT),
                                   None,
                                   UserId::new(Self::OWNER),
                                   Some("venta del predio".to_string()),
                                   now)?;
    let report = FailureReport::new(RecordId::new("20999001"),
                                    FailureKind::Application,
                                    None,
                                    UserId::new(Self::OWNER),
                                    "la aplicación no muestra el consumo",
                                    now)?;
    repo.apply(ChangeSet::new().put_flow_request(request).put_failure_report(report))?;
    Ok(repo)
  }
}
