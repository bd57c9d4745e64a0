//! Crate `aqua-providers`: contratos de los colaboradores externos
//!
//! El núcleo de solicitudes de caudal no es dueño de los lotes, de las
//! válvulas ni de los usuarios. Este crate define las interfaces mínimas
//! con las que el workflow los consulta y muta:
//! - `LotOwnership`: dueño y estado habilitado de un lote.
//! - `ValveRegistry`: caudal actual de la válvula del lote.
//! - `CapabilityOracle`: capacidades nombradas de un usuario.
//!
//! `InMemoryDistrict` implementa los tres contratos en memoria para pruebas
//! y demos.
mod capability;
mod errors;
mod ids;
mod in_memory;
mod registry;

pub use capability::Capability;
pub use errors::ProviderError;
pub use ids::{LotId, UserId};
pub use in_memory::InMemoryDistrict;
pub use registry::{CapabilityOracle, LotOwnership, ValveRegistry};
