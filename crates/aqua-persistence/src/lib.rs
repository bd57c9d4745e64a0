//! Persistencia Diesel del flujo de solicitudes de caudal.
//! Expone el módulo `schema` y los repositorios que implementan
//! `DomainRepository` (entidades) y `EventRepository` (bitácora). Las
//! migraciones se embeben y se aplican al crear el pool.

mod connection;
mod domain_persistence;
mod event_persistence;
pub mod schema;

pub use connection::{build_pool, database_url_from_env, DbPool, DEFAULT_SQLITE_URL, MIGRATIONS};
pub use domain_persistence::{new_domain_from_env, DieselDomainRepository};
pub use event_persistence::{new_events_from_env, DieselEventRepository};
