// Archivo: connection.rs
// Propósito: selección de backend, pool r2d2 y migraciones embebidas.
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, info};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[cfg(feature = "pg")]
pub type DbConn = PgConnection;
#[cfg(not(feature = "pg"))]
pub type DbConn = SqliteConnection;
pub type DbPool = Pool<ConnectionManager<DbConn>>;
pub type PooledConn = PooledConnection<ConnectionManager<DbConn>>;

/// URL por defecto sin configuración: SQLite en memoria compartida.
pub const DEFAULT_SQLITE_URL: &str = "file:aquadb?mode=memory&cache=shared";

#[cfg(not(feature = "pg"))]
#[derive(Debug)]
struct SqlitePragmas;

#[cfg(not(feature = "pg"))]
impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
    diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(conn)
                                                    .map_err(diesel::r2d2::Error::QueryError)?;
    Ok(())
  }
}

/// Crea el pool y aplica las migraciones pendientes.
pub fn build_pool(database_url: &str) -> Result<DbPool, String> {
  let manager = ConnectionManager::<DbConn>::new(database_url);
  let builder = Pool::builder().max_size(4);
  #[cfg(not(feature = "pg"))]
  let builder = builder.connection_customizer(Box::new(SqlitePragmas));
  let pool = builder.build(manager).map_err(|e| format!("no se pudo crear el pool de conexiones: {}", e))?;
  let mut pooled = pool.get().map_err(|e| format!("pool: {}", e))?;
  let conn: &mut DbConn = &mut pooled;
  #[cfg(not(feature = "pg"))]
  {
    let _ = diesel::sql_query("PRAGMA journal_mode = WAL;").execute(conn);
  }
  let applied = conn.run_pending_migrations(MIGRATIONS).map_err(|e| format!("migraciones: {}", e))?;
  debug!("migraciones aplicadas: {}", applied.len());
  info!("pool de persistencia listo");
  Ok(pool)
}

/// Lee `AQUA_DB_URL` (o `DATABASE_URL`) del entorno, cargando `.env`.
pub fn database_url_from_env() -> Result<String, String> {
  dotenvy::dotenv().ok();
  let url = std::env::var("AQUA_DB_URL").or_else(|_| std::env::var("DATABASE_URL"));
  if cfg!(feature = "pg") {
    let url = url.map_err(|_| "AQUA_DB_URL / DATABASE_URL not set".to_string())?;
    let l = url.to_lowercase();
    if !(l.starts_with("postgres") || l.starts_with("postgresql://") || url.contains('@')) {
      return Err("AQUA_DB_URL / DATABASE_URL does not look like Postgres URL".into());
    }
    Ok(url)
  } else {
    Ok(url.unwrap_or_else(|_| DEFAULT_SQLITE_URL.to_string()))
  }
}
