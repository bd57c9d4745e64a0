// Archivo: in_memory.rs
// Propósito: distrito en memoria que implementa los tres contratos
// externos. No es durable; se usa en pruebas, ejemplos y en la consola.
use crate::capability::Capability;
use crate::errors::ProviderError;
use crate::ids::{LotId, UserId};
use crate::registry::{CapabilityOracle, LotOwnership, ValveRegistry};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct LotEntry {
    owner: UserId,
    active: bool,
    /// `None` cuando el lote no tiene válvula de 4".
    valve: Option<ValveEntry>,
}

#[derive(Debug, Clone)]
struct ValveEntry {
    current_flow: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct UserEntry {
    name: String,
    capabilities: HashSet<Capability>,
}

/// Distrito de riego en memoria.
pub struct InMemoryDistrict {
    lots: Mutex<HashMap<LotId, LotEntry>>,
    users: Mutex<HashMap<UserId, UserEntry>>,
    /// Simula la caída del gateway de válvulas.
    valves_offline: AtomicBool,
}

impl InMemoryDistrict {
    pub fn new() -> Self {
        Self { lots: Mutex::new(HashMap::new()),
               users: Mutex::new(HashMap::new()),
               valves_offline: AtomicBool::new(false) }
    }

    fn lock<'a, T>(&'a self, m: &'a Mutex<T>) -> Result<MutexGuard<'a, T>, ProviderError> {
        m.lock().map_err(|e| ProviderError::Unavailable(format!("mutex poisoned: {:?}", e)))
    }

    /// Registra un usuario con su nombre visible.
    pub fn add_user(&self, user: &UserId, name: &str) {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users.entry(user.clone()).or_default().name = name.to_string();
    }

    /// Otorga una capacidad a un usuario (lo registra si no existe).
    pub fn grant(&self, user: &UserId, capability: Capability) {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users.entry(user.clone()).or_default().capabilities.insert(capability);
    }

    /// Registra un lote habilitado con válvula y caudal inicial.
    pub fn add_lot(&self, lot: &LotId, owner: &UserId, current_flow: Option<f64>) {
        let entry = LotEntry { owner: owner.clone(),
                               active: true,
                               valve: Some(ValveEntry { current_flow }) };
        self.lots.lock().unwrap_or_else(|e| e.into_inner()).insert(lot.clone(), entry);
    }

    /// Registra un lote sin válvula asociada.
    pub fn add_lot_without_valve(&self, lot: &LotId, owner: &UserId) {
        let entry = LotEntry { owner: owner.clone(), active: true, valve: None };
        self.lots.lock().unwrap_or_else(|e| e.into_inner()).insert(lot.clone(), entry);
    }

    /// Cambia el estado habilitado de un lote existente.
    pub fn set_lot_active(&self, lot: &LotId, active: bool) {
        if let Some(entry) = self.lots.lock().unwrap_or_else(|e| e.into_inner()).get_mut(lot) {
            entry.active = active;
        }
    }

    /// Activa o desactiva la simulación de caída del gateway de válvulas.
    pub fn set_valves_offline(&self, offline: bool) {
        self.valves_offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), ProviderError> {
        if self.valves_offline.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("gateway de válvulas fuera de línea".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryDistrict {
    fn default() -> Self {
        Self::new()
    }
}

impl LotOwnership for InMemoryDistrict {
    fn resolve_owner(&self, lot: &LotId) -> Result<UserId, ProviderError> {
        let lots = self.lock(&self.lots)?;
        lots.get(lot)
            .map(|l| l.owner.clone())
            .ok_or_else(|| ProviderError::UnknownLot(lot.to_string()))
    }

    fn is_active(&self, lot: &LotId) -> Result<bool, ProviderError> {
        let lots = self.lock(&self.lots)?;
        lots.get(lot)
            .map(|l| l.active)
            .ok_or_else(|| ProviderError::UnknownLot(lot.to_string()))
    }
}

impl ValveRegistry for InMemoryDistrict {
    fn has_valve(&self, lot: &LotId) -> Result<bool, ProviderError> {
        let lots = self.lock(&self.lots)?;
        lots.get(lot)
            .map(|l| l.valve.is_some())
            .ok_or_else(|| ProviderError::UnknownLot(lot.to_string()))
    }

    fn get_current_flow(&self, lot: &LotId) -> Result<Option<f64>, ProviderError> {
        self.ensure_online()?;
        let lots = self.lock(&self.lots)?;
        let entry = lots.get(lot).ok_or_else(|| ProviderError::UnknownLot(lot.to_string()))?;
        Ok(entry.valve.as_ref().and_then(|v| v.current_flow))
    }

    fn set_current_flow(&self, lot: &LotId, flow: f64) -> Result<(), ProviderError> {
        self.ensure_online()?;
        let mut lots = self.lock(&self.lots)?;
        let entry = lots.get_mut(lot).ok_or_else(|| ProviderError::UnknownLot(lot.to_string()))?;
        match entry.valve.as_mut() {
            Some(valve) => {
                valve.current_flow = Some(flow);
                Ok(())
            }
            None => Err(ProviderError::Unavailable(format!("el lote {} no tiene válvula", lot))),
        }
    }

    fn deactivate_lot(&self, lot: &LotId) -> Result<(), ProviderError> {
        self.ensure_online()?;
        let mut lots = self.lock(&self.lots)?;
        let entry = lots.get_mut(lot).ok_or_else(|| ProviderError::UnknownLot(lot.to_string()))?;
        entry.active = false;
        Ok(())
    }
}

impl CapabilityOracle for InMemoryDistrict {
    fn has(&self, user: &UserId, capability: Capability) -> bool {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users.get(user).map(|u| u.capabilities.contains(&capability)).unwrap_or(false)
    }

    fn display_name(&self, user: &UserId) -> String {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        match users.get(user) {
            Some(u) if !u.name.is_empty() => u.name.clone(),
            _ => user.to_string(),
        }
    }
}
