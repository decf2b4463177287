//! Inventory collaborator trait and in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use domain::{Lookup, Page, PageRequest, Uid, Vehicle};

use super::{Deferred, Fault, Journal, LockOutcome, StatusChange};
use crate::error::{Service, ServiceError};

/// Operations the coordinator needs from the vehicle inventory.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Lists vehicles; unavailable ones only when `show_all` is set.
    async fn list_vehicles(&self, page: PageRequest, show_all: bool) -> Page<Vehicle>;

    async fn get_vehicle(&self, uid: Uid) -> Lookup<Vehicle>;

    /// Marks an available vehicle as taken.
    async fn lock_vehicle(&self, uid: Uid) -> Result<LockOutcome, ServiceError>;

    /// Makes a vehicle available again. Unlocking an available vehicle is a
    /// no-op, so the call is safe to repeat.
    async fn unlock_vehicle(&self, uid: Uid) -> Result<StatusChange, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[derive(Default)]
struct InMemoryInventoryState {
    vehicles: BTreeMap<Uid, Vehicle>,
    fail_on_lock: Option<Fault>,
    fail_on_unlock: Option<Fault>,
    degraded: bool,
    deferred: Vec<Deferred<InMemoryInventoryState>>,
}

/// In-memory inventory for testing.
#[derive(Clone, Default)]
pub struct InMemoryInventory {
    state: Arc<RwLock<InMemoryInventoryState>>,
    journal: Journal,
}

impl InMemoryInventory {
    /// Creates a new empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every call into the given journal.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryInventoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, vehicle: Vehicle) {
        self.state().vehicles.insert(vehicle.uid, vehicle);
    }

    pub fn vehicle(&self, uid: Uid) -> Option<Vehicle> {
        self.state().vehicles.get(&uid).cloned()
    }

    pub fn is_available(&self, uid: Uid) -> Option<bool> {
        self.vehicle(uid).map(|v| v.available)
    }

    pub fn set_fail_on_lock(&self, fault: Option<Fault>) {
        self.state().fail_on_lock = fault;
    }

    pub fn set_fail_on_unlock(&self, fault: Option<Fault>) {
        self.state().fail_on_unlock = fault;
    }

    /// Makes reads answer as if the read breaker were open.
    pub fn set_degraded(&self, degraded: bool) {
        self.state().degraded = degraded;
    }

    /// Applies writes that were deferred while unreachable, oldest first.
    pub fn replay_deferred(&self) -> usize {
        let mut state = self.state();
        let deferred = std::mem::take(&mut state.deferred);
        let count = deferred.len();
        for write in deferred {
            write(&mut state);
        }
        count
    }

    pub fn deferred_count(&self) -> usize {
        self.state().deferred.len()
    }
}

fn set_available(state: &mut InMemoryInventoryState, uid: Uid, available: bool) -> bool {
    match state.vehicles.get_mut(&uid) {
        Some(vehicle) => {
            vehicle.available = available;
            true
        }
        None => false,
    }
}

#[async_trait]
impl InventoryApi for InMemoryInventory {
    async fn list_vehicles(&self, page: PageRequest, show_all: bool) -> Page<Vehicle> {
        let state = self.state();
        if state.degraded {
            return Page::empty();
        }

        let matching: Vec<&Vehicle> = state
            .vehicles
            .values()
            .filter(|v| show_all || v.available)
            .collect();
        let total_count = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Page::new(items, total_count)
    }

    async fn get_vehicle(&self, uid: Uid) -> Lookup<Vehicle> {
        let state = self.state();
        if state.degraded {
            return Lookup::Degraded(Vehicle::placeholder(uid));
        }
        match state.vehicles.get(&uid) {
            Some(vehicle) => Lookup::Found(vehicle.clone()),
            None => Lookup::Missing,
        }
    }

    async fn lock_vehicle(&self, uid: Uid) -> Result<LockOutcome, ServiceError> {
        self.journal.record("inventory.lock");
        let mut state = self.state();

        match state.fail_on_lock {
            Some(Fault::Unreachable) => {
                state
                    .deferred
                    .push(Box::new(move |s: &mut InMemoryInventoryState| {
                        set_available(s, uid, false);
                    }));
                return Err(Fault::Unreachable.error(Service::Inventory));
            }
            Some(fault) => return Err(fault.error(Service::Inventory)),
            None => {}
        }

        match state.vehicles.get_mut(&uid) {
            None => Ok(LockOutcome::NotFound),
            Some(vehicle) if !vehicle.available => Ok(LockOutcome::AlreadyLocked),
            Some(vehicle) => {
                vehicle.available = false;
                Ok(LockOutcome::Locked(vehicle.clone()))
            }
        }
    }

    async fn unlock_vehicle(&self, uid: Uid) -> Result<StatusChange, ServiceError> {
        self.journal.record("inventory.unlock");
        let mut state = self.state();

        match state.fail_on_unlock {
            Some(Fault::Unreachable) => {
                state.deferred.push(Box::new(move |s: &mut InMemoryInventoryState| {
                    set_available(s, uid, true);
                }));
                return Err(Fault::Unreachable.error(Service::Inventory));
            }
            Some(fault) => return Err(fault.error(Service::Inventory)),
            None => {}
        }

        if set_available(&mut state, uid, true) {
            Ok(StatusChange::Applied)
        } else {
            Ok(StatusChange::NotFound)
        }
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        if self.state().degraded {
            return Err(Fault::Unreachable.error(Service::Inventory));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::VehicleType;

    use super::*;

    fn vehicle(price: u64, available: bool) -> Vehicle {
        Vehicle {
            uid: Uid::new(),
            brand: "Mercedes Benz".to_string(),
            model: "GLA 250".to_string(),
            registration_number: "ЛО777Х799".to_string(),
            power: 249,
            price,
            vehicle_type: VehicleType::Sedan,
            available,
        }
    }

    #[tokio::test]
    async fn test_lock_and_unlock() {
        let inventory = InMemoryInventory::new();
        let car = vehicle(3500, true);
        inventory.insert(car.clone());

        let outcome = inventory.lock_vehicle(car.uid).await.unwrap();
        assert!(matches!(outcome, LockOutcome::Locked(v) if !v.available));
        assert_eq!(inventory.is_available(car.uid), Some(false));

        let again = inventory.lock_vehicle(car.uid).await.unwrap();
        assert_eq!(again, LockOutcome::AlreadyLocked);

        let unlocked = inventory.unlock_vehicle(car.uid).await.unwrap();
        assert_eq!(unlocked, StatusChange::Applied);
        assert_eq!(inventory.is_available(car.uid), Some(true));
    }

    #[tokio::test]
    async fn test_missing_vehicle() {
        let inventory = InMemoryInventory::new();
        let uid = Uid::new();

        assert_eq!(inventory.lock_vehicle(uid).await.unwrap(), LockOutcome::NotFound);
        assert_eq!(inventory.unlock_vehicle(uid).await.unwrap(), StatusChange::NotFound);
        assert_eq!(inventory.get_vehicle(uid).await, Lookup::Missing);
    }

    #[tokio::test]
    async fn test_list_hides_unavailable_unless_asked() {
        let inventory = InMemoryInventory::new();
        inventory.insert(vehicle(100, true));
        inventory.insert(vehicle(200, false));

        let available = inventory.list_vehicles(PageRequest::all(), false).await;
        assert_eq!(available.total_count, 1);

        let all = inventory.list_vehicles(PageRequest::all(), true).await;
        assert_eq!(all.total_count, 2);

        let second = inventory
            .list_vehicles(PageRequest::new(2, 1).unwrap(), true)
            .await;
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.total_count, 2);
    }

    #[tokio::test]
    async fn test_unreachable_unlock_is_deferred() {
        let inventory = InMemoryInventory::new();
        let car = vehicle(100, false);
        inventory.insert(car.clone());
        inventory.set_fail_on_unlock(Some(Fault::Unreachable));

        let err = inventory.unlock_vehicle(car.uid).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(inventory.is_available(car.uid), Some(false));

        assert_eq!(inventory.replay_deferred(), 1);
        assert_eq!(inventory.is_available(car.uid), Some(true));
    }

    #[tokio::test]
    async fn test_degraded_reads() {
        let inventory = InMemoryInventory::new();
        let car = vehicle(100, true);
        inventory.insert(car.clone());
        inventory.set_degraded(true);

        assert!(inventory.list_vehicles(PageRequest::all(), true).await.is_empty());
        let lookup = inventory.get_vehicle(car.uid).await;
        assert_eq!(lookup, Lookup::Degraded(Vehicle::placeholder(car.uid)));
    }
}
