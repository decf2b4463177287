//! Rental ledger collaborator trait and in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use domain::{Page, PageRequest, Rental, RentalLookup, RentalProperties, RentalStatus, Uid};

use super::{Deferred, Fault, Journal, StatusChange};
use crate::error::{Service, ServiceError};

/// Operations the coordinator needs from the rental ledger.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Lists the rentals of one owner.
    async fn list_rentals(&self, owner: &str, page: PageRequest) -> Page<Rental>;

    /// Looks up a rental on behalf of `owner`.
    async fn get_rental(&self, uid: Uid, owner: &str) -> RentalLookup;

    async fn create_rental(&self, properties: RentalProperties) -> Result<Rental, ServiceError>;

    async fn set_rental_status(
        &self,
        uid: Uid,
        status: RentalStatus,
    ) -> Result<StatusChange, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[derive(Default)]
struct InMemoryLedgerState {
    rentals: BTreeMap<Uid, Rental>,
    fail_on_create: Option<Fault>,
    fail_on_status: Option<Fault>,
    degraded: bool,
    deferred: Vec<Deferred<InMemoryLedgerState>>,
}

/// In-memory rental ledger for testing.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
    journal: Journal,
}

impl InMemoryLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every write into the given journal.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryLedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, rental: Rental) {
        self.state().rentals.insert(rental.uid, rental);
    }

    pub fn rental(&self, uid: Uid) -> Option<Rental> {
        self.state().rentals.get(&uid).cloned()
    }

    pub fn rental_count(&self) -> usize {
        self.state().rentals.len()
    }

    pub fn set_fail_on_create(&self, fault: Option<Fault>) {
        self.state().fail_on_create = fault;
    }

    pub fn set_fail_on_status(&self, fault: Option<Fault>) {
        self.state().fail_on_status = fault;
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
}

fn set_status(state: &mut InMemoryLedgerState, uid: Uid, status: RentalStatus) -> bool {
    match state.rentals.get_mut(&uid) {
        Some(rental) => {
            rental.properties.status = status;
            true
        }
        None => false,
    }
}

#[async_trait]
impl LedgerApi for InMemoryLedger {
    async fn list_rentals(&self, owner: &str, page: PageRequest) -> Page<Rental> {
        let state = self.state();
        if state.degraded {
            return Page::empty();
        }

        let owned: Vec<&Rental> = state
            .rentals
            .values()
            .filter(|r| r.belongs_to(owner))
            .collect();
        let total_count = owned.len() as u64;
        let items = owned
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Page::new(items, total_count)
    }

    async fn get_rental(&self, uid: Uid, owner: &str) -> RentalLookup {
        let state = self.state();
        if state.degraded {
            return RentalLookup::Degraded(Rental::placeholder(uid, owner));
        }
        match state.rentals.get(&uid) {
            None => RentalLookup::Missing,
            Some(rental) if !rental.belongs_to(owner) => RentalLookup::Forbidden,
            Some(rental) => RentalLookup::Found(rental.clone()),
        }
    }

    async fn create_rental(&self, properties: RentalProperties) -> Result<Rental, ServiceError> {
        self.journal.record("ledger.create");
        let mut state = self.state();

        let rental = Rental {
            uid: Uid::new(),
            properties,
        };

        match state.fail_on_create {
            Some(Fault::Unreachable) => {
                state.deferred.push(Box::new(move |s: &mut InMemoryLedgerState| {
                    s.rentals.insert(rental.uid, rental);
                }));
                return Err(Fault::Unreachable.error(Service::Ledger));
            }
            Some(fault) => return Err(fault.error(Service::Ledger)),
            None => {}
        }

        state.rentals.insert(rental.uid, rental.clone());
        Ok(rental)
    }

    async fn set_rental_status(
        &self,
        uid: Uid,
        status: RentalStatus,
    ) -> Result<StatusChange, ServiceError> {
        self.journal.record(format!("ledger.set_status {status}"));
        let mut state = self.state();

        match state.fail_on_status {
            Some(Fault::Unreachable) => {
                state.deferred.push(Box::new(move |s: &mut InMemoryLedgerState| {
                    set_status(s, uid, status);
                }));
                return Ok(StatusChange::Queued);
            }
            Some(fault) => return Err(fault.error(Service::Ledger)),
            None => {}
        }

        if set_status(&mut state, uid, status) {
            Ok(StatusChange::Applied)
        } else {
            Ok(StatusChange::NotFound)
        }
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        if self.state().degraded {
            return Err(Fault::Unreachable.error(Service::Ledger));
        }
        Ok(())
    }
}
