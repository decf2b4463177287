//! Payment collaborator trait and in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use domain::{Lookup, Payment, PaymentStatus, Uid};

use super::{Deferred, Fault, Journal, StatusChange};
use crate::error::{Service, ServiceError};

/// Operations the coordinator needs from the payment collaborator.
#[async_trait]
pub trait PaymentApi: Send + Sync {
    /// Records a paid payment of `price`.
    async fn create_payment(&self, price: u64) -> Result<Payment, ServiceError>;

    async fn get_payment(&self, uid: Uid) -> Lookup<Payment>;

    async fn set_payment_status(
        &self,
        uid: Uid,
        status: PaymentStatus,
    ) -> Result<StatusChange, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[derive(Default)]
struct InMemoryPaymentState {
    payments: BTreeMap<Uid, Payment>,
    fail_on_create: Option<Fault>,
    fail_on_status: Option<Fault>,
    degraded: bool,
    deferred: Vec<Deferred<InMemoryPaymentState>>,
}

/// In-memory payment collaborator for testing.
#[derive(Clone, Default)]
pub struct InMemoryPayments {
    state: Arc<RwLock<InMemoryPaymentState>>,
    journal: Journal,
}

impl InMemoryPayments {
    /// Creates a new in-memory payment collaborator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every write into the given journal.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryPaymentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, payment: Payment) {
        self.state().payments.insert(payment.uid, payment);
    }

    pub fn payment(&self, uid: Uid) -> Option<Payment> {
        self.state().payments.get(&uid).cloned()
    }

    /// Returns the number of payments in the `PAID` state.
    pub fn paid_count(&self) -> usize {
        self.state()
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Paid)
            .count()
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

fn set_status(state: &mut InMemoryPaymentState, uid: Uid, status: PaymentStatus) -> bool {
    match state.payments.get_mut(&uid) {
        Some(payment) => {
            payment.status = status;
            true
        }
        None => false,
    }
}

#[async_trait]
impl PaymentApi for InMemoryPayments {
    async fn create_payment(&self, price: u64) -> Result<Payment, ServiceError> {
        self.journal.record(format!("payment.create {price}"));
        let mut state = self.state();

        let payment = Payment {
            uid: Uid::new(),
            status: PaymentStatus::Paid,
            price,
        };

        match state.fail_on_create {
            Some(Fault::Unreachable) => {
                state
                    .deferred
                    .push(Box::new(move |s: &mut InMemoryPaymentState| {
                        s.payments.insert(payment.uid, payment);
                    }));
                return Err(Fault::Unreachable.error(Service::Payment));
            }
            Some(fault) => return Err(fault.error(Service::Payment)),
            None => {}
        }

        state.payments.insert(payment.uid, payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, uid: Uid) -> Lookup<Payment> {
        let state = self.state();
        if state.degraded {
            return Lookup::Degraded(Payment::placeholder(uid));
        }
        match state.payments.get(&uid) {
            Some(payment) => Lookup::Found(payment.clone()),
            None => Lookup::Missing,
        }
    }

    async fn set_payment_status(
        &self,
        uid: Uid,
        status: PaymentStatus,
    ) -> Result<StatusChange, ServiceError> {
        self.journal.record(format!("payment.set_status {status}"));
        let mut state = self.state();

        match state.fail_on_status {
            Some(Fault::Unreachable) => {
                state
                    .deferred
                    .push(Box::new(move |s: &mut InMemoryPaymentState| {
                        set_status(s, uid, status);
                    }));
                return Ok(StatusChange::Queued);
            }
            Some(fault) => return Err(fault.error(Service::Payment)),
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
            return Err(Fault::Unreachable.error(Service::Payment));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_cancel() {
        let payments = InMemoryPayments::new();

        let payment = payments.create_payment(200).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.price, 200);
        assert_eq!(payments.paid_count(), 1);

        let change = payments
            .set_payment_status(payment.uid, PaymentStatus::Canceled)
            .await
            .unwrap();
        assert_eq!(change, StatusChange::Applied);
        assert_eq!(payments.paid_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_payment_status_change() {
        let payments = InMemoryPayments::new();
        let change = payments
            .set_payment_status(Uid::new(), PaymentStatus::Canceled)
            .await
            .unwrap();
        assert_eq!(change, StatusChange::NotFound);
    }

    #[tokio::test]
    async fn test_unreachable_create_is_deferred() {
        let payments = InMemoryPayments::new();
        payments.set_fail_on_create(Some(Fault::Unreachable));

        let err = payments.create_payment(100).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(payments.paid_count(), 0);

        assert_eq!(payments.replay_deferred(), 1);
        assert_eq!(payments.paid_count(), 1);
    }

    #[tokio::test]
    async fn test_journal_records_writes_in_order() {
        let journal = Journal::new();
        let payments = InMemoryPayments::new().with_journal(journal.clone());

        let payment = payments.create_payment(300).await.unwrap();
        payments
            .set_payment_status(payment.uid, PaymentStatus::Canceled)
            .await
            .unwrap();

        assert_eq!(
            journal.entries(),
            vec!["payment.create 300", "payment.set_status CANCELED"]
        );
    }
}
