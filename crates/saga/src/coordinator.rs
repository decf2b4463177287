//! Rental coordinator: sequences collaborator calls and compensates partial
//! failures.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domain::{
    Page, PageRequest, Payment, PaymentStatus, Rental, RentalLookup, RentalPeriod,
    RentalProperties, RentalStatus, Uid, Vehicle,
};
use tokio::time::Instant;

use crate::compensation::Compensations;
use crate::error::{Result, SagaError, ServiceError};
use crate::services::{InventoryApi, LedgerApi, LockOutcome, PaymentApi, StatusChange};
use crate::steps;

/// Default bound on the forward steps of one saga.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Input of the StartRental saga, as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRental {
    pub vehicle_uid: Uid,
    pub date_from: String,
    pub date_to: String,
}

/// A booked rental together with the payment that covers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedRental {
    pub rental: Rental,
    pub payment: Payment,
}

/// A rental enriched with its vehicle and payment.
///
/// Either may be a placeholder when its collaborator could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalDetails {
    pub rental: Rental,
    pub vehicle: Vehicle,
    pub payment: Payment,
}

/// Orchestrates the rental sagas across the inventory, ledger, and payment
/// collaborators.
///
/// Steps of one saga run strictly in sequence. When a step fails after
/// earlier steps took effect, the earlier steps are compensated in reverse
/// order and every compensation failure is reported with the original error.
/// Forward steps share one deadline; compensations are not bound by it.
#[derive(Clone)]
pub struct RentalCoordinator {
    inventory: Arc<dyn InventoryApi>,
    ledger: Arc<dyn LedgerApi>,
    payments: Arc<dyn PaymentApi>,
    request_timeout: Duration,
}

impl RentalCoordinator {
    /// Creates a new rental coordinator.
    pub fn new(
        inventory: Arc<dyn InventoryApi>,
        ledger: Arc<dyn LedgerApi>,
        payments: Arc<dyn PaymentApi>,
    ) -> Self {
        Self {
            inventory,
            ledger,
            payments,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Lists vehicles. A failing inventory yields an empty page.
    pub async fn list_vehicles(&self, page: PageRequest, show_all: bool) -> Page<Vehicle> {
        self.inventory.list_vehicles(page, show_all).await
    }

    /// Lists the caller's rentals with their vehicles and payments.
    #[tracing::instrument(skip(self))]
    pub async fn list_rentals(&self, owner: &str, page: PageRequest) -> Result<Page<RentalDetails>> {
        let rentals = self.ledger.list_rentals(owner, page).await;

        let mut items = Vec::with_capacity(rentals.items.len());
        for rental in rentals.items {
            items.push(self.enrich(rental).await?);
        }

        Ok(Page::new(items, rentals.total_count))
    }

    /// Fetches one of the caller's rentals with its vehicle and payment.
    #[tracing::instrument(skip(self))]
    pub async fn get_rental(&self, uid: Uid, owner: &str) -> Result<RentalDetails> {
        let rental = owned_rental(uid, self.ledger.get_rental(uid, owner).await)?;
        self.enrich(rental).await
    }

    /// Books a vehicle: lock it, charge the price, record the rental.
    #[tracing::instrument(skip(self, request), fields(saga = steps::SAGA_START_RENTAL, vehicle_uid = %request.vehicle_uid))]
    pub async fn start_rental(&self, owner: &str, request: StartRental) -> Result<StartedRental> {
        instrumented(steps::SAGA_START_RENTAL, self.run_start_rental(owner, request)).await
    }

    /// Cancels a rental: release the vehicle, cancel the rental, cancel the
    /// payment.
    #[tracing::instrument(skip(self), fields(saga = steps::SAGA_CANCEL_RENTAL))]
    pub async fn cancel_rental(&self, uid: Uid, owner: &str) -> Result<()> {
        instrumented(steps::SAGA_CANCEL_RENTAL, self.run_cancel_rental(uid, owner)).await
    }

    /// Finishes a rental: release the vehicle and mark the rental finished.
    /// Nothing is rolled back on failure.
    #[tracing::instrument(skip(self), fields(saga = steps::SAGA_FINISH_RENTAL))]
    pub async fn finish_rental(&self, uid: Uid, owner: &str) -> Result<()> {
        instrumented(steps::SAGA_FINISH_RENTAL, self.run_finish_rental(uid, owner)).await
    }

    /// Checks every collaborator and returns all failures.
    pub async fn health_check(&self) -> std::result::Result<(), Vec<ServiceError>> {
        let failures: Vec<ServiceError> = [
            self.inventory.health_check().await,
            self.ledger.health_check().await,
            self.payments.health_check().await,
        ]
        .into_iter()
        .filter_map(std::result::Result::err)
        .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    async fn run_start_rental(&self, owner: &str, request: StartRental) -> Result<StartedRental> {
        let period = RentalPeriod::parse(&request.date_from, &request.date_to)?;
        let vehicle_uid = request.vehicle_uid;
        let deadline = Instant::now() + self.request_timeout;

        // 1. Lock the vehicle
        let vehicle = match step(
            deadline,
            steps::STEP_LOCK_VEHICLE,
            self.inventory.lock_vehicle(vehicle_uid),
        )
        .await?
        {
            LockOutcome::Locked(vehicle) => vehicle,
            LockOutcome::NotFound => return Err(SagaError::VehicleNotFound(vehicle_uid)),
            LockOutcome::AlreadyLocked => {
                return Err(SagaError::VehicleAlreadyRented(vehicle_uid));
            }
        };

        let mut compensations = Compensations::new();
        compensations.push(steps::STEP_LOCK_VEHICLE, self.release_vehicle(vehicle_uid));

        // 2. Charge the price
        let price = match period.price(vehicle.price) {
            Ok(price) => price,
            Err(e) => return Err(compensations.rollback(e.into()).await),
        };

        let payment = match step(
            deadline,
            steps::STEP_CREATE_PAYMENT,
            self.payments.create_payment(price),
        )
        .await
        {
            Ok(payment) => payment,
            Err(e) => return Err(compensations.rollback(e).await),
        };

        let payment_uid = payment.uid;
        compensations.push(
            steps::STEP_CREATE_PAYMENT,
            self.set_payment(payment_uid, PaymentStatus::Canceled),
        );

        // 3. Record the rental
        let properties = RentalProperties {
            owner: owner.to_string(),
            payment_uid,
            vehicle_uid,
            period,
            status: RentalStatus::InProgress,
        };

        let rental = match step(
            deadline,
            steps::STEP_CREATE_RENTAL,
            self.ledger.create_rental(properties),
        )
        .await
        {
            Ok(rental) => rental,
            Err(e) => return Err(compensations.rollback(e).await),
        };

        tracing::info!(rental_uid = %rental.uid, %payment_uid, price, "rental started");
        Ok(StartedRental { rental, payment })
    }

    async fn run_cancel_rental(&self, uid: Uid, owner: &str) -> Result<()> {
        let deadline = Instant::now() + self.request_timeout;

        // 1. Check ownership
        let rental = self.lookup_owned(deadline, uid, owner).await?;
        let vehicle_uid = rental.properties.vehicle_uid;
        let payment_uid = rental.properties.payment_uid;

        // 2. Release the vehicle. Not undone if a later step fails.
        self.unlock(deadline, vehicle_uid).await?;

        // 3. Cancel the rental
        let change = step(
            deadline,
            steps::STEP_CANCEL_RENTAL,
            self.ledger.set_rental_status(uid, RentalStatus::Canceled),
        )
        .await?;
        if change == StatusChange::NotFound {
            return Err(SagaError::RentalNotFound(uid));
        }

        let mut compensations = Compensations::new();
        compensations.push(
            steps::STEP_CANCEL_RENTAL,
            self.set_rental(uid, RentalStatus::InProgress),
        );

        // 4. Cancel the payment
        let cancel_payment = step(
            deadline,
            steps::STEP_CANCEL_PAYMENT,
            self.payments
                .set_payment_status(payment_uid, PaymentStatus::Canceled),
        )
        .await;

        match cancel_payment {
            Ok(StatusChange::NotFound) => Err(compensations
                .rollback(SagaError::PaymentNotFound(payment_uid))
                .await),
            Ok(_) => {
                tracing::info!(rental_uid = %uid, "rental canceled");
                Ok(())
            }
            Err(e) => Err(compensations.rollback(e).await),
        }
    }

    async fn run_finish_rental(&self, uid: Uid, owner: &str) -> Result<()> {
        let deadline = Instant::now() + self.request_timeout;

        let rental = self.lookup_owned(deadline, uid, owner).await?;

        self.unlock(deadline, rental.properties.vehicle_uid).await?;

        let change = step(
            deadline,
            steps::STEP_FINISH_RENTAL,
            self.ledger.set_rental_status(uid, RentalStatus::Finished),
        )
        .await?;
        if change == StatusChange::NotFound {
            return Err(SagaError::RentalNotFound(uid));
        }

        tracing::info!(rental_uid = %uid, "rental finished");
        Ok(())
    }

    async fn lookup_owned(&self, deadline: Instant, uid: Uid, owner: &str) -> Result<Rental> {
        let lookup = step(deadline, steps::STEP_LOOKUP_RENTAL, async {
            Ok(self.ledger.get_rental(uid, owner).await)
        })
        .await?;
        owned_rental(uid, lookup)
    }

    async fn unlock(&self, deadline: Instant, vehicle_uid: Uid) -> Result<()> {
        let change = step(
            deadline,
            steps::STEP_UNLOCK_VEHICLE,
            self.inventory.unlock_vehicle(vehicle_uid),
        )
        .await?;
        if change == StatusChange::NotFound {
            return Err(SagaError::VehicleNotFound(vehicle_uid));
        }
        Ok(())
    }

    async fn enrich(&self, rental: Rental) -> Result<RentalDetails> {
        let vehicle_uid = rental.properties.vehicle_uid;
        let payment_uid = rental.properties.payment_uid;

        let vehicle = self
            .inventory
            .get_vehicle(vehicle_uid)
            .await
            .into_option()
            .ok_or(SagaError::VehicleNotFound(vehicle_uid))?;
        let payment = self
            .payments
            .get_payment(payment_uid)
            .await
            .into_option()
            .ok_or(SagaError::PaymentNotFound(payment_uid))?;

        Ok(RentalDetails {
            rental,
            vehicle,
            payment,
        })
    }

    fn release_vehicle(
        &self,
        vehicle_uid: Uid,
    ) -> impl Future<Output = std::result::Result<(), ServiceError>> + Send + '_ {
        async move {
            if self.inventory.unlock_vehicle(vehicle_uid).await? == StatusChange::NotFound {
                tracing::warn!(%vehicle_uid, "vehicle vanished before it could be released");
            }
            Ok(())
        }
    }

    fn set_payment(
        &self,
        payment_uid: Uid,
        status: PaymentStatus,
    ) -> impl Future<Output = std::result::Result<(), ServiceError>> + Send + '_ {
        async move {
            if self.payments.set_payment_status(payment_uid, status).await?
                == StatusChange::NotFound
            {
                tracing::warn!(%payment_uid, %status, "payment vanished before its status could be reset");
            }
            Ok(())
        }
    }

    fn set_rental(
        &self,
        rental_uid: Uid,
        status: RentalStatus,
    ) -> impl Future<Output = std::result::Result<(), ServiceError>> + Send + '_ {
        async move {
            if self.ledger.set_rental_status(rental_uid, status).await? == StatusChange::NotFound {
                tracing::warn!(%rental_uid, %status, "rental vanished before its status could be reset");
            }
            Ok(())
        }
    }
}

/// A rental lookup that cannot prove ownership is treated as forbidden.
fn owned_rental(uid: Uid, lookup: RentalLookup) -> Result<Rental> {
    match lookup {
        RentalLookup::Found(rental) => Ok(rental),
        RentalLookup::Missing => Err(SagaError::RentalNotFound(uid)),
        RentalLookup::Forbidden | RentalLookup::Degraded(_) => {
            Err(SagaError::RentalNotPermitted(uid))
        }
    }
}

/// Runs one forward step against the saga deadline.
async fn step<T, F>(deadline: Instant, name: &'static str, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, ServiceError>>,
{
    tracing::debug!(step = name, "saga step started");
    match tokio::time::timeout_at(deadline, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(SagaError::StepFailed { step: name, source }),
        Err(_) => Err(SagaError::DeadlineExceeded { step: name }),
    }
}

async fn instrumented<T>(saga: &'static str, run: impl Future<Output = Result<T>>) -> Result<T> {
    metrics::counter!("saga_executions_total", "saga" => saga).increment(1);
    let started = std::time::Instant::now();

    let result = run.await;

    let duration = started.elapsed().as_secs_f64();
    metrics::histogram!("saga_duration_seconds", "saga" => saga).record(duration);
    match &result {
        Ok(_) => tracing::info!(saga, duration, "saga completed successfully"),
        Err(e) => {
            metrics::counter!("saga_failed_total", "saga" => saga).increment(1);
            tracing::warn!(saga, duration, error = %e, "saga failed");
        }
    }

    result
}
