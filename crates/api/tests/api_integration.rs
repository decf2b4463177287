//! Integration tests for the gateway over in-memory collaborators.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use backlog::{BacklogProducer, InMemoryTransport, RetryQueue};
use domain::{PaymentStatus, RentalStatus, Uid, Vehicle, VehicleType};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{Fault, InMemoryInventory, InMemoryLedger, InMemoryPayments, RentalCoordinator};
use serde_json::{Value, json};
use tower::ServiceExt;

const OWNER: &str = "Test Max";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    inventory: InMemoryInventory,
    ledger: InMemoryLedger,
    payments: InMemoryPayments,
    transport: InMemoryTransport,
    available: Uid,
    rented: Uid,
}

fn vehicle(uid: Uid, price: u64, available: bool) -> Vehicle {
    Vehicle {
        uid,
        brand: "Mercedes Benz".to_string(),
        model: "GLA 250".to_string(),
        registration_number: "ЛО777Х799".to_string(),
        power: 249,
        price,
        vehicle_type: VehicleType::Sedan,
        available,
    }
}

fn setup() -> TestApp {
    setup_with_backlog(InMemoryTransport::new())
}

fn setup_with_backlog(transport: InMemoryTransport) -> TestApp {
    let inventory = InMemoryInventory::new();
    let ledger = InMemoryLedger::new();
    let payments = InMemoryPayments::new();

    let (available, rented) = (Uid::new(), Uid::new());
    inventory.insert(vehicle(available, 3500, true));
    inventory.insert(vehicle(rented, 1000, false));

    let coordinator = RentalCoordinator::new(
        Arc::new(inventory.clone()),
        Arc::new(ledger.clone()),
        Arc::new(payments.clone()),
    );
    let backlog: Arc<dyn RetryQueue> = Arc::new(BacklogProducer::new(transport.clone()));
    let app = api::create_app(api::AppState::new(coordinator, backlog), get_metrics_handle());

    TestApp {
        app,
        inventory,
        ledger,
        payments,
        transport,
        available,
        rented,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .header("x-user-name", OWNER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn start(&self, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/rental")
                .header("content-type", "application/json")
                .header("x-user-name", OWNER)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn start_available(&self) -> Uid {
        let (status, json) = self
            .start(json!({
                "vehicleUid": self.available.to_string(),
                "dateFrom": "2021-10-08",
                "dateTo": "2021-10-11",
            }))
            .await;
        assert_eq!(status, StatusCode::OK);
        json["rentalUid"].as_str().unwrap().parse().unwrap()
    }

    async fn command(&self, method: &str, uri: &str, user: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("x-user-name", user)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

// -- Health & metrics --

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = app.get("/manage/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_health_check_reports_each_failure() {
    let app = setup();
    app.ledger.set_degraded(true);

    let (status, json) = app.get("/manage/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "unavailable");
    let errors = json["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().starts_with("ledger"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

// -- Vehicles --

#[tokio::test]
async fn test_list_vehicles_hides_unavailable_by_default() {
    let app = setup();

    let (status, json) = app.get("/api/v1/vehicles?page=1&size=10").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["page"], 1);
    assert_eq!(json["pageSize"], 10);
    assert_eq!(json["totalElements"], 1);
    assert_eq!(json["items"][0]["vehicleUid"], app.available.to_string());
    assert_eq!(json["items"][0]["type"], "SEDAN");
    assert_eq!(json["items"][0]["available"], true);
}

#[tokio::test]
async fn test_list_vehicles_show_all_without_paging() {
    let app = setup();

    let (status, json) = app.get("/api/v1/vehicles?showAll=true").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["page"], 1);
    assert_eq!(json["pageSize"], 2);
    assert_eq!(json["totalElements"], 2);
}

#[tokio::test]
async fn test_list_vehicles_reports_explicit_size_even_when_huge() {
    let app = setup();

    let (status, json) = app
        .get(&format!("/api/v1/vehicles?page=1&size={}", u64::MAX))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pageSize"], u64::MAX);
    assert_eq!(json["totalElements"], 1);
}

#[tokio::test]
async fn test_list_vehicles_rejects_page_zero() {
    let app = setup();

    let (status, json) = app.get("/api/v1/vehicles?page=0&size=10").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "page number must be >= 1");
}

#[tokio::test]
async fn test_degraded_inventory_lists_nothing() {
    let app = setup();
    app.inventory.set_degraded(true);

    let (status, json) = app.get("/api/v1/vehicles").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalElements"], 0);
    assert!(json["items"].as_array().unwrap().is_empty());
}

// -- Start rental --

#[tokio::test]
async fn test_start_rental() {
    let app = setup();

    let (status, json) = app
        .start(json!({
            "vehicleUid": app.available.to_string(),
            "dateFrom": "2021-10-08",
            "dateTo": "2021-10-11",
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "IN_PROGRESS");
    assert_eq!(json["vehicleUid"], app.available.to_string());
    assert_eq!(json["dateFrom"], "2021-10-08");
    assert_eq!(json["dateTo"], "2021-10-11");
    assert_eq!(json["payment"]["status"], "PAID");
    assert_eq!(json["payment"]["price"], 10500);
    assert_eq!(app.inventory.is_available(app.available), Some(false));
    assert_eq!(app.ledger.rental_count(), 1);
}

#[tokio::test]
async fn test_start_rental_validation_is_unprocessable() {
    let app = setup();
    let vehicle = app.available.to_string();

    let cases = [
        json!({ "vehicleUid": vehicle, "dateFrom": "2021-10-11", "dateTo": "2021-10-08" }),
        json!({ "vehicleUid": vehicle, "dateFrom": "2021-10-08", "dateTo": "2021-10-08" }),
        json!({ "vehicleUid": vehicle, "dateFrom": "08.10.2021", "dateTo": "2021-10-11" }),
        json!({ "vehicleUid": "not-a-uid", "dateFrom": "2021-10-08", "dateTo": "2021-10-11" }),
        json!({ "vehicleUid": vehicle }),
    ];

    for body in cases {
        let (status, json) = app.start(body.clone()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body: {body}");
        assert!(json["message"].is_string());
    }

    assert_eq!(app.inventory.is_available(app.available), Some(true));
    assert_eq!(app.ledger.rental_count(), 0);
}

#[tokio::test]
async fn test_start_rental_unknown_and_taken_vehicles() {
    let app = setup();

    let (status, _) = app
        .start(json!({
            "vehicleUid": Uid::new().to_string(),
            "dateFrom": "2021-10-08",
            "dateTo": "2021-10-11",
        }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .start(json!({
            "vehicleUid": app.rented.to_string(),
            "dateFrom": "2021-10-08",
            "dateTo": "2021-10-11",
        }))
        .await;
    assert_eq!(status, StatusCode::LOCKED);
}

#[tokio::test]
async fn test_start_rental_with_payments_down_releases_vehicle() {
    let app = setup();
    app.payments.set_fail_on_create(Some(Fault::Unreachable));

    let (status, json) = app
        .start(json!({
            "vehicleUid": app.available.to_string(),
            "dateFrom": "2021-10-08",
            "dateTo": "2021-10-11",
        }))
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .contains("payment service unavailable")
    );
    assert_eq!(app.inventory.is_available(app.available), Some(true));
    assert_eq!(app.ledger.rental_count(), 0);
}

#[tokio::test]
async fn test_start_rental_rejected_by_ledger_is_internal_error() {
    let app = setup();
    app.ledger.set_fail_on_create(Some(Fault::Rejecting));

    let (status, _) = app
        .start(json!({
            "vehicleUid": app.available.to_string(),
            "dateFrom": "2021-10-08",
            "dateTo": "2021-10-11",
        }))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.inventory.is_available(app.available), Some(true));
    assert_eq!(app.payments.paid_count(), 0);
}

#[tokio::test]
async fn test_start_rental_requires_caller() {
    let app = setup();

    let (status, json) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/rental")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "vehicleUid": app.available.to_string(),
                        "dateFrom": "2021-10-08",
                        "dateTo": "2021-10-11",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "X-User-Name header is required");
}

// -- Rental reads --

#[tokio::test]
async fn test_get_rental_with_vehicle_and_payment() {
    let app = setup();
    let rental = app.start_available().await;

    let (status, json) = app.get(&format!("/api/v1/rental/{rental}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rentalUid"], rental.to_string());
    assert_eq!(json["status"], "IN_PROGRESS");
    assert_eq!(json["vehicle"]["vehicleUid"], app.available.to_string());
    assert_eq!(json["vehicle"]["brand"], "Mercedes Benz");
    assert_eq!(json["payment"]["price"], 10500);
}

#[tokio::test]
async fn test_get_rental_not_found_and_forbidden() {
    let app = setup();
    let rental = app.start_available().await;

    let (status, _) = app.get(&format!("/api/v1/rental/{}", Uid::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/v1/rental/not-a-uid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .command("GET", &format!("/api/v1/rental/{rental}"), "Someone Else")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_rentals_only_returns_callers() {
    let app = setup();
    let rental = app.start_available().await;

    let (status, json) = app.get("/api/v1/rental").await;
    assert_eq!(status, StatusCode::OK);
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["rentalUid"], rental.to_string());

    let (status, json) = app.command("GET", "/api/v1/rental", "Someone Else").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());
}

// -- Finish & cancel --

#[tokio::test]
async fn test_finish_rental() {
    let app = setup();
    let rental = app.start_available().await;

    let (status, _) = app
        .command("POST", &format!("/api/v1/rental/{rental}/finish"), OWNER)
        .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.ledger.rental(rental).unwrap().properties.status,
        RentalStatus::Finished
    );
    assert_eq!(app.inventory.is_available(app.available), Some(true));
}

#[tokio::test]
async fn test_cancel_rental() {
    let app = setup();
    let rental = app.start_available().await;
    let payment_uid = app.ledger.rental(rental).unwrap().properties.payment_uid;

    let (status, _) = app
        .command("DELETE", &format!("/api/v1/rental/{rental}"), OWNER)
        .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.ledger.rental(rental).unwrap().properties.status,
        RentalStatus::Canceled
    );
    assert_eq!(
        app.payments.payment(payment_uid).unwrap().status,
        PaymentStatus::Canceled
    );
    assert_eq!(app.inventory.is_available(app.available), Some(true));
}

#[tokio::test]
async fn test_cancel_foreign_rental_is_forbidden() {
    let app = setup();
    let rental = app.start_available().await;

    let (status, _) = app
        .command("DELETE", &format!("/api/v1/rental/{rental}"), "Someone Else")
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        app.ledger.rental(rental).unwrap().properties.status,
        RentalStatus::InProgress
    );
    assert_eq!(app.inventory.is_available(app.available), Some(false));
}

#[tokio::test]
async fn test_cancel_with_ledger_degraded_is_forbidden() {
    let app = setup();
    let rental = app.start_available().await;
    app.ledger.set_degraded(true);

    let (status, _) = app
        .command("DELETE", &format!("/api/v1/rental/{rental}"), OWNER)
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.transport.is_empty().await);
}
