//! End-to-end checks of the HTTP surface against an in-memory store.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use actix_web::http::{header, StatusCode};
use actix_web::middleware::NormalizePath;
use actix_web::{test, web, App};
use chrono::Duration;
use serde_json::{json, Value};

use hospital::api::{self, AppState};
use hospital::auth::TokenIssuer;
use hospital::db::Database;
use hospital::models::{Identity, Role};
use hospital::services::{Registration, StatsCache};

async fn state() -> web::Data<AppState> {
    let db = Database::in_memory().await.unwrap();
    let tokens = TokenIssuer::new(b"integration-secret", Duration::minutes(5), Duration::days(1));
    let stats = Arc::new(StatsCache::with_system_clock(StdDuration::from_secs(300)));
    web::Data::new(AppState::new(&db, tokens, stats))
}

async fn account(state: &AppState, username: &str, role: Role) -> Identity {
    state
        .directory
        .register(Registration {
            username: username.to_string(),
            email: format!("{}@hospital.test", username),
            password: "s3cret-pass".to_string(),
            role,
            phone: String::new(),
        })
        .await
        .unwrap()
}

fn bearer(state: &AppState, identity: &Identity) -> (header::HeaderName, String) {
    let pair = state.tokens.issue_pair(identity).unwrap();
    (header::AUTHORIZATION, format!("Bearer {}", pair.access))
}

macro_rules! service {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .wrap(NormalizePath::trim())
                .configure(api::configure),
        )
        .await
    };
}

#[actix_rt::test]
async fn register_login_and_read_own_profile() {
    let state = state().await;
    let app = service!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register/")
        .set_json(json!({
            "username": "house",
            "email": "house@hospital.test",
            "password": "vicodin-123",
            "role": "doctor"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert!(created.get("password_hash").is_none());

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "username": "house", "password": "vicodin-123" }))
        .to_request();
    let tokens: Value = test::call_and_read_body_json(&app, req).await;
    let access = tokens["access"].as_str().unwrap();

    let req = test::TestRequest::get()
        .uri("/api/doctors/me")
        .insert_header((header::AUTHORIZATION, format!("Bearer {}", access)))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["license_number"], format!("LIC-{:06}", created["id"].as_i64().unwrap()));
    assert_eq!(me["specialization"], "general");
    assert_eq!(me["user"]["username"], "house");

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({ "refresh": tokens["refresh"] }))
        .to_request();
    let refreshed: Value = test::call_and_read_body_json(&app, req).await;
    assert!(refreshed["access"].is_string());
}

#[actix_rt::test]
async fn public_registration_cannot_create_admins() {
    let state = state().await;
    let app = service!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "username": "mallory",
            "email": "mallory@hospital.test",
            "password": "password-123",
            "role": "admin"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(state.directory.count_by_role(Role::Admin).await.unwrap(), 0);
}

#[actix_rt::test]
async fn requests_without_token_are_unauthorized() {
    let state = state().await;
    let app = service!(state);

    for uri in ["/api/appointments", "/api/billing", "/api/dashboard"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let req = test::TestRequest::get()
        .uri("/api/appointments")
        .insert_header((header::AUTHORIZATION, "Bearer not-a-token"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn double_booking_is_a_conflict() {
    let state = state().await;
    let app = service!(state);
    account(&state, "grey", Role::Doctor).await;
    let first = account(&state, "pat1", Role::Patient).await;
    let second = account(&state, "pat2", Role::Patient).await;

    let req = test::TestRequest::get()
        .uri("/api/doctors/available/")
        .insert_header(bearer(&state, &first))
        .to_request();
    let doctors: Value = test::call_and_read_body_json(&app, req).await;
    let doctor = doctors[0]["id"].as_i64().unwrap();

    let booking = json!({
        "doctor": doctor,
        "appointment_date": "2024-01-10",
        "appointment_time": "09:00:00",
        "reason": "checkup"
    });

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .insert_header(bearer(&state, &first))
        .set_json(&booking)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let appointment: Value = test::read_body_json(resp).await;
    assert_eq!(appointment["status"], "pending");
    assert_eq!(appointment["doctor_name"], "Dr. grey");

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .insert_header(bearer(&state, &second))
        .set_json(&booking)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // The second patient sees none of the first one's appointments.
    let req = test::TestRequest::get()
        .uri("/api/appointments")
        .insert_header(bearer(&state, &second))
        .to_request();
    let visible: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(visible.as_array().unwrap().len(), 0);
}

#[actix_rt::test]
async fn status_changes_by_assigned_doctor() {
    let state = state().await;
    let app = service!(state);
    let doctor = account(&state, "grey", Role::Doctor).await;
    let patient = account(&state, "pat", Role::Patient).await;

    let req = test::TestRequest::get()
        .uri("/api/doctors/me")
        .insert_header(bearer(&state, &doctor))
        .to_request();
    let profile: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .insert_header(bearer(&state, &patient))
        .set_json(json!({
            "doctor": profile["id"],
            "appointment_date": "2024-03-01",
            "appointment_time": "14:30:00"
        }))
        .to_request();
    let appointment: Value = test::call_and_read_body_json(&app, req).await;
    let uri = format!("/api/appointments/{}/status", appointment["id"]);

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header(bearer(&state, &doctor))
        .set_json(json!({ "status": "completed" }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["status"], "completed");

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header(bearer(&state, &doctor))
        .set_json(json!({ "status": "bogus" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header(bearer(&state, &patient))
        .set_json(json!({ "status": "cancelled" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn invoice_lifecycle_and_dashboard() {
    let state = state().await;
    let app = service!(state);
    let admin = account(&state, "root", Role::Admin).await;
    let doctor = account(&state, "grey", Role::Doctor).await;
    let patient = account(&state, "pat", Role::Patient).await;

    let req = test::TestRequest::get()
        .uri("/api/doctors/me")
        .insert_header(bearer(&state, &doctor))
        .to_request();
    let profile: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .insert_header(bearer(&state, &patient))
        .set_json(json!({
            "doctor": profile["id"],
            "appointment_date": "2024-01-10",
            "appointment_time": "09:00:00"
        }))
        .to_request();
    let appointment: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/billing")
        .insert_header(bearer(&state, &admin))
        .set_json(json!({
            "appointment": appointment["id"],
            "amount": "100.00",
            "tax": "10.00",
            "discount": "5.00",
            "total_amount": "1.00"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let invoice: Value = test::read_body_json(resp).await;
    assert_eq!(invoice["total_amount"], "105.00");

    let req = test::TestRequest::patch()
        .uri(&format!("/api/billing/{}/mark_paid", invoice["id"]))
        .insert_header(bearer(&state, &admin))
        .set_json(json!({ "payment_method": "card" }))
        .to_request();
    let paid: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(paid["payment_status"], "paid");
    assert_eq!(paid["payment_method"], "card");
    assert!(paid["paid_at"].is_string());

    let req = test::TestRequest::get()
        .uri("/api/billing")
        .insert_header(bearer(&state, &patient))
        .to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri("/api/dashboard")
        .insert_header(bearer(&state, &patient))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/dashboard")
        .insert_header(bearer(&state, &admin))
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total_doctors"], 1);
    assert_eq!(stats["total_patients"], 1);
    assert_eq!(stats["total_appointments"], 1);
    assert_eq!(stats["total_revenue"], "105.00");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/billing/{}", invoice["id"]))
        .insert_header(bearer(&state, &admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
}
