mod common;

use axum::http::{Method, StatusCode};
use common::*;
use montaz_api::config::ScheduleConflictPolicy;
use serde_json::{json, Value};

fn entry(installer_id: i32, date: &str, slot: &str) -> Value {
    json!({
        "installer_id": installer_id,
        "date": date,
        "time_slot": slot,
        "notes": "Pomiar przed montażem"
    })
}

#[tokio::test]
async fn week_view_is_ordered_and_scoped() {
    let app = TestApp::new().await;
    let worker = app.token_for(WORKER).await;

    for (installer, date, slot) in [
        (INSTALLER_DOORS, "2025-04-23", "14-17"),
        (INSTALLER_DOORS, "2025-04-22", "8-11"),
        (INSTALLER_TRANSPORT, "2025-04-22", "11:00-14:00"),
        // Following week
        (INSTALLER_DOORS, "2025-04-28", "08-11"),
    ] {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/schedule",
                Some(entry(installer, date, slot)),
                Some(&worker),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let (status, body) = app
        .send(
            Method::GET,
            "/api/v1/schedule?week_start=2025-04-24",
            None,
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let week = &body["data"];
    assert_eq!(week["week_start"], "2025-04-21");
    assert_eq!(week["week_end"], "2025-04-28");
    let slots: Vec<(String, String)> = week["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["date"].as_str().unwrap().to_string(),
                e["time_slot"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        slots,
        vec![
            ("2025-04-22".to_string(), "08-11".to_string()),
            ("2025-04-22".to_string(), "11-14".to_string()),
            ("2025-04-23".to_string(), "14-17".to_string()),
        ]
    );

    let installer = app.token_for(INSTALLER_TRANSPORT).await;
    let (_, body) = app
        .send(
            Method::GET,
            &format!(
                "/api/v1/schedule?week_start=2025-04-21&installer_id={}",
                INSTALLER_DOORS
            ),
            None,
            Some(&installer),
        )
        .await;
    let entries = body["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["installer_id"], INSTALLER_TRANSPORT);
}

#[tokio::test]
async fn double_booking_is_logged_by_default() {
    let app = TestApp::new().await;
    let worker = app.token_for(WORKER).await;

    for _ in 0..2 {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/v1/schedule",
                Some(entry(INSTALLER_DOORS, "2025-04-22", "08-11")),
                Some(&worker),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn double_booking_can_be_rejected() {
    let app = TestApp::with_config(|cfg| {
        cfg.schedule_conflict_policy = ScheduleConflictPolicy::Reject;
    })
    .await;
    let worker = app.token_for(WORKER).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/schedule",
            Some(entry(INSTALLER_DOORS, "2025-04-22", "08-11")),
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let first_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/schedule",
            Some(entry(INSTALLER_DOORS, "2025-04-22", "8-11")),
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Another slot is free, and editing an entry in place is not a clash with itself
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/schedule",
            Some(entry(INSTALLER_DOORS, "2025-04-22", "11-14")),
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let second_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/schedule/{}", first_id),
            Some(json!({"notes": "Klient prosi o telefon"})),
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/schedule/{}", second_id),
            Some(json!({"time_slot": "08-11"})),
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn installers_complete_only_their_entries() {
    let app = TestApp::new().await;
    let worker = app.token_for(WORKER).await;
    let (_, body) = app
        .send(
            Method::POST,
            "/api/v1/schedule",
            Some(entry(INSTALLER_DOORS, "2025-04-22", "08-11")),
            Some(&worker),
        )
        .await;
    let id = body["data"]["id"].as_i64().unwrap();
    let complete_uri = format!("/api/v1/schedule/{}/complete", id);

    let other = app.token_for(INSTALLER_TRANSPORT).await;
    let (status, _) = app
        .send(Method::POST, &complete_uri, None, Some(&other))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Installers do not plan the board
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/schedule",
            Some(entry(INSTALLER_TRANSPORT, "2025-04-23", "08-11")),
            Some(&other),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let own = app.token_for(INSTALLER_DOORS).await;
    let (status, body) = app
        .send(Method::POST, &complete_uri, None, Some(&own))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], true);
}

#[tokio::test]
async fn company_plans_only_its_installers() {
    let app = TestApp::new().await;
    let owner = app.token_for(COMPANY_OWNER).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/schedule",
            Some(entry(INSTALLER_FLOORPRO, "2025-04-22", "08-11")),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Not an installer at all
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/schedule",
            Some(entry(WORKER, "2025-04-22", "08-11")),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/schedule",
            Some(entry(INSTALLER_TRANSPORT, "2025-04-22", "17-20")),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/schedule/{}", id),
            None,
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn entries_reference_existing_orders_and_valid_slots() {
    let app = TestApp::new().await;
    let worker = app.token_for(WORKER).await;

    let mut with_order = entry(INSTALLER_DOORS, "2025-04-22", "08-11");
    with_order["order_number"] = json!("ZL-2025-04-9999");
    let (status, _) = app
        .send(Method::POST, "/api/v1/schedule", Some(with_order), Some(&worker))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/schedule",
            Some(entry(INSTALLER_DOORS, "2025-04-22", "06-09")),
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_are_typed_and_grouped() {
    let app = TestApp::new().await;
    let admin = app.token_for(ADMIN).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/settings",
            Some(json!({
                "category": "general",
                "key": "company_name",
                "value": "Montaż Pro",
                "description": "Shown on printed orders"
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["value_type"], "string");

    let (status, body) = app
        .send(
            Method::PATCH,
            "/api/v1/settings/notifications",
            Some(json!({"email_enabled": "tak", "reminder_days": [1, 3]})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let worker = app.token_for(WORKER).await;
    let (status, body) = app
        .send(
            Method::GET,
            "/api/v1/settings?category=notifications",
            None,
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let settings = body["data"].as_array().unwrap();
    assert_eq!(settings.len(), 2);

    let (status, body) = app
        .send(
            Method::GET,
            "/api/v1/settings/general/company_name",
            None,
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], "Montaż Pro");
    assert_eq!(body["data"]["description"], "Shown on printed orders");

    // Workers read but never write
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/settings",
            Some(json!({"category": "general", "key": "company_name", "value": "X"})),
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::GET,
            "/api/v1/settings/general/missing",
            None,
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::PATCH,
            "/api/v1/settings/notifications",
            Some(json!({})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn boolean_settings_keep_their_type() {
    let app = TestApp::new().await;
    let admin = app.token_for(ADMIN).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/settings",
            Some(json!({"category": "orders", "key": "require_documents", "value": true})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value_type"], "boolean");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/settings",
            Some(json!({"category": "orders", "key": "require_documents", "value": "nie"})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], false);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/settings",
            Some(json!({"category": "orders", "key": "require_documents", "value": "maybe"})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn category_update_is_all_or_nothing() {
    let app = TestApp::new().await;
    let admin = app.token_for(ADMIN).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/settings",
            Some(json!({"category": "orders", "key": "require_documents", "value": true})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Keys are written in name order; the invalid one sits between two valid ones
    let (status, _) = app
        .send(
            Method::PATCH,
            "/api/v1/settings/orders",
            Some(json!({
                "auto_assign": "tak",
                "require_documents": "maybe",
                "welcome_note": "Dzień dobry"
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(Method::GET, "/api/v1/settings?category=orders", None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    let settings = body["data"].as_array().unwrap();
    assert_eq!(settings.len(), 1, "{}", body);
    assert_eq!(settings[0]["key"], "require_documents");
    assert_eq!(settings[0]["value"], true);
}
