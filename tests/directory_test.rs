mod common;

use axum::http::{Method, StatusCode};
use common::*;
use serde_json::json;

#[tokio::test]
async fn admin_creates_users_in_every_role() {
    let app = TestApp::new().await;
    let admin = app.token_for(ADMIN).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Tomasz Sprzedawca",
                "email": "Tomasz@Montaz.test",
                "password": "Drzwi2025!",
                "role": "worker",
                "store_id": SALON_POLNOC,
                "position": "Doradca"
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["email"], "tomasz@montaz.test");
    assert_eq!(body["data"]["store_id"], SALON_POLNOC);
    assert_eq!(body["data"]["can_install"], false);

    // Workers need a store
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Bez Sklepu",
                "email": "bez@montaz.test",
                "password": "Drzwi2025!",
                "role": "worker"
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A company account without company_id brings its company into existence
    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Robert Parkiety",
                "email": "robert@parkiety.test",
                "password": "Drzwi2025!",
                "role": "company",
                "company_name": "Parkiety Robert",
                "nip": "5260250274",
                "services": ["flooring_installation"],
                "company_owner_only": false
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["company_name"], "Parkiety Robert");
    assert_eq!(body["data"]["can_install"], true);
    let company_id = body["data"]["company_id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/companies/{}", company_id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nip"], "5260250274");

    // Duplicate email
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Robert Drugi",
                "email": "robert@parkiety.test",
                "password": "Drzwi2025!",
                "role": "installer",
                "company_id": company_id
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn weak_passwords_are_refused() {
    let app = TestApp::new().await;
    let admin = app.token_for(ADMIN).await;

    for password in ["krotk1", "password123", "bezcyfrowe", "monika2025"] {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/users",
                Some(json!({
                    "name": "Monika Test",
                    "email": "monika@montaz.test",
                    "password": password,
                    "role": "admin"
                })),
                Some(&admin),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} -> {}", password, body);
    }
}

#[tokio::test]
async fn company_owner_manages_only_own_installers() {
    let app = TestApp::new().await;
    let owner = app.token_for(COMPANY_OWNER).await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/users", None, Some(&owner))
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&(INSTALLER_DOORS as i64)));
    assert!(ids.contains(&(INSTALLER_TRANSPORT as i64)));

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Krzysztof Monter",
                "email": "krzysztof@kowalski.test",
                "password": "Drzwi2025!",
                "role": "installer",
                "services": ["door_installation"]
            })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["company_id"], KOWALSKI_MONTAZE);
    assert_eq!(body["data"]["services"], json!(["door_installation"]));

    // Not theirs
    let (status, _) = app
        .send(
            Method::GET,
            &format!("/api/v1/users/{}", INSTALLER_FLOORPRO),
            None,
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Nowy Pracownik",
                "email": "nowy@montaz.test",
                "password": "Drzwi2025!",
                "role": "worker",
                "store_id": SALON_CENTRUM
            })),
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn installers_filter_by_capability() {
    let app = TestApp::new().await;
    let admin = app.token_for(ADMIN).await;

    let (status, body) = app
        .send(
            Method::GET,
            "/api/v1/users?role=installer&service=transport",
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_i64().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec![INSTALLER_TRANSPORT as i64, INSTALLER_FLOORPRO as i64]);

    let worker = app.token_for(WORKER).await;
    let (status, _) = app
        .send(Method::GET, "/api/v1/users", None, Some(&worker))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn users_update_and_delete() {
    let app = TestApp::new().await;
    let admin = app.token_for(ADMIN).await;
    let uri = format!("/api/v1/users/{}", INSTALLER_DOORS);

    let (status, body) = app
        .send(
            Method::PATCH,
            &uri,
            Some(json!({"phone": "+48 600 100 200", "services": ["door_installation", "transport"]})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["phone"], "+48 600 100 200");
    assert_eq!(
        body["data"]["services"],
        json!(["door_installation", "transport"])
    );

    // Everyone may read their own account
    let installer = app.token_for(INSTALLER_DOORS).await;
    let (status, _) = app.send(Method::GET, &uri, None, Some(&installer)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/users/{}", ADMIN),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::DELETE, &uri, None, Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::GET, &uri, None, Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stores_crud() {
    let app = TestApp::new().await;
    let admin = app.token_for(ADMIN).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/stores",
            Some(json!({"name": "Salon Oliwa", "address": "ul. Grunwaldzka 5", "email": "oliwa@montaz.test"})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "active");
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/stores/{}", id),
            Some(json!({"status": "inactive"})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "inactive");

    let worker = app.token_for(WORKER).await;
    let (status, body) = app
        .send(Method::GET, "/api/v1/stores?status=active", None, Some(&worker))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/stores",
            Some(json!({"name": "Salon Worker"})),
            Some(&worker),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/v1/stores/{}", id), None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .send(Method::GET, &format!("/api/v1/stores/{}", id), None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn company_store_links() {
    let app = TestApp::new().await;
    let admin = app.token_for(ADMIN).await;
    let link_uri = format!("/api/v1/companies/{}/stores/{}", FLOORPRO, SALON_CENTRUM);

    let (status, body) = app
        .send(Method::POST, &link_uri, None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["company_id"], FLOORPRO);

    let (status, _) = app
        .send(Method::POST, &link_uri, None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/v1/companies/{}/stores", FLOORPRO),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "Salon Centrum");

    let (status, _) = app
        .send(Method::DELETE, &link_uri, None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .send(Method::DELETE, &link_uri, None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/v1/companies/{}/stores/999", FLOORPRO),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn companies_crud() {
    let app = TestApp::new().await;
    let admin = app.token_for(ADMIN).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/companies",
            Some(json!({"name": "Drzwi-Serwis", "nip": "1234563218"})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/v1/companies/{}", id),
            Some(json!({"phone": "+48 58 123 45 67"})),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Drzwi-Serwis");

    let owner = app.token_for(COMPANY_OWNER).await;
    let (status, body) = app
        .send(Method::GET, "/api/v1/companies", None, Some(&owner))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/companies/{}", id),
            None,
            Some(&owner),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/companies/{}", id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
