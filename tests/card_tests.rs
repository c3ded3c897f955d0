//! Tests for the game card catalog endpoints.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use serde_json::{Value, json};

fn card(id: &str, name: &str, card_type: &str, attack: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": card_type,
        "origin": "Born in the northern ice",
        "dna_rate": 7,
        "icon": { "ic1": "free", "ic2": "instinct", "ic3": "loyalty" },
        "stats": { "attack": attack, "defense": 400, "mana": 200 },
        "skills": [{ "name": "Frost Bite", "description": "Slows the target" }],
        "lore": format!("Songs still tell of {}", name),
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn app_with_cards() -> (axum::Router, String) {
    let (app, _db) = create_test_app().await;
    let (access, _) = register(&app, "curator", "curator@x.com", "Secret123").await;

    for body in [
        card("card_001", "Aurelios", "Ancient", 800),
        card("card_002", "Fenrir", "Beast", 500),
        card("card_003", "Garm", "Beast", 450),
        card("card_004", "Ignis", "Elemental", 950),
    ] {
        let response = send(&app, authed_json_request("POST", "/api/cards", &access, body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    (app, access)
}

#[tokio::test]
async fn test_create_requires_auth() {
    let (app, _db) = create_test_app().await;

    let response = send(
        &app,
        json_request("POST", "/api/cards", card("card_001", "Aurelios", "Ancient", 800)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "AUTH_REQUIRED");
}

#[tokio::test]
async fn test_create_and_get() {
    let (app, _access) = app_with_cards().await;

    let response = send(&app, get("/api/cards/card_001")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Aurelios");
    assert_eq!(json["type"], "Ancient");
    assert_eq!(json["image_url"], "/images/default.svg");
    assert_eq!(json["skills"][0]["name"], "Frost Bite");

    let response = send(&app, get("/api/cards/card_999")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_duplicate_and_invalid() {
    let (app, access) = app_with_cards().await;

    let response = send(
        &app,
        authed_json_request(
            "POST",
            "/api/cards",
            &access,
            card("card_001", "Again", "Ancient", 100),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let mut bad_type = card("card_010", "Nope", "Dragon", 100);
    let mut bad_dna = card("card_011", "Nope", "Spirit", 100);
    bad_dna["dna_rate"] = json!(11);
    let bad_stats = card("card_012", "Nope", "Spirit", -1);
    bad_type["lore"] = json!("still has lore");

    for body in [bad_type, bad_dna, bad_stats] {
        let response = send(&app, authed_json_request("POST", "/api/cards", &access, body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_list_with_filters_and_pagination() {
    let (app, _access) = app_with_cards().await;

    let json = body_json(send(&app, get("/api/cards")).await).await;
    assert_eq!(json["pagination"]["total"], 4);
    assert_eq!(json["pagination"]["page"], 1);
    assert_eq!(json["pagination"]["limit"], 10);
    assert_eq!(json["pagination"]["pages"], 1);
    assert_eq!(json["cards"][0]["id"], "card_004");

    let json = body_json(send(&app, get("/api/cards?type=Beast")).await).await;
    assert_eq!(json["pagination"]["total"], 2);

    let json = body_json(send(&app, get("/api/cards?page=2&limit=3")).await).await;
    assert_eq!(json["pagination"]["pages"], 2);
    assert_eq!(json["cards"].as_array().unwrap().len(), 1);
    assert_eq!(json["cards"][0]["id"], "card_001");

    let response = send(&app, get("/api/cards?page=two")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());

    for uri in [
        "/api/cards?page=0",
        "/api/cards?limit=101",
        "/api/cards?type=Dragon",
        "/api/cards?page=9223372036854775807",
        "/api/cards/search?q=songs&page=9223372036854775807",
    ] {
        let response = send(&app, get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_search() {
    let (app, _access) = app_with_cards().await;

    let json = body_json(send(&app, get("/api/cards/search?q=fenrir")).await).await;
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["cards"][0]["id"], "card_002");

    let json = body_json(send(&app, get("/api/cards/search?q=songs")).await).await;
    assert_eq!(json["pagination"]["total"], 4);

    let json = body_json(
        send(&app, get("/api/cards/search?min_attack=480&max_attack=900")).await,
    )
    .await;
    assert_eq!(json["pagination"]["total"], 2);

    let response = send(&app, get("/api/cards/search?min_attack=900&max_attack=100")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_types_and_stats() {
    let (app, _access) = app_with_cards().await;

    let json = body_json(send(&app, get("/api/cards/types")).await).await;
    assert_eq!(
        json["types"],
        json!(["Ancient", "Elemental", "Beast", "Spirit", "Hybrid"])
    );

    let json = body_json(send(&app, get("/api/cards/stats")).await).await;
    assert_eq!(json["total"], 4);
    assert_eq!(json["types"], 3);
    assert_eq!(
        json["distribution"],
        json!([
            { "type": "Ancient", "count": 1 },
            { "type": "Beast", "count": 2 },
            { "type": "Elemental", "count": 1 },
        ])
    );
}

#[tokio::test]
async fn test_update_and_delete() {
    let (app, access) = app_with_cards().await;

    let response = send(
        &app,
        authed_json_request(
            "PUT",
            "/api/cards/card_002",
            &access,
            json!({ "name": "Fenrir the Bound", "dna_rate": 9 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Fenrir the Bound");
    assert_eq!(json["dna_rate"], 9);
    assert_eq!(json["type"], "Beast");

    let response = send(
        &app,
        authed_json_request("PUT", "/api/cards/card_999", &access, json!({ "name": "x" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, authed_request("DELETE", "/api/cards/card_002", &access)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&app, authed_request("DELETE", "/api/cards/card_002", &access)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/api/cards/card_001")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
