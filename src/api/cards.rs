//! Game card catalog API endpoints.
//!
//! Reads are public; create, update and delete require an access token.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use super::validation::{pagination, validate_required};
use crate::auth::Auth;
use crate::db::{
    Card, CardError, CardFilter, CardIcon, CardPage, CardStats, CardType, CardUpdate, Database,
    NewCard, Skill,
};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct CardsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(CardsState);

pub fn router(state: CardsState) -> Router {
    Router::new()
        .route("/", get(list_cards).post(create_card))
        .route("/search", get(search_cards))
        .route("/types", get(list_types))
        .route("/stats", get(catalog_stats))
        .route(
            "/{id}",
            get(get_card).put(update_card).delete(delete_card),
        )
        .with_state(state)
}

fn parse_type(value: &str) -> Result<CardType, ApiError> {
    CardType::parse(value).ok_or_else(|| {
        let names: Vec<&str> = CardType::ALL.iter().map(|t| t.as_str()).collect();
        ApiError::bad_request(format!("Type must be one of: {}", names.join(", ")))
    })
}

fn validate_dna_rate(dna_rate: i64) -> Result<(), ApiError> {
    if !(1..=10).contains(&dna_rate) {
        return Err(ApiError::bad_request("DNA rate must be between 1 and 10"));
    }
    Ok(())
}

fn validate_stats(stats: &CardStats) -> Result<(), ApiError> {
    if stats.attack < 0 || stats.defense < 0 || stats.mana < 0 {
        return Err(ApiError::bad_request("Stats cannot be negative"));
    }
    Ok(())
}

fn validate_icon(icon: &CardIcon) -> Result<(), ApiError> {
    validate_required("Icon ic1", &icon.ic1)?;
    validate_required("Icon ic2", &icon.ic2)?;
    validate_required("Icon ic3", &icon.ic3)
}

fn validate_skills(skills: &[Skill]) -> Result<(), ApiError> {
    for skill in skills {
        validate_required("Skill name", &skill.name)?;
        validate_required("Skill description", &skill.description)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct Pagination {
    page: i64,
    limit: i64,
    total: i64,
    pages: i64,
}

#[derive(Serialize)]
struct CardListResponse {
    cards: Vec<Card>,
    pagination: Pagination,
}

impl From<CardPage> for CardListResponse {
    fn from(page: CardPage) -> Self {
        let pagination = Pagination {
            page: page.page,
            limit: page.limit,
            total: page.total,
            pages: page.pages(),
        };
        Self {
            cards: page.cards,
            pagination,
        }
    }
}

#[derive(Deserialize)]
struct ListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    #[serde(rename = "type")]
    card_type: Option<String>,
    dna_rate: Option<i64>,
}

async fn list_cards(
    State(state): State<CardsState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let (page, limit) = pagination(query.page, query.limit)?;
    let filter = CardFilter {
        card_type: query.card_type.as_deref().map(parse_type).transpose()?,
        dna_rate: query.dna_rate,
        ..Default::default()
    };

    let cards = state
        .db
        .cards()
        .list(&filter, page, limit)
        .await
        .db_err("Failed to list cards")?;

    Ok(Json(CardListResponse::from(cards)))
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    #[serde(rename = "type")]
    card_type: Option<String>,
    min_attack: Option<i64>,
    max_attack: Option<i64>,
    page: Option<i64>,
    limit: Option<i64>,
}

async fn search_cards(
    State(state): State<CardsState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let (page, limit) = pagination(query.page, query.limit)?;
    if let (Some(min), Some(max)) = (query.min_attack, query.max_attack) {
        if min > max {
            return Err(ApiError::bad_request(
                "min_attack cannot be greater than max_attack",
            ));
        }
    }

    let filter = CardFilter {
        card_type: query.card_type.as_deref().map(parse_type).transpose()?,
        min_attack: query.min_attack,
        max_attack: query.max_attack,
        query: query
            .q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty()),
        ..Default::default()
    };

    let cards = state
        .db
        .cards()
        .list(&filter, page, limit)
        .await
        .db_err("Failed to search cards")?;

    Ok(Json(CardListResponse::from(cards)))
}

#[derive(Serialize)]
struct TypesResponse {
    types: Vec<&'static str>,
}

async fn list_types() -> impl IntoResponse {
    Json(TypesResponse {
        types: CardType::ALL.iter().map(|t| t.as_str()).collect(),
    })
}

async fn catalog_stats(State(state): State<CardsState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .db
        .cards()
        .stats()
        .await
        .db_err("Failed to compute card stats")?;
    Ok(Json(stats))
}

async fn get_card(
    State(state): State<CardsState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let card = state
        .db
        .cards()
        .get(&id)
        .await
        .db_err("Failed to get card")?
        .ok_or_else(|| ApiError::not_found("Card not found"))?;
    Ok(Json(card))
}

#[derive(Deserialize)]
struct CreateCardRequest {
    id: String,
    name: String,
    #[serde(rename = "type")]
    card_type: String,
    origin: String,
    dna_rate: i64,
    icon: CardIcon,
    stats: CardStats,
    #[serde(default)]
    skills: Vec<Skill>,
    lore: String,
    image_url: Option<String>,
    release_date: Option<String>,
}

async fn create_card(
    State(state): State<CardsState>,
    Auth(auth): Auth,
    body: Result<Json<CreateCardRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = body?;
    validate_required("Id", &payload.id)?;
    validate_required("Name", &payload.name)?;
    validate_required("Origin", &payload.origin)?;
    validate_required("Lore", &payload.lore)?;
    let card_type = parse_type(&payload.card_type)?;
    validate_dna_rate(payload.dna_rate)?;
    validate_icon(&payload.icon)?;
    validate_stats(&payload.stats)?;
    validate_skills(&payload.skills)?;

    let new_card = NewCard {
        id: payload.id.trim().to_string(),
        name: payload.name.trim().to_string(),
        card_type,
        origin: payload.origin,
        dna_rate: payload.dna_rate,
        icon: payload.icon,
        stats: payload.stats,
        skills: payload.skills,
        lore: payload.lore,
        image_url: payload.image_url,
        release_date: payload.release_date,
    };

    let card = state
        .db
        .cards()
        .create(&new_card)
        .await
        .map_err(|e| match e {
            CardError::AlreadyExists => ApiError::conflict("Card with this id already exists"),
            CardError::Database(e) => ApiError::db_error("Failed to create card", e),
        })?;

    tracing::info!(card_id = %card.id, account_id = %auth.account.id, "Card created");
    Ok((StatusCode::CREATED, Json(card)))
}

#[derive(Deserialize)]
struct UpdateCardRequest {
    name: Option<String>,
    #[serde(rename = "type")]
    card_type: Option<String>,
    origin: Option<String>,
    dna_rate: Option<i64>,
    icon: Option<CardIcon>,
    stats: Option<CardStats>,
    skills: Option<Vec<Skill>>,
    lore: Option<String>,
    image_url: Option<String>,
    release_date: Option<String>,
}

async fn update_card(
    State(state): State<CardsState>,
    Auth(_auth): Auth,
    Path(id): Path<String>,
    body: Result<Json<UpdateCardRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = body?;
    if let Some(name) = &payload.name {
        validate_required("Name", name)?;
    }
    if let Some(dna_rate) = payload.dna_rate {
        validate_dna_rate(dna_rate)?;
    }
    if let Some(icon) = &payload.icon {
        validate_icon(icon)?;
    }
    if let Some(stats) = &payload.stats {
        validate_stats(stats)?;
    }
    if let Some(skills) = &payload.skills {
        validate_skills(skills)?;
    }

    let update = CardUpdate {
        name: payload.name.map(|n| n.trim().to_string()),
        card_type: payload.card_type.as_deref().map(parse_type).transpose()?,
        origin: payload.origin,
        dna_rate: payload.dna_rate,
        icon: payload.icon,
        stats: payload.stats,
        skills: payload.skills,
        lore: payload.lore,
        image_url: payload.image_url,
        release_date: payload.release_date,
    };

    let card = state
        .db
        .cards()
        .update(&id, &update)
        .await
        .db_err("Failed to update card")?
        .ok_or_else(|| ApiError::not_found("Card not found"))?;
    Ok(Json(card))
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

async fn delete_card(
    State(state): State<CardsState>,
    Auth(auth): Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .cards()
        .delete(&id)
        .await
        .db_err("Failed to delete card")?;
    if !deleted {
        return Err(ApiError::not_found("Card not found"));
    }

    tracing::info!(card_id = %id, account_id = %auth.account.id, "Card deleted");
    Ok(Json(DeleteResponse { deleted }))
}
