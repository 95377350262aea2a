//! Chair API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::utils::{AppError, AppResponse, AppResult};
use shared::order::SeatClass;
use shared::seating::SeatState;

/// A hold may cover at most this many chairs. Anything larger is a
/// scripted client, not a person buying movie tickets.
const MAX_CHAIRS_PER_HOLD: usize = 10;

// ============ 响应类型 ============

/// Seat map for one showtime.
#[derive(Debug, Serialize)]
pub struct ShowtimeChairsResponse {
    pub showtime_id: String,
    pub movie_title: String,
    /// Start (ms since epoch)
    pub starts_at: i64,
    /// Bumped on every availability change for this showtime; clients
    /// poll it to know when to re-fetch the map.
    pub availability_version: u64,
    pub chairs: Vec<ChairView>,
}

/// One chair with its live availability.
#[derive(Debug, Serialize)]
pub struct ChairView {
    pub chair_id: String,
    pub name: String,
    pub class: SeatClass,
    pub price: f64,
    pub state: SeatState,
    /// Per-record version; changes whenever this chair transitions.
    pub version: u64,
}

#[derive(Debug, Deserialize)]
pub struct SelectChairsRequest {
    pub chair_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SelectChairsResponse {
    pub hold_token: String,
    pub showtime_id: String,
    pub chair_ids: Vec<String>,
    /// Lease deadline (ms since epoch); the hold silently lapses after it.
    pub expires_at: i64,
}

// ============ Handlers ============

/// GET /api/Chair/showTime/{showtime_id} - 场次座位图
pub async fn chairs_for_showtime(
    State(state): State<ServerState>,
    Path(showtime_id): Path<String>,
) -> AppResult<Json<AppResponse<ShowtimeChairsResponse>>> {
    let showtime = state
        .catalog
        .showtimes
        .find_by_id(&showtime_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Showtime {} not found", showtime_id)))?;

    let chairs = state.catalog.chairs.find_by_room(&showtime.room).await?;
    let chair_ids: Vec<String> = chairs.iter().map(|c| c.id_string()).collect();

    // One read transaction over all chairs; lazy lease expiry applied.
    let views = state.seats.availability(&showtime_id, &chair_ids)?;

    let chairs: Vec<ChairView> = chairs
        .iter()
        .zip(views)
        .map(|(chair, view)| ChairView {
            chair_id: view.chair_id,
            name: chair.name.clone(),
            class: chair.class,
            price: chair.price,
            state: view.state,
            version: view.version,
        })
        .collect();

    Ok(AppResponse::ok(ShowtimeChairsResponse {
        availability_version: state.seats.versions().current(&showtime_id),
        showtime_id,
        movie_title: showtime.movie_title,
        starts_at: showtime.starts_at,
        chairs,
    }))
}

/// POST /api/Chair/select-chairs/{showtime_id} - 原子选座
///
/// 要么全部座位成功锁定，要么一个都不锁 (409 列出冲突座位)。
pub async fn select_chairs(
    State(state): State<ServerState>,
    Path(showtime_id): Path<String>,
    Json(payload): Json<SelectChairsRequest>,
) -> AppResult<Json<AppResponse<SelectChairsResponse>>> {
    if payload.chair_ids.is_empty() {
        return Err(AppError::validation("chair_ids must not be empty"));
    }
    if payload.chair_ids.len() > MAX_CHAIRS_PER_HOLD {
        return Err(AppError::validation(format!(
            "at most {} chairs per selection",
            MAX_CHAIRS_PER_HOLD
        )));
    }
    if payload.chair_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(AppError::validation("chair id must not be blank"));
    }

    let showtime = state
        .catalog
        .showtimes
        .find_by_id(&showtime_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Showtime {} not found", showtime_id)))?;

    // Reject chairs the showtime's room does not contain before touching
    // availability: a hold on a phantom chair would price to nothing.
    let known = state.catalog.chairs.find_by_ids(&payload.chair_ids).await?;
    if known.len() != payload.chair_ids.len() {
        let known_ids: Vec<String> = known.iter().map(|c| c.id_string()).collect();
        let missing: Vec<&str> = payload
            .chair_ids
            .iter()
            .filter(|id| !known_ids.contains(id))
            .map(|id| id.as_str())
            .collect();
        return Err(AppError::validation(format!(
            "unknown chairs: {}",
            missing.join(", ")
        )));
    }
    if let Some(foreign) = known.iter().find(|c| c.room != showtime.room) {
        return Err(AppError::validation(format!(
            "chair {} is not in this showtime's room",
            foreign.id_string()
        )));
    }

    // Anonymous purchase flow: the hold token itself is the session
    // handle, the holder id just tags who asked.
    let holder_id = format!("guest-{}", uuid::Uuid::new_v4());
    let hold = state
        .seats
        .hold(&showtime_id, &payload.chair_ids, &holder_id, state.hold_ttl())?;

    Ok(AppResponse::ok(SelectChairsResponse {
        hold_token: hold.token,
        showtime_id: hold.showtime_id,
        chair_ids: hold.chair_ids,
        expires_at: hold.expires_at,
    }))
}
