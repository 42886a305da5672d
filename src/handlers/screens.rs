use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;

use super::ApiResponse;
use crate::{
    app::AppState,
    models::{Tv, TvLink},
    utils::ServiceError,
};

/// Public view of one placement; advertiser ids stay private
#[derive(Debug, Serialize)]
pub struct ScreenLink {
    pub id: i32,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub advertiser_name: Option<String>,
    pub position: i32,
}

impl From<TvLink> for ScreenLink {
    fn from(link: TvLink) -> Self {
        Self {
            id: link.id,
            title: link.title,
            url: link.url,
            description: link.description,
            advertiser_name: link.advertiser_name,
            position: link.position,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScreenFeed {
    pub tv_id: i32,
    pub tv_code: String,
    pub tv_name: String,
    pub links: Vec<ScreenLink>,
}

/// GET /v1/screens/{identifier}
///
/// The identifier is the screen code; a numeric identifier that matches no
/// code falls back to the screen id.
pub async fn feed(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;

    let tv = match Tv::find_by_code(&mut conn, &identifier).await? {
        Some(tv) => Some(tv),
        None => match identifier.parse::<i32>() {
            Ok(id) => Tv::find_by_id(&mut conn, id).await?,
            Err(_) => None,
        },
    }
    .ok_or(ServiceError::TvUnavailable)?;

    if !tv.is_active {
        return Err(ServiceError::Forbidden("TV is inactive".to_string()));
    }

    let links = TvLink::find_active_for_tv(&mut conn, tv.id)
        .await?
        .into_iter()
        .map(ScreenLink::from)
        .collect();

    Ok(ApiResponse::ok(
        ScreenFeed {
            tv_id: tv.id,
            tv_code: tv.code,
            tv_name: tv.name,
            links,
        },
        "Screen content retrieved",
    ))
}
