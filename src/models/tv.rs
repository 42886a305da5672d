// TV screen inventory and per-advertiser placements

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::{tv_links, tvs};

/// Who owns the screen hardware; decides the default revenue share
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentType {
    /// Platform-owned equipment installed at a venue
    Aggregator,
    /// Venue-owned equipment
    Venue,
}

impl EquipmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentType::Aggregator => "aggregator",
            EquipmentType::Venue => "venue",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "aggregator" => Some(EquipmentType::Aggregator),
            "venue" => Some(EquipmentType::Venue),
            _ => None,
        }
    }

    /// Venue's share of each placement, in percent
    pub fn default_revenue_share(&self) -> BigDecimal {
        match self {
            EquipmentType::Aggregator => BigDecimal::from(60),
            EquipmentType::Venue => BigDecimal::from(70),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = tvs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Tv {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub venue_id: Option<i32>,
    pub equipment_type: String,
    pub revenue_share: Option<BigDecimal>,
    pub is_active: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// `None` stores NULL rather than the column default, so an unset share stays unset
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tvs)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewTv {
    pub code: String,
    pub name: String,
    pub venue_id: Option<i32>,
    pub equipment_type: String,
    pub revenue_share: Option<BigDecimal>,
    pub is_active: bool,
    pub is_approved: bool,
}

impl NewTv {
    /// A screen with the share implied by its equipment type
    pub fn new(code: &str, name: &str, venue_id: Option<i32>, equipment: EquipmentType) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            venue_id,
            equipment_type: equipment.as_str().to_string(),
            revenue_share: Some(equipment.default_revenue_share()),
            is_active: true,
            is_approved: true,
        }
    }
}

impl Tv {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_tv: NewTv,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(tvs::table)
            .values(&new_tv)
            .get_result::<Tv>(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        tv_id: i32,
    ) -> Result<Option<Self>, diesel::result::Error> {
        tvs::table
            .find(tv_id)
            .first::<Tv>(conn)
            .await
            .optional()
    }

    pub async fn find_by_venue(
        conn: &mut AsyncPgConnection,
        venue: i32,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        tvs::table
            .filter(tvs::venue_id.eq(venue))
            .order(tvs::id.asc())
            .load::<Tv>(conn)
            .await
    }

    pub async fn set_revenue_share(
        conn: &mut AsyncPgConnection,
        tv_id: i32,
        share: Option<BigDecimal>,
    ) -> Result<Self, diesel::result::Error> {
        diesel::update(tvs::table.find(tv_id))
            .set(tvs::revenue_share.eq(share))
            .get_result::<Tv>(conn)
            .await
    }

    /// Screens are addressed publicly by their code
    pub async fn find_by_code(
        conn: &mut AsyncPgConnection,
        code: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        tvs::table
            .filter(tvs::code.eq(code))
            .first::<Tv>(conn)
            .await
            .optional()
    }

    pub fn equipment_type_enum(&self) -> Option<EquipmentType> {
        EquipmentType::from_string(&self.equipment_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = tv_links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TvLink {
    pub id: i32,
    pub tv_id: i32,
    pub advertiser_id: Option<i32>,
    pub advertiser_name: Option<String>,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub position: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tv_links)]
pub struct NewTvLink {
    pub tv_id: i32,
    pub advertiser_id: Option<i32>,
    pub advertiser_name: Option<String>,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub position: i32,
    pub is_active: bool,
}

impl TvLink {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_link: NewTvLink,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(tv_links::table)
            .values(&new_link)
            .get_result::<TvLink>(conn)
            .await
    }

    /// Active placements on one screen, in display order
    pub async fn find_active_for_tv(
        conn: &mut AsyncPgConnection,
        tv: i32,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        tv_links::table
            .filter(tv_links::tv_id.eq(tv))
            .filter(tv_links::is_active.eq(true))
            .order((tv_links::position.asc(), tv_links::id.asc()))
            .load::<TvLink>(conn)
            .await
    }

    pub async fn find_by_advertiser(
        conn: &mut AsyncPgConnection,
        advertiser: i32,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        tv_links::table
            .filter(tv_links::advertiser_id.eq(advertiser))
            .order(tv_links::created_at.desc())
            .load::<TvLink>(conn)
            .await
    }
}
