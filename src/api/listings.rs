// src/api/listings.rs

use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::require_text;
use crate::db::{self, ListingFilter};
use crate::error::{AppError, AppResult};
use crate::models::{Account, ListingView, Report};
use crate::AppState;

const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListInput {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub limit: Option<i64>,
}

impl ListInput {
    fn into_filter(self) -> AppResult<ListingFilter> {
        if let Some(limit) = self.limit {
            if !(1..=MAX_LIMIT).contains(&limit) {
                return Err(AppError::Validation(format!(
                    "limit must be between 1 and {MAX_LIMIT}"
                )));
            }
        }
        Ok(ListingFilter {
            category: self.category.filter(|c| !c.trim().is_empty()),
            // `featured: false` means "no preference", not "only unfeatured".
            featured_only: self.featured.unwrap_or(false),
            limit: self.limit,
        })
    }
}

/// Approved listings matching every supplied filter. Storage faults produce an
/// empty page instead of an error so browsing never hard-fails.
pub async fn list(state: &AppState, input: ListInput) -> AppResult<Vec<ListingView>> {
    let filter = input.into_filter()?;

    match db::list_approved_listings(&state.pool, &filter).await {
        Ok(listings) => Ok(listings.into_iter().map(ListingView::public).collect()),
        Err(e) => {
            log::error!("listings.list db error (serving empty page): {e}");
            Ok(Vec::new())
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SlugInput {
    pub slug: String,
}

/// One listing by slug, whatever its review status. Faults propagate.
pub async fn get_by_slug(state: &AppState, input: SlugInput) -> AppResult<Option<ListingView>> {
    let listing = db::find_listing_by_slug(&state.pool, input.slug.trim()).await?;
    Ok(listing.map(ListingView::public))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    pub listing_id: i32,
    pub reason: String,
}

pub async fn report(state: &AppState, reporter: &Account, input: ReportInput) -> AppResult<Report> {
    require_text("reason", &input.reason)?;

    if db::find_listing_by_id(&state.pool, input.listing_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!(
            "listing {} not found",
            input.listing_id
        )));
    }

    let report =
        db::insert_report(&state.pool, input.listing_id, reporter.id, input.reason.trim()).await?;
    log::info!(
        "report filed report_id={} listing_id={} reporter_id={}",
        report.id,
        report.listing_id,
        reporter.id
    );
    Ok(report)
}
