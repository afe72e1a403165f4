// src/api/admin.rs
//
// Review queue and direct listing management. Every operation here sits behind
// the admin tier in the registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::api::creator::{available_slug, insert_unique};
use crate::api::{require_price, require_text, require_url, Ack};
use crate::error::{AppError, AppResult};
use crate::models::{
    Account, Listing, ListingPatch, ListingStatus, ListingView, NewListing, Report, ReportStatus,
};
use crate::{db, slug, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct IdInput {
    pub id: i32,
}

pub async fn pending_listings(state: &AppState) -> AppResult<Vec<ListingView>> {
    let listings = db::list_listings_by_status(&state.pool, ListingStatus::Pending).await?;
    Ok(listings.into_iter().map(ListingView::full).collect())
}

pub async fn all_listings(state: &AppState) -> AppResult<Vec<ListingView>> {
    let listings = db::list_all_listings(&state.pool).await?;
    Ok(listings.into_iter().map(ListingView::full).collect())
}

pub async fn get_by_id(state: &AppState, input: IdInput) -> AppResult<Option<ListingView>> {
    let listing = db::find_listing_by_id(&state.pool, input.id).await?;
    Ok(listing.map(ListingView::full))
}

/// Publishes a listing. Approving an already approved listing succeeds without changes.
pub async fn approve(state: &AppState, input: IdInput) -> AppResult<Ack> {
    existing(state, input.id).await?;
    move_to(state, input.id, ListingStatus::Approved).await?;
    Ok(Ack::ok())
}

pub async fn reject(state: &AppState, input: IdInput) -> AppResult<Ack> {
    existing(state, input.id).await?;
    move_to(state, input.id, ListingStatus::Rejected).await?;
    Ok(Ack::ok())
}

/// Single path for review-status changes. A real move to `approved` counts toward
/// the creator's approved listings; repeats are no-ops.
async fn move_to(state: &AppState, id: i32, status: ListingStatus) -> AppResult<()> {
    let Some(creator_id) = db::transition_listing(&state.pool, id, status).await? else {
        return Ok(());
    };
    if status == ListingStatus::Approved {
        db::bump_creator_counters(&state.pool, creator_id, 0, 1).await?;
    }
    log::info!("listing id={id} moved to {status:?}");
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub id: i32,
    #[serde(flatten)]
    pub patch: ListingPatch,
    /// Keys that are not listing fields. Collected so typos are refused instead of ignored.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

fn validate_patch(patch: &ListingPatch) -> AppResult<()> {
    for (field, value) in [
        ("title", &patch.title),
        ("description", &patch.description),
        ("category", &patch.category),
        ("creatorName", &patch.creator_name),
    ] {
        if let Some(value) = value {
            require_text(field, value)?;
        }
    }
    for (field, value) in [
        ("contentLink", &patch.content_link),
        ("purchaseLink", &patch.purchase_link),
        ("previewImage", &patch.preview_image),
        ("previewMedia", &patch.preview_media),
        ("creatorAvatar", &patch.creator_avatar),
    ] {
        if let Some(value) = value {
            require_url(field, value)?;
        }
    }
    if let Some(price) = patch.price {
        require_price(price)?;
    }
    Ok(())
}

/// Changes the supplied fields and nothing else. Concurrent edits to different
/// fields do not overwrite each other; edits to the same field are last-write-wins.
pub async fn update(state: &AppState, input: UpdateRequest) -> AppResult<ListingView> {
    if !input.unknown.is_empty() {
        let keys: Vec<&str> = input.unknown.keys().map(String::as_str).collect();
        return Err(AppError::Validation(format!(
            "unknown listing fields: {}",
            keys.join(", ")
        )));
    }
    validate_patch(&input.patch)?;

    let mut patch = input.patch;
    if let Some(status) = patch.status.take() {
        move_to(state, input.id, status).await?;
    }

    let listing = db::update_listing_fields(&state.pool, input.id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("listing {} not found", input.id)))?;
    if !patch.is_empty() {
        log::info!("listing updated id={}", listing.id);
    }
    Ok(ListingView::full(listing))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectRequest {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub category: String,
    pub tags: Option<String>,
    #[serde(default)]
    pub price: i32,
    pub content_link: String,
    pub purchase_link: Option<String>,
    pub preview_image: Option<String>,
    pub preview_media: Option<String>,
    pub creator_id: Option<i32>,
    pub creator_name: String,
    pub creator_avatar: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub trending: bool,
    pub required_platform_version: Option<String>,
}

impl CreateDirectRequest {
    fn validate(&self) -> AppResult<()> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("category", &self.category)?;
        require_text("creatorName", &self.creator_name)?;
        require_price(self.price)?;
        require_url("contentLink", &self.content_link)?;
        for (field, value) in [
            ("purchaseLink", &self.purchase_link),
            ("previewImage", &self.preview_image),
            ("previewMedia", &self.preview_media),
            ("creatorAvatar", &self.creator_avatar),
        ] {
            if let Some(value) = value {
                require_url(field, value)?;
            }
        }
        if let Some(slug) = &self.slug {
            if !slug::is_canonical(slug) {
                return Err(AppError::Validation(
                    "slug may only contain a-z, 0-9 and single inner hyphens".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateDirectResponse {
    pub success: bool,
    pub id: i32,
    pub slug: String,
}

/// Trusted fast path: inserted straight as `approved`, skipping review.
pub async fn create_direct(
    state: &AppState,
    admin: &Account,
    payload: CreateDirectRequest,
) -> AppResult<CreateDirectResponse> {
    payload.validate()?;

    let creator_id = payload.creator_id.unwrap_or(admin.id);
    if db::find_account_by_id(&state.pool, creator_id).await?.is_none() {
        return Err(AppError::NotFound(format!("account {creator_id} not found")));
    }

    let slug = match payload.slug {
        Some(slug) => slug,
        None => available_slug(state, &payload.title).await?,
    };

    let listing = NewListing {
        title: payload.title.trim().to_string(),
        slug,
        description: payload.description.trim().to_string(),
        category: payload.category.trim().to_string(),
        tags: payload.tags,
        price: payload.price,
        content_link: payload.content_link.trim().to_string(),
        purchase_link: payload.purchase_link,
        preview_image: payload.preview_image,
        preview_media: payload.preview_media,
        creator_id,
        creator_name: payload.creator_name.trim().to_string(),
        creator_avatar: payload.creator_avatar,
        submitter_email: None,
        featured: payload.featured,
        trending: payload.trending,
        required_platform_version: payload.required_platform_version,
    };

    let id = insert_unique(state, &listing, ListingStatus::Approved).await?;
    db::bump_creator_counters(&state.pool, creator_id, 1, 1).await?;
    log::info!(
        "listing created directly id={id} slug={} by admin_id={}",
        listing.slug,
        admin.id
    );

    Ok(CreateDirectResponse {
        success: true,
        id,
        slug: listing.slug,
    })
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReportsQuery {
    pub status: Option<ReportStatus>,
}

pub async fn reports(state: &AppState, input: ReportsQuery) -> AppResult<Vec<Report>> {
    Ok(db::list_reports(&state.pool, input.status).await?)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveReportRequest {
    pub id: i32,
    pub status: ReportStatus,
}

pub async fn resolve_report(state: &AppState, input: ResolveReportRequest) -> AppResult<Report> {
    if input.status == ReportStatus::Pending {
        return Err(AppError::Validation(
            "status must be resolved or dismissed".to_string(),
        ));
    }
    db::set_report_status(&state.pool, input.id, input.status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("report {} not found", input.id)))
}

async fn existing(state: &AppState, id: i32) -> AppResult<Listing> {
    db::find_listing_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("listing {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_splits_id_from_patch() {
        let req: UpdateRequest =
            serde_json::from_str(r#"{"id": 4, "price": 499, "featured": true}"#).unwrap();
        assert_eq!(req.id, 4);
        assert_eq!(req.patch.price, Some(499));
        assert_eq!(req.patch.featured, Some(true));
        assert!(req.patch.title.is_none());
        assert!(req.unknown.is_empty());
    }

    #[test]
    fn misspelled_patch_keys_are_collected() {
        let req: UpdateRequest =
            serde_json::from_str(r#"{"id": 4, "purchaseLnk": "https://x.example"}"#).unwrap();
        assert!(req.patch.is_empty());
        assert_eq!(
            req.unknown.keys().map(String::as_str).collect::<Vec<_>>(),
            ["purchaseLnk"]
        );
    }

    #[test]
    fn patch_validation() {
        let bad_link = ListingPatch {
            purchase_link: Some("gumroad".into()),
            ..Default::default()
        };
        assert_eq!(validate_patch(&bad_link).unwrap_err().code(), "VALIDATION");

        let bad_price = ListingPatch {
            price: Some(-5),
            ..Default::default()
        };
        assert!(validate_patch(&bad_price).is_err());

        let blank_title = ListingPatch {
            title: Some(" ".into()),
            ..Default::default()
        };
        assert!(validate_patch(&blank_title).is_err());

        let ok = ListingPatch {
            status: Some(ListingStatus::Rejected),
            purchase_link: Some("https://store.example/x".into()),
            ..Default::default()
        };
        assert!(validate_patch(&ok).is_ok());
    }

    #[test]
    fn patch_rejects_unknown_status() {
        let parsed =
            serde_json::from_str::<UpdateRequest>(r#"{"id": 1, "status": "published"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn create_direct_requires_canonical_slug() {
        let mut req: CreateDirectRequest = serde_json::from_str(
            r#"{
                "title": "Focus Timer",
                "description": "Pomodoro",
                "category": "Productivity",
                "contentLink": "https://www.icloud.com/shortcuts/focus",
                "creatorName": "Team"
            }"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.price, 0);
        assert!(!req.featured);

        req.slug = Some("Focus Timer".into());
        assert!(req.validate().is_err());
        req.slug = Some("focus-timer".into());
        assert!(req.validate().is_ok());
    }
}
