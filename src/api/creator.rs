// src/api/creator.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::{require_email, require_price, require_text, require_url};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{Account, CreatorProfile, ListingStatus, NewListing, ANONYMOUS_ACCOUNT_ID};
use crate::{db, slug, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub price: i32,
    pub content_link: String,
    pub creator_name: String,
    pub email: Option<String>,
    pub preview_image: Option<String>,
    pub required_platform_version: Option<String>,
}

impl SubmitRequest {
    fn validate(&self) -> AppResult<()> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("category", &self.category)?;
        require_text("creatorName", &self.creator_name)?;
        require_price(self.price)?;
        require_url("contentLink", &self.content_link)?;
        if let Some(email) = &self.email {
            require_email("email", email)?;
        }
        if let Some(image) = &self.preview_image {
            require_url("previewImage", image)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    pub id: i32,
    pub slug: String,
    pub message: String,
}

/// Public submission. Lands in review as `pending` and is owned by the anonymous account.
pub async fn submit(state: &AppState, payload: SubmitRequest) -> AppResult<SubmitResponse> {
    payload.validate()?;

    let slug = available_slug(state, &payload.title).await?;
    let listing = NewListing {
        title: payload.title.trim().to_string(),
        slug,
        description: payload.description.trim().to_string(),
        category: payload.category.trim().to_string(),
        tags: None,
        price: payload.price,
        content_link: payload.content_link.trim().to_string(),
        purchase_link: None,
        preview_image: payload.preview_image,
        preview_media: None,
        creator_id: ANONYMOUS_ACCOUNT_ID,
        creator_name: payload.creator_name.trim().to_string(),
        creator_avatar: None,
        submitter_email: payload.email.map(|e| e.trim().to_lowercase()),
        featured: false,
        trending: false,
        required_platform_version: payload.required_platform_version,
    };

    let id = insert_unique(state, &listing, ListingStatus::Pending).await?;
    log::info!("listing submitted id={id} slug={}", listing.slug);

    Ok(SubmitResponse {
        id,
        slug: listing.slug,
        message: "Shortcut submitted for review".to_string(),
    })
}

pub async fn profile(state: &AppState, account: &Account) -> AppResult<Option<CreatorProfile>> {
    Ok(db::find_creator_profile(&state.pool, account.id).await?)
}

/// Slug for `title`, suffixed with `-N` when the plain form is taken.
pub(crate) async fn available_slug(state: &AppState, title: &str) -> AppResult<String> {
    let base = slug::slugify(title);
    if base.is_empty() {
        return Err(AppError::Validation(
            "title must contain at least one letter or digit".to_string(),
        ));
    }
    let taken = db::slugs_with_prefix(&state.pool, &base).await?;
    Ok(slug::first_free(&base, &taken))
}

/// Inserts a listing; a slug claimed concurrently surfaces as a conflict.
pub(crate) async fn insert_unique(
    state: &AppState,
    listing: &NewListing,
    status: ListingStatus,
) -> AppResult<i32> {
    match db::insert_listing(&state.pool, listing, status).await {
        Ok(id) => Ok(id),
        Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
            "slug {} is already in use",
            listing.slug
        ))),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SubmitRequest {
        serde_json::from_str(
            r#"{
                "title": "Morning Routine Pro!",
                "description": "Starts your day",
                "category": "Productivity",
                "contentLink": "https://www.icloud.com/shortcuts/abc",
                "creatorName": "A"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn price_defaults_to_free() {
        let req = request();
        assert_eq!(req.price, 0);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn malformed_content_link_is_rejected() {
        let mut req = request();
        req.content_link = "icloud shortcut".into();
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "contentLink must be a valid URL");
    }

    #[test]
    fn negative_price_and_bad_email_are_rejected() {
        let mut req = request();
        req.price = -1;
        assert_eq!(req.validate().unwrap_err().code(), "VALIDATION");

        let mut req = request();
        req.email = Some("nobody".into());
        assert_eq!(req.validate().unwrap_err().code(), "VALIDATION");
    }
}
