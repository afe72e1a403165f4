// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Account id that owns submissions made without signing in.
pub const ANONYMOUS_ACCOUNT_ID: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "account_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Creator,
    Admin,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i32,
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub login_method: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_signed_in: Option<DateTime<Utc>>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "listing_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: String,
    pub tags: Option<String>,
    /// Minor currency units (cents). Zero means the free-download path.
    pub price: i32,
    pub content_link: String,
    pub purchase_link: Option<String>,
    pub preview_image: Option<String>,
    pub preview_media: Option<String>,
    pub creator_id: i32,
    pub creator_name: String,
    pub creator_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter_email: Option<String>,
    pub status: ListingStatus,
    pub featured: bool,
    pub trending: bool,
    pub downloads: i32,
    pub purchases: i32,
    pub required_platform_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn is_free(&self) -> bool {
        self.price == 0
    }
}

/// Listing as it leaves the service: adds the human-readable price.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    #[serde(flatten)]
    pub listing: Listing,
    pub display_price: String,
}

impl ListingView {
    /// View for administrators, submitter contact included.
    pub fn full(listing: Listing) -> Self {
        let display_price = format_price(listing.price);
        Self {
            listing,
            display_price,
        }
    }

    /// View for everyone else.
    pub fn public(mut listing: Listing) -> Self {
        listing.submitter_email = None;
        Self::full(listing)
    }
}

/// Renders an amount in cents the way a buyer reads it, e.g. 299 -> "$2.99".
pub fn format_price(cents: i32) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = i64::from(cents).abs();
    format!("{sign}${}.{:02}", cents / 100, cents % 100)
}

/// Fields of a listing as inserted. Status is chosen by the caller.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: String,
    pub tags: Option<String>,
    pub price: i32,
    pub content_link: String,
    pub purchase_link: Option<String>,
    pub preview_image: Option<String>,
    pub preview_media: Option<String>,
    pub creator_id: i32,
    pub creator_name: String,
    pub creator_avatar: Option<String>,
    pub submitter_email: Option<String>,
    pub featured: bool,
    pub trending: bool,
    pub required_platform_version: Option<String>,
}

/// Partial update of a listing. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub price: Option<i32>,
    pub content_link: Option<String>,
    pub purchase_link: Option<String>,
    pub preview_image: Option<String>,
    pub preview_media: Option<String>,
    pub creator_name: Option<String>,
    pub creator_avatar: Option<String>,
    pub status: Option<ListingStatus>,
    pub featured: Option<bool>,
    pub trending: Option<bool>,
    pub required_platform_version: Option<String>,
}

impl ListingPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && self.price.is_none()
            && self.content_link.is_none()
            && self.purchase_link.is_none()
            && self.preview_image.is_none()
            && self.preview_media.is_none()
            && self.creator_name.is_none()
            && self.creator_avatar.is_none()
            && self.status.is_none()
            && self.featured.is_none()
            && self.trending.is_none()
            && self.required_platform_version.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentAccountStatus {
    Pending,
    Active,
    Restricted,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatorProfile {
    pub id: i32,
    pub account_id: i32,
    pub payment_account_id: Option<String>,
    pub payment_account_status: PaymentAccountStatus,
    pub total_earnings: i32,
    pub pending_earnings: i32,
    pub listings_submitted: i32,
    pub listings_approved: i32,
    pub listings_sold: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "purchase_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: i32,
    pub buyer_id: i32,
    pub listing_id: i32,
    /// Price paid, captured when the purchase was recorded.
    pub price: i32,
    pub payment_intent_id: Option<String>,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "report_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i32,
    pub listing_id: i32,
    pub reporter_id: i32,
    pub reason: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_listing() -> Listing {
        let now = Utc::now();
        Listing {
            id: 7,
            title: "Morning Routine Pro".to_string(),
            slug: "morning-routine-pro".to_string(),
            description: "Starts your day".to_string(),
            category: "Productivity".to_string(),
            tags: None,
            price: 299,
            content_link: "https://www.icloud.com/shortcuts/abc".to_string(),
            purchase_link: Some("https://store.example/morning".to_string()),
            preview_image: None,
            preview_media: None,
            creator_id: ANONYMOUS_ACCOUNT_ID,
            creator_name: "A".to_string(),
            creator_avatar: None,
            submitter_email: Some("a@b.com".to_string()),
            status: ListingStatus::Pending,
            featured: false,
            trending: false,
            downloads: 0,
            purchases: 0,
            required_platform_version: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn price_renders_as_dollars_and_cents() {
        assert_eq!(format_price(299), "$2.99");
        assert_eq!(format_price(0), "$0.00");
        assert_eq!(format_price(5), "$0.05");
        assert_eq!(format_price(100_000), "$1000.00");
    }

    #[test]
    fn free_means_zero_price() {
        let mut listing = sample_listing();
        assert!(!listing.is_free());
        listing.price = 0;
        assert!(listing.is_free());
    }

    #[test]
    fn null_in_patch_payload_is_the_same_as_absent() {
        let patch: ListingPatch =
            serde_json::from_str(r#"{"purchaseLink": null, "trending": true}"#).unwrap();
        assert!(!patch.is_empty());
        assert!(patch.purchase_link.is_none());
        assert_eq!(patch.trending, Some(true));
    }

    #[test]
    fn empty_patch_is_detected() {
        let patch: ListingPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn public_view_hides_submitter_email() {
        let public = serde_json::to_value(ListingView::public(sample_listing())).unwrap();
        assert!(public.get("submitterEmail").is_none());
        assert_eq!(public["displayPrice"], "$2.99");
        assert_eq!(public["status"], "pending");
        assert_eq!(public["contentLink"], "https://www.icloud.com/shortcuts/abc");

        let full = serde_json::to_value(ListingView::full(sample_listing())).unwrap();
        assert_eq!(full["submitterEmail"], "a@b.com");
    }

    #[test]
    fn account_never_serialises_password_hash() {
        let now = Utc::now();
        let account = Account {
            id: 1,
            open_id: "abc".into(),
            name: Some("A".into()),
            email: Some("a@b.com".into()),
            password_hash: Some("$2b$12$secret".into()),
            login_method: "email".into(),
            role: Role::User,
            created_at: now,
            updated_at: now,
            last_signed_in: None,
        };
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "user");
        assert!(!account.is_admin());
    }
}
