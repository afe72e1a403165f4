// src/db.rs

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};

use crate::models::{
    Account, CreatorProfile, Listing, ListingPatch, ListingStatus, NewListing, Purchase, Report,
    ReportStatus, Role,
};

// --- accounts ---

pub async fn find_account_by_id(pool: &PgPool, id: i32) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_account_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn insert_password_account(
    pool: &PgPool,
    open_id: &str,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<Account, sqlx::Error> {
    sqlx::query_as::<_, Account>(
        r#"INSERT INTO accounts (open_id, name, email, password_hash, login_method, role, last_signed_in)
           VALUES ($1, $2, $3, $4, 'email', $5, NOW())
           RETURNING *"#,
    )
    .bind(open_id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await
}

pub async fn touch_last_signed_in(pool: &PgPool, id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE accounts SET last_signed_in = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// --- creator profiles ---

pub async fn insert_creator_profile(pool: &PgPool, account_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO creator_profiles (account_id)
           VALUES ($1)
           ON CONFLICT (account_id) DO NOTHING"#,
    )
    .bind(account_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_creator_profile(
    pool: &PgPool,
    account_id: i32,
) -> Result<Option<CreatorProfile>, sqlx::Error> {
    sqlx::query_as::<_, CreatorProfile>("SELECT * FROM creator_profiles WHERE account_id = $1")
        .bind(account_id)
        .fetch_optional(pool)
        .await
}

/// Adds to a creator's counters. Accounts without a profile are left alone.
pub async fn bump_creator_counters(
    pool: &PgPool,
    account_id: i32,
    submitted: i32,
    approved: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE creator_profiles
           SET listings_submitted = listings_submitted + $2,
               listings_approved = listings_approved + $3,
               updated_at = NOW()
           WHERE account_id = $1"#,
    )
    .bind(account_id)
    .bind(submitted)
    .bind(approved)
    .execute(pool)
    .await?;
    Ok(())
}

// --- listings ---

/// Filters for the public listing browse. Only approved listings are ever returned.
#[derive(Debug, Default, Clone)]
pub struct ListingFilter {
    pub category: Option<String>,
    pub featured_only: bool,
    pub limit: Option<i64>,
}

pub fn approved_listings_query(filter: &ListingFilter) -> QueryBuilder<'_, Postgres> {
    let mut qb = QueryBuilder::new("SELECT * FROM listings WHERE status = 'approved'");
    if let Some(category) = filter.category.as_deref() {
        qb.push(" AND category = ").push_bind(category);
    }
    if filter.featured_only {
        qb.push(" AND featured = TRUE");
    }
    qb.push(" ORDER BY created_at DESC, id DESC");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }
    qb
}

pub async fn list_approved_listings(
    pool: &PgPool,
    filter: &ListingFilter,
) -> Result<Vec<Listing>, sqlx::Error> {
    let mut qb = approved_listings_query(filter);
    qb.build_query_as::<Listing>().fetch_all(pool).await
}

pub async fn find_listing_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Listing>, sqlx::Error> {
    sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
}

pub async fn find_listing_by_id(pool: &PgPool, id: i32) -> Result<Option<Listing>, sqlx::Error> {
    sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_listings_by_status(
    pool: &PgPool,
    status: ListingStatus,
) -> Result<Vec<Listing>, sqlx::Error> {
    sqlx::query_as::<_, Listing>(
        "SELECT * FROM listings WHERE status = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(status)
    .fetch_all(pool)
    .await
}

pub async fn list_all_listings(pool: &PgPool) -> Result<Vec<Listing>, sqlx::Error> {
    sqlx::query_as::<_, Listing>("SELECT * FROM listings ORDER BY created_at DESC, id DESC")
        .fetch_all(pool)
        .await
}

/// Slugs equal to `base` or of the form `base-<anything>`.
pub async fn slugs_with_prefix(pool: &PgPool, base: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query("SELECT slug FROM listings WHERE slug = $1 OR slug LIKE $2")
        .bind(base)
        .bind(format!("{base}-%"))
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("slug")).collect())
}

pub async fn insert_listing(
    pool: &PgPool,
    listing: &NewListing,
    status: ListingStatus,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO listings
                (title, slug, description, category, tags, price, content_link, purchase_link,
                 preview_image, preview_media, creator_id, creator_name, creator_avatar,
                 submitter_email, status, featured, trending, required_platform_version)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
           RETURNING id"#,
    )
    .bind(&listing.title)
    .bind(&listing.slug)
    .bind(&listing.description)
    .bind(&listing.category)
    .bind(listing.tags.as_deref())
    .bind(listing.price)
    .bind(&listing.content_link)
    .bind(listing.purchase_link.as_deref())
    .bind(listing.preview_image.as_deref())
    .bind(listing.preview_media.as_deref())
    .bind(listing.creator_id)
    .bind(&listing.creator_name)
    .bind(listing.creator_avatar.as_deref())
    .bind(listing.submitter_email.as_deref())
    .bind(status)
    .bind(listing.featured)
    .bind(listing.trending)
    .bind(listing.required_platform_version.as_deref())
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

/// Moves a listing to `status`. Returns the creator id when the row actually changed,
/// `None` when it was already in that status or does not exist.
pub async fn transition_listing(
    pool: &PgPool,
    id: i32,
    status: ListingStatus,
) -> Result<Option<i32>, sqlx::Error> {
    let row = sqlx::query(
        r#"UPDATE listings
           SET status = $2, updated_at = NOW()
           WHERE id = $1 AND status <> $2
           RETURNING creator_id"#,
    )
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.get("creator_id")))
}

/// `UPDATE` touching only the columns supplied in `patch`. `None` when the patch
/// has no column changes. Status is left out; it moves through `transition_listing`.
pub fn listing_update_query(id: i32, patch: &ListingPatch) -> Option<QueryBuilder<'_, Postgres>> {
    let mut qb = QueryBuilder::new("UPDATE listings SET ");
    let mut touched = false;
    {
        let mut set = qb.separated(", ");
        macro_rules! assign {
            ($column:literal, $value:expr) => {
                if let Some(value) = $value {
                    set.push(concat!($column, " = ")).push_bind_unseparated(value);
                    touched = true;
                }
            };
        }
        assign!("title", patch.title.as_deref());
        assign!("description", patch.description.as_deref());
        assign!("category", patch.category.as_deref());
        assign!("tags", patch.tags.as_deref());
        assign!("price", patch.price);
        assign!("content_link", patch.content_link.as_deref());
        assign!("purchase_link", patch.purchase_link.as_deref());
        assign!("preview_image", patch.preview_image.as_deref());
        assign!("preview_media", patch.preview_media.as_deref());
        assign!("creator_name", patch.creator_name.as_deref());
        assign!("creator_avatar", patch.creator_avatar.as_deref());
        assign!("featured", patch.featured);
        assign!("trending", patch.trending);
        assign!("required_platform_version", patch.required_platform_version.as_deref());
        set.push("updated_at = NOW()");
    }
    if !touched {
        return None;
    }
    qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");
    Some(qb)
}

/// Applies the column changes in `patch`. `Ok(None)` when the listing does not exist.
pub async fn update_listing_fields(
    pool: &PgPool,
    id: i32,
    patch: &ListingPatch,
) -> Result<Option<Listing>, sqlx::Error> {
    match listing_update_query(id, patch) {
        Some(mut qb) => qb.build_query_as::<Listing>().fetch_optional(pool).await,
        None => find_listing_by_id(pool, id).await,
    }
}

// --- purchases ---

/// Inserts a completed purchase. Returns `None` if this payment intent was already recorded.
pub async fn record_completed_purchase(
    conn: &mut PgConnection,
    buyer_id: i32,
    listing_id: i32,
    price: i32,
    payment_intent_id: &str,
) -> Result<Option<Purchase>, sqlx::Error> {
    sqlx::query_as::<_, Purchase>(
        r#"INSERT INTO purchases (buyer_id, listing_id, price, payment_intent_id, status)
           VALUES ($1, $2, $3, $4, 'completed')
           ON CONFLICT (payment_intent_id) DO NOTHING
           RETURNING *"#,
    )
    .bind(buyer_id)
    .bind(listing_id)
    .bind(price)
    .bind(payment_intent_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Credits a sale to the listing and, if it has a profile, its creator.
pub async fn apply_sale(
    conn: &mut PgConnection,
    listing_id: i32,
    price: i32,
) -> Result<(), sqlx::Error> {
    let row = sqlx::query(
        r#"UPDATE listings
           SET purchases = purchases + 1, updated_at = NOW()
           WHERE id = $1
           RETURNING creator_id"#,
    )
    .bind(listing_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(());
    };
    let creator_id: i32 = row.get("creator_id");

    sqlx::query(
        r#"UPDATE creator_profiles
           SET listings_sold = listings_sold + 1,
               pending_earnings = pending_earnings + $2,
               updated_at = NOW()
           WHERE account_id = $1"#,
    )
    .bind(creator_id)
    .bind(price)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn mark_purchase_refunded(
    pool: &PgPool,
    payment_intent_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE purchases
           SET status = 'refunded'
           WHERE payment_intent_id = $1 AND status <> 'refunded'"#,
    )
    .bind(payment_intent_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_purchase_by_intent(
    pool: &PgPool,
    payment_intent_id: &str,
) -> Result<Option<Purchase>, sqlx::Error> {
    sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE payment_intent_id = $1")
        .bind(payment_intent_id)
        .fetch_optional(pool)
        .await
}

// --- reports ---

pub async fn insert_report(
    pool: &PgPool,
    listing_id: i32,
    reporter_id: i32,
    reason: &str,
) -> Result<Report, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        r#"INSERT INTO reports (listing_id, reporter_id, reason)
           VALUES ($1, $2, $3)
           RETURNING *"#,
    )
    .bind(listing_id)
    .bind(reporter_id)
    .bind(reason)
    .fetch_one(pool)
    .await
}

pub async fn list_reports(
    pool: &PgPool,
    status: Option<ReportStatus>,
) -> Result<Vec<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        r#"SELECT * FROM reports
           WHERE $1::report_status IS NULL OR status = $1
           ORDER BY created_at DESC, id DESC"#,
    )
    .bind(status)
    .fetch_all(pool)
    .await
}

pub async fn set_report_status(
    pool: &PgPool,
    id: i32,
    status: ReportStatus,
) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>("UPDATE reports SET status = $2 WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await
}
