use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::info,
        crate::api::health,
        crate::api::rpc_query,
        crate::api::rpc_mutation,
        crate::api::webhooks_stripe::stripe_webhook
    ),
    components(
        schemas(
            crate::api::RpcSuccess,
            crate::api::Health,
            crate::api::Ack,
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::listings::ListInput,
            crate::api::listings::SlugInput,
            crate::api::listings::ReportInput,
            crate::api::payment::CreateCheckoutRequest,
            crate::api::payment::CheckoutResponse,
            crate::api::creator::SubmitRequest,
            crate::api::creator::SubmitResponse,
            crate::api::admin::IdInput,
            crate::api::admin::CreateDirectRequest,
            crate::api::admin::CreateDirectResponse,
            crate::api::admin::ReportsQuery,
            crate::api::admin::ResolveReportRequest,
            crate::models::Account,
            crate::models::Role,
            crate::models::Listing,
            crate::models::ListingStatus,
            crate::models::ListingPatch,
            crate::models::CreatorProfile,
            crate::models::PaymentAccountStatus,
            crate::models::Purchase,
            crate::models::PurchaseStatus,
            crate::models::Report,
            crate::models::ReportStatus
        )
    ),
    tags(
        (name = "service", description = "Health and service info"),
        (name = "rpc", description = "Namespaced procedures: listings, auth, payment, creator, admin"),
        (name = "webhooks", description = "Callbacks from Stripe")
    )
)]
pub struct ApiDoc;
