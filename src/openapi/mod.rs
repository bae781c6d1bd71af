use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Montaz API",
        version = "0.3.0",
        description = r#"
# Installation Orders API

Backend for door and flooring installation orders placed by stores and carried
out by installation companies, their installers and transporters.

## Features

- **Orders**: registration, two status tracks (installation and transport), financial flags
- **Assignments**: companies, installers and transporters with date-ordering checks
- **Complaints**: notes and photo uploads on orders in complaint status
- **Directory**: users in four roles, stores, companies and the stores they serve
- **Schedule**: weekly installer calendar with double-booking detection
- **Settings**: typed key/value configuration grouped by category

## Authentication

Log in with `POST /api/v1/auth/login` and send the token on every request:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Errors share one format:

```json
{
  "error": "Forbidden",
  "message": "Installer 7 is not assigned to order ZL-2025-04-1001",
  "timestamp": "2025-04-18T08:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Orders", description = "Order registration and lifecycle"),
        (name = "Directory", description = "Users, stores and companies"),
        (name = "Schedule", description = "Installer calendar"),
        (name = "Settings", description = "Application settings"),
        (name = "Auth", description = "Login and bootstrap")
    ),
    paths(
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::update_installation_status,
        crate::handlers::orders::update_transport_status,
        crate::handlers::orders::assign_installer,
        crate::handlers::orders::assign_transporter,
        crate::handlers::orders::assign_company,
        crate::handlers::orders::update_financial_flags,
        crate::handlers::orders::record_complaint,
        crate::handlers::orders::upload_photos,
        crate::handlers::orders::remove_photo,
        crate::handlers::orders::get_order_permissions,

        // Directory
        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::stores::list_stores,
        crate::handlers::stores::get_store,
        crate::handlers::stores::create_store,
        crate::handlers::stores::update_store,
        crate::handlers::stores::delete_store,
        crate::handlers::companies::list_companies,
        crate::handlers::companies::get_company,
        crate::handlers::companies::create_company,
        crate::handlers::companies::update_company,
        crate::handlers::companies::delete_company,
        crate::handlers::companies::list_company_stores,
        crate::handlers::companies::link_store,
        crate::handlers::companies::unlink_store,

        // Settings and schedule
        crate::handlers::settings::list_settings,
        crate::handlers::settings::get_setting,
        crate::handlers::settings::upsert_setting,
        crate::handlers::settings::update_category,
        crate::handlers::schedule::list_schedule,
        crate::handlers::schedule::add_schedule_entry,
        crate::handlers::schedule::edit_schedule_entry,
        crate::handlers::schedule::complete_schedule_entry,
        crate::handlers::schedule::delete_schedule_entry,

        // Auth
        crate::handlers::auth::login,
        crate::handlers::auth::setup_admin,
        crate::handlers::auth::setup_status,
        crate::handlers::auth::me,
        crate::handlers::version::get_version,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ResponseMeta,

            // Orders
            crate::services::orders::OrderResponse,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::UpdateOrderRequest,
            crate::services::orders::StatusComment,
            crate::services::order_lifecycle::UpdateStatusRequest,
            crate::services::order_lifecycle::AssignInstallerRequest,
            crate::services::order_lifecycle::AssignTransporterRequest,
            crate::services::order_lifecycle::AssignCompanyRequest,
            crate::services::order_lifecycle::FinancialFlagsRequest,
            crate::services::order_lifecycle::ComplaintRequest,
            crate::services::order_lifecycle::RemovePhotoRequest,
            crate::auth::OrderPermissions,

            // Directory
            crate::services::users::UserResponse,
            crate::services::users::CreateUserRequest,
            crate::services::users::UpdateUserRequest,
            crate::services::stores::CreateStoreRequest,
            crate::services::stores::UpdateStoreRequest,
            crate::services::companies::CreateCompanyRequest,
            crate::services::companies::UpdateCompanyRequest,
            crate::entities::store::Model,
            crate::entities::company::Model,
            crate::entities::company_store::Model,

            // Settings and schedule
            crate::services::settings::SettingResponse,
            crate::services::settings::UpsertSettingRequest,
            crate::handlers::settings::CategoryValues,
            crate::services::schedule::ScheduleEntryResponse,
            crate::services::schedule::CreateScheduleEntryRequest,
            crate::services::schedule::UpdateScheduleEntryRequest,
            crate::services::schedule::WeekSchedule,

            // Auth
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::LoginResponse,
            crate::handlers::auth::SetupStatus,
            crate::auth::TokenResponse,
            crate::handlers::version::VersionInfo,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Registers the `Bearer` scheme referenced by the secured paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
