use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "WebMon API",
        version = "0.1.0",
        description = "Watch remote pages: poll a URL on a schedule, extract a value via XPath, keep the history."
    ),
    paths(
        crate::routes::list_watches,
        crate::routes::create_watch,
        crate::routes::get_watch,
        crate::routes::update_watch,
        crate::routes::delete_watch,
        crate::routes::latest_value,
        crate::routes::list_values,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::CreateWatchRequest,
        crate::dto::UpdateWatchRequest,
        crate::dto::WatchResponse,
        crate::dto::WatchListResponse,
        crate::dto::ValueResponse,
        crate::dto::ValueListResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "watches", description = "Watch management"),
        (name = "values", description = "Recorded values"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some("Per-user API token."))
                        .build(),
                ),
            );
        }
    }
}
