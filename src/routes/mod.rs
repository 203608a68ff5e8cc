use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod annotations;
pub mod assets;
pub mod auth;
pub mod copilot;
pub mod files;
pub mod health;
pub mod preprints;
pub mod settings;
pub mod signups;
pub mod tags;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let files_routes = Router::new()
        .route("/", get(files::list_files).post(files::create_file))
        .route(
            "/:id",
            get(files::get_file)
                .put(files::update_file)
                .delete(files::delete_file),
        )
        .route("/:id/content", get(files::file_content))
        .route("/:id/content/:section", get(files::file_section))
        .route("/:id/duplicate", post(files::duplicate_file))
        .route("/:id/publish", post(files::publish_file))
        .route(
            "/:id/tags/:tag_id",
            post(tags::attach_tag).delete(tags::detach_tag),
        )
        .route(
            "/:id/annotations",
            get(annotations::list_annotations).post(annotations::create_annotation),
        );

    let users_routes = Router::new()
        .route("/:id/tags", get(tags::list_tags).post(tags::create_tag))
        .route(
            "/:id/tags/:tag_id",
            put(tags::update_tag).delete(tags::delete_tag),
        );

    let assets_routes = Router::new()
        .route("/", get(assets::list_assets).post(assets::create_asset))
        .route(
            "/:id",
            get(assets::get_asset)
                .put(assets::update_asset)
                .delete(assets::delete_asset),
        );

    let settings_routes = Router::new()
        .route(
            "/user",
            get(settings::get_user_settings).post(settings::save_user_settings),
        )
        .route(
            "/files/:file_id",
            get(settings::get_file_settings).post(settings::save_file_settings),
        );

    let annotations_routes = Router::new()
        .route(
            "/:id",
            put(annotations::update_annotation).delete(annotations::delete_annotation),
        )
        .route(
            "/:id/messages",
            get(annotations::list_messages).post(annotations::create_message),
        );

    let copilot_routes = Router::new().route("/chat", post(copilot::chat));

    let signup_routes = Router::new()
        .route("/", post(signups::create_signup))
        .route("/status", get(signups::signup_status))
        .route("/unsubscribe/:token", delete(signups::unsubscribe));

    let preprint_routes = Router::new()
        .route("/:identifier", get(preprints::get_preprint))
        .route("/:identifier/metadata", get(preprints::preprint_metadata))
        .route(
            "/:identifier/export/bibtex",
            get(preprints::export_bibtex),
        )
        .route("/:identifier/static-html", get(preprints::static_html))
        .route("/:identifier/dublin-core", get(preprints::dublin_core))
        .route("/:identifier/schema-org", get(preprints::schema_org));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/files", files_routes)
        .nest("/users", users_routes)
        .nest("/assets", assets_routes)
        .nest("/settings", settings_routes)
        .nest("/annotations", annotations_routes)
        .nest("/copilot", copilot_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/verify/:token", post(auth::verify_email))
        .nest("/signup", signup_routes)
        .nest("/ication", preprint_routes)
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024 * 32))
}
