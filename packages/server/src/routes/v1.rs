use axum::routing::get;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/storages", storage_routes())
        .nest("/files", file_routes(config))
        // Undocumented alias of `GET /files/{id}`.
        .route("/download/{id}", get(handlers::files::download_file))
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::register))
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::me))
}

fn user_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::users::list_users))
        .routes(routes!(
            handlers::users::get_user,
            handlers::users::update_user,
            handlers::users::deactivate_user
        ))
}

fn storage_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::storages::list_storages))
        .routes(routes!(handlers::storages::get_storage))
}

fn file_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::files::upload_file))
        .layer(handlers::files::upload_body_limit(
            config.storage.max_upload_size,
        ));

    OpenApiRouter::new()
        .routes(routes!(
            handlers::files::download_file,
            handlers::files::update_file,
            handlers::files::delete_file
        ))
        .merge(upload)
}
