use crate::server::ServerRouter;
use axum::Router;

mod accounts;
mod admin;
mod follows;
mod groups;
mod posts;
mod profiles;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(posts::routes())
        .merge(groups::routes())
        .merge(profiles::routes())
        .merge(follows::routes())
        .merge(accounts::routes())
        .merge(admin::routes())
}
