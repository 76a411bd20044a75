use crate::server::ServerError;
use axum::extract::{FromRequestParts, Query as AxumQuery};
use serde::Deserialize;

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

/// The raw `page` value is handed to the paginator unparsed, so junk still yields a page.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}
