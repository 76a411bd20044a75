use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    body::Bytes,
    extract::FromRequest,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;

#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> Json<T> {
    /// Serializes up front, for bodies that are kept around and replayed.
    pub fn to_bytes(&self) -> Result<Bytes, ServerError> {
        Ok(serde_json::to_vec(&self.0)?.into())
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match self.to_bytes() {
            Ok(json) => RawJson(json).into_response(),
            Err(err) => err.into_response(),
        }
    }
}

/// Already serialized JSON, sent as is.
#[derive(Debug, Clone, Default)]
pub struct RawJson(pub Bytes);

impl IntoResponse for RawJson {
    fn into_response(self) -> Response {
        (TypedHeader(ContentType::json()), self.0).into_response()
    }
}
