//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn engine output into an HTTP response
//! - Drop hop-by-hop headers a script should not control
//!
//! # Design Decisions
//! - Scripts own status, headers and body; nothing is added here
//! - Bodies are already buffered by the engine

use axum::body::Body;
use axum::http::header::{CONNECTION, TRANSFER_ENCODING};
use axum::response::Response;

use crate::engine::EngineOutput;

pub fn into_response(output: EngineOutput) -> Response {
    let EngineOutput {
        status,
        mut headers,
        body,
    } = output;
    headers.remove(CONNECTION);
    headers.remove(TRANSFER_ENCODING);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
