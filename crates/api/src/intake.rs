//! Reading the request body.
//!
//! A plain POST carries the JSON-RPC body directly. A `multipart/form-data`
//! POST carries it in the `jsonrpc` part, and every other part with a file
//! name is an upload to stage into the workspace. Uploads are held in memory
//! until the signature has been checked.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;

use crate::error::{GatewayError, GatewayResult};
use crate::state::AppState;

/// Name of the multipart part holding the JSON-RPC body.
pub const JSONRPC_PART: &str = "jsonrpc";

/// An uploaded file part.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub contents: Bytes,
}

/// The signed body plus any uploads that accompanied it.
#[derive(Debug, Clone, Default)]
pub struct Intake {
    pub body: Bytes,
    pub uploads: Vec<Upload>,
}

/// Read the body and uploads. An empty body is [`GatewayError::NoPostData`].
pub async fn read_intake(request: Request, state: &AppState) -> GatewayResult<Intake> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let intake = if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| GatewayError::Body(e.body_text()))?;
        read_multipart(multipart).await?
    } else {
        let body = Bytes::from_request(request, state)
            .await
            .map_err(|e| GatewayError::Body(e.body_text()))?;
        Intake {
            body,
            uploads: Vec::new(),
        }
    };

    if intake.body.is_empty() {
        return Err(GatewayError::NoPostData);
    }
    Ok(intake)
}

async fn read_multipart(mut multipart: Multipart) -> GatewayResult<Intake> {
    let mut intake = Intake::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::Body(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_owned);
        let data = field
            .bytes()
            .await
            .map_err(|e| GatewayError::Body(e.body_text()))?;

        if name == JSONRPC_PART {
            intake.body = data;
            continue;
        }

        match file_name {
            Some(file_name) => intake.uploads.push(Upload {
                file_name,
                contents: data,
            }),
            None => tracing::debug!(part = %name, "Ignoring multipart field without a file name"),
        }
    }

    Ok(intake)
}
