use crate::error::WebError;
use crate::server::AppState;
use crate::views::Notice;
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Multipart, State};
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use bridge::IngestError;
use bytes::Bytes;
use diagnostics::{error, info, warn};
use gate::Session;
use serde::Deserialize;
use std::sync::Arc;

/// Form field carrying the uploaded file
pub const FILE_FIELD: &str = "file";

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// The live session behind a request; rejects with 401 when there is none
pub struct CurrentSession(pub Session);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentSession {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = cookie_header(&parts.headers);
        state
            .gate
            .require_session(header.as_deref())
            .await
            .map(CurrentSession)
            .map_err(|_| WebError::Unauthenticated)
    }
}

/// All `Cookie` headers joined into one
fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!values.is_empty()).then(|| values.join("; "))
}

pub async fn login_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, WebError> {
    state.views.login(None)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    match state.gate.login(&form.username, &form.password).await {
        Ok(issued) => Ok((
            StatusCode::FOUND,
            [(LOCATION, "/upload".to_string()), (SET_COOKIE, issued.set_cookie)],
        )
            .into_response()),
        Err(e) => Ok(state.views.login(Some(&e.to_string()))?.into_response()),
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let header = cookie_header(&headers);
    let cleared = state.gate.logout(header.as_deref()).await;
    (
        StatusCode::FOUND,
        [(LOCATION, "/".to_string()), (SET_COOKIE, cleared)],
    )
        .into_response()
}

pub async fn upload_page(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
) -> Result<Html<String>, WebError> {
    render_upload(&state, &session, None)
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    mut multipart: Multipart,
) -> Result<Response, WebError> {
    let (filename, data) = read_file_field(&mut multipart).await?;

    let username = session.username.as_str();
    match state.bridge.ingest(&filename, data).await {
        Ok(receipt) => {
            let rows = receipt.rows;
            let table = receipt.table.as_str();
            info!("{username} replaced {table} with {rows} rows from {filename}", username, table, rows, filename);
            let notice = Notice::Success(receipt.message());
            Ok(render_upload(&state, &session, Some(&notice))?.into_response())
        }
        Err(e) => {
            let status = status_for(&e);
            let message = e.to_string();
            if status.is_client_error() {
                warn!("Upload from {username} rejected: {message}", username, message);
            } else {
                error!("Upload from {username} failed: {message}", username, message);
            }
            let notice = Notice::Failure(failure_text(&e, &filename));
            Ok((status, render_upload(&state, &session, Some(&notice))?).into_response())
        }
    }
}

/// 400 for problems with what the user sent, 500 for everything else
pub fn status_for(error: &IngestError) -> StatusCode {
    if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// What the upload page says about a failed ingest
///
/// Problems with the file itself are shown in full. Server-side failures
/// only say how far the upload got; the detail goes to the log.
pub fn failure_text(error: &IngestError, filename: &str) -> String {
    match error {
        IngestError::InvalidFilename { .. } | IngestError::EmptyUpload | IngestError::Parse { .. } => {
            error.to_string()
        }
        IngestError::Load { key, warehouse, .. } => {
            format!("Stored {key} but could not load it into {warehouse}")
        }
        IngestError::Store { key, .. } => format!("Could not store {key}"),
        _ => format!("Upload of {filename} failed"),
    }
}

fn render_upload(
    state: &AppState,
    session: &Session,
    notice: Option<&Notice>,
) -> Result<Html<String>, WebError> {
    let warehouse = state.bridge.warehouse();
    state
        .views
        .upload(&session.username, warehouse.name(), &warehouse.table(), notice)
}

/// The filename and contents of the `file` field; other fields are skipped
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), WebError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        return Ok((filename, data));
    }
    Err(WebError::MissingField(FILE_FIELD))
}
