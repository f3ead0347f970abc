//! HTTP trigger handlers

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::metrics::IngressMetrics;
use crate::server::AppState;

use super::{DocumentEvent, TriggerOutcome};

/// Run the trigger for one document event
#[tracing::instrument(name = "http.document_event", skip(state, body))]
pub async fn document_event(
    State(state): State<AppState>,
    body: std::result::Result<Json<DocumentEvent>, JsonRejection>,
) -> Result<Json<TriggerOutcome>> {
    IngressMetrics::record_event_received();

    let Json(event) = body.map_err(|rejection| {
        IngressMetrics::record_event_rejected();
        AppError::Validation(rejection.body_text())
    })?;

    let outcome = state.triggers.handle_event(event).await?;
    Ok(Json(outcome))
}

/// Run the tomorrow-reminder sweep now
#[tracing::instrument(name = "http.run_reminders", skip(state))]
pub async fn run_reminders(State(state): State<AppState>) -> Result<Json<TriggerOutcome>> {
    let outcome = state.triggers.send_tomorrow_reminders().await?;
    Ok(Json(outcome))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResetRequest {
    #[serde(default)]
    national_id: Option<Value>,
}

impl PasswordResetRequest {
    /// Clients send the id as a string or a bare number
    fn national_id(&self) -> String {
        match &self.national_id {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PasswordResetResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request a password reset mail by national id.
///
/// Public endpoint used by the mobile app's "forgot password" screen. Always
/// answers `{ok, error?}`.
#[tracing::instrument(name = "http.password_reset", skip(state, body))]
pub async fn request_password_reset(State(state): State<AppState>, body: Bytes) -> Response {
    let request: PasswordResetRequest = serde_json::from_slice(&body).unwrap_or_default();

    match state
        .triggers
        .request_password_reset(&request.national_id())
        .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(PasswordResetResponse {
                ok: true,
                error: None,
            }),
        )
            .into_response(),
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(error = %e, "Password reset failed");
            } else {
                tracing::info!(reason = %e, "Password reset refused");
            }

            (
                status,
                Json(PasswordResetResponse {
                    ok: false,
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_national_id_forms() {
        let request: PasswordResetRequest =
            serde_json::from_str(r#"{"nationalId": " 9981 "}"#).unwrap();
        assert_eq!(request.national_id(), "9981");

        let request: PasswordResetRequest =
            serde_json::from_str(r#"{"nationalId": 9981}"#).unwrap();
        assert_eq!(request.national_id(), "9981");

        assert_eq!(PasswordResetRequest::default().national_id(), "");
    }

    #[test]
    fn test_response_shape() {
        let ok = serde_json::to_value(PasswordResetResponse {
            ok: true,
            error: None,
        })
        .unwrap();
        assert_eq!(ok, serde_json::json!({"ok": true}));
    }
}
