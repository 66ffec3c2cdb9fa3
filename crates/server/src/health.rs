use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use hrdesk_core::capability::names;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    registered: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub capabilities: HealthCheck,
    pub checked_at: String,
}

pub fn router(registered: Vec<String>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { registered })
}

pub async fn spawn(bind_address: &str, port: u16, registered: Vec<String>) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(registered)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let capabilities = capability_check(&state.registered);
    let ready = capabilities.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "hrdesk-server runtime initialized".to_string(),
        },
        capabilities,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn capability_check(registered: &[String]) -> HealthCheck {
    let missing: Vec<&str> = names::ALL
        .iter()
        .copied()
        .filter(|name| !registered.iter().any(|registered| registered == name))
        .collect();

    if missing.is_empty() {
        HealthCheck {
            status: "ready",
            detail: format!("all {} required capabilities registered", names::ALL.len()),
        }
    } else {
        HealthCheck {
            status: "degraded",
            detail: format!("missing capabilities: {}", missing.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use hrdesk_core::capability::names;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_is_ready_with_a_full_registry() {
        let registered: Vec<String> = names::ALL.iter().map(|name| name.to_string()).collect();

        let (status, Json(payload)) = health(State(HealthState { registered })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.capabilities.status, "ready");
    }

    #[tokio::test]
    async fn health_degrades_when_a_capability_is_missing() {
        let registered = vec![names::POLICY_SEARCH.to_string()];

        let (status, Json(payload)) = health(State(HealthState { registered })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert!(payload.capabilities.detail.contains(names::LEAVE_SUBMIT));
    }
}
