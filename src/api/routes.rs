use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::error::{status_for, ApiError};
use crate::engine::{Action, ActionOutcome, AvailabilityChange, Dispatcher, PollResponse};
use crate::error::DispatchError;
use crate::models::{Alert, DriverAssignment, NewAlert};

const DEFAULT_CONSUMER: &str = "default";
const DEFAULT_HISTORY_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub consumer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: Action,
    #[serde(default)]
    pub payload: Option<DriverAssignment>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Availability {
    pub available: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SimulationToggle {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct Created {
    pub ok: bool,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// `GET /api/health`
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// `GET /api/alerts?consumer=<id>`
pub async fn poll(
    State(dispatcher): State<Dispatcher>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResponse>, ApiError> {
    let consumer = query
        .consumer
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONSUMER.to_string());
    Ok(Json(dispatcher.poll(&consumer).await?))
}

/// `POST /api/alerts`
pub async fn submit_alert(
    State(dispatcher): State<Dispatcher>,
    body: Result<Json<NewAlert>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let Json(new_alert) = body?;
    let id = dispatcher.submit_alert(new_alert).await?;
    Ok((StatusCode::CREATED, Json(Created { ok: true, id })))
}

/// `GET /api/alerts/:id`
pub async fn alert(
    State(dispatcher): State<Dispatcher>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    let alert = dispatcher
        .alert(&id)
        .await?
        .ok_or(DispatchError::NotFound(id))?;
    Ok(Json(alert))
}

/// `POST /api/alerts/:id/actions`
pub async fn submit_action(
    State(dispatcher): State<Dispatcher>,
    Path(id): Path<String>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> (StatusCode, Json<ActionOutcome>) {
    let outcome = match body {
        Ok(Json(request)) => {
            dispatcher
                .submit_action(&id, request.action, request.payload)
                .await
        }
        Err(rejection) => {
            let err = DispatchError::InvalidRequest(rejection.body_text());
            warn!("Action on alert {} refused: {}", id, err);
            ActionOutcome::failure(&err)
        }
    };
    let status = outcome
        .error
        .as_ref()
        .map_or(StatusCode::OK, |e| status_for(e.kind));
    (status, Json(outcome))
}

/// `DELETE /api/consumers/:consumer`
///
/// Drops the consumer's change channel; its next poll reports `changed`.
pub async fn forget_consumer(
    State(dispatcher): State<Dispatcher>,
    Path(consumer): Path<String>,
) -> Result<StatusCode, ApiError> {
    if dispatcher.forget_consumer(&consumer).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(DispatchError::NotFound(consumer).into())
    }
}

/// `GET /api/alerts/history?limit=<n>`
pub async fn history(
    State(dispatcher): State<Dispatcher>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(dispatcher.list_history(limit).await?))
}

/// `GET /api/operator/availability`
pub async fn operator_availability(
    State(dispatcher): State<Dispatcher>,
) -> Result<Json<Availability>, ApiError> {
    let available = dispatcher.operator_available().await?;
    Ok(Json(Availability { available }))
}

/// `PUT /api/operator/availability`
pub async fn set_operator_availability(
    State(dispatcher): State<Dispatcher>,
    body: Result<Json<Availability>, JsonRejection>,
) -> Result<Json<AvailabilityChange>, ApiError> {
    let Json(body) = body?;
    Ok(Json(dispatcher.set_operator_availability(body.available).await?))
}

/// `GET /api/simulation`
pub async fn simulation(
    State(dispatcher): State<Dispatcher>,
) -> Result<Json<SimulationToggle>, ApiError> {
    let enabled = dispatcher.simulation_enabled().await?;
    Ok(Json(SimulationToggle { enabled }))
}

/// `PUT /api/simulation`
pub async fn set_simulation(
    State(dispatcher): State<Dispatcher>,
    body: Result<Json<SimulationToggle>, JsonRejection>,
) -> Result<Json<SimulationToggle>, ApiError> {
    let Json(body) = body?;
    dispatcher.set_simulation_enabled(body.enabled).await?;
    Ok(Json(SimulationToggle { enabled: body.enabled }))
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::engine::{Dispatcher, EngineSettings, SimulationSettings};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, Dispatcher) {
        let settings = EngineSettings {
            simulation: SimulationSettings {
                enabled: false,
                ..SimulationSettings::default()
            },
            ..EngineSettings::default()
        };
        let dispatcher = Dispatcher::new(settings, StdRng::seed_from_u64(3));
        (router(dispatcher.clone()), dispatcher)
    }

    fn make_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn new_alert(id: &str) -> Value {
        json!({
            "id": id,
            "location": "DHA Phase 6 Lahore",
            "coordinates": { "lat": 31.47, "lng": 74.45 }
        })
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let (app, _) = app();
        let (status, json) = send(&app, make_request("GET", "/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_submitted_alert_shows_up_in_poll() {
        let (app, dispatcher) = app();
        let (status, json) = send(&app, make_request("POST", "/api/alerts", Some(new_alert("#22446")))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["id"], "#22446");

        let (status, json) = send(&app, make_request("GET", "/api/alerts?consumer=driver", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["changed"], true);
        let alert = &json["alerts"][0];
        assert_eq!(alert["id"], "#22446");
        assert_eq!(alert["status"], "Waiting");
        assert_eq!(alert["timeRemaining"], 30);

        let (_, json) = send(&app, make_request("GET", "/api/alerts?consumer=driver", None)).await;
        assert_eq!(json["changed"], false);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_submission_returns_409() {
        let (app, dispatcher) = app();
        send(&app, make_request("POST", "/api/alerts", Some(new_alert("X1")))).await;
        let (status, json) = send(&app, make_request("POST", "/api/alerts", Some(new_alert("X1")))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["kind"], "DuplicateIdError");
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_accept_then_busy_then_complete() {
        let (app, dispatcher) = app();
        send(&app, make_request("POST", "/api/alerts", Some(new_alert("#22446")))).await;
        send(&app, make_request("POST", "/api/alerts", Some(new_alert("#22447")))).await;

        let accept = json!({
            "action": "accept",
            "payload": { "driver": "D-7", "driverName": "Bilal", "contactNo": "0300-1234567" }
        });
        let (status, json) = send(
            &app,
            make_request("POST", "/api/alerts/%2322446/actions", Some(accept.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "ok": true, "status": "Accepted" }));

        let (status, json) = send(
            &app,
            make_request("POST", "/api/alerts/%2322447/actions", Some(accept)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["kind"], "AlertBusyError");

        let (status, json) = send(
            &app,
            make_request("GET", "/api/alerts/%2322446", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["driverName"], "Bilal");
        assert_eq!(json["timeRemaining"], Value::Null);

        let (status, _) = send(
            &app,
            make_request(
                "POST",
                "/api/alerts/%2322446/actions",
                Some(json!({ "action": "complete" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, json) = send(&app, make_request("GET", "/api/alerts/history?limit=5", None)).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["status"], "Completed");
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_action_on_unknown_alert_returns_404() {
        let (app, _) = app();
        let (status, json) = send(
            &app,
            make_request("POST", "/api/alerts/nope/actions", Some(json!({ "action": "reject" }))),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["kind"], "NotFoundError");

        let (status, _) = send(&app, make_request("GET", "/api/alerts/nope", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_transition_returns_409() {
        let (app, dispatcher) = app();
        send(&app, make_request("POST", "/api/alerts", Some(new_alert("A")))).await;
        let (status, json) = send(
            &app,
            make_request("POST", "/api/alerts/A/actions", Some(json!({ "action": "cancel" }))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["kind"], "InvalidTransitionError");
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_operator_unavailable_rejects_waiting() {
        let (app, dispatcher) = app();
        send(&app, make_request("POST", "/api/alerts", Some(new_alert("A")))).await;
        send(&app, make_request("POST", "/api/alerts", Some(new_alert("B")))).await;

        let (status, json) = send(
            &app,
            make_request("PUT", "/api/operator/availability", Some(json!({ "available": false }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "available": false, "rejected": ["A", "B"] }));

        let (_, json) = send(&app, make_request("GET", "/api/operator/availability", None)).await;
        assert_eq!(json["available"], false);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_simulation_toggle_round_trips() {
        let (app, _) = app();
        let (_, json) = send(&app, make_request("GET", "/api/simulation", None)).await;
        assert_eq!(json["enabled"], false);
        let (status, json) = send(
            &app,
            make_request("PUT", "/api/simulation", Some(json!({ "enabled": true }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["enabled"], true);
    }

    #[tokio::test]
    async fn test_forgotten_consumer_sees_change_again() {
        let (app, _) = app();
        send(&app, make_request("GET", "/api/alerts?consumer=admin", None)).await;
        let (_, json) = send(&app, make_request("GET", "/api/alerts?consumer=admin", None)).await;
        assert_eq!(json["changed"], false);

        let (status, _) = send(&app, make_request("DELETE", "/api/consumers/admin", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, json) = send(&app, make_request("GET", "/api/alerts?consumer=admin", None)).await;
        assert_eq!(json["changed"], true);

        let (status, _) = send(&app, make_request("DELETE", "/api/consumers/ghost", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_action_reports_invalid_request() {
        let (app, dispatcher) = app();
        send(&app, make_request("POST", "/api/alerts", Some(new_alert("A")))).await;
        let (status, json) = send(
            &app,
            make_request("POST", "/api/alerts/A/actions", Some(json!({ "action": "teleport" }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["kind"], "InvalidRequestError");

        let (_, json) = send(&app, make_request("GET", "/api/alerts/A", None)).await;
        assert_eq!(json["status"], "Waiting");
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_json_body_uses_error_envelope() {
        let (app, _) = app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/alerts")
            .header("Content-Type", "application/json")
            .body(Body::from("{\"location\": "))
            .unwrap();
        let (status, json) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["kind"], "InvalidRequestError");

        let (status, json) = send(
            &app,
            make_request("PUT", "/api/operator/availability", Some(json!({ "available": "maybe" }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["kind"], "InvalidRequestError");
    }

    #[tokio::test]
    async fn test_missing_location_is_bad_request() {
        let (app, _) = app();
        let body = json!({ "location": "", "coordinates": { "lat": 31.5, "lng": 74.3 } });
        let (status, json) = send(&app, make_request("POST", "/api/alerts", Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["kind"], "InvalidRequestError");
    }
}
