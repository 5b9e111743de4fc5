use std::sync::Arc;

use actix_web::{
    HttpResponse, ResponseError,
    http::StatusCode,
    web::{self, Json},
};
use derive_more::derive::{Display, Error};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::device::{DeviceType, EvseApi};
use crate::entity::{EntityError, EntityInput};
use crate::integration::EvseIntegration;
use crate::settings::{EvseSettings, EvseSettingsUpdate};

pub fn new_routes<A: EvseApi + 'static>(integration: Arc<EvseIntegration<A>>) -> actix_web::Scope {
    web::scope("/api/evse")
        .route("/entities", web::get().to(get_entities::<A>))
        .route("/entities/{id}", web::get().to(get_entity::<A>))
        .route("/entities/{id}", web::put().to(set_entity::<A>))
        .route("/entities/{id}/press", web::post().to(press_entity::<A>))
        .route("/refresh", web::post().to(request_refresh::<A>))
        .route("/device", web::get().to(get_device::<A>))
        .route("/config", web::get().to(get_config::<A>))
        .route("/config", web::put().to(update_config::<A>))
        .app_data(web::Data::from(integration))
}

type ApiResponse = Result<HttpResponse, ApiError>;

#[derive(Debug, Error, Display)]
enum ApiError {
    #[display("{_0}")]
    Entity(#[error(not(source))] EntityError),

    #[display("Invalid configuration: {_0}")]
    InvalidConfig(#[error(not(source))] String),
}

impl From<EntityError> for ApiError {
    fn from(e: EntityError) -> Self {
        ApiError::Entity(e)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        tracing::warn!("EVSE API error: {:?}", self);

        match self {
            ApiError::Entity(EntityError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Entity(EntityError::NotSupported(_)) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Entity(EntityError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Entity(EntityError::Rejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[derive(Debug, Deserialize)]
struct SetValueDTO {
    value: EntityInput,
}

/// Settings as shown to clients. Credentials are never echoed.
#[derive(Debug, Serialize)]
struct ConfigDTO {
    host: String,
    device_name: String,
    device_type: DeviceType,
    update_rate_secs: u64,
    has_credentials: bool,
}

impl From<EvseSettings> for ConfigDTO {
    fn from(settings: EvseSettings) -> Self {
        Self {
            has_credentials: settings.connection().credentials.is_some(),
            host: settings.host,
            device_name: settings.device_name,
            device_type: settings.device_type,
            update_rate_secs: settings.update_rate_secs,
        }
    }
}

async fn get_entities<A: EvseApi>(integration: web::Data<EvseIntegration<A>>) -> HttpResponse {
    HttpResponse::Ok().json(integration.registry().states())
}

async fn get_entity<A: EvseApi>(integration: web::Data<EvseIntegration<A>>, id: web::Path<String>) -> ApiResponse {
    match integration.registry().state(&id) {
        Some(state) => Ok(HttpResponse::Ok().json(state)),
        None => Err(EntityError::NotFound(id.into_inner()).into()),
    }
}

async fn set_entity<A: EvseApi>(
    integration: web::Data<EvseIntegration<A>>,
    id: web::Path<String>,
    Json(dto): Json<SetValueDTO>,
) -> ApiResponse {
    integration.registry().apply(&id, dto.value).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn press_entity<A: EvseApi>(integration: web::Data<EvseIntegration<A>>, id: web::Path<String>) -> ApiResponse {
    integration.registry().press(&id).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn request_refresh<A: EvseApi>(integration: web::Data<EvseIntegration<A>>) -> HttpResponse {
    integration.coordinator().request_refresh();
    HttpResponse::Accepted().finish()
}

async fn get_device<A: EvseApi>(integration: web::Data<EvseIntegration<A>>) -> HttpResponse {
    HttpResponse::Ok().json(integration.device_info())
}

async fn get_config<A: EvseApi>(integration: web::Data<EvseIntegration<A>>) -> HttpResponse {
    HttpResponse::Ok().json(ConfigDTO::from(integration.settings()))
}

async fn update_config<A: EvseApi>(
    integration: web::Data<EvseIntegration<A>>,
    Json(update): Json<EvseSettingsUpdate>,
) -> ApiResponse {
    match integration.reconfigure(update) {
        Ok(settings) => Ok(HttpResponse::Ok().json(ConfigDTO::from(settings))),
        Err(e) => Err(ApiError::InvalidConfig(format!("{:#}", e))),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};
    use assert_json_diff::{assert_json_eq, assert_json_include};
    use serde_json::{Value, json};

    use super::*;
    use crate::device::fake::{FakeEvse, Write};
    use crate::settings::test::evse_settings;

    async fn setup(init: Value, main: Value) -> (Arc<EvseIntegration<FakeEvse>>, Arc<FakeEvse>) {
        let fake = Arc::new(FakeEvse::new(init, main));
        let integration = EvseIntegration::with_api(evse_settings("192.168.1.50"), fake.clone()).await;
        (Arc::new(integration), fake)
    }

    #[actix_web::test]
    async fn lists_entity_states() {
        let (integration, _) = setup(json!({}), json!({"state": 6, "currentSet": 16, "curDesign": 32})).await;
        let app = test::init_service(App::new().service(new_routes(integration))).await;

        let states: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/evse/entities").to_request()).await;

        assert_eq!(states.as_array().map(|s| s.len()), Some(25));
        assert_json_include!(
            actual: states,
            expected: json!([
                {"id": "status", "kind": "sensor", "available": true, "value": "charging"},
                {"id": "current_set", "kind": "sensor", "value": 16.0, "unit": "A"},
            ])
        );
    }

    #[actix_web::test]
    async fn single_entity_state() {
        let (integration, _) = setup(json!({}), json!({"currentSet": 16, "curDesign": 32})).await;
        let app = test::init_service(App::new().service(new_routes(integration))).await;

        let state: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/evse/entities/current_limit").to_request(),
        )
        .await;

        assert_json_eq!(
            state,
            json!({
                "id": "current_limit",
                "name": "Current limit",
                "kind": "number",
                "available": true,
                "value": 16.0,
                "unit": "A",
                "icon": "mdi:current-dc",
                "min": 6.0,
                "max": 16.0,
                "step": 1.0
            })
        );

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/evse/entities/nope").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn writes_map_to_status_codes() {
        let (integration, fake) = setup(json!({}), json!({"currentSet": 20, "curDesign": 32})).await;
        let app = test::init_service(App::new().service(new_routes(integration))).await;

        let put = |id: &str, body: Value| {
            test::TestRequest::put()
                .uri(&format!("/api/evse/entities/{}", id))
                .set_json(body)
                .to_request()
        };

        let resp = test::call_service(&app, put("current_limit", json!({"value": 10}))).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = test::call_service(&app, put("current_limit", json!({"value": "abc"}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(&app, put("status", json!({"value": 1}))).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

        let resp = test::call_service(&app, put("nope", json!({"value": 1}))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        assert_eq!(fake.writes(), vec![Write::event("currentSet", "10")]);
    }

    #[actix_web::test]
    async fn schedule_write_without_data_is_unprocessable() {
        let (integration, fake) = setup(json!({}), json!({})).await;
        let app = test::init_service(App::new().service(new_routes(integration))).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri("/api/evse/entities/start_time")
                .set_json(json!({"value": "22:00"}))
                .to_request(),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().is_some_and(|e| e.contains("schedule")));
        assert!(fake.writes().is_empty());
    }

    #[actix_web::test]
    async fn pressing_charge_now_sends_sequence() {
        let (integration, fake) = setup(json!({"timeZone": "1"}), json!({})).await;
        let app = test::init_service(App::new().service(new_routes(integration))).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/evse/entities/charge_now/press")
                .to_request(),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(fake.writes().len(), 5);
        assert_eq!(fake.writes().last(), Some(&Write::event("chargeNow", "12")));
    }

    #[actix_web::test]
    async fn refresh_is_accepted() {
        let (integration, _) = setup(json!({}), json!({})).await;
        let app = test::init_service(App::new().service(new_routes(integration))).await;

        let resp = test::call_service(&app, test::TestRequest::post().uri("/api/evse/refresh").to_request()).await;

        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[actix_web::test]
    async fn device_info() {
        let (integration, _) = setup(json!({"fwVersion": "3.0"}), json!({})).await;
        let app = test::init_service(App::new().service(new_routes(integration))).await;

        let info: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/evse/device").to_request()).await;

        assert_json_eq!(
            info,
            json!({
                "name": "Eveus Pro",
                "title": "EVSE Energy Star (192.168.1.50)",
                "manufacturer": "Energy Star",
                "model": "EVSE",
                "sw_version": "3.0",
                "last_update_success": true
            })
        );
    }

    #[actix_web::test]
    async fn config_can_be_changed_live() {
        let (integration, fake) = setup(json!({}), json!({})).await;
        let app = test::init_service(App::new().service(new_routes(integration.clone()))).await;

        let config: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::put()
                .uri("/api/evse/config")
                .set_json(json!({"host": "192.168.1.77", "username": "admin", "password": "pw", "update_rate_secs": 5}))
                .to_request(),
        )
        .await;

        assert_json_eq!(
            config,
            json!({
                "host": "192.168.1.77",
                "device_name": "Eveus Pro",
                "device_type": "1_phase",
                "update_rate_secs": 5,
                "has_credentials": true
            })
        );
        assert_eq!(fake.connections().len(), 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri("/api/evse/config")
                .set_json(json!({"update_rate_secs": 0}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(integration.settings().update_rate_secs, 5);
    }
}
