use std::sync::{PoisonError, RwLock};

use anyhow::Context as _;
use infrastructure::HttpClientConfig;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde_json::{Value, json};

use super::{
    Credentials, EvseApi, EvseConnection, PATH_INIT, PATH_MAIN, PATH_PAGE_EVENT, PATH_TIMER, Payload, Schedule,
};

/// HTTP client for the charger's local API. Holds no device state.
pub struct EvseHttpClient {
    endpoint: RwLock<Endpoint>,
}

#[derive(Clone)]
struct Endpoint {
    base_url: String,
    credentials: Option<Credentials>,
    client: ClientWithMiddleware,
}

impl Endpoint {
    fn new(connection: &EvseConnection) -> anyhow::Result<Self> {
        let client = HttpClientConfig::new(connection.request_timeout)
            .with_user_agent(concat!("evse-bridge/", env!("CARGO_PKG_VERSION")))
            .new_tracing_client()
            .context("Error creating HTTP client for EVSE")?;

        Ok(Self {
            base_url: connection.base_url(),
            credentials: connection.credentials.clone(),
            client,
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));

        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }
}

impl EvseHttpClient {
    pub fn new(connection: &EvseConnection) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: RwLock::new(Endpoint::new(connection)?),
        })
    }

    #[cfg(test)]
    fn base_url(&self) -> String {
        self.endpoint().base_url
    }

    fn endpoint(&self) -> Endpoint {
        self.endpoint.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[tracing::instrument(skip(self, body))]
    async fn post_json(&self, path: &'static str, body: Option<Value>) -> anyhow::Result<Payload> {
        let mut request = self.endpoint().post(path);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Error requesting {}", path))?;

        read_payload(path, response).await
    }

    #[tracing::instrument(skip(self))]
    async fn post_form(&self, path: &'static str, fields: &[(&str, String)]) -> anyhow::Result<()> {
        let mut request = self.endpoint().post(path).form(fields);

        if path == PATH_PAGE_EVENT {
            if let Some((key, _)) = fields.first() {
                request = request.header("pageEvent", *key);
            }
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Error posting to {}", path))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Device answered {} with status {}", path, status);
        }

        tracing::debug!("Device accepted {}: {:?}", path, fields);
        Ok(())
    }
}

async fn read_payload(path: &str, response: reqwest::Response) -> anyhow::Result<Payload> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_owned());

    if status != StatusCode::OK {
        tracing::warn!("{} answered with status {}, ignoring response", path, status);
        return Ok(Payload::new());
    }

    if !is_json(content_type.as_deref()) {
        tracing::warn!("{} did not answer with JSON ({:?}), ignoring response", path, content_type);
        return Ok(Payload::new());
    }

    match response.json::<Value>().await {
        Ok(Value::Object(fields)) => {
            tracing::debug!("{} returned {} fields", path, fields.len());
            for (key, value) in fields.iter() {
                tracing::trace!("  {} -> {}", key, value);
            }
            Ok(fields)
        }
        Ok(other) => {
            tracing::warn!("{} returned JSON that is not an object: {}", path, other);
            Ok(Payload::new())
        }
        Err(e) if e.is_timeout() => Err(e).with_context(|| format!("Timeout reading response of {}", path)),
        Err(e) => {
            tracing::warn!("{} returned invalid JSON: {}", path, e);
            Ok(Payload::new())
        }
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .is_some_and(|m| m.type_() == mime::APPLICATION && m.subtype() == mime::JSON)
}

impl EvseApi for EvseHttpClient {
    async fn fetch_init(&self) -> anyhow::Result<Payload> {
        self.post_json(PATH_INIT, None).await
    }

    async fn fetch_main(&self) -> anyhow::Result<Payload> {
        self.post_json(PATH_MAIN, Some(json!({ "getState": true }))).await
    }

    async fn send_events(&self, fields: &[(&str, String)]) -> anyhow::Result<()> {
        self.post_form(PATH_PAGE_EVENT, fields).await
    }

    async fn send_timer(&self, schedule: &Schedule) -> anyhow::Result<()> {
        self.post_form(PATH_TIMER, &schedule.form_fields()).await
    }

    fn reconfigure(&self, connection: &EvseConnection) -> anyhow::Result<()> {
        let endpoint = Endpoint::new(connection)?;
        tracing::info!("EVSE client now talking to {}", endpoint.base_url);
        *self.endpoint.write().unwrap_or_else(PoisonError::into_inner) = endpoint;
        Ok(())
    }
}
