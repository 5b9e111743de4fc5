use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;

use super::{EvseApi, EvseConnection, Payload, Schedule};

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    PageEvent(Vec<(String, String)>),
    Timer(Schedule),
}

impl Write {
    pub fn event(key: &str, value: &str) -> Self {
        Write::PageEvent(vec![(key.to_owned(), value.to_owned())])
    }
}

#[derive(Debug, Clone)]
pub enum Response {
    Payload(Payload),
    Unreachable,
}

/// In-memory stand-in for the charger that records every write.
pub struct FakeEvse {
    init: Mutex<Response>,
    main: Mutex<Response>,
    delay: Mutex<Option<Duration>>,
    fail_writes_from: Mutex<Option<usize>>,
    init_calls: AtomicUsize,
    main_calls: AtomicUsize,
    writes: Mutex<Vec<Write>>,
    connections: Mutex<Vec<EvseConnection>>,
}

impl FakeEvse {
    pub fn new(init: Value, main: Value) -> Self {
        Self {
            init: Mutex::new(Response::Payload(to_payload(init))),
            main: Mutex::new(Response::Payload(to_payload(main))),
            delay: Mutex::new(None),
            fail_writes_from: Mutex::new(None),
            init_calls: AtomicUsize::new(0),
            main_calls: AtomicUsize::new(0),
            writes: Mutex::new(vec![]),
            connections: Mutex::new(vec![]),
        }
    }

    pub fn unreachable() -> Self {
        let fake = Self::new(Value::Object(Payload::new()), Value::Object(Payload::new()));
        fake.set_init(Response::Unreachable);
        fake.set_main(Response::Unreachable);
        fake
    }

    pub fn set_init(&self, response: Response) {
        *self.init.lock().unwrap() = response;
    }

    pub fn set_main(&self, response: Response) {
        *self.main.lock().unwrap() = response;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Every write starting with the given (zero-based) index fails as if the device went away.
    pub fn fail_writes_from(&self, index: usize) {
        *self.fail_writes_from.lock().unwrap() = Some(index);
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn main_calls(&self) -> usize {
        self.main_calls.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    /// Every connection passed to `reconfigure`, oldest first.
    pub fn connections(&self) -> Vec<EvseConnection> {
        self.connections.lock().unwrap().clone()
    }

    async fn respond(&self, response: &Mutex<Response>) -> anyhow::Result<Payload> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = response.lock().unwrap().clone();
        match response {
            Response::Payload(payload) => Ok(payload),
            Response::Unreachable => anyhow::bail!("Connection refused"),
        }
    }

    fn record(&self, write: Write) -> anyhow::Result<()> {
        let mut writes = self.writes.lock().unwrap();
        let fail_from = *self.fail_writes_from.lock().unwrap();

        if fail_from.is_some_and(|i| writes.len() >= i) {
            anyhow::bail!("Connection reset while sending {:?}", write);
        }

        writes.push(write);
        Ok(())
    }
}

pub fn to_payload(value: Value) -> Payload {
    match value {
        Value::Object(fields) => fields,
        other => panic!("Payload must be a JSON object, got {}", other),
    }
}

impl EvseApi for FakeEvse {
    async fn fetch_init(&self) -> anyhow::Result<Payload> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(&self.init).await
    }

    async fn fetch_main(&self) -> anyhow::Result<Payload> {
        self.main_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(&self.main).await
    }

    async fn send_events(&self, fields: &[(&str, String)]) -> anyhow::Result<()> {
        self.record(Write::PageEvent(
            fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        ))
    }

    async fn send_timer(&self, schedule: &Schedule) -> anyhow::Result<()> {
        self.record(Write::Timer(schedule.clone()))
    }

    fn reconfigure(&self, connection: &EvseConnection) -> anyhow::Result<()> {
        self.connections.lock().unwrap().push(connection.clone());
        Ok(())
    }
}
