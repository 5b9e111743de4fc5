use cached::proc_macro::cached;
use opentelemetry::KeyValue;

const METER_NAME: &str = "evse";

pub fn increment(name: &'static str, kv: &[(&str, &str)]) {
    counter(name).add(1, &as_kvs(kv))
}

pub fn set(name: &'static str, value: f64, kv: &[(&str, &str)]) {
    gauge(name).record(value, &as_kvs(kv))
}

pub fn record(name: &'static str, value: f64, kv: &[(&str, &str)]) {
    histogram(name).record(value, &as_kvs(kv))
}

fn as_kvs(kv: &[(&str, &str)]) -> Vec<KeyValue> {
    kv.iter()
        .map(|(k, v)| KeyValue::new(k.to_string(), v.to_string()))
        .collect()
}

#[cached]
fn counter(name: &'static str) -> opentelemetry::metrics::Counter<u64> {
    opentelemetry::global::meter(METER_NAME).u64_counter(name).build()
}

#[cached]
fn gauge(name: &'static str) -> opentelemetry::metrics::Gauge<f64> {
    opentelemetry::global::meter(METER_NAME).f64_gauge(name).build()
}

#[cached]
fn histogram(name: &'static str) -> opentelemetry::metrics::Histogram<f64> {
    opentelemetry::global::meter(METER_NAME).f64_histogram(name).build()
}
