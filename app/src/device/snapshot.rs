use std::sync::Arc;

use serde_json::Value;

pub type Payload = serde_json::Map<String, Value>;

/// Point-in-time device state, merged from `/init` and `/main`. Cheap to clone, never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot(Arc<Payload>);

impl Snapshot {
    /// `/main` wins on key collisions.
    pub fn merge(init: Payload, main: Payload) -> Self {
        let mut fields = init;
        fields.extend(main);
        Self(Arc::new(fields))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(Arc::new(fields)),
            other => panic!("Snapshot must be a JSON object, got {}", other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(as_number)
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(raw_text)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(as_flag)
    }

    /// Configured UTC offset in hours, `0` when absent or unparseable.
    pub fn time_zone(&self) -> i32 {
        match self.get("timeZone") {
            None => 0,
            Some(raw) => match as_number(raw) {
                Some(tz) => tz.trunc() as i32,
                None => {
                    tracing::warn!("Invalid timeZone value {}, using 0", raw);
                    0
                }
            },
        }
    }
}

/// Numbers arrive either as JSON numbers or as numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "on" => Some(true),
            "false" | "0" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Display form of a raw value. Strings are not quoted.
pub fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn merge_prefers_main_fields() {
        let init = payload(json!({"timeZone": "3", "startTime": "23:00", "currentSet": 32}));
        let main = payload(json!({"currentSet": 160}));

        let snapshot = Snapshot::merge(init, main);

        assert_eq!(
            snapshot,
            Snapshot::from_value(json!({"timeZone": "3", "startTime": "23:00", "currentSet": 160}))
        );
    }

    #[test]
    fn merge_of_two_empty_payloads_is_empty() {
        assert!(Snapshot::merge(Payload::new(), Payload::new()).is_empty());
    }

    #[test]
    fn numbers_are_parsed_leniently() {
        let snapshot = Snapshot::from_value(json!({"a": 12, "b": "16.5", "c": " 7 ", "d": "n/a", "e": null}));

        assert_eq!(snapshot.number("a"), Some(12.0));
        assert_eq!(snapshot.number("b"), Some(16.5));
        assert_eq!(snapshot.number("c"), Some(7.0));
        assert_eq!(snapshot.number("d"), None);
        assert_eq!(snapshot.number("e"), None);
        assert_eq!(snapshot.number("missing"), None);
    }

    #[test]
    fn flags_accept_device_spellings() {
        let snapshot = Snapshot::from_value(json!({"a": true, "b": 0, "c": "1", "d": "False", "e": "maybe"}));

        assert_eq!(snapshot.flag("a"), Some(true));
        assert_eq!(snapshot.flag("b"), Some(false));
        assert_eq!(snapshot.flag("c"), Some(true));
        assert_eq!(snapshot.flag("d"), Some(false));
        assert_eq!(snapshot.flag("e"), None);
    }

    #[test]
    fn time_zone_truncates_and_defaults() {
        assert_eq!(Snapshot::from_value(json!({"timeZone": "3"})).time_zone(), 3);
        assert_eq!(Snapshot::from_value(json!({"timeZone": -2.0})).time_zone(), -2);
        assert_eq!(Snapshot::from_value(json!({"timeZone": "2.7"})).time_zone(), 2);
        assert_eq!(Snapshot::from_value(json!({"timeZone": "abc"})).time_zone(), 0);
        assert_eq!(Snapshot::empty().time_zone(), 0);
    }

    #[test]
    fn raw_text_is_unquoted() {
        assert_eq!(raw_text(&json!("abc")), "abc");
        assert_eq!(raw_text(&json!(12.5)), "12.5");
        assert_eq!(raw_text(&json!(true)), "true");
    }
}
