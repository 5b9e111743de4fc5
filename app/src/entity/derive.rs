use serde_json::Value;

use crate::core::time::{SessionDuration, clock_distance_secs};
use crate::core::unit::{Ampere, KiloWattHours, round_to};
use crate::device::{ChargingStatus, Snapshot, snapshot};

use super::EntityValue;

/// Current setpoints at or below this value put the device into restricted mode.
pub const RESTRICTED_MAX: f64 = 16.0;
pub const DEFAULT_DESIGN_CURRENT: f64 = 32.0;

/// Clock readings closer than this are considered the same.
const CLOCK_JITTER_SECS: i64 = 2;

/// How a raw device field becomes a display value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Field shown as reported. JSON numbers stay numeric, anything else is kept as text.
    Number,
    /// Deci-ampere field, two decimals.
    DeciAmpere,
    /// Hecto-watt-hour field, three decimals.
    Energy,
    /// Seconds shown as `HH:MM:SS`.
    SessionTime,
    /// Status code looked up in the status table.
    Status,
    /// Device clock, `HH:MM:SS` text.
    Clock,
}

impl Derivation {
    pub fn apply(self, raw: &Value) -> anyhow::Result<EntityValue> {
        Ok(match self {
            Derivation::Number => match raw {
                Value::Number(n) => EntityValue::Number(n.as_f64().ok_or_else(|| anyhow::anyhow!("not a number"))?),
                other => EntityValue::Text(snapshot::raw_text(other)),
            },
            Derivation::DeciAmpere => {
                EntityValue::Number(round_to(Ampere::from_deciampere(number(raw)?).into(), 2))
            }
            Derivation::Energy => {
                EntityValue::Number(round_to(KiloWattHours::from_hectowatt_hours(number(raw)?).into(), 3))
            }
            Derivation::SessionTime => EntityValue::Text(session_time(raw)?.to_string()),
            Derivation::Status => EntityValue::Text(status(raw).to_string()),
            Derivation::Clock => EntityValue::Text(snapshot::raw_text(raw)),
        })
    }

    /// Like `apply`, but a value that cannot be derived is shown as the raw text.
    pub fn apply_or_raw(self, entity_id: &str, raw: &Value) -> EntityValue {
        self.apply(raw).unwrap_or_else(|e| {
            tracing::warn!("Error deriving {} from {}: {}", entity_id, raw, e);
            EntityValue::Text(snapshot::raw_text(raw))
        })
    }

    /// Device clock readings within the jitter window do not count as a change.
    pub fn is_insignificant_change(self, previous: &EntityValue, next: &EntityValue) -> bool {
        match (self, previous, next) {
            (Derivation::Clock, EntityValue::Text(a), EntityValue::Text(b)) => {
                clock_distance_secs(a, b).is_some_and(|d| d <= CLOCK_JITTER_SECS)
            }
            _ => false,
        }
    }
}

fn number(raw: &Value) -> anyhow::Result<f64> {
    snapshot::as_number(raw).ok_or_else(|| anyhow::anyhow!("not a number"))
}

fn session_time(raw: &Value) -> anyhow::Result<SessionDuration> {
    let secs = number(raw)?.trunc();
    if secs < 0.0 {
        anyhow::bail!("negative session time");
    }

    Ok(SessionDuration::from_secs(secs as u64))
}

fn status(raw: &Value) -> ChargingStatus {
    match snapshot::as_number(raw) {
        Some(code) if code.fract() == 0.0 => ChargingStatus::from_code(code as i64),
        _ => ChargingStatus::Unknown,
    }
}

pub fn ground_glyph(grounded: bool) -> &'static str {
    if grounded { "✅" } else { "❌" }
}

pub fn is_restricted(snapshot: &Snapshot) -> bool {
    snapshot.number("currentSet").unwrap_or(DEFAULT_DESIGN_CURRENT) <= RESTRICTED_MAX
}

pub fn design_current(snapshot: &Snapshot) -> Ampere {
    Ampere::from(snapshot.number("curDesign").unwrap_or(DEFAULT_DESIGN_CURRENT))
}

/// Upper bound of the current limit: 16 A in restricted mode, the design current otherwise.
pub fn current_limit_max(snapshot: &Snapshot) -> Ampere {
    if is_restricted(snapshot) {
        Ampere::from(RESTRICTED_MAX)
    } else {
        design_current(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deciampere_is_divided_and_rounded() {
        let cases = [
            (json!(0), 0.0),
            (json!(123), 12.3),
            (json!(160), 16.0),
            (json!(319), 31.9),
            (json!(1234.5678), 123.46),
            (json!(1.25), 0.12),
            (json!(3.75), 0.38),
            (json!("160"), 16.0),
        ];

        for (raw, expected) in cases {
            assert_eq!(
                Derivation::DeciAmpere.apply(&raw).unwrap(),
                EntityValue::Number(expected),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn energy_is_divided_and_rounded() {
        let cases = [
            (json!(0), 0.0),
            (json!(1), 0.1),
            (json!(12345), 1234.5),
            (json!(98765.4321), 9876.543),
            (json!(0.625), 0.062),
        ];

        for (raw, expected) in cases {
            assert_eq!(
                Derivation::Energy.apply(&raw).unwrap(),
                EntityValue::Number(expected),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn plain_fields_are_shown_as_reported() {
        assert_eq!(Derivation::Number.apply(&json!(229)).unwrap(), EntityValue::Number(229.0));
        assert_eq!(
            Derivation::Number.apply(&json!("229")).unwrap(),
            EntityValue::Text("229".to_owned())
        );
        assert_eq!(
            Derivation::Number.apply(&json!(true)).unwrap(),
            EntityValue::Text("true".to_owned())
        );
    }

    #[test]
    fn session_time_is_formatted() {
        assert_eq!(
            Derivation::SessionTime.apply(&json!(3725)).unwrap(),
            EntityValue::Text("01:02:05".to_owned())
        );
        assert_eq!(
            Derivation::SessionTime.apply(&json!("59.9")).unwrap(),
            EntityValue::Text("00:00:59".to_owned())
        );
        assert!(Derivation::SessionTime.apply(&json!(-1)).is_err());
    }

    #[test]
    fn status_never_fails() {
        assert_eq!(
            Derivation::Status.apply(&json!(6)).unwrap(),
            EntityValue::Text("charging".to_owned())
        );
        assert_eq!(
            Derivation::Status.apply(&json!("12")).unwrap(),
            EntityValue::Text("ready".to_owned())
        );
        for raw in [json!(99), json!(-1), json!(6.5), json!("x"), json!([1])] {
            assert_eq!(
                Derivation::Status.apply(&raw).unwrap(),
                EntityValue::Text("unknown".to_owned())
            );
        }
    }

    #[test]
    fn unparseable_values_fall_back_to_raw_text() {
        assert_eq!(
            Derivation::DeciAmpere.apply_or_raw("current_phase_1", &json!("n/a")),
            EntityValue::Text("n/a".to_owned())
        );
        assert_eq!(
            Derivation::Number.apply_or_raw("leakage", &json!(true)),
            EntityValue::Text("true".to_owned())
        );
        assert_eq!(
            Derivation::SessionTime.apply_or_raw("session_time", &json!({"a": 1})),
            EntityValue::Text(r#"{"a":1}"#.to_owned())
        );
    }

    #[test]
    fn clock_jitter_is_ignored() {
        let at = |s: &str| EntityValue::Text(s.to_owned());

        assert!(Derivation::Clock.is_insignificant_change(&at("12:00:00"), &at("12:00:02")));
        assert!(!Derivation::Clock.is_insignificant_change(&at("12:00:00"), &at("12:00:03")));
        assert!(!Derivation::Clock.is_insignificant_change(&at("garbage"), &at("12:00:00")));
        assert!(!Derivation::Number.is_insignificant_change(&EntityValue::Number(1.0), &EntityValue::Number(1.0)));
    }

    #[test]
    fn current_limit_max_follows_restricted_mode() {
        let at = |current_set: f64| Snapshot::from_value(json!({"currentSet": current_set, "curDesign": 32}));

        assert_eq!(current_limit_max(&at(16.0)), Ampere::from(16.0));
        assert_eq!(current_limit_max(&at(6.0)), Ampere::from(16.0));
        assert_eq!(current_limit_max(&at(17.0)), Ampere::from(32.0));
    }

    #[test]
    fn design_current_defaults_to_32() {
        let snapshot = Snapshot::from_value(json!({"currentSet": 20}));
        assert_eq!(current_limit_max(&snapshot), Ampere::from(32.0));
        assert!(!is_restricted(&Snapshot::empty()));
    }

    #[test]
    fn ground_glyphs() {
        assert_eq!(ground_glyph(true), "✅");
        assert_eq!(ground_glyph(false), "❌");
    }
}
