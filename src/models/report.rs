//! Report types: one anonymous user observation of a beach.
//!
//! Level enums travel as numeric wire codes (the values stored in the report
//! table and exchanged with clients), so they convert through `u8` rather
//! than serializing variant names. Optional axes are `Option<T>`; there is no
//! "0 means no data" sentinel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How crowded the beach currently is. Wire codes 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CrowdLevel {
    Quiet = 1,
    Moderate = 2,
    Crowded = 3,
    Packed = 4,
}

/// Water state reported alongside the crowd level. Wire codes 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WaterCondition {
    Calm = 1,
    Choppy = 2,
    Rough = 3,
    Dangerous = 4,
}

/// Sand/shore state reported alongside the crowd level. Wire codes 1-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BeachCondition {
    Clean = 1,
    Seaweed = 2,
    Debris = 3,
}

macro_rules! impl_level_codes {
    ($name:ident, [$($variant:ident = $code:literal),+ $(,)?]) => {
        impl $name {
            /// All values, ascending by wire code.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Numeric wire code.
            pub fn code(self) -> u8 {
                self as u8
            }

            /// Decode a wire code; `None` when out of range.
            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = String;

            fn try_from(code: u8) -> Result<Self, Self::Error> {
                $name::from_code(code)
                    .ok_or_else(|| format!("invalid {} code: {}", stringify!($name), code))
            }
        }

        impl From<$name> for u8 {
            fn from(level: $name) -> u8 {
                level.code()
            }
        }
    };
}

impl_level_codes!(CrowdLevel, [Quiet = 1, Moderate = 2, Crowded = 3, Packed = 4]);
impl_level_codes!(WaterCondition, [Calm = 1, Choppy = 2, Rough = 3, Dangerous = 4]);
impl_level_codes!(BeachCondition, [Clean = 1, Seaweed = 2, Debris = 3]);

/// Whitelisted marketing/source tags attached to a report.
///
/// The ingestion gate filters incoming maps down to the allow-list before a
/// report is persisted; values are restricted to JSON scalars.
pub type Attribution = serde_json::Map<String, serde_json::Value>;

/// One user observation, immutable once persisted.
///
/// `created_at` is stamped by the ingestion gate with server time and never
/// trusted from the client. `reporter_hash` is a pseudonymous per-device
/// identifier, never a raw personal identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub location_id: String,
    pub crowd_level: CrowdLevel,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub water_condition: Option<WaterCondition>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub beach_condition: Option<BeachCondition>,
    pub reporter_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attribution: Option<Attribution>,
    /// Coarse network origin captured at submission time. Internal only,
    /// never serialized back to clients.
    #[serde(skip)]
    pub client_origin: Option<String>,
    /// Client agent string captured at submission time. Internal only.
    #[serde(skip)]
    pub client_agent: Option<String>,
}

impl Report {
    /// Age of this report relative to `now`, in fractional minutes.
    ///
    /// Future-dated reports (clock skew between store and caller) clamp to
    /// zero rather than producing negative ages.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> f64 {
        let millis = now.signed_duration_since(self.created_at).num_milliseconds();
        (millis as f64 / 60_000.0).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_report(created_at: DateTime<Utc>) -> Report {
        Report {
            id: Uuid::new_v4(),
            location_id: "bondi".to_string(),
            crowd_level: CrowdLevel::Crowded,
            water_condition: Some(WaterCondition::Choppy),
            beach_condition: None,
            reporter_hash: "device-abc".to_string(),
            created_at,
            attribution: None,
            client_origin: Some("203.0.113.0".to_string()),
            client_agent: Some("test-agent".to_string()),
        }
    }

    #[test]
    fn test_crowd_level_codes_roundtrip() {
        for level in CrowdLevel::ALL {
            assert_eq!(CrowdLevel::from_code(level.code()), Some(*level));
        }
        assert_eq!(CrowdLevel::from_code(0), None);
        assert_eq!(CrowdLevel::from_code(5), None);
    }

    #[test]
    fn test_beach_condition_codes() {
        assert_eq!(BeachCondition::from_code(3), Some(BeachCondition::Debris));
        assert_eq!(BeachCondition::from_code(4), None);
    }

    #[test]
    fn test_level_serializes_as_number() {
        let json = serde_json::to_string(&CrowdLevel::Packed).unwrap();
        assert_eq!(json, "4");

        let level: CrowdLevel = serde_json::from_str("2").unwrap();
        assert_eq!(level, CrowdLevel::Moderate);
    }

    #[test]
    fn test_level_rejects_out_of_range() {
        assert!(serde_json::from_str::<CrowdLevel>("0").is_err());
        assert!(serde_json::from_str::<WaterCondition>("9").is_err());
    }

    #[test]
    fn test_level_ordering_matches_severity() {
        assert!(CrowdLevel::Packed > CrowdLevel::Quiet);
        assert!(WaterCondition::Dangerous > WaterCondition::Calm);
    }

    #[test]
    fn test_report_serialization_hides_client_context() {
        let report = sample_report(Utc::now());
        let json = serde_json::to_value(&report).unwrap();

        assert!(json.get("locationId").is_some());
        assert!(json.get("crowdLevel").is_some());
        assert!(json.get("clientOrigin").is_none());
        assert!(json.get("client_origin").is_none());
        assert!(json.get("clientAgent").is_none());
        // Absent optional axis is omitted, not null
        assert!(json.get("beachCondition").is_none());
    }

    #[test]
    fn test_age_minutes() {
        let now = Utc::now();
        let report = sample_report(now - Duration::minutes(12));
        assert!((report.age_minutes(now) - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_age_minutes_clamps_future_reports() {
        let now = Utc::now();
        let report = sample_report(now + Duration::minutes(3));
        assert_eq!(report.age_minutes(now), 0.0);
    }
}
