use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a submission did not produce an assignment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network error, non-2xx status or unreadable body.
    Transport,
    /// Response did not declare `application/json`.
    ContentType,
    /// The service answered with `success: false`.
    Assignment,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Transport => "network/HTTP failure",
            Self::ContentType => "unexpected content type",
            Self::Assignment => "assignment failure",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub success: bool,
    #[serde(
        default,
        alias = "message",
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub response: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub salesperson: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub salesperson_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub appointment_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_details: Option<AssignmentDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_used: Option<Value>,
    #[serde(
        default,
        alias = "candidates",
        deserialize_with = "lenient::list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub evaluations: Vec<CandidateEvaluation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl AssignmentResult {
    pub fn failed(kind: FailureKind, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: Some(message.into()),
            error: Some(error.into()),
            failure: Some(kind),
            ..Self::default()
        }
    }

    /// A `success: false` answer that reached us intact is the service's own
    /// verdict, not a transport problem.
    pub fn tag_remote_failure(&mut self) {
        if !self.success && self.failure.is_none() {
            self.failure = Some(FailureKind::Assignment);
        }
    }

    /// Reads a response body saved from an earlier submission.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed reading response file: {}", path.display()))?;
        let mut result: Self = serde_json::from_str(&data)
            .with_context(|| format!("failed parsing response JSON: {}", path.display()))?;
        result.tag_remote_failure();
        Ok(result)
    }

    pub fn scores(&self) -> Option<&ScoreBreakdown> {
        self.assignment_details.as_ref()?.scores.as_ref()
    }

    pub fn headline(&self) -> &'static str {
        if self.success {
            "Assignment Successful"
        } else {
            "Assignment Failed"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDetails {
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub travel_time: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub travel_from: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::count",
        skip_serializing_if = "Option::is_none"
    )]
    pub appointments_on_date: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient::count",
        skip_serializing_if = "Option::is_none"
    )]
    pub today_assignments: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreBreakdown>,
}

impl AssignmentDetails {
    /// `home_office` reads as "home office".
    pub fn travel_origin(&self) -> Option<String> {
        self.travel_from.as_ref().map(|raw| raw.replace('_', " "))
    }
}

/// Component scores are fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    #[serde(default, deserialize_with = "lenient::number")]
    pub performance: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub proximity: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub capacity: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub route_efficiency: Option<f64>,
    #[serde(rename = "final", default, deserialize_with = "lenient::number")]
    pub final_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEvaluation {
    #[serde(default, alias = "name", deserialize_with = "lenient::name")]
    pub salesperson: String,
    #[serde(
        default,
        alias = "id",
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub salesperson_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreBreakdown>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub disqualified: bool,
    #[serde(
        default,
        alias = "disqualificationReasons",
        deserialize_with = "lenient::reasons",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub reasons: Vec<String>,
}

impl CandidateEvaluation {
    /// A candidate that carries reasons is treated as disqualified even when
    /// the flag itself is absent.
    pub fn is_disqualified(&self) -> bool {
        self.disqualified || !self.reasons.is_empty()
    }

    pub fn final_score(&self) -> Option<f64> {
        self.scores.as_ref().and_then(|s| s.final_score)
    }
}

/// Accepts JSON numbers and the numeric strings the service sometimes emits
/// (`"0.82"`, `"82%"`, `"1,200"`).
pub fn to_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            let percent = trimmed.ends_with('%');
            let sanitized = trimmed.replace([',', '%', '_'], "");
            let parsed = sanitized.trim().parse::<f64>().ok()?;
            if percent {
                Some(parsed / 100.0)
            } else {
                Some(parsed)
            }
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Field adapters for the service payload. `null`, a missing field and a
/// value of the wrong shape all fall back to the field's default.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let raw = Option::<Value>::deserialize(d)?;
        Ok(raw.as_ref().and_then(super::to_f64))
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let raw = Option::<Value>::deserialize(d)?;
        Ok(raw
            .as_ref()
            .and_then(super::to_f64)
            .filter(|v| *v >= 0.0)
            .map(|v| v.round() as u32))
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<Value>::deserialize(d)?;
        Ok(match raw {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn name<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text(d)?.unwrap_or_default())
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let raw = Option::<Value>::deserialize(d)?;
        Ok(match raw {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            _ => false,
        })
    }

    /// Entries that do not decode are skipped rather than failing the list.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let raw = Option::<Value>::deserialize(d)?;
        Ok(match raw {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    /// A single reason string is accepted as a one-element list.
    pub fn reasons<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let raw = Option::<Value>::deserialize(d)?;
        let items = match raw {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Null | Value::String(_) => None,
                other => Some(other.to_string()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_success_payload_with_string_scores() {
        let payload = json!({
            "success": true,
            "response": "Booked with Maria",
            "salesperson": "Maria Chen",
            "salespersonId": 42,
            "appointmentDate": "2025-03-14 10:00",
            "assignmentDetails": {
                "travelTime": "25 mins",
                "travelFrom": "home_office",
                "appointmentsOnDate": "2",
                "todayAssignments": 1,
                "scores": {
                    "performance": 0.9,
                    "proximity": "0.75",
                    "capacity": "60%",
                    "routeEfficiency": "0.5",
                    "final": "0.768"
                }
            }
        });
        let result: AssignmentResult = serde_json::from_value(payload).expect("deserialize");
        assert!(result.success);
        assert_eq!(result.salesperson_id.as_deref(), Some("42"));
        let details = result.assignment_details.as_ref().expect("details");
        assert_eq!(details.appointments_on_date, Some(2));
        assert_eq!(details.travel_origin().as_deref(), Some("home office"));
        let scores = result.scores().expect("scores");
        assert_eq!(scores.proximity, Some(0.75));
        assert_eq!(scores.capacity, Some(0.6));
        assert_eq!(scores.final_score, Some(0.768));
    }

    #[test]
    fn accepts_message_and_candidates_aliases() {
        let payload = json!({
            "success": false,
            "message": "No qualified salesperson",
            "candidates": [
                { "name": "Raj", "disqualificationReasons": ["over daily limit"] },
                { "name": "Lee", "scores": { "final": 0.4 } }
            ]
        });
        let result: AssignmentResult = serde_json::from_value(payload).expect("deserialize");
        assert_eq!(result.response.as_deref(), Some("No qualified salesperson"));
        assert_eq!(result.evaluations.len(), 2);
        assert!(result.evaluations[0].is_disqualified());
        assert!(!result.evaluations[1].is_disqualified());
        assert_eq!(result.evaluations[1].final_score(), Some(0.4));
    }

    #[test]
    fn nulls_and_odd_shapes_decode_to_defaults() {
        let payload = json!({
            "success": true,
            "salesperson": null,
            "salespersonId": "sp-2",
            "error": null,
            "evaluations": [
                { "salesperson": null, "scores": { "final": 0.5 } },
                { "salesperson": 7, "reasons": null, "disqualified": null },
                { "salesperson": "Raj", "reasons": "over daily limit" },
                "not a candidate"
            ]
        });
        let result: AssignmentResult = serde_json::from_value(payload).expect("deserialize");
        assert!(result.success);
        assert_eq!(result.salesperson, None);
        assert_eq!(result.evaluations.len(), 3);
        assert_eq!(result.evaluations[0].salesperson, "");
        assert_eq!(result.evaluations[0].final_score(), Some(0.5));
        assert_eq!(result.evaluations[1].salesperson, "7");
        assert!(!result.evaluations[1].is_disqualified());
        assert_eq!(result.evaluations[2].reasons, vec!["over daily limit".to_string()]);
        assert!(result.evaluations[2].is_disqualified());

        let empty: AssignmentResult = serde_json::from_value(json!({
            "success": null,
            "evaluations": null,
            "assignmentDetails": null
        }))
        .expect("deserialize");
        assert!(!empty.success);
        assert!(empty.evaluations.is_empty());
        assert_eq!(empty.assignment_details, None);
    }

    #[test]
    fn unparseable_scores_become_none() {
        assert_eq!(to_f64(&json!("n/a")), None);
        assert_eq!(to_f64(&json!(null)), None);
        assert_eq!(to_f64(&json!("1,200")), Some(1200.0));
    }

    #[test]
    fn failed_constructor_sets_kind() {
        let result = AssignmentResult::failed(FailureKind::ContentType, "bad", "text/html");
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::ContentType));
        assert_eq!(result.headline(), "Assignment Failed");
    }
}
