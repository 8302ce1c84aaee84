use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_APPOINTMENT_TIME: &str = "10:00";
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum LeadError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid appointment date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid appointment time {0:?}, expected HH:MM")]
    InvalidTime(String),
}

/// Lead as submitted to the assignment service.
///
/// Everything is free text apart from the appointment date and time, which
/// are parsed locally so the service always receives `YYYY-MM-DD` and
/// `HH:MM:SS`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadInput {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default, with = "wire_date")]
    pub appointment_date: Option<NaiveDate>,
    #[serde(default, with = "wire_time")]
    pub appointment_time: Option<NaiveTime>,
}

impl LeadInput {
    pub fn validate(&self) -> Result<(), LeadError> {
        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("phone", &self.phone),
            ("city", &self.city),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(LeadError::MissingField(name));
            }
        }
        Ok(())
    }
}

pub fn parse_appointment_date(raw: &str) -> Result<NaiveDate, LeadError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| LeadError::InvalidDate(raw.to_string()))
}

/// Accepts `HH:MM` as typed into the form, or an already-qualified `HH:MM:SS`.
pub fn parse_appointment_time(raw: &str) -> Result<NaiveTime, LeadError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| LeadError::InvalidTime(raw.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringWeights {
    pub performance: f64,
    pub proximity: f64,
    pub capacity: f64,
    pub route_efficiency: f64,
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.performance + self.proximity + self.capacity + self.route_efficiency
    }

    /// The service expects the weights to add up to 1.0. This is reported,
    /// never enforced.
    pub fn is_balanced(&self) -> bool {
        (self.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            performance: 0.35,
            proximity: 0.30,
            capacity: 0.20,
            route_efficiency: 0.15,
        }
    }
}

/// Optional override forwarded verbatim to the service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmParams {
    pub max_travel_time_minutes: u32,
    pub max_appointments_per_day: u32,
    pub max_new_assignments_per_day: u32,
    pub min_time_gap_minutes: u32,
    pub weights: ScoringWeights,
}

impl Default for AlgorithmParams {
    fn default() -> Self {
        Self {
            max_travel_time_minutes: 120,
            max_appointments_per_day: 5,
            max_new_assignments_per_day: 4,
            min_time_gap_minutes: 30,
            weights: ScoringWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamOverrides {
    pub max_travel_time_minutes: Option<u32>,
    pub max_appointments_per_day: Option<u32>,
    pub max_new_assignments_per_day: Option<u32>,
    pub min_time_gap_minutes: Option<u32>,
    pub performance: Option<f64>,
    pub proximity: Option<f64>,
    pub capacity: Option<f64>,
    pub route_efficiency: Option<f64>,
}

impl ParamOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, base: AlgorithmParams) -> AlgorithmParams {
        let mut params = base;
        if let Some(v) = self.max_travel_time_minutes {
            params.max_travel_time_minutes = v;
        }
        if let Some(v) = self.max_appointments_per_day {
            params.max_appointments_per_day = v;
        }
        if let Some(v) = self.max_new_assignments_per_day {
            params.max_new_assignments_per_day = v;
        }
        if let Some(v) = self.min_time_gap_minutes {
            params.min_time_gap_minutes = v;
        }
        if let Some(v) = self.performance {
            params.weights.performance = v;
        }
        if let Some(v) = self.proximity {
            params.weights.proximity = v;
        }
        if let Some(v) = self.capacity {
            params.weights.capacity = v;
        }
        if let Some(v) = self.route_efficiency {
            params.weights.route_efficiency = v;
        }
        params
    }
}

/// Body of the single POST sent to the assignment endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    #[serde(flatten)]
    pub lead: LeadInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm_params: Option<AlgorithmParams>,
}

impl AssignmentRequest {
    pub fn new(lead: LeadInput, algorithm_params: Option<AlgorithmParams>) -> Result<Self, LeadError> {
        lead.validate()?;
        Ok(Self {
            lead,
            algorithm_params,
        })
    }
}

mod wire_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => s.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => super::parse_appointment_date(text)
                .map(Some)
                .map_err(de::Error::custom),
        }
    }
}

mod wire_time {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => s.serialize_str(&time.format("%H:%M:%S").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => super::parse_appointment_time(text)
                .map(Some)
                .map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_lead() -> LeadInput {
        LeadInput {
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            phone: "416-555-0123".to_string(),
            address: "123 Main Street".to_string(),
            city: "Toronto".to_string(),
            postal_code: "M5H 2N2".to_string(),
            appointment_date: Some(parse_appointment_date("2025-03-14").expect("date")),
            appointment_time: Some(parse_appointment_time("10:00").expect("time")),
        }
    }

    #[test]
    fn serializes_time_with_seconds_and_camel_case_keys() {
        let request = AssignmentRequest::new(sample_lead(), None).expect("valid lead");
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["firstName"], "John");
        assert_eq!(value["postalCode"], "M5H 2N2");
        assert_eq!(value["appointmentDate"], "2025-03-14");
        assert_eq!(value["appointmentTime"], "10:00:00");
        assert!(value.get("algorithmParams").is_none());
    }

    #[test]
    fn missing_time_is_sent_as_null() {
        let mut lead = sample_lead();
        lead.appointment_time = None;
        lead.appointment_date = None;
        let value = serde_json::to_value(&lead).expect("serialize");
        assert!(value["appointmentTime"].is_null());
        assert!(value["appointmentDate"].is_null());
    }

    #[test]
    fn rejects_blank_required_fields() {
        let mut lead = sample_lead();
        lead.city = "   ".to_string();
        assert_eq!(lead.validate(), Err(LeadError::MissingField("city")));

        let mut lead = sample_lead();
        lead.address.clear();
        lead.postal_code.clear();
        assert!(lead.validate().is_ok());
    }

    #[test]
    fn parses_form_post_with_empty_date() {
        let body = json!({
            "firstName": "Ana",
            "lastName": "Lopez",
            "phone": "905-555-0199",
            "city": "Mississauga",
            "appointmentDate": "",
            "appointmentTime": "14:30",
            "algorithmParams": {
                "maxTravelTimeMinutes": 90,
                "maxAppointmentsPerDay": 5,
                "maxNewAssignmentsPerDay": 4,
                "minTimeGapMinutes": 30,
                "weights": {
                    "performance": 0.4,
                    "proximity": 0.3,
                    "capacity": 0.2,
                    "routeEfficiency": 0.1
                }
            }
        });
        let request: AssignmentRequest = serde_json::from_value(body).expect("deserialize");
        assert_eq!(request.lead.appointment_date, None);
        assert_eq!(
            request.lead.appointment_time,
            NaiveTime::from_hms_opt(14, 30, 0)
        );
        let params = request.algorithm_params.expect("params");
        assert_eq!(params.max_travel_time_minutes, 90);
        assert!(params.weights.is_balanced());
    }

    #[test]
    fn invalid_time_is_reported() {
        assert_eq!(
            parse_appointment_time("25:99"),
            Err(LeadError::InvalidTime("25:99".to_string()))
        );
        assert!(parse_appointment_time("09:15:00").is_ok());
    }

    #[test]
    fn overrides_replace_only_given_fields_and_sum_is_not_enforced() {
        let overrides = ParamOverrides {
            max_travel_time_minutes: Some(60),
            performance: Some(0.5),
            ..ParamOverrides::default()
        };
        assert!(!overrides.is_empty());
        let params = overrides.apply(AlgorithmParams::default());
        assert_eq!(params.max_travel_time_minutes, 60);
        assert_eq!(params.max_appointments_per_day, 5);
        assert!((params.weights.sum() - 1.15).abs() < 1e-9);
        assert!(!params.weights.is_balanced());
        assert!(AlgorithmParams::default().weights.is_balanced());
    }
}
