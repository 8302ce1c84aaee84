use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lead::{AlgorithmParams, AssignmentRequest};
use crate::response::{to_f64, AssignmentResult, ScoreBreakdown};

pub const DEFAULT_TOP_N: usize = 5;
pub const COMPACT_TOP_N: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogDetail {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<LogDetail>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    pub rank: usize,
    pub salesperson: String,
    pub salesperson_id: Option<String>,
    pub final_score: f64,
    pub scores: ScoreBreakdown,
    pub chosen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub logs: Vec<LogEntry>,
    pub ranking: Vec<RankedCandidate>,
    pub evaluated: usize,
    pub disqualified: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryOptions {
    pub top_n: usize,
    /// Denominator of the "daily assignments n/max" line.
    pub max_new_assignments_per_day: u32,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            max_new_assignments_per_day: AlgorithmParams::default().max_new_assignments_per_day,
        }
    }
}

/// What the summarizer needs to know about the submission side.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionContext<'a> {
    pub city: &'a str,
    pub sent_params: Option<&'a AlgorithmParams>,
}

impl<'a> From<&'a AssignmentRequest> for SubmissionContext<'a> {
    fn from(request: &'a AssignmentRequest) -> Self {
        Self {
            city: request.lead.city.as_str(),
            sent_params: request.algorithm_params.as_ref(),
        }
    }
}

struct LogBook {
    at: DateTime<Utc>,
    entries: Vec<LogEntry>,
}

impl LogBook {
    fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        self.push_with(level, message, Vec::new());
    }

    fn push_with(&mut self, level: LogLevel, message: impl Into<String>, details: Vec<LogDetail>) {
        self.entries.push(LogEntry {
            level,
            message: message.into(),
            details,
            timestamp: self.at,
        });
    }
}

fn detail(key: impl Into<String>, value: impl Into<String>) -> LogDetail {
    LogDetail {
        key: key.into(),
        value: value.into(),
    }
}

pub fn format_percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

pub fn summarize(
    context: SubmissionContext<'_>,
    result: &AssignmentResult,
    options: &SummaryOptions,
    at: DateTime<Utc>,
) -> Summary {
    let mut book = LogBook {
        at,
        entries: Vec::new(),
    };

    let city = if context.city.trim().is_empty() {
        "unspecified city"
    } else {
        context.city.trim()
    };
    book.push(
        LogLevel::Info,
        format!("Starting assignment process for {city}"),
    );

    log_parameters(&mut book, context.sent_params, result.parameters_used.as_ref());

    if result.success {
        book.push(LogLevel::Info, "Response received from assignment service");
    } else {
        let reason = result
            .response
            .as_deref()
            .or(result.error.as_deref())
            .unwrap_or("no reason given");
        let kind = result
            .failure
            .map(|k| k.to_string())
            .unwrap_or_else(|| "assignment failure".to_string());
        book.push(LogLevel::Error, format!("Assignment failed ({kind}): {reason}"));
        if let (Some(error), Some(_)) = (result.error.as_deref(), result.response.as_deref()) {
            book.push(LogLevel::Error, error.to_string());
        }
    }

    if result.success {
        if let Some(name) = result.salesperson.as_deref() {
            book.push(
                LogLevel::Success,
                format!("Found qualified salesperson: {name}"),
            );
        }
    }

    if let Some(details) = &result.assignment_details {
        if let Some(travel) = details.travel_time.as_deref() {
            let message = match details.travel_origin() {
                Some(origin) => format!("Travel time from {origin}: {travel}"),
                None => format!("Travel time from home/office: {travel}"),
            };
            book.push(LogLevel::Info, message);
        }
        if let Some(count) = details.appointments_on_date {
            book.push(
                LogLevel::Info,
                format!("Salesperson has {count} appointment(s) on requested date"),
            );
        }
        if let Some(today) = details.today_assignments {
            book.push(
                LogLevel::Info,
                format!(
                    "Daily assignments: {today}/{}",
                    options.max_new_assignments_per_day
                ),
            );
        }
        if let Some(scores) = &details.scores {
            let final_label = scores
                .final_score
                .map(|v| format!("{v:.3}"))
                .unwrap_or_else(|| "-".to_string());
            let details = score_bars(scores)
                .into_iter()
                .map(|bar| detail(bar.key, format_percent(bar.value)))
                .collect();
            book.push_with(
                LogLevel::Success,
                format!("Final assignment score: {final_label}"),
                details,
            );
        }
    }

    let mut disqualified = 0;
    for candidate in &result.evaluations {
        let name = if candidate.salesperson.is_empty() {
            "unnamed candidate"
        } else {
            candidate.salesperson.as_str()
        };
        if candidate.is_disqualified() {
            disqualified += 1;
            let reasons = if candidate.reasons.is_empty() {
                "no reason given".to_string()
            } else {
                candidate.reasons.join("; ")
            };
            book.push(LogLevel::Error, format!("{name} disqualified: {reasons}"));
        } else {
            let score = candidate
                .final_score()
                .map(|v| format!("{v:.3}"))
                .unwrap_or_else(|| "-".to_string());
            book.push(
                LogLevel::Info,
                format!("{name} evaluated, final score {score}"),
            );
        }
    }
    if !result.evaluations.is_empty() {
        book.push(
            LogLevel::Info,
            format!(
                "{disqualified} of {} candidate(s) disqualified",
                result.evaluations.len()
            ),
        );
    }

    Summary {
        logs: book.entries,
        ranking: rank_candidates(result, options.top_n),
        evaluated: result.evaluations.len(),
        disqualified,
    }
}

fn log_parameters(book: &mut LogBook, sent: Option<&AlgorithmParams>, used: Option<&Value>) {
    if let Some(Value::Object(map)) = used {
        let mut details = Vec::new();
        flatten_parameters("", map, &mut details);
        let weight_sum = map.get("weights").and_then(weight_sum_of);
        if let Some(sum) = weight_sum {
            details.push(detail("weight sum", format!("{sum:.2}")));
        }
        book.push_with(LogLevel::Info, "Parameters used by the service", details);
        return;
    }
    match sent {
        Some(params) => {
            let w = &params.weights;
            let details = vec![
                detail("max travel", format!("{} min", params.max_travel_time_minutes)),
                detail("max appointments/day", params.max_appointments_per_day.to_string()),
                detail("max new assignments/day", params.max_new_assignments_per_day.to_string()),
                detail("min time gap", format!("{} min", params.min_time_gap_minutes)),
                detail("performance", format_percent(w.performance)),
                detail("proximity", format_percent(w.proximity)),
                detail("capacity", format_percent(w.capacity)),
                detail("route efficiency", format_percent(w.route_efficiency)),
                detail("weight sum", format!("{:.2}", w.sum())),
            ];
            book.push_with(LogLevel::Info, "Parameters sent with request", details);
        }
        None => book.push(LogLevel::Info, "Using service default parameters"),
    }
}

fn flatten_parameters(prefix: &str, map: &serde_json::Map<String, Value>, out: &mut Vec<LogDetail>) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_parameters(&name, nested, out),
            Value::String(s) => out.push(detail(name, s.clone())),
            Value::Null => {}
            other => out.push(detail(name, other.to_string())),
        }
    }
}

fn weight_sum_of(weights: &Value) -> Option<f64> {
    let map = weights.as_object()?;
    let values: Vec<f64> = map.values().filter_map(to_f64).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum())
    }
}

struct Scored {
    salesperson: String,
    salesperson_id: Option<String>,
    scores: ScoreBreakdown,
    final_score: f64,
}

/// Ids decide when both sides carry one; otherwise the trimmed names must
/// agree.
fn is_assignee(result: &AssignmentResult, candidate: &Scored) -> bool {
    let wanted_id = result.salesperson_id.as_deref().map(str::trim);
    let candidate_id = candidate.salesperson_id.as_deref().map(str::trim);
    match (wanted_id, candidate_id) {
        (Some(wanted), Some(id)) => wanted == id,
        _ => result.salesperson.as_deref().map(str::trim) == Some(candidate.salesperson.trim()),
    }
}

/// Top-N qualified candidates by final score, highest first.
///
/// The sort is stable so equal scores keep the service's order. At most one
/// entry is marked chosen, the first that matches the assignee.
pub fn rank_candidates(result: &AssignmentResult, top_n: usize) -> Vec<RankedCandidate> {
    let mut pool: Vec<Scored> = result
        .evaluations
        .iter()
        .filter(|c| !c.is_disqualified())
        .filter_map(|c| {
            let scores = c.scores?;
            Some(Scored {
                salesperson: c.salesperson.clone(),
                salesperson_id: c.salesperson_id.clone(),
                final_score: scores.final_score?,
                scores,
            })
        })
        .collect();

    if result.evaluations.is_empty() {
        if let (Some(name), Some(scores)) = (result.salesperson.as_ref(), result.scores()) {
            if let Some(final_score) = scores.final_score {
                pool.push(Scored {
                    salesperson: name.clone(),
                    salesperson_id: result.salesperson_id.clone(),
                    scores: *scores,
                    final_score,
                });
            }
        }
    }

    pool.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    let chosen_at = if result.success {
        pool.iter().position(|c| is_assignee(result, c))
    } else {
        None
    };
    pool.into_iter()
        .take(top_n)
        .enumerate()
        .map(|(idx, c)| RankedCandidate {
            rank: idx + 1,
            salesperson: c.salesperson,
            salesperson_id: c.salesperson_id,
            final_score: c.final_score,
            scores: c.scores,
            chosen: chosen_at == Some(idx),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBar {
    pub key: &'static str,
    pub label: &'static str,
    pub value: f64,
    pub width_percent: f64,
}

pub fn bar_width(score: f64) -> f64 {
    (score * 100.0).clamp(0.0, 100.0)
}

pub fn score_bars(scores: &ScoreBreakdown) -> Vec<ScoreBar> {
    [
        ("performance", "Performance Score", scores.performance),
        ("proximity", "Proximity Score", scores.proximity),
        ("capacity", "Capacity Score", scores.capacity),
        ("routeEfficiency", "Route Efficiency Score", scores.route_efficiency),
    ]
    .into_iter()
    .map(|(key, label, value)| {
        let value = value.unwrap_or(0.0);
        ScoreBar {
            key,
            label,
            value,
            width_percent: bar_width(value),
        }
    })
    .collect()
}

/// Bars are only shown for a successful assignment that carries scores.
pub fn result_score_bars(result: &AssignmentResult) -> Vec<ScoreBar> {
    match result.scores() {
        Some(scores) if result.success => score_bars(scores),
        _ => Vec::new(),
    }
}
