use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::lead::AlgorithmParams;
use crate::response::AssignmentResult;
use crate::summary::{format_percent, LogEntry, LogLevel, RankedCandidate, ScoreBar};

const BAR_CELLS: usize = 30;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Daily counts are shown against the limits in `params`.
pub fn render_result_panel(result: &AssignmentResult, params: &AlgorithmParams) -> String {
    let mut table = new_table();
    let headline = if result.success {
        Cell::new(result.headline()).fg(Color::Green)
    } else {
        Cell::new(result.headline()).fg(Color::Red)
    };
    table.set_header(vec![headline, Cell::new("")]);

    let mut rows: Vec<(String, String)> = Vec::new();
    if let Some(message) = &result.response {
        rows.push(("Message".to_string(), message.clone()));
    }
    if let Some(kind) = result.failure {
        rows.push(("Failure".to_string(), kind.to_string()));
    }
    if let Some(error) = &result.error {
        rows.push(("Error".to_string(), error.clone()));
    }
    if result.success {
        if let Some(name) = &result.salesperson {
            rows.push(("Assigned Salesperson".to_string(), name.clone()));
            rows.push((
                "Salesperson ID".to_string(),
                result.salesperson_id.clone().unwrap_or_else(|| "-".to_string()),
            ));
        }
        if let Some(date) = &result.appointment_date {
            rows.push(("Appointment Scheduled".to_string(), date.clone()));
        }
        if let Some(details) = &result.assignment_details {
            if let Some(travel) = &details.travel_time {
                let origin = details
                    .travel_origin()
                    .map(|o| format!(" from {o}"))
                    .unwrap_or_default();
                rows.push(("Travel Time".to_string(), format!("{travel}{origin}")));
            }
            if let Some(count) = details.appointments_on_date {
                rows.push((
                    "Appointments on Date".to_string(),
                    format!("{count}/{}", params.max_appointments_per_day),
                ));
            }
            if let Some(today) = details.today_assignments {
                rows.push((
                    "Today's Assignments".to_string(),
                    format!("{today}/{}", params.max_new_assignments_per_day),
                ));
            }
            if let Some(final_score) = details.scores.and_then(|s| s.final_score) {
                rows.push(("Final Score".to_string(), format!("{final_score:.3}")));
            }
        }
    }
    for (label, value) in rows {
        table.add_row(vec![label, value]);
    }
    table.to_string()
}

/// Fixed-width text bar; filled cells follow `width_percent`.
pub fn render_bar(width_percent: f64) -> String {
    let filled = ((width_percent / 100.0) * BAR_CELLS as f64).round() as usize;
    let filled = filled.min(BAR_CELLS);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

pub fn render_score_bars(bars: &[ScoreBar]) -> String {
    let label_width = bars.iter().map(|b| b.label.len()).max().unwrap_or(0);
    bars.iter()
        .map(|bar| {
            format!(
                "{:<label_width$}  {}  {}",
                bar.label,
                render_bar(bar.width_percent),
                format_percent(bar.value),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_logs_table(logs: &[LogEntry]) -> String {
    let mut table = new_table();
    table.set_header(vec!["#", "Level", "Message", "Details"]);
    for (idx, entry) in logs.iter().enumerate() {
        let level = match entry.level {
            LogLevel::Info => Cell::new("INFO").fg(Color::Blue),
            LogLevel::Success => Cell::new("SUCCESS").fg(Color::Green),
            LogLevel::Error => Cell::new("ERROR").fg(Color::Red),
        };
        let details = entry
            .details
            .iter()
            .map(|d| format!("{}: {}", d.key, d.value))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(Row::from(vec![
            Cell::new((idx + 1).to_string()),
            level,
            Cell::new(&entry.message),
            Cell::new(details),
        ]));
    }
    table.to_string()
}

pub fn render_ranking_table(ranking: &[RankedCandidate]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Rank",
        "Salesperson",
        "Final",
        "Performance",
        "Proximity",
        "Capacity",
        "Route Eff.",
        "Chosen",
    ]);
    let pct = |v: Option<f64>| v.map(format_percent).unwrap_or_else(|| "-".to_string());
    for candidate in ranking {
        let chosen = if candidate.chosen {
            Cell::new("YES").fg(Color::Green)
        } else {
            Cell::new("")
        };
        table.add_row(Row::from(vec![
            Cell::new(candidate.rank.to_string()),
            Cell::new(&candidate.salesperson),
            Cell::new(format!("{:.3}", candidate.final_score)),
            Cell::new(pct(candidate.scores.performance)),
            Cell::new(pct(candidate.scores.proximity)),
            Cell::new(pct(candidate.scores.capacity)),
            Cell::new(pct(candidate.scores.route_efficiency)),
            chosen,
        ]));
    }
    table.to_string()
}

pub fn render_params_table(params: &AlgorithmParams) -> String {
    let mut table = new_table();
    table.set_header(vec!["Setting", "Value"]);
    let w = &params.weights;
    table.add_row(vec![
        "Max Travel Time".to_string(),
        format!("{} min", params.max_travel_time_minutes),
    ]);
    table.add_row(vec![
        "Max Appointments/Day".to_string(),
        params.max_appointments_per_day.to_string(),
    ]);
    table.add_row(vec![
        "Max New Assignments/Day".to_string(),
        params.max_new_assignments_per_day.to_string(),
    ]);
    table.add_row(vec![
        "Min Time Gap".to_string(),
        format!("{} min", params.min_time_gap_minutes),
    ]);
    table.add_row(vec!["Performance Weight".to_string(), format_percent(w.performance)]);
    table.add_row(vec!["Proximity Weight".to_string(), format_percent(w.proximity)]);
    table.add_row(vec!["Capacity Weight".to_string(), format_percent(w.capacity)]);
    table.add_row(vec![
        "Route Efficiency Weight".to_string(),
        format_percent(w.route_efficiency),
    ]);
    let sum_cell = if w.is_balanced() {
        Cell::new(format!("{:.2}", w.sum())).fg(Color::Green)
    } else {
        Cell::new(format!("{:.2} (expected 1.00)", w.sum())).fg(Color::Yellow)
    };
    table.add_row(Row::from(vec![Cell::new("Weight Sum"), sum_cell]));
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_fill_tracks_width_and_caps_at_full() {
        assert_eq!(render_bar(0.0).chars().filter(|c| *c == '█').count(), 0);
        assert_eq!(render_bar(50.0).chars().filter(|c| *c == '█').count(), 15);
        assert_eq!(render_bar(100.0).chars().filter(|c| *c == '█').count(), BAR_CELLS);
        assert_eq!(render_bar(100.0).chars().count(), BAR_CELLS);
    }

    #[test]
    fn params_table_flags_unbalanced_weights() {
        let mut params = AlgorithmParams::default();
        assert!(!render_params_table(&params).contains("expected 1.00"));
        params.weights.capacity = 0.6;
        assert!(render_params_table(&params).contains("expected 1.00"));
    }

    #[test]
    fn failure_panel_shows_error_and_no_assignee() {
        let result = AssignmentResult::failed(
            crate::response::FailureKind::Transport,
            "Error testing assignment",
            "connection refused",
        );
        let panel = render_result_panel(&result, &AlgorithmParams::default());
        assert!(panel.contains("Assignment Failed"));
        assert!(panel.contains("connection refused"));
        assert!(!panel.contains("Assigned Salesperson"));
    }

    #[test]
    fn panel_shows_daily_counts_against_limits() {
        let result: AssignmentResult = serde_json::from_value(serde_json::json!({
            "success": true,
            "salesperson": "Maria Chen",
            "assignmentDetails": { "appointmentsOnDate": 3, "todayAssignments": 2 }
        }))
        .expect("payload");
        let params = AlgorithmParams {
            max_appointments_per_day: 6,
            ..AlgorithmParams::default()
        };
        let panel = render_result_panel(&result, &params);
        assert!(panel.contains("3/6"));
        assert!(panel.contains("2/4"));
    }
}
