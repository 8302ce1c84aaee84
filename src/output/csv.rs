use anyhow::Result;

use crate::lead::AlgorithmParams;
use crate::summary::RankedCandidate;

fn score_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

pub fn ranking_to_csv(ranking: &[RankedCandidate]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "rank",
        "salesperson",
        "salesperson_id",
        "final",
        "performance",
        "proximity",
        "capacity",
        "route_efficiency",
        "chosen",
    ])?;
    for candidate in ranking {
        writer.write_record([
            candidate.rank.to_string(),
            candidate.salesperson.clone(),
            candidate.salesperson_id.clone().unwrap_or_default(),
            format!("{:.4}", candidate.final_score),
            score_cell(candidate.scores.performance),
            score_cell(candidate.scores.proximity),
            score_cell(candidate.scores.capacity),
            score_cell(candidate.scores.route_efficiency),
            candidate.chosen.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn params_to_csv(params: &AlgorithmParams) -> Result<String> {
    let w = &params.weights;
    let rows = [
        ("max_travel_time_minutes", params.max_travel_time_minutes.to_string()),
        ("max_appointments_per_day", params.max_appointments_per_day.to_string()),
        ("max_new_assignments_per_day", params.max_new_assignments_per_day.to_string()),
        ("min_time_gap_minutes", params.min_time_gap_minutes.to_string()),
        ("weight_performance", w.performance.to_string()),
        ("weight_proximity", w.proximity.to_string()),
        ("weight_capacity", w.capacity.to_string()),
        ("weight_route_efficiency", w.route_efficiency.to_string()),
        ("weight_sum", format!("{:.2}", w.sum())),
        ("balanced", w.is_balanced().to_string()),
    ];
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["setting", "value"])?;
    for (setting, value) in rows {
        writer.write_record([setting, value.as_str()])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
