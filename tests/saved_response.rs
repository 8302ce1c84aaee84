use std::path::PathBuf;

use assignment_tester::lead::AlgorithmParams;
use assignment_tester::output::csv::ranking_to_csv;
use assignment_tester::output::table::render_result_panel;
use assignment_tester::response::AssignmentResult;
use assignment_tester::summary::{summarize, SubmissionContext, SummaryOptions};
use chrono::Utc;

fn demo_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/sample-response.json")
}

#[test]
fn demo_response_summarizes_offline() {
    let result = AssignmentResult::load(&demo_path()).expect("demo response");
    assert!(result.success);
    assert_eq!(result.failure, None);

    let summary = summarize(
        SubmissionContext {
            city: "Toronto",
            sent_params: None,
        },
        &result,
        &SummaryOptions::default(),
        Utc::now(),
    );
    let names: Vec<&str> = summary
        .ranking
        .iter()
        .map(|c| c.salesperson.as_str())
        .collect();
    assert_eq!(names, vec!["Maria Chen", "Kim Ng", "Lee Park"]);
    assert!(summary.ranking[0].chosen);
    assert_eq!(summary.disqualified, 1);
    assert_eq!(summary.logs[1].message, "Parameters used by the service");
    assert!(summary
        .logs
        .iter()
        .any(|l| l.message.starts_with("Raj Patel disqualified: travel time 140 min")));

    let csv = ranking_to_csv(&summary.ranking).expect("csv");
    assert_eq!(csv.lines().count(), 4);

    let panel = render_result_panel(&result, &AlgorithmParams::default());
    assert!(panel.contains("2/5"));
    assert!(panel.contains("1/4"));
}

#[test]
fn missing_file_reports_its_path() {
    let path = demo_path().with_file_name("no-such-response.json");
    let err = AssignmentResult::load(&path).expect_err("missing file");
    assert!(err.to_string().contains("no-such-response.json"));
}
