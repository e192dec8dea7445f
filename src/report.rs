//! Plain-text report rendering for agreement statistics.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::StoreError;
use crate::models::QuestionId;
use crate::results::ScoredRow;
use crate::stats::{self, GRADER_COHORT_SIZE};

const RULE: &str = "================================================================================";
const THIN_RULE: &str =
    "--------------------------------------------------------------------------------";

/// Render the summary and per-question statistics report.
pub fn summary_report(
    rows: &[ScoredRow],
    questions: &[QuestionId],
    points_per_question: u32,
) -> String {
    let summary = stats::summary(rows, questions);

    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "SQL AUTOGRADING STATISTICS REPORT");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);

    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{THIN_RULE}");
    let _ = writeln!(out, "Total students: {}", summary.total_students);
    let _ = writeln!(out, "Valid comparisons: {}", summary.valid_students);

    if summary.valid_students == 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, "No valid comparisons to report on.");
        return out;
    }

    let _ = writeln!(
        out,
        "Human average: {:.1}\u{b1}{:.1}",
        summary.human_avg, summary.human_std
    );
    let _ = writeln!(
        out,
        "LLM average: {:.1}\u{b1}{:.1}",
        summary.llm_avg, summary.llm_std
    );
    let _ = writeln!(out, "Average difference: {:.1}", summary.avg_difference);
    let _ = writeln!(out, "Overall agreement: {:.1}%", summary.overall_agreement);
    let _ = writeln!(out);

    let _ = writeln!(out, "Question-level agreement:");
    for (question, rate) in &summary.question_agreement {
        let _ = writeln!(out, "  Q{question}: {rate:.1}%");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "PER-QUESTION STATISTICS");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);

    let valid_count = summary.valid_students as f64;
    for (question, q) in stats::per_question(rows, questions) {
        let _ = writeln!(out, "QUESTION {question} (Out of {points_per_question})");
        let _ = writeln!(out, "{THIN_RULE}");
        let _ = writeln!(out, "Average LLM score: {:.1}\u{b1}{:.1}", q.llm_avg, q.llm_std);
        let _ = writeln!(
            out,
            "Average Human score: {:.1}\u{b1}{:.1}",
            q.human_avg, q.human_std
        );
        let _ = writeln!(out, "Average difference: {:.1}", q.avg_difference);
        let _ = writeln!(out, "Agreement rate: {:.1}%", q.agreement_rate);
        let _ = writeln!(
            out,
            "LLM scored higher: {} ({:.1}%)",
            q.llm_higher,
            q.llm_higher as f64 / valid_count * 100.0
        );
        let _ = writeln!(
            out,
            "LLM scored lower: {} ({:.1}%)",
            q.llm_lower,
            q.llm_lower as f64 / valid_count * 100.0
        );
        let _ = writeln!(out);
    }

    out
}

/// Render the per-grader statistics report.
pub fn per_grader_report(
    rows: &[ScoredRow],
    questions: &[QuestionId],
    points_per_question: u32,
) -> String {
    let grader_stats = stats::per_grader(rows, questions);
    let total_points = points_per_question * questions.len() as u32;

    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "PER-GRADER STATISTICS REPORT");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Grader Assignments:");
    for cohort in 1..=6usize {
        let first = (cohort - 1) * GRADER_COHORT_SIZE + 1;
        let last = cohort * GRADER_COHORT_SIZE;
        let _ = writeln!(out, "  G{cohort}: Students {first}-{last}");
    }
    let _ = writeln!(out);

    if grader_stats.is_empty() {
        let _ = writeln!(out, "No valid comparisons to report on.");
        return out;
    }

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "TOTAL SCORES (Out of {total_points})");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Grader | #Students | Human: avg\u{b1}std | LLM: avg\u{b1}std   | Avg Diff"
    );
    let _ = writeln!(out, "{THIN_RULE}");
    for (label, g) in &grader_stats {
        let _ = writeln!(
            out,
            "{label:>6} | {:>9} | {:>5.1}\u{b1}{:>4.1}   | {:>5.1}\u{b1}{:>4.1}   | {:>+8.1}",
            g.num_students,
            g.total_human_avg,
            g.total_human_std,
            g.total_llm_avg,
            g.total_llm_std,
            g.total_avg_diff
        );
    }
    let _ = writeln!(out);

    for (index, question) in questions.iter().enumerate() {
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "QUESTION {question} (Out of {points_per_question})");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Grader |  N  | Human: avg\u{b1}std | LLM: avg\u{b1}std | Avg Diff | Agreement"
        );
        let _ = writeln!(out, "{THIN_RULE}");
        for (label, g) in &grader_stats {
            let q = &g.questions[index].1;
            let _ = writeln!(
                out,
                "{label:>6} | {:>3} | {:>4.1}\u{b1}{:>3.1}     | {:>4.1}\u{b1}{:>3.1}    | {:>+8.1} | {:>8.1}%",
                g.num_students,
                q.human_avg,
                q.human_std,
                q.llm_avg,
                q.llm_std,
                q.avg_difference,
                q.agreement_rate
            );
        }
        let _ = writeln!(out);
    }

    out
}

/// Write a rendered report, creating parent directories as needed.
pub fn write_report(path: &Path, content: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ScoredQuestion;

    fn questions() -> Vec<QuestionId> {
        vec![QuestionId::new("4.1"), QuestionId::new("4.2")]
    }

    fn row(llm: [f64; 2], human: [f64; 2]) -> ScoredRow {
        let total_llm: f64 = llm.iter().sum();
        let total_human: f64 = human.iter().sum();
        ScoredRow {
            questions: llm
                .iter()
                .zip(human.iter())
                .map(|(l, h)| ScoredQuestion {
                    llm_score: Some(*l),
                    grader_score: Some(*h),
                    score_difference: Some(l - h),
                })
                .collect(),
            total_llm_score: Some(total_llm),
            total_grader_score: Some(total_human),
            total_score_difference: Some(total_llm - total_human),
        }
    }

    #[test]
    fn test_summary_report_layout() {
        let rows = vec![row([9.0, 8.0], [9.0, 8.0]), row([10.0, 8.0], [9.0, 8.0])];
        let report = summary_report(&rows, &questions(), 10);

        assert!(report.contains("SQL AUTOGRADING STATISTICS REPORT"));
        assert!(report.contains("Total students: 2"));
        assert!(report.contains("Valid comparisons: 2"));
        assert!(report.contains("Overall agreement: 50.0%"));
        assert!(report.contains("Question-level agreement:"));
        assert!(report.contains("  Q4.1: 50.0%"));
        assert!(report.contains("QUESTION 4.1 (Out of 10)"));
        assert!(report.contains("LLM scored higher: 1 (50.0%)"));
    }

    #[test]
    fn test_summary_report_with_no_valid_rows() {
        let report = summary_report(&[], &questions(), 10);
        assert!(report.contains("Total students: 0"));
        assert!(report.contains("No valid comparisons to report on."));
        assert!(!report.contains("PER-QUESTION STATISTICS"));
    }

    #[test]
    fn test_per_grader_report_layout() {
        let rows = vec![row([9.0, 8.0], [9.0, 8.0]), row([10.0, 7.0], [9.0, 8.0])];
        let report = per_grader_report(&rows, &questions(), 10);

        assert!(report.contains("PER-GRADER STATISTICS REPORT"));
        assert!(report.contains("  G1: Students 1-55"));
        assert!(report.contains("  G6: Students 276-330"));
        assert!(report.contains("TOTAL SCORES (Out of 20)"));
        assert!(report.contains("QUESTION 4.2 (Out of 10)"));
        // Only G1 has members, so no G2 row appears in the tables.
        assert!(report.contains("    G1 |"));
        assert!(!report.contains("    G2 |"));
    }

    #[test]
    fn test_write_report_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output").join("report.txt");
        write_report(&path, "hello\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
