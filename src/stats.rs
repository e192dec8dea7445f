//! Agreement statistics between the model and the human graders.
//!
//! The interesting part here is data hygiene, not arithmetic: a row only
//! counts if its grading actually succeeded (question 1's model score is the
//! failure indicator for the whole row) and every human score is present.

use crate::models::QuestionId;
use crate::results::ScoredRow;

/// A total-score difference below this counts as agreement. Looser than the
/// per-question threshold because rounding compounds across questions.
pub const TOTAL_AGREEMENT_THRESHOLD: f64 = 0.5;

/// Per-question agreement threshold; question-level grading is expected to
/// be exact or not at all.
pub const QUESTION_AGREEMENT_THRESHOLD: f64 = 0.1;

/// Number of consecutive store positions assigned to one human grader.
pub const GRADER_COHORT_SIZE: usize = 55;

const GRADER_COUNT: usize = 6;

/// Map a 0-based store position to its reviewer cohort: G1 takes positions
/// 0-54, G2 55-109, and so on; G6 is open-ended.
pub fn assign_grader(index: usize) -> String {
    let cohort = (index / GRADER_COHORT_SIZE).min(GRADER_COUNT - 1) + 1;
    format!("G{cohort}")
}

/// Overall agreement summary across all valid rows.
#[derive(Debug, Clone)]
pub struct SummaryStats {
    pub total_students: usize,
    pub valid_students: usize,
    pub human_avg: f64,
    pub human_std: f64,
    pub llm_avg: f64,
    pub llm_std: f64,
    pub avg_difference: f64,
    /// Percentage of valid rows with |total difference| under the threshold.
    pub overall_agreement: f64,
    pub question_agreement: Vec<(QuestionId, f64)>,
}

/// Statistics for a single question across valid rows.
#[derive(Debug, Clone)]
pub struct QuestionStats {
    pub llm_avg: f64,
    pub llm_std: f64,
    pub human_avg: f64,
    pub human_std: f64,
    pub avg_difference: f64,
    pub exact_matches: usize,
    pub agreement_rate: f64,
    pub llm_higher: usize,
    pub llm_lower: usize,
}

/// Statistics for one reviewer cohort.
#[derive(Debug, Clone)]
pub struct GraderStats {
    pub num_students: usize,
    pub total_llm_avg: f64,
    pub total_llm_std: f64,
    pub total_human_avg: f64,
    pub total_human_std: f64,
    pub total_avg_diff: f64,
    pub questions: Vec<(QuestionId, QuestionStats)>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; 0.0 for fewer than two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// A row is valid iff its failure indicator shows a successful grading run
/// and no human score is missing. Returns rows with their original 0-based
/// store position, which cohort assignment depends on.
pub fn valid_rows(rows: &[ScoredRow]) -> Vec<(usize, &ScoredRow)> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| {
            let graded = row
                .questions
                .first()
                .and_then(|q| q.llm_score)
                .is_some_and(|score| score >= 0.0);
            let human_complete = row.questions.iter().all(|q| q.grader_score.is_some());
            graded && human_complete
        })
        .collect()
}

fn agreement_rate(diffs: &[f64], threshold: f64, population: usize) -> (usize, f64) {
    let matches = diffs.iter().filter(|d| d.abs() < threshold).count();
    if population == 0 {
        return (0, 0.0);
    }
    (matches, matches as f64 / population as f64 * 100.0)
}

/// Summary statistics across the whole store.
pub fn summary(rows: &[ScoredRow], questions: &[QuestionId]) -> SummaryStats {
    let valid = valid_rows(rows);

    let totals_llm: Vec<f64> = valid
        .iter()
        .filter_map(|(_, r)| r.total_llm_score)
        .collect();
    let totals_human: Vec<f64> = valid
        .iter()
        .filter_map(|(_, r)| r.total_grader_score)
        .collect();
    let totals_diff: Vec<f64> = valid
        .iter()
        .filter_map(|(_, r)| r.total_score_difference)
        .collect();

    let (_, overall_agreement) =
        agreement_rate(&totals_diff, TOTAL_AGREEMENT_THRESHOLD, valid.len());

    let question_agreement = questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let diffs: Vec<f64> = valid
                .iter()
                .filter_map(|(_, r)| r.questions.get(i).and_then(|q| q.score_difference))
                .collect();
            let (_, rate) = agreement_rate(&diffs, QUESTION_AGREEMENT_THRESHOLD, valid.len());
            (question.clone(), rate)
        })
        .collect();

    SummaryStats {
        total_students: rows.len(),
        valid_students: valid.len(),
        human_avg: mean(&totals_human),
        human_std: sample_std(&totals_human),
        llm_avg: mean(&totals_llm),
        llm_std: sample_std(&totals_llm),
        avg_difference: mean(&totals_diff),
        overall_agreement,
        question_agreement,
    }
}

fn question_stats_for<'a>(
    rows: impl Iterator<Item = &'a ScoredRow> + Clone,
    index: usize,
    population: usize,
) -> QuestionStats {
    let llm: Vec<f64> = rows
        .clone()
        .filter_map(|r| r.questions.get(index).and_then(|q| q.llm_score))
        .collect();
    let human: Vec<f64> = rows
        .clone()
        .filter_map(|r| r.questions.get(index).and_then(|q| q.grader_score))
        .collect();
    let diffs: Vec<f64> = rows
        .filter_map(|r| r.questions.get(index).and_then(|q| q.score_difference))
        .collect();

    let (exact_matches, rate) = agreement_rate(&diffs, QUESTION_AGREEMENT_THRESHOLD, population);
    QuestionStats {
        llm_avg: mean(&llm),
        llm_std: sample_std(&llm),
        human_avg: mean(&human),
        human_std: sample_std(&human),
        avg_difference: mean(&diffs),
        exact_matches,
        agreement_rate: rate,
        llm_higher: diffs
            .iter()
            .filter(|d| **d > QUESTION_AGREEMENT_THRESHOLD)
            .count(),
        llm_lower: diffs
            .iter()
            .filter(|d| **d < -QUESTION_AGREEMENT_THRESHOLD)
            .count(),
    }
}

/// Per-question statistics over all valid rows, in question order.
pub fn per_question(rows: &[ScoredRow], questions: &[QuestionId]) -> Vec<(QuestionId, QuestionStats)> {
    let valid = valid_rows(rows);
    questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            (
                question.clone(),
                question_stats_for(valid.iter().map(|(_, r)| *r), i, valid.len()),
            )
        })
        .collect()
}

/// Per-cohort statistics, G1 through G6, skipping cohorts with no valid
/// rows. Partitioning uses the same validity filter as the summary.
pub fn per_grader(rows: &[ScoredRow], questions: &[QuestionId]) -> Vec<(String, GraderStats)> {
    let valid = valid_rows(rows);
    let mut out = Vec::new();

    for cohort in 1..=GRADER_COUNT {
        let label = format!("G{cohort}");
        let members: Vec<&ScoredRow> = valid
            .iter()
            .filter(|(index, _)| assign_grader(*index) == label)
            .map(|(_, row)| *row)
            .collect();
        if members.is_empty() {
            continue;
        }

        let totals_llm: Vec<f64> = members.iter().filter_map(|r| r.total_llm_score).collect();
        let totals_human: Vec<f64> = members
            .iter()
            .filter_map(|r| r.total_grader_score)
            .collect();
        let totals_diff: Vec<f64> = members
            .iter()
            .filter_map(|r| r.total_score_difference)
            .collect();

        let question_stats = questions
            .iter()
            .enumerate()
            .map(|(i, question)| {
                (
                    question.clone(),
                    question_stats_for(members.iter().copied(), i, members.len()),
                )
            })
            .collect();

        out.push((
            label,
            GraderStats {
                num_students: members.len(),
                total_llm_avg: mean(&totals_llm),
                total_llm_std: sample_std(&totals_llm),
                total_human_avg: mean(&totals_human),
                total_human_std: sample_std(&totals_human),
                total_avg_diff: mean(&totals_diff),
                questions: question_stats,
            },
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::round1;
    use crate::results::ScoredQuestion;

    fn questions() -> Vec<QuestionId> {
        vec![QuestionId::new("4.1"), QuestionId::new("4.2")]
    }

    fn row(llm: [f64; 2], human: [Option<f64>; 2]) -> ScoredRow {
        let diffs: Vec<Option<f64>> = llm
            .iter()
            .zip(human.iter())
            .map(|(l, h)| h.map(|h| round1(l - h)))
            .collect();
        let total_llm: f64 = llm.iter().sum();
        let total_human: f64 = human.iter().flatten().sum();
        ScoredRow {
            questions: llm
                .iter()
                .zip(human.iter())
                .zip(diffs.iter())
                .map(|((l, h), d)| ScoredQuestion {
                    llm_score: Some(*l),
                    grader_score: *h,
                    score_difference: *d,
                })
                .collect(),
            total_llm_score: Some(round1(total_llm)),
            total_grader_score: Some(total_human),
            total_score_difference: Some(round1(total_llm - total_human)),
        }
    }

    fn failed_row() -> ScoredRow {
        ScoredRow {
            questions: vec![
                ScoredQuestion {
                    llm_score: Some(-1.0),
                    grader_score: Some(8.0),
                    score_difference: Some(-1.0),
                },
                ScoredQuestion {
                    llm_score: Some(-1.0),
                    grader_score: Some(7.0),
                    score_difference: Some(-1.0),
                },
            ],
            total_llm_score: Some(-1.0),
            total_grader_score: Some(15.0),
            total_score_difference: Some(-1.0),
        }
    }

    #[test]
    fn test_assign_grader_boundaries() {
        assert_eq!(assign_grader(0), "G1");
        assert_eq!(assign_grader(54), "G1");
        assert_eq!(assign_grader(55), "G2");
        assert_eq!(assign_grader(109), "G2");
        assert_eq!(assign_grader(110), "G3");
        assert_eq!(assign_grader(274), "G5");
        assert_eq!(assign_grader(275), "G6");
        assert_eq!(assign_grader(329), "G6");
        // The last cohort is open-ended.
        assert_eq!(assign_grader(1000), "G6");
    }

    #[test]
    fn test_validity_filter_excludes_failed_rows() {
        let rows = vec![row([9.0, 8.0], [Some(9.0), Some(8.0)]), failed_row()];
        let valid = valid_rows(&rows);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].0, 0);

        let stats = summary(&rows, &questions());
        assert_eq!(stats.total_students, 2);
        assert_eq!(stats.valid_students, 1);
    }

    #[test]
    fn test_validity_filter_excludes_missing_human_score() {
        // Model score is fine but one human score is missing.
        let rows = vec![
            row([9.0, 8.0], [Some(9.0), None]),
            row([7.0, 7.0], [Some(7.0), Some(7.0)]),
        ];
        let valid = valid_rows(&rows);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].0, 1);
    }

    #[test]
    fn test_summary_agreement_thresholds() {
        let rows = vec![
            // total diff 0.0 -> agrees; both questions agree
            row([9.0, 8.0], [Some(9.0), Some(8.0)]),
            // total diff 0.4 -> agrees at total level, q1 diff 0.4 does not
            row([9.4, 8.0], [Some(9.0), Some(8.0)]),
            // total diff 1.0 -> no agreement anywhere
            row([10.0, 8.0], [Some(9.0), Some(8.0)]),
        ];
        let stats = summary(&rows, &questions());
        assert_eq!(stats.valid_students, 3);
        assert!((stats.overall_agreement - 66.66666666666667).abs() < 1e-9);
        // Question 4.1 agrees on 1 of 3 rows, question 4.2 on all 3.
        assert!((stats.question_agreement[0].1 - 33.33333333333333).abs() < 1e-9);
        assert_eq!(stats.question_agreement[1].1, 100.0);
    }

    #[test]
    fn test_summary_means_and_std() {
        let rows = vec![
            row([10.0, 10.0], [Some(10.0), Some(10.0)]),
            row([8.0, 8.0], [Some(9.0), Some(9.0)]),
        ];
        let stats = summary(&rows, &questions());
        assert_eq!(stats.llm_avg, 18.0);
        assert_eq!(stats.human_avg, 19.0);
        assert_eq!(stats.avg_difference, -1.0);
        // Sample std of [20, 16] and [20, 18].
        assert!((stats.llm_std - 2.8284271247461903).abs() < 1e-9);
        assert!((stats.human_std - std::f64::consts::SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn test_summary_empty_store() {
        let stats = summary(&[], &questions());
        assert_eq!(stats.total_students, 0);
        assert_eq!(stats.valid_students, 0);
        assert_eq!(stats.overall_agreement, 0.0);
        assert_eq!(stats.llm_avg, 0.0);
    }

    #[test]
    fn test_per_question_direction_counts() {
        let rows = vec![
            row([10.0, 8.0], [Some(9.0), Some(8.0)]), // q1 higher, q2 equal
            row([8.0, 8.0], [Some(9.0), Some(8.0)]),  // q1 lower, q2 equal
            row([9.0, 8.0], [Some(9.0), Some(8.0)]),  // both equal
        ];
        let stats = per_question(&rows, &questions());
        let q1 = &stats[0].1;
        assert_eq!(q1.llm_higher, 1);
        assert_eq!(q1.llm_lower, 1);
        assert_eq!(q1.exact_matches, 1);
        let q2 = &stats[1].1;
        assert_eq!(q2.exact_matches, 3);
        assert_eq!(q2.agreement_rate, 100.0);
    }

    #[test]
    fn test_per_grader_partitions_by_store_position() {
        // 56 valid rows: 55 land in G1, one in G2.
        let mut rows: Vec<ScoredRow> = (0..56)
            .map(|_| row([9.0, 8.0], [Some(9.0), Some(8.0)]))
            .collect();
        // A failed row keeps its position but joins no cohort.
        rows.insert(10, failed_row());

        let cohorts = per_grader(&rows, &questions());
        assert_eq!(cohorts.len(), 2);
        assert_eq!(cohorts[0].0, "G1");
        // Position 10 is the failed row, so G1 holds 54 valid rows.
        assert_eq!(cohorts[0].1.num_students, 54);
        assert_eq!(cohorts[1].0, "G2");
        assert_eq!(cohorts[1].1.num_students, 2);
    }

    #[test]
    fn test_per_grader_question_stats() {
        let rows = vec![
            row([10.0, 8.0], [Some(9.0), Some(8.0)]),
            row([9.0, 8.0], [Some(9.0), Some(8.0)]),
        ];
        let cohorts = per_grader(&rows, &questions());
        assert_eq!(cohorts.len(), 1);
        let g1 = &cohorts[0].1;
        assert_eq!(g1.num_students, 2);
        assert_eq!(g1.total_llm_avg, 17.5);
        assert_eq!(g1.total_human_avg, 17.0);
        let q1 = &g1.questions[0].1;
        assert_eq!(q1.llm_avg, 9.5);
        assert_eq!(q1.agreement_rate, 50.0);
    }
}
