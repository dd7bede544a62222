use std::collections::{BTreeMap, HashMap};

use crate::model::{QuestionId, QuestionResult, StudentId, StudentReport};
use crate::worker::GradingMatrix;

/// Marks earned on one question: `weight * passed / total`, or 0 when there are no cases
pub fn question_score(result: &QuestionResult, weight: f64) -> f64 {
    weight * result.ratio()
}

/// Builds one report per student from the complete grading matrix
///
/// Questions without an entry in `weights` are worth nothing. Totals are summed
/// in question-id order, so the result does not depend on the iteration order
/// of `results`.
pub fn aggregate(
    results: &GradingMatrix,
    weights: &HashMap<QuestionId, f64>,
) -> BTreeMap<StudentId, StudentReport> {
    let mut reports: BTreeMap<StudentId, StudentReport> = BTreeMap::new();

    for ((student, question), result) in results {
        let report = reports
            .entry(student.clone())
            .or_insert_with(|| StudentReport {
                student: student.clone(),
                questions: BTreeMap::new(),
                scores: BTreeMap::new(),
                total: 0.0,
            });

        let weight = weights.get(question).copied().unwrap_or_else(|| {
            log::warn!("No weight for question {question}, scoring it as 0");
            0.0
        });
        report
            .scores
            .insert(question.clone(), question_score(result, weight));
        report.questions.insert(question.clone(), result.clone());
    }

    for report in reports.values_mut() {
        report.total = report.scores.values().sum();
    }

    reports
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn result(question: &str, passed: usize, total: usize) -> QuestionResult {
        QuestionResult {
            question: question.to_string(),
            passed,
            total,
            failures: Vec::new(),
            compile_log: None,
        }
    }

    fn matrix(entries: &[(&str, &str, usize, usize)]) -> GradingMatrix {
        entries
            .iter()
            .map(|&(s, q, passed, total)| {
                ((s.to_string(), q.to_string()), result(q, passed, total))
            })
            .collect()
    }

    fn weights(entries: &[(&str, f64)]) -> HashMap<QuestionId, f64> {
        entries.iter().map(|&(q, w)| (q.to_string(), w)).collect()
    }

    #[test]
    fn test_question_score() {
        assert_eq!(question_score(&result("Q1", 3, 4), 4.0), 3.0);
        assert_eq!(question_score(&result("Q1", 4, 4), 10.0), 10.0);
        assert_eq!(question_score(&result("Q1", 0, 0), 4.0), 0.0);
    }

    #[test]
    fn test_aggregate_totals() {
        let results = matrix(&[
            ("ann", "Q1", 2, 2),
            ("ann", "Q2", 1, 4),
            ("bob", "Q1", 0, 2),
            ("bob", "Q2", 0, 0),
        ]);
        let reports = aggregate(&results, &weights(&[("Q1", 4.0), ("Q2", 8.0)]));

        assert_eq!(reports.len(), 2);
        assert_eq!(reports["ann"].total, 6.0);
        assert_eq!(reports["ann"].scores["Q2"], 2.0);
        assert_eq!(reports["bob"].total, 0.0);
        assert_eq!(reports["bob"].questions["Q1"].total, 2);
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        // 0.1 + 0.2 + 0.3 depends on the order of the additions
        let w = weights(&[("Q1", 0.1), ("Q2", 0.2), ("Q3", 0.3)]);
        let in_id_order = (0.1 + 0.2) + 0.3;
        let reversed = (0.3 + 0.2) + 0.1;
        assert_ne!(in_id_order, reversed);

        let entries = [("ann", "Q1", 4, 4), ("ann", "Q2", 4, 4), ("ann", "Q3", 4, 4)];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for order in orders {
            let permuted: Vec<_> = order.iter().map(|&i| entries[i]).collect();
            // a fresh hasher per map, so each one iterates in its own order
            let reports = aggregate(&matrix(&permuted), &w);
            assert_eq!(
                reports["ann"].total.to_bits(),
                f64::to_bits(in_id_order),
                "insertion order {order:?}"
            );
        }
    }

    #[test]
    fn test_missing_weight_scores_zero() {
        let reports = aggregate(&matrix(&[("ann", "Q9", 2, 2)]), &HashMap::new());
        assert_eq!(reports["ann"].total, 0.0);
    }
}
