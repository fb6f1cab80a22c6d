use std::collections::{BTreeMap, BTreeSet};

use super::super::domain::{Category, LikertLevel, Question};
use super::CategoryScore;

const PERCENT_CEILING: f64 = 100.0;

/// Weighted totals per category, normalised against the all-expert maximum.
pub(crate) fn weighted_normalized(
    answered: &[(&Question, LikertLevel)],
    categories: &BTreeSet<Category>,
) -> BTreeMap<Category, CategoryScore> {
    let max_answer = f64::from(LikertLevel::MAX.value());
    let mut totals: BTreeMap<Category, CategoryScore> = categories
        .iter()
        .map(|category| (*category, CategoryScore::zeroed()))
        .collect();

    for (question, answer) in answered {
        let value = f64::from(answer.value());
        for (category, weight) in &question.weights {
            if *weight <= 0.0 {
                continue;
            }
            let entry = totals.entry(*category).or_insert_with(CategoryScore::zeroed);
            entry.raw_total += value * weight;
            entry.max_total = entry.max_total.map(|max| max + max_answer * weight);
            entry.contributing_questions += 1;
        }
    }

    for tally in totals.values_mut() {
        let max_total = tally.max_total.unwrap_or(0.0);
        tally.score = if max_total > 0.0 {
            (tally.raw_total / max_total * PERCENT_CEILING).min(PERCENT_CEILING)
        } else {
            0.0
        };
    }

    totals
}

/// Legacy product scoring: every contributing answer multiplies the category score.
pub(crate) fn multiplicative(
    answered: &[(&Question, LikertLevel)],
    categories: &BTreeSet<Category>,
) -> BTreeMap<Category, CategoryScore> {
    let mut totals: BTreeMap<Category, CategoryScore> = categories
        .iter()
        .map(|category| (*category, CategoryScore::unit()))
        .collect();

    for (question, answer) in answered {
        let value = f64::from(answer.value());
        for (category, weight) in &question.weights {
            if *weight <= 0.0 {
                continue;
            }
            let entry = totals.entry(*category).or_insert_with(CategoryScore::unit);
            entry.raw_total *= value;
            entry.score = entry.raw_total;
            entry.contributing_questions += 1;
        }
    }

    totals
}
