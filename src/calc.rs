use crate::records::{AttendanceStatus, LetterGrade};
use serde::Serialize;
use std::collections::BTreeMap;

/// Half-up rounding to 2 decimals, used only for displayed rates:
/// `Int(100*x + 0.5) / 100`
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Normalized score of one grade record. `None` when nothing was possible.
pub fn grade_percentage(points_earned: f64, points_possible: f64) -> Option<f64> {
    if points_possible > 0.0 {
        Some(100.0 * points_earned / points_possible)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    pub fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// `None` for an empty series: no data is not the same as a zero average.
    pub fn value(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

impl FromIterator<f64> for Mean {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut m = Mean::default();
        for v in iter {
            m.push(v);
        }
        m
    }
}

/// Mean of `(value, weight)` pairs; entries with non-positive weight are ignored.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut num = 0.0;
    let mut denom = 0.0;
    for (value, weight) in pairs {
        if weight <= 0.0 {
            continue;
        }
        num += value * weight;
        denom += weight;
    }
    if denom > 0.0 {
        Some(num / denom)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceTally {
    pub attended: usize,
    pub total: usize,
}

impl AttendanceTally {
    pub fn record_many(&mut self, status: AttendanceStatus, n: usize) {
        self.total += n;
        if status.is_attended() {
            self.attended += n;
        }
    }

    pub fn merge(&mut self, other: AttendanceTally) {
        self.attended += other.attended;
        self.total += other.total;
    }

    /// Attended share as a percentage rounded to 2 decimals; `None` with no records.
    pub fn rate(&self) -> Option<f64> {
        attendance_rate(self.attended, self.total)
    }
}

pub fn attendance_rate(attended: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(round_off_2_decimals(
        100.0 * attended as f64 / total as f64,
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LetterCount {
    pub letter: &'static str,
    pub count: usize,
}

/// Letter histogram over normalized scores. Every letter is present, A first.
pub fn grade_distribution<I>(percentages: I) -> Vec<LetterCount>
where
    I: IntoIterator<Item = f64>,
{
    let mut counts: BTreeMap<LetterGrade, usize> =
        LetterGrade::ALL.iter().map(|l| (*l, 0)).collect();
    for p in percentages {
        *counts.entry(LetterGrade::from_percentage(p)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(letter, count)| LetterCount {
            letter: letter.as_str(),
            count,
        })
        .collect()
}
