use super::metrics::CustomerMetrics;
use super::segment::Scores;

/// Share of the population strictly below `x`, in percent.
///
/// `sorted` must be ascending. Equivalent to scanning for the first element
/// `>= x`, done with a binary search.
pub fn percentile(sorted: &[f64], x: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = sorted.partition_point(|v| *v < x);
    idx as f64 / sorted.len() as f64 * 100.0
}

/// Fewer days since the last purchase is better.
pub fn recency_score(percentile: f64) -> u8 {
    match percentile {
        p if p <= 20.0 => 5,
        p if p <= 40.0 => 4,
        p if p <= 60.0 => 3,
        p if p <= 80.0 => 2,
        _ => 1,
    }
}

/// Frequency and value: higher is better.
pub fn ascending_score(percentile: f64) -> u8 {
    match percentile {
        p if p >= 80.0 => 5,
        p if p >= 60.0 => 4,
        p if p >= 40.0 => 3,
        p if p >= 20.0 => 2,
        _ => 1,
    }
}

/// Sorted metric distributions of every scored customer.
#[derive(Debug, Default)]
pub struct Population {
    recency: Vec<f64>,
    frequency: Vec<f64>,
    value: Vec<f64>,
}

impl Population {
    pub fn new(customers: &[CustomerMetrics]) -> Self {
        Self {
            recency: sorted_by(customers, |c| c.days_since_last_purchase as f64),
            frequency: sorted_by(customers, |c| f64::from(c.frequency)),
            value: sorted_by(customers, |c| c.total_value),
        }
    }

    pub fn score(&self, c: &CustomerMetrics) -> Scores {
        Scores::new(
            recency_score(percentile(&self.recency, c.days_since_last_purchase as f64)),
            ascending_score(percentile(&self.frequency, f64::from(c.frequency))),
            ascending_score(percentile(&self.value, c.total_value)),
        )
    }
}

fn sorted_by(customers: &[CustomerMetrics], metric: impl Fn(&CustomerMetrics) -> f64) -> Vec<f64> {
    let mut v: Vec<f64> = customers.iter().map(metric).collect();
    v.sort_by(f64::total_cmp);
    v
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn customer(days: i64, frequency: u32, value: f64) -> CustomerMetrics {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        CustomerMetrics {
            key: format!("name:{days}-{frequency}-{value}"),
            name: "x".into(),
            cpf: None,
            medical_record: None,
            email: None,
            phone: None,
            first_purchase: d,
            last_purchase: d,
            days_since_last_purchase: days,
            frequency,
            total_value: value,
            average_ticket: value / f64::from(frequency),
        }
    }

    #[test]
    fn percentile_is_rank_of_first_not_smaller() {
        let sorted = [1.0, 2.0, 2.0, 3.0, 10.0];
        assert_eq!(percentile(&sorted, 1.0), 0.0);
        assert_eq!(percentile(&sorted, 2.0), 20.0);
        assert_eq!(percentile(&sorted, 3.0), 60.0);
        assert_eq!(percentile(&sorted, 10.0), 80.0);
        assert_eq!(percentile(&sorted, 11.0), 100.0);
        assert_eq!(percentile(&[], 5.0), 0.0);
    }

    #[test]
    fn band_edges() {
        assert_eq!(recency_score(20.0), 5);
        assert_eq!(recency_score(20.1), 4);
        assert_eq!(recency_score(80.0), 2);
        assert_eq!(recency_score(80.1), 1);
        assert_eq!(ascending_score(80.0), 5);
        assert_eq!(ascending_score(79.9), 4);
        assert_eq!(ascending_score(20.0), 2);
        assert_eq!(ascending_score(19.9), 1);
    }

    #[test]
    fn more_recent_never_scores_lower() {
        let customers: Vec<_> = [3, 400, 15, 90, 90, 7, 250, 30, 1, 180]
            .iter()
            .enumerate()
            .map(|(i, d)| customer(*d, i as u32 + 1, 100.0))
            .collect();
        let population = Population::new(&customers);

        for a in &customers {
            for b in &customers {
                if a.days_since_last_purchase < b.days_since_last_purchase {
                    assert!(population.score(a).recency >= population.score(b).recency);
                }
            }
        }
    }

    #[test]
    fn higher_value_scores_higher() {
        let customers: Vec<_> = (1..=10).map(|i| customer(10, 1, f64::from(i) * 100.0)).collect();
        let population = Population::new(&customers);

        assert_eq!(population.score(&customers[0]).value, 1);
        assert_eq!(population.score(&customers[9]).value, 5);
        // Everyone bought once: frequency percentile is 0 for all.
        assert!(customers.iter().all(|c| population.score(c).frequency == 1));
        // Same recency for everyone: percentile 0, best score.
        assert!(customers.iter().all(|c| population.score(c).recency == 5));
    }
}
