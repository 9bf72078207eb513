use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use super::identity::CustomerIdentity;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Raw RFV metrics for one identity with at least one purchase.
#[derive(Debug, Clone)]
pub struct CustomerMetrics {
    pub key: String,
    pub name: String,
    pub cpf: Option<String>,
    pub medical_record: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_purchase: NaiveDate,
    pub last_purchase: NaiveDate,
    pub days_since_last_purchase: i64,
    pub frequency: u32,
    pub total_value: f64,
    pub average_ticket: f64,
}

/// Whole days between `now` and midnight UTC of `date`, floored.
pub fn days_since(date: NaiveDate, now: DateTime<Utc>) -> i64 {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (now.timestamp_millis() - start.timestamp_millis()).div_euclid(MS_PER_DAY)
}

/// Drops identities without purchases. Output is ordered by identity key.
pub fn calculate(
    identities: HashMap<String, CustomerIdentity>,
    now: DateTime<Utc>,
) -> Vec<CustomerMetrics> {
    let mut out: Vec<CustomerMetrics> = identities
        .into_values()
        .filter_map(|identity| customer_metrics(identity, now))
        .collect();
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

fn customer_metrics(mut identity: CustomerIdentity, now: DateTime<Utc>) -> Option<CustomerMetrics> {
    identity.purchases.sort_by(|a, b| b.date.cmp(&a.date));
    let last_purchase = identity.purchases.first()?.date;
    let first_purchase = identity.purchases.last()?.date;

    let frequency = identity.purchases.len() as u32;
    let total_value: f64 = identity.purchases.iter().map(|p| p.amount).sum();

    Some(CustomerMetrics {
        key: identity.key,
        name: identity.name,
        cpf: identity.cpf,
        medical_record: identity.medical_record,
        email: identity.email,
        phone: identity.phone,
        first_purchase,
        last_purchase,
        days_since_last_purchase: days_since(last_purchase, now),
        frequency,
        total_value,
        average_ticket: total_value / f64::from(frequency),
    })
}
