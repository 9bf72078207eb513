pub mod dedup;
pub mod identity;
pub mod loader;
pub mod metrics;
pub mod scoring;
pub mod segment;
pub mod writer;

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::common::UNKNOWN_NAME;
use crate::model::RfvProfile;
use crate::storage::RfvStore;
use identity::Enrichment;
use metrics::CustomerMetrics;
use scoring::Population;
use segment::classify;

pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct JobConfig {
    pub page_size: usize,
    pub batch_size: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSummary {
    pub count: usize,
    pub total_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RfvStats {
    pub total_customers: usize,
    pub inserted: usize,
    pub errors: usize,
    pub missing_email: usize,
    pub missing_phone: usize,
    pub missing_cpf: usize,
    pub segments: BTreeMap<String, SegmentSummary>,
}

impl RfvStats {
    fn from_profiles(profiles: &[RfvProfile]) -> Self {
        let mut stats = RfvStats {
            total_customers: profiles.len(),
            ..Default::default()
        };
        for p in profiles {
            stats.missing_email += usize::from(p.email.is_none());
            stats.missing_phone += usize::from(p.phone.is_none());
            stats.missing_cpf += usize::from(p.cpf.is_none());
            let entry = stats
                .segments
                .entry(p.segment.label().to_string())
                .or_default();
            entry.count += 1;
            entry.total_value += p.total_value;
        }
        stats
    }
}

/// One full recalculation: load, resolve, measure, score, classify, dedup, replace.
///
/// Only a revenue read failure is an error; enrichment, delete and batch
/// failures are logged and reflected in the returned stats.
pub async fn run(
    store: &dyn RfvStore,
    config: &JobConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<RfvStats> {
    let started = Instant::now();

    tracing::info!("Step 1/6: load revenue records (page_size={})", config.page_size);
    let revenue = loader::load_revenue(store, config.page_size).await?;
    tracing::info!("Loaded {} revenue records", revenue.len());

    tracing::info!("Step 2/6: load patient enrichment");
    let enrichment = Enrichment::new(loader::load_patients(store, config.page_size).await);
    tracing::info!("Loaded {} patient profiles", enrichment.len());

    tracing::info!("Step 3/6: resolve customer identities");
    let resolution = identity::resolve(&revenue, &enrichment);
    tracing::info!(
        "Resolved {} identities (skipped {} rows without identifiers, {} undated purchases)",
        resolution.identities.len(),
        resolution.skipped,
        resolution.undated
    );

    tracing::info!("Step 4/6: compute metrics and scores");
    let customers = metrics::calculate(resolution.identities, now);
    let profiles = score_customers(customers, now);
    tracing::info!("Scored {} customers with purchases", profiles.len());

    tracing::info!("Step 5/6: deduplicate");
    let (profiles, report) = dedup::dedup(profiles);
    tracing::info!(
        "{} customers after dedup ({} CPF merges, {} name merges, {} namesakes renamed)",
        profiles.len(),
        report.tax_merges,
        report.name_merges,
        report.disambiguated
    );

    tracing::info!("Step 6/6: replace RFV table (batch_size={})", config.batch_size);
    let outcome = writer::replace_all(store, &profiles, config.batch_size).await;

    let mut stats = RfvStats::from_profiles(&profiles);
    stats.inserted = outcome.inserted;
    stats.errors = outcome.errors;
    tracing::info!(
        "RFV done in {:.1}s: customers={} inserted={} failed_batches={}",
        started.elapsed().as_secs_f64(),
        stats.total_customers,
        stats.inserted,
        stats.errors
    );
    Ok(stats)
}

fn score_customers(customers: Vec<CustomerMetrics>, now: DateTime<Utc>) -> Vec<RfvProfile> {
    let population = Population::new(&customers);
    customers
        .into_iter()
        .map(|c| {
            let scores = population.score(&c);
            let name = if c.name == UNKNOWN_NAME {
                let id = c.cpf.as_deref().or(c.medical_record.as_deref()).unwrap_or(&c.key);
                format!("{UNKNOWN_NAME} #{id}")
            } else {
                c.name
            };
            RfvProfile {
                name,
                cpf: c.cpf,
                medical_record: c.medical_record,
                email: c.email,
                phone: c.phone,
                first_purchase_date: c.first_purchase,
                last_purchase_date: c.last_purchase,
                days_since_last_purchase: c.days_since_last_purchase,
                total_purchases: c.frequency,
                total_value: c.total_value,
                average_ticket: c.average_ticket,
                recency_score: scores.recency,
                frequency_score: scores.frequency,
                value_score: scores.value,
                segment: classify(scores),
                calculated_at: now,
            }
        })
        .collect()
}
