use std::sync::Mutex;

use anyhow::bail;
use async_trait::async_trait;

use super::RfvStore;
use crate::model::{PatientProfile, RevenueRecord, RfvProfile};

/// In-memory store with failure switches for exercising the job's error paths.
#[derive(Default)]
pub struct MemoryStore {
    pub revenue: Vec<RevenueRecord>,
    pub patients: Vec<PatientProfile>,
    pub profiles: Mutex<Vec<RfvProfile>>,
    pub fail_revenue_at_offset: Option<usize>,
    pub fail_patients: bool,
    pub fail_delete: bool,
    /// Zero-based indexes of upsert calls that fail.
    pub fail_upsert_calls: Vec<usize>,
    pub revenue_requests: Mutex<Vec<(usize, usize)>>,
    pub upsert_calls: Mutex<usize>,
}

impl MemoryStore {
    pub fn with_revenue(revenue: Vec<RevenueRecord>) -> Self {
        Self {
            revenue,
            ..Default::default()
        }
    }

    pub fn profiles(&self) -> Vec<RfvProfile> {
        self.profiles.lock().unwrap().clone()
    }
}

#[async_trait]
impl RfvStore for MemoryStore {
    async fn fetch_revenue_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<RevenueRecord>> {
        self.revenue_requests.lock().unwrap().push((offset, limit));
        if self.fail_revenue_at_offset == Some(offset) {
            bail!("revenue_records returned 503 Service Unavailable");
        }
        let mut sorted = self.revenue.clone();
        // Most recent first; rows without a date last.
        sorted.sort_by(|a, b| match (&a.date, &b.date) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Ok(sorted.into_iter().skip(offset).take(limit).collect())
    }

    async fn fetch_patient_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<PatientProfile>> {
        if self.fail_patients {
            bail!("patients returned 401 Unauthorized");
        }
        Ok(self.patients.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn delete_all_profiles(&self) -> anyhow::Result<()> {
        if self.fail_delete {
            bail!("rfv_customers returned 500 Internal Server Error");
        }
        self.profiles.lock().unwrap().clear();
        Ok(())
    }

    async fn upsert_profiles(&self, rows: &[RfvProfile]) -> anyhow::Result<()> {
        let call = {
            let mut calls = self.upsert_calls.lock().unwrap();
            let call = *calls;
            *calls += 1;
            call
        };
        if self.fail_upsert_calls.contains(&call) {
            bail!("rfv_customers returned 409 Conflict");
        }
        let mut profiles = self.profiles.lock().unwrap();
        for row in rows {
            match profiles.iter_mut().find(|p| p.name == row.name) {
                Some(existing) => *existing = row.clone(),
                None => profiles.push(row.clone()),
            }
        }
        Ok(())
    }
}
