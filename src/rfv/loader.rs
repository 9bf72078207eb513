use std::future::Future;

use anyhow::Context;

use crate::model::{PatientProfile, RevenueRecord};
use crate::storage::RfvStore;

/// Reads pages until one comes back empty or short. The first error aborts.
pub async fn paginate<T, F, Fut>(page_size: usize, mut fetch: F) -> anyhow::Result<Vec<T>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<T>>>,
{
    let page_size = page_size.max(1);
    let mut out = Vec::new();
    let mut offset = 0usize;
    loop {
        let page = fetch(offset, page_size)
            .await
            .with_context(|| format!("read page at offset {offset}"))?;
        let len = page.len();
        out.extend(page);
        if len < page_size {
            break;
        }
        offset += len;
    }
    Ok(out)
}

pub async fn load_revenue(
    store: &dyn RfvStore,
    page_size: usize,
) -> anyhow::Result<Vec<RevenueRecord>> {
    paginate(page_size, |offset, limit| store.fetch_revenue_page(offset, limit))
        .await
        .context("load revenue records")
}

/// Best effort: an unreadable patients table yields no enrichment.
pub async fn load_patients(store: &dyn RfvStore, page_size: usize) -> Vec<PatientProfile> {
    match paginate(page_size, |offset, limit| store.fetch_patient_page(offset, limit)).await {
        Ok(patients) => patients,
        Err(e) => {
            tracing::warn!("Patient enrichment unavailable, continuing without it: {e:#}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;

    fn rows(n: usize) -> Vec<RevenueRecord> {
        (0..n)
            .map(|i| RevenueRecord {
                amount: 1.0,
                date: Some(format!("2024-01-{:02}", i % 28 + 1)),
                patient_name: Some(format!("p{i}")),
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn stops_on_short_page() {
        let store = MemoryStore::with_revenue(rows(25));
        let out = load_revenue(&store, 10).await.unwrap();
        assert_eq!(out.len(), 25);
        assert_eq!(
            *store.revenue_requests.lock().unwrap(),
            vec![(0, 10), (10, 10), (20, 10)]
        );
    }

    #[tokio::test]
    async fn stops_on_empty_page() {
        let store = MemoryStore::with_revenue(rows(20));
        let out = load_revenue(&store, 10).await.unwrap();
        assert_eq!(out.len(), 20);
        assert_eq!(store.revenue_requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn revenue_error_aborts() {
        let store = MemoryStore {
            fail_revenue_at_offset: Some(10),
            ..MemoryStore::with_revenue(rows(25))
        };
        let err = load_revenue(&store, 10).await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("load revenue records"));
        assert!(msg.contains("offset 10"));
        assert!(msg.contains("503"));
    }

    #[tokio::test]
    async fn patient_errors_are_swallowed() {
        let store = MemoryStore {
            fail_patients: true,
            ..Default::default()
        };
        assert!(load_patients(&store, 10).await.is_empty());
    }
}
