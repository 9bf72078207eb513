use crate::model::RfvProfile;
use crate::storage::RfvStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Rows in batches the store accepted.
    pub inserted: usize,
    /// Batches the store rejected.
    pub errors: usize,
}

/// Deletes the previous snapshot, then upserts `profiles` in batches.
///
/// Neither a failed delete nor a failed batch stops the remaining work. The
/// sequence is not atomic: callers must not run two replacements at once.
pub async fn replace_all(
    store: &dyn RfvStore,
    profiles: &[RfvProfile],
    batch_size: usize,
) -> WriteOutcome {
    if let Err(e) = store.delete_all_profiles().await {
        tracing::warn!("Failed clearing previous RFV rows, stale rows may remain: {e:#}");
    }

    let mut outcome = WriteOutcome::default();
    for (i, batch) in profiles.chunks(batch_size.max(1)).enumerate() {
        match store.upsert_profiles(batch).await {
            Ok(()) => outcome.inserted += batch.len(),
            Err(e) => {
                outcome.errors += 1;
                tracing::error!("RFV batch {} ({} rows) failed: {e:#}", i + 1, batch.len());
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate};

    use super::*;
    use crate::rfv::segment::Segment;
    use crate::storage::memory::MemoryStore;

    fn profiles(n: usize) -> Vec<RfvProfile> {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| RfvProfile {
                name: format!("customer {i}"),
                cpf: None,
                medical_record: None,
                email: None,
                phone: None,
                first_purchase_date: d,
                last_purchase_date: d,
                days_since_last_purchase: 1,
                total_purchases: 1,
                total_value: 10.0,
                average_ticket: 10.0,
                recency_score: 3,
                frequency_score: 1,
                value_score: 1,
                segment: Segment::Hibernating,
                calculated_at: DateTime::from_timestamp(0, 0).unwrap(),
            })
            .collect()
    }

    #[tokio::test]
    async fn failed_batches_are_counted_and_skipped() {
        let store = MemoryStore {
            fail_upsert_calls: vec![1],
            ..Default::default()
        };
        let outcome = replace_all(&store, &profiles(250), 100).await;

        assert_eq!(
            outcome,
            WriteOutcome {
                inserted: 150,
                errors: 1
            }
        );
        assert_eq!(store.profiles().len(), 150);
        assert_eq!(*store.upsert_calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn old_rows_are_removed() {
        let store = MemoryStore::default();
        store.profiles.lock().unwrap().extend(profiles(5));

        let fresh = profiles(2);
        let outcome = replace_all(&store, &fresh, 100).await;

        assert_eq!(outcome.inserted, 2);
        assert_eq!(store.profiles(), fresh);
    }

    #[tokio::test]
    async fn failed_delete_still_writes() {
        let store = MemoryStore {
            fail_delete: true,
            ..Default::default()
        };
        store.profiles.lock().unwrap().extend(profiles(5));

        let outcome = replace_all(&store, &profiles(2), 100).await;

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.errors, 0);
        // The stale rows survive the failed delete.
        assert_eq!(store.profiles().len(), 5);
    }
}
