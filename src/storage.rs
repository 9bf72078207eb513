pub mod duckdb_store;
#[cfg(test)]
pub mod memory;
pub mod supabase;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;

use crate::cli::{Backend, StoreArgs};
use crate::model::{PatientProfile, RevenueRecord, RfvProfile};

/// Read side: revenue and patient tables. Write side: the RFV table.
#[async_trait]
pub trait RfvStore: Send + Sync {
    /// Revenue rows ordered by date, most recent first.
    async fn fetch_revenue_page(&self, offset: usize, limit: usize)
    -> anyhow::Result<Vec<RevenueRecord>>;

    async fn fetch_patient_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<PatientProfile>>;

    async fn delete_all_profiles(&self) -> anyhow::Result<()>;

    /// Insert or update keyed by `name`.
    async fn upsert_profiles(&self, rows: &[RfvProfile]) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct TableNames {
    pub revenue: String,
    pub patients: String,
    pub rfv: String,
}

impl TableNames {
    pub fn validate(&self) -> anyhow::Result<()> {
        for name in [&self.revenue, &self.patients, &self.rfv] {
            let ok = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !ok {
                bail!("invalid table name {name:?}: use letters, digits and underscores");
            }
        }
        Ok(())
    }
}

pub fn open(args: &StoreArgs) -> anyhow::Result<Arc<dyn RfvStore>> {
    let tables = TableNames {
        revenue: args.revenue_table.clone(),
        patients: args.patients_table.clone(),
        rfv: args.rfv_table.clone(),
    };
    tables.validate()?;

    match args.backend {
        Backend::Supabase => {
            let url = args
                .supabase_url
                .as_deref()
                .ok_or_else(|| anyhow!("--supabase-url (or SUPABASE_URL) is required"))?;
            let key = args.supabase_key.as_deref().ok_or_else(|| {
                anyhow!("--supabase-key (or SUPABASE_SERVICE_ROLE_KEY) is required")
            })?;
            tracing::info!("storage=supabase url={}", url);
            let store = supabase::SupabaseStore::new(url, key, tables)
                .context("create Supabase client")?;
            Ok(Arc::new(store))
        }
        Backend::Duckdb => {
            let path = Path::new(&args.duckdb_path);
            tracing::info!("storage=duckdb path={}", path.display());
            let store = duckdb_store::DuckDbStore::open(path, tables)
                .with_context(|| format!("open duckdb at {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}
