use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::{RfvStore, TableNames};
use crate::common::truncate_for_log;
use crate::model::{PatientProfile, RevenueRecord, RfvProfile};

// Offset paging needs a total order; `id` breaks ties between equal keys.
const REVENUE_ORDER: &str = "date.desc.nullslast,id.asc";
const PATIENT_ORDER: &str = "cpf.asc.nullslast,id.asc";

/// Supabase tables over the PostgREST HTTP API, authenticated with the service role key.
pub struct SupabaseStore {
    client: Client,
    rest_url: String,
    tables: TableNames,
}

impl SupabaseStore {
    pub fn new(base_url: &str, key: &str, tables: TableNames) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(key).context("service key is not a valid header value")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))
                .context("service key is not a valid header value")?,
        );

        let client = Client::builder()
            .user_agent(concat!("clinic-rfv/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .context("Failed creating HTTP client")?;

        Ok(Self {
            client,
            rest_url: rest_url(base_url),
            tables,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        table: &str,
        order: &str,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<T>> {
        let req = self.client.get(self.table_url(table)).query(&[
            ("select", "*".to_string()),
            ("order", order.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        let resp = send(req, table).await?;
        resp.json::<Vec<T>>()
            .await
            .with_context(|| format!("Failed decoding rows from {table}"))
    }
}

fn rest_url(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/rest/v1") {
        base.to_string()
    } else {
        format!("{base}/rest/v1")
    }
}

async fn send(req: RequestBuilder, table: &str) -> anyhow::Result<Response> {
    let resp = req
        .send()
        .await
        .with_context(|| format!("Request to {table} failed"))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{table} returned {status}: {}", truncate_for_log(&body));
    }
    Ok(resp)
}

#[async_trait]
impl RfvStore for SupabaseStore {
    async fn fetch_revenue_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<RevenueRecord>> {
        self.get_page(&self.tables.revenue, REVENUE_ORDER, offset, limit)
            .await
    }

    async fn fetch_patient_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<PatientProfile>> {
        self.get_page(&self.tables.patients, PATIENT_ORDER, offset, limit)
            .await
    }

    async fn delete_all_profiles(&self) -> anyhow::Result<()> {
        // PostgREST refuses an unfiltered DELETE.
        let req = self
            .client
            .delete(self.table_url(&self.tables.rfv))
            .query(&[("name", "not.is.null")]);
        send(req, &self.tables.rfv).await?;
        Ok(())
    }

    async fn upsert_profiles(&self, rows: &[RfvProfile]) -> anyhow::Result<()> {
        let req = self
            .client
            .post(self.table_url(&self.tables.rfv))
            .query(&[("on_conflict", "name")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);
        send(req, &self.tables.rfv).await?;
        Ok(())
    }
}
