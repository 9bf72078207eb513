use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use duckdb::{Connection, params};
use tokio::sync::Mutex;

use super::{RfvStore, TableNames};
use crate::model::{PatientProfile, RevenueRecord, RfvProfile};

/// Local DuckDB file with the same three tables, for offline runs.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    tables: TableNames,
}

impl DuckDbStore {
    pub fn open(path: &Path, tables: TableNames) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed creating {}", parent.display()))?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, tables)
    }

    fn with_connection(conn: Connection, tables: TableNames) -> anyhow::Result<Self> {
        ensure_schema(&conn, &tables).context("create RFV tables")?;
        Ok(Self {
            conn: Mutex::new(conn),
            tables,
        })
    }
}

fn ensure_schema(conn: &Connection, tables: &TableNames) -> anyhow::Result<()> {
    let TableNames {
        revenue,
        patients,
        rfv,
    } = tables;
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {revenue} (
          amount DOUBLE,
          "date" DATE,
          cpf VARCHAR,
          medical_record VARCHAR,
          patient_name VARCHAR,
          email VARCHAR,
          phone VARCHAR
        );
        CREATE TABLE IF NOT EXISTS {patients} (
          cpf VARCHAR,
          medical_record VARCHAR,
          name VARCHAR,
          email VARCHAR,
          phone VARCHAR
        );
        CREATE TABLE IF NOT EXISTS {rfv} (
          name VARCHAR PRIMARY KEY,
          cpf VARCHAR,
          medical_record VARCHAR,
          email VARCHAR,
          phone VARCHAR,
          first_purchase_date DATE,
          last_purchase_date DATE,
          days_since_last_purchase BIGINT,
          total_purchases INTEGER,
          total_value DOUBLE,
          average_ticket DOUBLE,
          recency_score INTEGER,
          frequency_score INTEGER,
          value_score INTEGER,
          segment VARCHAR,
          calculated_at TIMESTAMPTZ
        );
        "#
    ))?;
    Ok(())
}

#[async_trait]
impl RfvStore for DuckDbStore {
    async fn fetch_revenue_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<RevenueRecord>> {
        let sql = format!(
            r#"
            SELECT
              amount,
              CAST("date" AS VARCHAR),
              cpf,
              medical_record,
              patient_name,
              email,
              phone
            FROM {}
            ORDER BY "date" DESC NULLS LAST, rowid
            LIMIT {limit} OFFSET {offset}
        "#,
            self.tables.revenue
        );
        let db = self.conn.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(RevenueRecord {
                amount: row.get::<usize, Option<f64>>(0)?.unwrap_or(0.0),
                date: row.get(1)?,
                cpf: row.get(2)?,
                medical_record: row.get(3)?,
                patient_name: row.get(4)?,
                email: row.get(5)?,
                phone: row.get(6)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    async fn fetch_patient_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> anyhow::Result<Vec<PatientProfile>> {
        let sql = format!(
            "SELECT cpf, medical_record, name, email, phone FROM {} \
             ORDER BY cpf ASC NULLS LAST, rowid LIMIT {limit} OFFSET {offset}",
            self.tables.patients
        );
        let db = self.conn.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(PatientProfile {
                cpf: row.get(0)?,
                medical_record: row.get(1)?,
                name: row.get(2)?,
                email: row.get(3)?,
                phone: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    async fn delete_all_profiles(&self) -> anyhow::Result<()> {
        let db = self.conn.lock().await;
        db.execute(&format!("DELETE FROM {}", self.tables.rfv), [])?;
        Ok(())
    }

    async fn upsert_profiles(&self, rows: &[RfvProfile]) -> anyhow::Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (
              name, cpf, medical_record, email, phone,
              first_purchase_date, last_purchase_date, days_since_last_purchase,
              total_purchases, total_value, average_ticket,
              recency_score, frequency_score, value_score, segment, calculated_at
            )
            VALUES (
              ?, ?, ?, ?, ?, CAST(? AS DATE), CAST(? AS DATE), ?,
              ?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMPTZ)
            )
            ON CONFLICT (name) DO UPDATE SET
              cpf = excluded.cpf,
              medical_record = excluded.medical_record,
              email = excluded.email,
              phone = excluded.phone,
              first_purchase_date = excluded.first_purchase_date,
              last_purchase_date = excluded.last_purchase_date,
              days_since_last_purchase = excluded.days_since_last_purchase,
              total_purchases = excluded.total_purchases,
              total_value = excluded.total_value,
              average_ticket = excluded.average_ticket,
              recency_score = excluded.recency_score,
              frequency_score = excluded.frequency_score,
              value_score = excluded.value_score,
              segment = excluded.segment,
              calculated_at = excluded.calculated_at
        "#,
            self.tables.rfv
        );

        let mut db = self.conn.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for p in rows {
                stmt.execute(params![
                    p.name,
                    p.cpf,
                    p.medical_record,
                    p.email,
                    p.phone,
                    p.first_purchase_date.to_string(),
                    p.last_purchase_date.to_string(),
                    p.days_since_last_purchase,
                    i64::from(p.total_purchases),
                    p.total_value,
                    p.average_ticket,
                    i64::from(p.recency_score),
                    i64::from(p.frequency_score),
                    i64::from(p.value_score),
                    p.segment.label(),
                    p.calculated_at.to_rfc3339(),
                ])
                .with_context(|| format!("upsert RFV row {:?}", p.name))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
