use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::rfv::segment::{Scores, Segment};

/// One transaction row from the revenue table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevenueRecord {
    #[serde(default, deserialize_with = "de_amount")]
    pub amount: f64,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub medical_record: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub patient_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub phone: Option<String>,
}

/// Patient profile used only to backfill contact fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientProfile {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub medical_record: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub phone: Option<String>,
}

/// Final row of the RFV table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfvProfile {
    pub name: String,
    pub cpf: Option<String>,
    pub medical_record: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_purchase_date: NaiveDate,
    pub last_purchase_date: NaiveDate,
    pub days_since_last_purchase: i64,
    pub total_purchases: u32,
    pub total_value: f64,
    pub average_ticket: f64,
    pub recency_score: u8,
    pub frequency_score: u8,
    pub value_score: u8,
    pub segment: Segment,
    pub calculated_at: DateTime<Utc>,
}

impl RfvProfile {
    pub fn scores(&self) -> Scores {
        Scores {
            recency: self.recency_score,
            frequency: self.frequency_score,
            value: self.value_score,
        }
    }

    pub fn set_scores(&mut self, scores: Scores) {
        self.recency_score = scores.recency;
        self.frequency_score = scores.frequency;
        self.value_score = scores.value;
    }
}

/// PostgREST returns numerics either as JSON numbers or strings depending on the column type.
fn de_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .replace(',', ".")
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    })
}

fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
