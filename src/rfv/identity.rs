use std::collections::HashMap;

use chrono::NaiveDate;

use crate::common::{
    UNKNOWN_NAME, clean, is_placeholder_name, is_proper_name, normalize_name, normalize_tax_id,
    parse_purchase_date,
};
use crate::model::{PatientProfile, RevenueRecord};

/// A CPF needs at least this many digits to be trusted as the identity key.
const MIN_TAX_ID_DIGITS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Purchase {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Accumulator for every revenue row resolved to the same customer key.
#[derive(Debug, Clone)]
pub struct CustomerIdentity {
    pub key: String,
    pub name: String,
    pub cpf: Option<String>,
    pub medical_record: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub purchases: Vec<Purchase>,
}

/// Patient profiles indexed by normalized CPF and by medical record number.
#[derive(Debug, Default)]
pub struct Enrichment {
    profiles: Vec<PatientProfile>,
    by_cpf: HashMap<String, usize>,
    by_record: HashMap<String, usize>,
}

impl Enrichment {
    pub fn new(profiles: Vec<PatientProfile>) -> Self {
        let mut by_cpf = HashMap::new();
        let mut by_record = HashMap::new();
        for (idx, p) in profiles.iter().enumerate() {
            if let Some(cpf) = normalize_tax_id(p.cpf.as_deref()) {
                by_cpf.entry(cpf).or_insert(idx);
            }
            if let Some(record) = clean(p.medical_record.as_deref()) {
                by_record.entry(record).or_insert(idx);
            }
        }
        Self {
            profiles,
            by_cpf,
            by_record,
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn lookup(&self, cpf: Option<&str>, record: Option<&str>) -> Option<&PatientProfile> {
        let idx = cpf
            .and_then(|c| self.by_cpf.get(c))
            .or_else(|| record.and_then(|r| self.by_record.get(r)))?;
        self.profiles.get(*idx)
    }
}

#[derive(Debug, Default)]
pub struct Resolution {
    pub identities: HashMap<String, CustomerIdentity>,
    /// Rows with no CPF, medical record or name.
    pub skipped: usize,
    /// Rows with a positive amount but an unreadable date.
    pub undated: usize,
}

/// Key precedence: full CPF, then medical record, then normalized name.
pub fn identity_key(
    cpf: Option<&str>,
    record: Option<&str>,
    name: Option<&str>,
) -> Option<String> {
    if let Some(cpf) = cpf.filter(|c| c.len() >= MIN_TAX_ID_DIGITS) {
        return Some(format!("tax:{cpf}"));
    }
    if let Some(record) = record {
        return Some(format!("record:{record}"));
    }
    normalize_name(name).map(|n| format!("name:{n}"))
}

pub fn resolve(records: &[RevenueRecord], enrichment: &Enrichment) -> Resolution {
    let mut out = Resolution::default();

    for row in records {
        let cpf = normalize_tax_id(row.cpf.as_deref());
        let record = clean(row.medical_record.as_deref());
        let name = clean(row.patient_name.as_deref());

        let Some(key) = identity_key(cpf.as_deref(), record.as_deref(), name.as_deref()) else {
            out.skipped += 1;
            continue;
        };

        let identity = out.identities.entry(key).or_insert_with_key(|key| {
            new_identity(key, row, cpf.as_deref(), record.as_deref(), enrichment)
        });

        if identity.cpf.is_none() {
            identity.cpf = cpf;
        }
        if identity.medical_record.is_none() {
            identity.medical_record = record;
        }
        if identity.email.is_none() {
            identity.email = clean(row.email.as_deref());
        }
        if identity.phone.is_none() {
            identity.phone = clean(row.phone.as_deref());
        }
        if is_placeholder_name(&identity.name) && is_proper_name(name.as_deref()) {
            if let Some(name) = name {
                identity.name = name;
            }
        }

        if row.amount > 0.0 {
            match row.date.as_deref().and_then(parse_purchase_date) {
                Some(date) => identity.purchases.push(Purchase {
                    date,
                    amount: row.amount,
                }),
                None => out.undated += 1,
            }
        }
    }

    out
}

fn new_identity(
    key: &str,
    row: &RevenueRecord,
    cpf: Option<&str>,
    record: Option<&str>,
    enrichment: &Enrichment,
) -> CustomerIdentity {
    let patient = enrichment.lookup(cpf, record);
    let row_name = clean(row.patient_name.as_deref());
    let patient_name = patient.and_then(|p| clean(p.name.as_deref()));

    let name = match (row_name, patient_name) {
        (Some(r), Some(p)) if is_placeholder_name(&r) && !is_placeholder_name(&p) => p,
        (Some(r), _) => r,
        (None, Some(p)) => p,
        (None, None) => UNKNOWN_NAME.to_string(),
    };

    CustomerIdentity {
        key: key.to_string(),
        name,
        cpf: patient.and_then(|p| normalize_tax_id(p.cpf.as_deref())),
        medical_record: patient.and_then(|p| clean(p.medical_record.as_deref())),
        email: patient.and_then(|p| clean(p.email.as_deref())),
        phone: patient.and_then(|p| clean(p.phone.as_deref())),
        purchases: Vec::new(),
    }
}
