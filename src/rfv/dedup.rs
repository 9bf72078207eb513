use std::collections::HashMap;

use crate::common::{is_placeholder_name, normalize_name, normalize_tax_id};
use crate::model::RfvProfile;

use super::segment::classify;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DedupReport {
    pub tax_merges: usize,
    pub name_merges: usize,
    /// CPF-bearing profiles renamed to `<name> #<cpf>` because another CPF shares the name.
    pub disambiguated: usize,
}

/// Collapses profiles that refer to the same customer.
///
/// Pass one groups by CPF. Pass two groups the survivors by normalized name:
/// profiles without a CPF fold together, and into the CPF-bearing profile with
/// the same name when there is exactly one. Namesakes with different CPFs stay
/// apart and get distinct names, since the RFV table is keyed by name. Applying
/// this to its own output changes nothing.
pub fn dedup(profiles: Vec<RfvProfile>) -> (Vec<RfvProfile>, DedupReport) {
    let mut report = DedupReport::default();

    let by_tax = group(profiles, |p| {
        normalize_tax_id(p.cpf.as_deref()).map(|c| format!("tax:{c}"))
    });
    let mut survivors = Vec::with_capacity(by_tax.len());
    for members in by_tax {
        report.tax_merges += members.len() - 1;
        if let Some(merged) = members.into_iter().reduce(|a, b| merge(a, b, true)) {
            survivors.push(merged);
        }
    }

    let by_name = group(survivors, |p| {
        normalize_name(Some(&p.name)).map(|n| format!("name:{n}"))
    });
    let mut out = Vec::with_capacity(by_name.len());
    for members in by_name {
        let taxed = members.iter().filter(|p| p.cpf.is_some()).count();
        if taxed > 1 {
            let (taxed, loose): (Vec<_>, Vec<_>) =
                members.into_iter().partition(|p| p.cpf.is_some());
            report.disambiguated += taxed.len();
            out.extend(taxed.into_iter().map(disambiguate));
            // Ambiguous: a CPF-less namesake cannot be attributed to either CPF.
            report.name_merges += loose.len().saturating_sub(1);
            if let Some(merged) = loose.into_iter().reduce(|a, b| merge(a, b, false)) {
                out.push(merged);
            }
            continue;
        }

        report.name_merges += members.len() - 1;
        if let Some(merged) = members.into_iter().reduce(|a, b| {
            let tax_keyed = a.cpf.is_some() || b.cpf.is_some();
            merge(a, b, tax_keyed)
        }) {
            out.push(merged);
        }
    }

    (out, report)
}

fn disambiguate(mut profile: RfvProfile) -> RfvProfile {
    if let Some(cpf) = profile.cpf.as_deref() {
        let suffix = format!(" #{cpf}");
        if !profile.name.ends_with(&suffix) {
            profile.name = format!("{}{suffix}", profile.name.trim());
        }
    }
    profile
}

/// Stable grouping; profiles without a key stay on their own.
fn group(
    profiles: Vec<RfvProfile>,
    key: impl Fn(&RfvProfile) -> Option<String>,
) -> Vec<Vec<RfvProfile>> {
    let mut groups: Vec<Vec<RfvProfile>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for profile in profiles {
        match key(&profile) {
            Some(k) => match index.get(&k) {
                Some(&i) => groups[i].push(profile),
                None => {
                    index.insert(k, groups.len());
                    groups.push(vec![profile]);
                }
            },
            None => groups.push(vec![profile]),
        }
    }
    groups
}

/// Sums totals and keeps the more recent purchase. When `recompute_segment` is
/// set the scores become the elementwise max and the segment is reclassified;
/// otherwise the more recent profile's scores stand.
pub fn merge(a: RfvProfile, b: RfvProfile, recompute_segment: bool) -> RfvProfile {
    let (recent, older) = if b.last_purchase_date > a.last_purchase_date {
        (b, a)
    } else {
        (a, b)
    };

    let total_purchases = recent.total_purchases + older.total_purchases;
    let total_value = recent.total_value + older.total_value;
    let merged_scores = recent.scores().max(older.scores());

    // A CPF-bearing profile owns the identity fields; otherwise the recent one does.
    let older_owns = older.cpf.is_some() && recent.cpf.is_none();
    let (owner_name, other_name) = if older_owns {
        (older.name, recent.name)
    } else {
        (recent.name, older.name)
    };
    let name = if is_placeholder_name(&owner_name) && !is_placeholder_name(&other_name) {
        other_name
    } else {
        owner_name
    };
    let (medical_record, other_record) = if older_owns {
        (older.medical_record, recent.medical_record)
    } else {
        (recent.medical_record, older.medical_record)
    };

    let mut out = RfvProfile {
        name,
        cpf: recent.cpf.or(older.cpf),
        medical_record: medical_record.or(other_record),
        email: recent.email.or(older.email),
        phone: recent.phone.or(older.phone),
        first_purchase_date: recent.first_purchase_date.min(older.first_purchase_date),
        last_purchase_date: recent.last_purchase_date,
        days_since_last_purchase: recent.days_since_last_purchase,
        total_purchases,
        total_value,
        average_ticket: if total_purchases > 0 {
            total_value / f64::from(total_purchases)
        } else {
            0.0
        },
        recency_score: recent.recency_score,
        frequency_score: recent.frequency_score,
        value_score: recent.value_score,
        segment: recent.segment,
        calculated_at: recent.calculated_at,
    };
    if recompute_segment {
        out.set_scores(merged_scores);
        out.segment = classify(merged_scores);
    }
    out
}
