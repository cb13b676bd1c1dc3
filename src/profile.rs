//! Descriptive summary of a loaded transaction table.

use std::collections::BTreeMap;

use tracing::info;

use crate::csv_reader::{Transaction, MONETARY_COLUMNS};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub name: &'static str,
    pub count: usize,
    pub missing: usize,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub fraud_count: usize,
    pub flagged_count: usize,
    pub type_counts: BTreeMap<String, usize>,
    pub monetary: Vec<ColumnStats>,
    pub missing_customer_type: usize,
    pub missing_destination_type: usize,
}

impl DatasetSummary {
    pub fn fraud_rate(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.fraud_count as f64 / self.rows as f64
        }
    }

    pub fn log(&self) {
        info!(
            rows = self.rows,
            fraud = self.fraud_count,
            flagged = self.flagged_count,
            fraud_rate = format!("{:.4}%", self.fraud_rate() * 100.0),
            "Dataset summary"
        );
        for (tx_type, count) in &self.type_counts {
            info!(tx_type = %tx_type, count, "Transactions per type");
        }
        for col in &self.monetary {
            info!(
                column = col.name,
                count = col.count,
                missing = col.missing,
                min = col.min,
                mean = col.mean,
                max = col.max,
                "Monetary column"
            );
        }
        info!(
            customer_type = self.missing_customer_type,
            destination_type = self.missing_destination_type,
            "Missing derived types"
        );
    }
}

pub fn summarize(transactions: &[Transaction]) -> DatasetSummary {
    let mut type_counts = BTreeMap::new();
    for tx in transactions {
        *type_counts.entry(tx.tx_type.label().to_string()).or_insert(0) += 1;
    }

    let monetary = MONETARY_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, &name)| {
            let values: Vec<f64> = transactions
                .iter()
                .filter_map(|tx| tx.monetary()[i])
                .collect();
            column_stats(name, &values, transactions.len())
        })
        .collect();

    DatasetSummary {
        rows: transactions.len(),
        fraud_count: transactions.iter().filter(|tx| tx.fraud).count(),
        flagged_count: transactions.iter().filter(|tx| tx.flagged).count(),
        type_counts,
        monetary,
        missing_customer_type: transactions
            .iter()
            .filter(|tx| tx.customer_type.is_none())
            .count(),
        missing_destination_type: transactions
            .iter()
            .filter(|tx| tx.destination_type.is_none())
            .count(),
    }
}

fn column_stats(name: &'static str, values: &[f64], rows: usize) -> ColumnStats {
    if values.is_empty() {
        return ColumnStats {
            name,
            count: 0,
            missing: rows,
            min: f64::NAN,
            mean: f64::NAN,
            max: f64::NAN,
        };
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    ColumnStats {
        name,
        count: values.len(),
        missing: rows - values.len(),
        min,
        mean,
        max,
    }
}

/// Mean of one monetary column restricted to rows with the given fraud label.
pub fn mean_by_label(transactions: &[Transaction], column: usize, fraud: bool) -> Option<f64> {
    let values: Vec<f64> = transactions
        .iter()
        .filter(|tx| tx.fraud == fraud)
        .filter_map(|tx| tx.monetary().get(column).copied().flatten())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
