use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::error::{PipelineError, Result};

/// Human-readable names of the five monetary columns, in table order.
pub const MONETARY_COLUMNS: [&str; 5] = [
    "Amount",
    "Customer Before",
    "Customer After",
    "Destination Before",
    "Destination After",
];

/// One row of the transaction log exactly as it appears on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct RawTransaction {
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(rename = "amount")]
    pub amount: Option<f64>,
    #[serde(rename = "nameOrig")]
    pub name_orig: String,
    #[serde(rename = "oldbalanceOrg")]
    pub old_balance_orig: Option<f64>,
    #[serde(rename = "newbalanceOrig")]
    pub new_balance_orig: Option<f64>,
    #[serde(rename = "nameDest")]
    pub name_dest: String,
    #[serde(rename = "oldbalanceDest")]
    pub old_balance_dest: Option<f64>,
    #[serde(rename = "newbalanceDest")]
    pub new_balance_dest: Option<f64>,
    #[serde(rename = "isFraud", deserialize_with = "deserialize_flag")]
    pub is_fraud: bool,
    #[serde(rename = "isFlaggedFraud", deserialize_with = "deserialize_flag")]
    pub is_flagged_fraud: bool,
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        "1" | "true" | "True" => Ok(true),
        "0" | "false" | "False" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid label value `{other}`"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransactionType {
    CashOut,
    Payment,
    CashIn,
    Transfer,
    Debit,
    /// Codes outside the known set are carried through verbatim.
    Other(String),
}

impl TransactionType {
    pub fn from_code(code: &str) -> Self {
        match code {
            "CASH_OUT" => TransactionType::CashOut,
            "PAYMENT" => TransactionType::Payment,
            "CASH_IN" => TransactionType::CashIn,
            "TRANSFER" => TransactionType::Transfer,
            "DEBIT" => TransactionType::Debit,
            other => TransactionType::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TransactionType::CashOut => "Cash Out",
            TransactionType::Payment => "Payment",
            TransactionType::CashIn => "Cash In",
            TransactionType::Transfer => "Transfer",
            TransactionType::Debit => "Debit",
            TransactionType::Other(code) => code,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A renamed and typed transaction with its derived account-type columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub tx_type: TransactionType,
    pub amount: Option<f64>,
    pub customer_id: String,
    pub customer_before: Option<f64>,
    pub customer_after: Option<f64>,
    pub destination_id: String,
    pub destination_before: Option<f64>,
    pub destination_after: Option<f64>,
    pub fraud: bool,
    pub flagged: bool,
    pub customer_type: Option<String>,
    pub destination_type: Option<String>,
}

impl Transaction {
    /// Monetary values in `MONETARY_COLUMNS` order.
    pub fn monetary(&self) -> [Option<f64>; 5] {
        [
            self.amount,
            self.customer_before,
            self.customer_after,
            self.destination_before,
            self.destination_after,
        ]
    }
}

impl From<RawTransaction> for Transaction {
    fn from(raw: RawTransaction) -> Self {
        let customer_type = id_prefix(&raw.name_orig);
        let destination_type = id_prefix(&raw.name_dest);
        Transaction {
            tx_type: TransactionType::from_code(&raw.tx_type),
            amount: raw.amount,
            customer_id: raw.name_orig,
            customer_before: raw.old_balance_orig,
            customer_after: raw.new_balance_orig,
            destination_id: raw.name_dest,
            destination_before: raw.old_balance_dest,
            destination_after: raw.new_balance_dest,
            fraud: raw.is_fraud,
            flagged: raw.is_flagged_fraud,
            customer_type,
            destination_type,
        }
    }
}

/// Text before the first run of digits in an account id.
///
/// Returns `None` when that text is empty, e.g. for ids starting with a digit.
pub fn id_prefix(id: &str) -> Option<String> {
    let prefix = id.split(|c: char| c.is_ascii_digit()).next().unwrap_or("");
    if prefix.is_empty() {
        None
    } else {
        Some(prefix.to_string())
    }
}

pub fn read_transactions<P: AsRef<Path>>(file_path: P) -> Result<Vec<Transaction>> {
    let path = file_path.as_ref();
    let file = File::open(path)?;
    let transactions = read_transactions_from(file)?;
    info!(
        path = %path.display(),
        rows = transactions.len(),
        "Loaded transaction log"
    );
    Ok(transactions)
}

pub fn read_transactions_from<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = csv::Reader::from_reader(reader);

    let raw: Vec<RawTransaction> = rdr
        .deserialize()
        .collect::<std::result::Result<Vec<RawTransaction>, csv::Error>>()?;
    if raw.is_empty() {
        return Err(PipelineError::EmptyDataset("transaction log has no rows"));
    }

    Ok(raw.into_iter().map(Transaction::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest,isFraud,isFlaggedFraud";

    #[test]
    fn test_rename_and_type_derivation() {
        let csv = format!(
            "{HEADER}\n\
             1,TRANSFER,181.0,C12345,181.0,0.0,M98765,0.0,0.0,1,0\n\
             1,CASH_OUT,229133.94,C905080434,15325.0,0.0,C476402209,5083.0,51513.44,0,0\n"
        );
        let transactions = read_transactions_from(csv.as_bytes()).unwrap();

        assert_eq!(transactions.len(), 2);
        let first = &transactions[0];
        assert_eq!(first.tx_type, TransactionType::Transfer);
        assert_eq!(first.tx_type.to_string(), "Transfer");
        assert_eq!(first.customer_id, "C12345");
        assert_eq!(first.customer_type.as_deref(), Some("C"));
        assert_eq!(first.destination_type.as_deref(), Some("M"));
        assert_eq!(first.amount, Some(181.0));
        assert_eq!(first.customer_before, Some(181.0));
        assert_eq!(first.customer_after, Some(0.0));
        assert!(first.fraud);
        assert!(!first.flagged);

        let second = &transactions[1];
        assert_eq!(second.tx_type.label(), "Cash Out");
        assert_eq!(second.destination_after, Some(51513.44));
        assert!(!second.fraud);
    }

    #[test]
    fn test_type_codes_relabelled() {
        assert_eq!(TransactionType::from_code("PAYMENT").label(), "Payment");
        assert_eq!(TransactionType::from_code("CASH_IN").label(), "Cash In");
        assert_eq!(TransactionType::from_code("DEBIT").label(), "Debit");
        assert_eq!(
            TransactionType::from_code("REFUND"),
            TransactionType::Other("REFUND".to_string())
        );
        assert_eq!(TransactionType::from_code("REFUND").label(), "REFUND");
    }

    #[test]
    fn test_id_prefix() {
        assert_eq!(id_prefix("C12345").as_deref(), Some("C"));
        assert_eq!(id_prefix("M1979787155").as_deref(), Some("M"));
        assert_eq!(id_prefix("AB12C34").as_deref(), Some("AB"));
        assert_eq!(id_prefix("MERCHANT").as_deref(), Some("MERCHANT"));
        assert_eq!(id_prefix("12345"), None);
        assert_eq!(id_prefix(""), None);
    }

    #[test]
    fn test_missing_monetary_values_are_none() {
        let csv = format!("{HEADER}\n1,PAYMENT,,C1,100.0,,M2,0.0,0.0,false,false\n");
        let transactions = read_transactions_from(csv.as_bytes()).unwrap();
        let tx = &transactions[0];
        assert_eq!(tx.amount, None);
        assert_eq!(tx.customer_after, None);
        assert_eq!(tx.monetary(), [None, Some(100.0), None, Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_malformed_id_yields_missing_type() {
        let csv = format!("{HEADER}\n1,PAYMENT,10.0,9999,100.0,90.0,M2,0.0,0.0,0,0\n");
        let transactions = read_transactions_from(csv.as_bytes()).unwrap();
        assert_eq!(transactions[0].customer_type, None);
        assert_eq!(transactions[0].destination_type.as_deref(), Some("M"));
    }

    #[test]
    fn test_invalid_label_is_an_error() {
        let csv = format!("{HEADER}\n1,PAYMENT,10.0,C1,100.0,90.0,M2,0.0,0.0,maybe,0\n");
        assert!(matches!(
            read_transactions_from(csv.as_bytes()),
            Err(PipelineError::Csv(_))
        ));
    }

    #[test]
    fn test_missing_file_fails() {
        let result = read_transactions("does/not/exist.csv");
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[test]
    fn test_empty_log_is_rejected() {
        let result = read_transactions_from(format!("{HEADER}\n").as_bytes());
        assert!(matches!(result, Err(PipelineError::EmptyDataset(_))));
    }
}
