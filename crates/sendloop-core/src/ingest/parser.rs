//! CSV Parser - Turns uploaded recipient files into validated recipients

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use sendloop_common::types::{EmailAddress, Variant};

/// Placeholder name for rows without any usable name column value
const NAMELESS_PLACEHOLDER: &str = "Névtelen";

/// Ingestion errors that reject the whole file
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("File exceeds the {limit} byte upload limit")]
    FileTooLarge { limit: usize },

    #[error("File has more than {limit} data rows")]
    TooManyRows { limit: usize },

    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
}

impl IngestError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            IngestError::TooManyRows { .. } => "TOO_MANY_ROWS",
            IngestError::MissingColumn(_) => "MISSING_COLUMNS",
            IngestError::Csv(_) => "CSV_PARSE_ERROR",
        }
    }
}

/// One validated recipient row
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParsedRecipient {
    pub email: String,
    pub name: String,
    pub variant: Variant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
}

/// One rejected recipient row
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParseIssue {
    /// 1-indexed file row, counting the header line
    pub row: usize,
    pub email: String,
    pub reason: String,
}

/// Count of valid recipients per variant
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct VariantDistribution {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

/// Outcome of parsing one CSV upload
#[derive(Debug, Clone, Default)]
pub struct ParsedRecipients {
    /// Valid rows in input order
    pub valid: Vec<ParsedRecipient>,
    /// Rejected rows with their original row numbers
    pub invalid: Vec<ParseIssue>,
    /// Human-readable row errors, one per rejected row
    pub errors: Vec<String>,
}

impl ParsedRecipients {
    /// Count valid recipients per variant
    pub fn variant_distribution(&self) -> VariantDistribution {
        let mut distribution = VariantDistribution::default();
        for recipient in &self.valid {
            match recipient.variant {
                Variant::A => distribution.a += 1,
                Variant::B => distribution.b += 1,
                Variant::C => distribution.c += 1,
            }
        }
        distribution
    }
}

/// CSV recipient parser with file-level limits
///
/// Parsing is deterministic: the same bytes always produce the same
/// valid/invalid partition and variant assignment.
pub struct RecipientIngestor {
    max_rows: usize,
    max_bytes: usize,
}

impl RecipientIngestor {
    /// Create an ingestor with explicit limits
    pub fn new(max_rows: usize, max_bytes: usize) -> Self {
        Self {
            max_rows,
            max_bytes,
        }
    }

    /// Parse a CSV upload into valid and invalid recipients
    ///
    /// Recognized columns after lower-casing and trimming the header row:
    /// `email` (required), `name`, `last name`, `variant`, `result_id`.
    /// A name-bearing column is required; other columns are ignored.
    pub fn parse(&self, input: &[u8]) -> Result<ParsedRecipients, IngestError> {
        if input.len() > self.max_bytes {
            return Err(IngestError::FileTooLarge {
                limit: self.max_bytes,
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let columns: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(index, header)| (header.trim().to_lowercase(), index))
            .collect();

        let email_col = *columns
            .get("email")
            .ok_or(IngestError::MissingColumn("email"))?;
        let name_col = columns.get("name").copied();
        let last_name_col = columns.get("last name").copied();
        if name_col.is_none() && last_name_col.is_none() {
            return Err(IngestError::MissingColumn("name"));
        }
        let variant_col = columns.get("variant").copied();
        let result_id_col = columns.get("result_id").copied();

        let records: Vec<csv::StringRecord> =
            reader.records().collect::<Result<_, csv::Error>>()?;
        if records.len() > self.max_rows {
            return Err(IngestError::TooManyRows {
                limit: self.max_rows,
            });
        }

        let field = |record: &csv::StringRecord, col: Option<usize>| -> String {
            col.and_then(|c| record.get(c))
                .unwrap_or("")
                .trim()
                .to_string()
        };

        let mut result = ParsedRecipients::default();
        let mut explicit_variants: Vec<Option<Variant>> = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let row = index + 2;
            let email = field(record, Some(email_col)).to_lowercase();
            let mut reasons = Vec::new();

            if email.is_empty() {
                reasons.push("missing email".to_string());
            } else if email.parse::<EmailAddress>().is_err() {
                reasons.push(format!("invalid email '{}'", email));
            }

            let raw_variant = field(record, variant_col).to_lowercase();
            let variant = if raw_variant.is_empty() {
                None
            } else {
                match raw_variant.parse::<Variant>() {
                    Ok(v) => Some(v),
                    Err(_) => {
                        reasons.push(format!("invalid variant '{}'", raw_variant));
                        None
                    }
                }
            };

            if !reasons.is_empty() {
                let reason = reasons.join("; ");
                result.errors.push(format!("Row {}: {}", row, reason));
                result.invalid.push(ParseIssue { row, email, reason });
                continue;
            }

            let first = field(record, name_col);
            let last = field(record, last_name_col);
            let name = match (first.is_empty(), last.is_empty()) {
                (false, false) => format!("{} {}", first, last),
                (false, true) => first,
                (true, false) => last,
                (true, true) => NAMELESS_PLACEHOLDER.to_string(),
            };

            let result_id = Some(field(record, result_id_col)).filter(|v| !v.is_empty());

            explicit_variants.push(variant);
            result.valid.push(ParsedRecipient {
                email,
                name,
                // Placeholder until the assignment pass below
                variant: Variant::B,
                result_id,
            });
        }

        // Round-robin only when no row carried a variant at all; otherwise
        // honor explicit values and default the rest to the middle variant.
        let any_explicit = explicit_variants.iter().any(Option::is_some);
        for (index, recipient) in result.valid.iter_mut().enumerate() {
            recipient.variant = if any_explicit {
                explicit_variants[index].unwrap_or(Variant::B)
            } else {
                Variant::from_index(index)
            };
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ingestor() -> RecipientIngestor {
        RecipientIngestor::new(1000, 5 * 1024 * 1024)
    }

    #[test]
    fn test_parse_basic() {
        let csv = "email,name\nalice@example.com,Alice\nbob@example.com,Bob\n";
        let parsed = ingestor().parse(csv.as_bytes()).unwrap();

        assert_eq!(parsed.valid.len(), 2);
        assert_eq!(parsed.invalid.len(), 0);
        assert_eq!(parsed.valid[0].email, "alice@example.com");
        assert_eq!(parsed.valid[0].name, "Alice");
    }

    #[test]
    fn test_round_robin_when_no_variant_column() {
        let mut csv = String::from("email,name\n");
        for i in 0..10 {
            csv.push_str(&format!("user{}@example.com,User {}\n", i, i));
        }

        let parsed = ingestor().parse(csv.as_bytes()).unwrap();
        assert_eq!(parsed.valid.len(), 10);

        let sequence: Vec<Variant> = parsed.valid.iter().map(|r| r.variant).collect();
        assert_eq!(
            sequence,
            vec![
                Variant::A,
                Variant::B,
                Variant::C,
                Variant::A,
                Variant::B,
                Variant::C,
                Variant::A,
                Variant::B,
                Variant::C,
                Variant::A,
            ]
        );

        let distribution = parsed.variant_distribution();
        assert_eq!(distribution, VariantDistribution { a: 4, b: 3, c: 3 });
    }

    #[test]
    fn test_explicit_variants_default_missing_to_b() {
        let csv = "email,name,variant\n\
                   a@example.com,A,c\n\
                   b@example.com,B,\n\
                   c@example.com,C,A\n";
        let parsed = ingestor().parse(csv.as_bytes()).unwrap();

        let sequence: Vec<Variant> = parsed.valid.iter().map(|r| r.variant).collect();
        assert_eq!(sequence, vec![Variant::C, Variant::B, Variant::A]);
    }

    #[test]
    fn test_invalid_rows_carry_row_numbers() {
        let csv = "email,name\n\
                   good@example.com,Good\n\
                   not-an-email,Bad\n\
                   ,Empty\n";
        let parsed = ingestor().parse(csv.as_bytes()).unwrap();

        assert_eq!(parsed.valid.len(), 1);
        assert_eq!(parsed.invalid.len(), 2);
        assert_eq!(parsed.invalid[0].row, 3);
        assert_eq!(parsed.invalid[1].row, 4);
        assert_eq!(parsed.errors.len(), 2);
        assert!(parsed.errors[0].starts_with("Row 3:"));
    }

    #[test]
    fn test_invalid_variant_rejects_row() {
        let csv = "email,name,variant\nuser@example.com,User,x\n";
        let parsed = ingestor().parse(csv.as_bytes()).unwrap();

        assert_eq!(parsed.valid.len(), 0);
        assert_eq!(parsed.invalid.len(), 1);
        assert!(parsed.invalid[0].reason.contains("invalid variant"));
    }

    #[test]
    fn test_missing_email_column() {
        let csv = "name,variant\nAlice,a\n";
        let err = ingestor().parse(csv.as_bytes()).unwrap_err();

        assert!(matches!(err, IngestError::MissingColumn("email")));
        assert_eq!(err.code(), "MISSING_COLUMNS");
    }

    #[test]
    fn test_missing_name_column() {
        let csv = "email,variant\nuser@example.com,a\n";
        let err = ingestor().parse(csv.as_bytes()).unwrap_err();

        assert!(matches!(err, IngestError::MissingColumn("name")));
    }

    #[test]
    fn test_row_limit_rejects_whole_file() {
        let mut csv = String::from("email,name\n");
        for i in 0..1001 {
            csv.push_str(&format!("user{}@example.com,User\n", i));
        }

        let err = ingestor().parse(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::TooManyRows { limit: 1000 }));
        assert_eq!(err.code(), "TOO_MANY_ROWS");
    }

    #[test]
    fn test_byte_limit_rejects_whole_file() {
        let ingestor = RecipientIngestor::new(1000, 64);
        let csv = "email,name\n".to_string() + &"padding@example.com,Pad\n".repeat(10);

        let err = ingestor.parse(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::FileTooLarge { limit: 64 }));
        assert_eq!(err.code(), "FILE_TOO_LARGE");
    }

    #[test]
    fn test_mailerlite_name_pair() {
        let csv = "Email,Name,Last Name\n\
                   jane@example.com,Jane,Doe\n\
                   solo@example.com,Solo,\n\
                   last@example.com,,Only\n\
                   none@example.com,,\n";
        let parsed = ingestor().parse(csv.as_bytes()).unwrap();

        assert_eq!(parsed.valid.len(), 4);
        assert_eq!(parsed.valid[0].name, "Jane Doe");
        assert_eq!(parsed.valid[1].name, "Solo");
        assert_eq!(parsed.valid[2].name, "Only");
        assert_eq!(parsed.valid[3].name, "Névtelen");
    }

    #[test]
    fn test_headers_and_emails_normalized() {
        let csv = " EMAIL , NAME \n  Mixed.Case@Example.COM  ,  Spaced Name  \n";
        let parsed = ingestor().parse(csv.as_bytes()).unwrap();

        assert_eq!(parsed.valid.len(), 1);
        assert_eq!(parsed.valid[0].email, "mixed.case@example.com");
        assert_eq!(parsed.valid[0].name, "Spaced Name");
    }

    #[test]
    fn test_result_id_column() {
        let csv = "email,name,result_id\nuser@example.com,User,abc-123\nno@example.com,No,\n";
        let parsed = ingestor().parse(csv.as_bytes()).unwrap();

        assert_eq!(parsed.valid[0].result_id.as_deref(), Some("abc-123"));
        assert_eq!(parsed.valid[1].result_id, None);
    }

    #[test]
    fn test_same_input_same_partition() {
        let csv = "email,name\nfirst@example.com,First\nbad-row,Bad\nsecond@example.com,Second\n";
        let first = ingestor().parse(csv.as_bytes()).unwrap();
        let second = ingestor().parse(csv.as_bytes()).unwrap();

        assert_eq!(first.valid, second.valid);
        assert_eq!(first.invalid, second.invalid);
    }
}
