//! Recipient Ingestion - CSV parsing and validation for bulk sends

mod parser;

pub use parser::{
    IngestError, ParseIssue, ParsedRecipient, ParsedRecipients, RecipientIngestor,
    VariantDistribution,
};
