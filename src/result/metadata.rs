//! Column metadata captured once per prepared statement.

use tracing::trace;

use crate::db::ResultMetadata;
use crate::types::{classify, SemanticType};

/// Ordered column names and semantic types of a statement's result.
///
/// Empty when the statement produces no result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSpec {
    names: Vec<String>,
    types: Vec<SemanticType>,
}

impl ColumnSpec {
    /// Snapshots the server's result metadata.
    pub fn capture(metadata: &ResultMetadata) -> Self {
        let mut names = Vec::with_capacity(metadata.num_fields());
        let mut types = Vec::with_capacity(metadata.num_fields());

        for field in metadata.fields() {
            let kind = classify(field.field_type, field.is_binary());
            trace!(
                column = %field.name,
                field_type = field.field_type,
                charset = field.charset,
                kind = %kind,
                "Captured column"
            );
            names.push(field.name.clone());
            types.push(kind);
        }

        Self { names, types }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn types(&self) -> &[SemanticType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
