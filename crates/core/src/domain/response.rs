use serde::{Deserialize, Serialize};

/// Ordered tabular payload. Row order is whatever the backend returned;
/// re-sorting is the backend's job, not this layer's.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { columns: columns.into_iter().map(Into::into).collect(), rows: Vec::new() }
    }

    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The orchestrator's final output structure, handed to a presentation
/// layer to render. Language-neutral: no markup, no card format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedResponse {
    pub text: String,
    pub table: Option<Table>,
    /// Source capability identifier; attached only on the informational
    /// path. Structured-data results never carry a fabricated source.
    pub provenance: Option<String>,
}

impl ComposedResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), table: None, provenance: None }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_provenance(mut self, source: impl Into<String>) -> Self {
        self.provenance = Some(source.into());
        self
    }
}
