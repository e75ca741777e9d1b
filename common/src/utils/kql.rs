//! KQL command helpers.

/// Kind of text sent to the analytical cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KqlCommandKind {
    /// A query, sent to `/v1/rest/query`.
    Query,
    /// A control command (leading `.`), sent to `/v1/rest/mgmt`.
    Control,
}

impl KqlCommandKind {
    /// Classifies `text` by its first statement, skipping blank and `//` comment lines.
    pub fn classify(text: &str) -> Self {
        let first = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with("//"));
        match first {
            Some(line) if line.starts_with('.') => Self::Control,
            _ => Self::Query,
        }
    }

    /// REST path on the cluster for this kind.
    pub fn rest_path(self) -> &'static str {
        match self {
            Self::Query => "/v1/rest/query",
            Self::Control => "/v1/rest/mgmt",
        }
    }
}

/// Builds the control command that ingests a OneLake file into `table`.
///
/// The cluster reads the file with the caller's identity (`;impersonate`).
pub fn ingest_from_onelake(
    table: &str,
    workspace_id: &str,
    onelake_host: &str,
    lakehouse_id: &str,
    file_name: &str,
) -> String {
    format!(
        ".ingest into table {table} (h'abfss://{workspace_id}@{onelake_host}/{lakehouse_id}/Files/{file_name};impersonate')"
    )
}

/// Lists the tables of the current database with their hot row counts.
pub const SHOW_TABLES: &str = ".show tables details | project TableName, Rows=HotRowCount";
