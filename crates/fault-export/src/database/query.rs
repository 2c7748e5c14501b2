use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A `SELECT` over one table with equality filters and a single sort key.
///
/// Identifiers are trusted (they come from configuration and era column
/// tables); literal values are quoted and escaped when rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    distinct: bool,
    columns: Vec<String>,
    table: String,
    filters: Vec<(String, String)>,
    order_by: Option<(String, SortOrder)>,
}

impl Query {
    pub fn select<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            distinct: false,
            columns: columns.into_iter().map(Into::into).collect(),
            table: String::new(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn select_distinct<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            distinct: true,
            ..Self::select(columns)
        }
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((column.into(), order));
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        f.write_str(&self.columns.join(", "))?;
        write!(f, " FROM {}", self.table)?;

        for (index, (column, value)) in self.filters.iter().enumerate() {
            let keyword = if index == 0 { "WHERE" } else { "AND" };
            write!(f, " {keyword} {column} = '{}'", value.replace('\'', "''"))?;
        }

        if let Some((column, order)) = &self.order_by {
            let direction = match order {
                SortOrder::Ascending => "ASC",
                SortOrder::Descending => "DESC",
            };
            write!(f, " ORDER BY {column} {direction}")?;
        }

        Ok(())
    }
}
