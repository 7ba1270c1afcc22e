use serde::{Deserialize, Serialize};

/// Display options for a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    pub kind: SectionKind,
    pub collapsible: bool,
    pub collapsed_by_default: bool,
    pub table: Option<TableConfig>,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            kind: SectionKind::Section,
            collapsible: false,
            collapsed_by_default: false,
            table: None,
        }
    }
}

impl SectionConfig {
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.collapsed_by_default && !self.collapsible {
            problems.push("only collapsible sections can start collapsed".to_string());
        }
        if let Some(table) = &self.table {
            match &table.columns {
                TableColumns::Count(0) => {
                    problems.push("tables need at least one column".to_string())
                }
                TableColumns::Named(names) if names.is_empty() => {
                    problems.push("tables need at least one column".to_string())
                }
                _ => {}
            }
        }
        problems
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionKind {
    Section,
    PageBreak,
}

/// Lays a section's questions out as a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub columns: TableColumns,
    pub allow_extend_columns: bool,
    pub requires_answer_in_each_cell: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            columns: TableColumns::Count(2),
            allow_extend_columns: false,
            requires_answer_in_each_cell: true,
        }
    }
}

/// Either a column count or explicit column headings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableColumns {
    Count(u32),
    Named(Vec<String>),
}
