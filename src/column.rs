use std::cmp::Ordering;
use std::collections::HashSet;

use crate::domain::DMError;
use crate::record::CompanyRecord;

/// Value extracted from a record by a column accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Company { name: String, link: String },
    Number(f64),
    Year(i64),
    Text(String),
}

impl CellValue {
    /// Text form used by the default filter, sorting of text and copying.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Company { name, .. } => name.clone(),
            CellValue::Number(v) => format_number(*v),
            CellValue::Year(y) => y.to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// Numbers compare numerically, everything else by lowercased text.
    pub fn compare(&self, other: &CellValue) -> Ordering {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Year(a), CellValue::Year(b)) => a.cmp(b),
            (a, b) => a.as_text().to_lowercase().cmp(&b.as_text().to_lowercase()),
        }
    }
}

/// Shortest round-trip text of a number, `5` rather than `5.0`.
pub fn format_number(value: f64) -> String {
    format!("{value}")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellStyle {
    Plain,
    Emphasis,
    Link,
    Number,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCell {
    pub text: String,
    pub style: CellStyle,
    pub link: Option<String>,
}

impl RenderedCell {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: CellStyle::Plain,
            link: None,
        }
    }
}

pub type Accessor = fn(&CompanyRecord) -> CellValue;
pub type CellRenderer = fn(&CellValue) -> RenderedCell;
pub type FilterPredicate = fn(&str, &CompanyRecord) -> bool;

#[derive(Clone)]
pub struct ColumnSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub accessor: Accessor,
    pub renderer: CellRenderer,
    pub filter: Option<FilterPredicate>,
    /// Right aligned in the views.
    pub numeric: bool,
}

impl ColumnSpec {
    pub fn value(&self, record: &CompanyRecord) -> CellValue {
        (self.accessor)(record)
    }

    pub fn render(&self, record: &CompanyRecord) -> RenderedCell {
        (self.renderer)(&self.value(record))
    }

    /// Applies the column's own predicate, or the default substring match.
    pub fn matches(&self, filter_value: &str, record: &CompanyRecord) -> bool {
        match self.filter {
            Some(predicate) => predicate(filter_value, record),
            None => default_filter(filter_value, &self.value(record)),
        }
    }
}

impl std::fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

pub fn default_filter(filter_value: &str, value: &CellValue) -> bool {
    value
        .as_text()
        .to_lowercase()
        .contains(&filter_value.to_lowercase())
}

/// Parses a numeric filter. `None` means the filter does not apply.
pub fn parse_threshold(filter_value: &str) -> Option<f64> {
    filter_value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
}

fn filter_company(filter_value: &str, record: &CompanyRecord) -> bool {
    record
        .company
        .name
        .to_lowercase()
        .contains(&filter_value.to_lowercase())
}

fn filter_valuation(filter_value: &str, record: &CompanyRecord) -> bool {
    parse_threshold(filter_value).is_none_or(|t| t < record.valuation)
}

fn filter_founded(filter_value: &str, record: &CompanyRecord) -> bool {
    parse_threshold(filter_value).is_none_or(|t| t < record.founded as f64)
}

fn render_company(value: &CellValue) -> RenderedCell {
    match value {
        CellValue::Company { name, link } if !link.is_empty() => RenderedCell {
            text: name.clone(),
            style: CellStyle::Link,
            link: Some(link.clone()),
        },
        other => RenderedCell {
            text: other.as_text(),
            style: CellStyle::Emphasis,
            link: None,
        },
    }
}

fn render_number(value: &CellValue) -> RenderedCell {
    RenderedCell {
        text: value.as_text(),
        style: CellStyle::Number,
        link: None,
    }
}

fn render_plain(value: &CellValue) -> RenderedCell {
    RenderedCell::plain(value.as_text())
}

/// Ordered column list with unique ids.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self, DMError> {
        let mut seen = HashSet::new();
        for column in columns.iter() {
            if !seen.insert(column.id) {
                return Err(DMError::DuplicateColumn(column.id.to_string()));
            }
        }
        Ok(Self { columns })
    }

    /// The Dentmakers Index columns.
    pub fn companies() -> Self {
        Self {
            columns: vec![
                ColumnSpec {
                    id: "company",
                    label: "Company",
                    accessor: |r| CellValue::Company {
                        name: r.company.name.clone(),
                        link: r.company.link.clone(),
                    },
                    renderer: render_company,
                    filter: Some(filter_company),
                    numeric: false,
                },
                ColumnSpec {
                    id: "valuation",
                    label: "Valuation($B)",
                    accessor: |r| CellValue::Number(r.valuation),
                    renderer: render_number,
                    filter: Some(filter_valuation),
                    numeric: true,
                },
                ColumnSpec {
                    id: "founder",
                    label: "Founder",
                    accessor: |r| CellValue::Text(r.founder.clone()),
                    renderer: render_plain,
                    filter: None,
                    numeric: false,
                },
                ColumnSpec {
                    id: "industry",
                    label: "Industry",
                    accessor: |r| CellValue::Text(r.industry.clone()),
                    renderer: render_plain,
                    filter: None,
                    numeric: false,
                },
                ColumnSpec {
                    id: "founded",
                    label: "Founded",
                    accessor: |r| CellValue::Year(r.founded),
                    renderer: render_number,
                    filter: Some(filter_founded),
                    numeric: true,
                },
                ColumnSpec {
                    id: "status",
                    label: "Status",
                    accessor: |r| CellValue::Text(r.status.clone()),
                    renderer: render_plain,
                    filter: None,
                    numeric: false,
                },
            ],
        }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&ColumnSpec, DMError> {
        self.get(id)
            .ok_or_else(|| DMError::UnknownColumn(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Company;

    fn acme() -> CompanyRecord {
        CompanyRecord {
            company: Company {
                name: "Acme".into(),
                link: "".into(),
            },
            valuation: 5.0,
            founder: "X".into(),
            industry: "Tech".into(),
            founded: 2010,
            status: "Private".into(),
        }
    }

    #[test]
    fn company_schema_has_unique_ids() {
        let schema = Schema::companies();
        assert!(Schema::new(schema.columns().to_vec()).is_ok());
        assert_eq!(schema.len(), 6);
        assert_eq!(schema.position("founded"), Some(4));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut columns = Schema::companies().columns().to_vec();
        columns.push(columns[0].clone());
        assert!(matches!(
            Schema::new(columns),
            Err(DMError::DuplicateColumn(id)) if id == "company"
        ));
    }

    #[test]
    fn company_filter_ignores_case() {
        let schema = Schema::companies();
        let company = schema.require("company").unwrap();
        assert!(company.matches("ac", &acme()));
        assert!(company.matches("ACME", &acme()));
        assert!(!company.matches("beta", &acme()));
    }

    #[test]
    fn valuation_filter_is_strictly_less_than() {
        let schema = Schema::companies();
        let valuation = schema.require("valuation").unwrap();
        assert!(valuation.matches("4", &acme()));
        assert!(!valuation.matches("5", &acme()));
        assert!(!valuation.matches("6", &acme()));
        // "10" < "5" as strings, but not as numbers.
        assert!(!valuation.matches("10", &acme()));
    }

    #[test]
    fn unparseable_numeric_filter_is_ignored() {
        let schema = Schema::companies();
        assert!(schema.require("valuation").unwrap().matches("abc", &acme()));
        assert!(schema.require("founded").unwrap().matches("19x", &acme()));
    }

    #[test]
    fn founded_filter_uses_year() {
        let founded = Schema::companies().require("founded").unwrap().clone();
        assert!(founded.matches(" 2009 ", &acme()));
        assert!(!founded.matches("2010", &acme()));
    }

    #[test]
    fn default_filter_on_text_columns() {
        let schema = Schema::companies();
        assert!(schema.require("industry").unwrap().matches("te", &acme()));
        assert!(schema.require("status").unwrap().matches("PRIV", &acme()));
        assert!(!schema.require("founder").unwrap().matches("y", &acme()));
    }

    #[test]
    fn company_cell_renders_link_or_emphasis() {
        let schema = Schema::companies();
        let company = schema.require("company").unwrap();
        let mut record = acme();
        assert_eq!(company.render(&record).style, CellStyle::Emphasis);

        record.company.link = "https://acme.example".into();
        let cell = company.render(&record);
        assert_eq!(cell.style, CellStyle::Link);
        assert_eq!(cell.link.as_deref(), Some("https://acme.example"));
        assert_eq!(cell.text, "Acme");
    }

    #[test]
    fn numeric_cells() {
        let schema = Schema::companies();
        let valuation = schema.require("valuation").unwrap();
        assert!(valuation.numeric);
        assert!(!schema.require("status").unwrap().numeric);
        assert_eq!(valuation.render(&acme()).text, "5");
        assert_eq!(format_number(12.5), "12.5");
    }

    #[test]
    fn unknown_column_is_an_error() {
        assert!(matches!(
            Schema::companies().require("valudation"),
            Err(DMError::UnknownColumn(_))
        ));
    }
}
