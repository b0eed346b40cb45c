use polars::prelude::*;
use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::domain::DMError;

/// Sample dataset compiled into the binary, used when no data file is given.
pub const EMBEDDED_DATASET: &str = include_str!("../data/companies.json");

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Company {
    pub name: String,
    pub link: String,
}

impl Company {
    pub fn has_link(&self) -> bool {
        !self.link.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyRecord {
    pub company: Company,
    /// Valuation in billions USD.
    pub valuation: f64,
    pub founder: String,
    pub industry: String,
    pub founded: i64,
    pub status: String,
}

impl CompanyRecord {
    /// Builds a record from one element of a JSON array. Missing or malformed
    /// fields become empty strings or zero.
    pub fn from_json(value: &Value) -> Self {
        let company = match value.get("company") {
            Some(Value::Object(c)) => Company {
                name: c.get("name").map(json_text).unwrap_or_default(),
                link: c.get("link").map(json_text).unwrap_or_default(),
            },
            Some(other) => Company {
                name: json_text(other),
                link: value.get("link").map(json_text).unwrap_or_default(),
            },
            None => Company::default(),
        };
        CompanyRecord {
            company,
            valuation: value
                .get("valuation")
                .map(|v| parse_valuation(&json_text(v)))
                .unwrap_or_default(),
            founder: value.get("founder").map(json_text).unwrap_or_default(),
            industry: value.get("industry").map(json_text).unwrap_or_default(),
            founded: value
                .get("founded")
                .map(|v| parse_year(&json_text(v)))
                .unwrap_or_default(),
            status: value.get("status").map(json_text).unwrap_or_default(),
        }
    }
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Unconfirmed valuations carry a trailing asterisk in the source data.
pub fn parse_valuation(raw: &str) -> f64 {
    raw.trim()
        .trim_end_matches('*')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub fn parse_year(raw: &str) -> i64 {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.trunc() as i64)
        })
        .unwrap_or(0)
}

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
    JSON,
}

/// Read-only record list, loaded once and shared with every view.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    records: Arc<[CompanyRecord]>,
}

// Columns expected in tabular data files, in CompanyRecord order.
const TABULAR_COLUMNS: [&str; 7] = [
    "company",
    "link",
    "valuation",
    "founder",
    "industry",
    "founded",
    "status",
];

impl Dataset {
    pub fn new(name: impl Into<String>, records: Vec<CompanyRecord>) -> Result<Self, DMError> {
        if records.is_empty() {
            return Err(DMError::EmptyDataset);
        }
        Ok(Self {
            name: name.into(),
            records: records.into(),
        })
    }

    pub fn embedded() -> Result<Self, DMError> {
        Self::from_json_str("companies.json", EMBEDDED_DATASET)
    }

    pub fn from_json_str(name: &str, json: &str) -> Result<Self, DMError> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Array(items) = value else {
            return Err(DMError::LoadingFailed(
                "expected a JSON array of records".into(),
            ));
        };
        let records = items.iter().map(CompanyRecord::from_json).collect();
        Self::new(name, records)
    }

    /// Loads a data file, picking the reader from the file extension.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, DMError> {
        let start_time = Instant::now();
        let file_type = Self::check_file(path)?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();

        let dataset = match file_type {
            FileType::JSON => Self::from_json_str(&name, &fs::read_to_string(path)?)?,
            FileType::CSV => Self::from_frame(&name, Self::load_csv(path)?)?,
            FileType::PARQUET => Self::from_frame(&name, Self::load_parquet(path)?)?,
            FileType::ARROW => Self::from_frame(&name, Self::load_arrow(path)?)?,
        };

        info!(
            "Loaded {} records from {:?} in {}ms",
            dataset.len(),
            file_type,
            start_time.elapsed().as_millis()
        );
        Ok(dataset)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[CompanyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_file(path: &Path) -> Result<FileType, DMError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DMError::FileNotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => DMError::PermissionDenied(path.to_path_buf()),
            _ => DMError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(DMError::LoadingFailed(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Self::detect_file_type(path)
    }

    fn detect_file_type(path: &Path) -> Result<FileType, DMError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            Some("JSON") => Ok(FileType::JSON),
            _ => Err(DMError::UnknownFileType(path.to_path_buf())),
        }
    }

    fn from_frame(name: &str, frame: LazyFrame) -> Result<Self, DMError> {
        let df = frame.collect()?;
        let nrows = df.height();

        // Each column is stringified on its own thread. Absent columns come
        // back as None and every cell of that field takes its default.
        let columns: Vec<Option<Vec<String>>> = TABULAR_COLUMNS
            .par_iter()
            .map(|col_name| Self::load_column(&df, col_name))
            .collect::<Result<_, PolarsError>>()?;

        let cell = |col: usize, row: usize| table_cell(&columns, col, row);

        let records = (0..nrows)
            .map(|row| CompanyRecord {
                company: Company {
                    name: cell(0, row).to_string(),
                    link: cell(1, row).to_string(),
                },
                valuation: parse_valuation(cell(2, row)),
                founder: cell(3, row).to_string(),
                industry: cell(4, row).to_string(),
                founded: parse_year(cell(5, row)),
                status: cell(6, row).to_string(),
            })
            .collect();

        Self::new(name, records)
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Option<Vec<String>>, PolarsError> {
        let Ok(column) = df.column(col_name) else {
            warn!("Data file has no \"{col_name}\" column, using defaults");
            return Ok(None);
        };
        debug!("Loading column \"{col_name}\" ({})", column.dtype());
        let col = column.cast(&DataType::String)?;
        let series = col.str()?;
        let data = series
            .into_iter()
            .map(|value| value.map(|s| s.trim().to_string()).unwrap_or_default())
            .collect();
        Ok(Some(data))
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

fn table_cell(columns: &[Option<Vec<String>>], col: usize, row: usize) -> &str {
    columns[col]
        .as_ref()
        .and_then(|c| c.get(row))
        .map(String::as_str)
        .unwrap_or("")
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, DMError> {
    shellexpand::full(raw)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| DMError::InvalidOption(format!("cannot expand path {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_record_with_nested_company() {
        let value: Value = serde_json::from_str(
            r#"{"company": {"name": "Acme", "link": ""}, "valuation": 5,
                "founder": "X", "industry": "Tech", "founded": 2010, "status": "Private"}"#,
        )
        .unwrap();
        let record = CompanyRecord::from_json(&value);
        assert_eq!(record.company.name, "Acme");
        assert!(!record.company.has_link());
        assert_eq!(record.valuation, 5.0);
        assert_eq!(record.founded, 2010);
        assert_eq!(record.status, "Private");
    }

    #[test]
    fn malformed_fields_fail_closed() {
        let value: Value = serde_json::from_str(
            r#"{"company": "Beta", "valuation": "n/a", "founded": null}"#,
        )
        .unwrap();
        let record = CompanyRecord::from_json(&value);
        assert_eq!(record.company.name, "Beta");
        assert_eq!(record.valuation, 0.0);
        assert_eq!(record.founded, 0);
        assert_eq!(record.founder, "");
        assert_eq!(record.industry, "");
    }

    #[test]
    fn unconfirmed_valuation_keeps_number() {
        assert_eq!(parse_valuation("12.5*"), 12.5);
        assert_eq!(parse_valuation(" 3 "), 3.0);
        assert_eq!(parse_valuation("NaN"), 0.0);
    }

    #[test]
    fn year_accepts_float_text() {
        assert_eq!(parse_year("2010"), 2010);
        assert_eq!(parse_year("2010.0"), 2010);
        assert_eq!(parse_year("twenty"), 0);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        assert!(matches!(
            Dataset::from_json_str("empty", "[]"),
            Err(DMError::EmptyDataset)
        ));
        assert!(matches!(
            Dataset::from_json_str("object", "{}"),
            Err(DMError::LoadingFailed(_))
        ));
    }

    #[test]
    fn embedded_dataset_loads() {
        let dataset = Dataset::embedded().unwrap();
        assert!(!dataset.is_empty());
        assert!(dataset.records().iter().all(|r| !r.company.name.is_empty()));
    }

    #[test]
    fn file_type_from_extension() {
        assert!(matches!(
            Dataset::detect_file_type(Path::new("a.CSV")),
            Ok(FileType::CSV)
        ));
        assert!(matches!(
            Dataset::detect_file_type(Path::new("a.pq")),
            Ok(FileType::PARQUET)
        ));
        assert!(matches!(
            Dataset::detect_file_type(Path::new("a.xlsx")),
            Err(DMError::UnknownFileType(_))
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            Dataset::load(Path::new("does/not/exist.csv")),
            Err(DMError::FileNotFound(_))
        ));
    }
}
