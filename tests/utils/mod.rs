use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Date32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rx_clean::PipelineConfig;
use rx_clean::config::ColumnNames;
use rx_clean::utils::read_parquet;
use tempfile::TempDir;

/// One raw prescription row as found in the biobank extract
#[derive(Debug, Clone)]
pub struct RawPrescription {
    pub eid: i64,
    pub read_2: &'static str,
    pub bnf_code: &'static str,
    pub dmd_code: Option<i64>,
    pub drug_name: &'static str,
    pub issue_date: &'static str,
}

impl RawPrescription {
    #[must_use]
    pub fn new(eid: i64, drug_name: &'static str, bnf_code: &'static str, issue_date: &'static str) -> Self {
        Self {
            eid,
            read_2: "",
            bnf_code,
            dmd_code: None,
            drug_name,
            issue_date,
        }
    }

    #[must_use]
    pub fn read_2(mut self, read_2: &'static str) -> Self {
        self.read_2 = read_2;
        self
    }

    #[must_use]
    pub fn dmd_code(mut self, dmd_code: i64) -> Self {
        self.dmd_code = Some(dmd_code);
        self
    }
}

/// Temporary workspace holding input extracts, term lists and outputs
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Demographic extract keyed by integer `eid` with text dates of birth
    pub fn write_demographics(&self, rows: &[(i64, Option<&str>)]) -> PathBuf {
        let schema = Arc::new(Schema::new(vec![
            Field::new("eid", DataType::Int64, false),
            Field::new("date_of_birth", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(rows.iter().map(|r| r.0).collect::<Vec<_>>())) as ArrayRef,
                Arc::new(StringArray::from(rows.iter().map(|r| r.1).collect::<Vec<_>>())),
            ],
        )
        .expect("demographic batch");

        let path = self.path("demographics.parquet");
        write_parquet(&path, &batch);
        path
    }

    /// Prescription extract file `name` inside the `prescriptions` directory
    pub fn write_prescriptions(&self, name: &str, rows: &[RawPrescription]) -> PathBuf {
        let dir = self.prescription_dir();
        std::fs::create_dir_all(&dir).expect("create prescription dir");

        let text = |f: fn(&RawPrescription) -> &'static str| -> ArrayRef {
            Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
        };
        let schema = Arc::new(Schema::new(vec![
            Field::new("eid", DataType::Int64, false),
            Field::new("data_provider", DataType::Utf8, true),
            Field::new("issue_date", DataType::Utf8, true),
            Field::new("read_2", DataType::Utf8, true),
            Field::new("bnf_code", DataType::Utf8, true),
            Field::new("dmd_code", DataType::Int64, true),
            Field::new("drug_name", DataType::Utf8, true),
            Field::new("quantity", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(rows.iter().map(|r| r.eid).collect::<Vec<_>>())),
                Arc::new(StringArray::from(vec!["3"; rows.len()])),
                text(|r| r.issue_date),
                text(|r| r.read_2),
                text(|r| r.bnf_code),
                Arc::new(Int64Array::from(rows.iter().map(|r| r.dmd_code).collect::<Vec<_>>())),
                text(|r| r.drug_name),
                Arc::new(StringArray::from(vec!["28 tablet"; rows.len()])),
            ],
        )
        .expect("prescription batch");

        let path = dir.join(name);
        write_parquet(&path, &batch);
        path
    }

    /// Prescription file whose issue date column is an integer
    pub fn write_malformed_prescriptions(&self, name: &str) -> PathBuf {
        let dir = self.prescription_dir();
        std::fs::create_dir_all(&dir).expect("create prescription dir");

        let schema = Arc::new(Schema::new(vec![
            Field::new("eid", DataType::Int64, false),
            Field::new("issue_date", DataType::Int64, true),
            Field::new("read_2", DataType::Utf8, true),
            Field::new("bnf_code", DataType::Utf8, true),
            Field::new("dmd_code", DataType::Utf8, true),
            Field::new("drug_name", DataType::Utf8, true),
            Field::new("quantity", DataType::Utf8, true),
        ]));
        let text = || Arc::new(StringArray::from(vec![Some("x")])) as ArrayRef;
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1])),
                Arc::new(Int64Array::from(vec![20_200_707])),
                text(),
                text(),
                text(),
                text(),
                text(),
            ],
        )
        .expect("malformed batch");

        let path = dir.join(name);
        write_parquet(&path, &batch);
        path
    }

    #[must_use]
    pub fn prescription_dir(&self) -> PathBuf {
        self.path("prescriptions")
    }

    /// Curated term list directory with one file
    pub fn write_patterns(&self, terms: &[&str]) -> PathBuf {
        let dir = self.path("patterns");
        std::fs::create_dir_all(&dir).expect("create pattern dir");
        let mut content = String::from("drug_name\n");
        for term in terms {
            content.push_str(term);
            content.push('\n');
        }
        std::fs::write(dir.join("statins.txt"), content).expect("write terms");
        dir
    }

    /// Configuration for the fixture's `eid`-keyed extracts
    #[must_use]
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            columns: ColumnNames {
                participant_id: "eid".to_string(),
                ..Default::default()
            },
            pattern_dir: Some(self.path("patterns")),
            batch_size: 2,
            threads: 2,
            show_progress: false,
            ..Default::default()
        }
    }
}

pub fn write_parquet(path: &Path, batch: &RecordBatch) {
    let file = File::create(path).expect("create parquet file");
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).expect("parquet writer");
    writer.write(batch).expect("write batch");
    writer.close().expect("close writer");
}

/// All rows of a Parquet output as one batch
#[must_use]
pub fn read_output(path: &Path) -> RecordBatch {
    let batches = read_parquet(path, None, 1024).expect("read output");
    let schema = batches
        .first()
        .map(RecordBatch::schema)
        .expect("output has at least one batch");
    arrow::compute::concat_batches(&schema, &batches).expect("concat output")
}

/// String column values of a batch
#[must_use]
pub fn strings(batch: &RecordBatch, column: &str) -> Vec<Option<String>> {
    let array = batch
        .column_by_name(column)
        .unwrap_or_else(|| panic!("column {column}"))
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap_or_else(|| panic!("{column} is not Utf8"));
    array.iter().map(|v| v.map(str::to_string)).collect()
}

/// Date column values of a batch
#[must_use]
pub fn dates(batch: &RecordBatch, column: &str) -> Vec<chrono::NaiveDate> {
    let array = batch
        .column_by_name(column)
        .unwrap_or_else(|| panic!("column {column}"))
        .as_any()
        .downcast_ref::<Date32Array>()
        .unwrap_or_else(|| panic!("{column} is not Date32"));
    (0..array.len())
        .filter_map(|i| array.value_as_date(i))
        .collect()
}

#[must_use]
pub fn ymd(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
