// src/mirror/mod.rs

use crate::error::{MatrizError, Result as MatrizResult};
use crate::filter::FilterSpec;
use crate::process::NormalizedRecord;
use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{
        Array, ArrayRef, Date32Array, Decimal128Array, StringArray, TimestampMicrosecondArray,
    },
    datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::{NaiveDate, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use rust_decimal::Decimal;
use std::{
    collections::HashMap,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

const VALOR_PRECISION: u8 = 14;
const VALOR_SCALE: i8 = 2;
const SOURCE_TAG: &str = "sheets";

/// Outcome of an upsert pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub created: usize,
    pub updated: usize,
}

/// Parquet copy of the normalized matrix, one row per PEP.
pub struct MatrixMirror {
    path: PathBuf,
}

impl MatrixMirror {
    /// Point at `path`, creating its parent directory if needed. The file itself
    /// is created by the first upsert.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("could not create `{}`", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every mirrored record, in first-insertion order. Missing file → empty.
    pub fn load(&self) -> Result<Vec<NormalizedRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open `{}`", self.path.display()))?;
        let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("reading parquet metadata of `{}`", self.path.display()))?
            .with_batch_size(1024)
            .build()?;
        let mut out = Vec::new();
        while let Some(batch) = reader
            .next()
            .transpose()
            .with_context(|| format!("error reading RecordBatch from `{}`", self.path.display()))?
        {
            out.extend(records_from_batch(&batch)?);
        }
        debug!(path = %self.path.display(), rows = out.len(), "loaded mirror");
        Ok(out)
    }

    /// Insert or replace by PEP. Later records win over earlier ones,
    /// including duplicates within `records`.
    pub fn upsert(&self, records: &[NormalizedRecord]) -> Result<UpsertStats> {
        let mut rows = self.load()?;
        let mut index: HashMap<String, usize> = rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.pep.clone(), i))
            .collect();

        let mut stats = UpsertStats::default();
        for rec in records {
            match index.get(&rec.pep) {
                Some(&i) => {
                    rows[i] = rec.clone();
                    stats.updated += 1;
                }
                None => {
                    index.insert(rec.pep.clone(), rows.len());
                    rows.push(rec.clone());
                    stats.created += 1;
                }
            }
        }

        self.write_all(&rows)?;
        info!(
            path = %self.path.display(),
            created = stats.created,
            updated = stats.updated,
            total = rows.len(),
            "mirror upserted"
        );
        Ok(stats)
    }

    /// Drop every mirrored row.
    pub fn truncate(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove `{}`", self.path.display()))?;
        }
        Ok(())
    }

    /// Mirrored records passing `spec`, in mirror order.
    pub fn query(&self, spec: &FilterSpec) -> MatrizResult<Vec<NormalizedRecord>> {
        self.load()
            .map(|rows| spec.apply(rows))
            .map_err(MatrizError::mirror)
    }

    fn write_all(&self, rows: &[NormalizedRecord]) -> Result<()> {
        let schema = Arc::new(schema());
        let batch = records_to_batch(schema.clone(), rows)?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let file = File::create(&tmp)
            .with_context(|| format!("could not create temporary file `{}`", tmp.display()))?;
        let mut writer = ArrowWriter::try_new(BufWriter::new(file), schema, None)
            .context("creating ArrowWriter for mirror")?;
        writer.write(&batch).context("writing mirror batch")?;
        writer.close().context("closing mirror writer")?;

        fs::rename(&tmp, &self.path).with_context(|| {
            format!(
                "failed to rename `{}` to `{}`",
                tmp.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }
}

fn schema() -> ArrowSchema {
    ArrowSchema::new(vec![
        Field::new("pep", ArrowDataType::Utf8, false),
        Field::new("prazo", ArrowDataType::Utf8, true),
        Field::new("data_conclusao", ArrowDataType::Date32, true),
        Field::new("mes", ArrowDataType::Utf8, true),
        Field::new("status_sap", ArrowDataType::Utf8, true),
        Field::new(
            "valor",
            ArrowDataType::Decimal128(VALOR_PRECISION, VALOR_SCALE),
            false,
        ),
        Field::new("seccional", ArrowDataType::Utf8, true),
        Field::new("tipo", ArrowDataType::Utf8, true),
        Field::new("status_ener", ArrowDataType::Utf8, true),
        Field::new("status_conc", ArrowDataType::Utf8, true),
        Field::new("status_servico", ArrowDataType::Utf8, true),
        Field::new("fonte", ArrowDataType::Utf8, false),
        Field::new(
            "atualizado_em",
            ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
    ])
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn optional_text(
    rows: &[NormalizedRecord],
    get: impl Fn(&NormalizedRecord) -> &str,
) -> ArrayRef {
    Arc::new(StringArray::from(
        rows.iter()
            .map(|r| Some(get(r)).filter(|s| !s.is_empty()))
            .collect::<Vec<_>>(),
    ))
}

fn records_to_batch(schema: Arc<ArrowSchema>, rows: &[NormalizedRecord]) -> Result<RecordBatch> {
    let now = Utc::now().timestamp_micros();
    let valor = Decimal128Array::from(
        rows.iter()
            .map(|r| {
                let mut v = r.valor.round_dp(VALOR_SCALE as u32);
                v.rescale(VALOR_SCALE as u32);
                v.mantissa()
            })
            .collect::<Vec<i128>>(),
    )
    .with_precision_and_scale(VALOR_PRECISION, VALOR_SCALE)?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.pep.as_str()).collect::<Vec<_>>(),
        )),
        optional_text(rows, |r| r.prazo.as_str()),
        Arc::new(Date32Array::from(
            rows.iter()
                .map(|r| r.data_conclusao.map(|d| (d - epoch()).num_days() as i32))
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.mes()).collect::<Vec<_>>(),
        )),
        optional_text(rows, |r| r.status_sap.as_str()),
        Arc::new(valor),
        optional_text(rows, |r| r.seccional.as_str()),
        optional_text(rows, |r| r.tipo.as_str()),
        optional_text(rows, |r| r.status_ener.as_str()),
        optional_text(rows, |r| r.status_conc.as_str()),
        optional_text(rows, |r| r.status_servico.as_str()),
        Arc::new(StringArray::from(vec![SOURCE_TAG; rows.len()])),
        Arc::new(TimestampMicrosecondArray::from(vec![now; rows.len()])),
    ];

    RecordBatch::try_new(schema, columns).context("building mirror RecordBatch")
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("mirror column `{}` missing", name))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow!("mirror column `{}` has unexpected type", name))
}

fn text_at(arr: &StringArray, i: usize) -> String {
    if arr.is_null(i) {
        String::new()
    } else {
        arr.value(i).to_string()
    }
}

fn records_from_batch(batch: &RecordBatch) -> Result<Vec<NormalizedRecord>> {
    let pep = column::<StringArray>(batch, "pep")?;
    let prazo = column::<StringArray>(batch, "prazo")?;
    let data = column::<Date32Array>(batch, "data_conclusao")?;
    let status_sap = column::<StringArray>(batch, "status_sap")?;
    let valor = column::<Decimal128Array>(batch, "valor")?;
    let seccional = column::<StringArray>(batch, "seccional")?;
    let tipo = column::<StringArray>(batch, "tipo")?;
    let status_ener = column::<StringArray>(batch, "status_ener")?;
    let status_conc = column::<StringArray>(batch, "status_conc")?;
    let status_servico = column::<StringArray>(batch, "status_servico")?;

    (0..batch.num_rows())
        .map(|i| -> Result<NormalizedRecord> {
            let data_conclusao = if data.is_null(i) {
                None
            } else {
                epoch().checked_add_signed(chrono::Duration::days(data.value(i) as i64))
            };
            let valor = Decimal::try_from_i128_with_scale(valor.value(i), VALOR_SCALE as u32)
                .map_err(|e| anyhow!("mirror valor out of range at row {}: {}", i, e))?;
            Ok(NormalizedRecord {
                pep: pep.value(i).to_string(),
                prazo: text_at(prazo, i),
                data_conclusao,
                data_conclusao_text: String::new(),
                status_sap: text_at(status_sap, i),
                seccional: text_at(seccional, i),
                tipo: text_at(tipo, i),
                status_ener: text_at(status_ener, i),
                status_conc: text_at(status_conc, i),
                status_servico: text_at(status_servico, i),
                valor,
            })
        })
        .collect()
}
