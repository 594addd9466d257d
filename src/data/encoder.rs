//! Ordinal encoding of categorical columns
//!
//! Categories are numbered from 1 in order of first appearance. Values not
//! seen during fit encode to [`UNKNOWN_CODE`], nulls not seen during fit to
//! [`MISSING_CODE`].

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::DataError;

/// Code for a category that was not present when fitting
pub const UNKNOWN_CODE: i64 = -1;
/// Code for a null that was not present when fitting
pub const MISSING_CODE: i64 = -2;

/// Original (decoded) value of a feature cell
///
/// Serialized externally tagged: `{"number": 1710.0}`, `{"category": "Pave"}`,
/// `"missing"`, `"unknown"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureValue {
    Number(f64),
    Category(String),
    Missing,
    Unknown,
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(v) if v.fract() == 0.0 => write!(f, "{}", *v as i64),
            FeatureValue::Number(v) => write!(f, "{:.3}", v),
            FeatureValue::Category(s) => write!(f, "{}", s),
            FeatureValue::Missing => write!(f, "NaN"),
            FeatureValue::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// Category list of a single column; code = position + 1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column: String,
    pub categories: Vec<Option<String>>,
}

impl ColumnMapping {
    fn fit(column: &str, values: &StringChunked) -> Self {
        let mut categories: Vec<Option<String>> = Vec::new();
        for value in values.into_iter() {
            if !categories.iter().any(|c| c.as_deref() == value) {
                categories.push(value.map(str::to_string));
            }
        }
        Self {
            column: column.to_string(),
            categories,
        }
    }

    /// Encode one value
    pub fn encode(&self, value: Option<&str>) -> i64 {
        match self.categories.iter().position(|c| c.as_deref() == value) {
            Some(idx) => idx as i64 + 1,
            None if value.is_none() => MISSING_CODE,
            None => UNKNOWN_CODE,
        }
    }

    /// Decode one code
    pub fn decode(&self, code: i64) -> FeatureValue {
        if code == MISSING_CODE {
            return FeatureValue::Missing;
        }
        if code < 1 {
            return FeatureValue::Unknown;
        }
        match self.categories.get((code - 1) as usize) {
            Some(Some(category)) => FeatureValue::Category(category.clone()),
            Some(None) => FeatureValue::Missing,
            None => FeatureValue::Unknown,
        }
    }

    /// Number of known categories
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Ordinal encoder over a fixed set of columns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdinalEncoder {
    mappings: Vec<ColumnMapping>,
}

impl OrdinalEncoder {
    /// Learn category codes for `columns`
    pub fn fit(frame: &DataFrame, columns: &[String]) -> Result<Self, DataError> {
        let mut mappings = Vec::with_capacity(columns.len());

        for name in columns {
            let as_text = text_column(frame, name)?;
            mappings.push(ColumnMapping::fit(name, as_text.str()?));
        }

        Ok(Self { mappings })
    }

    /// Replace every encoded column with its Int64 codes
    pub fn transform(&self, frame: &DataFrame) -> Result<DataFrame, DataError> {
        let mut out = frame.clone();

        for mapping in &self.mappings {
            let as_text = text_column(frame, &mapping.column)?;
            let codes: Vec<i64> = as_text
                .str()?
                .into_iter()
                .map(|value| mapping.encode(value))
                .collect();
            out.with_column(Series::new(mapping.column.as_str().into(), codes))?;
        }

        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(
        frame: &DataFrame,
        columns: &[String],
    ) -> Result<(Self, DataFrame), DataError> {
        let encoder = Self::fit(frame, columns)?;
        let encoded = encoder.transform(frame)?;
        Ok((encoder, encoded))
    }

    /// Decode a single cell; columns the encoder does not know stay numeric
    pub fn inverse(&self, column: &str, value: f64) -> FeatureValue {
        match self.mapping(column) {
            Some(mapping) => mapping.decode(value.round() as i64),
            None => FeatureValue::Number(value),
        }
    }

    /// Decode a full row laid out as `columns`
    pub fn inverse_row(&self, columns: &[String], row: &[f64]) -> Vec<FeatureValue> {
        columns
            .iter()
            .zip(row)
            .map(|(column, &value)| self.inverse(column, value))
            .collect()
    }

    pub fn mapping(&self, column: &str) -> Option<&ColumnMapping> {
        self.mappings.iter().find(|m| m.column == column)
    }

    /// Names of the encoded columns
    pub fn columns(&self) -> Vec<&str> {
        self.mappings.iter().map(|m| m.column.as_str()).collect()
    }

    pub fn is_categorical(&self, column: &str) -> bool {
        self.mapping(column).is_some()
    }
}

fn text_column(frame: &DataFrame, name: &str) -> Result<Column, DataError> {
    let column = frame
        .column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()))?;
    Ok(column.cast(&DataType::String)?)
}
