//! Read-side queries over the master table: filtered pages and weighted top-N.

use std::{collections::HashMap, path::Path};

use anyhow::Result;
use polars::prelude::{Column, DataFrame, DataType};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::table::{count_column, score_column, MasterTable, BLOCK_ID_COLUMN};

pub const TOTAL_SCORE_COLUMN: &str = "TOTAL_Score";

/// The table as JSON rows, in file order.
#[derive(Debug, Clone)]
pub struct TableView {
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub data: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopRanking {
    pub n: usize,
    pub weights: Map<String, Value>,
    pub data: Vec<Map<String, Value>>,
}

impl TableView {
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_dataframe(MasterTable::read(path)?.dataframe())
    }

    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let columns = df.get_column_names().iter().map(|name| name.to_string()).collect::<Vec<_>>();
        let values = df.get_columns().iter()
            .map(column_values)
            .collect::<Result<Vec<_>>>()?;

        let rows = (0..df.height())
            .map(|i| columns.iter().zip(&values)
                .map(|(name, values)| (name.clone(), values[i].clone()))
                .collect())
            .collect();

        Ok(Self { columns, rows })
    }

    #[inline] pub fn len(&self) -> usize { self.rows.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    /// Layers with a count column, in column order.
    pub fn count_layers(&self) -> Vec<String> {
        self.layers_with_suffix("_Count")
    }

    /// Layers with a score column, in column order.
    pub fn score_layers(&self) -> Vec<String> {
        self.layers_with_suffix("_Score")
    }

    fn layers_with_suffix(&self, suffix: &str) -> Vec<String> {
        self.columns.iter()
            .filter(|name| name.as_str() != TOTAL_SCORE_COLUMN)
            .filter_map(|name| name.strip_suffix(suffix))
            .map(str::to_string)
            .collect()
    }

    /// Resolve a case-insensitive layer key against the table's column prefixes.
    fn find_layer<'a>(layers: &'a [String], key: &str) -> Option<&'a str> {
        layers.iter().find(|layer| layer.eq_ignore_ascii_case(key)).map(String::as_str)
    }

    /// Rows whose `<LAYER>_Count` is at least the given minimum for every filter.
    /// Filters naming a layer without a count column are ignored.
    pub fn list(&self, min_counts: &[(String, i64)], limit: usize, offset: usize) -> Page {
        let layers = self.count_layers();
        let filters = min_counts.iter()
            .filter_map(|(key, min)| Self::find_layer(&layers, key).map(|layer| (count_column(layer), *min)))
            .collect::<Vec<_>>();

        let matching = self.rows.iter()
            .filter(|row| filters.iter().all(|(column, min)| {
                row.get(column).and_then(as_f64).is_some_and(|value| value >= *min as f64)
            }))
            .collect::<Vec<_>>();

        Page {
            total: matching.len(),
            limit,
            offset,
            data: matching.into_iter().skip(offset).take(limit).cloned().collect(),
        }
    }

    /// The `n` rows with the highest `Σ weight · <LAYER>_Score`.
    ///
    /// Every score layer weighs 1.0 unless `weights` overrides it (case-insensitive);
    /// weights for layers without a score column still apply to a score of 0.
    /// Ties keep table order.
    pub fn top(&self, n: usize, weights: &HashMap<String, f64>) -> TopRanking {
        let mut effective: Vec<(String, f64)> = self.score_layers().into_iter()
            .map(|layer| {
                let weight = weights.iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(&layer))
                    .map_or(1.0, |(_, weight)| *weight);
                (layer, weight)
            })
            .collect();
        for (key, weight) in weights {
            if !effective.iter().any(|(layer, _)| layer.eq_ignore_ascii_case(key)) {
                effective.push((key.clone(), *weight));
            }
        }

        let mut scored = self.rows.iter()
            .map(|row| {
                let total = effective.iter()
                    .map(|(layer, weight)| weight * row.get(&score_column(layer)).and_then(as_f64).unwrap_or(0.0))
                    .sum::<f64>();
                (row, total)
            })
            .collect::<Vec<_>>();
        // stable: equal totals keep table order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let layers = self.count_layers().into_iter()
            .chain(self.score_layers())
            .collect::<Vec<_>>();
        let data = scored.into_iter()
            .take(n)
            .map(|(row, total)| {
                let mut out = Map::new();
                if let Some(id) = row.get(BLOCK_ID_COLUMN) {
                    out.insert(BLOCK_ID_COLUMN.to_string(), id.clone());
                }
                for column in self.columns.iter().filter(|name| is_layer_column(name, &layers)) {
                    if let Some(value) = row.get(column) {
                        out.insert(column.clone(), value.clone());
                    }
                }
                out.insert(TOTAL_SCORE_COLUMN.to_string(), json!(total));
                out
            })
            .collect();

        TopRanking {
            n,
            weights: effective.into_iter()
                .map(|(layer, weight)| (layer.to_ascii_lowercase(), json!(weight)))
                .collect(),
            data,
        }
    }
}

fn is_layer_column(name: &str, layers: &[String]) -> bool {
    layers.iter().any(|layer| name == count_column(layer) || name == score_column(layer))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// JSON values of one column, by dtype.
fn column_values(column: &Column) -> Result<Vec<Value>> {
    let values = match column.dtype() {
        DataType::String => column.str()?.into_iter().map(|v| v.map_or(Value::Null, |s| json!(s))).collect(),
        DataType::Int64 => column.i64()?.into_iter().map(|v| v.map_or(Value::Null, |n| json!(n))).collect(),
        DataType::UInt32 => column.u32()?.into_iter().map(|v| v.map_or(Value::Null, |n| json!(n))).collect(),
        DataType::Float64 => column.f64()?.into_iter()
            .map(|v| v.filter(|x| x.is_finite()).map_or(Value::Null, |x| json!(x)))
            .collect(),
        DataType::Boolean => column.bool()?.into_iter().map(|v| v.map_or(Value::Null, |b| json!(b))).collect(),
        DataType::Null => vec![Value::Null; column.len()],
        _ => {
            let text = column.cast(&DataType::String)?;
            text.str()?.into_iter().map(|v| v.map_or(Value::Null, |s| json!(s))).collect()
        }
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> TableView {
        let df = DataFrame::new(vec![
            Column::new(BLOCK_ID_COLUMN.into(), ["001", "002", "003", "004"]),
            Column::new("SITP_Count".into(), [5i64, 0, 2, 9]),
            Column::new("SITP_Score".into(), [4i64, 1, 3, 5]),
            Column::new("PARQUES_Count".into(), [0i64, 3, 1, 0]),
            Column::new("PARQUES_Score".into(), [1i64, 5, 3, 1]),
        ]).unwrap();
        TableView::from_dataframe(&df).unwrap()
    }

    fn ids(rows: &[Map<String, Value>]) -> Vec<&str> {
        rows.iter().map(|row| row[BLOCK_ID_COLUMN].as_str().unwrap()).collect()
    }

    #[test]
    fn identifiers_stay_text() {
        let page = view().list(&[], 1, 0);
        assert_eq!(page.data[0][BLOCK_ID_COLUMN], json!("001"));
        assert_eq!(page.data[0]["SITP_Count"], json!(5));
    }

    #[test]
    fn list_filters_and_paginates() {
        let view = view();
        let page = view.list(&[("sitp".into(), 2)], 2, 1);
        assert_eq!(page.total, 3);
        assert_eq!(ids(&page.data), ["003", "004"]);

        let page = view.list(&[("SITP".into(), 1), ("parques".into(), 1)], 200, 0);
        assert_eq!(ids(&page.data), ["003"]);
    }

    #[test]
    fn unknown_filter_layers_are_ignored() {
        let page = view().list(&[("hospitales".into(), 100)], 200, 0);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn top_uses_unit_weights_by_default() {
        let ranking = view().top(2, &HashMap::new());
        // totals: 5, 6, 6, 6
        assert_eq!(ids(&ranking.data), ["002", "003"]);
        assert_eq!(ranking.data[0][TOTAL_SCORE_COLUMN], json!(6.0));
        assert_eq!(ranking.weights["sitp"], json!(1.0));
        assert_eq!(ranking.weights["parques"], json!(1.0));
    }

    #[test]
    fn top_applies_weights() {
        let weights = HashMap::from([("SITP".to_string(), 2.0), ("parques".to_string(), 0.0)]);
        let ranking = view().top(4, &weights);
        assert_eq!(ids(&ranking.data), ["004", "001", "003", "002"]);
        assert_eq!(ranking.data[0][TOTAL_SCORE_COLUMN], json!(10.0));
    }

    #[test]
    fn missing_score_columns_count_as_zero() {
        let df = DataFrame::new(vec![
            Column::new(BLOCK_ID_COLUMN.into(), ["A", "B"]),
            Column::new("SITP_Count".into(), [1i64, 3]),
            Column::new("SITP_Score".into(), [2i64, 5]),
        ]).unwrap();
        let view = TableView::from_dataframe(&df).unwrap();
        let ranking = view.top(10, &HashMap::from([("parques".to_string(), 3.0)]));

        assert_eq!(ids(&ranking.data), ["B", "A"]);
        assert_eq!(ranking.data[0][TOTAL_SCORE_COLUMN], json!(5.0));
        assert_eq!(ranking.weights["parques"], json!(3.0));
    }
}
