//! The master table: one row per block, a `<LAYER>_Count`/`<LAYER>_Score` column pair per layer.

use std::{collections::{HashMap, HashSet}, path::Path};

use anyhow::{bail, ensure, Context, Result};
use polars::prelude::*;

use crate::{error::PipelineError, io::csv, score::quintile_scores_column};

/// Block identifier column; always text.
pub const BLOCK_ID_COLUMN: &str = "MANCODIGO";

const COUNT_SUFFIX: &str = "_Count";
const SCORE_SUFFIX: &str = "_Score";

pub fn count_column(layer: &str) -> String { format!("{layer}{COUNT_SUFFIX}") }
pub fn score_column(layer: &str) -> String { format!("{layer}{SCORE_SUFFIX}") }

#[derive(Debug, Clone)]
pub struct MasterTable {
    df: DataFrame,
}

impl MasterTable {
    /// A table holding only the block identifiers.
    pub fn seed(ids: &[String]) -> Result<Self> {
        Ok(Self { df: DataFrame::new(vec![Column::new(BLOCK_ID_COLUMN.into(), ids)])? })
    }

    /// Read a persisted table as-is.
    pub fn read(path: &Path) -> Result<Self> {
        let df = csv::read_table_csv(path, BLOCK_ID_COLUMN)?;
        df.column(BLOCK_ID_COLUMN)
            .with_context(|| format!("[table] {} has no {BLOCK_ID_COLUMN} column", path.display()))?;
        Ok(Self { df })
    }

    /// Load the table at `path` (if any) restricted and ordered to the block universe `ids`.
    ///
    /// Blocks missing from the file get zero counts; rows for blocks no longer in the
    /// universe are dropped. Layers touched by either change are rescored.
    pub fn load_aligned(path: Option<&Path>, ids: &[String]) -> Result<Self> {
        let seed = Self::seed(ids)?;
        let Some(path) = path.filter(|path| path.exists()) else { return Ok(seed) };

        let existing = Self::read(path)?;
        let unique = existing.df.column(BLOCK_ID_COLUMN)?.as_materialized_series().n_unique()?;
        if unique != existing.df.height() {
            return Err(PipelineError::schema(path, format!(
                "{} duplicate {BLOCK_ID_COLUMN} values in master table", existing.df.height() - unique
            )).into());
        }

        let df = seed.df
            .with_row_index("idx".into(), None)?
            .left_join(&existing.df, [BLOCK_ID_COLUMN], [BLOCK_ID_COLUMN])
            .context("[table] left_join on block identifier failed")?
            .sort(["idx"], SortMultipleOptions::default())?
            .drop("idx")?;

        let matched = {
            let known = existing.id_set()?;
            ids.iter().filter(|id| known.contains(id.as_str())).count()
        };
        let mut table = Self { df };

        if matched != ids.len() || matched != existing.df.height() {
            tracing::info!(
                kept = matched, added = ids.len() - matched, removed = existing.df.height() - matched,
                "aligned master table to block universe"
            );
            for layer in table.layers() {
                let counts = table.df.column(&count_column(&layer))?
                    .as_materialized_series()
                    .fill_null(FillNullStrategy::Zero)?
                    .cast(&DataType::UInt32)?;
                table.set_layer_columns(&layer, counts)?;
            }
        }

        Ok(table)
    }

    /// Replace the layer's count and score columns with fresh counts.
    ///
    /// `counts` holds only blocks with at least one match; every other block counts 0.
    pub fn apply_layer(&mut self, layer: &str, counts: &HashMap<String, u32>) -> Result<()> {
        let (ids, values): (Vec<&str>, Vec<u32>) = counts.iter()
            .map(|(id, count)| (id.as_str(), *count))
            .unzip();
        let fresh = DataFrame::new(vec![
            Column::new(BLOCK_ID_COLUMN.into(), ids),
            Column::new(count_column(layer).into(), values),
        ])?;

        let joined = self.df.select([BLOCK_ID_COLUMN])?
            .with_row_index("idx".into(), None)?
            .left_join(&fresh, [BLOCK_ID_COLUMN], [BLOCK_ID_COLUMN])
            .context("[table] left_join on block identifier failed")?
            .sort(["idx"], SortMultipleOptions::default())?;
        ensure!(joined.height() == self.df.height(), "[table] counts hold duplicate block identifiers");

        let known = self.id_set()?;
        let unknown = counts.keys()
            .filter(|id| !known.contains(id.as_str()))
            .count();
        if unknown > 0 {
            tracing::warn!(layer, unknown, "counts for blocks missing from the table were ignored");
        }

        let counts = joined.column(&count_column(layer))?
            .as_materialized_series()
            .fill_null(FillNullStrategy::Zero)?;
        self.set_layer_columns(layer, counts)
    }

    fn set_layer_columns(&mut self, layer: &str, counts: Series) -> Result<()> {
        let counts = counts.cast(&DataType::UInt32)?.with_name(count_column(layer).into());
        let scores = quintile_scores_column(&Column::from(counts.clone()))?;
        self.df.replace_or_add(count_column(layer).into(), counts)?;
        self.df.replace_or_add(score_column(layer).into(), Series::new(score_column(layer).into(), scores))?;
        Ok(())
    }

    fn id_set(&self) -> Result<HashSet<&str>> {
        Ok(self.df.column(BLOCK_ID_COLUMN)?.str()?.into_iter().flatten().collect())
    }

    /// Layers with both a count and a score column, in column order.
    pub fn layers(&self) -> Vec<String> {
        let names = self.df.get_column_names();
        names.iter()
            .filter_map(|name| name.strip_suffix(COUNT_SUFFIX))
            .filter(|layer| names.iter().any(|name| name.as_str() == score_column(layer)))
            .map(str::to_string)
            .collect()
    }

    /// Overwrite the table file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.df.column(BLOCK_ID_COLUMN).is_err() {
            bail!("[table] refusing to save a table without {BLOCK_ID_COLUMN}");
        }
        csv::write_table_csv(&mut self.df.clone(), path)?;
        tracing::info!(rows = self.df.height(), columns = self.df.width(), path = %path.display(), "saved master table");
        Ok(())
    }

    #[inline] pub fn len(&self) -> usize { self.df.height() }
    #[inline] pub fn is_empty(&self) -> bool { self.df.height() == 0 }
    #[inline] pub fn dataframe(&self) -> &DataFrame { &self.df }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|id| id.to_string()).collect()
    }

    fn column_u32(table: &MasterTable, name: &str) -> Vec<u32> {
        table.dataframe().column(name).unwrap()
            .cast(&DataType::UInt32).unwrap()
            .u32().unwrap()
            .into_no_null_iter()
            .collect()
    }

    fn counts(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs.iter().map(|(id, n)| (id.to_string(), *n)).collect()
    }

    #[test]
    fn missing_blocks_are_backfilled_with_zero() {
        let mut table = MasterTable::seed(&ids(&["A", "B", "C"])).unwrap();
        table.apply_layer("SITP", &counts(&[("A", 2), ("C", 1)])).unwrap();

        assert_eq!(column_u32(&table, "SITP_Count"), vec![2, 0, 1]);
        assert_eq!(column_u32(&table, "SITP_Score"), vec![5, 2, 4]);
        assert_eq!(table.layers(), vec!["SITP"]);
    }

    #[test]
    fn reapplying_a_layer_is_idempotent() {
        let mut table = MasterTable::seed(&ids(&["A", "B", "C", "D"])).unwrap();
        table.apply_layer("SITP", &counts(&[("A", 2), ("B", 7)])).unwrap();
        let once = table.dataframe().clone();

        table.apply_layer("SITP", &counts(&[("A", 2), ("B", 7)])).unwrap();
        assert!(table.dataframe().equals_missing(&once));
    }

    #[test]
    fn other_layers_are_untouched() {
        let mut table = MasterTable::seed(&ids(&["A", "B", "C"])).unwrap();
        table.apply_layer("SITP", &counts(&[("A", 1)])).unwrap();
        table.apply_layer("PARQUES", &counts(&[("B", 3), ("C", 1)])).unwrap();
        let parques = column_u32(&table, "PARQUES_Count");

        table.apply_layer("SITP", &counts(&[("C", 4)])).unwrap();

        assert_eq!(column_u32(&table, "PARQUES_Count"), parques);
        assert_eq!(column_u32(&table, "SITP_Count"), vec![0, 0, 4]);
        let names = table.dataframe().get_column_names().iter().map(|n| n.to_string()).collect::<Vec<_>>();
        assert_eq!(names, ["MANCODIGO", "SITP_Count", "SITP_Score", "PARQUES_Count", "PARQUES_Score"]);
    }

    #[test]
    fn constant_counts_score_one() {
        let mut table = MasterTable::seed(&ids(&["A", "B"])).unwrap();
        table.apply_layer("SITP", &HashMap::new()).unwrap();
        assert_eq!(column_u32(&table, "SITP_Count"), vec![0, 0]);
        assert_eq!(column_u32(&table, "SITP_Score"), vec![1, 1]);
    }

    #[test]
    fn saved_table_keeps_text_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabla_manzanas.csv");
        let universe = ids(&["004501", "004502", "A-7"]);

        let mut table = MasterTable::seed(&universe).unwrap();
        table.apply_layer("SITP", &counts(&[("004501", 3)])).unwrap();
        table.save(&path).unwrap();

        let loaded = MasterTable::load_aligned(Some(&path), &universe).unwrap();
        let loaded_ids = loaded.dataframe().column(BLOCK_ID_COLUMN).unwrap().str().unwrap()
            .into_no_null_iter().map(str::to_string).collect::<Vec<_>>();
        assert_eq!(loaded_ids, universe);
        assert_eq!(column_u32(&loaded, "SITP_Count"), vec![3, 0, 0]);
    }

    #[test]
    fn loading_aligns_to_block_universe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabla_manzanas.csv");
        std::fs::write(&path, "MANCODIGO,SITP_Count,SITP_Score,NOTA\nB,4,5,x\nGONE,9,5,y\nA,0,1,z\n").unwrap();

        let table = MasterTable::load_aligned(Some(&path), &ids(&["A", "B", "NEW"])).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(column_u32(&table, "SITP_Count"), vec![0, 4, 0]);
        assert_eq!(column_u32(&table, "SITP_Score"), vec![3, 5, 3]);
        let notes = table.dataframe().column("NOTA").unwrap().str().unwrap().into_iter().collect::<Vec<_>>();
        assert_eq!(notes, [Some("z"), Some("x"), None]);
    }

    #[test]
    fn duplicate_keys_in_table_file_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabla_manzanas.csv");
        std::fs::write(&path, "MANCODIGO,SITP_Count\nA,1\nA,2\n").unwrap();

        let err = MasterTable::load_aligned(Some(&path), &ids(&["A"])).unwrap_err();
        assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Schema { .. })));
    }

    #[test]
    fn missing_file_seeds_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = MasterTable::load_aligned(Some(&dir.path().join("absent.csv")), &ids(&["A"])).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.layers().is_empty());
    }
}
