/// Columnar storage for per-splat attributes
mod column;

pub use column::{Column, ColumnData, DataType};

use crate::error::{Result, SplatError};
use constants::columns::sh_rest_name;
use constants::sh::{MAX_SH_BANDS, REST_COLUMN_COUNTS};

/// Ordered set of equally long, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<Column>,
    num_rows: usize,
}

/// One materialised row, one slot per column in schema order.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub values: Vec<f64>,
}

impl Row {
    pub fn get(&self, slot: usize) -> f64 {
        self.values[slot]
    }
}

/// Column name to row slot mapping, resolved once per table.
#[derive(Debug, Clone)]
pub struct RowLayout {
    names: Vec<String>,
}

impl RowLayout {
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl DataTable {
    /// Builds a table, checking name uniqueness and a shared row count.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, |c| c.len());
        let mut table = Self {
            columns: Vec::with_capacity(columns.len()),
            num_rows,
        };
        for column in columns {
            table.add_column(column)?;
        }
        Ok(table)
    }

    /// Table with no columns and `num_rows` rows, ready for `add_column`.
    pub fn with_rows(num_rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            num_rows,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Like `get_column` but reports the missing name as an error.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.get_column(name)
            .ok_or_else(|| SplatError::MissingColumn(name.to_string()))
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut Column> {
        self.get_column_mut(name)
            .ok_or_else(|| SplatError::MissingColumn(name.to_string()))
    }

    /// Float32 slice of a column.
    pub fn f32_column(&self, name: &str) -> Result<&[f32]> {
        self.column(name)?.as_f32()
    }

    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.has_column(&column.name) {
            return Err(SplatError::DuplicateColumn(column.name));
        }
        let actual = column.len();
        if actual != self.num_rows {
            return Err(SplatError::ColumnLength {
                name: column.name,
                expected: self.num_rows,
                actual,
            });
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let index = self.column_index(name)?;
        Some(self.columns.remove(index))
    }

    /// Spherical-harmonic bands present, judged by the first absent
    /// `f_rest_i` column: 9, 24 or 45 complete prefixes mean 1, 2 or 3 bands.
    pub fn sh_bands(&self) -> usize {
        let total = REST_COLUMN_COUNTS[MAX_SH_BANDS];
        let first_missing = (0..total).find(|&i| !self.has_column(&sh_rest_name(i)));
        match first_missing {
            None => MAX_SH_BANDS,
            Some(missing) => REST_COLUMN_COUNTS
                .iter()
                .position(|&count| count == missing)
                .unwrap_or(0),
        }
    }

    /// Slot mapping for `get_row`.
    pub fn row_layout(&self) -> RowLayout {
        RowLayout {
            names: self.columns.iter().map(|c| c.name.clone()).collect(),
        }
    }

    /// Fills `row` with the values of row `index`.
    pub fn get_row(&self, index: usize, row: &mut Row) {
        row.values.clear();
        row.values
            .extend(self.columns.iter().map(|c| c.data.get_f64(index)));
    }

    /// New table with `new[k] = old[indices[k]]` for every column.
    /// Indices may repeat or skip rows.
    pub fn permute_rows(&self, indices: &[usize]) -> Result<DataTable> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.num_rows) {
            return Err(SplatError::IndexOutOfRange {
                index,
                num_rows: self.num_rows,
            });
        }

        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), c.data.gather(indices)))
            .collect();

        Ok(DataTable {
            columns,
            num_rows: indices.len(),
        })
    }

    /// Reorders rows in place; `indices` must be a permutation of all rows.
    pub fn permute_rows_in_place(&mut self, indices: &[usize]) -> Result<()> {
        let cycles = permutation_cycles(indices, self.num_rows)?;
        for column in &mut self.columns {
            column.data.apply_cycles(&cycles);
        }
        Ok(())
    }
}

/// Splits a permutation into cycles, skipping fixed points.
fn permutation_cycles(indices: &[usize], num_rows: usize) -> Result<Vec<Vec<usize>>> {
    if indices.len() != num_rows {
        return Err(SplatError::NotAPermutation(num_rows));
    }

    let mut seen = vec![false; num_rows];
    for &i in indices {
        if i >= num_rows || seen[i] {
            return Err(SplatError::NotAPermutation(num_rows));
        }
        seen[i] = true;
    }

    let mut visited = vec![false; num_rows];
    let mut cycles = Vec::new();
    for start in 0..num_rows {
        if visited[start] || indices[start] == start {
            continue;
        }
        let mut cycle = Vec::new();
        let mut j = start;
        while !visited[j] {
            visited[j] = true;
            cycle.push(j);
            j = indices[j];
        }
        cycles.push(cycle);
    }
    Ok(cycles)
}

/// Concatenates tables row-wise over the union of their columns.
///
/// Columns are ordered by first appearance. A column missing from one input
/// is zero-filled for that input's rows; a name used with two data types is
/// an error.
pub fn combine(tables: &[DataTable]) -> Result<DataTable> {
    let mut schema: Vec<(String, DataType)> = Vec::new();
    for table in tables {
        for column in table.columns() {
            match schema.iter().find(|(name, _)| *name == column.name) {
                Some((_, data_type)) if *data_type != column.data_type() => {
                    return Err(SplatError::DataTypeMismatch {
                        name: column.name.clone(),
                        expected: *data_type,
                        actual: column.data_type(),
                    });
                }
                Some(_) => {}
                None => schema.push((column.name.clone(), column.data_type())),
            }
        }
    }

    let total_rows = tables.iter().map(|t| t.num_rows()).sum();
    let mut combined = DataTable::with_rows(total_rows);
    for (name, data_type) in schema {
        let mut data = ColumnData::with_capacity(data_type, total_rows);
        for table in tables {
            match table.get_column(&name) {
                Some(column) => {
                    data.extend_from(&column.data);
                }
                None => data.extend_zeros(table.num_rows()),
            }
        }
        combined.add_column(Column::new(name, data))?;
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> DataTable {
        DataTable::new(vec![
            Column::from_f32("x", vec![0.0, 1.0, 2.0, 3.0]),
            Column::new("id", ColumnData::UInt32(vec![10, 11, 12, 13])),
        ])
        .unwrap()
    }

    #[test]
    fn test_add_column_rejects_duplicates_and_bad_lengths() {
        let mut table = sample_table();
        assert!(matches!(
            table.add_column(Column::from_f32("x", vec![0.0; 4])),
            Err(SplatError::DuplicateColumn(_))
        ));
        assert!(matches!(
            table.add_column(Column::from_f32("y", vec![0.0; 3])),
            Err(SplatError::ColumnLength { expected: 4, actual: 3, .. })
        ));
        table.add_column(Column::from_f32("y", vec![0.0; 4])).unwrap();
        assert_eq!(table.num_columns(), 3);
    }

    #[test]
    fn test_identity_permutation_keeps_table() {
        let table = sample_table();
        assert_eq!(table.permute_rows(&[0, 1, 2, 3]).unwrap(), table);
    }

    #[test]
    fn test_permutations_compose() {
        let table = sample_table();
        let p = [2, 0, 3, 1];
        let q = [1, 3, 0, 2];
        let composed: Vec<usize> = q.iter().map(|&i| p[i]).collect();

        let twice = table.permute_rows(&p).unwrap().permute_rows(&q).unwrap();
        assert_eq!(twice, table.permute_rows(&composed).unwrap());
    }

    #[test]
    fn test_empty_filter_keeps_column_set() {
        let table = sample_table();
        let empty = table.permute_rows(&[]).unwrap();
        assert_eq!(empty.num_rows(), 0);
        assert_eq!(empty.column_names().collect::<Vec<_>>(), vec!["x", "id"]);
    }

    #[test]
    fn test_permute_rejects_out_of_range() {
        let table = sample_table();
        assert!(matches!(
            table.permute_rows(&[4]),
            Err(SplatError::IndexOutOfRange { index: 4, num_rows: 4 })
        ));
    }

    #[test]
    fn test_in_place_matches_copying_permute() {
        let table = sample_table();
        let p = [3, 0, 1, 2];
        let mut in_place = table.clone();
        in_place.permute_rows_in_place(&p).unwrap();
        assert_eq!(in_place, table.permute_rows(&p).unwrap());
    }

    #[test]
    fn test_in_place_requires_permutation() {
        let mut table = sample_table();
        assert!(table.permute_rows_in_place(&[0, 0, 1, 2]).is_err());
        assert!(table.permute_rows_in_place(&[0, 1]).is_err());
    }

    #[test]
    fn test_get_row_follows_layout() {
        let table = sample_table();
        let layout = table.row_layout();
        let mut row = Row::default();
        table.get_row(2, &mut row);
        assert_eq!(row.get(layout.slot("x").unwrap()), 2.0);
        assert_eq!(row.get(layout.slot("id").unwrap()), 12.0);
    }

    #[test]
    fn test_combine_zero_fills_missing_columns() {
        let a = sample_table();
        let b = DataTable::new(vec![
            Column::from_f32("x", vec![7.0]),
            Column::from_f32("lod", vec![-1.0]),
        ])
        .unwrap();

        let combined = combine(&[a, b]).unwrap();
        assert_eq!(combined.num_rows(), 5);
        assert_eq!(
            combined.column_names().collect::<Vec<_>>(),
            vec!["x", "id", "lod"]
        );
        assert_eq!(
            combined.f32_column("lod").unwrap(),
            &[0.0, 0.0, 0.0, 0.0, -1.0]
        );
        assert_eq!(combined.column("id").unwrap().as_u32().unwrap()[4], 0);
    }

    #[test]
    fn test_sh_bands_from_first_missing_rest_column() {
        let with_rest = |count: usize| {
            let columns = (0..count)
                .map(|i| Column::from_f32(sh_rest_name(i), vec![0.0]))
                .collect();
            DataTable::new(columns).unwrap()
        };
        assert_eq!(with_rest(0).sh_bands(), 0);
        assert_eq!(with_rest(9).sh_bands(), 1);
        assert_eq!(with_rest(24).sh_bands(), 2);
        assert_eq!(with_rest(45).sh_bands(), 3);
        assert_eq!(with_rest(10).sh_bands(), 0);
    }

    #[test]
    fn test_combine_rejects_type_conflicts() {
        let a = sample_table();
        let b = DataTable::new(vec![Column::new("x", ColumnData::UInt8(vec![1]))]).unwrap();
        assert!(matches!(
            combine(&[a, b]),
            Err(SplatError::DataTypeMismatch { .. })
        ));
    }
}
