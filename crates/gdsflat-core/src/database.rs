use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cell::Cell;

/// An immutable GDSII library, as reconstructed from a stream (spec.md §3
/// "Database"). Cells are kept in load order; a name→index map is built
/// once so SRef/AREF resolution during flattening never linear-scans.
#[derive(Debug, Serialize, Deserialize)]
pub struct Database {
    pub version: u16,
    pub uu_per_dbunit: f64,
    pub meter_per_dbunit: f64,
    pub raw_units: [u8; 16],
    pub libnames: Vec<String>,
    cells: Vec<Cell>,
    #[serde(skip)]
    index_by_name: HashMap<String, usize>,
}

impl Database {
    pub fn new() -> Self {
        Self {
            version: 0,
            uu_per_dbunit: 0.0,
            meter_per_dbunit: 0.0,
            raw_units: [0u8; 16],
            libnames: Vec::new(),
            cells: Vec::new(),
            index_by_name: HashMap::new(),
        }
    }

    /// Append a cell, overwriting the name→index mapping if a cell of the
    /// same name already exists. Per spec.md §9's resolved open question:
    /// the last definition of a duplicated name wins for lookups, but the
    /// earlier definition is not removed from storage.
    pub fn add_cell(&mut self, cell: Cell) {
        if let Some(&existing) = self.index_by_name.get(&cell.name) {
            log::warn!(
                "cell '{}' redefined (previous definition at index {} is now unreachable by name)",
                cell.name,
                existing
            );
        }
        let idx = self.cells.len();
        self.index_by_name.insert(cell.name.clone(), idx);
        self.cells.push(cell);
    }

    pub fn find_cell(&self, name: &str) -> Option<&Cell> {
        self.index_by_name.get(name).map(|&idx| &self.cells[idx])
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn all_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// All cell names in storage order (spec.md §6 `all_cells`).
    pub fn all_cell_names(&self) -> Vec<&str> {
        self.cells.iter().map(|c| c.name.as_str()).collect()
    }

    /// Cells not referenced by any SRef/AREF target in the database
    /// (spec.md §4.5), in storage order.
    pub fn top_cells(&self) -> Vec<&str> {
        let mut referenced: std::collections::HashSet<&str> = std::collections::HashSet::new();
        for cell in &self.cells {
            for sref in &cell.srefs {
                referenced.insert(sref.target.as_str());
            }
            for aref in &cell.arefs {
                referenced.insert(aref.target.as_str());
            }
        }
        self.cells
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| !referenced.contains(name))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut db: Self = serde_json::from_str(json)?;
        db.index_by_name = db
            .cells
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Ok(db)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_cells_excludes_referenced() {
        use crate::cell::SRef;
        use crate::geometry::Pair;

        let mut db = Database::new();
        let mut top = Cell::new("TOP");
        top.srefs.push(SRef {
            target: "CHILD".into(),
            origin: Pair::new(0, 0),
            mag: 1.0,
            angle_deg: 0.0,
            mirror: false,
        });
        db.add_cell(top);
        db.add_cell(Cell::new("CHILD"));

        assert_eq!(db.top_cells(), vec!["TOP"]);
    }

    #[test]
    fn duplicate_name_last_wins() {
        let mut db = Database::new();
        db.add_cell(Cell::new("X"));
        let mut second = Cell::new("X");
        second.boundaries.push(crate::cell::Boundary {
            layer: 1,
            vertices: vec![],
        });
        db.add_cell(second);

        assert_eq!(db.cell_count(), 2);
        assert_eq!(db.find_cell("X").unwrap().boundaries.len(), 1);
    }
}
