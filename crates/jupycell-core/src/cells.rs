//! Numbered code cells belonging to one kernel.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::message::Output;

/// A code cell and the outputs of its most recent execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    /// Source code.
    pub code: String,
    /// Outputs of the last execution of the current code.
    pub outputs: Vec<Output>,
    /// Unique within the store; changes on every add and edit so stale
    /// results can be told apart.
    pub revision: u64,
}

/// Cells of one kernel, keyed by cell number.
///
/// Iteration order is ascending by number, which is also the run-all order.
#[derive(Debug, Default)]
pub struct CellStore {
    cells: BTreeMap<i64, Cell>,
    /// Last revision handed out. Never reused, even across delete and re-add.
    revision: u64,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new cell with no outputs.
    pub fn add(&mut self, number: i64, code: String) -> Result<()> {
        if self.cells.contains_key(&number) {
            return Err(Error::DuplicateCell(number));
        }
        let revision = self.next_revision();
        self.cells.insert(
            number,
            Cell {
                code,
                outputs: Vec::new(),
                revision,
            },
        );
        Ok(())
    }

    /// Replace a cell's code, discarding its outputs.
    pub fn edit(&mut self, number: i64, code: String) -> Result<()> {
        let cell = self.cells.get_mut(&number).ok_or(Error::UnknownCell(number))?;
        self.revision += 1;
        cell.code = code;
        cell.outputs.clear();
        cell.revision = self.revision;
        Ok(())
    }

    /// Remove a cell.
    pub fn delete(&mut self, number: i64) -> Result<Cell> {
        self.cells.remove(&number).ok_or(Error::UnknownCell(number))
    }

    /// Get a cell.
    pub fn get(&self, number: i64) -> Result<&Cell> {
        self.cells.get(&number).ok_or(Error::UnknownCell(number))
    }

    /// Outputs of the cell's last execution.
    pub fn get_outputs(&self, number: i64) -> Result<&[Output]> {
        self.get(number).map(|cell| cell.outputs.as_slice())
    }

    /// Code and revision to execute for a cell.
    pub fn snapshot(&self, number: i64) -> Result<(String, u64)> {
        self.get(number).map(|cell| (cell.code.clone(), cell.revision))
    }

    /// Store execution outputs if the cell is still at `revision`.
    ///
    /// Returns `false` when the cell was edited or deleted in the meantime.
    pub fn store_outputs(&mut self, number: i64, revision: u64, outputs: Vec<Output>) -> bool {
        match self.cells.get_mut(&number) {
            Some(cell) if cell.revision == revision => {
                cell.outputs = outputs;
                true
            }
            _ => false,
        }
    }

    /// All cells in ascending numeric order.
    pub fn all(&self) -> impl Iterator<Item = (i64, &Cell)> {
        self.cells.iter().map(|(number, cell)| (*number, cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}
