use crate::model::ImportError;

/// Per-page buffer of row failures.
///
/// Holds at most one entry per row: a second cause for a row already present
/// is appended to that entry's message. Drained after every page.
#[derive(Debug, Default)]
pub struct ImportErrorsContext {
    errors: Vec<ImportError>,
}

impl ImportErrorsContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_row(&self, row: usize) -> bool {
        self.errors.iter().any(|e| e.row == row)
    }

    /// Add a failure, merging it into an existing entry for the same row.
    /// Returns `true` when the row was not reported before.
    pub fn add(&mut self, error: ImportError) -> bool {
        match self.errors.iter_mut().find(|e| e.row == error.row) {
            Some(existing) => {
                if !existing.error.contains(&error.error) {
                    existing.error.push(' ');
                    existing.error.push_str(&error.error);
                }
                false
            }
            None => {
                self.errors.push(error);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Take every buffered failure in ascending row order.
    pub fn drain_ordered(&mut self) -> Vec<ImportError> {
        let mut errors = std::mem::take(&mut self.errors);
        errors.sort_by_key(|e| e.row);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(row: usize, message: &str) -> ImportError {
        ImportError {
            row,
            raw_row: format!("raw {row}"),
            error: message.to_string(),
        }
    }

    #[test]
    fn merges_causes_for_the_same_row() {
        let mut ctx = ImportErrorsContext::new();
        assert!(ctx.add(error(3, "first.")));
        assert!(!ctx.add(error(3, "second.")));
        assert!(!ctx.add(error(3, "second.")));

        let drained = ctx.drain_ordered();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].error, "first. second.");
    }

    #[test]
    fn drains_in_row_order_and_clears() {
        let mut ctx = ImportErrorsContext::new();
        ctx.add(error(9, "late"));
        ctx.add(error(2, "early"));
        ctx.add(error(5, "middle"));

        let rows: Vec<usize> = ctx.drain_ordered().iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![2, 5, 9]);
        assert!(ctx.is_empty());
    }
}
