//! Boundary rows of streets.
//!
//! A street can run through several sibling boundaries of the same level
//! (two municipalities, say). Instead of one flat list it keeps one row
//! per consistent containment chain. Boundaries are added outer to inner.

/// Boundary rows of one street, as boundary arena positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryRows {
    rows: Vec<Vec<usize>>,
}

impl BoundaryRows {
    /// The rows, each ordered outer to inner.
    #[must_use]
    pub fn rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    /// Whether no boundary was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn branch(&mut self, from: usize, boundary: usize) {
        let mut row = self.rows[from].clone();
        row.pop();
        row.push(boundary);
        self.rows.push(row);
    }

    /// Adds `boundary` of level `level`.
    ///
    /// A boundary with the same positive level as a row's last boundary is
    /// its sibling: the row is branched (cloned without its last element,
    /// then extended). With a single row and no sibling, the boundary is
    /// appended. With several rows and no sibling, it is appended to every
    /// row whose last boundary contains the new boundary's centroid, as
    /// answered by `last_contains_centroid`.
    pub fn add(
        &mut self,
        boundary: usize,
        level: i32,
        level_of: impl Fn(usize) -> i32,
        last_contains_centroid: impl Fn(usize) -> bool,
    ) {
        let is_sibling = |row: &Vec<usize>| {
            level > 0 && row.last().is_some_and(|&last| level_of(last) == level)
        };

        match self.rows.len() {
            0 => self.rows.push(vec![boundary]),
            1 => {
                if is_sibling(&self.rows[0]) {
                    self.branch(0, boundary);
                } else {
                    self.rows[0].push(boundary);
                }
            }
            _ => {
                if let Some(from) = self.rows.iter().position(is_sibling) {
                    self.branch(from, boundary);
                } else {
                    for row in &mut self.rows {
                        if row.last().is_some_and(|&last| last_contains_centroid(last)) {
                            row.push(boundary);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: &[i32] = &[4, 8, 8, 9, 8, 0];

    fn level_of(boundary: usize) -> i32 {
        LEVELS[boundary]
    }

    fn add(rows: &mut BoundaryRows, boundary: usize, contains: impl Fn(usize) -> bool) {
        rows.add(boundary, level_of(boundary), level_of, contains);
    }

    #[test]
    fn same_level_siblings_branch() {
        let mut rows = BoundaryRows::default();
        add(&mut rows, 0, |_| true);
        add(&mut rows, 1, |_| true);
        add(&mut rows, 2, |_| true);

        assert_eq!(rows.rows(), &[vec![0, 1], vec![0, 2]]);
    }

    #[test]
    fn nested_levels_make_one_row() {
        let mut rows = BoundaryRows::default();
        add(&mut rows, 1, |_| true);
        add(&mut rows, 3, |_| true);

        assert_eq!(rows.rows(), &[vec![1, 3]]);
    }

    #[test]
    fn third_sibling_branches_from_first_matching_row() {
        let mut rows = BoundaryRows::default();
        add(&mut rows, 0, |_| true);
        add(&mut rows, 1, |_| true);
        add(&mut rows, 2, |_| true);
        add(&mut rows, 4, |_| true);

        assert_eq!(rows.rows(), &[vec![0, 1], vec![0, 2], vec![0, 4]]);
    }

    #[test]
    fn inner_boundary_joins_only_containing_rows() {
        let mut rows = BoundaryRows::default();
        add(&mut rows, 0, |_| true);
        add(&mut rows, 1, |_| true);
        add(&mut rows, 2, |_| true);
        add(&mut rows, 3, |last| last == 2);

        assert_eq!(rows.rows(), &[vec![0, 1], vec![0, 2, 3]]);
    }

    #[test]
    fn level_zero_never_branches() {
        let mut rows = BoundaryRows::default();
        add(&mut rows, 5, |_| true);
        add(&mut rows, 5, |_| true);

        assert_eq!(rows.rows(), &[vec![5, 5]]);
    }
}
