//! Row-major embedding matrix backing the vector index.

/// A dense `rows × dimensions` matrix of `f32`, stored as one flat buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingMatrix {
    dimensions: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Create an empty matrix whose rows have `dimensions` columns.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, data: Vec::new() }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored rows.
    pub fn rows(&self) -> usize {
        if self.dimensions == 0 { 0 } else { self.data.len() / self.dimensions }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow row `i`, if it exists.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        let start = i.checked_mul(self.dimensions)?;
        self.data.get(start..start + self.dimensions)
    }

    /// Iterate over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimensions.max(1))
    }

    /// Append rows. Callers must have checked every row's length.
    pub(crate) fn extend_rows<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = Vec<f32>>,
    {
        for row in rows {
            debug_assert_eq!(row.len(), self.dimensions);
            self.data.extend_from_slice(&row);
        }
    }

    /// Keep only rows whose flag is `true`, preserving their relative order.
    ///
    /// `keep` must have exactly [`rows()`](Self::rows) entries.
    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        assert_eq!(keep.len(), self.rows(), "row mask length does not match matrix");
        let dims = self.dimensions;
        let mut write = 0;
        for (read, &kept) in keep.iter().enumerate() {
            if !kept {
                continue;
            }
            if write != read {
                self.data.copy_within(read * dims..(read + 1) * dims, write * dims);
            }
            write += 1;
        }
        self.data.truncate(write * dims);
    }
}

/// Cosine similarity between two vectors.
///
/// Returns `NaN` when either vector has zero magnitude or the lengths differ;
/// callers decide how to rank that.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::NAN;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b)
}
