//! Appearance embeddings and the similarity measure used to compare them.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Fixed-length appearance feature vector produced by a feature embedder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Array1<f32>);

impl Embedding {
    pub fn new(values: Array1<f32>) -> Self {
        Self(values)
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn view(&self) -> ArrayView1<'_, f32> {
        self.0.view()
    }

    pub fn as_array(&self) -> &Array1<f32> {
        &self.0
    }

    pub fn norm(&self) -> f32 {
        self.0.dot(&self.0).sqrt()
    }

    /// True when every component is finite and the vector is non-empty.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|v| v.is_finite())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(Array1::from(values))
    }
}

impl From<Array1<f32>> for Embedding {
    fn from(values: Array1<f32>) -> Self {
        Self(values)
    }
}

/// Cosine similarity in [-1, 1]. A zero-norm operand yields 0.0.
///
/// Operands must have the same dimension.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f32 {
    debug_assert_eq!(a.dim(), b.dim());
    let denom = a.norm() * b.norm();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    (a.0.dot(&b.0) / denom).clamp(-1.0, 1.0)
}

/// Mean of the per-row cosine similarities between `query` and `window`.
///
/// `window` holds one historical embedding per row. Each row contributes on its
/// own; rows are never pooled into a single vector first. Returns `None` for an
/// empty window.
pub fn mean_cosine_similarity(query: &Embedding, window: ArrayView2<'_, f32>) -> Option<f32> {
    let rows = window.nrows();
    if rows == 0 {
        return None;
    }
    debug_assert_eq!(window.ncols(), query.dim());

    let query_norm = query.norm();
    let dots = window.dot(&query.0);
    let row_norms = window.map_axis(Axis(1), |row| row.dot(&row).sqrt());

    let total: f32 = dots
        .iter()
        .zip(row_norms.iter())
        .map(|(&dot, &norm)| {
            let denom = norm * query_norm;
            if denom <= f32::EPSILON {
                0.0
            } else {
                (dot / denom).clamp(-1.0, 1.0)
            }
        })
        .sum();

    Some(total / rows as f32)
}
