//! Gene-gene correlation matrix over the universe.

use rayon::prelude::*;

use linchpin_common::ExpressionMatrix;
use linchpin_stats::{correlate, CorrelationMethod};

/// Dense symmetric correlation matrix with unit diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    genes: Vec<String>,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.genes.len() + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.genes.len();
        &self.values[i * n..(i + 1) * n]
    }
}

/// Correlate every pair of `genes` over the sample axis. Genes absent from
/// the matrix correlate 0 with everything.
pub fn correlation_matrix(
    genes: &[String],
    expression: &ExpressionMatrix,
    method: CorrelationMethod,
) -> CorrelationMatrix {
    let n = genes.len();
    let rows: Vec<Option<&[f64]>> = genes.iter().map(|g| expression.gene_values(g)).collect();

    // Upper triangle, one row per task.
    let upper: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..n)
                .map(|j| match (rows[i], rows[j]) {
                    (Some(x), Some(y)) => correlate(method, x, y),
                    _ => 0.0,
                })
                .collect()
        })
        .collect();

    let mut values = vec![0.0; n * n];
    for i in 0..n {
        values[i * n + i] = 1.0;
        for (offset, &r) in upper[i].iter().enumerate() {
            let j = i + 1 + offset;
            values[i * n + j] = r;
            values[j * n + i] = r;
        }
    }
    CorrelationMatrix { genes: genes.to_vec(), values }
}
