//! Multiple-testing correction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PAdjustMethod {
    #[default]
    BenjaminiHochberg,
    Bonferroni,
}

pub fn adjust_p_values(p_values: &[f64], method: PAdjustMethod) -> Vec<f64> {
    match method {
        PAdjustMethod::BenjaminiHochberg => benjamini_hochberg(p_values),
        PAdjustMethod::Bonferroni => bonferroni(p_values),
    }
}

/// Benjamini–Hochberg step-up adjusted p-values, returned in input order.
/// Non-finite inputs are treated as 1.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len();
    if m == 0 {
        return Vec::new();
    }
    let p: Vec<f64> = p_values.iter().map(|&x| sanitise(x)).collect();

    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| p[a].total_cmp(&p[b]).then(a.cmp(&b)));

    let mut adjusted = vec![1.0; m];
    let mut running_min = 1.0f64;
    for (pos, &idx) in order.iter().enumerate().rev() {
        let rank = (pos + 1) as f64;
        running_min = running_min.min(p[idx] * m as f64 / rank);
        adjusted[idx] = running_min.clamp(0.0, 1.0);
    }
    adjusted
}

pub fn bonferroni(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len() as f64;
    p_values.iter().map(|&x| (sanitise(x) * m).min(1.0)).collect()
}

fn sanitise(p: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bh_matches_reference() {
        // Reference values from R: p.adjust(c(0.01, 0.04, 0.03, 0.005), "BH")
        let adj = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.005]);
        let expected = [0.02, 0.04, 0.04, 0.02];
        for (a, e) in adj.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{a} vs {e}");
        }
    }

    #[test]
    fn test_bh_is_monotone_and_bounded() {
        let p = [0.9, 0.5, 0.001, 0.2, f64::NAN];
        let adj = benjamini_hochberg(&p);
        assert_eq!(adj[4], 1.0);
        assert!(adj.iter().all(|&x| (0.0..=1.0).contains(&x)));
        for (raw, a) in p.iter().zip(&adj) {
            if raw.is_finite() {
                assert!(a >= raw);
            }
        }
    }

    #[test]
    fn test_bonferroni_caps_at_one() {
        assert_eq!(bonferroni(&[0.01, 0.6]), vec![0.02, 1.0]);
        assert_eq!(adjust_p_values(&[], PAdjustMethod::Bonferroni), Vec::<f64>::new());
    }
}
