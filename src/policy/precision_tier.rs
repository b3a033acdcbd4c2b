//! 4.5.1 precision-tier: carbon-insensitive baseline, the control in experiments
//! and the floor of the fallback chain.

use super::{baseline, PolicyResult};
use crate::flavour::FlavourProfile;
use std::collections::HashMap;

pub(super) fn evaluate(flavours: &[FlavourProfile]) -> PolicyResult {
    let mut weights = HashMap::with_capacity(flavours.len());
    for f in flavours {
        weights.insert(f.name.clone(), 0.0);
    }
    let base = baseline(flavours);
    weights.insert(base.name.clone(), 1.0);

    PolicyResult {
        weights,
        expected_precision: base.precision,
        diagnostics: HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_all_weight_to_highest_precision() {
        let flavours = vec![
            FlavourProfile::new("a", 1.0, 200.0),
            FlavourProfile::new("b", 0.7, 80.0),
        ];
        let result = evaluate(&flavours);
        assert_eq!(result.weights.get("a"), Some(&1.0));
        assert_eq!(result.weights.get("b"), Some(&0.0));
        assert_eq!(result.expected_precision, 1.0);
    }
}
