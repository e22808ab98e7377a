use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::SimulationInput;

const KEY_PREFIX: &str = "mc:";

/// Content-derived cache key.
///
/// Two inputs with identical simulation parameters always produce the same
/// key, whatever goal or user they came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_input(input: &SimulationInput) -> Self {
        // Field order is fixed by the struct and the allocation is sorted,
        // so the JSON form is canonical. Floats print as their shortest
        // round-trip representation, which is unique per bit pattern.
        let bytes = serde_json::to_vec(input)
            .unwrap_or_else(|_| format!("{input:?}").into_bytes());
        Self(format!("{KEY_PREFIX}{}", blake3::hash(&bytes).to_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key matches a glob with `*` wildcards
    pub fn matches(&self, pattern: &str) -> bool {
        glob_match(pattern, &self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// `*` matches any run of characters (including none); everything else is
/// literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_ti = 0;

    while ti < t.len() {
        if pi < p.len() && p[pi] != '*' && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AllocationStrategy, AssetAllocation, AssetClass, ContributionPattern, ReturnDistribution,
    };

    fn input() -> SimulationInput {
        SimulationInput {
            initial_amount: 1_000.0,
            years: 5,
            contribution_pattern: ContributionPattern::none(),
            allocation_strategy: AllocationStrategy::new(vec![AssetAllocation {
                asset_class: AssetClass::Equity,
                weight: 1.0,
                mean_return: 0.1,
                volatility: 0.2,
            }]),
            target_amount: 2_000.0,
            partial_threshold_ratio: 0.8,
            distribution: ReturnDistribution::LogNormal,
            iteration_count: 100,
            random_seed: Some(42),
        }
    }

    #[test]
    fn test_key_is_stable_and_prefixed() {
        let a = CacheKey::from_input(&input());
        let b = CacheKey::from_input(&input());
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("mc:"));
        assert_eq!(a.as_str().len(), 3 + 64);
    }

    #[test]
    fn test_key_changes_with_parameters() {
        let base = CacheKey::from_input(&input());

        let mut other = input();
        other.target_amount = 2_000.000_001;
        assert_ne!(CacheKey::from_input(&other), base);

        let mut other = input();
        other.random_seed = Some(43);
        assert_ne!(CacheKey::from_input(&other), base);

        assert_ne!(CacheKey::from_input(&input().with_iterations(101)), base);
    }

    #[test]
    fn test_glob_matching() {
        assert!(glob_match("*", "mc:abc"));
        assert!(glob_match("mc:*", "mc:abc"));
        assert!(glob_match("*bc", "mc:abc"));
        assert!(glob_match("mc:*b*", "mc:abc"));
        assert!(glob_match("mc:abc", "mc:abc"));
        assert!(!glob_match("mc:abd", "mc:abc"));
        assert!(!glob_match("sc:*", "mc:abc"));
        assert!(glob_match("", ""));
        assert!(!glob_match("", "x"));
    }
}
