//! Parameters supplied by the host application.
//!
//! Every value the engine reads from outside is listed up front in a
//! [`ParameterPlan`] and resolved once per analysis. The result records where
//! each value came from, which makes the dependency on the host auditable and
//! easy to fake in tests.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::ParameterServiceUnavailable;
use crate::model::AssetClass;

/// Well-known parameter paths
pub mod paths {
    use crate::model::AssetClass;

    pub const INFLATION_GENERAL: &str = "inflation.general";
    pub const WITHDRAWAL_RATE: &str = "retirement.withdrawal_rate";
    pub const CONTRIBUTION_GROWTH_RATE: &str = "contribution.growth_rate";
    pub const FREQUENCY_FACTOR_MONTHLY: &str = "contribution.frequency_factor.monthly";
    pub const FREQUENCY_FACTOR_ANNUAL: &str = "contribution.frequency_factor.annual";
    pub const FREQUENCY_FACTOR_LUMPSUM: &str = "contribution.frequency_factor.lumpsum";
    pub const EQUITY_LTCG_RATE: &str = "tax.equity_ltcg_rate";
    pub const GOLD_LTCG_RATE: &str = "tax.gold_ltcg_rate";
    pub const PARTIAL_SUCCESS_RATIO: &str = "simulation.partial_success_ratio";

    pub fn asset_return_mean(asset_class: AssetClass) -> String {
        format!("asset_returns.{asset_class}.value")
    }

    pub fn asset_return_volatility(asset_class: AssetClass) -> String {
        format!("asset_returns.{asset_class}.volatility")
    }
}

pub const DEFAULT_INFLATION: f64 = 0.06;
pub const DEFAULT_WITHDRAWAL_RATE: f64 = 0.04;
pub const DEFAULT_CONTRIBUTION_GROWTH: f64 = 0.0;
pub const DEFAULT_LTCG_RATE: f64 = 0.125;

/// Source of externally administered parameters.
pub trait FinancialParameterService: Send + Sync {
    /// Value at a dotted `path`, `Ok(None)` when the service has none.
    fn get_parameter(
        &self,
        path: &str,
        profile_id: Option<&str>,
    ) -> Result<Option<f64>, ParameterServiceUnavailable>;

    /// Value at `path`, or `default` when absent, non-finite or the service
    /// is down.
    fn get_parameter_or(&self, path: &str, default: f64, profile_id: Option<&str>) -> f64 {
        match self.get_parameter(path, profile_id) {
            Ok(Some(value)) if value.is_finite() => value,
            _ => default,
        }
    }
}

/// In-memory parameter table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticParameters {
    values: FxHashMap<String, f64>,
}

impl StaticParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, path: impl Into<String>, value: f64) -> Self {
        self.insert(path, value);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, value: f64) {
        self.values.insert(path.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StaticParameters {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl FinancialParameterService for StaticParameters {
    fn get_parameter(
        &self,
        path: &str,
        _profile_id: Option<&str>,
    ) -> Result<Option<f64>, ParameterServiceUnavailable> {
        Ok(self.values.get(path).copied())
    }
}

/// One value to resolve: a key, the paths to try in order, and a fallback
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRequest {
    pub key: String,
    pub paths: Vec<String>,
    pub default: Option<f64>,
}

impl ParameterRequest {
    /// Request looked up at `key` itself
    pub fn new(key: impl Into<String>, default: Option<f64>) -> Self {
        let key = key.into();
        Self {
            paths: vec![key.clone()],
            key,
            default,
        }
    }

    /// Also try `path` if the earlier paths have no value
    #[must_use]
    pub fn alias(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum ParameterSource {
    Service(String),
    Default,
    Unset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameter {
    pub value: Option<f64>,
    pub source: ParameterSource,
}

/// Ordered list of everything an analysis reads from the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterPlan {
    requests: Vec<ParameterRequest>,
}

impl ParameterPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters used by goal analysis
    pub fn standard() -> Self {
        let mut plan = Self::new()
            .request(
                ParameterRequest::new(paths::INFLATION_GENERAL, Some(DEFAULT_INFLATION))
                    .alias("inflation.rate"),
            )
            .request(ParameterRequest::new(
                paths::WITHDRAWAL_RATE,
                Some(DEFAULT_WITHDRAWAL_RATE),
            ))
            .request(ParameterRequest::new(
                paths::CONTRIBUTION_GROWTH_RATE,
                Some(DEFAULT_CONTRIBUTION_GROWTH),
            ))
            .request(
                ParameterRequest::new(paths::FREQUENCY_FACTOR_MONTHLY, Some(1.0))
                    .alias("contribution.sip_factor"),
            )
            .request(ParameterRequest::new(paths::FREQUENCY_FACTOR_ANNUAL, Some(1.0)))
            .request(ParameterRequest::new(paths::FREQUENCY_FACTOR_LUMPSUM, Some(1.0)))
            .request(ParameterRequest::new(
                paths::EQUITY_LTCG_RATE,
                Some(DEFAULT_LTCG_RATE),
            ))
            .request(ParameterRequest::new(paths::GOLD_LTCG_RATE, Some(DEFAULT_LTCG_RATE)))
            .request(ParameterRequest::new(paths::PARTIAL_SUCCESS_RATIO, None));

        // No default: an absent override means "use the return table"
        for class in AssetClass::ALL {
            plan = plan
                .request(
                    ParameterRequest::new(paths::asset_return_mean(class), None)
                        .alias(format!("asset_returns.{class}.mean")),
                )
                .request(ParameterRequest::new(paths::asset_return_volatility(class), None));
        }
        plan
    }

    #[must_use]
    pub fn request(mut self, request: ParameterRequest) -> Self {
        self.requests.push(request);
        self
    }

    pub fn requests(&self) -> &[ParameterRequest] {
        &self.requests
    }

    /// Resolve every request. An unavailable service is reported once and
    /// the remaining requests use their defaults.
    pub fn resolve(
        &self,
        service: Option<&dyn FinancialParameterService>,
        profile_id: Option<&str>,
    ) -> ResolvedParameters {
        let mut service = service;
        let mut values = FxHashMap::default();

        for request in &self.requests {
            let mut found = None;
            if let Some(svc) = service {
                for path in &request.paths {
                    match svc.get_parameter(path, profile_id) {
                        Ok(Some(value)) if value.is_finite() => {
                            found = Some((value, path.clone()));
                            break;
                        }
                        Ok(Some(value)) => {
                            tracing::warn!(path, value, "Ignoring non-finite parameter");
                        }
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(
                                path,
                                error = %err,
                                "Parameter service unavailable, using built-in defaults"
                            );
                            service = None;
                            break;
                        }
                    }
                }
            }

            let resolved = match (found, request.default) {
                (Some((value, path)), _) => ResolvedParameter {
                    value: Some(value),
                    source: ParameterSource::Service(path),
                },
                (None, Some(default)) => ResolvedParameter {
                    value: Some(default),
                    source: ParameterSource::Default,
                },
                (None, None) => ResolvedParameter {
                    value: None,
                    source: ParameterSource::Unset,
                },
            };
            tracing::debug!(key = %request.key, value = ?resolved.value, source = ?resolved.source, "Resolved parameter");
            values.insert(request.key.clone(), resolved);
        }

        ResolvedParameters { values }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParameters {
    values: FxHashMap<String, ResolvedParameter>,
}

impl ResolvedParameters {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(|r| r.value)
    }

    pub fn value_or(&self, key: &str, fallback: f64) -> f64 {
        self.get(key).unwrap_or(fallback)
    }

    pub fn source(&self, key: &str) -> Option<&ParameterSource> {
        self.values.get(key).map(|r| &r.source)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct DownService {
        calls: AtomicUsize,
    }

    impl FinancialParameterService for DownService {
        fn get_parameter(
            &self,
            _path: &str,
            _profile_id: Option<&str>,
        ) -> Result<Option<f64>, ParameterServiceUnavailable> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(ParameterServiceUnavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_defaults_without_service() {
        let resolved = ParameterPlan::standard().resolve(None, None);
        assert_eq!(resolved.get(paths::INFLATION_GENERAL), Some(DEFAULT_INFLATION));
        assert_eq!(resolved.get(paths::WITHDRAWAL_RATE), Some(0.04));
        assert_eq!(
            resolved.source(paths::INFLATION_GENERAL),
            Some(&ParameterSource::Default)
        );
        assert_eq!(resolved.get(&paths::asset_return_mean(AssetClass::Equity)), None);
    }

    #[test]
    fn test_service_value_and_alias() {
        let service = StaticParameters::new()
            .with("inflation.rate", 0.05)
            .with("asset_returns.equity.value", 0.11);
        let resolved = ParameterPlan::standard().resolve(Some(&service), Some("p1"));

        assert_eq!(resolved.get(paths::INFLATION_GENERAL), Some(0.05));
        assert_eq!(
            resolved.source(paths::INFLATION_GENERAL),
            Some(&ParameterSource::Service("inflation.rate".to_string()))
        );
        assert_eq!(resolved.get(&paths::asset_return_mean(AssetClass::Equity)), Some(0.11));
    }

    #[test]
    fn test_first_path_wins() {
        let service = StaticParameters::new()
            .with("inflation.general", 0.04)
            .with("inflation.rate", 0.09);
        let resolved = ParameterPlan::standard().resolve(Some(&service), None);
        assert_eq!(resolved.get(paths::INFLATION_GENERAL), Some(0.04));
    }

    #[test]
    fn test_unavailable_service_is_queried_once() {
        let service = DownService::default();
        let resolved = ParameterPlan::standard().resolve(Some(&service), None);
        assert_eq!(service.calls.load(Ordering::Relaxed), 1);
        assert_eq!(resolved.get(paths::WITHDRAWAL_RATE), Some(DEFAULT_WITHDRAWAL_RATE));
        assert_eq!(service.get_parameter_or("x", 1.5, None), 1.5);
    }

    #[test]
    fn test_non_finite_values_fall_back() {
        let service = StaticParameters::new().with(paths::INFLATION_GENERAL, f64::NAN);
        let resolved = ParameterPlan::standard().resolve(Some(&service), None);
        assert_eq!(resolved.get(paths::INFLATION_GENERAL), Some(DEFAULT_INFLATION));
        assert_eq!(service.get_parameter_or(paths::INFLATION_GENERAL, 0.02, None), 0.02);
    }
}
