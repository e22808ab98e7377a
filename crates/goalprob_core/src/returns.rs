//! Annual return assumptions per asset class.
//!
//! The built-in tables are long-run arithmetic means and standard deviations
//! of annual returns. India figures follow the usual planner assumptions for
//! Nifty-style equity, gilt/corporate debt funds, domestic gold prices and
//! residential property. Global figures are USD-centric.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::UnknownAssetClass;
use crate::model::{AssetClass, Locale, MarketContext};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetReturnParams {
    pub mean: f64,
    pub volatility: f64,
}

impl AssetReturnParams {
    pub const fn new(mean: f64, volatility: f64) -> Self {
        Self { mean, volatility }
    }
}

/// Built-in (mean, volatility) for a locale, before regime adjustment
pub const fn default_params(locale: Locale, asset_class: AssetClass) -> AssetReturnParams {
    match (locale, asset_class) {
        (Locale::India, AssetClass::Equity) => AssetReturnParams::new(0.12, 0.18),
        (Locale::India, AssetClass::Debt) => AssetReturnParams::new(0.07, 0.05),
        (Locale::India, AssetClass::Gold) => AssetReturnParams::new(0.08, 0.15),
        (Locale::India, AssetClass::Cash) => AssetReturnParams::new(0.04, 0.01),
        (Locale::India, AssetClass::RealEstate) => AssetReturnParams::new(0.09, 0.12),
        (Locale::Global, AssetClass::Equity) => AssetReturnParams::new(0.08, 0.16),
        (Locale::Global, AssetClass::Debt) => AssetReturnParams::new(0.04, 0.06),
        (Locale::Global, AssetClass::Gold) => AssetReturnParams::new(0.05, 0.15),
        (Locale::Global, AssetClass::Cash) => AssetReturnParams::new(0.02, 0.01),
        (Locale::Global, AssetClass::RealEstate) => AssetReturnParams::new(0.06, 0.12),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ReturnOverride {
    mean: Option<f64>,
    volatility: Option<f64>,
}

/// Lookup of return parameters with optional per-class overrides.
///
/// Overrides replace the long-run table value; the market regime is applied
/// on top of whichever value is in effect.
#[derive(Debug, Clone, Default)]
pub struct AssetReturnModel {
    overrides: FxHashMap<AssetClass, ReturnOverride>,
}

impl AssetReturnModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override mean and/or volatility for one asset class
    #[must_use]
    pub fn with_overrides(
        mut self,
        asset_class: AssetClass,
        mean: Option<f64>,
        volatility: Option<f64>,
    ) -> Self {
        if mean.is_none() && volatility.is_none() {
            return self;
        }
        let entry = self.overrides.entry(asset_class).or_default();
        if mean.is_some() {
            entry.mean = mean;
        }
        if volatility.is_some() {
            entry.volatility = volatility;
        }
        self
    }

    pub fn get_return_params(
        &self,
        asset_class: AssetClass,
        context: &MarketContext,
    ) -> AssetReturnParams {
        let base = default_params(context.locale, asset_class);
        let overridden = self.overrides.get(&asset_class).copied().unwrap_or_default();
        let mean = overridden.mean.unwrap_or(base.mean);
        let volatility = overridden.volatility.unwrap_or(base.volatility);

        let (mean_mult, vol_mult) = context.regime.adjustment();
        AssetReturnParams::new(mean * mean_mult, volatility * vol_mult)
    }

    /// Same as [`get_return_params`](Self::get_return_params) for a raw
    /// allocation key
    pub fn lookup(
        &self,
        asset_class: &str,
        context: &MarketContext,
    ) -> Result<AssetReturnParams, UnknownAssetClass> {
        let class: AssetClass = asset_class.parse()?;
        Ok(self.get_return_params(class, context))
    }
}

/// Tax drag on expected returns.
///
/// Slab-taxed classes (debt, cash, real estate rent/interest) lose the
/// investor's marginal rate, equity and gold lose the long-term capital
/// gains rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxTreatment {
    pub income_tax_rate: f64,
    pub equity_ltcg_rate: f64,
    pub gold_ltcg_rate: f64,
}

impl TaxTreatment {
    pub fn rate_for(&self, asset_class: AssetClass) -> f64 {
        match asset_class {
            AssetClass::Equity => self.equity_ltcg_rate,
            AssetClass::Gold => self.gold_ltcg_rate,
            AssetClass::Debt | AssetClass::Cash | AssetClass::RealEstate => self.income_tax_rate,
        }
    }

    pub fn after_tax(&self, asset_class: AssetClass, params: AssetReturnParams) -> AssetReturnParams {
        if params.mean <= 0.0 {
            return params;
        }
        let rate = self.rate_for(asset_class).clamp(0.0, 1.0);
        AssetReturnParams::new(params.mean * (1.0 - rate), params.volatility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarketRegime;

    #[test]
    fn test_defaults_cover_all_classes() {
        let model = AssetReturnModel::new();
        for locale in [Locale::India, Locale::Global] {
            let context = MarketContext {
                locale,
                regime: MarketRegime::Normal,
            };
            for class in AssetClass::ALL {
                let params = model.get_return_params(class, &context);
                assert!(params.mean > 0.0 && params.volatility > 0.0, "{class:?}");
            }
        }
    }

    #[test]
    fn test_lookup_unknown_class() {
        let model = AssetReturnModel::new();
        let err = model.lookup("crypto", &MarketContext::default()).unwrap_err();
        assert_eq!(err, UnknownAssetClass("crypto".to_string()));
        assert_eq!(
            model.lookup("equity", &MarketContext::default()),
            Ok(AssetReturnParams::new(0.12, 0.18))
        );
    }

    #[test]
    fn test_overrides_then_regime() {
        let model =
            AssetReturnModel::new().with_overrides(AssetClass::Equity, Some(0.10), None);
        let normal = model.get_return_params(AssetClass::Equity, &MarketContext::default());
        assert_eq!(normal, AssetReturnParams::new(0.10, 0.18));

        let bearish = MarketContext {
            locale: Locale::India,
            regime: MarketRegime::Bearish,
        };
        let params = model.get_return_params(AssetClass::Equity, &bearish);
        assert!((params.mean - 0.06).abs() < 1e-12);
        assert!((params.volatility - 0.225).abs() < 1e-12);

        // Untouched class keeps the table value
        assert_eq!(
            model.get_return_params(AssetClass::Debt, &MarketContext::default()),
            AssetReturnParams::new(0.07, 0.05)
        );
    }

    #[test]
    fn test_partial_override_keeps_other_field() {
        let model = AssetReturnModel::new()
            .with_overrides(AssetClass::Gold, None, Some(0.2))
            .with_overrides(AssetClass::Gold, Some(0.09), None);
        assert_eq!(
            model.get_return_params(AssetClass::Gold, &MarketContext::default()),
            AssetReturnParams::new(0.09, 0.2)
        );
    }

    #[test]
    fn test_tax_drag() {
        let tax = TaxTreatment {
            income_tax_rate: 0.3,
            equity_ltcg_rate: 0.125,
            gold_ltcg_rate: 0.125,
        };
        let debt = tax.after_tax(AssetClass::Debt, AssetReturnParams::new(0.07, 0.05));
        assert!((debt.mean - 0.049).abs() < 1e-12);
        assert_eq!(debt.volatility, 0.05);

        let equity = tax.after_tax(AssetClass::Equity, AssetReturnParams::new(0.12, 0.18));
        assert!((equity.mean - 0.105).abs() < 1e-12);

        // Losses are not taxed
        let negative = tax.after_tax(AssetClass::Debt, AssetReturnParams::new(-0.02, 0.05));
        assert_eq!(negative.mean, -0.02);
    }
}
