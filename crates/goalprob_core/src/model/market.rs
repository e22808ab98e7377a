use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, UnknownAssetClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    Debt,
    Gold,
    Cash,
    RealEstate,
}

impl AssetClass {
    pub const ALL: [AssetClass; 5] = [
        AssetClass::Equity,
        AssetClass::Debt,
        AssetClass::Gold,
        AssetClass::Cash,
        AssetClass::RealEstate,
    ];

    /// Name used in allocation maps and parameter paths
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Equity => "equity",
            AssetClass::Debt => "debt",
            AssetClass::Gold => "gold",
            AssetClass::Cash => "cash",
            AssetClass::RealEstate => "real_estate",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = UnknownAssetClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "equity" | "equities" | "stocks" => Ok(AssetClass::Equity),
            "debt" | "bonds" | "fixed_income" => Ok(AssetClass::Debt),
            "gold" => Ok(AssetClass::Gold),
            "cash" => Ok(AssetClass::Cash),
            "real_estate" | "realestate" => Ok(AssetClass::RealEstate),
            _ => Err(UnknownAssetClass(s.to_string())),
        }
    }
}

/// Which return table to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    India,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    #[default]
    Normal,
    Bullish,
    Bearish,
}

impl MarketRegime {
    /// (mean multiplier, volatility multiplier)
    pub fn adjustment(&self) -> (f64, f64) {
        match self {
            MarketRegime::Normal => (1.0, 1.0),
            MarketRegime::Bullish => (1.15, 0.9),
            MarketRegime::Bearish => (0.6, 1.25),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MarketContext {
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub regime: MarketRegime,
}

/// Family of the per-year return draw.
///
/// `LogNormal` keeps gross returns strictly positive and is the default.
/// `Normal` is kept for comparison with simpler planners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnDistribution {
    #[default]
    LogNormal,
    Normal,
}

impl ReturnDistribution {
    /// Build a sampler of annual net returns with the given arithmetic mean
    /// and standard deviation.
    pub fn sampler(
        &self,
        asset_class: AssetClass,
        mean: f64,
        volatility: f64,
    ) -> Result<ReturnSampler, SimulationError> {
        let invalid = |distribution, reason| SimulationError::InvalidDistribution {
            distribution,
            asset_class: asset_class.to_string(),
            mean,
            volatility,
            reason,
        };

        if !mean.is_finite() || !volatility.is_finite() || volatility < 0.0 {
            return Err(invalid(
                self.name(),
                "mean and volatility must be finite, volatility non-negative",
            ));
        }

        match self {
            ReturnDistribution::LogNormal => {
                let gross_mean = 1.0 + mean;
                if gross_mean <= 0.0 {
                    return Err(invalid("lognormal", "mean return must exceed -100%"));
                }
                // Moment matching so that E[1 + r] = 1 + mean and sd(r) = volatility
                let sigma_sq = (1.0 + (volatility * volatility) / (gross_mean * gross_mean)).ln();
                let mu = gross_mean.ln() - sigma_sq / 2.0;
                LogNormal::new(mu, sigma_sq.sqrt())
                    .map(ReturnSampler::LogNormal)
                    .map_err(|_| invalid("lognormal", "sigma must be finite"))
            }
            ReturnDistribution::Normal => Normal::new(mean, volatility)
                .map(ReturnSampler::Normal)
                .map_err(|_| invalid("normal", "std_dev must be finite")),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ReturnDistribution::LogNormal => "lognormal",
            ReturnDistribution::Normal => "normal",
        }
    }
}

/// Prebuilt sampler for one asset class. Construct once per input, then draw
/// many times.
#[derive(Debug, Clone, Copy)]
pub enum ReturnSampler {
    LogNormal(LogNormal<f64>),
    Normal(Normal<f64>),
}

impl ReturnSampler {
    /// Draw one annual net return (0.07 = +7%)
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            ReturnSampler::LogNormal(d) => d.sample(rng) - 1.0,
            ReturnSampler::Normal(d) => d.sample(rng),
        }
    }
}
