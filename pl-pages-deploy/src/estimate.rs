//! Upload cost estimate. Reporting only; never gates a deployment.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use pl_pages_core::Settings;

use crate::error::HttpError;
use crate::http::Http;

pub const WINSTON_PER_AR: f64 = 1e12;

/// Price sources for the estimate.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Network price in winston for storing `bytes`.
    async fn winston_for_bytes(&self, bytes: u64) -> Result<f64, HttpError>;

    /// USD value of 1 AR.
    async fn usd_per_ar(&self) -> Result<f64, HttpError>;
}

/// A formatted estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub bytes: u64,
    pub cost_ar: f64,
    pub cost_usd: f64,
}

impl Estimate {
    pub fn size(&self) -> String {
        format_bytes(self.bytes)
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Size: {}, Cost: ~{} AR (~{} USD)",
            self.size(),
            to_precision(self.cost_ar, 5),
            to_precision(self.cost_usd, 5)
        )
    }
}

/// Estimate the cost of uploading `bytes`. Oracle failures count as zero.
pub async fn estimate(oracle: &dyn PriceOracle, bytes: u64) -> Estimate {
    let winston = oracle.winston_for_bytes(bytes).await.unwrap_or_else(|err| {
        tracing::debug!(error = %err, "price lookup failed");
        0.0
    });
    let cost_ar = winston / WINSTON_PER_AR;
    let rate = oracle.usd_per_ar().await.unwrap_or_else(|err| {
        tracing::debug!(error = %err, "fiat rate lookup failed");
        0.0
    });
    Estimate {
        bytes,
        cost_ar,
        cost_usd: cost_ar * rate,
    }
}

/// Human size in 1024-based units with at most two decimals.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
    if bytes == 0 {
        return "0 Bytes".to_owned();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

/// Format with `digits` significant digits, switching to exponent form for
/// very small or very large magnitudes.
pub fn to_precision(value: f64, digits: usize) -> String {
    let digits = digits.max(1);
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return format!("{:.*}", digits - 1, 0.0);
    }
    let sci = format!("{:.*e}", digits - 1, value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -6 || exp >= digits as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{}", exp.abs())
    } else {
        let decimals = (digits as i32 - 1 - exp).max(0) as usize;
        format!("{value:.decimals$}")
    }
}

// ---------------------------------------------------------------------------
// Network oracle
// ---------------------------------------------------------------------------

/// Price node plus two fiat sources tried in order.
#[derive(Debug, Clone)]
pub struct NetworkOracle {
    http: Http,
    arweave_url: String,
    fiat_primary_url: String,
    fiat_secondary_url: String,
}

#[derive(Debug, Deserialize)]
struct CoinGecko {
    arweave: CoinGeckoPrice,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoPrice {
    usd: f64,
}

#[derive(Debug, Deserialize)]
struct RedStonePrice {
    value: f64,
}

impl NetworkOracle {
    pub fn from_settings(settings: &Settings, http: &Http) -> Self {
        Self {
            http: http.clone(),
            arweave_url: settings.arweave_url.clone(),
            fiat_primary_url: settings.fiat_primary_url.clone(),
            fiat_secondary_url: settings.fiat_secondary_url.clone(),
        }
    }

    async fn primary_rate(&self) -> Result<f64, HttpError> {
        let response = self.http.get(&self.fiat_primary_url).await?;
        Ok(response.json::<CoinGecko>()?.arweave.usd)
    }

    async fn secondary_rate(&self) -> Result<f64, HttpError> {
        let response = self.http.get(&self.fiat_secondary_url).await?;
        let prices: Vec<RedStonePrice> = response.json()?;
        prices.first().map(|p| p.value).ok_or_else(|| HttpError::Transport {
            url: self.fiat_secondary_url.clone(),
            message: "empty price list".into(),
        })
    }
}

#[async_trait]
impl PriceOracle for NetworkOracle {
    async fn winston_for_bytes(&self, bytes: u64) -> Result<f64, HttpError> {
        let url = format!("{}/price/{bytes}", self.arweave_url.trim_end_matches('/'));
        let response = self.http.get(&url).await?;
        response.body.trim().parse().map_err(|_| HttpError::Transport {
            url,
            message: format!("not a winston amount: {}", response.body),
        })
    }

    async fn usd_per_ar(&self) -> Result<f64, HttpError> {
        match self.primary_rate().await {
            Ok(rate) => Ok(rate),
            Err(err) => {
                tracing::debug!(error = %err, "primary fiat source failed");
                self.secondary_rate().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOracle {
        winston: Result<f64, ()>,
        rate: Result<f64, ()>,
    }

    fn down() -> HttpError {
        HttpError::Transport {
            url: "fake".into(),
            message: "down".into(),
        }
    }

    #[async_trait]
    impl PriceOracle for FixedOracle {
        async fn winston_for_bytes(&self, _: u64) -> Result<f64, HttpError> {
            self.winston.map_err(|_| down())
        }
        async fn usd_per_ar(&self) -> Result<f64, HttpError> {
            self.rate.map_err(|_| down())
        }
    }

    #[test]
    fn format_bytes_uses_binary_units() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(500), "500 Bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_048_576), "1 MB");
        assert_eq!(format_bytes(1_234_567), "1.18 MB");
    }

    #[test]
    fn to_precision_matches_five_significant_digits() {
        assert_eq!(to_precision(0.0, 5), "0.0000");
        assert_eq!(to_precision(1.0, 5), "1.0000");
        assert_eq!(to_precision(0.00012345, 5), "0.00012345");
        assert_eq!(to_precision(12.3456789, 5), "12.346");
        assert_eq!(to_precision(123456.0, 5), "1.2346e+5");
        assert_eq!(to_precision(0.000000123456, 5), "1.2346e-7");
        assert_eq!(to_precision(9.99996, 5), "10.000");
    }

    #[tokio::test]
    async fn estimate_converts_winston_and_rate() {
        let oracle = FixedOracle {
            winston: Ok(2e12),
            rate: Ok(10.0),
        };
        let e = estimate(&oracle, 2048).await;
        assert_eq!(e.cost_ar, 2.0);
        assert_eq!(e.cost_usd, 20.0);
        assert_eq!(e.to_string(), "Size: 2 KB, Cost: ~2.0000 AR (~20.000 USD)");
    }

    #[tokio::test]
    async fn oracle_failures_yield_zero() {
        let oracle = FixedOracle {
            winston: Err(()),
            rate: Err(()),
        };
        let e = estimate(&oracle, 10).await;
        assert_eq!((e.cost_ar, e.cost_usd), (0.0, 0.0));

        let oracle = FixedOracle {
            winston: Ok(1e12),
            rate: Err(()),
        };
        assert_eq!(estimate(&oracle, 10).await.cost_usd, 0.0);
    }

    #[test]
    fn fiat_replies_decode() {
        let cg: CoinGecko = serde_json::from_str(r#"{"arweave":{"usd":21.5}}"#).unwrap();
        assert_eq!(cg.arweave.usd, 21.5);
        let rs: Vec<RedStonePrice> = serde_json::from_str(r#"[{"value":20.1,"symbol":"AR"}]"#).unwrap();
        assert_eq!(rs[0].value, 20.1);
    }
}
