//! Meme stock records and the persisted market document.
//!
//! A [`Meme`] is one tradable entity: its price, the last applied
//! percentage change, and the trend regime state the engine uses to
//! decide the next move. The [`MarketFile`] is the JSON document the
//! snapshot store reads at startup and rewrites after each committed
//! tick:
//!
//! ```json
//! { "memes": [ { "name": "DOGE", "price": 12.5, "trend": "random" } ] }
//! ```
//!
//! A meme is identified by `name`, `id`, or both; each key present on
//! load is written back under the same key. Trend fields are optional on
//! load and default to the `Random` regime
//! with empty counters. Keys this crate does not know about (logos,
//! tickers, descriptions) are carried in `extra` and written back
//! untouched.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Current price-movement regime of a meme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Unbiased random walk; strong moves build a streak.
    #[default]
    Random,
    /// Locked upward momentum for a limited number of ticks.
    Up,
    /// Locked downward momentum for a limited number of ticks.
    Down,
}

impl Trend {
    /// Whether this is a locked (`Up` or `Down`) regime.
    pub const fn is_locked(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }
}

/// A single meme stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meme {
    /// Display name. Either this or `id` identifies the meme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Opaque identifier, written back under `id` when it was read that way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Current price. Always positive.
    pub price: f64,
    /// Last applied percentage change, rounded to cents.
    #[serde(default)]
    pub change: f64,
    /// Current regime.
    #[serde(default)]
    pub trend: Trend,
    /// Consecutive strong same-direction moves while in `Random`.
    /// Positive for up moves, negative for down moves.
    #[serde(default)]
    pub streak: i32,
    /// Ticks left before a locked trend reverts to `Random`.
    #[serde(default)]
    pub trend_count: i32,
    /// Fields not interpreted by the engine, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Meme {
    /// Create a meme in the default `Random` regime.
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: Some(name.into()),
            id: None,
            price,
            change: 0.0,
            trend: Trend::Random,
            streak: 0,
            trend_count: 0,
            extra: serde_json::Map::new(),
        }
    }

    /// Identifier used in logs and lookups: `name`, falling back to `id`.
    pub fn key(&self) -> &str {
        self.name.as_deref().or(self.id.as_deref()).unwrap_or_default()
    }

    /// Whether `key` is this meme's `name` or `id`.
    pub fn is_keyed(&self, key: &str) -> bool {
        self.name.as_deref() == Some(key) || self.id.as_deref() == Some(key)
    }

    /// Builder-style helper to set the regime state.
    #[must_use]
    pub const fn with_trend(mut self, trend: Trend, streak: i32, trend_count: i32) -> Self {
        self.trend = trend;
        self.streak = streak;
        self.trend_count = trend_count;
        self
    }
}

/// The persisted market document (`{ "memes": [...] }`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketFile {
    /// All memes in display order.
    pub memes: Vec<Meme>,
    /// Top-level keys other than `memes`, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MarketFile {
    /// Wrap a list of memes with no extra top-level keys.
    pub fn new(memes: Vec<Meme>) -> Self {
        Self {
            memes,
            extra: serde_json::Map::new(),
        }
    }
}

/// Round a value to two decimal places, half away from zero.
///
/// The value is first taken to its shortest decimal form so that
/// `1.005` rounds to `1.01` instead of falling to `1.00` through its
/// binary representation. Values that do not fit a [`Decimal`] and
/// non-finite input are returned unchanged.
pub fn round_to_cents(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    value
        .to_string()
        .parse::<Decimal>()
        .ok()
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn missing_trend_fields_default_to_random() {
        let meme: Meme = serde_json::from_str(r#"{"name": "PEPE", "price": 4.2}"#).unwrap();
        assert_eq!(meme.trend, Trend::Random);
        assert_eq!(meme.streak, 0);
        assert_eq!(meme.trend_count, 0);
        assert_eq!(meme.change, 0.0);
    }

    #[test]
    fn name_only_is_the_key() {
        let meme: Meme = serde_json::from_str(r#"{"name": "PEPE", "price": 1.0}"#).unwrap();
        assert_eq!(meme.key(), "PEPE");
        assert_eq!(meme.id, None);
    }

    #[test]
    fn id_only_is_the_key() {
        let meme: Meme = serde_json::from_str(r#"{"id": "wojak", "price": 1.0}"#).unwrap();
        assert_eq!(meme.key(), "wojak");
        assert_eq!(meme.name, None);
        assert!(meme.is_keyed("wojak"));
    }

    #[test]
    fn id_and_name_load_together() {
        let meme: Meme =
            serde_json::from_str(r#"{"id": "doge", "name": "DOGE", "price": 12.5}"#).unwrap();
        assert_eq!(meme.key(), "DOGE");
        assert!(meme.is_keyed("doge"));
        assert!(meme.is_keyed("DOGE"));
    }

    #[test]
    fn identifier_keys_are_written_back_as_read() {
        for raw in [
            r#"{"id":"doge","price":12.5}"#,
            r#"{"name":"DOGE","price":12.5}"#,
            r#"{"id":"doge","name":"DOGE","price":12.5}"#,
        ] {
            let input: serde_json::Value = serde_json::from_str(raw).unwrap();
            let meme: Meme = serde_json::from_str(raw).unwrap();
            let output = serde_json::to_value(&meme).unwrap();
            assert_eq!(output.get("id"), input.get("id"), "{raw}");
            assert_eq!(output.get("name"), input.get("name"), "{raw}");
        }
    }

    #[test]
    fn missing_price_is_rejected() {
        let result = serde_json::from_str::<Meme>(r#"{"name": "NOPRICE"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn trend_fields_use_wire_names() {
        let meme = Meme::new("DOGE", 10.0).with_trend(Trend::Down, 0, 4);
        let json = serde_json::to_value(&meme).unwrap();
        assert_eq!(json["trend"], "down");
        assert_eq!(json["trendCount"], 4);
        assert!(json.get("trend_count").is_none());
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let raw = r#"{"memes":[{"name":"DOGE","price":2.5,"image":"doge.png","symbol":"DGE"}],"version":3}"#;
        let file: MarketFile = serde_json::from_str(raw).unwrap();
        assert_eq!(file.memes[0].extra["image"], "doge.png");
        assert_eq!(file.extra["version"], 3);

        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["memes"][0]["symbol"], "DGE");
        assert_eq!(json["version"], 3);
    }

    fn assert_cents(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn rounding_is_half_away_from_zero_on_decimal_form() {
        assert_cents(round_to_cents(1.005), 1.01);
        assert_cents(round_to_cents(-1.005), -1.01);
        assert_cents(round_to_cents(10.1005), 10.10);
        assert_cents(round_to_cents(2.718_28), 2.72);
    }

    #[test]
    fn rounding_passes_through_non_finite() {
        assert!(round_to_cents(f64::NAN).is_nan());
        assert_eq!(round_to_cents(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn locked_trends() {
        assert!(!Trend::Random.is_locked());
        assert!(Trend::Up.is_locked());
        assert!(Trend::Down.is_locked());
    }
}
