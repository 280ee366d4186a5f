use serde::{Deserialize, Serialize};

/// Which way a pricing rule should move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

/// (label, min pct, max pct)
const BANDS: [(&str, f64, f64); 3] = [
    ("light", 0.05, 0.10),
    ("medium", 0.10, 0.20),
    ("aggressive", 0.20, 0.30),
];

/// Suggested new rule values for one magnitude band, `low <= high`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariationBand {
    pub label: String,
    pub min_pct: f64,
    pub max_pct: f64,
    pub low: f64,
    pub high: f64,
}

pub fn variation_bands(base: f64, direction: Direction) -> Vec<VariationBand> {
    BANDS
        .iter()
        .map(|&(label, min_pct, max_pct)| {
            let (low, high) = match direction {
                Direction::Increase => (base * (1.0 + min_pct), base * (1.0 + max_pct)),
                Direction::Decrease => (base * (1.0 - max_pct), base * (1.0 - min_pct)),
            };
            VariationBand {
                label: label.to_string(),
                min_pct,
                max_pct,
                low,
                high,
            }
        })
        .collect()
}

impl VariationBand {
    /// `light (5% to 10%): 1.05 to 1.10`
    pub fn describe(&self) -> String {
        format!(
            "{} ({:.0}% to {:.0}%): {:.2} to {:.2}",
            self.label,
            self.min_pct * 100.0,
            self.max_pct * 100.0,
            self.low,
            self.high
        )
    }
}
