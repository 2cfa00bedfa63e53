// src/models/produce.rs

use serde::Serialize;

/// Seasonal produce guide entry
#[derive(Debug, Clone, Serialize)]
pub struct Produce {
    pub slug: &'static str,
    pub name: &'static str,
    /// Months (1-12) the crop is available from UK farms
    pub months: &'static [u32],
    /// Months it is at its best
    pub peak_months: &'static [u32],
    pub description: &'static str,
}

impl Produce {
    pub fn in_season(&self, month: u32) -> bool {
        self.months.contains(&month)
    }

    pub fn at_peak(&self, month: u32) -> bool {
        self.peak_months.contains(&month)
    }
}

/// Query for GET /produce/in-season
#[derive(Debug, Default, serde::Deserialize)]
pub struct SeasonQuery {
    pub month: Option<u32>,
}

/// One produce entry with its status for the requested month
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalProduce {
    #[serde(flatten)]
    pub produce: Produce,
    pub at_peak: bool,
}
