// src/services/produce_service.rs
// DOCUMENTATION: Seasonal produce guide
// PURPOSE: Static catalog of UK produce and what is in season when

use crate::errors::FarmError;
use crate::models::{Produce, SeasonalProduce};
use chrono::Datelike;

const CATALOG: &[Produce] = &[
    Produce {
        slug: "apples",
        name: "Apples",
        months: &[8, 9, 10, 11],
        peak_months: &[9],
        description: "Early varieties arrive in August; the main crop is picked through autumn.",
    },
    Produce {
        slug: "asparagus",
        name: "Asparagus",
        months: &[4, 5, 6],
        peak_months: &[5],
        description: "A short spring season that traditionally ends on the summer solstice.",
    },
    Produce {
        slug: "blackberries",
        name: "Blackberries",
        months: &[7, 8, 9],
        peak_months: &[8],
        description: "Cultivated canes crop from July; hedgerow fruit follows into September.",
    },
    Produce {
        slug: "brussels-sprouts",
        name: "Brussels sprouts",
        months: &[10, 11, 12, 1, 2],
        peak_months: &[12],
        description: "Sweeter after the first frosts.",
    },
    Produce {
        slug: "cherries",
        name: "Cherries",
        months: &[6, 7, 8],
        peak_months: &[7],
        description: "British cherries have a brief midsummer window.",
    },
    Produce {
        slug: "kale",
        name: "Kale",
        months: &[9, 10, 11, 12, 1, 2, 3],
        peak_months: &[11],
        description: "A hardy winter green available for most of the cold months.",
    },
    Produce {
        slug: "new-potatoes",
        name: "New potatoes",
        months: &[5, 6, 7],
        peak_months: &[6],
        description: "Freshly lifted early potatoes with thin, papery skins.",
    },
    Produce {
        slug: "parsnips",
        name: "Parsnips",
        months: &[9, 10, 11, 12, 1, 2, 3],
        peak_months: &[12],
        description: "Frost converts starch to sugar, so winter roots are the sweetest.",
    },
    Produce {
        slug: "plums",
        name: "Plums",
        months: &[7, 8, 9],
        peak_months: &[8],
        description: "Victoria plums dominate the late summer crop.",
    },
    Produce {
        slug: "pumpkins",
        name: "Pumpkins",
        months: &[9, 10, 11],
        peak_months: &[10],
        description: "Pick-your-own pumpkin patches open in October.",
    },
    Produce {
        slug: "raspberries",
        name: "Raspberries",
        months: &[6, 7, 8, 9],
        peak_months: &[7],
        description: "Summer-fruiting canes are followed by autumn varieties.",
    },
    Produce {
        slug: "rhubarb",
        name: "Rhubarb",
        months: &[1, 2, 3, 4, 5, 6],
        peak_months: &[4],
        description: "Forced rhubarb in late winter, outdoor stalks in spring.",
    },
    Produce {
        slug: "runner-beans",
        name: "Runner beans",
        months: &[7, 8, 9, 10],
        peak_months: &[8],
        description: "Best picked young and often.",
    },
    Produce {
        slug: "strawberries",
        name: "Strawberries",
        months: &[5, 6, 7, 8, 9],
        peak_months: &[6],
        description: "The classic pick-your-own crop, peaking in June.",
    },
    Produce {
        slug: "sweetcorn",
        name: "Sweetcorn",
        months: &[8, 9],
        peak_months: &[8],
        description: "Sugars fade quickly after picking, so buy it at the farm gate.",
    },
    Produce {
        slug: "tomatoes",
        name: "Tomatoes",
        months: &[6, 7, 8, 9, 10],
        peak_months: &[8],
        description: "Glasshouse crops start early; outdoor tomatoes ripen in late summer.",
    },
];

pub struct ProduceService;

impl ProduceService {
    pub fn all() -> &'static [Produce] {
        CATALOG
    }

    pub fn get(slug: &str) -> Result<&'static Produce, FarmError> {
        CATALOG
            .iter()
            .find(|p| p.slug == slug)
            .ok_or_else(|| FarmError::NotFound(format!("produce {}", slug)))
    }

    /// Produce available in `month` (defaults to the current month),
    /// peak crops first
    pub fn in_season(month: Option<u32>) -> Result<(u32, Vec<SeasonalProduce>), FarmError> {
        let month = month.unwrap_or_else(|| chrono::Utc::now().month());
        if !(1..=12).contains(&month) {
            return Err(FarmError::InvalidInput(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }

        let mut items: Vec<SeasonalProduce> = CATALOG
            .iter()
            .filter(|p| p.in_season(month))
            .map(|p| SeasonalProduce {
                produce: p.clone(),
                at_peak: p.at_peak(month),
            })
            .collect();
        items.sort_by(|a, b| b.at_peak.cmp(&a.at_peak).then(a.produce.name.cmp(b.produce.name)));

        Ok((month, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_consistent() {
        for produce in ProduceService::all() {
            assert!(!produce.months.is_empty(), "{}", produce.slug);
            for peak in produce.peak_months {
                assert!(produce.months.contains(peak), "{} peak outside season", produce.slug);
            }
            assert!(produce.months.iter().all(|m| (1..=12).contains(m)));
        }
    }

    #[test]
    fn test_in_season_august() {
        let (month, items) = ProduceService::in_season(Some(8)).unwrap();
        assert_eq!(month, 8);
        let slugs: Vec<_> = items.iter().map(|i| i.produce.slug).collect();
        assert!(slugs.contains(&"sweetcorn"));
        assert!(slugs.contains(&"plums"));
        assert!(!slugs.contains(&"asparagus"));
        // Peak crops lead the list
        assert!(items[0].at_peak);
    }

    #[test]
    fn test_winter_wraps_year_end() {
        let (_, items) = ProduceService::in_season(Some(1)).unwrap();
        assert!(items.iter().any(|i| i.produce.slug == "brussels-sprouts"));
    }

    #[test]
    fn test_invalid_month() {
        assert!(ProduceService::in_season(Some(0)).is_err());
        assert!(ProduceService::in_season(Some(13)).is_err());
    }

    #[test]
    fn test_get_by_slug() {
        assert_eq!(ProduceService::get("strawberries").unwrap().peak_months, &[6]);
        assert!(matches!(ProduceService::get("mango"), Err(FarmError::NotFound(_))));
    }
}
