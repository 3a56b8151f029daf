use crate::record::Category;
use serde::{Deserialize, Serialize};

/// Which price a purchase must be able to afford.
///
/// Manna spent is always derived from the per-category table; this only
/// changes the affordability check made before a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchasePricing {
    /// Each category is checked against its own unit price.
    #[default]
    PerCategory,
    /// Every category is checked against the licence price, as the first
    /// release of the bot did. Kept for campaigns with data bought that way.
    FlatLicence,
}

impl PurchasePricing {
    pub fn required_funds(self, category: Category) -> u64 {
        match self {
            PurchasePricing::PerCategory => category.price(),
            PurchasePricing::FlatLicence => Category::Licence.price(),
        }
    }
}
