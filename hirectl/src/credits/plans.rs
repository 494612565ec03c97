//! Plan catalog.
//!
//! Every sellable plan is a [`PlanTier`] variant mapped to an immutable [`PlanConfig`]. USD plans
//! are sold per seat (the buyer chooses a quantity); INR plans are fixed packs and ignore any
//! requested quantity. Amounts are in the smallest currency unit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::credits::LedgerError;
use crate::credits::packs::{CreditCounts, Currency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanTier {
    Essential,
    Business,
    Enterprise,
    Lite,
    Pro,
    Elite,
}

impl PlanTier {
    pub const ALL: [PlanTier; 6] = [
        PlanTier::Essential,
        PlanTier::Business,
        PlanTier::Enterprise,
        PlanTier::Lite,
        PlanTier::Pro,
        PlanTier::Elite,
    ];

    /// Tier that unlocks premium organisation features (reported as `has_business_plan`).
    pub const BUSINESS_TIER: PlanTier = PlanTier::Business;

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Essential => "ESSENTIAL",
            PlanTier::Business => "BUSINESS",
            PlanTier::Enterprise => "ENTERPRISE",
            PlanTier::Lite => "LITE",
            PlanTier::Pro => "PRO",
            PlanTier::Elite => "ELITE",
        }
    }

    pub fn config(&self) -> &'static PlanConfig {
        match self {
            PlanTier::Essential => &ESSENTIAL,
            PlanTier::Business => &BUSINESS,
            PlanTier::Enterprise => &ENTERPRISE,
            PlanTier::Lite => &LITE,
            PlanTier::Pro => &PRO,
            PlanTier::Elite => &ELITE,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        PlanTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == upper)
            .ok_or_else(|| LedgerError::InvalidPlan { plan: s.to_string() })
    }
}

/// How many seats (interviews) a purchase of this plan covers.
#[derive(Debug, Clone, Copy)]
pub enum PackSizing {
    /// Any quantity within the inclusive range; defaults to `min`
    Range { min: u32, max: u32 },
    /// One of the listed sizes; defaults to the first
    Sizes(&'static [u32]),
    /// A fixed pack sold at `pack_price`; requested quantities are ignored
    Fixed { size: u32, pack_price: i64 },
}

/// How a pack's interview credits are spread over the four interview types.
#[derive(Debug, Clone, Copy)]
pub enum InterviewSplit {
    /// Every seat is a general interview
    General,
    /// 60% technical, 20% hr, remainder behavioral (rounded half up)
    Weighted,
}

impl InterviewSplit {
    pub fn allocate(&self, quantity: u32) -> CreditCounts {
        let q = quantity as i32;
        match self {
            InterviewSplit::General => CreditCounts {
                general: q,
                ..Default::default()
            },
            InterviewSplit::Weighted => {
                let technical = round_share(q, 6);
                let hr = round_share(q, 2);
                CreditCounts {
                    technical,
                    hr,
                    behavioral: q - technical - hr,
                    ..Default::default()
                }
            }
        }
    }
}

/// `round(q * tenths / 10)` with halves rounded up, in integer arithmetic.
fn round_share(q: i32, tenths: i32) -> i32 {
    (q * tenths + 5) / 10
}

#[derive(Debug, Clone, Copy)]
pub struct PlanConfig {
    pub tier: PlanTier,
    pub name: &'static str,
    pub description: &'static str,
    pub currency: Currency,
    /// Price per seat in the smallest currency unit
    pub unit_price: i64,
    pub sizing: PackSizing,
    pub split: InterviewSplit,
    /// Aptitude credits per seat (USD) or per pack (INR)
    pub aptitude_total: i32,
    /// Coding credits per seat (USD) or per pack (INR)
    pub coding_total: i32,
}

impl PlanConfig {
    /// Resolve the seat count for a purchase, applying the plan's default and rejecting sizes the
    /// plan does not sell.
    pub fn quantity(&self, requested: Option<u32>) -> Result<u32, LedgerError> {
        let invalid = |quantity| LedgerError::InvalidQuantity { plan: self.tier, quantity };
        match self.sizing {
            PackSizing::Fixed { size, .. } => Ok(size),
            PackSizing::Range { min, max } => {
                let q = requested.unwrap_or(min);
                if (min..=max).contains(&q) { Ok(q) } else { Err(invalid(q)) }
            }
            PackSizing::Sizes(sizes) => {
                let q = requested.unwrap_or(sizes[0]);
                if sizes.contains(&q) { Ok(q) } else { Err(invalid(q)) }
            }
        }
    }

    /// Credits granted by a purchase of this plan.
    pub fn allocation(&self, requested: Option<u32>) -> Result<CreditCounts, LedgerError> {
        let quantity = self.quantity(requested)?;
        let mut credits = self.split.allocate(quantity);
        match self.sizing {
            PackSizing::Fixed { .. } => {
                credits.aptitude = self.aptitude_total;
                credits.coding = self.coding_total;
            }
            PackSizing::Range { .. } | PackSizing::Sizes(_) => {
                credits.aptitude = self.aptitude_total * quantity as i32;
                credits.coding = self.coding_total * quantity as i32;
            }
        }
        Ok(credits)
    }

    /// Amount charged for a purchase, in the smallest currency unit.
    pub fn price(&self, requested: Option<u32>) -> Result<i64, LedgerError> {
        let quantity = self.quantity(requested)?;
        Ok(match self.sizing {
            PackSizing::Fixed { pack_price, .. } => pack_price,
            PackSizing::Range { .. } | PackSizing::Sizes(_) => self.unit_price * i64::from(quantity),
        })
    }
}

static ESSENTIAL: PlanConfig = PlanConfig {
    tier: PlanTier::Essential,
    name: "Essential",
    description: "Pay per interview, best for trying out",
    currency: Currency::Usd,
    unit_price: 2499,
    sizing: PackSizing::Range { min: 1, max: 9 },
    split: InterviewSplit::General,
    aptitude_total: 3,
    coding_total: 3,
};

static BUSINESS: PlanConfig = PlanConfig {
    tier: PlanTier::Business,
    name: "Business",
    description: "Best value for growing teams",
    currency: Currency::Usd,
    unit_price: 1799,
    sizing: PackSizing::Sizes(&[10, 25, 50]),
    split: InterviewSplit::Weighted,
    aptitude_total: 5,
    coding_total: 5,
};

static ENTERPRISE: PlanConfig = PlanConfig {
    tier: PlanTier::Enterprise,
    name: "Enterprise",
    description: "Unlimited scale, API, multi-org",
    currency: Currency::Usd,
    unit_price: 1299,
    sizing: PackSizing::Sizes(&[50, 100, 250]),
    split: InterviewSplit::Weighted,
    aptitude_total: 8,
    coding_total: 5,
};

static LITE: PlanConfig = PlanConfig {
    tier: PlanTier::Lite,
    name: "Lite",
    description: "1 interview + 3 aptitude + 3 coding",
    currency: Currency::Inr,
    unit_price: 49900,
    sizing: PackSizing::Fixed {
        size: 1,
        pack_price: 49900,
    },
    split: InterviewSplit::General,
    aptitude_total: 3,
    coding_total: 3,
};

static PRO: PlanConfig = PlanConfig {
    tier: PlanTier::Pro,
    name: "Pro Pack",
    description: "10 interviews + 30 aptitude + 30 coding",
    currency: Currency::Inr,
    unit_price: 29900,
    sizing: PackSizing::Fixed {
        size: 10,
        pack_price: 299000,
    },
    split: InterviewSplit::Weighted,
    aptitude_total: 30,
    coding_total: 30,
};

static ELITE: PlanConfig = PlanConfig {
    tier: PlanTier::Elite,
    name: "Elite Pack",
    description: "20 interviews + 60 aptitude + 60 coding",
    currency: Currency::Inr,
    unit_price: 24900,
    sizing: PackSizing::Fixed {
        size: 20,
        pack_price: 498000,
    },
    split: InterviewSplit::Weighted,
    aptitude_total: 60,
    coding_total: 60,
};
