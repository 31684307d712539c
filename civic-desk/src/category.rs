//! Service categories a query can be filed under.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeskError;

/// Fixed set of service categories, numbered 1 to 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Category {
    Grave = 1,
    WaterServices,
    DevelopmentPermit,
    RatesClearance,
    SupplierCreditors,
    DebtCollection,
    ClinicHealth,
    LeaseExtension,
    Tariffs,
    MeterReading,
    SewerServices,
    BuildingInspectorate,
    RoadsManagement,
    PublicRelations,
    TransportManagement,
}

/// Categories shown on the first list page; the rest go on the second.
pub const FIRST_PAGE_LEN: usize = 9;

impl Category {
    pub const ALL: [Category; 15] = [
        Self::Grave,
        Self::WaterServices,
        Self::DevelopmentPermit,
        Self::RatesClearance,
        Self::SupplierCreditors,
        Self::DebtCollection,
        Self::ClinicHealth,
        Self::LeaseExtension,
        Self::Tariffs,
        Self::MeterReading,
        Self::SewerServices,
        Self::BuildingInspectorate,
        Self::RoadsManagement,
        Self::PublicRelations,
        Self::TransportManagement,
    ];

    /// Ordinal in 1..=15.
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(n: u32) -> Option<Self> {
        let idx = usize::try_from(n).ok()?.checked_sub(1)?;
        Self::ALL.get(idx).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Grave => "Grave (Cemetery)",
            Self::WaterServices => "Water Services",
            Self::DevelopmentPermit => "Development Permit Processing",
            Self::RatesClearance => "Rates Clearance",
            Self::SupplierCreditors => "Payment of Supplier Creditors",
            Self::DebtCollection => "Debt Collection",
            Self::ClinicHealth => "Health Services at Clinics",
            Self::LeaseExtension => "Lease Extension Agreements",
            Self::Tariffs => "Tariffs",
            Self::MeterReading => "Meter Reading",
            Self::SewerServices => "Sewer Services",
            Self::BuildingInspectorate => "Building Inspectorate",
            Self::RoadsManagement => "Roads Management",
            Self::PublicRelations => "Public Relations Services",
            Self::TransportManagement => "Transport Management",
        }
    }

    /// Categories on list page 1 or 2.
    pub fn page(page: u8) -> &'static [Category] {
        match page {
            1 => &Self::ALL[..FIRST_PAGE_LEN],
            _ => &Self::ALL[FIRST_PAGE_LEN..],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let n: u32 = trimmed
            .parse()
            .map_err(|_| DeskError::Validation(format!("not a category number: {trimmed:?}")))?;
        Self::from_ordinal(n)
            .ok_or_else(|| DeskError::Validation(format!("category {n} is out of range 1-15")))
    }
}
