//! The transaction record and the field selectors used to group and measure it.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Deserialize;

use crate::schema::{flags, record};

/// Raw value of a yes/no column before cleaning.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlagValue {
    /// A typed boolean, either from a boolean source column or produced by the cleaner.
    Canonical(bool),
    /// Text as it appeared in the source, e.g. "Yes" or "No".
    Raw(String),
    Missing,
}

impl FlagValue {
    /// Truth value of an already-normalized flag; anything not canonical reads as false.
    pub fn is_true(&self) -> bool {
        matches!(self, FlagValue::Canonical(true))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FlagValue::Missing)
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Canonical(b) => write!(f, "{b}"),
            FlagValue::Raw(s) => write!(f, "{s}"),
            FlagValue::Missing => f.write_str("NULL"),
        }
    }
}

/// The three yes/no columns of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    AddedSugar,
    IsOrganic,
    ReturnFlag,
}

impl Flag {
    pub const ALL: [Flag; 3] = [Flag::AddedSugar, Flag::IsOrganic, Flag::ReturnFlag];

    pub fn column(self) -> &'static str {
        match self {
            Flag::AddedSugar => flags::ADDED_SUGAR,
            Flag::IsOrganic => flags::IS_ORGANIC,
            Flag::ReturnFlag => flags::RETURN_FLAG,
        }
    }
}

/// One procurement/sale transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub record_id: i64,
    pub date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    /// Quantity exactly as ingested. See [`Record::quantity_value`].
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub price_per_unit: Option<f64>,
    pub total_cost: Option<f64>,
    pub vendor_id: Option<String>,
    pub vendor_name: Option<String>,
    pub procurement_type: Option<String>,
    pub payment_mode: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub season: Option<String>,
    pub shift: Option<String>,
    pub fat_content: Option<f64>,
    pub snf_content: Option<f64>,
    pub protein_content: Option<f64>,
    pub added_sugar: FlagValue,
    pub is_organic: FlagValue,
    pub return_flag: FlagValue,
    /// Set once the cleaner has rewritten the flags to canonical booleans.
    pub flags_normalized: bool,
}

impl Record {
    /// A record with only its required fields set.
    pub fn new(record_id: i64, date: NaiveDate) -> Self {
        Self {
            record_id,
            date,
            expiry_date: None,
            product_id: None,
            product_name: None,
            brand: None,
            quantity: None,
            unit: None,
            price_per_unit: None,
            total_cost: None,
            vendor_id: None,
            vendor_name: None,
            procurement_type: None,
            payment_mode: None,
            location: None,
            latitude: None,
            longitude: None,
            season: None,
            shift: None,
            fat_content: None,
            snf_content: None,
            protein_content: None,
            added_sugar: FlagValue::Missing,
            is_organic: FlagValue::Missing,
            return_flag: FlagValue::Missing,
            flags_normalized: false,
        }
    }

    pub fn flag(&self, flag: Flag) -> &FlagValue {
        match flag {
            Flag::AddedSugar => &self.added_sugar,
            Flag::IsOrganic => &self.is_organic,
            Flag::ReturnFlag => &self.return_flag,
        }
    }

    pub fn flag_mut(&mut self, flag: Flag) -> &mut FlagValue {
        match flag {
            Flag::AddedSugar => &mut self.added_sugar,
            Flag::IsOrganic => &mut self.is_organic,
            Flag::ReturnFlag => &mut self.return_flag,
        }
    }

    /// Numeric quantity, only when the raw text is a well-formed decimal.
    pub fn quantity_value(&self) -> Option<f64> {
        self.quantity
            .as_deref()
            .filter(|q| is_decimal(q))
            .and_then(|q| q.parse().ok())
    }

    /// Whether `column` holds no value for this record.
    ///
    /// Returns `None` for a name that is not a record column.
    pub fn is_null(&self, column: &str) -> Option<bool> {
        let null = match column {
            record::RECORD_ID | record::DATE => false,
            record::EXPIRY_DATE => self.expiry_date.is_none(),
            record::PRODUCT_ID => self.product_id.is_none(),
            record::PRODUCT_NAME => self.product_name.is_none(),
            record::BRAND => self.brand.is_none(),
            record::QUANTITY => self.quantity.is_none(),
            record::UNIT => self.unit.is_none(),
            record::PRICE_PER_UNIT => self.price_per_unit.is_none(),
            record::TOTAL_COST => self.total_cost.is_none(),
            record::VENDOR_ID => self.vendor_id.is_none(),
            record::VENDOR_NAME => self.vendor_name.is_none(),
            record::PROCUREMENT_TYPE => self.procurement_type.is_none(),
            record::PAYMENT_MODE => self.payment_mode.is_none(),
            record::LOCATION => self.location.is_none(),
            record::LATITUDE => self.latitude.is_none(),
            record::LONGITUDE => self.longitude.is_none(),
            record::SEASON => self.season.is_none(),
            record::SHIFT => self.shift.is_none(),
            record::FAT_CONTENT => self.fat_content.is_none(),
            record::SNF_CONTENT => self.snf_content.is_none(),
            record::PROTEIN_CONTENT => self.protein_content.is_none(),
            flags::ADDED_SUGAR => self.added_sugar.is_missing(),
            flags::IS_ORGANIC => self.is_organic.is_missing(),
            flags::RETURN_FLAG => self.return_flag.is_missing(),
            _ => return None,
        };
        Some(null)
    }
}

/// Optional sign, digits, then an optional fractional part.
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+(\.[0-9]+)?$").expect("valid decimal pattern"));

pub(crate) fn is_decimal(s: &str) -> bool {
    DECIMAL.is_match(s)
}

// ── Grouping and measures ───────────────────────────────────────────────────

/// A column a view can group, partition or order by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    ProductId,
    ProductName,
    Brand,
    VendorId,
    VendorName,
    Season,
    Shift,
    Location,
    ProcurementType,
    PaymentMode,
    Unit,
    /// ISO date, `YYYY-MM-DD`.
    Date,
    /// `YYYY-MM`
    Month,
    Year,
}

impl Dimension {
    /// Column name used when the dimension is rendered into a view.
    pub fn name(self) -> &'static str {
        match self {
            Dimension::ProductId => record::PRODUCT_ID,
            Dimension::ProductName => record::PRODUCT_NAME,
            Dimension::Brand => record::BRAND,
            Dimension::VendorId => record::VENDOR_ID,
            Dimension::VendorName => record::VENDOR_NAME,
            Dimension::Season => record::SEASON,
            Dimension::Shift => record::SHIFT,
            Dimension::Location => record::LOCATION,
            Dimension::ProcurementType => record::PROCUREMENT_TYPE,
            Dimension::PaymentMode => record::PAYMENT_MODE,
            Dimension::Unit => record::UNIT,
            Dimension::Date => record::DATE,
            Dimension::Month => "month",
            Dimension::Year => "year",
        }
    }

    pub fn value(self, r: &Record) -> Option<String> {
        match self {
            Dimension::ProductId => r.product_id.clone(),
            Dimension::ProductName => r.product_name.clone(),
            Dimension::Brand => r.brand.clone(),
            Dimension::VendorId => r.vendor_id.clone(),
            Dimension::VendorName => r.vendor_name.clone(),
            Dimension::Season => r.season.clone(),
            Dimension::Shift => r.shift.clone(),
            Dimension::Location => r.location.clone(),
            Dimension::ProcurementType => r.procurement_type.clone(),
            Dimension::PaymentMode => r.payment_mode.clone(),
            Dimension::Unit => r.unit.clone(),
            Dimension::Date => Some(r.date.format("%Y-%m-%d").to_string()),
            Dimension::Month => Some(format!("{:04}-{:02}", r.date.year(), r.date.month())),
            Dimension::Year => Some(format!("{:04}", r.date.year())),
        }
    }
}

/// Composite grouping key. `None` parts group together, like SQL NULLs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(pub Vec<Option<String>>);

impl GroupKey {
    pub fn of(r: &Record, dims: &[Dimension]) -> Self {
        GroupKey(dims.iter().map(|d| d.value(r)).collect())
    }

    /// Convenience for single- and multi-part keys built from literals.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupKey(parts.into_iter().map(|p| Some(p.into())).collect())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("all");
        }
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" / ")?;
            }
            f.write_str(part.as_deref().unwrap_or("NULL"))?;
        }
        Ok(())
    }
}

/// A numeric quantity that can be summed per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Quantity,
    PricePerUnit,
    /// `total_cost`, reported as revenue.
    Revenue,
    FatContent,
    SnfContent,
    ProteinContent,
    /// Every record counts as 1.
    Records,
}

impl Measure {
    pub fn value(self, r: &Record) -> Option<f64> {
        match self {
            Measure::Quantity => r.quantity_value(),
            Measure::PricePerUnit => r.price_per_unit,
            Measure::Revenue => r.total_cost,
            Measure::FatContent => r.fat_content,
            Measure::SnfContent => r.snf_content,
            Measure::ProteinContent => r.protein_content,
            Measure::Records => Some(1.0),
        }
    }
}
