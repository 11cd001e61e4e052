/// Column-name constants for the dairy transaction table and derived views.
/// Single source of truth - exported to Python via PyO3.

// ── Record columns ──────────────────────────────────────────────────────────
pub mod record {
    use super::flags;

    pub const RECORD_ID: &str = "record_id";
    pub const DATE: &str = "date";
    pub const EXPIRY_DATE: &str = "expiry_date";
    pub const PRODUCT_ID: &str = "product_id";
    pub const PRODUCT_NAME: &str = "product_name";
    pub const BRAND: &str = "brand";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT: &str = "unit";
    pub const PRICE_PER_UNIT: &str = "price_per_unit";
    pub const TOTAL_COST: &str = "total_cost";
    pub const VENDOR_ID: &str = "vendor_id";
    pub const VENDOR_NAME: &str = "vendor_name";
    pub const PROCUREMENT_TYPE: &str = "procurement_type";
    pub const PAYMENT_MODE: &str = "payment_mode";
    pub const LOCATION: &str = "location";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const SEASON: &str = "season";
    pub const SHIFT: &str = "shift";
    pub const FAT_CONTENT: &str = "fat_content";
    pub const SNF_CONTENT: &str = "snf_content";
    pub const PROTEIN_CONTENT: &str = "protein_content";

    pub const REQUIRED: [&str; 2] = [RECORD_ID, DATE];

    pub const ALL: [&str; 25] = [
        RECORD_ID,
        DATE,
        EXPIRY_DATE,
        PRODUCT_ID,
        PRODUCT_NAME,
        BRAND,
        QUANTITY,
        UNIT,
        PRICE_PER_UNIT,
        TOTAL_COST,
        VENDOR_ID,
        VENDOR_NAME,
        PROCUREMENT_TYPE,
        PAYMENT_MODE,
        LOCATION,
        LATITUDE,
        LONGITUDE,
        SEASON,
        SHIFT,
        FAT_CONTENT,
        SNF_CONTENT,
        PROTEIN_CONTENT,
        flags::ADDED_SUGAR,
        flags::IS_ORGANIC,
        flags::RETURN_FLAG,
    ];
}

// ── Flag columns ────────────────────────────────────────────────────────────
pub mod flags {
    pub const ADDED_SUGAR: &str = "added_sugar";
    pub const IS_ORGANIC: &str = "is_organic";
    pub const RETURN_FLAG: &str = "return_flag";

    pub const ALL: [&str; 3] = [ADDED_SUGAR, IS_ORGANIC, RETURN_FLAG];
}

// ── Audit columns ───────────────────────────────────────────────────────────
pub mod audit {
    pub const FIELD: &str = "field";
    pub const NULL_COUNT: &str = "null_count";
}

// ── View columns ────────────────────────────────────────────────────────────
pub mod view {
    pub const VALUE: &str = "value";
    pub const RANK: &str = "rank";
    pub const TOTAL: &str = "total";
    pub const FLAGGED: &str = "flagged";
    pub const RATE: &str = "rate";
    pub const TOTAL_QUANTITY: &str = "total_quantity";
    pub const TOTAL_REVENUE: &str = "total_revenue";
    pub const ORDER_COUNT: &str = "order_count";
    pub const MOVING_AVERAGE: &str = "moving_average";
    pub const PREVIOUS: &str = "previous";
    pub const GROWTH_PCT: &str = "growth_pct";
    pub const SHARE_PCT: &str = "share_pct";
}
