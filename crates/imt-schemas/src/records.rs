//! Instrument records as held in memory.
//!
//! Every category shares [`InstrumentCommon`]; the category structs add only
//! their own fields. Records are plain values: the cache hands out snapshots
//! of them, never mutable references.

use serde::{Deserialize, Serialize};

/// Identifiers and trading metadata present on every instrument kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentCommon {
    /// Unique instrument id. Record identity.
    pub uid: String,
    pub figi: String,
    pub ticker: String,
    pub position_uid: String,
    pub class_code: String,
    pub isin: String,
    pub lot: i32,
    /// Settlement currency code (e.g. `"rub"`).
    pub currency: String,
    pub klong: f64,
    pub kshort: f64,
    pub dlong: f64,
    pub dshort: f64,
    pub dlong_min: f64,
    pub dshort_min: f64,
    pub exchange: String,
    pub real_exchange: String,
    pub short_enabled_flag: bool,
    pub name: String,
    pub country_of_risk_name: String,
    pub trading_status: String,
    pub otc_flag: bool,
    pub buy_available_flag: bool,
    pub sell_available_flag: bool,
    pub min_price_increment: f64,
    pub api_trade_available_flag: bool,
    pub asset_uid: String,
    pub for_iis_flag: bool,
    pub for_qual_investor_flag: bool,
    pub weekend_flag: bool,
    pub blocked_tca_flag: bool,
    pub liquidity_flag: bool,
    pub first_1min_candle_date: String,
    pub first_1day_candle_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bond {
    #[serde(flatten)]
    pub common: InstrumentCommon,
    pub aci_value: f64,
    pub amortization_flag: bool,
    pub country_of_risk: String,
    pub coupon_quantity_per_year: i32,
    pub floating_coupon_flag: bool,
    pub initial_nominal: f64,
    pub issue_kind: String,
    pub issue_size: String,
    pub issue_size_plan: String,
    pub maturity_date: String,
    pub nominal: f64,
    pub perpetual_flag: bool,
    pub placement_date: String,
    pub placement_price: f64,
    pub risk_level: String,
    pub sector: String,
    pub state_reg_date: String,
    pub subordinated_flag: bool,
    pub bond_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    #[serde(flatten)]
    pub common: InstrumentCommon,
    pub div_yield_flag: bool,
    pub ipo_date: String,
    pub issue_size: String,
    pub issue_size_plan: String,
    pub nominal: f64,
    pub sector: String,
    pub share_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Etf {
    #[serde(flatten)]
    pub common: InstrumentCommon,
    pub fixed_commission: f64,
    pub focus_type: String,
    pub released_date: String,
    pub num_shares: f64,
    pub sector: String,
    pub rebalancing_freq: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    #[serde(flatten)]
    pub common: InstrumentCommon,
    pub nominal: f64,
    pub iso_currency_name: String,
}
