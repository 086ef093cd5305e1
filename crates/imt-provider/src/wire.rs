//! JSON shapes returned by the InstrumentsService REST gateway.
//!
//! The gateway serializes protobuf messages: zero values are omitted, int64
//! fields arrive as strings and prices arrive as `{units, nano}` quotations.
//! Every field therefore defaults when absent.

use imt_schemas::{Bond, Currency, Etf, InstrumentCommon, Share};
use serde::{Deserialize, Deserializer};

/// Fixed-point price: `units` whole part (int64 as string) plus `nano` billionths.
/// `MoneyValue` shares the layout and adds a currency we do not keep.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Quotation {
    #[serde(deserialize_with = "string_or_number")]
    pub units: String,
    pub nano: i32,
}

impl Quotation {
    pub fn to_f64(&self) -> f64 {
        self.to_f64_or(0.0)
    }

    /// Unparseable `units` yield `fallback`.
    pub fn to_f64_or(&self, fallback: f64) -> f64 {
        match self.units.trim().parse::<f64>() {
            Ok(units) => units + f64::from(self.nano) / 1e9,
            Err(_) => fallback,
        }
    }
}

/// Response envelope. `None` when the field is missing or null.
#[derive(Debug, Deserialize)]
pub struct InstrumentsResponse<T> {
    pub instruments: Option<Vec<T>>,
}

fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        S(String),
        I(i64),
        F(f64),
    }

    Ok(match Option::<Raw>::deserialize(de)? {
        Some(Raw::S(s)) => s,
        Some(Raw::I(i)) => i.to_string(),
        Some(Raw::F(f)) => f.to_string(),
        None => String::new(),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommonWire {
    pub uid: String,
    pub figi: String,
    pub ticker: String,
    pub position_uid: String,
    pub class_code: String,
    pub isin: String,
    pub lot: i32,
    pub currency: String,
    pub klong: Quotation,
    pub kshort: Quotation,
    pub dlong: Quotation,
    pub dshort: Quotation,
    pub dlong_min: Quotation,
    pub dshort_min: Quotation,
    pub exchange: String,
    pub real_exchange: String,
    pub short_enabled_flag: bool,
    pub name: String,
    pub country_of_risk_name: String,
    pub trading_status: String,
    pub otc_flag: bool,
    pub buy_available_flag: bool,
    pub sell_available_flag: bool,
    pub min_price_increment: Quotation,
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

impl From<CommonWire> for InstrumentCommon {
    fn from(w: CommonWire) -> Self {
        InstrumentCommon {
            uid: w.uid,
            figi: w.figi,
            ticker: w.ticker,
            position_uid: w.position_uid,
            class_code: w.class_code,
            isin: w.isin,
            lot: w.lot,
            currency: w.currency,
            klong: w.klong.to_f64(),
            kshort: w.kshort.to_f64(),
            dlong: w.dlong.to_f64(),
            dshort: w.dshort.to_f64(),
            dlong_min: w.dlong_min.to_f64(),
            dshort_min: w.dshort_min.to_f64(),
            exchange: w.exchange,
            real_exchange: w.real_exchange,
            short_enabled_flag: w.short_enabled_flag,
            name: w.name,
            country_of_risk_name: w.country_of_risk_name,
            trading_status: w.trading_status,
            otc_flag: w.otc_flag,
            buy_available_flag: w.buy_available_flag,
            sell_available_flag: w.sell_available_flag,
            min_price_increment: w.min_price_increment.to_f64(),
            api_trade_available_flag: w.api_trade_available_flag,
            asset_uid: w.asset_uid,
            for_iis_flag: w.for_iis_flag,
            for_qual_investor_flag: w.for_qual_investor_flag,
            weekend_flag: w.weekend_flag,
            blocked_tca_flag: w.blocked_tca_flag,
            liquidity_flag: w.liquidity_flag,
            first_1min_candle_date: w.first_1min_candle_date,
            first_1day_candle_date: w.first_1day_candle_date,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BondWire {
    #[serde(flatten)]
    pub common: CommonWire,
    pub aci_value: Quotation,
    pub amortization_flag: bool,
    pub country_of_risk: String,
    pub coupon_quantity_per_year: i32,
    pub floating_coupon_flag: bool,
    pub initial_nominal: Quotation,
    pub issue_kind: String,
    #[serde(deserialize_with = "string_or_number")]
    pub issue_size: String,
    #[serde(deserialize_with = "string_or_number")]
    pub issue_size_plan: String,
    pub maturity_date: String,
    pub nominal: Quotation,
    pub perpetual_flag: bool,
    pub placement_date: String,
    pub placement_price: Quotation,
    pub risk_level: String,
    pub sector: String,
    pub state_reg_date: String,
    pub subordinated_flag: bool,
    pub bond_type: String,
}

impl From<BondWire> for Bond {
    fn from(w: BondWire) -> Self {
        Bond {
            common: w.common.into(),
            aci_value: w.aci_value.to_f64(),
            amortization_flag: w.amortization_flag,
            country_of_risk: w.country_of_risk,
            coupon_quantity_per_year: w.coupon_quantity_per_year,
            floating_coupon_flag: w.floating_coupon_flag,
            initial_nominal: w.initial_nominal.to_f64(),
            issue_kind: w.issue_kind,
            issue_size: w.issue_size,
            issue_size_plan: w.issue_size_plan,
            maturity_date: w.maturity_date,
            nominal: w.nominal.to_f64(),
            perpetual_flag: w.perpetual_flag,
            placement_date: w.placement_date,
            placement_price: w.placement_price.to_f64(),
            risk_level: w.risk_level,
            sector: w.sector,
            state_reg_date: w.state_reg_date,
            subordinated_flag: w.subordinated_flag,
            bond_type: w.bond_type,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShareWire {
    #[serde(flatten)]
    pub common: CommonWire,
    pub div_yield_flag: bool,
    pub ipo_date: String,
    #[serde(deserialize_with = "string_or_number")]
    pub issue_size: String,
    #[serde(deserialize_with = "string_or_number")]
    pub issue_size_plan: String,
    pub nominal: Quotation,
    pub sector: String,
    pub share_type: String,
}

impl From<ShareWire> for Share {
    fn from(w: ShareWire) -> Self {
        Share {
            common: w.common.into(),
            div_yield_flag: w.div_yield_flag,
            ipo_date: w.ipo_date,
            issue_size: w.issue_size,
            issue_size_plan: w.issue_size_plan,
            nominal: w.nominal.to_f64(),
            sector: w.sector,
            share_type: w.share_type,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EtfWire {
    #[serde(flatten)]
    pub common: CommonWire,
    pub fixed_commission: Quotation,
    pub focus_type: String,
    pub released_date: String,
    pub num_shares: Quotation,
    pub sector: String,
    pub rebalancing_freq: String,
}

impl From<EtfWire> for Etf {
    fn from(w: EtfWire) -> Self {
        Etf {
            common: w.common.into(),
            fixed_commission: w.fixed_commission.to_f64(),
            focus_type: w.focus_type,
            released_date: w.released_date,
            num_shares: w.num_shares.to_f64(),
            sector: w.sector,
            rebalancing_freq: w.rebalancing_freq,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrencyWire {
    #[serde(flatten)]
    pub common: CommonWire,
    pub nominal: Quotation,
    pub iso_currency_name: String,
}

impl From<CurrencyWire> for Currency {
    fn from(w: CurrencyWire) -> Self {
        Currency {
            common: w.common.into(),
            nominal: w.nominal.to_f64(),
            iso_currency_name: w.iso_currency_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotation_to_f64() {
        let q = Quotation {
            units: "114".to_string(),
            nano: 250_000_000,
        };
        assert!((q.to_f64() - 114.25).abs() < 1e-9);

        let neg = Quotation {
            units: "-1".to_string(),
            nano: -500_000_000,
        };
        assert!((neg.to_f64() + 1.5).abs() < 1e-9);
    }

    #[test]
    fn quotation_bad_units_fall_back() {
        let q = Quotation {
            units: "n/a".to_string(),
            nano: 5,
        };
        assert_eq!(q.to_f64(), 0.0);
        assert_eq!(q.to_f64_or(-1.0), -1.0);
        assert_eq!(Quotation::default().to_f64(), 0.0);
    }

    #[test]
    fn money_value_decodes_as_quotation() {
        let q: Quotation =
            serde_json::from_str(r#"{"currency":"rub","units":"1000","nano":0}"#).unwrap();
        assert_eq!(q.to_f64(), 1000.0);
    }

    #[test]
    fn bond_wire_maps_nested_prices_and_int64_strings() {
        let raw = r#"{
            "uid": "b-1",
            "figi": "BBG00000001",
            "ticker": "SU26238RMFS4",
            "lot": 1,
            "klong": {"units": "2", "nano": 0},
            "minPriceIncrement": {"units": "0", "nano": 1000000},
            "first1minCandleDate": "2021-06-16T07:00:00Z",
            "aciValue": {"currency": "rub", "units": "12", "nano": 340000000},
            "couponQuantityPerYear": 2,
            "issueSize": "350000000",
            "issueSizePlan": 350000000,
            "nominal": {"currency": "rub", "units": "1000", "nano": 0},
            "riskLevel": "RISK_LEVEL_LOW"
        }"#;
        let w: BondWire = serde_json::from_str(raw).unwrap();
        let b = Bond::from(w);

        assert_eq!(b.common.uid, "b-1");
        assert_eq!(b.common.ticker, "SU26238RMFS4");
        assert_eq!(b.common.klong, 2.0);
        assert!((b.common.min_price_increment - 0.001).abs() < 1e-12);
        assert_eq!(b.common.first_1min_candle_date, "2021-06-16T07:00:00Z");
        assert!((b.aci_value - 12.34).abs() < 1e-9);
        assert_eq!(b.coupon_quantity_per_year, 2);
        assert_eq!(b.issue_size, "350000000");
        assert_eq!(b.issue_size_plan, "350000000");
        assert_eq!(b.nominal, 1000.0);
        assert_eq!(b.risk_level, "RISK_LEVEL_LOW");
        // omitted zero values
        assert!(!b.perpetual_flag);
        assert_eq!(b.placement_price, 0.0);
    }

    #[test]
    fn envelope_distinguishes_missing_from_empty() {
        let missing: InstrumentsResponse<CurrencyWire> = serde_json::from_str("{}").unwrap();
        assert!(missing.instruments.is_none());

        let null: InstrumentsResponse<CurrencyWire> =
            serde_json::from_str(r#"{"instruments":null}"#).unwrap();
        assert!(null.instruments.is_none());

        let empty: InstrumentsResponse<CurrencyWire> =
            serde_json::from_str(r#"{"instruments":[]}"#).unwrap();
        assert_eq!(empty.instruments.map(|v| v.len()), Some(0));
    }
}
