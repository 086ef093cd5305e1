//! Minimal records keyed by ticker. uid, figi and isin are derived from the
//! ticker so lookups in tests can be written without extra bookkeeping.

use imt_schemas::{Bond, Currency, Etf, InstrumentCommon, Share};

pub fn common(prefix: &str, ticker: &str) -> InstrumentCommon {
    InstrumentCommon {
        uid: format!("{prefix}-{ticker}"),
        figi: format!("FIGI-{ticker}"),
        isin: format!("ISIN-{ticker}"),
        ticker: ticker.to_string(),
        name: format!("{ticker} test instrument"),
        lot: 1,
        currency: "rub".to_string(),
        exchange: "MOEX".to_string(),
        trading_status: "SECURITY_TRADING_STATUS_NORMAL_TRADING".to_string(),
        buy_available_flag: true,
        sell_available_flag: true,
        api_trade_available_flag: true,
        ..Default::default()
    }
}

pub fn bond(ticker: &str) -> Bond {
    Bond {
        common: common("bond", ticker),
        nominal: 1000.0,
        coupon_quantity_per_year: 2,
        maturity_date: "2030-01-01T00:00:00Z".to_string(),
        ..Default::default()
    }
}

pub fn share(ticker: &str) -> Share {
    Share {
        common: common("share", ticker),
        sector: "financial".to_string(),
        ..Default::default()
    }
}

pub fn etf(ticker: &str) -> Etf {
    Etf {
        common: common("etf", ticker),
        focus_type: "equity".to_string(),
        ..Default::default()
    }
}

pub fn currency(ticker: &str) -> Currency {
    Currency {
        common: common("ccy", ticker),
        nominal: 1.0,
        iso_currency_name: ticker.to_ascii_lowercase(),
    }
}

/// `n` bonds with tickers `B0000`, `B0001`, ...
pub fn bonds(n: usize) -> Vec<Bond> {
    (0..n).map(|i| bond(&format!("B{i:04}"))).collect()
}

pub fn shares(n: usize) -> Vec<Share> {
    (0..n).map(|i| share(&format!("S{i:04}"))).collect()
}
