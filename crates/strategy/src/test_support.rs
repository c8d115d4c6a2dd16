//! Builders shared by the generator tests.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use regime_engine_core::{Bar, OptionContract, OptionRight};
use rust_decimal::Decimal;

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn bar(open: Decimal, close: Decimal) -> Bar {
    Bar {
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        volume: Decimal::from(1_000),
    }
}

pub fn option(
    underlying: &str,
    today: NaiveDate,
    dte: i64,
    strike: Decimal,
    right: OptionRight,
    delta: f64,
) -> OptionContract {
    let mut c = OptionContract::new(underlying, today + Duration::days(dte), strike, right);
    c.delta = Some(delta);
    c.bid = Some(Decimal::new(100, 2));
    c.ask = Some(Decimal::new(104, 2));
    c.open_interest = Some(1_000);
    c.volume = Some(50);
    c
}
