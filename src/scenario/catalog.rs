//! The sixteen historical scenarios.
//!
//! Four market events, four tickers each. Every scenario carries its
//! expected alerts and a synthetic model used when no recorded bars are
//! supplied.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::checker::AlertLabel::{FlashCrash, OrderImbalance, PriceSpike, Volatility, VolumeSurge};
use crate::checker::{AlertLabel, ExpectedLabel, GoldenExpectation};

use super::synthetic::{CandleShape, MarketModel, PricePhase};

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketEvent {
    MemeFrenzy,
    FlashCrash2010,
    CovidCrash,
    QuietBaseline,
}

impl MarketEvent {
    pub const ALL: [MarketEvent; 4] = [
        Self::MemeFrenzy,
        Self::FlashCrash2010,
        Self::CovidCrash,
        Self::QuietBaseline,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::MemeFrenzy => "Meme_Frenzy_Jan2021",
            Self::FlashCrash2010 => "Flash_Crash_May2010",
            Self::CovidCrash => "COVID_Crash_Mar2020",
            Self::QuietBaseline => "Normal_Baseline",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::MemeFrenzy => "Retail short squeeze: GME, AMC, BB, NOK",
            Self::FlashCrash2010 => "Algorithmic flash crash: SPY, PG, AAPL, ACN",
            Self::CovidCrash => "COVID market crash: SPY, JETS, TSLA, ZM",
            Self::QuietBaseline => "Quiet trading day, the chip should stay silent",
        }
    }

    fn ymd(&self) -> (i32, u32, u32) {
        match self {
            Self::MemeFrenzy => (2021, 1, 28),
            Self::FlashCrash2010 => (2010, 5, 6),
            Self::CovidCrash => (2020, 3, 16),
            Self::QuietBaseline => (2019, 6, 4),
        }
    }

    pub fn date(&self) -> NaiveDate {
        let (y, m, d) = self.ymd();
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    /// 09:30 New York time in UTC (EST in January, EDT otherwise).
    pub fn session_open(&self) -> DateTime<Utc> {
        let utc_hour = match self {
            Self::MemeFrenzy => 14,
            _ => 13,
        };
        let time = NaiveTime::from_hms_opt(utc_hour, 30, 0).unwrap_or_default();
        Utc.from_utc_datetime(&self.date().and_time(time))
    }

    /// Case-insensitive match on the event name or a short alias.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::ALL.iter().copied().find(|e| {
            e.name().eq_ignore_ascii_case(&lower)
                || match e {
                    Self::MemeFrenzy => lower == "meme",
                    Self::FlashCrash2010 => lower == "flash",
                    Self::CovidCrash => lower == "covid",
                    Self::QuietBaseline => lower == "quiet" || lower == "baseline",
                }
        })
    }
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub event: MarketEvent,
    pub ticker: &'static str,
    pub label: &'static str,
    pub expected: &'static [AlertLabel],
}

impl Scenario {
    const fn new(
        event: MarketEvent,
        ticker: &'static str,
        label: &'static str,
        expected: &'static [AlertLabel],
    ) -> Self {
        Self {
            event,
            ticker,
            label,
            expected,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.event.date()
    }

    /// `<TICKER>_<YYYYMMDD>`
    pub fn stem(&self) -> String {
        format!("{}_{}", self.ticker, self.date().format("%Y%m%d"))
    }

    pub fn golden(&self) -> GoldenExpectation {
        GoldenExpectation::new(
            self.ticker,
            self.date(),
            self.expected.iter().copied().map(ExpectedLabel::rule_or_ml),
        )
    }

    /// Synthetic model for this scenario's session.
    pub fn model(&self) -> MarketModel {
        use MarketEvent::*;
        use PricePhase::{Path, Shift};

        let abs = |up, down| CandleShape::Absolute { up, down };
        let rel = |up, down| CandleShape::Relative { up, down };

        match (self.event, self.ticker) {
            (MemeFrenzy, "GME") => MarketModel::new(42, 148.0, 1e6)
                .drift(0.8)
                .noise(6.0, 4e5)
                .phase(Path { start: 120, end: 200, from: 244.0, to: 481.0 })
                .phase(Path { start: 200, end: 390, from: 483.0, to: 124.0 })
                .burst(120, 200, 6.0)
                .burst(200, 390, 7.0)
                .clip((50.0, 600.0), (1e5, 2e7))
                .shape(abs(3.0, 3.0)),
            (MemeFrenzy, "AMC") => MarketModel::new(43, 5.0, 2e6)
                .drift(0.015)
                .noise(0.5, 3e5)
                .phase(Shift { start: 150, end: 220, from: 0.0, to: 8.0 })
                .phase(Shift { start: 220, end: 390, from: 0.0, to: -5.0 })
                .burst(150, 220, 4.0)
                .clip((2.0, 25.0), (1e5, 3e7))
                .shape(rel(0.01, 0.01)),
            (MemeFrenzy, "BB") => MarketModel::new(44, 14.0, 5e5)
                .noise(0.5, 5e4)
                .phase(Shift { start: 100, end: 180, from: 0.0, to: 4.0 })
                .phase(Shift { start: 180, end: 390, from: 0.0, to: -3.0 })
                .burst(100, 180, 2.5)
                .clip((10.0, 25.0), (1e4, 5e6))
                .shape(rel(0.005, 0.005)),
            (MemeFrenzy, _) => MarketModel::new(45, 4.5, 3e5)
                .noise(0.1, 3e4)
                .phase(Shift { start: 120, end: 160, from: 0.0, to: 1.2 })
                .phase(Shift { start: 160, end: 390, from: 0.0, to: -0.8 })
                .burst(120, 160, 2.2)
                .clip((3.0, 7.0), (1e4, 5e6))
                .shape(rel(0.003, 0.003)),

            (FlashCrash2010, "SPY") => MarketModel::new(50, 120.0, 3e6)
                .noise(0.3, 2e5)
                .phase(Path { start: 170, end: 205, from: 120.0, to: 108.0 })
                .phase(Path { start: 205, end: 235, from: 108.0, to: 116.0 })
                .phase(Path { start: 235, end: 390, from: 116.0, to: 116.0 })
                .burst(170, 235, 5.0)
                .clip((100.0, 130.0), (1e5, 5e7))
                .shape(abs(0.2, 0.2)),
            (FlashCrash2010, "PG") => MarketModel::new(51, 60.0, 2e5)
                .noise(0.2, 2e4)
                .phase(Path { start: 175, end: 180, from: 60.0, to: 1.0 })
                .phase(Path { start: 180, end: 190, from: 1.0, to: 58.0 })
                .burst(170, 195, 10.0)
                .clip((0.01, 70.0), (1e3, 1e7))
                .shape(rel(0.005, 0.005)),
            (FlashCrash2010, "AAPL") => MarketModel::new(52, 262.0, 5e6)
                .noise(1.0, 5e5)
                .phase(Shift { start: 170, end: 200, from: 0.0, to: -14.0 })
                .phase(Shift { start: 200, end: 230, from: -14.0, to: -4.0 })
                .phase(Shift { start: 230, end: 390, from: -4.0, to: -4.0 })
                .burst(165, 205, 3.0)
                .clip((240.0, 280.0), (1e5, 5e7))
                .shape(abs(0.5, 0.5)),
            (FlashCrash2010, _) => MarketModel::new(53, 41.0, 1e5)
                .noise(0.2, 1e4)
                .phase(Path { start: 176, end: 177, from: 10.0, to: 10.0 })
                .phase(Path { start: 177, end: 179, from: 0.01, to: 0.01 })
                .phase(Path { start: 179, end: 185, from: 0.01, to: 38.0 })
                .burst(172, 188, 8.0)
                .clip((0.01, 50.0), (1e3, 5e6))
                .shape(rel(0.01, 0.5)),

            (CovidCrash, "SPY") => MarketModel::new(60, 270.0, 8e6)
                .drift(-30.0 / 390.0)
                .noise(1.5, 1e6)
                .phase(Path { start: 0, end: 30, from: 290.0, to: 270.0 })
                .burst(0, 100, 2.0)
                .clip((220.0, 300.0), (1e5, 1e8))
                .shape(abs(1.0, 2.0)),
            (CovidCrash, "JETS") => MarketModel::new(61, 22.0, 3e6)
                .drift(-8.0 / 390.0)
                .noise(0.5, 5e5)
                .burst(0, 60, 3.0)
                .clip((10.0, 28.0), (1e4, 2e7))
                .shape(abs(0.3, 0.5)),
            (CovidCrash, "TSLA") => MarketModel::new(62, 130.0, 5e7)
                .noise(2.0, 5e6)
                .phase(Shift { start: 0, end: 130, from: 0.0, to: -25.0 })
                .phase(Shift { start: 130, end: 260, from: 0.0, to: 15.0 })
                .clip((90.0, 165.0), (1e6, 3e8))
                .shape(abs(2.0, 3.0)),
            (CovidCrash, _) => MarketModel::new(63, 110.0, 4e6)
                .drift(50.0 / 390.0)
                .noise(3.0, 8e5)
                .burst(0, 100, 2.5)
                .clip((90.0, 180.0), (1e5, 3e7))
                .shape(abs(2.0, 1.0)),

            (QuietBaseline, ticker) => {
                let (seed, base_price, base_volume) = match ticker {
                    "SPY" => (70, 285.0, 5e6),
                    "MSFT" => (71, 130.0, 2e7),
                    "KO" => (72, 55.0, 1e7),
                    "GLD" => (73, 135.0, 8e6),
                    _ => (74, 100.0, 5e6),
                };
                MarketModel::new(seed, base_price, base_volume)
                    .noise(0.3, base_volume * 0.05)
                    .clip(
                        (base_price * 0.95, base_price * 1.05),
                        (base_volume * 0.5, base_volume * 2.0),
                    )
                    .shape(abs(0.1, 0.1))
            }
        }
    }
}

const CATALOG: [Scenario; 16] = [
    Scenario::new(
        MarketEvent::MemeFrenzy,
        "GME",
        "GameStop, the epicenter: $148 to $483 to $112",
        &[FlashCrash, VolumeSurge, PriceSpike, OrderImbalance],
    ),
    Scenario::new(
        MarketEvent::MemeFrenzy,
        "AMC",
        "AMC Entertainment, same frenzy at lower intensity",
        &[VolumeSurge, PriceSpike, OrderImbalance],
    ),
    Scenario::new(
        MarketEvent::MemeFrenzy,
        "BB",
        "BlackBerry, moderate spike near the sensitivity threshold",
        &[PriceSpike, VolumeSurge],
    ),
    Scenario::new(
        MarketEvent::MemeFrenzy,
        "NOK",
        "Nokia, quietest of the four, near the false-positive boundary",
        &[VolumeSurge],
    ),
    Scenario::new(
        MarketEvent::FlashCrash2010,
        "SPY",
        "S&P 500 ETF, broad market down 9% in 15 minutes",
        &[FlashCrash, Volatility, VolumeSurge],
    ),
    Scenario::new(
        MarketEvent::FlashCrash2010,
        "PG",
        "Procter & Gamble, $60 to near zero for a moment",
        &[FlashCrash, PriceSpike],
    ),
    Scenario::new(
        MarketEvent::FlashCrash2010,
        "AAPL",
        "Apple, blue chip dragged down with the market",
        &[FlashCrash, VolumeSurge],
    ),
    Scenario::new(
        MarketEvent::FlashCrash2010,
        "ACN",
        "Accenture, printed at $0.01",
        &[FlashCrash, PriceSpike],
    ),
    Scenario::new(
        MarketEvent::CovidCrash,
        "SPY",
        "S&P 500, down 12% in one session",
        &[FlashCrash, Volatility, VolumeSurge],
    ),
    Scenario::new(
        MarketEvent::CovidCrash,
        "JETS",
        "Airlines ETF, the hardest-hit sector",
        &[FlashCrash, VolumeSurge, OrderImbalance],
    ),
    Scenario::new(
        MarketEvent::CovidCrash,
        "TSLA",
        "Tesla, crash then partial recovery (alert clearing)",
        &[FlashCrash, Volatility],
    ),
    Scenario::new(
        MarketEvent::CovidCrash,
        "ZM",
        "Zoom rallied on the crash day: must not flag FLASH_CRASH",
        &[VolumeSurge, PriceSpike],
    ),
    Scenario::new(
        MarketEvent::QuietBaseline,
        "SPY",
        "S&P 500, an ordinary Tuesday",
        &[],
    ),
    Scenario::new(MarketEvent::QuietBaseline, "MSFT", "Microsoft, steady blue chip", &[]),
    Scenario::new(
        MarketEvent::QuietBaseline,
        "KO",
        "Coca-Cola, ultra-low volatility",
        &[],
    ),
    Scenario::new(
        MarketEvent::QuietBaseline,
        "GLD",
        "Gold ETF, a slow-moving asset class",
        &[],
    ),
];

pub fn catalog() -> &'static [Scenario] {
    &CATALOG
}

/// Scenarios matching an optional event and ticker filter.
pub fn select(event: Option<MarketEvent>, ticker: Option<&str>) -> Vec<&'static Scenario> {
    CATALOG
        .iter()
        .filter(|s| event.map_or(true, |e| s.event == e))
        .filter(|s| ticker.map_or(true, |t| s.ticker.eq_ignore_ascii_case(t)))
        .collect()
}
