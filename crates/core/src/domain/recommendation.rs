use crate::domain::quote::{QuoteMetrics, QuoteSummary};
use crate::time::earnings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const PE_RATIO_CEILING: f64 = 100.0;
const PE_RATIO_BUY_BELOW: f64 = 50.0;
const TAKE_PROFIT_RATE: f64 = 50.0;
const TOLERATED_LOSS_RATE: f64 = -30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Buy,
    Hold,
    Sell,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Buy => "buy",
            Status::Hold => "hold",
            Status::Sell => "sell",
        }
    }

    /// Tag colour used by the dashboard table; hold renders with the neutral default.
    pub fn tag_color(self) -> Option<&'static str> {
        match self {
            Status::Buy => Some("green"),
            Status::Sell => Some("red"),
            Status::Hold => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub status: Status,
    /// Percent gain of the previous close over the unit price. Zero when nothing was bought.
    pub profit_rate: f64,
}

pub fn recommend(quote: &QuoteSummary, unit_price: f64) -> Recommendation {
    recommend_at(&quote.metrics(), unit_price, Utc::now())
}

/// Maps a cost basis and a quote to a signal. `unit_price == 0` means "not purchased yet".
pub fn recommend_at(metrics: &QuoteMetrics, unit_price: f64, now: DateTime<Utc>) -> Recommendation {
    let QuoteMetrics {
        previous_close,
        pe_ratio,
        eps,
        earnings_date,
    } = *metrics;

    if unit_price == 0.0 {
        let status = if pe_ratio > PE_RATIO_CEILING {
            Status::Hold
        } else if eps > 0.0 {
            Status::Buy
        } else {
            Status::Hold
        };
        return Recommendation {
            status,
            profit_rate: 0.0,
        };
    }

    let has_profit = previous_close > unit_price;
    let profit_rate = ((previous_close - unit_price) / unit_price) * 100.0;

    let close_to_earnings = earnings_date
        .map(|d| earnings::is_within_blackout(now, d))
        .unwrap_or(false);

    // Don't act on a winning position right before earnings.
    if close_to_earnings && has_profit {
        return Recommendation {
            status: Status::Hold,
            profit_rate,
        };
    }

    let status = if has_profit {
        if profit_rate > TAKE_PROFIT_RATE || pe_ratio > PE_RATIO_CEILING {
            Status::Sell
        } else {
            valuation_status(pe_ratio, eps)
        }
    } else if profit_rate > TOLERATED_LOSS_RATE {
        Status::Hold
    } else if pe_ratio > PE_RATIO_CEILING {
        Status::Sell
    } else {
        valuation_status(pe_ratio, eps)
    };

    Recommendation {
        status,
        profit_rate,
    }
}

fn valuation_status(pe_ratio: f64, eps: f64) -> Status {
    if eps > 0.0 && pe_ratio < PE_RATIO_BUY_BELOW {
        Status::Buy
    } else {
        Status::Hold
    }
}
