use std::collections::{BTreeMap, VecDeque};

use chrono::NaiveDate;

/// One close per calendar date. The last close observed on a date wins; a date only
/// counts as completed once a later date has been observed.
#[derive(Debug, Clone)]
pub struct DailyCloses {
    capacity: usize,
    completed: VecDeque<(NaiveDate, f64)>,
    current: Option<(NaiveDate, f64)>,
}

impl DailyCloses {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            completed: VecDeque::with_capacity(capacity),
            current: None,
        }
    }

    pub fn observe(&mut self, date: NaiveDate, close: f64) {
        if !close.is_finite() || close <= 0.0 {
            return;
        }
        match self.current {
            Some((day, _)) if day == date => self.current = Some((date, close)),
            Some((day, _)) if date < day => {}
            Some(previous) => {
                self.push_completed(previous);
                self.current = Some((date, close));
            }
            None => self.current = Some((date, close)),
        }
    }

    /// Appends already-completed closes ahead of anything observed live.
    pub fn seed(&mut self, closes: impl IntoIterator<Item = (NaiveDate, f64)>) {
        let mut merged: BTreeMap<NaiveDate, f64> = self.completed.drain(..).collect();
        for (date, close) in closes {
            if close.is_finite() && close > 0.0 {
                merged.insert(date, close);
            }
        }
        if let Some((today, _)) = self.current {
            merged.retain(|date, _| *date < today);
        }
        for entry in merged {
            self.push_completed(entry);
        }
    }

    #[must_use]
    pub fn completed(&self) -> &VecDeque<(NaiveDate, f64)> {
        &self.completed
    }

    /// Close of the most recent completed day.
    #[must_use]
    pub fn previous_close(&self) -> Option<f64> {
        self.completed.back().map(|(_, c)| *c)
    }

    fn push_completed(&mut self, entry: (NaiveDate, f64)) {
        self.completed.push_back(entry);
        while self.completed.len() > self.capacity {
            self.completed.pop_front();
        }
    }
}

/// Log returns of consecutive closes.
#[must_use]
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

/// Completed daily closes for the broad index and the volatility index.
#[derive(Debug, Clone)]
pub struct ReferenceHistory {
    lookback: usize,
    index: DailyCloses,
    volatility: DailyCloses,
}

impl ReferenceHistory {
    /// Each series keeps twice the `lookback + 1` closes a fit needs, so dates missing
    /// from one series still leave a full window after alignment.
    #[must_use]
    pub fn new(lookback: usize) -> Self {
        let capacity = 2 * (lookback + 1);
        Self {
            lookback,
            index: DailyCloses::new(capacity),
            volatility: DailyCloses::new(capacity),
        }
    }

    pub fn observe(&mut self, date: NaiveDate, index_close: Option<f64>, volatility_close: Option<f64>) {
        if let Some(close) = index_close {
            self.index.observe(date, close);
        }
        if let Some(close) = volatility_close {
            self.volatility.observe(date, close);
        }
    }

    pub fn seed(
        &mut self,
        index: impl IntoIterator<Item = (NaiveDate, f64)>,
        volatility: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) {
        self.index.seed(index);
        self.volatility.seed(volatility);
    }

    /// Log returns over the latest `lookback + 1` dates both series have a completed
    /// close for.
    #[must_use]
    pub fn aligned_returns(&self) -> (Vec<f64>, Vec<f64>) {
        let volatility: BTreeMap<NaiveDate, f64> =
            self.volatility.completed().iter().copied().collect();
        let aligned: Vec<(f64, f64)> = self
            .index
            .completed()
            .iter()
            .filter_map(|(date, close)| volatility.get(date).map(|v| (*close, *v)))
            .collect();
        let start = aligned.len().saturating_sub(self.lookback + 1);
        let (index_closes, volatility_closes): (Vec<f64>, Vec<f64>) =
            aligned[start..].iter().copied().unzip();
        (log_returns(&index_closes), log_returns(&volatility_closes))
    }
}
