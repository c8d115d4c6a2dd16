use std::collections::VecDeque;

/// Rolling close buffer with momentum-percent and simple RSI over it.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    momentum_period: usize,
    rsi_period: usize,
    closes: VecDeque<f64>,
}

impl PriceWindow {
    #[must_use]
    pub fn new(momentum_period: usize, rsi_period: usize) -> Self {
        let capacity = momentum_period.max(rsi_period) + 1;
        Self {
            momentum_period,
            rsi_period,
            closes: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, close: f64) {
        self.closes.push_back(close);
        while self.closes.len() > self.momentum_period.max(self.rsi_period) + 1 {
            self.closes.pop_front();
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.momentum().is_some() && self.rsi().is_some()
    }

    /// Percent change of the latest close against the close `momentum_period` bars ago.
    #[must_use]
    pub fn momentum(&self) -> Option<f64> {
        let n = self.closes.len();
        if n <= self.momentum_period {
            return None;
        }
        let past = self.closes[n - 1 - self.momentum_period];
        let last = self.closes[n - 1];
        (past > 0.0).then(|| (last - past) / past * 100.0)
    }

    /// Cutler's RSI: plain averages of gains and losses over the last `rsi_period` changes.
    #[must_use]
    pub fn rsi(&self) -> Option<f64> {
        let n = self.closes.len();
        if self.rsi_period == 0 || n <= self.rsi_period {
            return None;
        }
        let (gains, losses) = self
            .closes
            .range(n - 1 - self.rsi_period..)
            .zip(self.closes.range(n - self.rsi_period..))
            .fold((0.0, 0.0), |(g, l), (prev, next)| {
                let change = next - prev;
                if change > 0.0 {
                    (g + change, l)
                } else {
                    (g, l - change)
                }
            });

        if losses == 0.0 {
            return Some(if gains == 0.0 { 50.0 } else { 100.0 });
        }
        let rs = gains / losses;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}
