/// Min/max percentile scaler over one scoring pass.
///
/// Values are folded into a running `[min, max]` with [`add_possible_value`],
/// then each item is placed on that range and multiplied by `scale`. A fresh
/// scorer must be built per pass; it carries no state besides the range.
///
/// [`add_possible_value`]: PercentileScorer::add_possible_value
pub struct PercentileScorer<T> {
    value_fn: fn(&T) -> Option<f64>,
    scale: f64,
    range: Option<(f64, f64)>,
}

impl<T> PercentileScorer<T> {
    pub fn new(value_fn: fn(&T) -> Option<f64>, scale: f64) -> Self {
        Self { value_fn, scale, range: None }
    }

    /// Widen the observed range with this item's value. Missing or NaN values
    /// leave the range untouched.
    pub fn add_possible_value(&mut self, item: &T) {
        let Some(value) = numeric((self.value_fn)(item)) else {
            return;
        };
        self.range = Some(match self.range {
            None => (value, value),
            Some((min, max)) => (min.min(value), max.max(value)),
        });
    }

    pub fn has_range(&self) -> bool {
        self.range.is_some()
    }

    /// `scale * (value - min) / (max - min)`.
    ///
    /// None when no range was observed, when the item has no value, or when
    /// the range is a single point the item does not sit on.
    pub fn scaled_percentile(&self, item: &T) -> Option<f64> {
        let (min, max) = self.range?;
        let value = numeric((self.value_fn)(item))?;
        if min == max {
            return (value == min).then_some(self.scale);
        }
        Some(self.scale * (value - min) / (max - min))
    }

    /// Team defense ranking variant: a scorer that never saw a numeric value
    /// ranks everything at full scale instead of returning None.
    pub fn scaled_percentile_or_full(&self, item: &T) -> Option<f64> {
        if !self.has_range() {
            return Some(self.scale);
        }
        self.scaled_percentile(item)
    }
}

fn numeric(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}
