use std::collections::VecDeque;

use crate::reasoner::types::FeatureValue;

/// Bounded FIFO window of raw samples; the oldest entry goes first.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    capacity: usize,
    samples: VecDeque<Vec<FeatureValue>>,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn push(&mut self, sample: Vec<FeatureValue>) -> usize {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        self.samples.len()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<FeatureValue>> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&Vec<FeatureValue>> {
        self.samples.back()
    }

    pub fn aggregate(&self) -> Vec<FeatureValue> {
        aggregate_states(self.samples.iter().map(|s| s.as_slice()))
    }
}

/// Collapses a window of samples into one.
///
/// A single sample comes back unchanged. Otherwise a column whose values
/// are numeric in every sample is averaged, and any other column carries
/// the most recent sample's value forward untouched.
pub fn aggregate_states<'a, I>(window: I) -> Vec<FeatureValue>
where
    I: IntoIterator<Item = &'a [FeatureValue]>,
{
    let rows: Vec<&[FeatureValue]> = window.into_iter().filter(|r| !r.is_empty()).collect();
    let Some(latest) = rows.last() else {
        return Vec::new();
    };
    if rows.len() == 1 {
        return latest.to_vec();
    }

    let width = rows[0].len();
    (0..width)
        .map(|col| {
            let mut sum = 0.0;
            for row in &rows {
                match row.get(col).and_then(FeatureValue::as_number) {
                    Some(v) => sum += v,
                    None => return latest.get(col).cloned().unwrap_or(FeatureValue::Missing),
                }
            }
            FeatureValue::Number(sum / rows.len() as f64)
        })
        .collect()
}
