/// Intensity-weighted 1D histogram with uniform bins.
///
/// Binning follows numpy: every bin is half-open except the last one, which
/// also takes values sitting exactly on the upper edge. Calibration and
/// reduction must bin identically for the calibration matrix to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub bins: Vec<f64>,
    pub edges: Vec<f64>,
    pub range: (f64, f64),
    pub overflow: f64,
    pub underflow: f64,
    pub bin_width: f64,
}

impl Histogram {
    // Create a new Histogram with specified min, max, and number of bins
    pub fn new(number_of_bins: usize, range: (f64, f64)) -> Self {
        let bin_width = (range.1 - range.0) / number_of_bins as f64;
        let mut edges: Vec<f64> = (0..=number_of_bins)
            .map(|i| range.0 + i as f64 * bin_width)
            .collect();
        if let Some(last) = edges.last_mut() {
            *last = range.1;
        }
        Self::with_edges(edges, bin_width)
    }

    /// Bins with edges at `start + i * bin_width` strictly below `stop`, the
    /// way `np.arange` builds them. A range shorter than two edges gives an
    /// empty histogram.
    pub fn from_arange(start: f64, stop: f64, bin_width: f64) -> Self {
        let edges = crate::instrument::geometry::arange(start, stop, bin_width);
        Self::with_edges(edges, bin_width)
    }

    fn with_edges(edges: Vec<f64>, bin_width: f64) -> Self {
        let number_of_bins = edges.len().saturating_sub(1);
        let range = match (edges.first(), edges.last()) {
            (Some(&low), Some(&high)) => (low, high),
            _ => (0.0, 0.0),
        };
        Histogram {
            bins: vec![0.0; number_of_bins],
            edges,
            range,
            overflow: 0.0,
            underflow: 0.0,
            bin_width,
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    // Get the bin index for a given x position.
    pub fn get_bin_index(&self, x: f64) -> Option<usize> {
        let n = self.bins.len();
        if n == 0 || !(x >= self.range.0 && x <= self.range.1) {
            return None;
        }

        let norm = n as f64 / (self.range.1 - self.range.0);
        let mut index = (((x - self.range.0) * norm).floor() as usize).min(n - 1);

        // the scaled guess can land one bin off next to an edge
        if x < self.edges[index] {
            index = index.saturating_sub(1);
        } else if index != n - 1 && x >= self.edges[index + 1] {
            index += 1;
        }

        Some(index)
    }

    /// Add `weight` at `value`
    pub fn fill(&mut self, value: f64, weight: f64) {
        match self.get_bin_index(value) {
            Some(index) => self.bins[index] += weight,
            None if value > self.range.1 => self.overflow += weight,
            None => self.underflow += weight,
        }
    }

    pub fn fill_all<'a>(&mut self, events: impl IntoIterator<Item = &'a (f64, f64)>) {
        for &(value, weight) in events {
            self.fill(value, weight);
        }
    }

    pub fn get_bin_edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn get_bin_centers(&self) -> Vec<f64> {
        self.edges
            .windows(2)
            .map(|edge| edge[0] + (edge[1] - edge[0]) * 0.5)
            .collect()
    }

    pub fn integral(&self) -> f64 {
        self.bins.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_detector_layout() {
        let hist = Histogram::new(1024, (-0.45, 0.45));
        assert_eq!(hist.len(), 1024);
        assert_eq!(hist.get_bin_edges().len(), 1025);
        assert_eq!(hist.get_bin_edges()[1024], 0.45);

        let centers = hist.get_bin_centers();
        assert_abs_diff_eq!(centers[0], -0.45 + 0.9 / 2048.0, epsilon = 1e-12);
        assert_abs_diff_eq!(centers[1023], 0.45 - 0.9 / 2048.0, epsilon = 1e-12);
    }

    #[test]
    fn test_weighted_fill() {
        let mut hist = Histogram::new(4, (0.0, 4.0));
        hist.fill_all(&[(0.5, 2.0), (0.9, 1.0), (3.5, 0.25)]);
        hist.fill(-1.0, 7.0);
        hist.fill(4.5, 3.0);

        assert_eq!(hist.bins, vec![3.0, 0.0, 0.0, 0.25]);
        assert_eq!(hist.underflow, 7.0);
        assert_eq!(hist.overflow, 3.0);
        assert_eq!(hist.integral(), 3.25);
    }

    #[test]
    fn test_edges_belong_to_upper_bin_except_last() {
        let mut hist = Histogram::new(4, (0.0, 4.0));
        hist.fill(1.0, 1.0);
        hist.fill(0.0, 1.0);
        hist.fill(4.0, 1.0);

        assert_eq!(hist.bins, vec![1.0, 1.0, 0.0, 1.0]);
        assert_eq!(hist.overflow, 0.0);
    }

    #[test]
    fn test_arange_edges() {
        let hist = Histogram::from_arange(-2.0, 2.0, 0.5);
        // edges -2.0 ..= 1.5, the last partial bin is dropped
        assert_eq!(hist.len(), 7);
        assert_eq!(hist.range, (-2.0, 1.5));
        assert_abs_diff_eq!(hist.get_bin_centers()[0], -1.75, epsilon = 1e-12);

        let empty = Histogram::from_arange(1.0, 1.0, 0.5);
        assert!(empty.is_empty());
        assert_eq!(empty.get_bin_index(1.0), None);
    }
}
