use find_peaks::PeakFinder;

/// Minimum prominence a local maximum needs to count as a peak.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub enum Prominence {
    #[default]
    None,
    Absolute(f64),
    /// Fraction of the largest sample
    FractionOfMax(f64),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PeakFindingSettings {
    pub prominence: Prominence,
    pub min_distance: usize,
}

impl Default for PeakFindingSettings {
    fn default() -> Self {
        PeakFindingSettings {
            prominence: Prominence::None,
            min_distance: 1,
        }
    }
}

impl PeakFindingSettings {
    pub fn new(prominence: Prominence, min_distance: usize) -> Self {
        Self {
            prominence,
            min_distance,
        }
    }

    /// Prominence a peak needs in `y_data`, if any. A limit at or below zero
    /// (or NaN) filters nothing.
    fn min_prominence(&self, max: f64) -> Option<f64> {
        let limit = match self.prominence {
            Prominence::None => return None,
            Prominence::Absolute(threshold) => threshold,
            Prominence::FractionOfMax(fraction) => max * fraction,
        };
        (limit > 0.0).then_some(limit)
    }

    /// Sample indices of the peaks in `y_data`, ordered by position. Maxima
    /// on the first or last sample are ignored.
    ///
    /// Peaks are thinned by distance before the prominence limit applies, so
    /// a tall shoulder ripple still removes its lower neighbours even when it
    /// is later dropped for lacking prominence.
    pub fn find_peaks(&self, y_data: &[f64]) -> Vec<usize> {
        let max = y_data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = y_data.iter().copied().fold(f64::INFINITY, f64::min);
        if y_data.len() < 3 || !max.is_finite() || !min.is_finite() || max == min {
            return Vec::new();
        }

        // a zero limit keeps every maximum but attaches its prominence
        let mut peak_finder = PeakFinder::new(y_data);
        peak_finder.with_min_prominence(0.0);

        let last = y_data.len() - 1;
        let mut candidates: Vec<(usize, f64)> = peak_finder
            .find_peaks()
            .iter()
            .map(|peak| (peak.middle_position(), peak.prominence.unwrap_or(0.0)))
            .filter(|&(index, _)| index > 0 && index < last)
            .collect();
        candidates.sort_unstable_by_key(|&(index, _)| index);
        candidates.dedup_by_key(|&mut (index, _)| index);

        let kept = select_by_distance(y_data, &candidates, self.min_distance.max(1));

        let min_prominence = self.min_prominence(max);
        candidates
            .iter()
            .zip(kept)
            .filter(|&(&(_, prominence), keep)| {
                keep && min_prominence.is_none_or(|limit| prominence >= limit)
            })
            .map(|(&(index, _), _)| index)
            .collect()
    }
}

// Tallest first, every remaining peak closer than `distance` samples is
// dropped. `candidates` are sorted by index.
fn select_by_distance(y_data: &[f64], candidates: &[(usize, f64)], distance: usize) -> Vec<bool> {
    let mut keep = vec![true; candidates.len()];
    if distance <= 1 {
        return keep;
    }

    let mut by_height: Vec<usize> = (0..candidates.len()).collect();
    by_height.sort_by(|&a, &b| y_data[candidates[a].0].total_cmp(&y_data[candidates[b].0]));

    for &i in by_height.iter().rev() {
        if !keep[i] {
            continue;
        }
        let index = candidates[i].0;
        for j in (0..i).rev() {
            if index - candidates[j].0 >= distance {
                break;
            }
            keep[j] = false;
        }
        for j in i + 1..candidates.len() {
            if candidates[j].0 - index >= distance {
                break;
            }
            keep[j] = false;
        }
    }

    keep
}
