use nalgebra::Vector3;
use thiserror::Error;

/// A single indexed diffraction peak.
///
/// Miller indices are kept as real numbers: they come from indexed, but not
/// necessarily rounded, observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub hkl: Vector3<f64>,
    pub q: Vector3<f64>,
}

impl Peak {
    pub fn new(hkl: [f64; 3], q: [f64; 3]) -> Self {
        Self {
            hkl: Vector3::from(hkl),
            q: Vector3::from(q),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PeakSetError {
    #[error("Miller index list has {hkl} entries but q list has {q}")]
    LengthMismatch { hkl: usize, q: usize },
}

/// Ordered, immutable list of observed (hkl, q) pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakSet {
    peaks: Vec<Peak>,
}

impl PeakSet {
    pub fn new(peaks: Vec<Peak>) -> Self {
        Self { peaks }
    }

    /// Pairs up parallel lists of Miller indices and q vectors.
    ///
    /// # Errors
    ///
    /// Returns [`PeakSetError::LengthMismatch`] if the two lists differ in length.
    pub fn from_rows(hkl: &[[f64; 3]], q: &[[f64; 3]]) -> Result<Self, PeakSetError> {
        if hkl.len() != q.len() {
            return Err(PeakSetError::LengthMismatch {
                hkl: hkl.len(),
                q: q.len(),
            });
        }
        let peaks = hkl
            .iter()
            .zip(q)
            .map(|(h, q)| Peak::new(*h, *q))
            .collect();
        Ok(Self { peaks })
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Peak> {
        self.peaks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    pub fn as_slice(&self) -> &[Peak] {
        &self.peaks
    }
}

impl FromIterator<Peak> for PeakSet {
    fn from_iter<I: IntoIterator<Item = Peak>>(iter: I) -> Self {
        Self {
            peaks: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PeakSet {
    type Item = &'a Peak;
    type IntoIter = std::slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_pairs_entries_in_order() {
        let peaks = PeakSet::from_rows(
            &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            &[[0.5, 0.0, 0.0], [0.0, 0.25, 0.0]],
        )
        .unwrap();

        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks.get(1).unwrap().hkl, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(peaks.get(1).unwrap().q, Vector3::new(0.0, 0.25, 0.0));
    }

    #[test]
    fn from_rows_rejects_mismatched_lengths() {
        let result = PeakSet::from_rows(&[[1.0, 0.0, 0.0]], &[]);
        assert_eq!(result, Err(PeakSetError::LengthMismatch { hkl: 1, q: 0 }));
    }

    #[test]
    fn collecting_peaks_preserves_order() {
        let peaks: PeakSet = (1..=3)
            .map(|i| Peak::new([i as f64, 0.0, 0.0], [0.0; 3]))
            .collect();
        let h: Vec<f64> = peaks.iter().map(|p| p.hkl.x).collect();
        assert_eq!(h, vec![1.0, 2.0, 3.0]);
        assert!(!peaks.is_empty());
    }
}
