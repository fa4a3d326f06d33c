use crate::basis::{basis_len, BasisModel};
use crate::error::{PsfError, Result};
use ndarray::parallel::prelude::{IntoParallelRefIterator, ParallelIterator};
use ndarray::{Array2, Axis, Zip};

/// A PSF image reconstructed at one detector position.
#[derive(Clone, Debug)]
pub struct ReconstructedPsf {
    pub image: Array2<f32>,
    /// Physical size of one image pixel: caller pixel scale times `PSF_SAMP`.
    pub scale: f64,
}

impl ReconstructedPsf {
    /// Sum of the image pixels.
    pub fn flux(&self) -> f64 {
        self.image.iter().map(|&v| v as f64).sum()
    }

    /// Rescales the image so its pixels sum to `flux`.
    pub fn with_flux(mut self, flux: f64) -> Result<Self> {
        let total = self.flux();
        if total == 0.0 || !total.is_finite() {
            return Err(PsfError::UnscalableFlux { total });
        }
        let factor = flux / total;
        self.image.mapv_inplace(|v| (v as f64 * factor) as f32);
        Ok(self)
    }

    /// Unit flux profile.
    pub fn normalised(self) -> Result<Self> {
        self.with_flux(1.0)
    }
}

/// `[1, x, x^2, ..., x^degree]`
pub fn power_series(x: f64, degree: usize) -> Vec<f64> {
    let mut powers = Vec::with_capacity(degree + 1);
    powers.push(1.0);
    for i in 1..=degree {
        let previous = powers[i - 1];
        powers.push(x * previous);
    }
    powers
}

/// Bivariate polynomial terms `x^nx * y^ny` with `nx + ny <= degree`.
///
/// `ny` is the outer loop and `nx` the inner one; basis images are stored in the same order.
pub fn poly_terms(x: f64, y: f64, degree: usize) -> Vec<f64> {
    let x_pow = power_series(x, degree);
    let y_pow = power_series(y, degree);
    let mut terms = Vec::with_capacity(basis_len(degree));
    for ny in 0..=degree {
        for nx in 0..=degree - ny {
            terms.push(x_pow[nx] * y_pow[ny]);
        }
    }
    terms
}

impl BasisModel {
    /// Maps a detector position onto the polynomial's normalised coordinates.
    pub fn normalized_position(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (
            (x - self.zero.0) / self.scale.0,
            (y - self.zero.1) / self.scale.1,
        )
    }

    /// Returns the PSF at `position`, given in image pixels (not sky coordinates).
    ///
    /// * `position` - `(x, y)` detector position in pixels
    /// * `pixel_scale` - physical size of an image pixel, e.g. arcsec/pixel
    pub fn reconstruct(&self, position: (f64, f64), pixel_scale: f64) -> Result<ReconstructedPsf> {
        let (u, v) = self.normalized_position(position);
        let terms = poly_terms(u, v, self.degree);
        if terms.len() != self.basis_len() {
            return Err(PsfError::DimensionMismatch {
                expected: self.basis_len(),
                actual: terms.len(),
            });
        }

        let mut image = Array2::<f64>::zeros(self.image_shape());
        for (&p, component) in terms.iter().zip(self.basis.axis_iter(Axis(0))) {
            Zip::from(&mut image)
                .and(&component)
                .for_each(|acc, &b| *acc += p * b as f64);
        }

        Ok(ReconstructedPsf {
            image: image.mapv(|v| v as f32),
            scale: pixel_scale * self.sample_scale,
        })
    }

    /// Reconstructs independent positions in parallel. Output order follows `positions`.
    pub fn reconstruct_many(
        &self,
        positions: &[(f64, f64)],
        pixel_scale: f64,
    ) -> Result<Vec<ReconstructedPsf>> {
        positions
            .par_iter()
            .map(|&position| self.reconstruct(position, pixel_scale))
            .collect()
    }
}
