use crate::aberration::Aberrations;
use crate::error::{PsfError, Result};
use crate::pupil::check_optics;
use serde::{Deserialize, Serialize};

/// Everything needed to evaluate the optical PSF pipeline.
///
/// Defaults describe an unaberrated, unobscured circular pupil on a 256x256 grid with unit
/// spacing and `lambda_over_diam = 2`, which is Nyquist sampled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpticalConfig {
    /// Grid shape, `[height, width]`.
    pub shape: [usize; 2],
    /// Grid spacing of the PSF in real space units.
    pub dx: f64,
    /// lambda / telescope diameter, in the units adopted for `dx`.
    pub lambda_over_diam: f64,
    pub aberrations: Aberrations,
    pub circular_pupil: bool,
    /// Linear size of the central obscuration as a fraction of the pupil, in `[0, 1)`.
    pub obscuration: f64,
}

impl Default for OpticalConfig {
    fn default() -> Self {
        OpticalConfig {
            shape: [256, 256],
            dx: 1.0,
            lambda_over_diam: 2.0,
            aberrations: Aberrations::default(),
            circular_pupil: true,
            obscuration: 0.0,
        }
    }
}

impl OpticalConfig {
    pub fn new(shape: [usize; 2], dx: f64, lambda_over_diam: f64) -> Self {
        OpticalConfig {
            shape,
            dx,
            lambda_over_diam,
            ..Default::default()
        }
    }

    pub fn with_aberrations(mut self, aberrations: Aberrations) -> Self {
        self.aberrations = aberrations;
        self
    }

    pub fn with_obscuration(mut self, obscuration: f64) -> Self {
        self.obscuration = obscuration;
        self
    }

    pub fn with_square_pupil(mut self) -> Self {
        self.circular_pupil = false;
        self
    }

    /// Checks every precondition of the optical pipeline up front.
    pub fn validate(&self) -> Result<()> {
        let [h, w] = self.shape;
        if h == 0 || w == 0 {
            return Err(PsfError::InvalidGrid {
                height: h,
                width: w,
            });
        }
        if h % 2 != 0 || w % 2 != 0 {
            log::warn!(
                "grid {}x{} has an odd axis, frequency folding is only symmetric for even grids",
                h,
                w
            );
        }
        check_optics(self.dx, self.lambda_over_diam)?;
        if !(0.0..1.0).contains(&self.obscuration) {
            return Err(PsfError::InvalidAperture {
                obscuration: self.obscuration,
            });
        }
        Ok(())
    }

    pub fn is_square(&self) -> bool {
        self.shape[0] == self.shape[1]
    }
}
