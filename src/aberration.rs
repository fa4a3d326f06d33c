use crate::pupil::PupilPlane;
use ndarray::{Array2, Zip};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Low-order aberration coefficients, in units of the incident wavelength.
///
/// Terms follow the Zernike model of optical aberrations, evaluated on the unit-disc pupil
/// coordinates `(rho, theta)`:
///
/// | term        | polynomial                |
/// |-------------|---------------------------|
/// | `defocus`   | `2ρ² − 1`                 |
/// | `astig1`    | `ρ² cos 2θ`               |
/// | `astig2`    | `ρ² sin 2θ`               |
/// | `coma1`     | `(3ρ² − 2) ρ cos θ`       |
/// | `coma2`     | `(3ρ² − 2) ρ sin θ`       |
/// | `spher`     | `6ρ⁴ − 6ρ² + 1`           |
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Aberrations {
    pub defocus: f64,
    /// Astigmatism, like e1.
    pub astig1: f64,
    /// Astigmatism, like e2.
    pub astig2: f64,
    /// Coma along x.
    pub coma1: f64,
    /// Coma along y.
    pub coma2: f64,
    /// Spherical aberration.
    pub spher: f64,
}

impl Aberrations {
    pub fn is_zero(&self) -> bool {
        *self == Aberrations::default()
    }

    /// Wavefront error in waves at pupil coordinate `(rho, theta)`.
    pub fn phase_waves(&self, rho: f64, theta: f64) -> f64 {
        let rho2 = rho * rho;
        let mut w = 0.0;
        w += self.defocus * (2.0 * rho2 - 1.0);
        w += self.astig1 * rho2 * (2.0 * theta).cos();
        w += self.astig2 * rho2 * (2.0 * theta).sin();
        w += self.coma1 * (3.0 * rho2 - 2.0) * rho * theta.cos();
        w += self.coma2 * (3.0 * rho2 - 2.0) * rho * theta.sin();
        w += self.spher * (6.0 * rho2 * rho2 - 6.0 * rho2 + 1.0);
        w
    }
}

/// Unit amplitude, phase modulated wavefront over the illuminated part of `pupil`.
///
/// Samples outside the pupil mask are exactly zero.
pub fn aberrated_wavefront(pupil: &PupilPlane, aberrations: &Aberrations) -> Array2<Complex<f64>> {
    let aberrations = *aberrations;
    Zip::from(&pupil.rho)
        .and(&pupil.theta)
        .and(&pupil.mask)
        .par_map_collect(|&rho, &theta, &inside| {
            if inside {
                let phase = 2.0 * PI * aberrations.phase_waves(rho, theta);
                Complex::new(0.0, phase).exp()
            } else {
                Complex::new(0.0, 0.0)
            }
        })
}
