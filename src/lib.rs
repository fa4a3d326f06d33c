//! Point spread functions for image simulation, from two independent models:
//!
//! * an optical model: a circular or square pupil with low-order aberrations, pushed through
//!   FFTs to give the PSF, OTF, MTF and PTF ([`psf`], [`otf`], [`mtf`], [`ptf`]);
//! * an empirical model: a PSFEx style PCA basis whose weights are a polynomial in detector
//!   position ([`BasisModel::load`], [`BasisModel::reconstruct`]).

use crate::fft2::{fft2, fft2_shift_inplace, ifft2};
use ndarray::{Array2, Zip};
use num_complex::Complex;
use std::f64::consts::PI;

pub mod aberration;
pub mod basis;
pub mod config;
pub mod error;
mod fft2;
pub mod pupil;
pub mod reconstruct;

pub use crate::aberration::Aberrations;
pub use crate::basis::{BasisArtifact, BasisHeader, BasisModel};
pub use crate::config::OpticalConfig;
pub use crate::error::{FormatError, PsfError, Result};
pub use crate::fft2::roll2d;
pub use crate::pupil::{generate_pupil_plane, kxky, PupilPlane};
pub use crate::reconstruct::ReconstructedPsf;

/// A real image sampled at a given scale.
///
/// For PSFs the scale is the real space pixel size `dx`; for k-space quantities (wavefront,
/// OTF, MTF, PTF) it is `2π / height`.
#[derive(Clone, Debug)]
pub struct ScaledImage {
    pub values: Array2<f64>,
    pub scale: f64,
}

impl ScaledImage {
    /// Area weighted sum of the pixel values.
    pub fn integral(&self) -> f64 {
        self.values.iter().sum::<f64>() * self.scale * self.scale
    }
}

/// Returns the complex, aberrated wavefront across the pupil.
///
/// Unit amplitude inside the pupil, exactly zero outside it. Samples are in DFT element order,
/// so `(kx, ky) = (0, 0)` is element `[0, 0]`. For a Nyquist sampled PSF keep
/// `lambda_over_diam >= 2 * dx`.
pub fn wavefront(config: &OpticalConfig) -> Result<Array2<Complex<f64>>> {
    config.validate()?;
    let pupil = generate_pupil_plane(
        config.shape,
        config.dx,
        config.lambda_over_diam,
        config.circular_pupil,
        config.obscuration,
    )?;
    Ok(aberration::aberrated_wavefront(&pupil, &config.aberrations))
}

/// Returns the wavefront as separate real and imaginary images, scaled in k-space units.
pub fn wavefront_image(config: &OpticalConfig) -> Result<(ScaledImage, ScaledImage)> {
    let wf = wavefront(config)?;
    Ok(split_complex(&wf, k_scale(config, "wavefront")))
}

/// Returns the PSF as surface brightness, centred on `[height / 2, width / 2]`.
///
/// * `flux` - total flux; the pixels sum to `flux / dx^2`
pub fn psf(config: &OpticalConfig, flux: f64) -> Result<Array2<f64>> {
    let mut image = pupil_intensity(config)?;
    // half-grid roll, moving the DC sample to [h / 2, w / 2]
    fft2_shift_inplace(image.view_mut());

    let total: f64 = image.iter().sum();
    let normalisation = flux / (total * config.dx * config.dx);
    image.mapv_inplace(|v| v * normalisation);
    Ok(image)
}

/// Returns the PSF as an image with pixel scale `dx`.
pub fn psf_image(config: &OpticalConfig, flux: f64) -> Result<ScaledImage> {
    Ok(ScaledImage {
        values: psf(config, flux)?,
        scale: config.dx,
    })
}

/// Returns the complex OTF in DFT element order, normalised so that `otf[[0, 0]] == 1 + 0i`.
pub fn otf(config: &OpticalConfig) -> Result<Array2<Complex<f64>>> {
    let intensity = pupil_intensity(config)?;
    let mut otf = ifft2(intensity.mapv(|v| Complex::new(v, 0.0)))?;
    let dc = otf[[0, 0]].re;
    otf.mapv_inplace(|c| c / dc);
    // the DC sample is the total intensity, real up to FFT rounding
    otf[[0, 0]] = Complex::new(1.0, 0.0);
    Ok(otf)
}

/// Returns the OTF as separate real and imaginary images, scaled in k-space units.
pub fn otf_image(config: &OpticalConfig) -> Result<(ScaledImage, ScaledImage)> {
    let otf = otf(config)?;
    Ok(split_complex(&otf, k_scale(config, "OTF")))
}

/// Returns the MTF, `|otf|`, with `mtf[[0, 0]] == 1`.
pub fn mtf(config: &OpticalConfig) -> Result<Array2<f64>> {
    Ok(otf(config)?.mapv(|c| c.norm()))
}

/// Returns the MTF as an image scaled in k-space units.
pub fn mtf_image(config: &OpticalConfig) -> Result<ScaledImage> {
    Ok(ScaledImage {
        values: mtf(config)?,
        scale: k_scale(config, "MTF"),
    })
}

/// Returns the PTF in radians, the phase of the OTF.
///
/// Only frequencies with `kx^2 + ky^2 < kmax^2` carry a phase; everywhere else the OTF is
/// vanishingly small and the PTF is set to exactly zero.
pub fn ptf(config: &OpticalConfig) -> Result<Array2<f64>> {
    let otf = otf(config)?;
    let kmax = pupil::kmax_internal(config.dx, config.lambda_over_diam);
    let kmax2 = kmax * kmax;
    let (kx, ky) = kxky(config.shape);

    Ok(Zip::from(&otf)
        .and(&kx)
        .and(&ky)
        .par_map_collect(|&c, &kx, &ky| {
            if kx * kx + ky * ky < kmax2 {
                c.arg()
            } else {
                0.0
            }
        }))
}

/// Returns the PTF as an image scaled in k-space units.
pub fn ptf_image(config: &OpticalConfig) -> Result<ScaledImage> {
    Ok(ScaledImage {
        values: ptf(config)?,
        scale: k_scale(config, "PTF"),
    })
}

/// `|FFT(wavefront)|^2` in DFT element order, the unnormalised PSF.
fn pupil_intensity(config: &OpticalConfig) -> Result<Array2<f64>> {
    let wf = wavefront(config)?;
    if wf.iter().all(|c| c.norm_sqr() == 0.0) {
        return Err(PsfError::EmptyPupil {
            height: config.shape[0],
            width: config.shape[1],
            obscuration: config.obscuration,
        });
    }
    let ftwf = fft2(wf)?;
    let intensity = ftwf.mapv(|c| (c * c.conj()).re);
    log::debug!(
        "pupil intensity on {}x{} grid, dx = {}, lambda_over_diam = {}",
        config.shape[0],
        config.shape[1],
        config.dx,
        config.lambda_over_diam
    );
    Ok(intensity)
}

/// k-space pixel scale. Only exact for square grids.
fn k_scale(config: &OpticalConfig, what: &str) -> f64 {
    if !config.is_square() {
        log::warn!(
            "{} image scale will not be correct in both directions for non-square {}x{} grids",
            what,
            config.shape[0],
            config.shape[1]
        );
    }
    2.0 * PI / config.shape[0] as f64
}

fn split_complex(values: &Array2<Complex<f64>>, scale: f64) -> (ScaledImage, ScaledImage) {
    (
        ScaledImage {
            values: values.mapv(|c| c.re),
            scale,
        },
        ScaledImage {
            values: values.mapv(|c| c.im),
            scale,
        },
    )
}
