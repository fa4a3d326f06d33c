use crate::error::{PsfError, Result};
use ndarray::{Array1, Array2, Zip};
use std::f64::consts::PI;

/// Sample frequencies of a length `n` DFT in cycles per sample, numpy `fftfreq` ordering:
/// `[0, 1, ..., ceil(n/2) - 1, -floor(n/2), ..., -1] / n`.
pub fn fft_freq(n: usize) -> Array1<f64> {
    let positive = (n + 1) / 2;
    Array1::from_shape_fn(n, |i| {
        let k = if i < positive {
            i as f64
        } else {
            i as f64 - n as f64
        };
        k / n as f64
    })
}

/// Returns `(kx, ky)` for the DFT of a unit-spaced array of the given `[height, width]` shape.
///
/// k lies in [-π, π) and `[0, 0]` holds `(kx, ky) = (0, 0)`. The trailing axis is kx.
pub fn kxky(shape: [usize; 2]) -> (Array2<f64>, Array2<f64>) {
    let kx_axis = fft_freq(shape[1]) * (2.0 * PI);
    let ky_axis = fft_freq(shape[0]) * (2.0 * PI);
    let kx = Array2::from_shape_fn(shape, |(_, j)| kx_axis[j]);
    let ky = Array2::from_shape_fn(shape, |(i, _)| ky_axis[i]);
    (kx, ky)
}

/// Checks that `dx` and `lambda_over_diam` are positive and finite, and warns when the output
/// grid undersamples the diffraction pattern.
pub fn check_optics(dx: f64, lambda_over_diam: f64) -> Result<()> {
    if !(dx.is_finite() && dx > 0.0) {
        return Err(PsfError::InvalidOptics {
            name: "dx",
            value: dx,
        });
    }
    if !(lambda_over_diam.is_finite() && lambda_over_diam > 0.0) {
        return Err(PsfError::InvalidOptics {
            name: "lambda_over_diam",
            value: lambda_over_diam,
        });
    }
    if lambda_over_diam < 2.0 * dx {
        log::warn!(
            "lambda_over_diam = {} is below 2 * dx = {}, the PSF will be undersampled",
            lambda_over_diam,
            2.0 * dx
        );
    }
    Ok(())
}

/// Internal kmax, in units of the array grid spacing.
pub fn kmax_internal(dx: f64, lambda_over_diam: f64) -> f64 {
    dx * 2.0 * PI / lambda_over_diam
}

/// Unit-disc pupil coordinates and illumination mask.
#[derive(Clone, Debug)]
pub struct PupilPlane {
    /// Radius, scaled so the pupil edge sits at `rho == 1`.
    pub rho: Array2<f64>,
    /// Polar angle, `atan2(ky, kx)`.
    pub theta: Array2<f64>,
    /// `true` where the pupil is illuminated.
    pub mask: Array2<bool>,
}

impl PupilPlane {
    /// Number of illuminated samples.
    pub fn area(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

/// Generate a pupil plane, including a central obscuration such as a secondary mirror.
///
/// * `shape` - `[height, width]` of the output arrays
/// * `dx` - grid spacing of the PSF in real space units
/// * `lambda_over_diam` - lambda / telescope diameter in the units adopted for `dx`
/// * `circular_pupil` - circular pupil if true, otherwise square
/// * `obscuration` - linear dimension of the central obscuration as a fraction of the pupil, in `[0, 1)`
///
/// Samples are in DFT element order, so the pupil is centred on `[0, 0]` and wraps around the edges.
pub fn generate_pupil_plane(
    shape: [usize; 2],
    dx: f64,
    lambda_over_diam: f64,
    circular_pupil: bool,
    obscuration: f64,
) -> Result<PupilPlane> {
    if shape[0] == 0 || shape[1] == 0 {
        return Err(PsfError::InvalidGrid {
            height: shape[0],
            width: shape[1],
        });
    }
    check_optics(dx, lambda_over_diam)?;
    if !(0.0..1.0).contains(&obscuration) {
        return Err(PsfError::InvalidAperture { obscuration });
    }

    let kmax = kmax_internal(dx, lambda_over_diam);
    let half_kmax = 0.5 * kmax;
    let (kx, ky) = kxky(shape);

    let mut rho = Array2::zeros(shape);
    let mut theta = Array2::zeros(shape);
    let mut mask = Array2::from_elem(shape, false);

    Zip::from(&mut rho)
        .and(&mut theta)
        .and(&mut mask)
        .and(&kx)
        .and(&ky)
        .par_for_each(|r, t, m, &kx, &ky| {
            *r = (kx * kx + ky * ky).sqrt() / half_kmax;
            // atan2(0, 0) is 0
            *t = ky.atan2(kx);
            *m = if circular_pupil {
                *r < 1.0 && (obscuration == 0.0 || *r >= obscuration)
            } else {
                let inside = kx.abs() < half_kmax && ky.abs() < half_kmax;
                inside
                    && (obscuration == 0.0
                        || (kx.abs() >= obscuration * half_kmax
                            && ky.abs() >= obscuration * half_kmax))
            };
        });

    let pupil = PupilPlane { rho, theta, mask };
    log::debug!(
        "pupil plane {}x{}: kmax = {:.4}, {} illuminated samples",
        shape[0],
        shape[1],
        kmax,
        pupil.area()
    );
    Ok(pupil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fft_freq_matches_numpy_ordering() {
        assert_eq!(fft_freq(4).to_vec(), vec![0.0, 0.25, -0.5, -0.25]);
        assert_eq!(fft_freq(5).to_vec(), vec![0.0, 0.2, 0.4, -0.4, -0.2]);
    }

    #[test]
    fn kxky_trailing_axis_is_kx() {
        let (kx, ky) = kxky([4, 8]);
        assert_eq!(kx[[0, 0]], 0.0);
        assert_eq!(ky[[0, 0]], 0.0);
        assert_abs_diff_eq!(kx[[3, 1]], 2.0 * PI / 8.0);
        assert_abs_diff_eq!(ky[[1, 3]], 2.0 * PI / 4.0);
        assert_abs_diff_eq!(ky[[2, 0]], -PI);
    }

    #[test]
    fn theta_is_zero_at_origin() {
        let pupil = generate_pupil_plane([16, 16], 1.0, 2.0, true, 0.0).unwrap();
        assert_eq!(pupil.theta[[0, 0]], 0.0);
        assert_eq!(pupil.rho[[0, 0]], 0.0);
        assert!(pupil.mask[[0, 0]]);
    }

    #[test]
    fn circular_mask_is_unit_disc() {
        let pupil = generate_pupil_plane([64, 64], 1.0, 2.0, true, 0.0).unwrap();
        for (&r, &m) in pupil.rho.iter().zip(pupil.mask.iter()) {
            assert_eq!(m, r < 1.0);
        }
    }

    #[test]
    fn obscured_circular_pupil_has_hole() {
        let pupil = generate_pupil_plane([64, 64], 1.0, 2.0, true, 0.3).unwrap();
        assert!(!pupil.mask[[0, 0]]);
        for (&r, &m) in pupil.rho.iter().zip(pupil.mask.iter()) {
            assert_eq!(m, r < 1.0 && r >= 0.3);
        }
    }

    #[test]
    fn square_pupil_is_box() {
        let pupil = generate_pupil_plane([64, 64], 1.0, 4.0, false, 0.0).unwrap();
        let half_kmax = 0.5 * kmax_internal(1.0, 4.0);
        let (kx, ky) = kxky([64, 64]);
        Zip::from(&pupil.mask)
            .and(&kx)
            .and(&ky)
            .for_each(|&m, &kx, &ky| assert_eq!(m, kx.abs() < half_kmax && ky.abs() < half_kmax));
    }

    #[test]
    fn area_strictly_decreases_with_obscuration() {
        for &circular in &[true, false] {
            let mut previous = usize::MAX;
            for &obscuration in &[0.0, 0.1, 0.2, 0.4, 0.6, 0.8, 0.95] {
                let pupil = generate_pupil_plane([256, 256], 1.0, 2.0, circular, obscuration).unwrap();
                let area = pupil.area();
                assert!(
                    area < previous,
                    "circular={} obscuration={} area={} previous={}",
                    circular,
                    obscuration,
                    area,
                    previous
                );
                previous = area;
            }
        }
    }

    #[test]
    fn full_obscuration_is_rejected() {
        for &circular in &[true, false] {
            let err = generate_pupil_plane([32, 32], 1.0, 2.0, circular, 1.0).unwrap_err();
            assert_eq!(err, PsfError::InvalidAperture { obscuration: 1.0 });
        }
        assert!(generate_pupil_plane([32, 32], 1.0, 2.0, true, 1.5).is_err());
    }

    #[test]
    fn non_positive_optics_are_rejected() {
        assert_eq!(
            generate_pupil_plane([32, 32], 0.0, 2.0, true, 0.0).unwrap_err(),
            PsfError::InvalidOptics {
                name: "dx",
                value: 0.0
            }
        );
        assert!(generate_pupil_plane([32, 32], 1.0, -2.0, true, 0.0).is_err());
        assert!(generate_pupil_plane([32, 32], 1.0, f64::NAN, true, 0.0).is_err());
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        assert_eq!(
            generate_pupil_plane([0, 32], 1.0, 2.0, true, 0.0).unwrap_err(),
            PsfError::InvalidGrid {
                height: 0,
                width: 32
            }
        );
    }
}
