use crate::error::{FormatError, Result};
use ndarray::{Array3, ArrayD, Ix3};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Header keywords of a PSFEx style PCA basis, named as they appear in the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasisHeader {
    #[serde(rename = "POLNAXIS")]
    pub pol_naxis: i64,
    #[serde(rename = "POLZERO1")]
    pub pol_zero1: f64,
    #[serde(rename = "POLZERO2")]
    pub pol_zero2: f64,
    #[serde(rename = "POLSCAL1")]
    pub pol_scal1: f64,
    #[serde(rename = "POLSCAL2")]
    pub pol_scal2: f64,
    #[serde(rename = "POLNAME1", default)]
    pub pol_name1: Option<String>,
    #[serde(rename = "POLNAME2", default)]
    pub pol_name2: Option<String>,
    #[serde(rename = "POLDEG1")]
    pub pol_deg1: i64,
    #[serde(rename = "POLNGRP")]
    pub pol_ngrp: i64,
    #[serde(rename = "PSFNAXIS")]
    pub psf_naxis: i64,
    #[serde(rename = "PSFAXIS1")]
    pub psf_axis1: i64,
    #[serde(rename = "PSFAXIS2")]
    pub psf_axis2: i64,
    #[serde(rename = "PSFAXIS3")]
    pub psf_axis3: i64,
    #[serde(rename = "PSF_SAMP")]
    pub psf_samp: f64,
}

/// Raw basis as delivered by whatever reads the file: header plus the `PSF_MASK` data.
///
/// `psf_mask` may be flattened (1-D) or already shaped `[PSFAXIS3, PSFAXIS2, PSFAXIS1]`.
#[derive(Clone, Debug)]
pub struct BasisArtifact {
    pub header: BasisHeader,
    pub psf_mask: ArrayD<f32>,
}

/// Number of polynomial terms of a bivariate polynomial of total degree `degree`.
///
/// Saturates at `usize::MAX`; use [`checked_basis_len`] on untrusted degrees.
pub fn basis_len(degree: usize) -> usize {
    checked_basis_len(degree).unwrap_or(usize::MAX)
}

/// `(degree + 1)(degree + 2) / 2`, or `None` if it does not fit in a `usize`.
pub fn checked_basis_len(degree: usize) -> Option<usize> {
    let a = degree.checked_add(1)?;
    let b = degree.checked_add(2)?;
    // one of two consecutive integers is even, halve it before multiplying
    if a % 2 == 0 {
        (a / 2).checked_mul(b)
    } else {
        a.checked_mul(b / 2)
    }
}

/// A validated PCA basis, ready to reconstruct PSFs at arbitrary detector positions.
///
/// Immutable once loaded.
#[derive(Clone, Debug)]
pub struct BasisModel {
    pub(crate) basis: Array3<f32>,
    pub(crate) degree: usize,
    pub(crate) zero: (f64, f64),
    pub(crate) scale: (f64, f64),
    pub(crate) sample_scale: f64,
    pub(crate) names: (Option<String>, Option<String>),
}

impl BasisModel {
    /// Validates the artifact header against its data and takes ownership of the basis.
    ///
    /// The artifact is consumed whether or not loading succeeds.
    pub fn load(artifact: BasisArtifact) -> Result<Self> {
        let BasisArtifact { header, psf_mask } = artifact;

        if header.pol_naxis != 2 {
            return Err(FormatError::PolNaxis {
                actual: header.pol_naxis,
            }
            .into());
        }
        if header.psf_naxis != 3 {
            return Err(FormatError::PsfNaxis {
                actual: header.psf_naxis,
            }
            .into());
        }
        let bad_degree = || FormatError::PolDeg {
            actual: header.pol_deg1,
        };
        let degree = usize::try_from(header.pol_deg1).map_err(|_| bad_degree())?;
        let expected_len = checked_basis_len(degree)
            .and_then(|n| i64::try_from(n).ok())
            .ok_or_else(bad_degree)?;
        if header.psf_axis3 != expected_len {
            return Err(FormatError::BasisLength {
                degree: header.pol_deg1,
                expected: expected_len,
                actual: header.psf_axis3,
            }
            .into());
        }
        if header.pol_ngrp != 1 {
            return Err(FormatError::PolNgrp {
                actual: header.pol_ngrp,
            }
            .into());
        }
        for &(keyword, value) in &[("POLSCAL1", header.pol_scal1), ("POLSCAL2", header.pol_scal2)]
        {
            if !value.is_finite() || value == 0.0 {
                return Err(FormatError::PolScale { keyword, actual: value }.into());
            }
        }

        let basis = shape_basis(&header, psf_mask)?;

        log::debug!(
            "loaded PSF basis: degree {}, {} images of {}x{}, PSF_SAMP = {}",
            degree,
            basis.shape()[0],
            basis.shape()[1],
            basis.shape()[2],
            header.psf_samp
        );

        Ok(BasisModel {
            basis,
            degree,
            zero: (header.pol_zero1, header.pol_zero2),
            scale: (header.pol_scal1, header.pol_scal2),
            sample_scale: header.psf_samp,
            names: (header.pol_name1, header.pol_name2),
        })
    }

    /// Polynomial degree of the position dependence.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of basis images.
    pub fn basis_len(&self) -> usize {
        self.basis.shape()[0]
    }

    /// Shape of each reconstructed image, `[PSFAXIS2, PSFAXIS1]`.
    pub fn image_shape(&self) -> [usize; 2] {
        [self.basis.shape()[1], self.basis.shape()[2]]
    }

    /// Basis pixel size in units of image pixels.
    pub fn sample_scale(&self) -> f64 {
        self.sample_scale
    }

    /// Names of the polynomial variables, e.g. `X_IMAGE`, `Y_IMAGE`, when the header has them.
    pub fn variable_names(&self) -> (Option<&str>, Option<&str>) {
        (self.names.0.as_deref(), self.names.1.as_deref())
    }

    pub fn basis(&self) -> &Array3<f32> {
        &self.basis
    }
}

fn shape_basis(header: &BasisHeader, psf_mask: ArrayD<f32>) -> Result<Array3<f32>> {
    let declared = [
        ("PSFAXIS3", header.psf_axis3),
        ("PSFAXIS2", header.psf_axis2),
        ("PSFAXIS1", header.psf_axis1),
    ];

    match psf_mask.ndim() {
        1 => {
            let mut dims = [0usize; 3];
            for (dim, &(keyword, value)) in dims.iter_mut().zip(&declared) {
                *dim = usize::try_from(value).map_err(|_| FormatError::AxisExtent {
                    keyword,
                    declared: value,
                    actual: 0,
                })?;
            }
            let len = psf_mask.len();
            let basis = psf_mask
                .into_shape((dims[0], dims[1], dims[2]))
                .map_err(|_| FormatError::Mask {
                    reason: format!(
                        "{} values cannot be shaped to [{}, {}, {}]",
                        len, dims[0], dims[1], dims[2]
                    ),
                })?;
            Ok(basis)
        }
        3 => {
            let basis = psf_mask
                .into_dimensionality::<Ix3>()
                .map_err(|e| FormatError::Mask {
                    reason: e.to_string(),
                })?;
            for (&actual, &(keyword, value)) in basis.shape().iter().zip(&declared) {
                if usize::try_from(value).ok() != Some(actual) {
                    return Err(FormatError::AxisExtent {
                        keyword,
                        declared: value,
                        actual,
                    }
                    .into());
                }
            }
            Ok(basis)
        }
        n => Err(FormatError::Mask {
            reason: format!("expected a flattened or rank 3 array, got rank {}", n),
        }
        .into()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::PsfError;
    use ndarray::{Array1, IxDyn};

    pub(crate) fn header(degree: i64, h: i64, w: i64) -> BasisHeader {
        BasisHeader {
            pol_naxis: 2,
            pol_zero1: 1024.0,
            pol_zero2: 2048.0,
            pol_scal1: 2000.0,
            pol_scal2: 4000.0,
            pol_name1: Some("X_IMAGE".to_string()),
            pol_name2: Some("Y_IMAGE".to_string()),
            pol_deg1: degree,
            pol_ngrp: 1,
            psf_naxis: 3,
            psf_axis1: w,
            psf_axis2: h,
            psf_axis3: (degree + 1) * (degree + 2) / 2,
            psf_samp: 0.5,
        }
    }

    /// Basis image `k` is filled with `k + 1` plus a small pixel dependent ramp.
    pub(crate) fn artifact(degree: i64, h: usize, w: usize) -> BasisArtifact {
        let header = header(degree, h as i64, w as i64);
        let n = header.psf_axis3 as usize;
        let flat = Array1::from_shape_fn(n * h * w, |i| {
            let k = i / (h * w);
            let p = i % (h * w);
            (k + 1) as f32 + 0.001 * p as f32
        });
        BasisArtifact {
            header,
            psf_mask: flat.into_dyn(),
        }
    }

    fn load_err(artifact: BasisArtifact) -> FormatError {
        match BasisModel::load(artifact) {
            Err(PsfError::Format(e)) => e,
            other => panic!("expected a format error, got {:?}", other),
        }
    }

    #[test]
    fn flattened_mask_is_reshaped() {
        let model = BasisModel::load(artifact(2, 5, 7)).unwrap();
        assert_eq!(model.degree(), 2);
        assert_eq!(model.basis_len(), 6);
        assert_eq!(model.image_shape(), [5, 7]);
        assert_eq!(model.sample_scale(), 0.5);
        assert_eq!(model.variable_names(), (Some("X_IMAGE"), Some("Y_IMAGE")));
        assert_eq!(model.basis()[[3, 0, 0]], 4.0);
        assert_eq!(model.basis()[[0, 1, 2]], 1.0 + 0.001 * 9.0);
    }

    #[test]
    fn shaped_mask_is_accepted() {
        let mut a = artifact(1, 4, 4);
        a.psf_mask = a.psf_mask.into_shape(IxDyn(&[3, 4, 4])).unwrap();
        let model = BasisModel::load(a).unwrap();
        assert_eq!(model.basis_len(), 3);
    }

    #[test]
    fn wrong_polynomial_axes() {
        let mut a = artifact(1, 4, 4);
        a.header.pol_naxis = 3;
        let err = load_err(a);
        assert_eq!(err, FormatError::PolNaxis { actual: 3 });
        assert_eq!(err.keyword(), "POLNAXIS");
    }

    #[test]
    fn wrong_basis_rank() {
        let mut a = artifact(1, 4, 4);
        a.header.psf_naxis = 2;
        assert_eq!(load_err(a), FormatError::PsfNaxis { actual: 2 });
    }

    #[test]
    fn degree_and_basis_length_disagree() {
        let mut a = artifact(2, 4, 4);
        a.header.psf_axis3 = 5;
        let err = load_err(a);
        assert_eq!(
            err,
            FormatError::BasisLength {
                degree: 2,
                expected: 6,
                actual: 5
            }
        );
        assert!(err.to_string().contains("PSFAXIS3"));
        assert!(err.to_string().contains("POLDEG1"));
    }

    #[test]
    fn oversized_degree_is_rejected() {
        let mut a = artifact(1, 4, 4);
        a.header.pol_deg1 = 1 << 32;
        a.header.psf_axis3 = 6442450945;
        let err = load_err(a);
        assert_eq!(err, FormatError::PolDeg { actual: 1 << 32 });
        assert_eq!(err.keyword(), "POLDEG1");

        let mut a = artifact(1, 4, 4);
        a.header.pol_deg1 = i64::MAX;
        assert_eq!(load_err(a), FormatError::PolDeg { actual: i64::MAX });
    }

    #[test]
    fn checked_basis_len_overflow() {
        assert_eq!(checked_basis_len(0), Some(1));
        assert_eq!(checked_basis_len(3), Some(10));
        assert_eq!(checked_basis_len(usize::MAX), None);
        assert_eq!(checked_basis_len(1 << 30), Some(((1 << 30) + 1) * ((1 << 29) + 1)));
        assert_eq!(basis_len(usize::MAX), usize::MAX);
    }

    #[test]
    fn multiple_groups_are_rejected() {
        for &ngrp in &[0, 2, 3] {
            let mut a = artifact(1, 4, 4);
            a.header.pol_ngrp = ngrp;
            assert_eq!(load_err(a), FormatError::PolNgrp { actual: ngrp });
        }
    }

    #[test]
    fn declared_extents_must_match_data() {
        let shaped = |a: BasisArtifact| {
            let BasisArtifact { header, psf_mask } = a;
            BasisArtifact {
                header,
                psf_mask: psf_mask.into_shape(IxDyn(&[3, 4, 6])).unwrap(),
            }
        };

        let mut a = shaped(artifact(1, 4, 6));
        a.header.psf_axis1 = 5;
        assert_eq!(
            load_err(a),
            FormatError::AxisExtent {
                keyword: "PSFAXIS1",
                declared: 5,
                actual: 6
            }
        );

        let mut a = shaped(artifact(1, 4, 6));
        a.header.psf_axis2 = 3;
        assert_eq!(
            load_err(a),
            FormatError::AxisExtent {
                keyword: "PSFAXIS2",
                declared: 3,
                actual: 4
            }
        );

        // PSFAXIS3 agrees with POLDEG1 but not with the data
        let mut a = artifact(1, 4, 6);
        a.psf_mask = a.psf_mask.into_shape(IxDyn(&[2, 6, 6])).unwrap();
        a.header.psf_axis2 = 6;
        assert_eq!(
            load_err(a),
            FormatError::AxisExtent {
                keyword: "PSFAXIS3",
                declared: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn flattened_mask_of_wrong_length() {
        let mut a = artifact(1, 4, 4);
        a.header.psf_axis1 = 5;
        assert_eq!(load_err(a).keyword(), "PSF_MASK");
    }

    #[test]
    fn negative_degree_and_zero_scale() {
        let mut a = artifact(1, 4, 4);
        a.header.pol_deg1 = -1;
        assert_eq!(load_err(a), FormatError::PolDeg { actual: -1 });

        let mut a = artifact(1, 4, 4);
        a.header.pol_scal2 = 0.0;
        assert_eq!(
            load_err(a),
            FormatError::PolScale {
                keyword: "POLSCAL2",
                actual: 0.0
            }
        );
    }

    #[test]
    fn header_deserializes_from_keywords() {
        let header: BasisHeader = serde_json::from_str(
            r#"{
                "POLNAXIS": 2, "POLZERO1": 1024.5, "POLZERO2": 2048.5,
                "POLSCAL1": 2048.0, "POLSCAL2": 4096.0,
                "POLDEG1": 2, "POLNGRP": 1,
                "PSFNAXIS": 3, "PSFAXIS1": 25, "PSFAXIS2": 25, "PSFAXIS3": 6,
                "PSF_SAMP": 0.9
            }"#,
        )
        .unwrap();
        assert_eq!(header.pol_deg1, 2);
        assert_eq!(header.psf_axis3, 6);
        assert_eq!(header.pol_name1, None);
        assert_eq!(header.psf_samp, 0.9);
    }
}
