use thiserror::Error;

pub type Result<T> = std::result::Result<T, PsfError>;

/// Errors produced while building pupils, optical transfer functions and basis PSFs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PsfError {
    /// Central obscuration covers the whole pupil (or is otherwise out of `[0, 1)`).
    #[error("pupil fully obscured: obscuration = {obscuration} (must lie in [0, 1))")]
    InvalidAperture { obscuration: f64 },

    /// Grid has a zero-length axis.
    #[error("degenerate grid shape {height}x{width}")]
    InvalidGrid { height: usize, width: usize },

    /// The pupil mask selects no samples, so there is no light to normalise.
    #[error("pupil selects no samples of the {height}x{width} grid (obscuration = {obscuration})")]
    EmptyPupil {
        height: usize,
        width: usize,
        obscuration: f64,
    },

    /// Sample spacing or lambda/D is not a positive finite number.
    #[error("invalid optics: {name} = {value} (must be positive and finite)")]
    InvalidOptics { name: &'static str, value: f64 },

    /// The empirical basis artifact is internally inconsistent.
    #[error("malformed PSF basis: {0}")]
    Format(#[from] FormatError),

    /// A PSF whose pixels sum to zero (or a non-finite value) cannot be rescaled to a flux.
    #[error("cannot rescale a PSF with total flux {total}")]
    UnscalableFlux { total: f64 },

    /// Polynomial term vector does not match the basis length.
    #[error("polynomial term count {actual} does not match basis length {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// One variant per header consistency check on a PSFEx-style basis artifact.
///
/// Every variant names the offending keyword so a bad file can be diagnosed without
/// re-reading it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("POLNAXIS: expected 2 polynomial axes, got {actual}")]
    PolNaxis { actual: i64 },

    #[error("PSFNAXIS: expected a rank 3 basis, got {actual}")]
    PsfNaxis { actual: i64 },

    #[error("{keyword}: header declares {declared} but basis has extent {actual}")]
    AxisExtent {
        keyword: &'static str,
        declared: i64,
        actual: usize,
    },

    #[error("PSFAXIS3/POLDEG1: degree {degree} needs {expected} basis images, PSFAXIS3 = {actual}")]
    BasisLength {
        degree: i64,
        expected: i64,
        actual: i64,
    },

    #[error("POLDEG1: polynomial degree must be non-negative with a representable basis length, got {actual}")]
    PolDeg { actual: i64 },

    #[error("{keyword}: polynomial scale must be finite and non-zero, got {actual}")]
    PolScale { keyword: &'static str, actual: f64 },

    #[error("POLNGRP: only a single polynomial group is supported, got {actual}")]
    PolNgrp { actual: i64 },

    #[error("PSF_MASK: {reason}")]
    Mask { reason: String },
}

impl FormatError {
    /// The header keyword(s) the check failed on.
    pub fn keyword(&self) -> &'static str {
        match self {
            FormatError::PolNaxis { .. } => "POLNAXIS",
            FormatError::PsfNaxis { .. } => "PSFNAXIS",
            FormatError::AxisExtent { keyword, .. } => *keyword,
            FormatError::BasisLength { .. } => "PSFAXIS3/POLDEG1",
            FormatError::PolDeg { .. } => "POLDEG1",
            FormatError::PolScale { keyword, .. } => *keyword,
            FormatError::PolNgrp { .. } => "POLNGRP",
            FormatError::Mask { .. } => "PSF_MASK",
        }
    }
}
