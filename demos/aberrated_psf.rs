use image::{Rgb, RgbImage};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use optical_psf::{
    mtf_image, psf_image, roll2d, Aberrations, BasisArtifact, BasisHeader, BasisModel,
    OpticalConfig,
};
use palette::{Lch, Srgb};

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = OpticalConfig::new([512, 512], 0.25, 1.0)
        .with_obscuration(0.35)
        .with_aberrations(Aberrations {
            defocus: 0.15,
            astig1: 0.08,
            coma2: 0.12,
            spher: -0.05,
            ..Default::default()
        });

    let psf = psf_image(&config, 1.0)?;
    println!(
        "psf: scale {} integral {:.6}",
        psf.scale,
        psf.integral()
    );
    let log_psf = log_intensity(psf.values.view(), 1e-6);
    save_real_image("aberrated_psf.png", log_psf.view(), 1.0, true)?;

    let mtf = mtf_image(&config)?;
    let [h, w] = config.shape;
    let centred_mtf = roll2d(&mtf.values, ((h / 2) as isize, (w / 2) as isize));
    save_real_image("aberrated_mtf.png", centred_mtf.view(), 1.0, true)?;

    // A degree 1 basis: the mean PSF plus two position dependent coma terms.
    let crop = 64;
    let stamp = |aberrations: Aberrations| -> Result<Array2<f32>, optical_psf::PsfError> {
        let image = optical_psf::psf(&config.clone().with_aberrations(aberrations), 1.0)?;
        let (c0, c1) = (h / 2 - crop / 2, w / 2 - crop / 2);
        Ok(image
            .slice(s![c0..c0 + crop, c1..c1 + crop])
            .mapv(|v| v as f32))
    };
    let mean = stamp(config.aberrations)?;
    let coma_x = &stamp(Aberrations {
        coma1: 0.4,
        ..config.aberrations
    })? - &mean;
    let coma_y = &stamp(Aberrations {
        coma2: 0.4,
        ..config.aberrations
    })? - &mean;

    let stack = ndarray::stack(Axis(0), &[mean.view(), coma_x.view(), coma_y.view()])?;
    let flat: Array1<f32> = stack.iter().copied().collect();
    let artifact = BasisArtifact {
        header: BasisHeader {
            pol_naxis: 2,
            pol_zero1: 1024.0,
            pol_zero2: 1024.0,
            pol_scal1: 1024.0,
            pol_scal2: 1024.0,
            pol_name1: Some("X_IMAGE".to_string()),
            pol_name2: Some("Y_IMAGE".to_string()),
            pol_deg1: 1,
            pol_ngrp: 1,
            psf_naxis: 3,
            psf_axis1: crop as i64,
            psf_axis2: crop as i64,
            psf_axis3: 3,
            psf_samp: 0.5,
        },
        psf_mask: flat.into_dyn(),
    };
    let model = BasisModel::load(artifact)?;

    let positions = [(0.0, 0.0), (1024.0, 1024.0), (2048.0, 2048.0)];
    for (i, psf) in model
        .reconstruct_many(&positions, 0.27)?
        .into_iter()
        .enumerate()
    {
        println!(
            "position {:?}: scale {} flux {:.6}",
            positions[i],
            psf.scale,
            psf.flux()
        );
        let psf = psf.normalised()?;
        let image = psf.image.mapv(|v| (v as f64).max(0.0));
        save_real_image(
            format!("basis_psf_{}.png", i),
            log_intensity(image.view(), 1e-4).view(),
            1.0,
            true,
        )?;
    }

    Ok(())
}

pub fn save_real_image<T: AsRef<std::path::Path> + std::fmt::Debug>(
    file_name: T,
    arr: ArrayView2<f64>,
    amp: f64,
    normalise: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let &[h, w, ..] = arr.shape() {
        let mut max: f64 = arr.iter().fold(0.0, |max, val| val.max(max));
        let sum = arr.iter().fold(0.0, |sum, val| val + sum);
        println!("h:{} w:{} max:{} sum:{} - {:?}", h, w, max, sum, file_name);

        let mut img = RgbImage::new(w as u32, h as u32);
        if !normalise {
            max = 1.0;
        }

        for (x, y, p) in img.enumerate_pixels_mut() {
            let value = arr[[y as usize, x as usize]] / max;
            let value = (value * amp).min(1.0);

            let colour = Srgb::from(Lch::new(value * 70.0, value * 128.0, 280.0 - 245.0 * value));
            *p = Rgb([
                (colour.red * 255.0) as u8,
                (colour.green * 255.0) as u8,
                (colour.blue * 255.0) as u8,
            ]);
        }

        img.save(file_name)?;
    }
    Ok(())
}

pub fn log_intensity(arr: ArrayView2<f64>, min: f64) -> Array2<f64> {
    let log_min = -min.ln();
    let max = arr.iter().fold(0.0, |max, e| e.max(max));
    arr.map(|e| ((e / max).ln() / log_min + 1.0).max(0.0).min(1.0))
}
