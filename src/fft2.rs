use crate::error::{PsfError, Result};
use ndarray::parallel::prelude::{IntoParallelIterator, ParallelIterator};
use ndarray::{Array2, ArrayBase, ArrayViewMut1, ArrayViewMut2, Axis, Data, Ix2, Zip};
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{FftDirection, FftPlanner};

/// Unitary forward 2D FFT in standard DFT element order (DC at `[0, 0]`).
pub fn fft2(mut input: Array2<Complex<f64>>) -> Result<Array2<Complex<f64>>> {
    _fft2(input.view_mut(), FftDirection::Forward)?;
    Ok(input)
}

/// Unitary inverse 2D FFT in standard DFT element order.
pub fn ifft2(mut input: Array2<Complex<f64>>) -> Result<Array2<Complex<f64>>> {
    _fft2(input.view_mut(), FftDirection::Inverse)?;
    Ok(input)
}

fn _fft2(mut input: ArrayViewMut2<Complex<f64>>, direction: FftDirection) -> Result<()> {
    let (h, w) = input.dim();
    if h == 0 || w == 0 {
        return Err(PsfError::InvalidGrid {
            height: h,
            width: w,
        });
    }

    let mut planner = FftPlanner::new();
    let fft_row = planner.plan_fft(w, direction);
    let fft_col = planner.plan_fft(h, direction);
    let normalisation = 1.0 / ((h * w) as f64).sqrt();

    // Each lane is copied through a contiguous buffer so the result does not depend on the
    // memory layout of the input.
    Zip::from(input.rows_mut()).into_par_iter().for_each_init(
        || {
            (
                vec![Zero::zero(); fft_row.len()],
                vec![Zero::zero(); fft_row.get_inplace_scratch_len()],
            )
        },
        |(temp, scratch), mut row| {
            for (t, e) in temp.iter_mut().zip(row.0.iter()) {
                *t = *e;
            }
            fft_row.process_with_scratch(temp, scratch);
            for (e, t) in row.0.iter_mut().zip(temp.iter()) {
                *e = *t;
            }
        },
    );

    Zip::from(input.columns_mut())
        .into_par_iter()
        .for_each_init(
            || {
                (
                    vec![Zero::zero(); fft_col.len()],
                    vec![Zero::zero(); fft_col.get_inplace_scratch_len()],
                )
            },
            |(temp, scratch), mut col| {
                for (t, e) in temp.iter_mut().zip(col.0.iter()) {
                    *t = *e;
                }
                fft_col.process_with_scratch(temp, scratch);
                for (e, t) in col.0.iter_mut().zip(temp.iter()) {
                    *e = *t * normalisation;
                }
            },
        );

    Ok(())
}

/// Moves the origin (0, 0) to the "center" of the array (H/2, W/2)
///
/// For even array lengths, which have no center value, this moves the value to the next value after the center
pub fn fft2_shift_inplace<T: Copy + Send>(mut input: ArrayViewMut2<T>) {
    Zip::from(input.lanes_mut(Axis(1))).par_for_each(|row| {
        fft_shift_inplace(row);
    });

    Zip::from(input.lanes_mut(Axis(0))).par_for_each(|col| {
        fft_shift_inplace(col);
    });
}

/// Moves the origin (0) to the "center" of the array (N/2)
///
/// Equivalent to a cyclic roll by `N / 2`.
pub fn fft_shift_inplace<T: Copy>(mut input: ArrayViewMut1<T>) {
    if input.is_empty() {
        return;
    }
    if input.len() % 2 == 0 {
        return fft_shift_even(input);
    }

    let len = input.len();
    let half = len / 2;

    let mut i = input.len();
    let mut j = half;
    let mut temp1 = input[half];
    for _ in 0..half {
        i -= 1;
        j -= 1;
        std::mem::swap(&mut temp1, &mut input[i]);

        std::mem::swap(&mut temp1, &mut input[j]);
    }
    input[half] = temp1;
}

fn fft_shift_even<T: Copy>(mut input: ArrayViewMut1<T>) {
    let half = input.len() / 2;
    for i in 0..half {
        input.swap(i, i + half);
    }
}

/// Cyclic 2D shift: the element at `[i, j]` ends up at `[i + iroll, j + jroll]`, wrapping on
/// both axes. Negative rolls shift towards the origin.
pub fn roll2d<S, T>(image: &ArrayBase<S, Ix2>, (iroll, jroll): (isize, isize)) -> Array2<T>
where
    S: Data<Elem = T>,
    T: Copy,
{
    let (h, w) = image.dim();
    if h == 0 || w == 0 {
        return image.to_owned();
    }
    let di = iroll.rem_euclid(h as isize) as usize;
    let dj = jroll.rem_euclid(w as isize) as usize;
    Array2::from_shape_fn((h, w), |(i, j)| image[[(i + h - di) % h, (j + w - dj) % w]])
}
