//! Spectral resampling of generic LUTs onto sensor bands.
//!
//! A band value is the response weighted integral of the LUT over the
//! wavelengths covered by both the band and the LUT, divided by the
//! integral of the response. The integral is trapezoidal on the union of
//! the LUT and response nodes, with the LUT linear between its own nodes,
//! so bands narrower than the LUT spacing still get their full weight.
//! Accumulation runs in `f64` in wavelength order and is reproducible.

use crate::types::{
    GenericLut, LutError, LutResult, RsrCurve, SensorLut, SensorRsr, GENERIC_NDIM, WAVE_AXIS,
};
use ndarray::{ArrayD, Axis, IxDyn};
use std::collections::HashMap;

/// Linear interpolation of `curve` at `wave`, zero outside the curve
pub fn interpolate_response(wave: &[f64], curve: &RsrCurve) -> Vec<f64> {
    let xs = &curve.wave;
    let ys = &curve.response;
    let (first, last) = match (xs.first(), xs.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return vec![0.0; wave.len()],
    };

    wave.iter()
        .map(|&x| {
            if x < first || x > last {
                return 0.0;
            }
            // First index with xs[idx] >= x
            let idx = xs.partition_point(|&v| v < x);
            if idx == 0 {
                return ys[0];
            }
            if xs[idx] == x {
                return ys[idx];
            }
            let (x0, x1) = (xs[idx - 1], xs[idx]);
            let t = (x - x0) / (x1 - x0);
            ys[idx - 1] + t * (ys[idx] - ys[idx - 1])
        })
        .collect()
}

/// Normalised weight of every LUT wavelength node for one band.
///
/// Each integration node carries its trapezoid weight times the response
/// there, split between the two LUT nodes bracketing it.
pub fn band_weights(wave: &[f64], curve: &RsrCurve) -> LutResult<Vec<f64>> {
    let (lut_first, lut_last) = match (wave.first(), wave.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return Err(LutError::Resample("LUT has no wavelengths".to_string())),
    };
    if wave.windows(2).any(|w| w[1] <= w[0]) {
        return Err(LutError::Resample(
            "LUT wavelengths must be strictly ascending".to_string(),
        ));
    }
    let (rsr_first, rsr_last) = match (curve.wave.first(), curve.wave.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return Err(LutError::Resample("empty response curve".to_string())),
    };

    let lo = lut_first.max(rsr_first);
    let hi = lut_last.min(rsr_last);
    if !(hi > lo) {
        return Err(LutError::Resample(format!(
            "response curve ({}..{}) does not overlap the LUT wavelengths ({}..{})",
            rsr_first, rsr_last, lut_first, lut_last
        )));
    }

    let mut nodes: Vec<f64> = wave
        .iter()
        .chain(curve.wave.iter())
        .copied()
        .filter(|&x| x > lo && x < hi)
        .collect();
    nodes.push(lo);
    nodes.push(hi);
    nodes.sort_by(|a, b| a.total_cmp(b));
    nodes.dedup();

    let response = interpolate_response(&nodes, curve);
    let mut weights = vec![0.0; wave.len()];

    for (k, &x) in nodes.iter().enumerate() {
        let left = if k > 0 { x - nodes[k - 1] } else { 0.0 };
        let right = nodes.get(k + 1).map_or(0.0, |&next| next - x);
        let c = 0.5 * (left + right) * response[k];
        if c == 0.0 {
            continue;
        }

        // lo <= x <= hi, so x lies inside the LUT grid
        let j = wave.partition_point(|&v| v < x);
        if wave[j] == x {
            weights[j] += c;
        } else {
            let t = (x - wave[j - 1]) / (wave[j] - wave[j - 1]);
            weights[j - 1] += c * (1.0 - t);
            weights[j] += c * t;
        }
    }

    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return Err(LutError::Resample(format!(
            "response curve ({}..{}) has no weight inside the LUT wavelengths",
            rsr_first, rsr_last
        )));
    }
    for w in weights.iter_mut() {
        *w /= total;
    }
    Ok(weights)
}

/// Reduce `data` along `axis` with the band response weighted integral.
/// The result has one axis fewer than `data`.
pub fn convolve_axis(
    data: &ArrayD<f32>,
    wave: &[f64],
    curve: &RsrCurve,
    axis: Axis,
) -> LutResult<ArrayD<f32>> {
    if axis.index() >= data.ndim() {
        return Err(LutError::Resample(format!(
            "axis {} out of range for {} dimensional data",
            axis.index(),
            data.ndim()
        )));
    }
    if data.len_of(axis) != wave.len() {
        return Err(LutError::Resample(format!(
            "{} wavelengths but axis {} has length {}",
            wave.len(),
            axis.index(),
            data.len_of(axis)
        )));
    }

    let weights = band_weights(wave, curve)?;

    let mut shape = data.shape().to_vec();
    shape.remove(axis.index());
    let mut acc = ArrayD::<f64>::zeros(IxDyn(&shape));

    for (i, &w) in weights.iter().enumerate() {
        if w == 0.0 {
            continue;
        }
        let slice = data.index_axis(axis, i);
        acc.zip_mut_with(&slice, |a, &v| *a += w * v as f64);
    }

    Ok(acc.mapv(|a| a as f32))
}

/// Resample every band declared by `rsr`
pub fn resample_to_sensor(lut: &GenericLut, rsr: &SensorRsr) -> LutResult<SensorLut> {
    if lut.data.ndim() != GENERIC_NDIM {
        return Err(LutError::Resample(format!(
            "generic LUT has {} axes, expected {}",
            lut.data.ndim(),
            GENERIC_NDIM
        )));
    }

    let mut data = HashMap::with_capacity(rsr.bands.len());
    for band in &rsr.bands {
        let curve = rsr.curve(band)?;
        let resampled = convolve_axis(&lut.data, &lut.meta.wave, curve, Axis(WAVE_AXIS))
            .map_err(|e| LutError::Resample(format!("{} band {}: {}", rsr.sensor, band, e)))?;
        log::debug!("Resampled band {} to shape {:?}", band, resampled.shape());
        data.insert(band.clone(), resampled);
    }

    Ok(SensorLut {
        bands: rsr.bands.clone(),
        data,
        meta: lut.meta.without_wave(),
    })
}
