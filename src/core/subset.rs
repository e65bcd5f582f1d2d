use ndarray::{ArrayD, Axis};

/// Rows of `stored` matching `requested`, in request order.
/// Names missing from `stored` are dropped.
pub fn parameter_indices<S: AsRef<str>>(stored: &[String], requested: &[S]) -> (Vec<usize>, Vec<String>) {
    let mut indices = Vec::new();
    let mut kept = Vec::new();

    for name in requested {
        for (j, stored_name) in stored.iter().enumerate() {
            if stored_name == name.as_ref() {
                indices.push(j);
                kept.push(stored_name.clone());
            }
        }
    }
    (indices, kept)
}

/// Select `indices` along the leading parameter axis
pub fn select_parameters(data: &ArrayD<f32>, indices: &[usize]) -> ArrayD<f32> {
    data.select(Axis(0), indices)
}

/// Replace every NaN with zero, returning how many were replaced
pub fn zero_nans(data: &mut ArrayD<f32>) -> usize {
    let mut replaced = 0;
    data.map_inplace(|v| {
        if v.is_nan() {
            *v = 0.0;
            replaced += 1;
        }
    });
    replaced
}
