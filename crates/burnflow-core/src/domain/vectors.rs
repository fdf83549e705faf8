/// Fixed-dimension feature vectors and their persisted JSON shape.
///
/// Vectors are serialized as JSON arrays of doubles with a fixed length per
/// kind. NaN and infinite values are rejected at the encoder; decoders check
/// both length and finiteness so a corrupt row never reaches similarity math.
use serde_json::Value;

use super::errors::PipelineError;

pub const BURN_VECTOR_DIMS: usize = 32;
pub const WEATHER_VECTOR_DIMS: usize = 128;
pub const PLUME_VECTOR_DIMS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorKind {
    Burn,
    Weather,
    Plume,
}

impl VectorKind {
    pub fn dims(&self) -> usize {
        match self {
            Self::Burn => BURN_VECTOR_DIMS,
            Self::Weather => WEATHER_VECTOR_DIMS,
            Self::Plume => PLUME_VECTOR_DIMS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Burn => "burn",
            Self::Weather => "weather",
            Self::Plume => "plume",
        }
    }
}

/// Normalize `v` to unit L2 length in place. All-zero vectors are left
/// untouched; downstream consumers must tolerate them.
pub fn l2_normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Encode a vector for persistence, enforcing the kind's dimension and
/// rejecting non-finite components.
pub fn encode_vector(kind: VectorKind, v: &[f64]) -> Result<Value, PipelineError> {
    if v.len() != kind.dims() {
        return Err(PipelineError::InternalInvariant(format!(
            "{} vector has {} dims, expected {}",
            kind.as_str(),
            v.len(),
            kind.dims()
        )));
    }
    if let Some(bad) = v.iter().find(|x| !x.is_finite()) {
        return Err(PipelineError::InternalInvariant(format!(
            "{} vector contains non-finite component {bad}",
            kind.as_str()
        )));
    }
    Ok(Value::Array(
        v.iter()
            .map(|x| {
                serde_json::Number::from_f64(*x)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            })
            .collect(),
    ))
}

pub fn decode_vector(kind: VectorKind, value: &Value) -> Result<Vec<f64>, PipelineError> {
    let arr = value.as_array().ok_or_else(|| {
        PipelineError::InternalInvariant(format!("{} vector is not an array", kind.as_str()))
    })?;
    if arr.len() != kind.dims() {
        return Err(PipelineError::InternalInvariant(format!(
            "{} vector has {} dims, expected {}",
            kind.as_str(),
            arr.len(),
            kind.dims()
        )));
    }
    let mut out = Vec::with_capacity(arr.len());
    for v in arr {
        let x = v.as_f64().ok_or_else(|| {
            PipelineError::InternalInvariant(format!(
                "{} vector component is not a number",
                kind.as_str()
            ))
        })?;
        if !x.is_finite() {
            return Err(PipelineError::InternalInvariant(format!(
                "{} vector component is not finite",
                kind.as_str()
            )));
        }
        out.push(x);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize_unit_norm() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_l2_normalize_zero_stays_zero() {
        let mut v = vec![0.0; 8];
        l2_normalize(&mut v);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_encode_rejects_wrong_dims() {
        let v = vec![0.0; 10];
        assert!(encode_vector(VectorKind::Burn, &v).is_err());
    }

    #[test]
    fn test_encode_rejects_nan() {
        let mut v = vec![0.0; BURN_VECTOR_DIMS];
        v[5] = f64::NAN;
        assert!(encode_vector(VectorKind::Burn, &v).is_err());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut v = vec![0.0; PLUME_VECTOR_DIMS];
        v[0] = 0.25;
        v[63] = -0.75;
        let encoded = encode_vector(VectorKind::Plume, &v).unwrap();
        let decoded = decode_vector(VectorKind::Plume, &encoded).unwrap();
        assert_eq!(v, decoded);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![0.5, 0.5, 0.5, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = vec![0.0; 4];
        let b = vec![1.0, 0.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
