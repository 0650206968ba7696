#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::{
    __m256i, _CMP_EQ_OQ, _CMP_GE_OQ, _CMP_GT_OQ, _CMP_LE_OQ, _CMP_LT_OQ, _mm256_add_epi64,
    _mm256_add_pd, _mm256_and_pd, _mm256_and_si256, _mm256_blendv_epi8, _mm256_castsi256_pd, _mm256_cmp_pd,
    _mm256_cmpeq_epi64, _mm256_cmpgt_epi64, _mm256_loadu_pd, _mm256_loadu_si256, _mm256_max_pd,
    _mm256_min_pd, _mm256_movemask_pd, _mm256_or_si256, _mm256_set1_epi64x, _mm256_set1_pd,
    _mm256_setzero_pd, _mm256_setzero_si256, _mm256_storeu_pd, _mm256_storeu_si256,
    _mm256_xor_si256,
};

use crate::processor::{AggregateOp, FilterPredicate, Value};

/// Reduces an i64 column. Callers guarantee `values` is non-empty.
///
/// Returns `None` when a `Sum` or `Avg` overflows `i64`.
pub fn aggregate_i64(values: &[i64], op: AggregateOp) -> Option<i64> {
    #[cfg(target_arch = "x86_64")]
    if is_x86_feature_detected!("avx2") {
        return unsafe { aggregate_i64_avx2(values, op) };
    }
    aggregate_i64_scalar(values, op)
}

fn aggregate_i64_scalar(values: &[i64], op: AggregateOp) -> Option<i64> {
    match op {
        AggregateOp::Sum | AggregateOp::Avg => {
            values.iter().try_fold(0i64, |acc, &v| acc.checked_add(v))
        }
        AggregateOp::Min => values.iter().copied().min(),
        AggregateOp::Max => values.iter().copied().max(),
        AggregateOp::Count => i64::try_from(values.len()).ok(),
    }
}

// AVX2 has no 64-bit min/max, so they are built from cmpgt + blend.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn aggregate_i64_avx2(values: &[i64], op: AggregateOp) -> Option<i64> {
    const LANES: usize = 4; // __m256i holds 4 i64s
    let mut sum = _mm256_setzero_si256();
    let mut overflow = _mm256_setzero_si256();
    let mut min = _mm256_set1_epi64x(i64::MAX);
    let mut max = _mm256_set1_epi64x(i64::MIN);

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    for chunk in chunks {
        let v = unsafe { _mm256_loadu_si256(chunk.as_ptr() as *const __m256i) };
        let next = _mm256_add_epi64(sum, v);
        // a lane overflowed iff its result's sign differs from both operands
        overflow = _mm256_or_si256(
            overflow,
            _mm256_and_si256(_mm256_xor_si256(sum, next), _mm256_xor_si256(v, next)),
        );
        sum = next;
        min = _mm256_blendv_epi8(min, v, _mm256_cmpgt_epi64(min, v));
        max = _mm256_blendv_epi8(max, v, _mm256_cmpgt_epi64(v, max));
    }

    let mut sum_arr = [0i64; LANES];
    let mut min_arr = [i64::MAX; LANES];
    let mut max_arr = [i64::MIN; LANES];
    unsafe { _mm256_storeu_si256(sum_arr.as_mut_ptr() as *mut __m256i, sum) };
    unsafe { _mm256_storeu_si256(min_arr.as_mut_ptr() as *mut __m256i, min) };
    unsafe { _mm256_storeu_si256(max_arr.as_mut_ptr() as *mut __m256i, max) };

    // sign bit of each i64 lane
    let lanes_overflowed = _mm256_movemask_pd(_mm256_castsi256_pd(overflow)) != 0;
    let total_sum = if lanes_overflowed {
        None
    } else {
        sum_arr
            .iter()
            .chain(remainder)
            .try_fold(0i64, |acc, &v| acc.checked_add(v))
    };
    let mut total_min = min_arr.iter().copied().fold(i64::MAX, i64::min);
    let mut total_max = max_arr.iter().copied().fold(i64::MIN, i64::max);

    for &v in remainder {
        total_min = total_min.min(v);
        total_max = total_max.max(v);
    }

    match op {
        AggregateOp::Sum | AggregateOp::Avg => total_sum,
        AggregateOp::Min => Some(total_min),
        AggregateOp::Max => Some(total_max),
        AggregateOp::Count => i64::try_from(values.len()).ok(),
    }
}

/// Reduces an f64 column. `Avg` returns the mean; callers guarantee
/// `values` is non-empty.
pub fn aggregate_f64(values: &[f64], op: AggregateOp) -> f64 {
    #[cfg(target_arch = "x86_64")]
    if is_x86_feature_detected!("avx2") {
        return unsafe { aggregate_f64_avx2(values, op) };
    }
    aggregate_f64_scalar(values, op)
}

fn aggregate_f64_scalar(values: &[f64], op: AggregateOp) -> f64 {
    match op {
        AggregateOp::Sum => values.iter().sum(),
        AggregateOp::Avg => values.iter().sum::<f64>() / values.len() as f64,
        AggregateOp::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateOp::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregateOp::Count => values.len() as f64,
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn aggregate_f64_avx2(values: &[f64], op: AggregateOp) -> f64 {
    const LANES: usize = 4; // __m256d holds 4 f64s
    let mut sum = _mm256_setzero_pd();
    let mut min = _mm256_set1_pd(f64::INFINITY);
    let mut max = _mm256_set1_pd(f64::NEG_INFINITY);

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    for chunk in chunks {
        let v = unsafe { _mm256_loadu_pd(chunk.as_ptr()) };
        sum = _mm256_add_pd(sum, v);
        min = _mm256_min_pd(min, v);
        max = _mm256_max_pd(max, v);
    }

    let mut sum_arr = [0f64; LANES];
    let mut min_arr = [f64::INFINITY; LANES];
    let mut max_arr = [f64::NEG_INFINITY; LANES];
    unsafe { _mm256_storeu_pd(sum_arr.as_mut_ptr(), sum) };
    unsafe { _mm256_storeu_pd(min_arr.as_mut_ptr(), min) };
    unsafe { _mm256_storeu_pd(max_arr.as_mut_ptr(), max) };

    let mut total_sum: f64 = sum_arr.iter().sum();
    let mut total_min = min_arr.iter().copied().fold(f64::INFINITY, f64::min);
    let mut total_max = max_arr.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    for &v in remainder {
        total_sum += v;
        total_min = total_min.min(v);
        total_max = total_max.max(v);
    }

    match op {
        AggregateOp::Sum => total_sum,
        AggregateOp::Avg => total_sum / values.len() as f64,
        AggregateOp::Min => total_min,
        AggregateOp::Max => total_max,
        AggregateOp::Count => values.len() as f64,
    }
}

fn f64_bounds(op: &FilterPredicate) -> Option<(f64, f64)> {
    match op {
        FilterPredicate::Equals(t) | FilterPredicate::GreaterThan(t) | FilterPredicate::LessThan(t) => {
            t.as_f64().map(|t| (t, t))
        }
        FilterPredicate::Between(lo, hi) => Some((lo.as_f64()?, hi.as_f64()?)),
    }
}

fn keep_f64(op: &FilterPredicate, v: f64, (t1, t2): (f64, f64)) -> bool {
    match op {
        FilterPredicate::Equals(_) => v == t1,
        FilterPredicate::GreaterThan(_) => v > t1,
        FilterPredicate::LessThan(_) => v < t1,
        FilterPredicate::Between(_, _) => v >= t1 && v <= t2,
    }
}

/// Row indices of `values` matching `op`. Non-numeric operands match nothing.
pub fn filter_f64(values: &[f64], op: &FilterPredicate) -> Vec<usize> {
    let Some(bounds) = f64_bounds(op) else {
        return Vec::new();
    };
    #[cfg(target_arch = "x86_64")]
    if is_x86_feature_detected!("avx2") {
        return unsafe { filter_f64_avx2(values, op, bounds) };
    }
    filter_f64_scalar(values, op, bounds)
}

fn filter_f64_scalar(values: &[f64], op: &FilterPredicate, bounds: (f64, f64)) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| if keep_f64(op, v, bounds) { Some(i) } else { None })
        .collect()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn filter_f64_avx2(values: &[f64], op: &FilterPredicate, (t1, t2): (f64, f64)) -> Vec<usize> {
    const LANES: usize = 4;
    let mut out = Vec::with_capacity(values.len());

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();
    let v1 = _mm256_set1_pd(t1);
    let v2 = _mm256_set1_pd(t2);

    for (chunk_idx, chunk) in chunks.enumerate() {
        let v = unsafe { _mm256_loadu_pd(chunk.as_ptr()) };
        let mask = match op {
            FilterPredicate::Equals(_) => _mm256_cmp_pd(v, v1, _CMP_EQ_OQ),
            FilterPredicate::GreaterThan(_) => _mm256_cmp_pd(v, v1, _CMP_GT_OQ),
            FilterPredicate::LessThan(_) => _mm256_cmp_pd(v, v1, _CMP_LT_OQ),
            FilterPredicate::Between(_, _) => {
                let ge = _mm256_cmp_pd(v, v1, _CMP_GE_OQ);
                let le = _mm256_cmp_pd(v, v2, _CMP_LE_OQ);
                _mm256_and_pd(ge, le)
            }
        };

        let mask_bits = _mm256_movemask_pd(mask);
        for i in 0..LANES {
            if (mask_bits & (1 << i)) != 0 {
                out.push(chunk_idx * LANES + i);
            }
        }
    }

    let base = values.len() - remainder.len();
    for (i, &v) in remainder.iter().enumerate() {
        if keep_f64(op, v, (t1, t2)) {
            out.push(base + i);
        }
    }

    out
}

fn i64_bounds(op: &FilterPredicate) -> Option<(i64, i64)> {
    match op {
        FilterPredicate::Equals(Value::Int(t))
        | FilterPredicate::GreaterThan(Value::Int(t))
        | FilterPredicate::LessThan(Value::Int(t)) => Some((*t, *t)),
        FilterPredicate::Between(Value::Int(lo), Value::Int(hi)) => Some((*lo, *hi)),
        _ => None,
    }
}

fn keep_i64(op: &FilterPredicate, v: i64, (t1, t2): (i64, i64)) -> bool {
    match op {
        FilterPredicate::Equals(_) => v == t1,
        FilterPredicate::GreaterThan(_) => v > t1,
        FilterPredicate::LessThan(_) => v < t1,
        FilterPredicate::Between(_, _) => v >= t1 && v <= t2,
    }
}

/// Row indices of `values` matching an integer predicate. Predicates with
/// non-integer operands fall back to float comparison.
pub fn filter_i64(values: &[i64], op: &FilterPredicate) -> Vec<usize> {
    let Some(bounds) = i64_bounds(op) else {
        let as_f64: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        return filter_f64(&as_f64, op);
    };
    #[cfg(target_arch = "x86_64")]
    if is_x86_feature_detected!("avx2") {
        return unsafe { filter_i64_avx2(values, op, bounds) };
    }
    filter_i64_scalar(values, op, bounds)
}

fn filter_i64_scalar(values: &[i64], op: &FilterPredicate, bounds: (i64, i64)) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| if keep_i64(op, v, bounds) { Some(i) } else { None })
        .collect()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn filter_i64_avx2(values: &[i64], op: &FilterPredicate, (t1, t2): (i64, i64)) -> Vec<usize> {
    const LANES: usize = 4;
    let mut out = Vec::with_capacity(values.len());

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();
    let v1 = _mm256_set1_epi64x(t1);
    let v2 = _mm256_set1_epi64x(t2);

    for (chunk_idx, chunk) in chunks.enumerate() {
        let v = unsafe { _mm256_loadu_si256(chunk.as_ptr() as *const __m256i) };
        // for Between the mask marks lanes *outside* the range
        let (mask, inverted) = match op {
            FilterPredicate::Equals(_) => (_mm256_cmpeq_epi64(v, v1), false),
            FilterPredicate::GreaterThan(_) => (_mm256_cmpgt_epi64(v, v1), false),
            FilterPredicate::LessThan(_) => (_mm256_cmpgt_epi64(v1, v), false),
            FilterPredicate::Between(_, _) => (
                _mm256_or_si256(_mm256_cmpgt_epi64(v1, v), _mm256_cmpgt_epi64(v, v2)),
                true,
            ),
        };

        let mut mask_bits = _mm256_movemask_pd(_mm256_castsi256_pd(mask));
        if inverted {
            mask_bits = !mask_bits & 0b1111;
        }
        for i in 0..LANES {
            if (mask_bits & (1 << i)) != 0 {
                out.push(chunk_idx * LANES + i);
            }
        }
    }

    let base = values.len() - remainder.len();
    for (i, &v) in remainder.iter().enumerate() {
        if keep_i64(op, v, (t1, t2)) {
            out.push(base + i);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_f64_matches_scalar() {
        let values = [3.0, 1.5, 8.0, 2.5, 5.0, 0.0, 7.0];
        assert_eq!(aggregate_f64(&values, AggregateOp::Sum), 27.0);
        assert_eq!(aggregate_f64(&values, AggregateOp::Min), 0.0);
        assert_eq!(aggregate_f64(&values, AggregateOp::Max), 8.0);
        assert_eq!(aggregate_f64(&values, AggregateOp::Avg), 27.0 / 7.0);
    }

    #[test]
    fn test_aggregate_i64_min_max() {
        let values = [4, -2, 9, 1, 0, 12, 3, 3, -7];
        assert_eq!(aggregate_i64(&values, AggregateOp::Sum), Some(23));
        assert_eq!(aggregate_i64(&values, AggregateOp::Min), Some(-7));
        assert_eq!(aggregate_i64(&values, AggregateOp::Max), Some(12));
        assert_eq!(aggregate_i64_scalar(&values, AggregateOp::Sum), Some(23));
    }

    #[test]
    fn test_aggregate_i64_sum_overflow() {
        // overflow inside a SIMD lane
        let lanes = [i64::MAX, 0, 0, 0, 1, 0, 0, 0];
        assert_eq!(aggregate_i64(&lanes, AggregateOp::Sum), None);
        // lanes fit, their total does not
        let across = [i64::MAX, 1, 0, 0];
        assert_eq!(aggregate_i64(&across, AggregateOp::Sum), None);
        // overflow in the remainder
        let tail = [i64::MAX, i64::MAX, 9_007_199_254_740_993];
        assert_eq!(aggregate_i64(&tail, AggregateOp::Sum), None);
        assert_eq!(aggregate_i64_scalar(&tail, AggregateOp::Sum), None);
        assert_eq!(aggregate_i64(&tail, AggregateOp::Max), Some(i64::MAX));

        let exact = [i64::MAX - 1, 1];
        assert_eq!(aggregate_i64(&exact, AggregateOp::Sum), Some(i64::MAX));
    }

    #[test]
    fn test_filter_between_inclusive() {
        let ints = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        let p = FilterPredicate::Between(Value::Int(2), Value::Int(6));
        assert_eq!(filter_i64(&ints, &p), vec![1, 2, 3, 4, 5]);

        let floats: Vec<f64> = ints.iter().map(|&v| v as f64).collect();
        assert_eq!(filter_f64(&floats, &p), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_filter_i64_with_float_operand() {
        let ints = [1, 2, 3, 4, 5];
        let p = FilterPredicate::GreaterThan(Value::Float(2.5));
        assert_eq!(filter_i64(&ints, &p), vec![2, 3, 4]);
    }
}
