//! Data Sanitization
//!
//! Numerical guards for probabilities read from storage or remote services.
//!
//! Functions:
//! - Probability clamping (non-finite aware)
//! - Optional-value validation for untrusted payloads

/// 检查数值是否为有效概率 (有限且位于 [0, 1])
pub fn is_valid_probability(x: f64) -> bool {
    x.is_finite() && (0.0..=1.0).contains(&x)
}

/// 将任意数值限制到 [0, 1]
///
/// NaN 映射为 0，+Inf 为 1，-Inf 为 0。
pub fn clamp_probability(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// 仅保留有限数值
pub fn finite(x: Option<f64>) -> Option<f64> {
    x.filter(|v| v.is_finite())
}

/// 有限则限制到 [0, 1]，否则使用回退值
pub fn probability_or(x: Option<f64>, fallback: f64) -> f64 {
    finite(x).map(clamp_probability).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_probability_in_range() {
        assert_eq!(clamp_probability(0.0), 0.0);
        assert_eq!(clamp_probability(0.42), 0.42);
        assert_eq!(clamp_probability(1.0), 1.0);
    }

    #[test]
    fn test_clamp_probability_out_of_range() {
        assert_eq!(clamp_probability(-5.0), 0.0);
        assert_eq!(clamp_probability(2.0), 1.0);
        assert_eq!(clamp_probability(f64::NAN), 0.0);
        assert_eq!(clamp_probability(f64::INFINITY), 1.0);
        assert_eq!(clamp_probability(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_is_valid_probability() {
        assert!(is_valid_probability(0.5));
        assert!(!is_valid_probability(1.01));
        assert!(!is_valid_probability(f64::NAN));
    }

    #[test]
    fn test_probability_or() {
        assert_eq!(probability_or(Some(0.3), 0.9), 0.3);
        assert_eq!(probability_or(Some(4.0), 0.9), 1.0);
        assert_eq!(probability_or(Some(f64::NAN), 0.9), 0.9);
        assert_eq!(probability_or(None, 0.9), 0.9);
    }
}
