//! Distance kernels for the three supported metric spaces.
//!
//! Mirrors hnswlib's space contract as described in spec.md §3 (`space` ∈
//! `l2`, `ip`, `cosine`) — `l2` is squared Euclidean distance, `ip` is
//! `1 - dot(a, b)` (so that smaller is "closer", consistent with hnswlib's
//! inner-product space), and `cosine` is `1 - cosine_similarity(a, b)`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Space {
    L2,
    Ip,
    Cosine,
}

impl Space {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "l2" => Some(Space::L2),
            "ip" => Some(Space::Ip),
            "cosine" => Some(Space::Cosine),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Space::L2 => "l2",
            Space::Ip => "ip",
            Space::Cosine => "cosine",
        }
    }

    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Space::L2 => l2_sq(a, b),
            Space::Ip => ip_distance(a, b),
            Space::Cosine => cosine_distance(a, b),
        }
    }
}

#[inline]
fn l2_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn ip_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - dot(a, b)
}

#[inline]
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let na = dot(a, a).sqrt();
    let nb = dot(b, b).sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot(a, b) / (na * nb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_of_equal_vectors_is_zero() {
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(Space::L2.distance(&v, &v), 0.0);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![2.0, 0.0];
        assert!(Space::Cosine.distance(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn space_parse_rejects_unknown() {
        assert!(Space::parse("manhattan").is_none());
        assert_eq!(Space::parse("l2"), Some(Space::L2));
    }
}
