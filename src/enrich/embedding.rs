//! Deterministic embedding and int8 quantization.
//!
//! The embedder maps tokens into R^128 by SHA-256 feature hashing:
//! each token contributes to four signed buckets derived from its
//! digest, and the accumulated vector is L2-normalized. Vectors are
//! stored quantized to int8 with `scale = max(|v|) / 127`, encoded as
//! a 4-byte little-endian f32 scale header followed by one byte per
//! dimension. The zero vector encodes as all-zero values with a 0.0
//! sentinel scale.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Fixed embedding dimensionality.
pub const EMBEDDING_DIM: usize = 128;

/// Signed buckets each token contributes to.
const BUCKETS_PER_TOKEN: usize = 4;

/// Bytes of the scale header in the stored blob.
const SCALE_HEADER_LEN: usize = 4;

// ── Quantization ──────────────────────────────────────────────

/// A 128-dim vector quantized to int8 with an attached scale factor.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedEmbedding {
    pub scale: f32,
    pub values: Vec<i8>,
}

impl QuantizedEmbedding {
    /// Quantize a float vector.
    ///
    /// `scale = max(|v|) / 127`; each dimension stores
    /// `round(v / scale)`. A zero vector gets the 0.0 sentinel scale.
    #[must_use]
    pub fn quantize(v: &[f32]) -> Self {
        let max_abs = v.iter().fold(0.0_f32, |m, x| m.max(x.abs()));
        if max_abs == 0.0 {
            return Self {
                scale: 0.0,
                values: vec![0; v.len()],
            };
        }

        let scale = max_abs / 127.0;
        let values = v
            .iter()
            .map(|x| (x / scale).round().clamp(-127.0, 127.0) as i8)
            .collect();
        Self { scale, values }
    }

    /// Reconstruct the float vector.
    #[must_use]
    pub fn dequantize(&self) -> Vec<f32> {
        self.values
            .iter()
            .map(|&q| f32::from(q) * self.scale)
            .collect()
    }

    /// Encode as the stored blob: scale header then values.
    #[must_use]
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(SCALE_HEADER_LEN + self.values.len());
        blob.extend_from_slice(&self.scale.to_le_bytes());
        blob.extend(self.values.iter().map(|&v| v as u8));
        blob
    }

    /// Decode a stored blob.
    ///
    /// # Errors
    ///
    /// Returns `Integrity` if the blob length does not match the
    /// expected dimensionality.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        if blob.len() != SCALE_HEADER_LEN + EMBEDDING_DIM {
            return Err(Error::Integrity(format!(
                "embedding blob has unexpected length {}",
                blob.len()
            )));
        }

        let mut scale_bytes = [0u8; SCALE_HEADER_LEN];
        scale_bytes.copy_from_slice(&blob[..SCALE_HEADER_LEN]);
        let scale = f32::from_le_bytes(scale_bytes);

        let values = blob[SCALE_HEADER_LEN..]
            .iter()
            .map(|&b| b as i8)
            .collect();

        Ok(Self { scale, values })
    }
}

// ── Embedding ─────────────────────────────────────────────────

/// Map tokens into a unit vector in R^128.
///
/// Empty token lists produce the zero vector.
#[must_use]
pub fn embed_tokens(tokens: &[String]) -> Vec<f32> {
    let mut acc = vec![0.0_f32; EMBEDDING_DIM];

    for token in tokens {
        let digest = Sha256::digest(token.as_bytes());
        for k in 0..BUCKETS_PER_TOKEN {
            let base = k * 3;
            let index =
                usize::from(u16::from_le_bytes([digest[base], digest[base + 1]])) % EMBEDDING_DIM;
            let sign = if digest[base + 2] & 1 == 0 { 1.0 } else { -1.0 };
            acc[index] += sign;
        }
    }

    let norm = acc.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut acc {
            *x /= norm;
        }
    }
    acc
}

// ── Vector math ───────────────────────────────────────────────

/// Inner product of two vectors. Mismatched lengths score 0.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity in `[-1, 1]`; 0 for empty or zero vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let magnitude = (norm_a * norm_b).sqrt();
    if magnitude == 0.0 {
        0.0
    } else {
        dot_product / magnitude
    }
}
