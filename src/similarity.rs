use crate::error::SimilarityError;

/// Scores strictly above this are a match.
pub const MATCH_THRESHOLD: f32 = 0.4;

/// Outcome of comparing a query embedding against the document embedding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub score: f32,
    pub matched: bool,
}

/// Cosine similarity in `[-1, 1]`.
///
/// Fails on empty, mismatched, non-finite or zero-norm input instead of
/// inventing a score for it.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.is_empty() || b.is_empty() {
        return Err(SimilarityError::InvalidVector("empty vector".to_string()));
    }
    if a.len() != b.len() {
        return Err(SimilarityError::InvalidVector(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if !(dot.is_finite() && norm_a.is_finite() && norm_b.is_finite()) {
        return Err(SimilarityError::InvalidVector(
            "non-finite component".to_string(),
        ));
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Err(SimilarityError::InvalidVector("zero vector".to_string()));
    }

    Ok((dot / denom).clamp(-1.0, 1.0) as f32)
}

pub fn is_match(score: f32) -> bool {
    score > MATCH_THRESHOLD
}

pub fn evaluate(query: &[f32], document: &[f32]) -> Result<Verdict, SimilarityError> {
    let score = cosine_similarity(query, document)?;
    Ok(Verdict {
        score,
        matched: is_match(score),
    })
}
