use crate::domain::{CandidateLabelSet, ClassificationResult, RawClassification};

pub fn blur_score(raw: &RawClassification, labels: &CandidateLabelSet) -> f64 {
    raw.pairs()
        .filter(|(label, _)| labels.is_blur(label))
        .map(|(_, score)| score)
        .sum()
}

pub fn pmo_score(blur_score: f64) -> u8 {
    (blur_score * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Inclusive: a score exactly at the threshold blurs.
pub fn should_blur(pmo_score: u8, sensitivity: u8) -> bool {
    pmo_score >= sensitivity
}

pub fn decide(
    raw: &RawClassification,
    labels: &CandidateLabelSet,
    sensitivity: u8,
) -> ClassificationResult {
    let combined = blur_score(raw, labels);
    let pmo = pmo_score(combined);
    let threshold = sensitivity.min(100);
    let (top_label, top_score) = raw.top();

    ClassificationResult {
        should_blur: should_blur(pmo, threshold),
        top_label: top_label.to_string(),
        top_score,
        blur_score: combined,
        pmo_score: pmo,
        threshold,
        raw_scores: raw
            .pairs()
            .map(|(label, score)| (label.to_string(), score))
            .collect(),
    }
}
