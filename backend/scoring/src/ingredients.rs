use crate::normalize::normalize_ingredients;

/// Jaccard similarity of two ingredient lists after trimming, lower-casing and de-duplicating.
///
/// Two empty lists score 0.
pub fn ingredient_overlap<A: AsRef<str>, B: AsRef<str>>(left: &[A], right: &[B]) -> f64 {
    let left = normalize_ingredients(left);
    let right = normalize_ingredients(right);

    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }

    left.intersection(&right).count() as f64 / union as f64
}
