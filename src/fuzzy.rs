//! Edit-distance matching used for header resolution and lenient text
//! comparison.

use strsim::levenshtein;

/// Lowercases and strips spaces and punctuation so the distance measures
/// content rather than formatting.
pub fn normalize(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

pub fn distance(a: &str, b: &str) -> usize {
    levenshtein(&normalize(a), &normalize(b))
}

pub fn is_match(a: &str, b: &str, max_distance: usize) -> bool {
    distance(a, b) <= max_distance
}

/// Finds the candidate closest to `target` within `max_distance`, returning
/// its index and distance. Ties keep the earliest candidate.
pub fn find_closest<'a, I>(target: &str, candidates: I, max_distance: usize) -> Option<(usize, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let normalized_target = normalize(target);
    let mut best: Option<(usize, usize)> = None;
    for (index, candidate) in candidates.into_iter().enumerate() {
        let dist = levenshtein(&normalized_target, &normalize(candidate));
        if dist > max_distance {
            continue;
        }
        match best {
            Some((_, best_dist)) if best_dist <= dist => {}
            _ => best = Some((index, dist)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(normalize("ACME Corp."), "acmecorp");
        assert_eq!(normalize("  Unit-Price "), "unitprice");
    }

    #[test]
    fn distance_ignores_case_and_punctuation() {
        assert_eq!(distance("ACME Corp.", "acme corp"), 0);
        assert_eq!(distance("Widget", "Wdget"), 1);
    }

    #[test]
    fn is_match_applies_threshold() {
        assert!(is_match("Contoso Ltd", "Contoso Ltd.", 2));
        assert!(is_match("Quantity", "Quantty", 2));
        assert!(!is_match("Quantity", "Amount", 2));
    }

    #[test]
    fn find_closest_prefers_earliest_tie() {
        let candidates = ["CustomerId", "CustomerIds", "Customer"];
        let (index, dist) = find_closest("customer_id", candidates, 2).unwrap();
        assert_eq!(index, 0);
        assert_eq!(dist, 0);
    }

    #[test]
    fn find_closest_respects_max_distance() {
        let candidates = ["Quantity", "UnitPrice"];
        assert!(find_closest("Total", candidates, 2).is_none());
    }
}
