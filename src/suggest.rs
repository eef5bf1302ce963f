//! Typeahead ranking for the company / title / level / country pickers.

use strsim::jaro_winkler;

const FUZZY_THRESHOLD: f64 = 0.82;
const RESOLVE_THRESHOLD: f64 = 0.92;

/// Ranks `options` for a partially typed `query`: prefix matches, then
/// substring matches, then close fuzzy matches. An empty query lists the
/// options in order.
pub fn suggest<'a, S: AsRef<str>>(query: &str, options: &'a [S], limit: usize) -> Vec<&'a str> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return options.iter().map(AsRef::as_ref).take(limit).collect();
    }

    let mut ranked: Vec<(u8, f64, usize, &str)> = options
        .iter()
        .enumerate()
        .filter_map(|(i, option)| {
            let option = option.as_ref();
            let lower = option.to_lowercase();
            if lower.starts_with(&query) {
                Some((0, 1.0, i, option))
            } else if lower.contains(&query) {
                Some((1, 1.0, i, option))
            } else {
                let score = jaro_winkler(&query, &lower);
                (score >= FUZZY_THRESHOLD).then_some((2, score, i, option))
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.2.cmp(&b.2))
    });
    ranked.into_iter().take(limit).map(|(_, _, _, option)| option).collect()
}

/// Snaps free text onto a known option when it is an obvious match
/// ("google" -> "Google"). Returns `None` for genuinely custom values.
pub fn resolve<'a, S: AsRef<str>>(input: &str, options: &'a [S]) -> Option<&'a str> {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    if let Some(exact) = options
        .iter()
        .map(AsRef::as_ref)
        .find(|option| option.to_lowercase() == needle)
    {
        return Some(exact);
    }

    options
        .iter()
        .map(|option| (jaro_winkler(&needle, &option.as_ref().to_lowercase()), option.as_ref()))
        .filter(|(score, _)| *score >= RESOLVE_THRESHOLD)
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, option)| option)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn companies() -> Vec<String> {
        ["Google", "Meta", "Amazon", "Microsoft", "Stripe", "Shopify", "Snowflake"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_prefix_before_substring() {
        let options = companies();
        let hits = suggest("s", &options, 10);
        assert_eq!(hits[..3], ["Stripe", "Shopify", "Snowflake"]);
        // "Microsoft" contains an s but does not start with one
        assert!(hits.contains(&"Microsoft"));
        assert!(hits.iter().position(|h| *h == "Microsoft") > hits.iter().position(|h| *h == "Snowflake"));
    }

    #[test]
    fn test_empty_query_lists_in_order() {
        let options = companies();
        assert_eq!(suggest("", &options, 2), vec!["Google", "Meta"]);
    }

    #[test]
    fn test_fuzzy_typo() {
        let options = companies();
        assert_eq!(suggest("Gogle", &options, 1), vec!["Google"]);
    }

    #[test]
    fn test_resolve() {
        let options = companies();
        assert_eq!(resolve("google", &options), Some("Google"));
        assert_eq!(resolve("Microsfot", &options), Some("Microsoft"));
        assert_eq!(resolve("Acme Robotics", &options), None);
        assert_eq!(resolve("  ", &options), None);
    }
}
