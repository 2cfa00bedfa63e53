// src/services/slug.rs
// DOCUMENTATION: Slugs and name normalization
// PURPOSE: Stable URL identifiers and duplicate detection keys

/// Lowercase ASCII slug, non-alphanumeric runs collapsed to one hyphen
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        let ch = match ch {
            '&' => {
                // "Fruit & Veg" -> "fruit-and-veg"
                if !slug.is_empty() {
                    slug.push('-');
                }
                slug.push_str("and");
                pending_dash = true;
                continue;
            }
            '\'' | '\u{2019}' => continue,
            c => c,
        };

        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Slug candidate for a farm: name plus town, falling back to county
pub fn farm_slug(name: &str, city: Option<&str>, county: &str) -> String {
    let place = city.filter(|c| !c.trim().is_empty()).unwrap_or(county);
    let base = slugify(&format!("{} {}", name, place));
    if base.is_empty() {
        "farm".to_string()
    } else {
        base
    }
}

/// Candidate number `n` (1-based) for a base slug: base, base-2, base-3...
pub fn numbered_slug(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, n)
    }
}

/// First candidate for `base` that is not already taken
pub fn pick_free_slug(base: &str, taken: &std::collections::HashSet<String>) -> String {
    (1..)
        .map(|n| numbered_slug(base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Key used to spot the same shop submitted twice
/// DOCUMENTATION: Case, punctuation and a few filler words are ignored
pub fn normalize_name(name: &str) -> String {
    const FILLER: [&str; 4] = ["the", "ltd", "limited", "and"];

    slugify(name)
        .split('-')
        .filter(|w| !FILLER.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hollow Farm Shop"), "hollow-farm-shop");
        assert_eq!(slugify("  Fruit & Veg!! "), "fruit-and-veg");
        assert_eq!(slugify("Bob's   Eggs -- Ltd."), "bobs-eggs-ltd");
        assert_eq!(slugify("Café Rouge"), "caf-rouge");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_farm_slug() {
        assert_eq!(
            farm_slug("Hollow Farm", Some("Ludlow"), "Shropshire"),
            "hollow-farm-ludlow"
        );
        assert_eq!(farm_slug("Hollow Farm", Some(" "), "Shropshire"), "hollow-farm-shropshire");
        assert_eq!(farm_slug("!!", None, "??"), "farm");
    }

    #[test]
    fn test_numbered_slug() {
        assert_eq!(numbered_slug("hollow-farm", 1), "hollow-farm");
        assert_eq!(numbered_slug("hollow-farm", 3), "hollow-farm-3");
    }

    #[test]
    fn test_pick_free_slug() {
        let mut taken = std::collections::HashSet::new();
        assert_eq!(pick_free_slug("hollow-farm", &taken), "hollow-farm");

        taken.insert("hollow-farm".to_string());
        taken.insert("hollow-farm-2".to_string());
        assert_eq!(pick_free_slug("hollow-farm", &taken), "hollow-farm-3");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("The Hollow Farm Ltd"), "hollow farm");
        assert_eq!(normalize_name("hollow  FARM"), "hollow farm");
        assert_eq!(normalize_name("Fruit & Veg"), "fruit veg");
    }
}
