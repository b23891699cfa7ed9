use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;

static NON_LETTERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z\s]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Lower-cases a title, keeps only ascii letters and whitespace, and collapses whitespace runs.
pub fn normalize_title(input: &str) -> String {
    let lowered = input.to_lowercase();
    let letters = NON_LETTERS.replace_all(&lowered, "");

    WHITESPACE.replace_all(&letters, " ").trim().to_string()
}

/// Ingredient set used for overlap scoring. Entries are trimmed and lower-cased, blanks dropped.
pub fn normalize_ingredients<S: AsRef<str>>(ingredients: &[S]) -> BTreeSet<String> {
    ingredients
        .iter()
        .map(|ingredient| ingredient.as_ref().trim().to_lowercase())
        .filter(|ingredient| !ingredient.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{normalize_ingredients, normalize_title};

    #[test]
    fn test_basic() {
        assert_eq!(normalize_title("Chicken Pasta"), "chicken pasta");
        assert_eq!(normalize_title("Mom's Apple-Pie!"), "moms applepie");
    }

    #[test]
    fn test_leading_trailing_spaces() {
        assert_eq!(normalize_title("   pasta   "), "pasta");
        assert_eq!(normalize_title("  beef \t stir\n fry  "), "beef stir fry");
    }

    #[test]
    fn test_digits_and_symbols() {
        assert_eq!(normalize_title("5 Minute Fudge"), "minute fudge");
        assert_eq!(normalize_title("!@#$%^&*()"), "");
        assert_eq!(normalize_title("Crème Brûlée"), "crme brle");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("     "), "");
    }

    #[test]
    fn test_ingredients_are_sets() {
        let set = normalize_ingredients(&[" Chicken", "chicken ", "", "  ", "Pasta"]);

        assert_eq!(set.len(), 2);
        assert!(set.contains("chicken"));
        assert!(set.contains("pasta"));
    }
}
