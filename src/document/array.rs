//! Identity-preserving edits of TOML arrays.
//!
//! These helpers mutate an existing [`Array`] instead of building a new one, so
//! comments and formatting attached to the array and its surviving elements
//! stay where the user put them.

use toml_edit::{Array, Value};

/// Keep only the elements for which `keep` returns true.
///
/// Returns how many elements were removed.
pub fn filter_in_place<F>(array: &mut Array, mut keep: F) -> usize
where
    F: FnMut(&Value) -> bool,
{
    let before = array.len();
    array.retain(|value| keep(value));
    before - array.len()
}

/// Replace elements in place; `f` returns `Some(new)` for elements to replace.
///
/// Returns how many elements were replaced. Decor of replaced elements is kept.
pub fn map_in_place<F>(array: &mut Array, mut f: F) -> usize
where
    F: FnMut(&Value) -> Option<Value>,
{
    let mut replaced = 0;
    for index in 0..array.len() {
        let replacement = array.get(index).and_then(&mut f);
        if let Some(new) = replacement {
            array.replace(index, new);
            replaced += 1;
        }
    }
    replaced
}

/// Append `item` unless an equal string is already present.
///
/// Returns true when the array changed.
pub fn push_unique(array: &mut Array, item: &str) -> bool {
    if contains_str(array, item) {
        false
    } else {
        array.push(item);
        true
    }
}

/// Whether the array holds the string `item`.
pub fn contains_str(array: &Array, item: &str) -> bool {
    array.iter().any(|v| v.as_str() == Some(item))
}

/// Collect the string elements, skipping anything else.
pub fn strings(array: &Array) -> Vec<String> {
    array.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
}

/// Build a fresh array of strings.
pub fn string_array<I, S>(items: I) -> Array
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut array = Array::new();
    for item in items {
        array.push(item.as_ref());
    }
    array
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml_edit::DocumentMut;

    fn packages(doc: &mut DocumentMut) -> &mut Array {
        doc["packages"].as_array_mut().unwrap()
    }

    #[test]
    fn test_filter_keeps_comments_of_survivors() {
        let mut doc: DocumentMut = "packages = [\n  # science\n  \"numpy\",\n  \"scipy\",\n]\n"
            .parse()
            .unwrap();
        let removed = filter_in_place(packages(&mut doc), |v| v.as_str() != Some("scipy"));
        assert_eq!(removed, 1);
        let text = doc.to_string();
        assert!(text.contains("# science"));
        assert!(!text.contains("scipy"));
    }

    #[test]
    fn test_map_replaces_matching_only() {
        let mut doc: DocumentMut = "packages = [\"numpy\", \"scipy\"]\n".parse().unwrap();
        let replaced = map_in_place(packages(&mut doc), |v| {
            (v.as_str() == Some("numpy")).then(|| Value::from("numpy=1.26"))
        });
        assert_eq!(replaced, 1);
        assert_eq!(strings(packages(&mut doc)), vec!["numpy=1.26", "scipy"]);
    }

    #[test]
    fn test_push_unique() {
        let mut array = string_array(["defaults"]);
        assert!(!push_unique(&mut array, "defaults"));
        assert!(push_unique(&mut array, "conda-forge"));
        assert_eq!(strings(&array), vec!["defaults", "conda-forge"]);
    }
}
