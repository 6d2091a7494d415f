//! String distance used to reconcile line modifications

/// Levenshtein edit distance over Unicode scalar values
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Characters newly entered when a line changes from `old` to `new`.
///
/// Formula: `levenshtein(old, new) - max(0, len(old) - len(new))`, so that
/// shrinking a line is not counted as entering characters. The distance is
/// never smaller than the length difference, so this cannot underflow.
pub fn characters_altered(old: &str, new: &str) -> usize {
    let old_len = old.chars().count();
    let new_len = new.chars().count();
    levenshtein(old, new).saturating_sub(old_len.saturating_sub(new_len))
}
