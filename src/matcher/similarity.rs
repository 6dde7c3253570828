//! Ratcliff/Obershelp "gestalt" similarity.
//!
//! Find the longest common block, recurse into the unmatched text on each
//! side, and score `2 * matched / (len_a + len_b)`. Longest-block ties go to
//! the block starting earliest in `a`, then earliest in `b`. No junk
//! heuristics: titles are short.

/// Similarity ratio in [0, 1]. Two empty strings are identical (1.0).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_chars(&a, &b);
    2.0 * matched as f64 / total as f64
}

/// Total size of all matching blocks.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    // prev[j] = length of the common run ending at a[i-1], b[blo+j-1]
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];
    let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);

    for i in alo..ahi {
        for jj in 0..width {
            curr[jj + 1] = if a[i] == b[blo + jj] { prev[jj] + 1 } else { 0 };
            let k = curr[jj + 1];
            if k > best_len {
                best_len = k;
                best_i = i + 1 - k;
                best_j = blo + jj + 1 - k;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    (best_i, best_j, best_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn identical_strings_score_one() {
        assert!(approx(similarity("iran strike israel", "iran strike israel"), 1.0));
        assert!(approx(similarity("", ""), 1.0));
    }

    #[test]
    fn disjoint_strings_score_zero() {
        assert!(approx(similarity("abc", "xyz"), 0.0));
        assert!(approx(similarity("abc", ""), 0.0));
    }

    #[test]
    fn known_ratios() {
        // "abcd" vs "bcde": block "bcd" → 2*3/8
        assert!(approx(similarity("abcd", "bcde"), 0.75));
        // classic gestalt example: "WIKIMEDIA" vs "WIKIMANIA" → 2*(5+1+1)/18
        let r = similarity("WIKIMEDIA", "WIKIMANIA");
        assert!(approx(r, 14.0 / 18.0), "ratio={r}");
    }

    #[test]
    fn recursion_picks_up_blocks_on_both_sides() {
        // blocks: "ab" then "d" on the right → 2*3/8
        let r = similarity("abxd", "abyd");
        assert!(approx(r, 0.75), "ratio={r}");
    }

    #[test]
    fn identical_inputs_are_symmetric() {
        let a = "khamenei out as supreme leader";
        let b = "khamenei out as supreme leader in 2026";
        assert!(approx(similarity(a, b), similarity(b, a)));
    }
}
