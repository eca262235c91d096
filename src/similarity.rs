//! Character-sequence similarity used to match OCR reads against known plates.
//!
//! Ratcliff/Obershelp "gestalt" matching: take the longest common run, recurse
//! on the pieces left and right of it, and score `2 * matched / total_len`.
//! Single substitutions in a 10-character plate still score around 0.9, which
//! is what makes it suitable for OCR correction.

/// Similarity in `[0, 1]`. Two empty strings are identical.
pub fn ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_chars(&a, &b) as f32 / total as f32
}

/// Number of characters covered by all matching blocks.
pub fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut stack = vec![(0, a.len(), 0, b.len())];
    let mut matched = 0;

    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, k) = longest_match(a, b, (alo, ahi), (blo, bhi));
        if k == 0 {
            continue;
        }

        matched += k;

        if alo < i && blo < j {
            stack.push((alo, i, blo, j));
        }

        if i + k < ahi && j + k < bhi {
            stack.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common run `(i, j, len)` within the given ranges. Among equally
/// long runs the one starting earliest in `a`, then earliest in `b`, wins.
fn longest_match(
    a: &[char],
    b: &[char],
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
) -> (usize, usize, usize) {
    let (mut besti, mut bestj, mut bestk) = (alo, blo, 0);

    let width = bhi - blo + 1;
    let mut prev = vec![0usize; width];
    let mut curr = vec![0usize; width];

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;

            curr[col] = if a[i] == b[j] { prev[col - 1] + 1 } else { 0 };

            if curr[col] > bestk {
                bestk = curr[col];
                besti = i + 1 - bestk;
                bestj = j + 1 - bestk;
            }
        }

        std::mem::swap(&mut prev, &mut curr);
    }

    (besti, bestj, bestk)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn identical_and_disjoint() {
        assert!(close(ratio("PB11DB4699", "PB11DB4699"), 1.0));
        assert!(close(ratio("AAAA", "BBBB"), 0.0));
        assert!(close(ratio("", ""), 1.0));
        assert!(close(ratio("ABC", ""), 0.0));
    }

    #[test]
    fn single_substitution() {
        assert!(close(ratio("AB12CD3455", "AB12CD3456"), 0.9));
    }

    #[test]
    fn shifted_run() {
        assert!(close(ratio("abcd", "bcde"), 0.75));
    }

    #[test]
    fn blocks_on_both_sides_of_the_longest_run() {
        // "PB" + "11" + "4699" around the mismatching middle
        let a: Vec<char> = "PB11DB4699".chars().collect();
        let b: Vec<char> = "PB11XX4699".chars().collect();
        assert_eq!(matching_chars(&a, &b), 8);
    }

    #[test]
    fn longest_match_prefers_earliest() {
        let a: Vec<char> = "xaby".chars().collect();
        let b: Vec<char> = "abab".chars().collect();
        assert_eq!(longest_match(&a, &b, (0, 4), (0, 4)), (1, 0, 2));
    }
}
