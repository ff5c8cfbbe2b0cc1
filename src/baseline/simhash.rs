//! 64-bit SimHash over whitespace tokens, used for near-duplicate page
//! detection. Two bodies that differ only in timestamps, nonces or a few
//! template variables land within a small Hamming distance of each other.

/// Pages whose SimHashes are at most this many bits apart are treated as
/// near-duplicates.
pub const HAMMING_THRESHOLD: u32 = 6;

pub fn simhash64(body: &str) -> u64 {
    let mut weights = [0i64; 64];
    let mut prev: Option<u64> = None;
    for tok in body.split_whitespace() {
        if tok.len() < 2 {
            continue;
        }
        let h = fnv1a64(tok);
        accumulate(&mut weights, h, 1);
        // bigram features bind neighbouring tokens so reordered pages
        // do not collapse to the same hash
        if let Some(p) = prev {
            accumulate(&mut weights, p ^ h.rotate_left(1), 1);
        }
        prev = Some(h);
    }
    let mut out = 0u64;
    for (bit, w) in weights.iter().enumerate() {
        if *w > 0 {
            out |= 1 << bit;
        }
    }
    out
}

pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn accumulate(weights: &mut [i64; 64], hash: u64, weight: i64) {
    for (bit, w) in weights.iter_mut().enumerate() {
        if hash >> bit & 1 == 1 {
            *w += weight;
        } else {
            *w -= weight;
        }
    }
}

fn fnv1a64(token: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in token.bytes() {
        h ^= u64::from(b.to_ascii_lowercase());
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bodies_hash_identically() {
        let a = simhash64("<html><body>not found</body></html>");
        let b = simhash64("<html><body>not found</body></html>");
        assert_eq!(hamming(a, b), 0);
    }

    #[test]
    fn near_duplicates_stay_within_threshold() {
        let page: String = (0..200)
            .map(|i| format!("row{i} value{i} column{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let a = simhash64(&format!("{page} request-id 8f2c"));
        let b = simhash64(&format!("{page} request-id 91aa"));
        assert!(hamming(a, b) <= HAMMING_THRESHOLD);
    }

    #[test]
    fn unrelated_bodies_diverge() {
        let a = simhash64("login page enter your username and password to continue");
        let b = simhash64(
            "robots disallow admin private cgi-bin backup staging internal metrics healthz",
        );
        assert!(hamming(a, b) > HAMMING_THRESHOLD);
    }
}
