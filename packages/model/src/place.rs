//! Fractional order keys.
//!
//! A place is a base-36 fraction written without the leading `0.` and
//! without trailing zeros, so byte order equals numeric order. A key can
//! always be minted between two others, which lets a single insertion avoid
//! renumbering the rest of the chapter.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const BASE: u128 = 36;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Place(String);

impl TryFrom<String> for Place {
    type Error = ModelError;

    fn try_from(key: String) -> ModelResult<Self> {
        Place::parse(key)
    }
}

impl From<Place> for String {
    fn from(place: Place) -> Self {
        place.0
    }
}

impl Place {
    /// Validates a key received from the remote store
    pub fn parse(key: impl Into<String>) -> ModelResult<Self> {
        let key = key.into();
        let valid = !key.is_empty()
            && !key.ends_with('0')
            && key.bytes().all(|b| digit_value(b).is_some());
        if valid {
            Ok(Place(key))
        } else {
            Err(ModelError::InvalidPlace(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A key strictly between `before` and `after` (either end may be open)
    pub fn between(before: Option<&Place>, after: Option<&Place>) -> ModelResult<Place> {
        if let (Some(a), Some(b)) = (before, after) {
            if a >= b {
                return Err(ModelError::InvalidPlace(format!("{} >= {}", a, b)));
            }
        }
        let lo = before.map(|p| p.0.as_bytes()).unwrap_or(&[]);
        let hi = after.map(|p| p.0.as_bytes());
        let key = midpoint(lo, hi);
        // midpoint only emits bytes from DIGITS
        Ok(Place(String::from_utf8_lossy(&key).into_owned()))
    }

    /// `count` evenly spaced ascending keys of equal width
    pub fn sequence(count: usize) -> Vec<Place> {
        if count == 0 {
            return Vec::new();
        }

        let slots = count as u128 + 1;
        let mut width = 1u32;
        let mut span = BASE;
        while span <= slots && width < 24 {
            width += 1;
            span *= BASE;
        }
        let step = (span / slots).max(1);

        (1..=count as u128)
            .map(|i| {
                let mut value = i * step;
                let mut digits = vec![b'0'; width as usize];
                for slot in digits.iter_mut().rev() {
                    *slot = DIGITS[(value % BASE) as usize];
                    value /= BASE;
                }
                while digits.last() == Some(&b'0') {
                    digits.pop();
                }
                Place(String::from_utf8_lossy(&digits).into_owned())
            })
            .collect()
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn digit_value(b: u8) -> Option<usize> {
    DIGITS.iter().position(|d| *d == b)
}

fn midpoint(lo: &[u8], hi: Option<&[u8]>) -> Vec<u8> {
    if let Some(hi) = hi {
        let mut n = 0;
        while n < hi.len() && lo.get(n).copied().unwrap_or(b'0') == hi[n] {
            n += 1;
        }
        if n > 0 {
            let mut out = hi[..n].to_vec();
            out.extend(midpoint(lo.get(n..).unwrap_or(&[]), Some(&hi[n..])));
            return out;
        }
    }

    let digit_lo = lo.first().and_then(|b| digit_value(*b)).unwrap_or(0);
    let digit_hi = match hi {
        Some(hi) => hi.first().and_then(|b| digit_value(*b)).unwrap_or(DIGITS.len()),
        None => DIGITS.len(),
    };

    if digit_hi - digit_lo > 1 {
        vec![DIGITS[(digit_lo + digit_hi + 1) / 2]]
    } else if let Some(hi) = hi.filter(|hi| hi.len() > 1) {
        vec![hi[0]]
    } else {
        let mut out = vec![DIGITS[digit_lo]];
        out.extend(midpoint(lo.get(1..).unwrap_or(&[]), None));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_between_open_ends() {
        let first = Place::between(None, None).unwrap();
        let after = Place::between(Some(&first), None).unwrap();
        let before = Place::between(None, Some(&first)).unwrap();
        assert!(before < first);
        assert!(first < after);
    }

    #[test]
    fn test_between_adjacent_keys() {
        let a = Place::parse("a").unwrap();
        let b = Place::parse("b").unwrap();
        let mid = Place::between(Some(&a), Some(&b)).unwrap();
        assert!(a < mid && mid < b, "{} not between a and b", mid);
        assert!(!mid.as_str().ends_with('0'));
    }

    #[test]
    fn test_between_rejects_inverted_bounds() {
        let a = Place::parse("b").unwrap();
        let b = Place::parse("a").unwrap();
        assert!(Place::between(Some(&a), Some(&b)).is_err());
    }

    #[test]
    fn test_sequence_is_strictly_ascending() {
        for count in [1, 2, 3, 35, 36, 37, 500, 5000] {
            let places = Place::sequence(count);
            assert_eq!(places.len(), count);
            assert!(places.windows(2).all(|w| w[0] < w[1]), "count {}", count);
            assert!(places.iter().all(|p| Place::parse(p.as_str()).is_ok()));
        }
    }

    #[test]
    fn test_random_insertions_keep_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut places = Place::sequence(3);

        for _ in 0..300 {
            let index = rng.gen_range(0..=places.len());
            let before = index.checked_sub(1).map(|i| &places[i]);
            let after = places.get(index);
            let place = Place::between(before, after).unwrap();
            places.insert(index, place);
        }

        assert!(places.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parse_rejects_trailing_zero() {
        assert!(Place::parse("a0").is_err());
        assert!(Place::parse("").is_err());
        assert!(Place::parse("A").is_err());
    }

    #[test]
    fn test_deserialize_validates_keys() {
        let place: Place = serde_json::from_str(r#""h""#).unwrap();
        assert_eq!(place.as_str(), "h");
        assert_eq!(serde_json::to_string(&place).unwrap(), r#""h""#);

        for bad in [r#""""#, r#""a0""#, r#""A""#] {
            assert!(serde_json::from_str::<Place>(bad).is_err(), "{} accepted", bad);
        }
    }
}
