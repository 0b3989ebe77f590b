//! Canonical, hash-stable keys for sorted class-token sets.
//!
//! A selector step like `.b.a` and an element class list `["a", "b"]` must
//! land on the same rule-tree slot, so every token set is canonicalized to a
//! sorted, dot-joined form before hashing. All matching is done on the
//! 32-bit hash; the text is kept for diagnostics.

/// Canonical representation of a set of class tokens.
///
/// # Examples
///
/// ```
/// use reflow::style::ClassKey;
///
/// let a = ClassKey::from_tokens(&["b", "a"]);
/// let b = ClassKey::from_tokens(&["a", "b"]);
/// assert_eq!(a.hash(), b.hash());
/// assert_eq!(a.text(), ".a.b");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassKey {
  text: String,
  hash: u32,
}

impl ClassKey {
  /// The empty key used by a rule tree's root rule.
  pub fn root() -> Self {
    Self {
      text: String::new(),
      hash: hash_text(""),
    }
  }

  /// Builds a key from a single class token.
  pub fn single(token: &str) -> Self {
    let text = format!(".{token}");
    let hash = hash_text(&text);
    Self { text, hash }
  }

  /// Builds a key from an unsorted token set. Tokens are sorted before
  /// joining, so any permutation of the same set yields the same key.
  pub fn from_tokens<T: AsRef<str>>(tokens: &[T]) -> Self {
    let mut sorted: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    Self::from_sorted(&sorted)
  }

  /// Builds a key from tokens already in sorted order.
  pub fn from_sorted<T: AsRef<str>>(tokens: &[T]) -> Self {
    let mut text = String::with_capacity(tokens.iter().map(|t| t.as_ref().len() + 1).sum());
    for token in tokens {
      text.push('.');
      text.push_str(token.as_ref());
    }
    let hash = hash_text(&text);
    Self { text, hash }
  }

  /// The canonical dot-joined text, e.g. `.a.b`
  pub fn text(&self) -> &str {
    &self.text
  }

  /// The 32-bit hash of the canonical text
  pub fn hash(&self) -> u32 {
    self.hash
  }
}

/// Hashes a single class token as its canonical single-class key.
pub fn hash_token(token: &str) -> u32 {
  let mut h = FNV_OFFSET;
  h = fnv_step(h, b'.');
  for &byte in token.as_bytes() {
    h = fnv_step(h, byte);
  }
  h
}

/// Hashes a pair of sorted tokens as their canonical combined key.
pub fn hash_pair(a: &str, b: &str) -> u32 {
  debug_assert!(a <= b);
  hash_joined(&[a, b])
}

/// Hashes a triple of sorted tokens as their canonical combined key.
pub fn hash_triple(a: &str, b: &str, c: &str) -> u32 {
  debug_assert!(a <= b && b <= c);
  hash_joined(&[a, b, c])
}

/// Hashes sorted tokens as their canonical dot-joined key without
/// materializing the text.
pub fn hash_joined<T: AsRef<str>>(sorted: &[T]) -> u32 {
  let mut h = FNV_OFFSET;
  for token in sorted {
    h = fnv_step(h, b'.');
    for &byte in token.as_ref().as_bytes() {
      h = fnv_step(h, byte);
    }
  }
  h
}

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

fn fnv_step(h: u32, byte: u8) -> u32 {
  (h ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
}

fn hash_text(text: &str) -> u32 {
  let mut h = FNV_OFFSET;
  for &byte in text.as_bytes() {
    h = fnv_step(h, byte);
  }
  h
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn permutations_share_hash_and_text() {
    let sets = [
      vec!["alpha", "beta", "gamma"],
      vec!["gamma", "alpha", "beta"],
      vec!["beta", "gamma", "alpha"],
    ];
    let first = ClassKey::from_tokens(&sets[0]);
    for set in &sets[1..] {
      let key = ClassKey::from_tokens(set);
      assert_eq!(key.hash(), first.hash());
      assert_eq!(key.text(), first.text());
    }
    assert_eq!(first.text(), ".alpha.beta.gamma");
  }

  #[test]
  fn incremental_hashes_match_materialized_keys() {
    assert_eq!(hash_token("nav"), ClassKey::single("nav").hash());
    assert_eq!(
      hash_pair("aa", "bb"),
      ClassKey::from_tokens(&["bb", "aa"]).hash()
    );
    assert_eq!(
      hash_triple("a", "b", "c"),
      ClassKey::from_tokens(&["c", "a", "b"]).hash()
    );
  }

  #[test]
  fn distinct_sets_get_distinct_hashes() {
    assert_ne!(hash_token("a"), hash_token("b"));
    assert_ne!(hash_pair("a", "b"), hash_token("ab"));
  }
}
