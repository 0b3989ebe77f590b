//! The rule tree for one style scope, and bounded query-group matching.
//!
//! Matching an element never walks the whole rule tree. Instead the element's
//! sorted class set is expanded into a bounded "query group": the hash of
//! every single class, every pair and every triple drawn from the first four
//! classes, plus the hash of the combined (first-four) set. Each candidate
//! hash is filtered through the set of key hashes that actually exist, and
//! the filtered group is memoized per combined hash. Classes beyond the
//! fourth contribute exact single-class checks only; their combination space
//! grows too fast to be worth caching.
//!
//! The memo cache is cleared in full whenever a previously unseen key hash
//! is registered, because global key membership determines which candidate
//! combinations survive the filter.

use std::num::NonZeroUsize;

use lru::LruCache;
use rustc_hash::{FxBuildHasher, FxHashSet};
use smallvec::SmallVec;

use crate::error::SelectorError;
use crate::style::class_key::{self, ClassKey};
use crate::style::rule::{PseudoState, RuleId, StyleRule};
use crate::style::selector::{self, Step};

/// Bounded number of classes participating in combination queries.
const COMBINATION_LIMIT: usize = 4;

/// Entries kept in the query-group memo cache.
///
/// Real applications use a few hundred distinct class combinations; 4k keeps
/// the cache effectively unbounded in practice while still capping memory.
const QUERY_CACHE_CAPACITY: usize = 4 * 1024;

/// Candidate key hashes for one element class set.
pub type QueryGroup = SmallVec<[u32; 8]>;

/// Matched rules for one element, in cascade order.
pub type MatchList = SmallVec<[RuleId; 8]>;

/// Owns the style-rule prefix tree for one style scope.
///
/// A rule tree is created with its owning scope (typically a window) and
/// torn down with it; it is never process-global.
pub struct RuleTree {
  /// Arena of rules; index 0 is the root rule with the empty key
  rules: Vec<StyleRule>,
  /// Every rule-key hash ever created in this tree
  all_keys: FxHashSet<u32>,
  /// Memoized filtered query groups keyed by combined-class hash
  query_cache: LruCache<u32, QueryGroup, FxBuildHasher>,
}

impl Default for RuleTree {
  fn default() -> Self {
    Self::new()
  }
}

impl RuleTree {
  pub fn new() -> Self {
    let capacity = NonZeroUsize::new(QUERY_CACHE_CAPACITY).unwrap();
    Self {
      rules: vec![StyleRule::new(ClassKey::root(), PseudoState::None)],
      all_keys: FxHashSet::default(),
      query_cache: LruCache::with_hasher(capacity, FxBuildHasher),
    }
  }

  /// Borrows a rule by id.
  pub fn rule(&self, id: RuleId) -> &StyleRule {
    &self.rules[id.index()]
  }

  /// Mutably borrows a rule by id.
  pub fn rule_mut(&mut self, id: RuleId) -> &mut StyleRule {
    &mut self.rules[id.index()]
  }

  /// Number of rules including the root.
  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.len() == 1
  }

  /// Registers a selector expression, creating rule nodes as needed.
  ///
  /// Returns the terminal rule of each valid alternative (the node whose
  /// properties the caller should populate) alongside diagnostics for the
  /// alternatives that failed. A failed alternative creates nothing.
  pub fn register(&mut self, expr: &str) -> (Vec<RuleId>, Vec<SelectorError>) {
    let (alts, mut errors) = selector::parse(expr);
    let mut out = Vec::with_capacity(alts.len());
    for steps in alts {
      match self.register_alternative(&steps) {
        Ok(id) => out.push(id),
        Err(err) => errors.push(err),
      }
    }
    (out, errors)
  }

  fn register_alternative(&mut self, steps: &[Step]) -> Result<RuleId, SelectorError> {
    let mut current = RuleId::ROOT;
    for step in steps {
      current = self.find_or_create(current, step)?;
    }
    debug_assert!(current != RuleId::ROOT);
    Ok(current)
  }

  /// Returns the child of `parent` for `step`, creating it (and its pseudo
  /// slot, when requested) on first reference.
  ///
  /// Requesting a pseudo slot requires the rule reached before applying the
  /// pseudo to not itself be a pseudo rule; pseudo context is inherited at
  /// creation, so `.a:hover .b:active` is rejected at the `.b` step.
  pub fn find_or_create(&mut self, parent: RuleId, step: &Step) -> Result<RuleId, SelectorError> {
    let key = ClassKey::from_sorted(&step.tokens);
    let hash = key.hash();

    let base = match self.rules[parent.index()].children.get(&hash) {
      Some(&id) => id,
      None => {
        let inherited = self.rules[parent.index()].pseudo;
        let id = self.push_rule(StyleRule::new(key, inherited));
        self.rules[parent.index()].children.insert(hash, id);
        self.register_key(hash);
        id
      }
    };

    let Some(slot) = step.pseudo.slot() else {
      return Ok(base);
    };

    if self.rules[base.index()].pseudo != PseudoState::None {
      return Err(SelectorError::NestedPseudo {
        parent: self.rules[base.index()].key_text().to_string(),
      });
    }

    if let Some(existing) = self.rules[base.index()].pseudo_children[slot] {
      return Ok(existing);
    }
    let key = self.rules[base.index()].key.clone();
    let id = self.push_rule(StyleRule::new(key, step.pseudo));
    let base_rule = &mut self.rules[base.index()];
    base_rule.pseudo_children[slot] = Some(id);
    base_rule.has_pseudo = true;
    Ok(id)
  }

  fn push_rule(&mut self, rule: StyleRule) -> RuleId {
    let id = RuleId(self.rules.len() as u32);
    self.rules.push(rule);
    id
  }

  /// Records a newly created key hash and invalidates the memo cache.
  fn register_key(&mut self, hash: u32) {
    if self.all_keys.insert(hash) {
      self.query_cache.clear();
    }
  }

  /// Whether a rule key with this hash exists anywhere in the tree.
  pub fn has_key(&self, hash: u32) -> bool {
    self.all_keys.contains(&hash)
  }

  /// Computes the bounded query group for an element class list.
  ///
  /// `classes` is taken in declaration order; only the first four take part
  /// in combination queries. The returned hashes are already filtered to
  /// keys that exist in this tree.
  pub fn query_group<T: AsRef<str>>(&mut self, classes: &[T]) -> QueryGroup {
    let len = classes.len();
    let mut group = QueryGroup::new();
    if len == 0 {
      return group;
    }
    if len == 1 {
      self.push_if_known(class_key::hash_token(classes[0].as_ref()), &mut group);
      return group;
    }

    let bounded = len.min(COMBINATION_LIMIT);
    let mut sorted: SmallVec<[&str; COMBINATION_LIMIT]> =
      classes[..bounded].iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    let combined = class_key::hash_joined(&sorted);

    let cached = self.query_cache.get(&combined).cloned();
    let mut group = match cached {
      Some(group) => group,
      None => {
        let mut group = QueryGroup::new();
        for i in 0..bounded {
          self.push_if_known(class_key::hash_token(sorted[i]), &mut group);
        }
        for i in 0..bounded {
          for j in (i + 1)..bounded {
            self.push_if_known(class_key::hash_pair(sorted[i], sorted[j]), &mut group);
          }
        }
        if bounded >= 3 {
          for i in 0..bounded {
            for j in (i + 1)..bounded {
              for k in (j + 1)..bounded {
                self.push_if_known(
                  class_key::hash_triple(sorted[i], sorted[j], sorted[k]),
                  &mut group,
                );
              }
            }
          }
        }
        if bounded > 1 {
          self.push_if_known(combined, &mut group);
        }
        self.query_cache.put(combined, group.clone());
        group
      }
    };

    // Exact single-class checks for classes past the combination limit.
    // These never enter the cache; the combination space past degree four
    // grows combinatorially.
    for extra in &classes[bounded..] {
      self.push_if_known(class_key::hash_token(extra.as_ref()), &mut group);
    }
    group
  }

  fn push_if_known(&self, hash: u32, group: &mut QueryGroup) {
    if self.all_keys.contains(&hash) && !group.contains(&hash) {
      group.push(hash);
    }
  }

  /// Matches an element against this tree.
  ///
  /// `scopes` are the active ancestor rules (root-most first) collected by
  /// the caller while walking the element tree: every rule an ancestor
  /// matched that has descendant steps. The implicit root scope is always
  /// consulted first. For each candidate hash that resolves to a child rule,
  /// the rule itself is matched and, when `state` selects an existing pseudo
  /// slot, the pseudo rule right after it.
  pub fn match_element<T: AsRef<str>>(
    &mut self,
    scopes: &[RuleId],
    classes: &[T],
    state: PseudoState,
  ) -> MatchList {
    let group = self.query_group(classes);
    let mut out = MatchList::new();
    if group.is_empty() {
      return out;
    }
    self.match_scope(RuleId::ROOT, &group, state, &mut out);
    for &scope in scopes {
      self.match_scope(scope, &group, state, &mut out);
    }
    out
  }

  fn match_scope(&self, scope: RuleId, group: &QueryGroup, state: PseudoState, out: &mut MatchList) {
    for hash in group {
      if let Some(&child) = self.rules[scope.index()].children.get(hash) {
        out.push(child);
        let rule = &self.rules[child.index()];
        if rule.has_pseudo {
          if let Some(slot) = state.slot() {
            if let Some(pseudo) = rule.pseudo_children[slot] {
              out.push(pseudo);
            }
          }
        }
      }
    }
  }

  /// Brute-force reference matcher used to validate the query-group
  /// algorithm: walks every child of every scope and keeps those whose
  /// token set is a subset of the element's class set.
  #[cfg(test)]
  pub(crate) fn match_element_exhaustive<T: AsRef<str>>(
    &self,
    scopes: &[RuleId],
    classes: &[T],
    state: PseudoState,
  ) -> MatchList {
    let class_set: Vec<&str> = classes.iter().map(AsRef::as_ref).collect();
    let mut out = MatchList::new();
    for scope in std::iter::once(RuleId::ROOT).chain(scopes.iter().copied()) {
      let mut children: Vec<&StyleRule> = self.rules[scope.index()]
        .children
        .values()
        .map(|id| &self.rules[id.index()])
        .collect();
      children.sort_by(|a, b| a.key_text().cmp(b.key_text()));
      for rule in children {
        let tokens: Vec<&str> = rule.key_text().split('.').skip(1).collect();
        if tokens.iter().all(|t| class_set.contains(t)) {
          let id = *self.rules[scope.index()]
            .children
            .get(&rule.key.hash())
            .unwrap();
          out.push(id);
          if rule.has_pseudo {
            if let Some(slot) = state.slot() {
              if let Some(pseudo) = rule.pseudo_children[slot] {
                out.push(pseudo);
              }
            }
          }
        }
      }
    }
    out
  }

  #[cfg(test)]
  pub(crate) fn cached_group_count(&self) -> usize {
    self.query_cache.len()
  }
}
