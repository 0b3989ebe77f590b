//! Selector expression parsing.
//!
//! Grammar:
//!
//! ```text
//! expr       := alt (',' alt)*
//! alt        := step (' ' step)*
//! step       := '.' token ('.' token)* (':' pseudoName)?
//! pseudoName := 'normal' | 'hover' | 'active'
//! ```
//!
//! A step's tokens are canonically sorted before lookup, so `.b.a` and
//! `.a.b` address the same rule. An invalid step fails its whole alternative
//! with a diagnostic; other alternatives still parse.

use crate::error::SelectorError;
use crate::style::rule::PseudoState;

/// One parsed step: a sorted token set plus an optional pseudo state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
  /// Class tokens in sorted order
  pub tokens: Vec<String>,
  /// Requested pseudo state, `PseudoState::None` when absent
  pub pseudo: PseudoState,
}

/// One alternative of an expression: a chain of descendant steps.
pub type Alternative = Vec<Step>;

/// Parses a full expression into its alternatives.
///
/// Valid alternatives and per-alternative diagnostics are returned side by
/// side; a syntax error in one alternative never suppresses the others.
pub fn parse(expr: &str) -> (Vec<Alternative>, Vec<SelectorError>) {
  let mut alts = Vec::new();
  let mut errors = Vec::new();
  for alt in expr.split(',') {
    let alt = alt.trim();
    if alt.is_empty() {
      continue;
    }
    match parse_alternative(alt) {
      Ok(steps) => alts.push(steps),
      Err(err) => errors.push(err),
    }
  }
  if alts.is_empty() && errors.is_empty() {
    errors.push(SelectorError::EmptyExpression {
      expr: expr.to_string(),
    });
  }
  (alts, errors)
}

fn parse_alternative(alt: &str) -> Result<Alternative, SelectorError> {
  let mut steps = Vec::new();
  for step in alt.split_whitespace() {
    steps.push(parse_step(step)?);
  }
  if steps.is_empty() {
    return Err(SelectorError::EmptyExpression {
      expr: alt.to_string(),
    });
  }
  Ok(steps)
}

fn parse_step(step: &str) -> Result<Step, SelectorError> {
  let (classes, pseudo) = match step.split_once(':') {
    Some((classes, pseudo_name)) => (classes, parse_pseudo(pseudo_name)?),
    None => (step, PseudoState::None),
  };

  let Some(rest) = classes.strip_prefix('.') else {
    return Err(SelectorError::MissingDot {
      step: step.to_string(),
    });
  };

  let mut tokens: Vec<String> = Vec::new();
  for token in rest.split('.') {
    if token.is_empty() {
      return Err(SelectorError::EmptyToken {
        step: step.to_string(),
      });
    }
    if !tokens.iter().any(|t| t == token) {
      tokens.push(token.to_string());
    }
  }
  tokens.sort_unstable();

  Ok(Step { tokens, pseudo })
}

fn parse_pseudo(name: &str) -> Result<PseudoState, SelectorError> {
  match name {
    "normal" => Ok(PseudoState::Normal),
    "hover" => Ok(PseudoState::Hover),
    "active" => Ok(PseudoState::Active),
    _ => Err(SelectorError::UnknownPseudo {
      name: name.to_string(),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn step_tokens_are_sorted_and_deduped() {
    let (alts, errors) = parse(".b.a.b:hover");
    assert!(errors.is_empty());
    assert_eq!(alts.len(), 1);
    assert_eq!(alts[0][0].tokens, vec!["a", "b"]);
    assert_eq!(alts[0][0].pseudo, PseudoState::Hover);
  }

  #[test]
  fn descendant_chain_splits_on_whitespace() {
    let (alts, errors) = parse(".nav .item.sel");
    assert!(errors.is_empty());
    assert_eq!(alts[0].len(), 2);
    assert_eq!(alts[0][1].tokens, vec!["item", "sel"]);
  }

  #[test]
  fn bad_alternative_does_not_suppress_good_one() {
    let (alts, errors) = parse("bogus, .ok");
    assert_eq!(alts.len(), 1);
    assert_eq!(alts[0][0].tokens, vec!["ok"]);
    assert!(matches!(errors[0], SelectorError::MissingDot { .. }));
  }

  #[test]
  fn unknown_pseudo_is_rejected() {
    let (alts, errors) = parse(".a:focus");
    assert!(alts.is_empty());
    assert!(matches!(errors[0], SelectorError::UnknownPseudo { .. }));
  }

  #[test]
  fn empty_token_is_rejected() {
    let (alts, errors) = parse("..a");
    assert!(alts.is_empty());
    assert!(matches!(errors[0], SelectorError::EmptyToken { .. }));
  }
}
