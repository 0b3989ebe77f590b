//! Class-based cascading styles: keys, selectors, the rule tree, and the
//! property application layer.

pub mod apply;
pub mod class_key;
pub mod rule;
pub mod selector;
pub mod sheet;

pub use apply::{ApplyCtx, PropertyAccessor, PropertyId, Transition};
pub use class_key::ClassKey;
pub use rule::{PseudoState, RuleId, StyleRule};
pub use selector::{Alternative, Step};
pub use sheet::{MatchList, QueryGroup, RuleTree};
