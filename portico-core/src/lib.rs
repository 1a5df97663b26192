mod validation;

pub use validation::{FieldMessage, Input, Rule, RuleSet, UniqueProbe, Validation};


/// Name shown for an account: first and last name separated by a single space.
pub fn display_name(first_name: &str, last_name: &str) -> String {
    format!("{first_name} {last_name}")
}
