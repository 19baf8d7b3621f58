//! Access control conditions of card applications, DIDs and data sets

/// Boolean condition over the authentication state of DIDs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SecurityCondition {
    /// Always satisfied
    Always,
    /// Satisfied when the DID's authentication state equals `state`
    DidAuthenticationState {
        /// DID name
        did_name: String,
        /// Required authentication state
        state: bool,
    },
    /// Satisfied when every condition is; an empty list is never satisfied
    And(Vec<Self>),
    /// Satisfied when any condition is
    Or(Vec<Self>),
    /// Negation
    Not(Box<Self>),
}

impl SecurityCondition {
    /// Condition that requires `did_name` to be authenticated
    pub fn authenticated(did_name: impl Into<String>) -> Self {
        Self::DidAuthenticationState {
            did_name: did_name.into(),
            state: true,
        }
    }

    /// Condition that requires `did_name` not to be authenticated
    pub fn not_authenticated(did_name: impl Into<String>) -> Self {
        Self::DidAuthenticationState {
            did_name: did_name.into(),
            state: false,
        }
    }

    /// Evaluate against an authentication state lookup
    pub fn evaluate(&self, is_authenticated: &impl Fn(&str) -> bool) -> bool {
        match self {
            Self::Always => true,
            Self::DidAuthenticationState { did_name, state } => {
                is_authenticated(did_name.as_str()) == *state
            }
            Self::And(conditions) => {
                !conditions.is_empty()
                    && conditions.iter().all(|c| c.evaluate(is_authenticated))
            }
            Self::Or(conditions) => conditions.iter().any(|c| c.evaluate(is_authenticated)),
            Self::Not(condition) => !condition.evaluate(is_authenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use SecurityCondition::*;

    fn pin_only(name: &str) -> bool {
        name == "PIN"
    }

    #[test]
    fn test_leaves() {
        assert!(Always.evaluate(&pin_only));
        assert!(SecurityCondition::authenticated("PIN").evaluate(&pin_only));
        assert!(!SecurityCondition::authenticated("CAN").evaluate(&pin_only));
        assert!(SecurityCondition::not_authenticated("CAN").evaluate(&pin_only));
        assert!(!Not(Box::new(Always)).evaluate(&pin_only));
    }

    #[test]
    fn test_empty_composites_fail_closed() {
        assert!(!And(vec![]).evaluate(&pin_only));
        assert!(!Or(vec![]).evaluate(&pin_only));
        assert!(Not(Box::new(And(vec![]))).evaluate(&pin_only));
    }

    #[test]
    fn test_composites_short_circuit() {
        let calls = Cell::new(0);
        let counting = |name: &str| {
            calls.set(calls.get() + 1);
            name == "PIN"
        };

        let or = Or(vec![
            SecurityCondition::authenticated("PIN"),
            SecurityCondition::authenticated("CAN"),
        ]);
        assert!(or.evaluate(&counting));
        assert_eq!(calls.get(), 1);

        calls.set(0);
        let and = And(vec![
            SecurityCondition::authenticated("CAN"),
            SecurityCondition::authenticated("PIN"),
        ]);
        assert!(!and.evaluate(&counting));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_nested() {
        // PIN and not (CAN or PUK)
        let condition = And(vec![
            SecurityCondition::authenticated("PIN"),
            Not(Box::new(Or(vec![
                SecurityCondition::authenticated("CAN"),
                SecurityCondition::authenticated("PUK"),
            ]))),
        ]);
        assert!(condition.evaluate(&pin_only));
        assert!(!condition.evaluate(&|name: &str| name == "PIN" || name == "PUK"));
    }

    #[test]
    fn test_constant_operands_reduce_to_leaf() {
        for authenticated in [true, false] {
            let state = |name: &str| name == "X" && authenticated;
            let and = And(vec![Always, SecurityCondition::authenticated("X")]);
            assert_eq!(and.evaluate(&state), authenticated);

            let state = |name: &str| name == "Y" && authenticated;
            let or = Or(vec![Not(Box::new(Always)), SecurityCondition::not_authenticated("Y")]);
            assert_eq!(or.evaluate(&state), !authenticated);
        }
    }
}
