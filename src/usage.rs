//! Token usage accounting.

use serde::{Deserialize, Serialize};
use std::ops::Add;

/// Token usage for a single request/response pair.
///
/// `+` is componentwise; a field absent on both operands stays absent, but
/// a field present on either operand is counted (missing treated as 0).
/// `Usage::default()` (all `None`) is the identity for `+` as long as the
/// other operand isn't also entirely absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub reasoning_tokens: Option<u64>,
}

fn add_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            prompt_tokens: add_opt(self.prompt_tokens, rhs.prompt_tokens),
            completion_tokens: add_opt(self.completion_tokens, rhs.completion_tokens),
            total_tokens: add_opt(self.total_tokens, rhs.total_tokens),
            reasoning_tokens: add_opt(self.reasoning_tokens, rhs.reasoning_tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_one_side_all_none() {
        let a = Usage {
            prompt_tokens: Some(5),
            completion_tokens: Some(1),
            total_tokens: Some(6),
            reasoning_tokens: None,
        };
        assert_eq!(a + Usage::default(), a);
        assert_eq!(Usage::default() + a, a);
    }

    #[test]
    fn commutative_and_associative() {
        let a = Usage {
            prompt_tokens: Some(1),
            completion_tokens: None,
            total_tokens: Some(1),
            reasoning_tokens: None,
        };
        let b = Usage {
            prompt_tokens: Some(2),
            completion_tokens: Some(3),
            total_tokens: Some(5),
            reasoning_tokens: Some(1),
        };
        let c = Usage {
            prompt_tokens: None,
            completion_tokens: Some(4),
            total_tokens: Some(4),
            reasoning_tokens: None,
        };

        assert_eq!(a + b, b + a);
        assert_eq!((a + b) + c, a + (b + c));
    }
}
