use serde::{Deserialize, Serialize};

use super::pose::{Pose, PoseField};
use crate::common::{DecodeError, DecodeResult};

pub const FIELD_DELIMITER: char = ';';

/// What to do with a token that is not a finite number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Reject the whole payload.
    #[default]
    Strict,
    /// Leave the field at zero and keep going.
    ZeroFill,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub pose: Pose,
    /// Fields zeroed under `DecodePolicy::ZeroFill`.
    pub rejected: Vec<PoseField>,
    /// Tokens past the sixth; never parsed.
    pub ignored_tokens: usize,
}

/// Parses `tx;ty;tz;rx;ry;rz` text into a [`Pose`].
///
/// Tokens are assigned by position. Missing trailing fields stay zero and
/// anything after the sixth token is ignored. Surrounding whitespace, empty
/// payloads and a single trailing delimiter are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseDecoder {
    policy: DecodePolicy,
}

impl PoseDecoder {
    pub fn new(policy: DecodePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DecodePolicy {
        self.policy
    }

    pub fn decode(&self, text: &str) -> DecodeResult<Decoded> {
        let mut decoded = Decoded {
            pose: Pose::zero(),
            rejected: Vec::new(),
            ignored_tokens: 0,
        };

        let text = text.trim();
        if text.is_empty() {
            return Ok(decoded);
        }

        let mut tokens: Vec<&str> = text.split(FIELD_DELIMITER).collect();
        if tokens.len() > 1 && tokens.last().is_some_and(|t| t.trim().is_empty()) {
            tokens.pop();
        }

        for (index, token) in tokens.into_iter().enumerate() {
            let Some(field) = PoseField::from_index(index) else {
                decoded.ignored_tokens += 1;
                continue;
            };
            match parse_component(field, token) {
                Ok(value) => decoded.pose.set(field, value),
                Err(err) => match self.policy {
                    DecodePolicy::Strict => return Err(err),
                    DecodePolicy::ZeroFill => decoded.rejected.push(field),
                },
            }
        }

        Ok(decoded)
    }
}

fn parse_component(field: PoseField, token: &str) -> DecodeResult<f64> {
    let trimmed = token.trim();
    let value: f64 = trimmed.parse().map_err(|_| DecodeError::InvalidNumber {
        field,
        token: trimmed.to_string(),
    })?;
    if !value.is_finite() {
        return Err(DecodeError::NonFinite {
            field,
            token: trimmed.to_string(),
        });
    }
    Ok(value)
}
