use std::{collections::VecDeque, fmt::Display};

use super::errors::TranscriptError;
use crate::constant::{POW_NONCE_LABEL, SCALAR_BYTES};

/// This is the separator between operations in the IO Pattern
/// and as such is the only forbidden character in labels.
pub const SEP_BYTE: u8 = b'\0';

/// Kind of a transcript operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OpKind {
    /// Public prover message, fed to the random oracle.
    ///
    /// In a tag, absorb is indicated with 'A'.
    Absorb,
    /// Verifier challenge drawn from the random oracle. Consumes no transcript bytes.
    ///
    /// In a tag, squeeze is indicated with 'S'.
    Squeeze,
    /// Untrusted prover advice, never fed to the random oracle.
    ///
    /// In a tag, hint is indicated with 'H'.
    Hint,
}

impl OpKind {
    const fn tag(self) -> char {
        match self {
            Self::Absorb => 'A',
            Self::Squeeze => 'S',
            Self::Hint => 'H',
        }
    }
}

/// A single operation of an IO pattern.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Op {
    pub kind: OpKind,
    /// Scalars for absorbs (bytes for the proof-of-work nonce), bytes for squeezes,
    /// zero for hints.
    pub size: usize,
    pub label: String,
}

impl Op {
    /// Parse one `\0`-separated part of an IO pattern.
    fn parse(part: &[u8]) -> Result<Self, TranscriptError> {
        let (&id, rest) = part
            .split_first()
            .ok_or_else(|| TranscriptError::InvalidPattern("empty operation".to_string()))?;

        let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        let size = rest[..digits].iter().try_fold(0usize, |acc, &b| {
            acc.checked_mul(10)
                .and_then(|acc| acc.checked_add(usize::from(b - b'0')))
        });
        let size = size
            .ok_or_else(|| TranscriptError::InvalidPattern("operation size overflows".to_string()))?;
        let label = std::str::from_utf8(&rest[digits..])
            .map_err(|_| TranscriptError::InvalidPattern("label is not valid UTF-8".to_string()))?
            .to_string();

        let kind = match (id, digits) {
            (b'A', d) if d > 0 && size > 0 => OpKind::Absorb,
            (b'S', d) if d > 0 && size > 0 => OpKind::Squeeze,
            (b'H', 0) => OpKind::Hint,
            _ => {
                return Err(TranscriptError::InvalidPattern(format!(
                    "invalid tag `{}`",
                    String::from_utf8_lossy(part)
                )));
            }
        };

        Ok(Self { kind, size, label })
    }

    /// Whether this absorb counts raw bytes instead of scalars.
    #[must_use]
    pub fn counts_bytes(&self) -> bool {
        self.kind == OpKind::Absorb && self.label == POW_NONCE_LABEL
    }

    /// Number of public transcript bytes this operation occupies.
    #[must_use]
    pub fn absorb_width(&self) -> usize {
        match self.kind {
            OpKind::Absorb if self.counts_bytes() => self.size,
            OpKind::Absorb => self.size * SCALAR_BYTES,
            OpKind::Squeeze | OpKind::Hint => 0,
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            OpKind::Hint => write!(f, "{}{}", self.kind.tag(), self.label),
            _ => write!(f, "{}{}{}", self.kind.tag(), self.size, self.label),
        }
    }
}

/// A parsed IO pattern: the domain separator followed by the ordered operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IoPattern {
    raw: Vec<u8>,
    ops: Vec<Op>,
}

impl IoPattern {
    /// Parse an IO pattern of the form `domain\0A1label\0S47label\0Hlabel...`.
    pub fn parse(raw: &[u8]) -> Result<Self, TranscriptError> {
        let ops = raw
            .split(|&b| b == SEP_BYTE)
            // skip the domain separator
            .skip(1)
            .map(Op::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_vec(),
            ops,
        })
    }

    /// Raw bytes of the pattern, used to derive the sponge IV.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Total number of public transcript bytes the pattern expects.
    #[must_use]
    pub fn public_len(&self) -> usize {
        self.ops.iter().map(Op::absorb_width).sum()
    }
}

/// What a caller asks the transcript for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Request {
    Scalars,
    Bytes,
    Challenge,
    Hint,
}

/// Position in a sequence of operations.
///
/// An absorb or squeeze may be consumed in several calls as long as kind and unit agree.
#[derive(Clone, Debug)]
pub(crate) struct OpCursor {
    ops: VecDeque<Op>,
    /// Units left in the operation at the front of `ops`.
    remaining: usize,
}

impl OpCursor {
    pub(crate) fn new(ops: impl IntoIterator<Item = Op>) -> Self {
        let ops: VecDeque<Op> = ops.into_iter().collect();
        let remaining = ops.front().map_or(0, |op| op.size);
        Self { ops, remaining }
    }

    /// Checks `count` units of `request` against the pattern and advances it.
    ///
    /// Returns the label of the operation that was (partially) consumed.
    pub(crate) fn consume(&mut self, request: Request, count: usize) -> Result<String, TranscriptError> {
        let describe = || match request {
            Request::Scalars => format!("absorb of {count} scalars"),
            Request::Bytes => format!("absorb of {count} bytes"),
            Request::Challenge => format!("squeeze of {count} bytes"),
            Request::Hint => "hint".to_string(),
        };

        let op = self
            .ops
            .front()
            .ok_or_else(|| TranscriptError::PatternMismatch {
                expected: "end of pattern".to_string(),
                actual: describe(),
            })?;

        let matches = match request {
            Request::Scalars => op.kind == OpKind::Absorb && !op.counts_bytes(),
            Request::Bytes => op.counts_bytes(),
            Request::Challenge => op.kind == OpKind::Squeeze,
            Request::Hint => op.kind == OpKind::Hint,
        };
        if !matches || count > self.remaining {
            return Err(TranscriptError::PatternMismatch {
                expected: format!("{op} ({} left)", self.remaining),
                actual: describe(),
            });
        }

        let label = op.label.clone();
        self.remaining -= count;
        if self.remaining == 0 {
            self.ops.pop_front();
            self.remaining = self.ops.front().map_or(0, |op| op.size);
        }
        Ok(label)
    }

    /// Fails if an operation is still pending.
    pub(crate) fn finish(&self) -> Result<(), TranscriptError> {
        match self.ops.front() {
            Some(op) => Err(TranscriptError::UnconsumedOperation {
                kind: op.kind,
                label: op.label.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_parse_valid_tags() {
        assert_eq!(
            Op::parse(b"A3sumcheck_poly").unwrap(),
            Op {
                kind: OpKind::Absorb,
                size: 3,
                label: "sumcheck_poly".to_string()
            }
        );
        assert_eq!(
            Op::parse(b"S47folding_randomness").unwrap().kind,
            OpKind::Squeeze
        );
        let hint = Op::parse(b"Hmerkle_proof").unwrap();
        assert_eq!(hint.kind, OpKind::Hint);
        assert_eq!(hint.size, 0);
        assert_eq!(hint.label, "merkle_proof");
    }

    #[test]
    fn test_op_parse_invalid_tags() {
        // absorb with zero
        assert!(Op::parse(b"A0x").is_err());
        // squeeze without a count
        assert!(Op::parse(b"Sx").is_err());
        // hints carry no count
        assert!(Op::parse(b"H3x").is_err());
        // unknown operation
        assert!(Op::parse(b"X1x").is_err());
        assert!(Op::parse(b"").is_err());
        // overflowing count
        assert!(Op::parse(b"A99999999999999999999999x").is_err());
    }

    #[test]
    fn test_absorb_width() {
        let scalars = Op::parse(b"A2ood_ans").unwrap();
        assert_eq!(scalars.absorb_width(), 64);
        let nonce = Op::parse(b"A8pow-nonce").unwrap();
        assert!(nonce.counts_bytes());
        assert_eq!(nonce.absorb_width(), 8);
        assert_eq!(Op::parse(b"S32pow_queries").unwrap().absorb_width(), 0);
        assert_eq!(Op::parse(b"Hstir_answers").unwrap().absorb_width(), 0);
    }

    #[test]
    fn test_pattern_parse_skips_domain_separator() {
        let pattern = IoPattern::parse(b"whir\0A1merkle_digest\0S47ood_query\0Hstir_answers").unwrap();
        assert_eq!(pattern.ops().len(), 3);
        assert_eq!(pattern.public_len(), 32);
        assert_eq!(pattern.as_bytes(), b"whir\0A1merkle_digest\0S47ood_query\0Hstir_answers");
        assert_eq!(pattern.ops()[2].to_string(), "Hstir_answers");
        assert_eq!(pattern.ops()[1].to_string(), "S47ood_query");
    }

    #[test]
    fn test_pattern_with_only_domain_separator() {
        let pattern = IoPattern::parse(b"empty").unwrap();
        assert!(pattern.ops().is_empty());
        assert_eq!(pattern.public_len(), 0);
    }

    #[test]
    fn test_pattern_rejects_empty_operation() {
        assert!(matches!(
            IoPattern::parse(b"proto\0\0A1x"),
            Err(TranscriptError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_cursor_consumes_hints_and_partial_absorbs() {
        let pattern = IoPattern::parse(b"p\0A3sumcheck_poly\0Hmerkle_proof").unwrap();
        let mut cursor = OpCursor::new(pattern.ops().iter().cloned());

        assert_eq!(cursor.consume(Request::Scalars, 2).unwrap(), "sumcheck_poly");
        assert!(cursor.consume(Request::Hint, 0).is_err());
        assert_eq!(cursor.consume(Request::Scalars, 1).unwrap(), "sumcheck_poly");
        assert!(cursor.finish().is_err());
        assert_eq!(cursor.consume(Request::Hint, 0).unwrap(), "merkle_proof");
        cursor.finish().unwrap();
    }
}
