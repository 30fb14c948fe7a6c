use std::fmt;

use thiserror::Error;

use crate::types::Type;

/// Where in the source a syntax node came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub fragment: String,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({:?})", self.line, self.column, self.fragment)
    }
}

#[derive(Error, Clone, Debug, PartialEq)]
pub enum IrErrorKind {
    #[error("{what} is required but absent")]
    NullnessViolation { what: &'static str },

    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: &'static str,
        expected: Type,
        found: Type,
    },

    #[error("condition of {context} is not Boolean: found {found}")]
    InvalidConditionType { context: &'static str, found: Type },

    #[error("type {ty} has no group")]
    NoGroupForType { ty: Type },

    #[error("operand of {op} has invalid type {found}")]
    InvalidOperandType { op: &'static str, found: Type },

    #[error("value {value} is not representable as {ty}")]
    UnrepresentableValue { value: String, ty: Type },
}

/// An IR construction failure, optionally attributed to a source location.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("{kind}{}", .location.as_ref().map(|l| format!(" at {}", l)).unwrap_or_default())]
pub struct IrError {
    kind: IrErrorKind,
    location: Option<Location>,
}

pub type IrResult<T> = Result<T, IrError>;

impl IrError {
    pub fn kind(&self) -> &IrErrorKind {
        &self.kind
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Attributes the error to `location`, unless a more precise location was
    /// already recorded by an inner node.
    pub fn at(mut self, location: &Location) -> Self {
        if self.location.is_none() {
            self.location = Some(location.clone());
        }
        self
    }
}

impl From<IrErrorKind> for IrError {
    fn from(kind: IrErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }
}

/// Rejects an absent required input.
pub fn required<T>(value: Option<T>, what: &'static str) -> IrResult<T> {
    value.ok_or_else(|| IrErrorKind::NullnessViolation { what }.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_is_kept_from_innermost_node() {
        let inner = Location {
            line: 2,
            column: 7,
            fragment: "b".to_owned(),
        };
        let outer = Location {
            line: 2,
            column: 1,
            fragment: "if b { 1 }".to_owned(),
        };

        let err = IrError::from(IrErrorKind::NullnessViolation { what: "else" })
            .at(&inner)
            .at(&outer);
        assert_eq!(err.location(), Some(&inner));
        assert_eq!(
            err.to_string(),
            "else is required but absent at 2:7 (\"b\")"
        );
    }

    #[test]
    fn test_required() {
        assert_eq!(required(Some(3), "value").unwrap(), 3);
        let err = required::<u8>(None, "head").unwrap_err();
        assert_eq!(
            err.kind(),
            &IrErrorKind::NullnessViolation { what: "head" }
        );
    }
}
