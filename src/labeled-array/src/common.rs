// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

use crate::value::Instance;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError, // will never be produced
    Generic,
    // shape
    ShapeMismatch,
    BroadcastMismatch,
    NotOneDimensional,
    EmptyReduction,
    // lookup
    TickNotFound,
    UnknownVariable,
    MissingVariable,
    DimensionNotFound,
    FieldNotFound,
    FilterNoMatch,
    FilterMultipleMatch,
    ExtractionFailed,
    NoExpression,
    // index
    IndexOutOfRange,
    TooManyIndices,
    MultipleEllipsis,
    InvalidFilter,
    InvalidSliceFilter,
    BadMask,
    ZeroStep,
    // namespace / assignment
    RepeatedTick,
    DuplicateVariable,
    DuplicateField,
    ExpressionMismatch,
    CannotReplaceView,
    LiveView,
    AttachedRemove,
    BadExpression,
    // reshape
    AmbiguousReshape,
    AlreadyUsedVariable,
    NamespaceCollision,
    AllFieldsToVars,
    AllVarsToFields,
    NoFields,
    PatternNoMatch,
    BadFillingValue,
    // filter parsing
    InvalidToken,
    UnrecognizedEof,
    UnrecognizedToken,
    ExtraToken,
    UnclosedString,
    ExpectedNumber,
    InvalidRegex,
    UnallowedVariable,
    TypeMismatch,
    DivisionByZero,
    // io
    BufferSize,
    Io,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            Generic => "generic",
            ShapeMismatch => "shape_mismatch",
            BroadcastMismatch => "broadcast_mismatch",
            NotOneDimensional => "not_one_dimensional",
            EmptyReduction => "empty_reduction",
            TickNotFound => "tick_not_found",
            UnknownVariable => "unknown_variable",
            MissingVariable => "missing_variable",
            DimensionNotFound => "dimension_not_found",
            FieldNotFound => "field_not_found",
            FilterNoMatch => "filter_no_match",
            FilterMultipleMatch => "filter_multiple_match",
            ExtractionFailed => "extraction_failed",
            NoExpression => "no_expression",
            IndexOutOfRange => "index_out_of_range",
            TooManyIndices => "too_many_indices",
            MultipleEllipsis => "multiple_ellipsis",
            InvalidFilter => "invalid_filter",
            InvalidSliceFilter => "invalid_slice_filter",
            BadMask => "bad_mask",
            ZeroStep => "zero_step",
            RepeatedTick => "repeated_tick",
            DuplicateVariable => "duplicate_variable",
            DuplicateField => "duplicate_field",
            ExpressionMismatch => "expression_mismatch",
            CannotReplaceView => "cannot_replace_view",
            LiveView => "live_view",
            AttachedRemove => "attached_remove",
            BadExpression => "bad_expression",
            AmbiguousReshape => "ambiguous_reshape",
            AlreadyUsedVariable => "already_used_variable",
            NamespaceCollision => "namespace_collision",
            AllFieldsToVars => "all_fields_to_vars",
            AllVarsToFields => "all_vars_to_fields",
            NoFields => "no_fields",
            PatternNoMatch => "pattern_no_match",
            BadFillingValue => "bad_filling_value",
            InvalidToken => "invalid_token",
            UnrecognizedEof => "unrecognized_eof",
            UnrecognizedToken => "unrecognized_token",
            ExtraToken => "extra_token",
            UnclosedString => "unclosed_string",
            ExpectedNumber => "expected_number",
            InvalidRegex => "invalid_regex",
            UnallowedVariable => "unallowed_variable",
            TypeMismatch => "type_mismatch",
            DivisionByZero => "division_by_zero",
            BufferSize => "buffer_size",
            Io => "io",
        };

        write!(f, "{name}")
    }
}

/// A lexer or parser error inside a filter expression, positioned by
/// byte offsets into the filter text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FilterError {
    pub start: u16,
    pub end: u16,
    pub code: ErrorCode,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.code)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Generic,
    Shape,
    Lookup,
    Index,
    Filter,
    Reshape,
    Namespace,
    Io,
}

/// The two source elements that collapsed onto the same output position
/// during a reshape, and the variables that distinguish them.
#[derive(Clone, Debug, PartialEq)]
pub struct ReshapeConflict {
    pub expression: String,
    pub first: Instance,
    pub second: Instance,
    pub unused: Vec<String>,
}

impl fmt::Display for ReshapeConflict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "Ambiguous dimensions; unused variables: {}",
            self.unused.join(", ")
        )?;
        writeln!(
            f,
            "Conflicting source elements with expression: {}",
            self.expression
        )?;
        writeln!(f, "   {}", self.first)?;
        write!(f, "   {}", self.second)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
    pub conflict: Option<Box<ReshapeConflict>>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
            conflict: None,
        }
    }

    pub fn reshape_conflict(conflict: ReshapeConflict) -> Self {
        Error {
            kind: ErrorKind::Reshape,
            code: ErrorCode::AmbiguousReshape,
            details: Some(conflict.to_string()),
            conflict: Some(Box::new(conflict)),
        }
    }

    /// Wraps a positioned filter error with the text it was raised on.
    pub fn from_filter(err: FilterError, text: &str) -> Self {
        Error::new(
            ErrorKind::Filter,
            err.code,
            Some(format!("while parsing {text:?} at {}..{}", err.start, err.end)),
        )
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Generic => "Error",
            ErrorKind::Shape => "ShapeError",
            ErrorKind::Lookup => "LookupError",
            ErrorKind::Index => "IndexError",
            ErrorKind::Filter => "FilterError",
            ErrorKind::Reshape => "ReshapeError",
            ErrorKind::Namespace => "NamespaceError",
            ErrorKind::Io => "IoError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io, ErrorCode::Io, Some(err.to_string()))
    }
}

pub type Result<T> = result::Result<T, Error>;
pub type FilterResult<T> = result::Result<T, FilterError>;

#[macro_export]
macro_rules! filter_err(
    ($code:tt, $start:expr, $end:expr) => {{
        use $crate::common::{FilterError, ErrorCode};
        Err(FilterError{ start: $start as u16, end: $end as u16, code: ErrorCode::$code})
    }}
);

#[macro_export]
macro_rules! shape_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Shape, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Shape, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! lookup_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Lookup, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Lookup, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! index_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Index, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Index, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! namespace_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Namespace, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Namespace, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! reshape_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Reshape, ErrorCode::$code, Some($str)))
    }};
}

#[macro_export]
macro_rules! eval_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Filter, ErrorCode::$code, Some($str)))
    }};
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Lookup,
        ErrorCode::TickNotFound,
        Some("a9".to_string()),
    );
    assert_eq!("LookupError{tick_not_found: a9}", format!("{err}"));

    let err = Error::new(ErrorKind::Shape, ErrorCode::ShapeMismatch, None);
    assert_eq!("ShapeError{shape_mismatch}", format!("{err}"));

    let err = FilterError {
        start: 2,
        end: 4,
        code: ErrorCode::UnrecognizedToken,
    };
    assert_eq!("2:4:unrecognized_token", format!("{err}"));
}

#[test]
fn test_reshape_conflict_display() {
    use crate::value::Value;

    let mut first = Instance::new();
    first.insert("a", Value::Int(1));
    first.insert("b", Value::Int(1));
    let mut second = Instance::new();
    second.insert("a", Value::Int(1));
    second.insert("b", Value::Int(2));
    let err = Error::reshape_conflict(ReshapeConflict {
        expression: "@a@-@b@".to_string(),
        first,
        second,
        unused: vec!["b".to_string()],
    });
    assert_eq!(ErrorKind::Reshape, err.kind);
    let details = err.get_details().unwrap();
    assert_eq!(
        "Ambiguous dimensions; unused variables: b\n\
         Conflicting source elements with expression: @a@-@b@\n   \
         {'a': 1, 'b': 1}\n   \
         {'a': 1, 'b': 2}",
        details
    );
    assert_eq!(vec!["b".to_string()], err.conflict.unwrap().unused);
}
