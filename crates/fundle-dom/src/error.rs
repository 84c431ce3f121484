//! Error types for selector parsing and template cloning.

use thiserror::Error;

/// A selector string the engine cannot parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected `{found}` at {position} in `{selector}`")]
    Unexpected {
        selector: String,
        found: char,
        position: usize,
    },
    #[error("selector `{selector}` ends unexpectedly")]
    UnexpectedEnd { selector: String },
    #[error("unsupported pseudo-class `:{pseudo}` in `{selector}`")]
    UnsupportedPseudo { selector: String, pseudo: String },
    #[error("invalid :nth-child formula `{formula}` in `{selector}`")]
    InvalidNth { selector: String, formula: String },
}

/// Failure to clone a `<template>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("no element matches template selector `{0}`")]
    NotFound(String),
    #[error("expected a <template> element, got <{0}>")]
    NotATemplate(String),
    #[error(transparent)]
    Selector(#[from] SelectorError),
}
