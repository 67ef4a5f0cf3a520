//! Declarative scene documents: the constrained format the engine is
//! instructed to emit instead of executable code. A document is an ordered
//! mapping of names to numeric-array expressions and figure declarations;
//! `eval` interprets it against a namespace exposing nothing else.

use serde::Deserialize;
use thiserror::Error;

pub mod eval;

/// The identifier the document must bind its chart artifact under.
pub const FIGURE_IDENT: &str = "fig";

pub const MAX_BINDINGS: usize = 64;
pub const MAX_DEPTH: usize = 32;
pub const MAX_ELEMENTS: usize = 250_000;
pub const MAX_TRACES: usize = 16;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FigureDecl {
    pub traces: Vec<TraceDecl>,
    #[serde(default)]
    pub layout: LayoutDecl,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TraceDecl {
    Surface(SurfaceDecl),
    Scatter3d(ScatterDecl),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurfaceDecl {
    pub x: serde_json::Value,
    pub y: serde_json::Value,
    pub z: serde_json::Value,
    pub name: Option<String>,
    pub colorscale: Option<String>,
    pub showscale: Option<bool>,
    pub opacity: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScatterDecl {
    pub x: serde_json::Value,
    pub y: serde_json::Value,
    pub z: serde_json::Value,
    pub mode: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
    pub opacity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LayoutDecl {
    pub title: Option<String>,
    pub scene: Option<AxesDecl>,
}

#[derive(Debug, Deserialize)]
pub struct AxesDecl {
    pub xaxis: Option<String>,
    pub yaxis: Option<String>,
    pub zaxis: Option<String>,
    pub aspectmode: Option<String>,
}

/// Faults raised while parsing or interpreting a scene document. These map
/// to the execution-failure surface of the endpoint.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene document is not valid JSON: {0}")]
    Parse(String),
    #[error("scene document must be a JSON object of named declarations")]
    NotAnObject,
    #[error("too many declarations ({0}, limit {MAX_BINDINGS})")]
    TooManyBindings(usize),
    #[error("unknown operation `{0}`")]
    UnknownOp(String),
    #[error("reference to undefined name `{0}`")]
    UnknownRef(String),
    #[error("`{0}` names a figure, not an array")]
    NotAnArray(String),
    #[error("expression nesting exceeds depth {MAX_DEPTH}")]
    DepthExceeded,
    #[error("array of {0} elements exceeds the {MAX_ELEMENTS}-element budget")]
    BudgetExceeded(usize),
    #[error("operand shapes do not match: {0}")]
    ShapeMismatch(String),
    #[error("expression produced a non-finite value")]
    NonFinite,
    #[error("malformed expression: {0}")]
    Malformed(String),
    #[error("invalid trace declaration: {0}")]
    Trace(String),
    #[error("too many traces ({0}, limit {MAX_TRACES})")]
    TooManyTraces(usize),
}

/// Validation failures: evaluation finished but the namespace holds no
/// usable chart artifact. Reported as an invalid artifact, never as an
/// execution fault.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("generated scene did not bind `{FIGURE_IDENT}` to a chart")]
    MissingFigure,
    #[error("`{FIGURE_IDENT}` is bound to an array, not a chart")]
    NotAFigure,
}
