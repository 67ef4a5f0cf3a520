//! Constrained interpreter for scene documents.
//!
//! Evaluation exposes exactly two capability families: numeric-array
//! construction and figure/trace construction. There is no operation that
//! touches files, sockets, processes, or the environment, so an adversarial
//! document cannot reach them. Every materialized array is bounded by
//! `MAX_ELEMENTS` and evaluation is structurally terminating (no loops or
//! recursion in the value language; nesting is capped at `MAX_DEPTH`).

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::chart::{
    Axis3d, Coords, Figure, Layout, Line, Marker, Scene3d, Title, Trace, TraceKind,
};
use crate::scene::{
    ArtifactError, FigureDecl, LayoutDecl, ScatterDecl, SceneError, SurfaceDecl, TraceDecl,
    FIGURE_IDENT, MAX_BINDINGS, MAX_DEPTH, MAX_ELEMENTS, MAX_TRACES,
};

/// A materialized numeric value.
#[derive(Debug, Clone, PartialEq)]
pub enum Num {
    Scalar(f64),
    Vector(Vec<f64>),
    Grid(Vec<Vec<f64>>),
}

impl Num {
    fn shape(&self) -> String {
        match self {
            Num::Scalar(_) => "scalar".to_string(),
            Num::Vector(v) => format!("vector[{}]", v.len()),
            Num::Grid(g) => format!(
                "grid[{}x{}]",
                g.len(),
                g.first().map(|r| r.len()).unwrap_or(0)
            ),
        }
    }
}

#[derive(Debug)]
pub enum Binding {
    Array(Num),
    Figure(Figure),
}

/// The execution namespace: every name the document has bound so far.
/// Exists only for the duration of one evaluation.
#[derive(Debug, Default)]
pub struct Namespace {
    bindings: HashMap<String, Binding>,
}

impl Namespace {
    fn lookup_array(&self, name: &str) -> Result<Num, SceneError> {
        match self.bindings.get(name) {
            Some(Binding::Array(n)) => Ok(n.clone()),
            Some(Binding::Figure(_)) => Err(SceneError::NotAnArray(name.to_string())),
            None => Err(SceneError::UnknownRef(name.to_string())),
        }
    }
}

/// Parse and interpret a scene document. Declarations are evaluated in
/// document order; references may only point at earlier bindings.
pub fn evaluate(source: &str) -> Result<Namespace, SceneError> {
    let doc: Json =
        serde_json::from_str(source).map_err(|e| SceneError::Parse(e.to_string()))?;
    let Json::Object(entries) = doc else {
        return Err(SceneError::NotAnObject);
    };
    if entries.len() > MAX_BINDINGS {
        return Err(SceneError::TooManyBindings(entries.len()));
    }

    let mut ns = Namespace::default();
    for (name, decl) in entries {
        let binding = match figure_decl(&decl) {
            Some(fig) => Binding::Figure(build_figure(fig?, &ns)?),
            None => Binding::Array(eval_expr(&decl, &ns, 0)?),
        };
        ns.bindings.insert(name, binding);
    }
    Ok(ns)
}

/// Artifact validation: the namespace must bind `fig` to a chart. Runs even
/// when evaluation succeeded, because a document that binds everything
/// except `fig` is a distinct, reportable failure.
pub fn take_figure(mut ns: Namespace) -> Result<Figure, ArtifactError> {
    match ns.bindings.remove(FIGURE_IDENT) {
        Some(Binding::Figure(fig)) => Ok(fig),
        Some(Binding::Array(_)) => Err(ArtifactError::NotAFigure),
        None => Err(ArtifactError::MissingFigure),
    }
}

fn figure_decl(value: &Json) -> Option<Result<FigureDecl, SceneError>> {
    let inner = value.as_object()?.get("figure")?;
    Some(
        serde_json::from_value(inner.clone())
            .map_err(|e| SceneError::Trace(e.to_string())),
    )
}

fn build_figure(decl: FigureDecl, ns: &Namespace) -> Result<Figure, SceneError> {
    if decl.traces.len() > MAX_TRACES {
        return Err(SceneError::TooManyTraces(decl.traces.len()));
    }

    let mut traces = Vec::with_capacity(decl.traces.len());
    for trace in decl.traces {
        traces.push(match trace {
            TraceDecl::Surface(s) => surface_trace(s, ns)?,
            TraceDecl::Scatter3d(s) => scatter_trace(s, ns)?,
        });
    }

    Ok(Figure {
        traces,
        layout: build_layout(decl.layout),
    })
}

fn surface_trace(decl: SurfaceDecl, ns: &Namespace) -> Result<Trace, SceneError> {
    let x = grid_coords(&decl.x, ns)?;
    let y = grid_coords(&decl.y, ns)?;
    let z = grid_coords(&decl.z, ns)?;

    let shape = |g: &[Vec<f64>]| (g.len(), g.first().map(|r| r.len()).unwrap_or(0));
    if shape(&x) != shape(&y) || shape(&x) != shape(&z) {
        return Err(SceneError::ShapeMismatch(
            "surface coordinates must be grids of equal shape".to_string(),
        ));
    }

    let mut trace = Trace::new(
        TraceKind::Surface,
        Coords::Grid(x),
        Coords::Grid(y),
        Coords::Grid(z),
    );
    trace.name = decl.name;
    trace.colorscale = decl.colorscale;
    trace.showscale = decl.showscale;
    trace.opacity = decl.opacity;
    Ok(trace)
}

fn scatter_trace(decl: ScatterDecl, ns: &Namespace) -> Result<Trace, SceneError> {
    let x = vector_coords(&decl.x, ns)?;
    let y = vector_coords(&decl.y, ns)?;
    let z = vector_coords(&decl.z, ns)?;
    if x.len() != y.len() || x.len() != z.len() {
        return Err(SceneError::ShapeMismatch(
            "scatter3d coordinates must be vectors of equal length".to_string(),
        ));
    }

    if let Some(mode) = decl.mode.as_deref() {
        if !matches!(mode, "lines" | "markers" | "lines+markers") {
            return Err(SceneError::Trace(format!("unsupported scatter3d mode `{mode}`")));
        }
    }

    let mut trace = Trace::new(
        TraceKind::Scatter3d,
        Coords::Vector(x),
        Coords::Vector(y),
        Coords::Vector(z),
    );
    trace.mode = decl.mode;
    trace.name = decl.name;
    trace.opacity = decl.opacity;
    if let Some(color) = decl.color {
        trace.marker = Some(Marker { color: Some(color.clone()) });
        trace.line = Some(Line { color: Some(color) });
    }
    Ok(trace)
}

fn build_layout(decl: LayoutDecl) -> Layout {
    let mut layout = Layout {
        title: decl.title.map(|text| Title { text }),
        ..Layout::default()
    };
    if let Some(axes) = decl.scene {
        let axis = |title: Option<String>| Axis3d {
            title: title.map(|text| Title { text }),
            ..Axis3d::default()
        };
        layout.scene = Some(Scene3d {
            xaxis: Some(axis(axes.xaxis)),
            yaxis: Some(axis(axes.yaxis)),
            zaxis: Some(axis(axes.zaxis)),
            aspectmode: axes.aspectmode,
        });
    }
    layout
}

fn grid_coords(expr: &Json, ns: &Namespace) -> Result<Vec<Vec<f64>>, SceneError> {
    match eval_expr(expr, ns, 0)? {
        Num::Grid(g) => Ok(g),
        other => Err(SceneError::ShapeMismatch(format!(
            "surface coordinate must be a grid, got {}",
            other.shape()
        ))),
    }
}

fn vector_coords(expr: &Json, ns: &Namespace) -> Result<Vec<f64>, SceneError> {
    match eval_expr(expr, ns, 0)? {
        Num::Vector(v) => Ok(v),
        other => Err(SceneError::ShapeMismatch(format!(
            "scatter3d coordinate must be a vector, got {}",
            other.shape()
        ))),
    }
}

fn eval_expr(expr: &Json, ns: &Namespace, depth: usize) -> Result<Num, SceneError> {
    if depth > MAX_DEPTH {
        return Err(SceneError::DepthExceeded);
    }

    match expr {
        Json::Number(n) => {
            let v = n.as_f64().ok_or(SceneError::NonFinite)?;
            finite(v)?;
            Ok(Num::Scalar(v))
        }
        Json::Array(items) => literal_array(items),
        Json::Object(obj) => {
            if let Some(name) = obj.get("ref") {
                let name = name
                    .as_str()
                    .ok_or_else(|| SceneError::Malformed("`ref` must be a string".into()))?;
                return ns.lookup_array(name);
            }
            let Some(op) = obj.get("op") else {
                return Err(SceneError::Malformed(
                    "expected an object with `ref` or `op`".into(),
                ));
            };
            let op = op
                .as_str()
                .ok_or_else(|| SceneError::Malformed("`op` must be a string".into()))?;
            eval_op(op, obj, ns, depth)
        }
        other => Err(SceneError::Malformed(format!(
            "expected a number, array, or operation, got {other}"
        ))),
    }
}

fn literal_array(items: &[Json]) -> Result<Num, SceneError> {
    if items.iter().all(Json::is_number) {
        budget(items.len())?;
        let mut v = Vec::with_capacity(items.len());
        for item in items {
            let n = item.as_f64().ok_or(SceneError::NonFinite)?;
            finite(n)?;
            v.push(n);
        }
        return Ok(Num::Vector(v));
    }

    if items.iter().all(Json::is_array) {
        let mut grid = Vec::with_capacity(items.len());
        let mut width = None;
        let mut total = 0usize;
        for row in items {
            let Json::Array(row) = row else {
                return Err(SceneError::Malformed("grid rows must be arrays".into()));
            };
            match width {
                None => width = Some(row.len()),
                Some(w) if w != row.len() => {
                    return Err(SceneError::ShapeMismatch(
                        "grid rows must have equal length".into(),
                    ))
                }
                _ => {}
            }
            total += row.len();
            budget(total)?;
            let mut out = Vec::with_capacity(row.len());
            for item in row {
                let n = item
                    .as_f64()
                    .ok_or_else(|| SceneError::Malformed("grid cells must be numbers".into()))?;
                finite(n)?;
                out.push(n);
            }
            grid.push(out);
        }
        return Ok(Num::Grid(grid));
    }

    Err(SceneError::Malformed(
        "array literal must be all numbers or all rows".into(),
    ))
}

fn eval_op(op: &str, obj: &serde_json::Map<String, Json>, ns: &Namespace, depth: usize) -> Result<Num, SceneError> {
    match op {
        "linspace" => {
            let start = scalar_field(obj, "start", ns, depth)?;
            let stop = scalar_field(obj, "stop", ns, depth)?;
            let num = index_field(obj, "num", ns, depth)?;
            linspace(start, stop, num)
        }
        "gridx" | "gridy" => {
            let u = vector_field(obj, "u", ns, depth)?;
            let v = vector_field(obj, "v", ns, depth)?;
            budget(u.len().saturating_mul(v.len()))?;
            // Both grids are len(v) rows by len(u) columns, matching a
            // meshgrid of u along x and v along y.
            let grid = if op == "gridx" {
                v.iter().map(|_| u.clone()).collect()
            } else {
                v.iter().map(|&b| vec![b; u.len()]).collect()
            };
            Ok(Num::Grid(grid))
        }
        "full" => {
            let rows = index_field(obj, "rows", ns, depth)?;
            let cols = index_field(obj, "cols", ns, depth)?;
            let value = scalar_field(obj, "value", ns, depth)?;
            budget(rows.saturating_mul(cols))?;
            Ok(Num::Grid(vec![vec![value; cols]; rows]))
        }
        "sin" | "cos" | "tan" | "exp" | "sqrt" | "abs" | "neg" => {
            let of = field(obj, "of")?;
            let operand = eval_expr(of, ns, depth + 1)?;
            let f: fn(f64) -> f64 = match op {
                "sin" => f64::sin,
                "cos" => f64::cos,
                "tan" => f64::tan,
                "exp" => f64::exp,
                "sqrt" => f64::sqrt,
                "abs" => f64::abs,
                _ => |v: f64| -v,
            };
            map_unary(operand, f)
        }
        "add" | "sub" | "mul" | "div" | "pow" => {
            let lhs = eval_expr(field(obj, "lhs")?, ns, depth + 1)?;
            let rhs = eval_expr(field(obj, "rhs")?, ns, depth + 1)?;
            let f: fn(f64, f64) -> f64 = match op {
                "add" => |a: f64, b: f64| a + b,
                "sub" => |a: f64, b: f64| a - b,
                "mul" => |a: f64, b: f64| a * b,
                "div" => |a: f64, b: f64| a / b,
                _ => f64::powf,
            };
            broadcast(lhs, rhs, f)
        }
        other => Err(SceneError::UnknownOp(other.to_string())),
    }
}

fn field<'a>(obj: &'a serde_json::Map<String, Json>, name: &str) -> Result<&'a Json, SceneError> {
    obj.get(name)
        .ok_or_else(|| SceneError::Malformed(format!("missing field `{name}`")))
}

fn scalar_field(
    obj: &serde_json::Map<String, Json>,
    name: &str,
    ns: &Namespace,
    depth: usize,
) -> Result<f64, SceneError> {
    match eval_expr(field(obj, name)?, ns, depth + 1)? {
        Num::Scalar(v) => Ok(v),
        other => Err(SceneError::ShapeMismatch(format!(
            "`{name}` must be a scalar, got {}",
            other.shape()
        ))),
    }
}

fn index_field(
    obj: &serde_json::Map<String, Json>,
    name: &str,
    ns: &Namespace,
    depth: usize,
) -> Result<usize, SceneError> {
    let v = scalar_field(obj, name, ns, depth)?;
    if v.fract() != 0.0 || v < 1.0 || v > MAX_ELEMENTS as f64 {
        return Err(SceneError::Malformed(format!(
            "`{name}` must be a positive integer within the element budget"
        )));
    }
    Ok(v as usize)
}

fn vector_field(
    obj: &serde_json::Map<String, Json>,
    name: &str,
    ns: &Namespace,
    depth: usize,
) -> Result<Vec<f64>, SceneError> {
    match eval_expr(field(obj, name)?, ns, depth + 1)? {
        Num::Vector(v) => Ok(v),
        other => Err(SceneError::ShapeMismatch(format!(
            "`{name}` must be a vector, got {}",
            other.shape()
        ))),
    }
}

fn linspace(start: f64, stop: f64, num: usize) -> Result<Num, SceneError> {
    budget(num)?;
    if num == 1 {
        return Ok(Num::Vector(vec![start]));
    }
    let step = (stop - start) / (num - 1) as f64;
    finite(step)?;
    let v = (0..num).map(|i| start + step * i as f64).collect();
    Ok(Num::Vector(v))
}

fn map_unary(operand: Num, f: impl Fn(f64) -> f64) -> Result<Num, SceneError> {
    let apply = |v: f64| -> Result<f64, SceneError> {
        let out = f(v);
        finite(out)?;
        Ok(out)
    };
    Ok(match operand {
        Num::Scalar(v) => Num::Scalar(apply(v)?),
        Num::Vector(v) => Num::Vector(v.into_iter().map(apply).collect::<Result<_, _>>()?),
        Num::Grid(g) => Num::Grid(
            g.into_iter()
                .map(|row| row.into_iter().map(apply).collect::<Result<_, _>>())
                .collect::<Result<_, _>>()?,
        ),
    })
}

fn broadcast(lhs: Num, rhs: Num, f: impl Fn(f64, f64) -> f64 + Copy) -> Result<Num, SceneError> {
    let apply = |a: f64, b: f64| -> Result<f64, SceneError> {
        let out = f(a, b);
        finite(out)?;
        Ok(out)
    };
    match (lhs, rhs) {
        (Num::Scalar(a), Num::Scalar(b)) => Ok(Num::Scalar(apply(a, b)?)),
        (Num::Scalar(a), other) => map_unary(other, |b| f(a, b)),
        (other, Num::Scalar(b)) => map_unary(other, |a| f(a, b)),
        (Num::Vector(a), Num::Vector(b)) => {
            if a.len() != b.len() {
                return Err(SceneError::ShapeMismatch(format!(
                    "vector[{}] vs vector[{}]",
                    a.len(),
                    b.len()
                )));
            }
            Ok(Num::Vector(
                a.into_iter()
                    .zip(b)
                    .map(|(x, y)| apply(x, y))
                    .collect::<Result<_, _>>()?,
            ))
        }
        (Num::Grid(a), Num::Grid(b)) => {
            let shape = |g: &[Vec<f64>]| (g.len(), g.first().map(|r| r.len()).unwrap_or(0));
            if shape(&a) != shape(&b) {
                return Err(SceneError::ShapeMismatch("grid shapes differ".into()));
            }
            Ok(Num::Grid(
                a.into_iter()
                    .zip(b)
                    .map(|(ra, rb)| {
                        ra.into_iter()
                            .zip(rb)
                            .map(|(x, y)| apply(x, y))
                            .collect::<Result<_, _>>()
                    })
                    .collect::<Result<_, _>>()?,
            ))
        }
        (a, b) => Err(SceneError::ShapeMismatch(format!(
            "{} vs {}",
            a.shape(),
            b.shape()
        ))),
    }
}

fn finite(v: f64) -> Result<(), SceneError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(SceneError::NonFinite)
    }
}

fn budget(elements: usize) -> Result<(), SceneError> {
    if elements > MAX_ELEMENTS {
        Err(SceneError::BudgetExceeded(elements))
    } else {
        Ok(())
    }
}
