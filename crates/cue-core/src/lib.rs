#![doc = include_str!("../../../README.md")]

pub mod adt;
pub mod api;
mod closed;
pub mod compiler;
pub mod debug;
pub mod errors;
pub mod eval;
pub mod feature;
pub mod kind;
pub mod resource;

pub use crate::{
    adt::vertex::{Status, Value, Vertex, VertexId},
    api::{
        accept, arcs, build, conjuncts, default, equals, is_closed, is_optional, kind as vertex_kind, lookup_path, predeclared,
        source, validate, Attribute, BuildOutput, ParsedFile, ValidateConfig,
    },
    errors::{Bottom, ErrorCode},
    eval::{evaluate, unify, OpContext, TargetStatus},
    feature::{Feature, FeatureKind, Interner},
    kind::Kind,
    resource::EvalConfig,
};
