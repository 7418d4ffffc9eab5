//! Deferred-pipeline render graph nodes
//!
//! Two frame-graph nodes for a deferred renderer: horizon-based ambient
//! occlusion and directional shadow mapping with a frustum-fitted
//! orthographic light camera.
//!
//! # Features
//! - Shared node lifecycle contract (construct / update / render / destroy)
//!   with dirty-checked GPU updates: stable attributes never reallocate
//! - Precompiled, replayable render pipelines; per-frame variation flows
//!   through uniforms and the pipeline environment, never the stage list
//! - Tight orthographic light-frustum fitting around the viewer camera
//! - Object-safe GPU context seam with a recording dummy implementation
//!   for GPU-less tests

pub mod backend;
pub mod graph;
pub mod material;
pub mod nodes;
pub mod noise;
pub mod pipeline;
pub mod scene;
pub mod uniform;

pub use graph::{GraphError, GraphNode, GraphResult, NodeState};
pub use material::{Material, RenderHost};
pub use nodes::{HbaoAttributes, HbaoNode, ShadowAttributes, ShadowMappingNode};
pub use scene::{fit_orthographic, Camera, LightFit, Model, Projection, ViewFrustum};
