//! Graph node lifecycle contract
//!
//! Every node moves through Constructed -> Updated -> Rendered (looping) ->
//! Destroyed. `update()` runs once per frame before `render()`; `destroy()`
//! releases all owned GPU resources exactly once and is terminal.

use thiserror::Error;

use crate::backend::context::{BackendError, RenderContext};
use crate::pipeline::PipelineError;

/// Node error taxonomy: precondition violations and resource failures are
/// fatal at the call site, never retried.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("required shader program {0:?} is not registered with the host")]
    MissingProgram(String),
    #[error("texture bound to input {0:?} has not been created")]
    InputNotCreated(&'static str),
    #[error("required input {0:?} is not bound")]
    InputNotBound(&'static str),
    #[error("node has been destroyed")]
    NodeDestroyed,
    #[error("render() called before the first update()")]
    NotUpdated,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Lifecycle state of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Constructed,
    Updated,
    Rendered,
    Destroyed,
}

/// The shared lifecycle state machine
#[derive(Debug)]
pub struct NodeLifecycle {
    state: NodeState,
}

impl NodeLifecycle {
    pub fn new() -> Self {
        Self {
            state: NodeState::Constructed,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn begin_update(&mut self) -> GraphResult<()> {
        if self.state == NodeState::Destroyed {
            return Err(GraphError::NodeDestroyed);
        }
        self.state = NodeState::Updated;
        Ok(())
    }

    pub fn begin_render(&mut self) -> GraphResult<()> {
        match self.state {
            NodeState::Destroyed => Err(GraphError::NodeDestroyed),
            NodeState::Constructed => Err(GraphError::NotUpdated),
            NodeState::Updated | NodeState::Rendered => {
                self.state = NodeState::Rendered;
                Ok(())
            }
        }
    }

    pub fn destroy(&mut self) -> GraphResult<()> {
        if self.state == NodeState::Destroyed {
            return Err(GraphError::NodeDestroyed);
        }
        self.state = NodeState::Destroyed;
        Ok(())
    }
}

impl Default for NodeLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for render graph nodes
///
/// `Attributes` is the node's typed per-frame configuration, populated by
/// the host before each `update()`. Optional tunables resolve to their
/// documented defaults at the call site; there is no runtime attribute bag.
pub trait GraphNode {
    type Attributes<'a>;

    /// Get the node name for debugging
    fn name(&self) -> &str;

    /// Pull current attribute values and refresh derived GPU state.
    /// Expensive updates (texture reallocation, kernel regeneration) are
    /// skipped when the driving attribute is unchanged.
    fn update(&mut self, ctx: &mut dyn RenderContext, attrs: &Self::Attributes<'_>)
        -> GraphResult<()>;

    /// Recompute per-frame derived uniforms and replay the pipeline.
    fn render(&mut self, ctx: &mut dyn RenderContext) -> GraphResult<()>;

    /// Release every owned GPU resource, exactly once.
    fn destroy(&mut self, ctx: &mut dyn RenderContext) -> GraphResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_loops_between_update_and_render() {
        let mut lifecycle = NodeLifecycle::new();
        assert_eq!(lifecycle.state(), NodeState::Constructed);

        lifecycle.begin_update().unwrap();
        lifecycle.begin_render().unwrap();
        lifecycle.begin_update().unwrap();
        lifecycle.begin_render().unwrap();
        assert_eq!(lifecycle.state(), NodeState::Rendered);
    }

    #[test]
    fn render_before_update_is_rejected() {
        let mut lifecycle = NodeLifecycle::new();
        assert!(matches!(
            lifecycle.begin_render(),
            Err(GraphError::NotUpdated)
        ));
    }

    #[test]
    fn destroyed_is_terminal() {
        let mut lifecycle = NodeLifecycle::new();
        lifecycle.begin_update().unwrap();
        lifecycle.destroy().unwrap();

        assert!(matches!(
            lifecycle.begin_update(),
            Err(GraphError::NodeDestroyed)
        ));
        assert!(matches!(
            lifecycle.begin_render(),
            Err(GraphError::NodeDestroyed)
        ));
        assert!(matches!(lifecycle.destroy(), Err(GraphError::NodeDestroyed)));
    }
}
