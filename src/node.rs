use crate::chunk::{DataChunk, Inputs};
use crate::error::{PipelineError, Result};

/// A single pipeline stage driven by the orchestration engine.
///
/// The engine calls `setup` once, `step` once per tick, and `teardown` once
/// at shutdown. Source nodes get an empty `Inputs`.
pub trait Node {
    fn name(&self) -> &str;

    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    fn step(&mut self, inputs: Inputs) -> Result<DataChunk>;

    fn teardown(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<N: Node + ?Sized> Node for Box<N> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn setup(&mut self) -> Result<()> {
        (**self).setup()
    }

    fn step(&mut self, inputs: Inputs) -> Result<DataChunk> {
        (**self).step(inputs)
    }

    fn teardown(&mut self) -> Result<()> {
        (**self).teardown()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Ready,
    Running,
    TornDown,
}

impl Lifecycle {
    fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Ready => "ready",
            Lifecycle::Running => "running",
            Lifecycle::TornDown => "torn down",
        }
    }
}

/// Drives a node through `uninitialized -> ready -> running -> torn down`,
/// rejecting out-of-order calls.
pub struct NodeHandle<N: Node> {
    node: N,
    state: Lifecycle,
}

impl<N: Node> NodeHandle<N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            state: Lifecycle::Uninitialized,
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    fn reject(&self, action: &'static str) -> PipelineError {
        PipelineError::Lifecycle {
            node: self.node.name().to_string(),
            action,
            state: self.state.as_str(),
        }
    }

    pub fn setup(&mut self) -> Result<()> {
        if self.state != Lifecycle::Uninitialized {
            return Err(self.reject("setup"));
        }
        tracing::info!("{}: setup", self.node.name());
        self.node.setup()?;
        self.state = Lifecycle::Ready;
        Ok(())
    }

    pub fn step(&mut self, inputs: Inputs) -> Result<DataChunk> {
        match self.state {
            Lifecycle::Ready | Lifecycle::Running => {}
            _ => return Err(self.reject("step")),
        }
        self.state = Lifecycle::Running;
        self.node.step(inputs)
    }

    /// Tear the node down. Teardown of a node that never set up is a no-op.
    pub fn teardown(&mut self) -> Result<()> {
        match self.state {
            Lifecycle::TornDown => Err(self.reject("teardown")),
            Lifecycle::Uninitialized => {
                self.state = Lifecycle::TornDown;
                Ok(())
            }
            Lifecycle::Ready | Lifecycle::Running => {
                tracing::info!("{}: teardown", self.node.name());
                self.state = Lifecycle::TornDown;
                self.node.teardown()
            }
        }
    }

    pub fn into_inner(self) -> N {
        self.node
    }
}
