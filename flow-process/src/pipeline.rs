//! Pipeline loading and execution.

use flowops::prelude::v1::*;
use log::*;
use std::io::Read;

/// Chain of configured nodes, run in order.
pub struct Pipeline {
    nodes: Vec<Node>,
}

impl Pipeline {
    /// Build a pipeline from node descriptions.
    ///
    /// Mask producing nodes may only appear last, since no node consumes a mask batch as flow.
    pub fn new(kinds: Vec<NodeKind>) -> Result<Self> {
        if kinds.is_empty() {
            return Err(anyhow!("pipeline has no nodes"));
        }

        if let Some(pos) = kinds
            .iter()
            .position(|k| k.output() == OutputKind::Mask)
            .filter(|&pos| pos + 1 != kinds.len())
        {
            return Err(anyhow!(
                "{} at stage {} must be the last stage",
                kinds[pos].name(),
                pos
            ));
        }

        let nodes = kinds
            .into_iter()
            .map(Node::new)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { nodes })
    }

    /// Parse a JSON array of nodes.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Self::new(serde_json::from_reader(reader)?)
    }

    /// Whether any stage needs a mask sequence.
    pub fn takes_masks(&self) -> bool {
        self.nodes.iter().any(|n| n.kind().takes_masks())
    }

    /// Run a batch of flow frames through every stage.
    ///
    /// Stateful stages carry their state over to the next call.
    pub fn run(
        &mut self,
        flow: Vec<VectorField>,
        masks: Option<&[MaskField]>,
    ) -> Result<NodeOutput> {
        let mut out = NodeOutput::Flow(flow);

        for (i, node) in self.nodes.iter_mut().enumerate() {
            trace!("stage {}: {}", i, node.kind().name());
            let flow = out.into_flow()?;
            out = node.run(&flow, masks)?;
        }

        Ok(out)
    }
}
