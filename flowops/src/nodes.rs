//! # Pipeline nodes
//!
//! The fixed set of node kinds exposed to a host pipeline. Every kind carries its own typed
//! configuration; [`Node`] pairs a validated configuration with per-instance state.

use crate::algebra::{clamp_magnitude, scale_magnitude, threshold_low_magnitude};
use crate::batch::MaskBatch;
use crate::blur::{blur, MAX_KERNEL_SIZE};
use crate::derivation::{derive_masks, MaskMethod};
use crate::error::FlowError;
use crate::field::{MaskField, VectorField};
use crate::masking::MaskSequencer;
use crate::properties::{BoundedPropMut, Choice, Properties, PropertyMut};
use crate::sequence::{map_sequence, FlowSequence, FrameTransform};
use crate::warp::{RemapWarp, Warp};
use anyhow::{anyhow, Result};
use log::*;

/// Gaussian blur node configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BlurConfig {
    /// Even kernel size, at most [`MAX_KERNEL_SIZE`]. The kernel side is one larger.
    pub kernel_size: usize,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self { kernel_size: 4 }
    }
}

impl Properties for BlurConfig {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![(
            "kernel_size",
            PropertyMut::Usize(BoundedPropMut {
                val: &mut self.kernel_size,
                min: 2,
                max: MAX_KERNEL_SIZE,
                step: 2,
            }),
        )]
    }
}

impl FrameTransform for BlurConfig {
    fn apply(&self, frame: &VectorField) -> Result<VectorField> {
        blur(frame, self.kernel_size)
    }
}

/// Magnitude scaling node configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScaleConfig {
    pub scale: f32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self { scale: 2.0 }
    }
}

impl Properties for ScaleConfig {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![("scale", PropertyMut::float(&mut self.scale, 0.0, 0.01))]
    }

    /// Editors bound the scale at 0, but negative scales (flipping the flow) are accepted.
    fn validate(&mut self) -> Result<(), FlowError> {
        if self.scale.is_finite() {
            Ok(())
        } else {
            Err(FlowError::config(
                "scale",
                format!("{} is not finite", self.scale),
            ))
        }
    }
}

impl FrameTransform for ScaleConfig {
    fn apply(&self, frame: &VectorField) -> Result<VectorField> {
        scale_magnitude(frame, self.scale)
    }
}

/// Magnitude clamping node configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClampConfig {
    pub clamp_max_magnitude: f32,
}

impl Default for ClampConfig {
    fn default() -> Self {
        Self {
            clamp_max_magnitude: 1.0,
        }
    }
}

impl Properties for ClampConfig {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![(
            "clamp_max_magnitude",
            PropertyMut::float(&mut self.clamp_max_magnitude, 0.0, 0.01),
        )]
    }
}

impl FrameTransform for ClampConfig {
    fn apply(&self, frame: &VectorField) -> Result<VectorField> {
        clamp_magnitude(frame, self.clamp_max_magnitude)
    }
}

/// Low magnitude thresholding node configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ThresholdConfig {
    pub threshold: f32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { threshold: 0.1 }
    }
}

impl Properties for ThresholdConfig {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![(
            "threshold",
            PropertyMut::float(&mut self.threshold, 0.0, 0.001),
        )]
    }
}

impl FrameTransform for ThresholdConfig {
    fn apply(&self, frame: &VectorField) -> Result<VectorField> {
        threshold_low_magnitude(frame, self.threshold)
    }
}

/// Flow to mask node configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ToMaskConfig {
    pub magnitude_threshold: f32,
    pub method: MaskMethod,
}

impl Default for ToMaskConfig {
    fn default() -> Self {
        Self {
            magnitude_threshold: 0.1,
            method: MaskMethod::Simple,
        }
    }
}

impl ToMaskConfig {
    pub fn magnitude_threshold(self, magnitude_threshold: f32) -> Self {
        Self {
            magnitude_threshold,
            ..self
        }
    }

    pub fn method(self, method: MaskMethod) -> Self {
        Self { method, ..self }
    }
}

impl Choice for MaskMethod {
    fn options(&self) -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.name()).collect()
    }

    fn selected(&self) -> &'static str {
        self.name()
    }

    fn select(&mut self, name: &str) -> bool {
        match name.parse() {
            Ok(m) => {
                *self = m;
                true
            }
            Err(_) => false,
        }
    }
}

impl Properties for ToMaskConfig {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![
            (
                "magnitude_threshold",
                PropertyMut::float(&mut self.magnitude_threshold, 0.0, 0.001),
            ),
            ("method", PropertyMut::choice(&mut self.method)),
        ]
    }
}

/// Every node kind with its configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "node", rename_all = "snake_case"))]
pub enum NodeKind {
    Blur(BlurConfig),
    Scale(ScaleConfig),
    Clamp(ClampConfig),
    LowerBoundThreshold(ThresholdConfig),
    ToMask(ToMaskConfig),
    MaskFlow,
}

/// Kind of data a node produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    Flow,
    Mask,
}

impl NodeKind {
    /// Category every node is listed under.
    pub const CATEGORY: &'static str = "Optical flow/extras";

    /// One default instance of every node kind.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::Blur(Default::default()),
            Self::Scale(Default::default()),
            Self::Clamp(Default::default()),
            Self::LowerBoundThreshold(Default::default()),
            Self::ToMask(Default::default()),
            Self::MaskFlow,
        ]
    }

    /// Display name of the node.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blur(_) => "GaussianBlur (flow)",
            Self::Scale(_) => "ScaleMagnitudes (flow)",
            Self::Clamp(_) => "ClampMagnitudes (flow)",
            Self::LowerBoundThreshold(_) => "LowerBoundThresholding (flow)",
            Self::ToMask(_) => "OpticalFlowToMask",
            Self::MaskFlow => "MaskOpticalFlow",
        }
    }

    pub fn output(&self) -> OutputKind {
        match self {
            Self::ToMask(_) => OutputKind::Mask,
            _ => OutputKind::Flow,
        }
    }

    /// Whether the node consumes a mask sequence besides the flow.
    pub fn takes_masks(&self) -> bool {
        matches!(self, Self::MaskFlow)
    }
}

impl Properties for NodeKind {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        match self {
            Self::Blur(c) => c.props_mut(),
            Self::Scale(c) => c.props_mut(),
            Self::Clamp(c) => c.props_mut(),
            Self::LowerBoundThreshold(c) => c.props_mut(),
            Self::ToMask(c) => c.props_mut(),
            Self::MaskFlow => vec![],
        }
    }

    fn validate(&mut self) -> Result<(), FlowError> {
        match self {
            Self::Blur(c) => c.validate(),
            Self::Scale(c) => c.validate(),
            Self::Clamp(c) => c.validate(),
            Self::LowerBoundThreshold(c) => c.validate(),
            Self::ToMask(c) => c.validate(),
            Self::MaskFlow => Ok(()),
        }
    }
}

/// Output of a single node run.
#[derive(Clone, Debug)]
pub enum NodeOutput {
    Flow(FlowSequence),
    Mask(MaskBatch),
}

impl NodeOutput {
    pub fn into_flow(self) -> Result<FlowSequence> {
        match self {
            Self::Flow(f) => Ok(f),
            Self::Mask(_) => Err(anyhow!("node produced masks, not flow")),
        }
    }

    pub fn into_masks(self) -> Result<MaskBatch> {
        match self {
            Self::Mask(m) => Ok(m),
            Self::Flow(_) => Err(anyhow!("node produced flow, not masks")),
        }
    }
}

/// A configured node instance.
///
/// Configuration is validated once, at construction. State that must survive between runs, such
/// as the mask cursor, lives here and is never shared with other instances.
pub struct Node {
    kind: NodeKind,
    sequencer: MaskSequencer,
    warp: Box<dyn Warp + Send>,
}

impl Node {
    /// Create a node that warps with [`RemapWarp`].
    pub fn new(kind: NodeKind) -> Result<Self> {
        Self::with_warp(kind, RemapWarp)
    }

    /// Create a node with a custom warp implementation.
    pub fn with_warp(mut kind: NodeKind, warp: impl Warp + Send + 'static) -> Result<Self> {
        kind.validate()?;

        Ok(Self {
            kind,
            sequencer: MaskSequencer::new(),
            warp: Box::new(warp),
        })
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Run the node over a flow sequence.
    ///
    /// # Arguments
    ///
    /// * `flow` - input flow sequence.
    /// * `masks` - mask sequence, only used by [`NodeKind::MaskFlow`].
    pub fn run(&mut self, flow: &[VectorField], masks: Option<&[MaskField]>) -> Result<NodeOutput> {
        debug!("running {} over {} frames", self.kind.name(), flow.len());

        let out = match &self.kind {
            NodeKind::Blur(c) => NodeOutput::Flow(map_sequence(flow, c)?),
            NodeKind::Scale(c) => NodeOutput::Flow(map_sequence(flow, c)?),
            NodeKind::Clamp(c) => NodeOutput::Flow(map_sequence(flow, c)?),
            NodeKind::LowerBoundThreshold(c) => NodeOutput::Flow(map_sequence(flow, c)?),
            NodeKind::ToMask(c) => {
                let masks = derive_masks(flow, c.magnitude_threshold, c.method, &*self.warp)?;
                NodeOutput::Mask(MaskBatch::stack(&masks)?)
            }
            NodeKind::MaskFlow => {
                NodeOutput::Flow(self.sequencer.apply(flow, masks.unwrap_or_default())?)
            }
        };

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::MASK_ON;
    use crate::field::ScalarField;
    use crate::properties::Property;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra as na;

    fn uniform(len: usize, v: (f32, f32)) -> Vec<VectorField> {
        vec![VectorField::repeat(4, 4, na::Vector2::new(v.0, v.1)); len]
    }

    #[test]
    fn clamp_node_end_to_end() {
        let mut node = Node::new(NodeKind::Clamp(ClampConfig {
            clamp_max_magnitude: 2.0,
        }))
        .unwrap();

        let out = node.run(&uniform(2, (3.0, 4.0)), None).unwrap().into_flow().unwrap();
        assert_eq!(out.len(), 2);
        for frame in &out {
            assert_eq!(frame.dim(), (4, 4));
            for (_, _, m) in frame.iter() {
                assert_approx_eq!(m.x, 1.2, 1e-5);
                assert_approx_eq!(m.y, 1.6, 1e-5);
            }
        }
    }

    #[test]
    fn frame_nodes_keep_length() {
        for kind in NodeKind::defaults() {
            if kind.output() != OutputKind::Flow || kind.takes_masks() {
                continue;
            }
            let mut node = Node::new(kind).unwrap();
            let out = node.run(&uniform(3, (0.5, 0.0)), None).unwrap();
            assert_eq!(out.into_flow().unwrap().len(), 3, "{}", kind.name());
        }
    }

    #[test]
    fn invalid_configs_are_rejected_up_front() {
        let bad = [
            NodeKind::Blur(BlurConfig { kernel_size: 3 }),
            NodeKind::Blur(BlurConfig { kernel_size: 0 }),
            NodeKind::Blur(BlurConfig {
                kernel_size: usize::MAX - 1,
            }),
            NodeKind::Clamp(ClampConfig {
                clamp_max_magnitude: -1.0,
            }),
            NodeKind::LowerBoundThreshold(ThresholdConfig { threshold: -0.1 }),
            NodeKind::ToMask(ToMaskConfig::default().magnitude_threshold(-2.0)),
            NodeKind::Scale(ScaleConfig { scale: f32::NAN }),
        ];

        for kind in bad {
            let err = Node::new(kind).err().expect("config should be rejected");
            assert!(matches!(
                err.downcast_ref::<FlowError>(),
                Some(FlowError::Configuration { .. })
            ));
        }
    }

    #[test]
    fn negative_scale_is_accepted() {
        let mut node = Node::new(NodeKind::Scale(ScaleConfig { scale: -1.0 })).unwrap();
        let out = node.run(&uniform(1, (1.0, 2.0)), None).unwrap().into_flow().unwrap();
        assert_eq!(out[0].get_motion(0, 0), na::Vector2::new(-1.0, -2.0));
    }

    #[test]
    fn to_mask_produces_binary_batch() {
        let mut node = Node::new(NodeKind::ToMask(
            ToMaskConfig::default().method(MaskMethod::Combined),
        ))
        .unwrap();
        let batch = node.run(&uniform(3, (1.0, 0.0)), None).unwrap().into_masks().unwrap();
        assert_eq!(batch.shape(), (3, 4, 4));
        assert!(batch.as_slice().iter().all(|v| *v == 0.0 || *v == MASK_ON));
    }

    #[test]
    fn to_mask_uses_injected_warp() {
        let cleared = |f: &ScalarField, _: &VectorField| -> Result<ScalarField> {
            Ok(f.map(|_| 0.0))
        };
        let kind = NodeKind::ToMask(ToMaskConfig::default().method(MaskMethod::Adjusted));
        let mut node = Node::with_warp(kind, cleared).unwrap();
        let batch = node.run(&uniform(2, (1.0, 0.0)), None).unwrap().into_masks().unwrap();
        assert!(batch.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn mask_flow_node_keeps_cursor() {
        let mut node = Node::new(NodeKind::MaskFlow).unwrap();
        let masks = (0..3)
            .map(|i| MaskField::repeat(4, 4, i as f32))
            .collect::<Vec<_>>();

        let out = node
            .run(&uniform(1, (3.0, 4.0)), Some(&masks))
            .unwrap()
            .into_flow()
            .unwrap();
        assert_approx_eq!(out[0].get_motion(0, 0).magnitude(), 5.0, 1e-4);

        let out = node
            .run(&uniform(2, (3.0, 4.0)), Some(&masks))
            .unwrap()
            .into_flow()
            .unwrap();
        assert_approx_eq!(out[0].get_motion(0, 0).magnitude(), 10.0, 1e-4);
        assert_approx_eq!(out[1].get_motion(0, 0).magnitude(), 10.0, 1e-4);
    }

    #[test]
    fn mask_flow_without_masks() {
        let mut node = Node::new(NodeKind::MaskFlow).unwrap();
        let err = node.run(&uniform(1, (1.0, 0.0)), None).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FlowError>(),
            Some(&FlowError::EmptyMaskSequence)
        );
    }

    #[test]
    fn registration_table() {
        let names = NodeKind::defaults()
            .iter()
            .map(NodeKind::name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "GaussianBlur (flow)",
                "ScaleMagnitudes (flow)",
                "ClampMagnitudes (flow)",
                "LowerBoundThresholding (flow)",
                "OpticalFlowToMask",
                "MaskOpticalFlow",
            ]
        );
    }

    #[test]
    fn method_property_is_a_choice() {
        let mut config = ToMaskConfig::default();
        for (n, mut p) in config.props_mut() {
            if n == "method" {
                p.set(&Property::Choice {
                    val: "adjusted".into(),
                    options: vec![],
                });
            }
        }
        assert_eq!(config.method, MaskMethod::Adjusted);

        let props = config.props();
        match &props[1] {
            ("method", Property::Choice { val, options }) => {
                assert_eq!(val, "adjusted");
                assert_eq!(options, &["simple", "adjusted", "combined"]);
            }
            p => panic!("unexpected property {:?}", p),
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn pipeline_json() {
        let pipeline: Vec<NodeKind> = serde_json::from_str(
            r#"[
                {"node": "blur", "kernel_size": 6},
                {"node": "lower_bound_threshold"},
                {"node": "mask_flow"},
                {"node": "to_mask", "method": "combined"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            pipeline,
            vec![
                NodeKind::Blur(BlurConfig { kernel_size: 6 }),
                NodeKind::LowerBoundThreshold(ThresholdConfig::default()),
                NodeKind::MaskFlow,
                NodeKind::ToMask(ToMaskConfig::default().method(MaskMethod::Combined)),
            ]
        );
    }
}
