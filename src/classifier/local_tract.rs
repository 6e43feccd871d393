//! Tract-based ONNX scoring for the fixed-vocabulary classifier.
//!
//! Pure-Rust path: loads the model with tract-onnx at startup, pins the
//! input to `[1, size, size, 3]` f32, and runs it synchronously. Callers
//! move inference onto a blocking thread.

use anyhow::{bail, Result};
use ndarray::Array4;
use std::path::Path;
use tract_onnx::prelude::*;

use super::fixed::ScoreModel;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct TractModel {
    plan: Plan,
}

impl TractModel {
    pub fn load(path: &Path, input_size: u32) -> Result<Self> {
        if !path.exists() {
            bail!("Model file not found: {}", path.display());
        }
        let side = input_size as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| anyhow::anyhow!("Load ONNX: {}", e))?
            .with_input_fact(0, f32::fact([1, side, side, 3]).into())
            .map_err(|e| anyhow::anyhow!("Input fact: {}", e))?
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("Optimize: {}", e))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("Build tract runnable: {}", e))?;
        Ok(Self { plan })
    }
}

impl ScoreModel for TractModel {
    fn scores(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let tensor: Tensor = input.into();
        let result = self.plan.run(tvec!(tensor.into()))?;

        let output = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No output tensor"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| anyhow::anyhow!("Output to array: {}", e))?;

        // Output is [1, classes] or a flat [classes].
        match view.shape() {
            [_] | [1, _] => Ok(view.iter().copied().collect()),
            shape => bail!("Unexpected output shape: {:?}", shape),
        }
    }
}
