//! TorchScript backend for the legacy `.pt` model (feature `pytorch`)

use crate::engine::{InferenceError, ModelOutput, ModelRunner, ProbeFailureReason};
use ndarray::ArrayView4;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tch::{CModule, Device, IValue, Kind, Tensor};
use tracing::info;

pub struct TorchScriptRunner {
    module: Mutex<CModule>,
}

impl TorchScriptRunner {
    pub fn load(model_path: &Path) -> Result<Self, ProbeFailureReason> {
        let mut module = CModule::load_on_device(model_path, Device::Cpu)
            .map_err(|e| ProbeFailureReason::LoadFailed(e.to_string()))?;
        module.set_eval();

        info!("TorchScript model loaded: {}", model_path.display());

        Ok(Self {
            module: Mutex::new(module),
        })
    }
}

impl ModelRunner for TorchScriptRunner {
    fn run(&self, input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_slice(&data).reshape(shape.as_slice());

        let module = self.module.lock().unwrap_or_else(PoisonError::into_inner);

        let output = tch::no_grad(|| module.forward_is(&[IValue::Tensor(tensor)]))
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let arrays = match output {
            IValue::Tensor(scores) => vec![tensor_to_vec(&scores)?],
            IValue::Tuple(values) | IValue::GenericList(values) => values
                .iter()
                .take(2)
                .map(|value| match value {
                    IValue::Tensor(t) => tensor_to_vec(t),
                    other => Err(InferenceError::Runtime(format!(
                        "Unexpected TorchScript output element: {:?}",
                        other
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(InferenceError::Runtime(format!(
                    "Unexpected TorchScript output: {:?}",
                    other
                )))
            }
        };

        ModelOutput::from_arrays(arrays)
    }
}

fn tensor_to_vec(tensor: &Tensor) -> Result<Vec<f32>, InferenceError> {
    let flat = tensor.flatten(0, -1).to_kind(Kind::Float);
    Vec::<f32>::try_from(&flat).map_err(|e| InferenceError::Runtime(e.to_string()))
}
