//! Metadata Normalization
//!
//! Both protocols report model metadata in their own shape. Each transport
//! lowers its response into [`RawModelMetadata`]; this module turns that into a
//! validated [`ModelSignature`].

use crate::ResolutionError;
use signature::{BackendKind, ModelRef, ModelSignature, SignatureDescriptor};
use tensor::DataType;
use tracing::debug;

/// One tensor as reported by the backend, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorMetadata {
    pub name: String,
    pub datatype: String,
    pub shape: Vec<i64>,
}

/// Model metadata as reported by the backend, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawModelMetadata {
    pub name: String,
    pub versions: Vec<String>,
    pub platform: String,
    pub inputs: Vec<TensorMetadata>,
    pub outputs: Vec<TensorMetadata>,
}

/// Validate raw metadata into a signature
pub fn normalize_metadata(
    model: &ModelRef,
    raw: RawModelMetadata,
) -> Result<ModelSignature, ResolutionError> {
    let invalid = |reason: String| ResolutionError::InvalidMetadata {
        model: model.name.clone(),
        reason,
    };

    if raw.outputs.is_empty() {
        return Err(invalid("model declares no outputs".to_string()));
    }

    let inputs = descriptors("input", raw.inputs).map_err(invalid)?;
    let outputs = descriptors("output", raw.outputs).map_err(invalid)?;

    let name = if raw.name.is_empty() {
        model.name.clone()
    } else {
        raw.name
    };
    let backend = BackendKind::from_platform(&raw.platform);

    let signature = ModelSignature::new(name, inputs, outputs, backend)
        .map_err(|e| invalid(e.to_string()))?
        .with_versions(raw.versions);

    debug!(
        "Resolved {}: {} inputs, {} outputs, backend {}",
        model,
        signature.inputs().len(),
        signature.outputs().len(),
        signature.backend()
    );
    Ok(signature)
}

fn descriptors(
    side: &str,
    tensors: Vec<TensorMetadata>,
) -> Result<Vec<SignatureDescriptor>, String> {
    tensors
        .into_iter()
        .map(|t| {
            let datatype: DataType = t
                .datatype
                .parse()
                .map_err(|_| format!("{} {} has unknown datatype {:?}", side, t.name, t.datatype))?;
            Ok(SignatureDescriptor::from_metadata(t.name, datatype, &t.shape))
        })
        .collect()
}
