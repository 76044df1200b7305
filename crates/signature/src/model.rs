//! Model Signature

use crate::{SignatureDescriptor, SignatureError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identity of a served model
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub name: String,
    /// Empty means the backend picks the version
    pub version: String,
}

impl ModelRef {
    /// Reference the backend's default version of a model
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
        }
    }

    /// Pin a specific version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Version if one was pinned
    pub fn version(&self) -> Option<&str> {
        if self.version.is_empty() {
            None
        } else {
            Some(&self.version)
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.version)
    }
}

/// Execution engine that serves a model (diagnostics only)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    OnnxRuntime,
    PyTorch,
    TensorFlow,
    TensorRt,
    Python,
    Ensemble,
    /// Backend did not report a platform
    Unknown,
    Other(String),
}

impl BackendKind {
    /// Classify a metadata platform token such as `onnxruntime_onnx`
    pub fn from_platform(platform: &str) -> Self {
        let platform = platform.trim();
        if platform.is_empty() {
            return BackendKind::Unknown;
        }

        let lower = platform.to_ascii_lowercase();
        if lower.starts_with("onnxruntime") {
            BackendKind::OnnxRuntime
        } else if lower.starts_with("pytorch") {
            BackendKind::PyTorch
        } else if lower.starts_with("tensorflow") {
            BackendKind::TensorFlow
        } else if lower.starts_with("tensorrt") {
            BackendKind::TensorRt
        } else if lower == "python" {
            BackendKind::Python
        } else if lower == "ensemble" {
            BackendKind::Ensemble
        } else {
            BackendKind::Other(platform.to_string())
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        match self {
            BackendKind::OnnxRuntime => "onnxruntime",
            BackendKind::PyTorch => "pytorch_libtorch",
            BackendKind::TensorFlow => "tensorflow",
            BackendKind::TensorRt => "tensorrt",
            BackendKind::Python => "python",
            BackendKind::Ensemble => "ensemble",
            BackendKind::Unknown => "unknown",
            BackendKind::Other(platform) => platform,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered input and output contract of one model
///
/// Input order is the binding order for positional calls. Names are unique on
/// each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSignature {
    name: String,
    versions: Vec<String>,
    inputs: Vec<SignatureDescriptor>,
    outputs: Vec<SignatureDescriptor>,
    backend: BackendKind,
}

impl ModelSignature {
    /// Create a signature, rejecting empty or duplicate names
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<SignatureDescriptor>,
        outputs: Vec<SignatureDescriptor>,
        backend: BackendKind,
    ) -> Result<Self, SignatureError> {
        check_names("input", &inputs)?;
        check_names("output", &outputs)?;

        Ok(Self {
            name: name.into(),
            versions: Vec::new(),
            inputs,
            outputs,
            backend,
        })
    }

    /// Attach the versions the backend reports as available
    pub fn with_versions(mut self, versions: Vec<String>) -> Self {
        self.versions = versions;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn inputs(&self) -> &[SignatureDescriptor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[SignatureDescriptor] {
        &self.outputs
    }

    pub fn backend(&self) -> &BackendKind {
        &self.backend
    }

    /// Look up an input by name
    pub fn input(&self, name: &str) -> Option<&SignatureDescriptor> {
        self.inputs.iter().find(|d| d.name == name)
    }

    /// Look up an output by name
    pub fn output(&self, name: &str) -> Option<&SignatureDescriptor> {
        self.outputs.iter().find(|d| d.name == name)
    }

    /// Input names in declaration order
    pub fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|d| d.name.clone()).collect()
    }

    /// Output names in declaration order
    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|d| d.name.clone()).collect()
    }
}

impl fmt::Display for ModelSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs: Vec<String> = self.inputs.iter().map(|d| d.to_string()).collect();
        let outputs: Vec<String> = self.outputs.iter().map(|d| d.to_string()).collect();
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Versions: [{}]", self.versions.join(", "))?;
        writeln!(f, "Inputs: ({})", inputs.join(", "))?;
        writeln!(f, "Outputs: ({})", outputs.join(", "))?;
        write!(f, "Backend: {}", self.backend)
    }
}

fn check_names(side: &'static str, descriptors: &[SignatureDescriptor]) -> Result<(), SignatureError> {
    let mut seen = HashSet::with_capacity(descriptors.len());
    for (index, desc) in descriptors.iter().enumerate() {
        if desc.name.is_empty() {
            return Err(SignatureError::EmptyName { side, index });
        }
        if !seen.insert(desc.name.as_str()) {
            return Err(SignatureError::DuplicateName {
                side,
                name: desc.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor::DataType;

    fn py_model() -> ModelSignature {
        let io = |name: &str| SignatureDescriptor::from_metadata(name, DataType::Fp32, &[4]);
        ModelSignature::new(
            "py_model",
            vec![io("INPUT0"), io("INPUT1")],
            vec![io("OUTPUT0"), io("OUTPUT1")],
            BackendKind::Python,
        )
        .unwrap()
        .with_versions(vec!["1".to_string()])
    }

    #[test]
    fn test_names_in_declared_order() {
        let sig = py_model();
        assert_eq!(sig.input_names(), vec!["INPUT0", "INPUT1"]);
        assert_eq!(sig.output_names(), vec!["OUTPUT0", "OUTPUT1"]);
        assert_eq!(sig.input("INPUT1").unwrap().datatype, DataType::Fp32);
        assert!(sig.input("OUTPUT0").is_none());
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let io = SignatureDescriptor::from_metadata("x", DataType::Int32, &[-1]);
        let err = ModelSignature::new("m", vec![io.clone(), io], vec![], BackendKind::Unknown)
            .unwrap_err();
        assert_eq!(
            err,
            SignatureError::DuplicateName {
                side: "input",
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_same_name_on_both_sides_is_fine() {
        let io = SignatureDescriptor::from_metadata("x", DataType::Int32, &[-1]);
        assert!(ModelSignature::new("m", vec![io.clone()], vec![io], BackendKind::Unknown).is_ok());
    }

    #[test]
    fn test_backend_kind_from_platform() {
        assert_eq!(BackendKind::from_platform("onnxruntime_onnx"), BackendKind::OnnxRuntime);
        assert_eq!(BackendKind::from_platform("pytorch_libtorch"), BackendKind::PyTorch);
        assert_eq!(BackendKind::from_platform("tensorflow_savedmodel"), BackendKind::TensorFlow);
        assert_eq!(BackendKind::from_platform("tensorrt_plan"), BackendKind::TensorRt);
        assert_eq!(BackendKind::from_platform("python"), BackendKind::Python);
        assert_eq!(BackendKind::from_platform(""), BackendKind::Unknown);
        assert_eq!(
            BackendKind::from_platform("openvino"),
            BackendKind::Other("openvino".to_string())
        );
    }

    #[test]
    fn test_display_summary() {
        let text = py_model().to_string();
        assert!(text.starts_with("Name: py_model\n"));
        assert!(text.contains("Inputs: (INPUT0: FP32[4], INPUT1: FP32[4])"));
        assert!(text.ends_with("Backend: python"));
    }

    #[test]
    fn test_serializes_for_tooling() {
        let json = serde_json::to_value(py_model()).unwrap();
        assert_eq!(json["inputs"][0]["datatype"], "FP32");
        assert_eq!(json["inputs"][0]["shape"][0]["Fixed"], 4);
    }

    #[test]
    fn test_model_ref_version() {
        let model = ModelRef::new("gpt2");
        assert_eq!(model.version(), None);
        let model = model.with_version("1");
        assert_eq!(model.version(), Some("1"));
        assert_eq!(model.to_string(), "gpt2[1]");
    }
}
