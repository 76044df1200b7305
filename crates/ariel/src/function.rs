//! Remote Functions
//!
//! A [`RemoteFunction`] closes over a model reference, the signature resolved
//! for it at construction, a backend handle and optional processing hooks.
//! Calls share nothing but the signature, which is never written after
//! construction, so one instance may serve concurrent tasks.

use crate::{ArielConfig, Error};
use binder::{bind, Arguments, BindOptions, CallArgs};
use signature::{BackendKind, ModelRef, ModelSignature, SignatureDescriptor};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tensor::Tensor;
use tracing::{debug, info};
use transport::{InferenceBackend, Protocol};

/// Error returned by a processing hook
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Whole-sequence transform applied before binding or after the round trip
///
/// Must return as many values as it receives. An error aborts the call.
pub type Processor = Arc<dyn Fn(Vec<Tensor>) -> Result<Vec<Tensor>, BoxError> + Send + Sync>;

/// A remote model exposed as an async function
pub struct RemoteFunction {
    model: ModelRef,
    signature: ModelSignature,
    output_names: Vec<String>,
    backend: Arc<dyn InferenceBackend>,
    preprocessing: Option<Processor>,
    postprocessing: Option<Processor>,
    bind_options: BindOptions,
}

impl RemoteFunction {
    /// Start building a function for `model`
    pub fn builder(model: impl Into<String>) -> RemoteFunctionBuilder {
        RemoteFunctionBuilder::new(model)
    }

    /// Invoke the model
    ///
    /// Runs pre-processing over the argument values in supplied order, binds
    /// them against the declared inputs, performs one round trip requesting
    /// every declared output and runs post-processing over the outputs.
    /// Argument errors are reported before any network I/O.
    pub async fn call(&self, args: CallArgs) -> Result<Vec<Tensor>, Error> {
        let mut arguments = args.resolve()?;

        if let Some(preprocessing) = &self.preprocessing {
            let (names, values) = arguments.into_parts();
            let values = apply("preprocessing", preprocessing, values)?;
            arguments = Arguments::from_parts(names, values);
        }

        let request = bind(self.signature.inputs(), arguments, self.bind_options)?;

        let start = Instant::now();
        let outputs = self
            .backend
            .invoke(&self.model, request, &self.output_names)
            .await?;
        debug!(
            "{} returned {} outputs in {}ms",
            self.model,
            outputs.len(),
            start.elapsed().as_millis()
        );

        match &self.postprocessing {
            Some(postprocessing) => apply("postprocessing", postprocessing, outputs),
            None => Ok(outputs),
        }
    }

    /// Invoke with inputs in declared order
    pub async fn call_positional(&self, values: Vec<Tensor>) -> Result<Vec<Tensor>, Error> {
        self.call(CallArgs::positional(values)).await
    }

    /// Invoke with inputs by name
    pub async fn call_named<K: Into<String>>(
        &self,
        values: impl IntoIterator<Item = (K, Tensor)>,
    ) -> Result<Vec<Tensor>, Error> {
        self.call(CallArgs::named(values)).await
    }

    /// Model reference, including any pinned version
    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Signature resolved at construction
    pub fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    /// Declared inputs, in binding order
    pub fn inputs(&self) -> &[SignatureDescriptor] {
        self.signature.inputs()
    }

    /// Declared outputs, in return order
    pub fn outputs(&self) -> &[SignatureDescriptor] {
        self.signature.outputs()
    }

    /// Model name as addressed on the backend
    pub fn name(&self) -> &str {
        &self.model.name
    }

    /// Pinned version, if any
    pub fn version(&self) -> Option<&str> {
        self.model.version()
    }

    /// Execution engine reported by the backend
    pub fn backend_kind(&self) -> &BackendKind {
        self.signature.backend()
    }

    /// Wire protocol of the backend
    pub fn protocol(&self) -> Protocol {
        self.backend.protocol()
    }

    /// Normalized backend address
    pub fn endpoint(&self) -> &str {
        self.backend.endpoint()
    }
}

fn apply(
    stage: &'static str,
    processor: &Processor,
    values: Vec<Tensor>,
) -> Result<Vec<Tensor>, Error> {
    let expected = values.len();
    let values = processor(values).map_err(|source| Error::Hook { stage, source })?;
    if values.len() != expected {
        return Err(Error::Processing {
            stage,
            expected,
            actual: values.len(),
        });
    }
    Ok(values)
}

impl fmt::Display for RemoteFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signature = &self.signature;
        let inputs: Vec<String> = signature.inputs().iter().map(|d| d.to_string()).collect();
        let outputs: Vec<String> = signature.outputs().iter().map(|d| d.to_string()).collect();
        match self.model.version() {
            Some(_) => writeln!(f, "Name: {}", self.model)?,
            None => writeln!(f, "Name: {}", self.model.name)?,
        }
        writeln!(f, "Versions: [{}]", signature.versions().join(", "))?;
        writeln!(f, "Inputs: ({})", inputs.join(", "))?;
        writeln!(f, "Outputs: ({})", outputs.join(", "))?;
        writeln!(f, "Backend: {}", signature.backend())?;
        write!(f, "Endpoint: {} ({})", self.endpoint(), self.protocol())
    }
}

impl fmt::Debug for RemoteFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFunction")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint())
            .field("inputs", &self.signature.input_names())
            .field("outputs", &self.output_names)
            .field("preprocessing", &self.preprocessing.is_some())
            .field("postprocessing", &self.postprocessing.is_some())
            .finish()
    }
}

/// Builder for [`RemoteFunction`]
pub struct RemoteFunctionBuilder {
    model: String,
    version: Option<String>,
    preprocessing: Option<Processor>,
    postprocessing: Option<Processor>,
    config: ArielConfig,
    backend: Option<Arc<dyn InferenceBackend>>,
}

impl RemoteFunctionBuilder {
    fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            version: None,
            preprocessing: None,
            postprocessing: None,
            config: ArielConfig::default(),
            backend: None,
        }
    }

    /// Pin a model version, overriding `model_version` from the config
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Transform the arguments before binding
    pub fn preprocessing<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Tensor>) -> Result<Vec<Tensor>, BoxError> + Send + Sync + 'static,
    {
        self.preprocessing = Some(Arc::new(f));
        self
    }

    /// Transform the outputs after the round trip
    pub fn postprocessing<F>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Tensor>) -> Result<Vec<Tensor>, BoxError> + Send + Sync + 'static,
    {
        self.postprocessing = Some(Arc::new(f));
        self
    }

    /// Connection and binding settings
    pub fn config(mut self, config: ArielConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing backend instead of connecting from the config
    pub fn backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Resolve the signature and return the function
    pub async fn build(self) -> Result<RemoteFunction, Error> {
        let backend = match self.backend {
            Some(backend) => backend,
            None => transport::connect(&self.config.transport_config())?,
        };

        let model = model_ref(self.model, self.version.or(self.config.model_version.clone()));
        let signature = backend.resolve_metadata(&model).await?;
        info!(
            "Resolved {} via {} at {}: {} inputs, {} outputs",
            model,
            backend.protocol(),
            backend.endpoint(),
            signature.inputs().len(),
            signature.outputs().len()
        );

        Ok(RemoteFunction {
            model,
            output_names: signature.output_names(),
            signature,
            backend,
            preprocessing: self.preprocessing,
            postprocessing: self.postprocessing,
            bind_options: self.config.bind_options(),
        })
    }
}

fn model_ref(name: String, version: Option<String>) -> ModelRef {
    match version {
        Some(version) if !version.is_empty() => ModelRef::new(name).with_version(version),
        _ => ModelRef::new(name),
    }
}

/// Build a remote function for `model` with no processing hooks
pub async fn function_from_model(model: &str, config: &ArielConfig) -> Result<RemoteFunction, Error> {
    RemoteFunction::builder(model)
        .config(config.clone())
        .build()
        .await
}

async fn resolve(model: &str, config: &ArielConfig) -> Result<ModelSignature, Error> {
    let backend = transport::connect(&config.transport_config())?;
    let model = model_ref(model.to_string(), config.model_version.clone());
    Ok(backend.resolve_metadata(&model).await?)
}

/// Declared inputs of `model`, in binding order
pub async fn get_inputs(model: &str, config: &ArielConfig) -> Result<Vec<SignatureDescriptor>, Error> {
    Ok(resolve(model, config).await?.inputs().to_vec())
}

/// Declared outputs of `model`, in return order
pub async fn get_outputs(model: &str, config: &ArielConfig) -> Result<Vec<SignatureDescriptor>, Error> {
    Ok(resolve(model, config).await?.outputs().to_vec())
}
