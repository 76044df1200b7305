//! HTTP/JSON Transport
//!
//! Speaks the `/v2` REST binding. Tensor data travels as flat JSON arrays, so
//! `FP16` and `BF16` are not available on this transport.

pub mod wire;

use crate::{
    check_datatype, normalize_metadata, order_outputs, InferenceBackend, InvokeError, Protocol,
    RawModelMetadata, ResolutionError, ServerInferenceError, TensorMetadata, TransportConfig,
    TransportError,
};
use async_trait::async_trait;
use binder::BoundRequest;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use signature::{ModelRef, ModelSignature};
use std::collections::HashMap;
use std::time::Instant;
use tensor::Tensor;
use tracing::{debug, info, warn};
use wire::{ErrorBody, InferRequestBody, InferResponseBody, JsonTensor, RequestedOutput};

/// Backend reached over HTTP/JSON
pub struct HttpBackend {
    endpoint: String,
    base: Url,
    client: Client,
}

impl HttpBackend {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let uri = config.endpoint_uri();
        let base =
            Url::parse(&uri).map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", uri, e)))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::InvalidEndpoint(format!("{}: not a base URL", uri)));
        }
        info!("Creating HTTP backend for {}", uri);

        let mut builder = Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self {
            endpoint: uri,
            base,
            client,
        })
    }
}

/// Append percent-encoded path segments to the endpoint
fn endpoint_url(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // cannot-be-a-base URLs are rejected in HttpBackend::new
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// `/v2/models/{name}`, with `/versions/{v}` only when a version is pinned
fn model_url(base: &Url, model: &ModelRef, suffix: Option<&str>) -> Url {
    let mut segments = vec!["v2", "models", model.name.as_str()];
    if let Some(version) = model.version() {
        segments.extend(["versions", version]);
    }
    segments.extend(suffix);
    endpoint_url(base, &segments)
}

#[async_trait]
impl InferenceBackend for HttpBackend {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn is_ready(&self) -> Result<bool, TransportError> {
        let response = self
            .client
            .get(endpoint_url(&self.base, &["v2", "health", "ready"]))
            .send()
            .await
            .map_err(send_error)?;
        Ok(response.status().is_success())
    }

    async fn resolve_metadata(&self, model: &ModelRef) -> Result<ModelSignature, ResolutionError> {
        let url = model_url(&self.base, model, None);
        debug!("Querying metadata for {} at {}", model, url);

        let unreachable = |reason: String| ResolutionError::Unreachable {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!("Metadata query to {} failed: {}", url, e);
            unreachable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = error_message(&body);
            return Err(match status {
                StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => ResolutionError::ModelNotFound {
                    model: model.to_string(),
                    reason,
                },
                _ => unreachable(format!("status {}: {}", status.as_u16(), reason)),
            });
        }

        let body: Value = response.json().await.map_err(|e| ResolutionError::InvalidMetadata {
            model: model.name.clone(),
            reason: format!("response is not JSON: {}", e),
        })?;

        let raw = parse_metadata(&body).map_err(|reason| ResolutionError::InvalidMetadata {
            model: model.name.clone(),
            reason,
        })?;
        normalize_metadata(model, raw)
    }

    async fn invoke(
        &self,
        model: &ModelRef,
        request: BoundRequest,
        output_names: &[String],
    ) -> Result<Vec<Tensor>, InvokeError> {
        let body = encode_request(request, output_names)?;
        let request_id = body.id.clone().unwrap_or_default();
        let url = model_url(&self.base, model, Some("infer"));
        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(send_error)?;
            return Err(match serde_json::from_str::<ErrorBody>(&body) {
                Ok(error) => InvokeError::Server(ServerInferenceError {
                    model: model.to_string(),
                    status: status.as_u16().to_string(),
                    message: error.error,
                }),
                Err(_) => InvokeError::Transport(TransportError::Status {
                    status: status.as_u16(),
                    body,
                }),
            });
        }

        let body: InferResponseBody = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        debug!(
            "HTTP inference {} on {} completed in {}ms",
            request_id,
            model,
            start.elapsed().as_millis()
        );

        let received = body
            .outputs
            .iter()
            .map(|output| output.to_tensor().map(|t| (output.name.clone(), t)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(order_outputs(output_names, received)?)
    }
}

/// Build the JSON body of an infer request
pub fn encode_request(
    request: BoundRequest,
    output_names: &[String],
) -> Result<InferRequestBody, TransportError> {
    let inputs = request
        .placeholders()
        .iter()
        .map(|placeholder| {
            check_datatype(placeholder)?;
            JsonTensor::from_tensor(placeholder.name.clone(), &placeholder.tensor)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InferRequestBody {
        id: Some(uuid::Uuid::new_v4().to_string()),
        inputs,
        outputs: output_names
            .iter()
            .map(|name| RequestedOutput { name: name.clone() })
            .collect(),
    })
}

/// Lower a metadata body, naming the first missing or mistyped field
pub fn parse_metadata(body: &Value) -> Result<RawModelMetadata, String> {
    let text = |value: &Value, key: &str| -> Result<String, String> {
        match value.get(key) {
            None | Some(Value::Null) => Err(format!("missing field {}", key)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(format!("field {} is not a string: {}", key, other)),
        }
    };

    let tensors = |key: &str| -> Result<Vec<TensorMetadata>, String> {
        let items = body
            .get(key)
            .ok_or_else(|| format!("missing field {}", key))?
            .as_array()
            .ok_or_else(|| format!("field {} is not an array", key))?;

        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let name = item
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("{}[{}] is missing name", key, i))?;
                let datatype = item
                    .get("datatype")
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("{}[{}] is missing datatype", key, i))?;
                let shape = item
                    .get("shape")
                    .and_then(Value::as_array)
                    .ok_or_else(|| format!("{}[{}] is missing shape", key, i))?
                    .iter()
                    .map(|d| d.as_i64().ok_or_else(|| format!("{}[{}] has dimension {}", key, i, d)))
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(TensorMetadata {
                    name: name.to_string(),
                    datatype: datatype.to_string(),
                    shape,
                })
            })
            .collect()
    };

    let versions = match body.get("versions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(other) => return Err(format!("field versions is not an array: {}", other)),
    };

    Ok(RawModelMetadata {
        name: text(body, "name")?,
        versions,
        platform: text(body, "platform")?,
        inputs: tensors("inputs")?,
        outputs: tensors("outputs")?,
    })
}

/// Prefer the backend's `error` field over the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

fn send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binder::{bind, BindOptions, CallArgs};
    use serde_json::json;
    use signature::SignatureDescriptor;
    use tensor::DataType;

    #[test]
    fn test_model_url_version_only_when_pinned() {
        let base = Url::parse("http://localhost:8000").unwrap();
        assert_eq!(
            model_url(&base, &ModelRef::new("py_model"), None).as_str(),
            "http://localhost:8000/v2/models/py_model"
        );
        assert_eq!(
            model_url(&base, &ModelRef::new("py_model").with_version("3"), Some("infer")).as_str(),
            "http://localhost:8000/v2/models/py_model/versions/3/infer"
        );
    }

    #[test]
    fn test_model_url_escapes_reserved_characters() {
        let base = Url::parse("http://localhost:8000/").unwrap();
        let url = model_url(&base, &ModelRef::new("a/b?c").with_version("1 2"), Some("infer"));
        assert_eq!(url.path(), "/v2/models/a%2Fb%3Fc/versions/1%202/infer");
        assert!(url.query().is_none());
    }

    #[test]
    fn test_cannot_be_a_base_endpoint_rejected() {
        let config = TransportConfig::new(Protocol::Http).with_endpoint("urn:isbn://0451450523");
        assert!(matches!(
            HttpBackend::new(&config),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_parse_metadata() {
        let body = json!({
            "name": "py_model",
            "versions": ["1"],
            "platform": "python",
            "inputs": [
                {"name": "INPUT0", "datatype": "FP32", "shape": [4]},
                {"name": "INPUT1", "datatype": "FP32", "shape": [4]}
            ],
            "outputs": [{"name": "OUTPUT0", "datatype": "FP32", "shape": [-1]}]
        });

        let raw = parse_metadata(&body).unwrap();
        assert_eq!(raw.name, "py_model");
        assert_eq!(raw.versions, vec!["1".to_string()]);
        assert_eq!(raw.inputs.len(), 2);
        assert_eq!(raw.outputs[0].shape, vec![-1]);
    }

    #[test]
    fn test_parse_metadata_names_missing_field() {
        let body = json!({
            "name": "broken",
            "platform": "python",
            "inputs": [{"name": "x", "shape": [1]}],
            "outputs": []
        });
        let err = parse_metadata(&body).unwrap_err();
        assert!(err.contains("inputs[0] is missing datatype"));

        let err = parse_metadata(&json!({"name": "m", "platform": "python", "inputs": []}))
            .unwrap_err();
        assert_eq!(err, "missing field outputs");
    }

    #[test]
    fn test_parse_metadata_requires_name_and_platform() {
        let body = json!({"platform": "python", "inputs": [], "outputs": []});
        assert_eq!(parse_metadata(&body).unwrap_err(), "missing field name");

        let body = json!({"name": "m", "platform": null, "inputs": [], "outputs": []});
        assert_eq!(parse_metadata(&body).unwrap_err(), "missing field platform");
    }

    #[test]
    fn test_encode_request_body() {
        let inputs = vec![SignatureDescriptor::from_metadata("INPUT0", DataType::Int64, &[2])];
        let tensor = Tensor::from_vec(vec![2], vec![7i64, 8]).unwrap();
        let bound = bind(
            &inputs,
            CallArgs::named([("INPUT0", tensor)]).resolve().unwrap(),
            BindOptions::default(),
        )
        .unwrap();

        let body = encode_request(bound, &["OUTPUT0".to_string()]).unwrap();
        assert!(body.id.is_some());
        assert_eq!(body.inputs[0].data, json!([7, 8]));
        assert_eq!(body.outputs[0].name, "OUTPUT0");
    }

    #[test]
    fn test_error_message_prefers_error_field() {
        assert_eq!(error_message(r#"{"error":"model not ready"}"#), "model not ready");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        // Nothing listens on port 9 on a test host.
        let backend = HttpBackend::new(&TransportConfig::new(Protocol::Http).with_endpoint("127.0.0.1:9"))
            .unwrap();
        let err = backend.resolve_metadata(&ModelRef::new("m")).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Unreachable { .. }));
    }
}
