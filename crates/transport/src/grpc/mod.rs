//! gRPC Transport
//!
//! Speaks `inference.GRPCInferenceService`. Input tensors travel as raw
//! little-endian buffers in `raw_input_contents`.

pub mod proto;

use crate::{
    check_datatype, normalize_metadata, order_outputs, InferenceBackend, InvokeError, Protocol,
    RawModelMetadata, ResolutionError, ServerInferenceError, TensorMetadata, TransportConfig,
    TransportError,
};
use async_trait::async_trait;
use binder::BoundRequest;
use bytes::Bytes;
use proto::InferenceServiceClient;
use signature::{ModelRef, ModelSignature};
use std::collections::HashMap;
use std::time::Instant;
use tensor::{DataType, Element, Tensor};
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::{debug, info, warn};

/// Backend reached over gRPC
///
/// The channel is shared; each call works on a cheap clone of the client.
pub struct GrpcBackend {
    endpoint: String,
    client: InferenceServiceClient<Channel>,
}

impl GrpcBackend {
    /// Create a lazily connected backend
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let uri = config.endpoint_uri();
        info!("Creating gRPC backend for {}", uri);

        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", uri, e)))?
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }

        let client = InferenceServiceClient::new(endpoint.connect_lazy())
            .max_decoding_message_size(config.max_message_size)
            .max_encoding_message_size(config.max_message_size);

        Ok(Self {
            endpoint: uri,
            client,
        })
    }
}

#[async_trait]
impl InferenceBackend for GrpcBackend {
    fn protocol(&self) -> Protocol {
        Protocol::Grpc
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn is_ready(&self) -> Result<bool, TransportError> {
        let mut client = self.client.clone();
        let response = client
            .server_ready(proto::ServerReadyRequest {})
            .await
            .map_err(|status| transport_error(&status))?;
        Ok(response.into_inner().ready)
    }

    async fn resolve_metadata(&self, model: &ModelRef) -> Result<ModelSignature, ResolutionError> {
        debug!("Querying metadata for {} at {}", model, self.endpoint);

        let mut client = self.client.clone();
        let response = client
            .model_metadata(proto::ModelMetadataRequest {
                name: model.name.clone(),
                version: model.version.clone(),
            })
            .await
            .map_err(|status| resolution_error(&self.endpoint, model, &status))?
            .into_inner();

        normalize_metadata(model, raw_metadata(response))
    }

    async fn invoke(
        &self,
        model: &ModelRef,
        request: BoundRequest,
        output_names: &[String],
    ) -> Result<Vec<Tensor>, InvokeError> {
        let request = encode_request(model, request, output_names)?;
        let request_id = request.id.clone();
        let start = Instant::now();

        let mut client = self.client.clone();
        let response = client
            .model_infer(request)
            .await
            .map_err(|status| invoke_error(model, &status))?
            .into_inner();

        debug!(
            "gRPC inference {} on {} completed in {}ms",
            request_id,
            model,
            start.elapsed().as_millis()
        );

        let received = decode_response(response)?;
        Ok(order_outputs(output_names, received)?)
    }
}

/// Build a `ModelInfer` request with raw input contents
pub fn encode_request(
    model: &ModelRef,
    request: BoundRequest,
    output_names: &[String],
) -> Result<proto::ModelInferRequest, TransportError> {
    let placeholders = request.into_placeholders();
    let mut inputs = Vec::with_capacity(placeholders.len());
    let mut raw_input_contents = Vec::with_capacity(placeholders.len());

    for placeholder in placeholders {
        check_datatype(&placeholder)?;
        inputs.push(proto::InferInputTensor {
            name: placeholder.name,
            datatype: placeholder.datatype.as_str().to_string(),
            shape: placeholder.tensor.shape().iter().map(|&d| d as i64).collect(),
            contents: None,
        });
        raw_input_contents.push(placeholder.tensor.into_data());
    }

    Ok(proto::ModelInferRequest {
        model_name: model.name.clone(),
        model_version: model.version.clone(),
        id: uuid::Uuid::new_v4().to_string(),
        inputs,
        outputs: output_names
            .iter()
            .map(|name| proto::InferRequestedOutputTensor { name: name.clone() })
            .collect(),
        raw_input_contents,
    })
}

/// Decode every output tensor in a `ModelInfer` response, keyed by name
pub fn decode_response(
    response: proto::ModelInferResponse,
) -> Result<HashMap<String, Tensor>, TransportError> {
    let raw = response.raw_output_contents;
    if !raw.is_empty() && raw.len() != response.outputs.len() {
        return Err(TransportError::MalformedResponse(format!(
            "{} outputs but {} raw output buffers",
            response.outputs.len(),
            raw.len()
        )));
    }

    let mut raw = raw.into_iter();
    let mut decoded = HashMap::with_capacity(response.outputs.len());
    for output in response.outputs {
        let datatype: DataType = output.datatype.parse().map_err(|_| {
            TransportError::MalformedResponse(format!(
                "output {} has unknown datatype {}",
                output.name, output.datatype
            ))
        })?;
        let shape = to_shape(&output.name, &output.shape)?;

        let data = match raw.next() {
            Some(bytes) => bytes,
            None => Bytes::from(contents_to_bytes(
                &output.name,
                datatype,
                output.contents.unwrap_or_default(),
            )?),
        };

        let tensor = Tensor::from_raw(datatype, shape, data)?;
        decoded.insert(output.name, tensor);
    }

    Ok(decoded)
}

/// Re-encode typed contents as the raw little-endian layout
fn contents_to_bytes(
    name: &str,
    datatype: DataType,
    contents: proto::InferTensorContents,
) -> Result<Vec<u8>, TransportError> {
    fn write_all<T: Element>(values: impl IntoIterator<Item = T>) -> Vec<u8> {
        let mut out = Vec::new();
        for value in values {
            value.write_le(&mut out);
        }
        out
    }

    let narrow = |what: &str| {
        TransportError::MalformedResponse(format!("output {} holds out-of-range {}", name, what))
    };

    let bytes = match datatype {
        DataType::Bool => write_all(contents.bool_contents),
        DataType::Int8 => write_all(
            contents
                .int_contents
                .into_iter()
                .map(i8::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| narrow("INT8"))?,
        ),
        DataType::Int16 => write_all(
            contents
                .int_contents
                .into_iter()
                .map(i16::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| narrow("INT16"))?,
        ),
        DataType::Int32 => write_all(contents.int_contents),
        DataType::Int64 => write_all(contents.int64_contents),
        DataType::Uint8 => write_all(
            contents
                .uint_contents
                .into_iter()
                .map(u8::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| narrow("UINT8"))?,
        ),
        DataType::Uint16 => write_all(
            contents
                .uint_contents
                .into_iter()
                .map(u16::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| narrow("UINT16"))?,
        ),
        DataType::Uint32 => write_all(contents.uint_contents),
        DataType::Uint64 => write_all(contents.uint64_contents),
        DataType::Fp32 => write_all(contents.fp32_contents),
        DataType::Fp64 => write_all(contents.fp64_contents),
        DataType::Bytes => {
            let mut out = Vec::new();
            for entry in contents.bytes_contents {
                out.extend_from_slice(&(entry.len() as u32).to_le_bytes());
                out.extend_from_slice(&entry);
            }
            out
        }
        DataType::Fp16 | DataType::Bf16 => {
            return Err(TransportError::Unsupported(format!(
                "output {} is {} without raw contents",
                name, datatype
            )))
        }
    };

    Ok(bytes)
}

fn to_shape(name: &str, dims: &[i64]) -> Result<Vec<usize>, TransportError> {
    dims.iter()
        .map(|&d| {
            usize::try_from(d).map_err(|_| {
                TransportError::MalformedResponse(format!("output {} has dimension {}", name, d))
            })
        })
        .collect()
}

fn raw_metadata(response: proto::ModelMetadataResponse) -> RawModelMetadata {
    let lower = |t: proto::TensorMetadata| TensorMetadata {
        name: t.name,
        datatype: t.datatype,
        shape: t.shape,
    };

    RawModelMetadata {
        name: response.name,
        versions: response.versions,
        platform: response.platform,
        inputs: response.inputs.into_iter().map(lower).collect(),
        outputs: response.outputs.into_iter().map(lower).collect(),
    }
}

/// Codes that mean the request never reached a working model
fn is_transport_code(code: Code) -> bool {
    matches!(
        code,
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled | Code::Unknown
    )
}

fn transport_error(status: &Status) -> TransportError {
    match status.code() {
        Code::DeadlineExceeded | Code::Cancelled => TransportError::Timeout(status.message().to_string()),
        _ => TransportError::Connection(format!("{:?}: {}", status.code(), status.message())),
    }
}

fn resolution_error(endpoint: &str, model: &ModelRef, status: &Status) -> ResolutionError {
    let message = status.message().to_string();
    if status.code() == Code::NotFound || message.to_ascii_lowercase().contains("unknown model") {
        return ResolutionError::ModelNotFound {
            model: model.to_string(),
            reason: message,
        };
    }

    if is_transport_code(status.code()) {
        warn!("Metadata query to {} failed: {}", endpoint, message);
        ResolutionError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: format!("{:?}: {}", status.code(), message),
        }
    } else {
        ResolutionError::ModelNotFound {
            model: model.to_string(),
            reason: format!("{:?}: {}", status.code(), message),
        }
    }
}

fn invoke_error(model: &ModelRef, status: &Status) -> InvokeError {
    if is_transport_code(status.code()) {
        InvokeError::Transport(transport_error(status))
    } else {
        InvokeError::Server(ServerInferenceError {
            model: model.to_string(),
            status: format!("{:?}", status.code()),
            message: status.message().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binder::{bind, BindOptions, CallArgs};
    use signature::SignatureDescriptor;
    use tensor::TensorError;

    fn bound(values: Vec<Tensor>) -> BoundRequest {
        let inputs: Vec<SignatureDescriptor> = (0..values.len())
            .map(|i| SignatureDescriptor::from_metadata(format!("INPUT{}", i), DataType::Fp32, &[-1]))
            .collect();
        bind(
            &inputs,
            CallArgs::positional(values).resolve().unwrap(),
            BindOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_encode_uses_raw_contents() {
        let a = Tensor::from_vec(vec![2], vec![1.0f32, 2.0]).unwrap();
        let request = encode_request(
            &ModelRef::new("py_model").with_version("1"),
            bound(vec![a.clone()]),
            &["OUTPUT0".to_string()],
        )
        .unwrap();

        assert_eq!(request.model_name, "py_model");
        assert_eq!(request.model_version, "1");
        assert_eq!(request.inputs[0].datatype, "FP32");
        assert_eq!(request.inputs[0].shape, vec![2]);
        assert!(request.inputs[0].contents.is_none());
        assert_eq!(&request.raw_input_contents[0], a.data());
        assert_eq!(request.outputs[0].name, "OUTPUT0");
        assert!(!request.id.is_empty());
    }

    #[test]
    fn test_encode_rejects_datatype_mismatch() {
        let wrong = Tensor::from_vec(vec![1], vec![1i32]).unwrap();
        let err = encode_request(&ModelRef::new("m"), bound(vec![wrong]), &[]).unwrap_err();
        assert!(matches!(err, TransportError::DatatypeMismatch { .. }));
    }

    #[test]
    fn test_decode_raw_outputs() {
        let t = Tensor::from_vec(vec![2, 2], vec![1i64, 2, 3, 4]).unwrap();
        let response = proto::ModelInferResponse {
            outputs: vec![proto::InferOutputTensor {
                name: "OUTPUT0".to_string(),
                datatype: "INT64".to_string(),
                shape: vec![2, 2],
                contents: None,
            }],
            raw_output_contents: vec![t.data().clone()],
            ..Default::default()
        };

        let decoded = decode_response(response).unwrap();
        assert_eq!(decoded["OUTPUT0"], t);
    }

    #[test]
    fn test_decode_typed_contents() {
        let response = proto::ModelInferResponse {
            outputs: vec![
                proto::InferOutputTensor {
                    name: "small".to_string(),
                    datatype: "INT16".to_string(),
                    shape: vec![3],
                    contents: Some(proto::InferTensorContents {
                        int_contents: vec![-1, 0, 300],
                        ..Default::default()
                    }),
                },
                proto::InferOutputTensor {
                    name: "words".to_string(),
                    datatype: "BYTES".to_string(),
                    shape: vec![2],
                    contents: Some(proto::InferTensorContents {
                        bytes_contents: vec![b"ab".to_vec(), b"c".to_vec()],
                        ..Default::default()
                    }),
                },
            ],
            ..Default::default()
        };

        let decoded = decode_response(response).unwrap();
        assert_eq!(decoded["small"].to_vec::<i16>().unwrap(), vec![-1, 0, 300]);
        let words = decoded["words"].to_strings().unwrap();
        assert_eq!(words[0].as_ref(), b"ab");
        assert_eq!(words[1].as_ref(), b"c");
    }

    #[test]
    fn test_decode_rejects_out_of_range_narrowing() {
        let response = proto::ModelInferResponse {
            outputs: vec![proto::InferOutputTensor {
                name: "tiny".to_string(),
                datatype: "INT8".to_string(),
                shape: vec![1],
                contents: Some(proto::InferTensorContents {
                    int_contents: vec![1000],
                    ..Default::default()
                }),
            }],
            ..Default::default()
        };
        assert!(matches!(
            decode_response(response),
            Err(TransportError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_rejects_short_raw_buffer() {
        let response = proto::ModelInferResponse {
            outputs: vec![proto::InferOutputTensor {
                name: "OUTPUT0".to_string(),
                datatype: "FP32".to_string(),
                shape: vec![4],
                contents: None,
            }],
            raw_output_contents: vec![Bytes::from(vec![0u8; 8])],
            ..Default::default()
        };
        assert!(matches!(decode_response(response), Err(TransportError::Tensor(_))));
    }

    #[test]
    fn test_decode_rejects_overflowing_shape() {
        let response = proto::ModelInferResponse {
            outputs: vec![proto::InferOutputTensor {
                name: "OUTPUT0".to_string(),
                datatype: "FP32".to_string(),
                shape: vec![1 << 40, 1 << 40],
                contents: None,
            }],
            raw_output_contents: vec![Bytes::from(vec![0u8; 4])],
            ..Default::default()
        };
        assert!(matches!(
            decode_response(response),
            Err(TransportError::Tensor(TensorError::ShapeOverflow(_)))
        ));
    }

    #[test]
    fn test_status_classification() {
        let model = ModelRef::new("m");
        let unavailable = Status::unavailable("connection refused");
        assert!(matches!(
            invoke_error(&model, &unavailable),
            InvokeError::Transport(TransportError::Connection(_))
        ));

        let bad_input = Status::invalid_argument("unexpected shape for input 'INPUT0'");
        match invoke_error(&model, &bad_input) {
            InvokeError::Server(err) => {
                assert_eq!(err.status, "InvalidArgument");
                assert!(err.message.contains("INPUT0"));
            }
            other => panic!("expected server error, got {:?}", other),
        }

        let missing = Status::unavailable("Request for unknown model: 'm' is not found");
        assert!(matches!(
            resolution_error("http://localhost:8001", &model, &missing),
            ResolutionError::ModelNotFound { .. }
        ));
    }
}
