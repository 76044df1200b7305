//! In-process stub backends for integration tests
//!
//! The same models are served over HTTP/JSON (axum) and gRPC (tonic):
//! - `py_model`: OUTPUT0 = INPUT0 + INPUT1, OUTPUT1 = INPUT0 - INPUT1 (FP32[4])
//! - `identity`: echoes INPUT0 (FP32) and INPUT1 (INT64) of any shape
//! - `lossy`: declares two outputs but only returns OUTPUT0
//! - `faulty`: always fails inside the model

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tensor::{DataType, Tensor};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Status};
use transport::grpc::proto;
use transport::http::wire::{ErrorBody, InferRequestBody, InferResponseBody, JsonTensor};

struct Declared {
    name: &'static str,
    datatype: DataType,
    shape: &'static [i64],
}

struct ModelSpec {
    platform: &'static str,
    inputs: Vec<Declared>,
    outputs: Vec<Declared>,
}

fn io(name: &'static str, datatype: DataType, shape: &'static [i64]) -> Declared {
    Declared {
        name,
        datatype,
        shape,
    }
}

fn lookup(model: &str) -> Option<ModelSpec> {
    let spec = match model {
        "py_model" => ModelSpec {
            platform: "python",
            inputs: vec![io("INPUT0", DataType::Fp32, &[4]), io("INPUT1", DataType::Fp32, &[4])],
            outputs: vec![io("OUTPUT0", DataType::Fp32, &[4]), io("OUTPUT1", DataType::Fp32, &[4])],
        },
        "identity" => ModelSpec {
            platform: "onnxruntime_onnx",
            inputs: vec![
                io("INPUT0", DataType::Fp32, &[-1, -1]),
                io("INPUT1", DataType::Int64, &[-1]),
            ],
            outputs: vec![
                io("OUTPUT0", DataType::Fp32, &[-1, -1]),
                io("OUTPUT1", DataType::Int64, &[-1]),
            ],
        },
        "lossy" => ModelSpec {
            platform: "python",
            inputs: vec![io("INPUT0", DataType::Fp32, &[4])],
            outputs: vec![io("OUTPUT0", DataType::Fp32, &[4]), io("OUTPUT1", DataType::Fp32, &[4])],
        },
        "faulty" => ModelSpec {
            platform: "python",
            inputs: vec![io("INPUT0", DataType::Fp32, &[4])],
            outputs: vec![io("OUTPUT0", DataType::Fp32, &[4])],
        },
        _ => return None,
    };
    Some(spec)
}

fn unknown_model(model: &str) -> String {
    format!("Request for unknown model: '{}' is not found", model)
}

/// Shared model logic and call counters
#[derive(Default)]
pub struct Stub {
    pub metadata_calls: AtomicUsize,
    pub infer_calls: AtomicUsize,
}

impl Stub {
    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn infer_calls(&self) -> usize {
        self.infer_calls.load(Ordering::SeqCst)
    }

    fn execute(
        &self,
        model: &str,
        mut inputs: HashMap<String, Tensor>,
    ) -> Result<Vec<(String, Tensor)>, String> {
        self.infer_calls.fetch_add(1, Ordering::SeqCst);
        let spec = lookup(model).ok_or_else(|| unknown_model(model))?;

        for declared in &spec.inputs {
            let tensor = inputs
                .get(declared.name)
                .ok_or_else(|| format!("expected input {}", declared.name))?;
            if tensor.datatype() != declared.datatype {
                return Err(format!(
                    "input {} expects {}, got {}",
                    declared.name,
                    declared.datatype,
                    tensor.datatype()
                ));
            }
        }

        let mut take = |name: &str| inputs.remove(name).ok_or_else(|| format!("no {}", name));
        match model {
            "py_model" => {
                let a = take("INPUT0")?.to_array::<f32>().map_err(|e| e.to_string())?;
                let b = take("INPUT1")?.to_array::<f32>().map_err(|e| e.to_string())?;
                Ok(vec![
                    ("OUTPUT0".to_string(), Tensor::from_array(&(&a + &b))),
                    ("OUTPUT1".to_string(), Tensor::from_array(&(&a - &b))),
                ])
            }
            "identity" => Ok(vec![
                ("OUTPUT0".to_string(), take("INPUT0")?),
                ("OUTPUT1".to_string(), take("INPUT1")?),
            ]),
            "lossy" => Ok(vec![("OUTPUT0".to_string(), take("INPUT0")?)]),
            _ => Err("model raised an exception: division by zero".to_string()),
        }
    }

    fn metadata_json(&self, model: &str) -> Option<Value> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let spec = lookup(model)?;
        let tensors = |list: &[Declared]| -> Vec<Value> {
            list.iter()
                .map(|d| json!({"name": d.name, "datatype": d.datatype.as_str(), "shape": d.shape}))
                .collect()
        };
        Some(json!({
            "name": model,
            "versions": ["1"],
            "platform": spec.platform,
            "inputs": tensors(&spec.inputs),
            "outputs": tensors(&spec.outputs),
        }))
    }
}

// HTTP/JSON

async fn http_ready() -> StatusCode {
    StatusCode::OK
}

async fn http_metadata(State(stub): State<Arc<Stub>>, Path(model): Path<String>) -> Response {
    metadata_response(&stub, &model)
}

async fn http_metadata_version(
    State(stub): State<Arc<Stub>>,
    Path((model, _version)): Path<(String, String)>,
) -> Response {
    metadata_response(&stub, &model)
}

fn metadata_response(stub: &Stub, model: &str) -> Response {
    match stub.metadata_json(model) {
        Some(body) => Json(body).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: unknown_model(model),
            }),
        )
            .into_response(),
    }
}

async fn http_infer(
    State(stub): State<Arc<Stub>>,
    Path(model): Path<String>,
    Json(body): Json<InferRequestBody>,
) -> Response {
    infer_response(&stub, &model, body)
}

async fn http_infer_version(
    State(stub): State<Arc<Stub>>,
    Path((model, _version)): Path<(String, String)>,
    Json(body): Json<InferRequestBody>,
) -> Response {
    infer_response(&stub, &model, body)
}

fn infer_response(stub: &Stub, model: &str, body: InferRequestBody) -> Response {
    let result = body
        .inputs
        .iter()
        .map(|input| input.to_tensor().map(|t| (input.name.clone(), t)))
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(|e| e.to_string())
        .and_then(|inputs| stub.execute(model, inputs))
        .and_then(|outputs| {
            outputs
                .iter()
                .map(|(name, tensor)| JsonTensor::from_tensor(name.clone(), tensor))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())
        });

    match result {
        Ok(outputs) => Json(InferResponseBody {
            model_name: model.to_string(),
            model_version: Some("1".to_string()),
            id: body.id,
            outputs,
        })
        .into_response(),
        Err(error) => (StatusCode::BAD_REQUEST, Json(ErrorBody { error })).into_response(),
    }
}

/// Serve the stub over HTTP/JSON on an ephemeral port
pub async fn start_http(stub: Arc<Stub>) -> SocketAddr {
    let app = Router::new()
        .route("/v2/health/ready", get(http_ready))
        .route("/v2/models/:model", get(http_metadata))
        .route("/v2/models/:model/versions/:version", get(http_metadata_version))
        .route("/v2/models/:model/infer", post(http_infer))
        .route("/v2/models/:model/versions/:version/infer", post(http_infer_version))
        .with_state(stub);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    address
}

// gRPC

struct GrpcStub(Arc<Stub>);

#[tonic::async_trait]
impl proto::InferenceService for GrpcStub {
    async fn server_ready(
        &self,
        _request: Request<proto::ServerReadyRequest>,
    ) -> Result<tonic::Response<proto::ServerReadyResponse>, Status> {
        Ok(tonic::Response::new(proto::ServerReadyResponse { ready: true }))
    }

    async fn model_metadata(
        &self,
        request: Request<proto::ModelMetadataRequest>,
    ) -> Result<tonic::Response<proto::ModelMetadataResponse>, Status> {
        let model = request.into_inner().name;
        self.0.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let spec = lookup(&model).ok_or_else(|| Status::not_found(unknown_model(&model)))?;

        let tensors = |list: &[Declared]| -> Vec<proto::TensorMetadata> {
            list.iter()
                .map(|d| proto::TensorMetadata {
                    name: d.name.to_string(),
                    datatype: d.datatype.as_str().to_string(),
                    shape: d.shape.to_vec(),
                })
                .collect()
        };

        Ok(tonic::Response::new(proto::ModelMetadataResponse {
            name: model.clone(),
            versions: vec!["1".to_string()],
            platform: spec.platform.to_string(),
            inputs: tensors(&spec.inputs),
            outputs: tensors(&spec.outputs),
        }))
    }

    async fn model_infer(
        &self,
        request: Request<proto::ModelInferRequest>,
    ) -> Result<tonic::Response<proto::ModelInferResponse>, Status> {
        let request = request.into_inner();
        if request.inputs.len() != request.raw_input_contents.len() {
            return Err(Status::invalid_argument("expected raw contents for every input"));
        }

        let mut inputs = HashMap::new();
        for (input, raw) in request.inputs.iter().zip(request.raw_input_contents) {
            let datatype: DataType = input
                .datatype
                .parse()
                .map_err(|_| Status::invalid_argument(format!("bad datatype {}", input.datatype)))?;
            let shape = input.shape.iter().map(|&d| d as usize).collect();
            let tensor = Tensor::from_raw(datatype, shape, raw)
                .map_err(|e| Status::invalid_argument(e.to_string()))?;
            inputs.insert(input.name.clone(), tensor);
        }

        let outputs = self
            .0
            .execute(&request.model_name, inputs)
            .map_err(Status::invalid_argument)?;

        let mut response = proto::ModelInferResponse {
            model_name: request.model_name,
            model_version: "1".to_string(),
            id: request.id,
            ..Default::default()
        };
        for (name, tensor) in outputs {
            response.outputs.push(proto::InferOutputTensor {
                name,
                datatype: tensor.datatype().as_str().to_string(),
                shape: tensor.shape().iter().map(|&d| d as i64).collect(),
                contents: None,
            });
            response.raw_output_contents.push(tensor.into_data());
        }
        Ok(tonic::Response::new(response))
    }
}

/// Serve the stub over gRPC on an ephemeral port
pub async fn start_grpc(stub: Arc<Stub>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(proto::InferenceServiceServer::new(GrpcStub(stub)))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    address
}
