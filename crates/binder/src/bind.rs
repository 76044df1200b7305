//! Argument Binding

use crate::{Arguments, BindingError};
use serde::{Deserialize, Serialize};
use signature::SignatureDescriptor;
use std::collections::HashMap;
use tensor::{DataType, Tensor};
use tracing::debug;

/// Binding behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindOptions {
    /// Reject datatype or shape mismatches here instead of leaving them to
    /// the transport and the backend
    pub strict: bool,
}

impl BindOptions {
    /// Validate datatype and shape at bind time
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// One bound argument, tagged with its declared datatype
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    /// Input name
    pub name: String,
    /// Datatype declared by the model signature
    pub datatype: DataType,
    /// Caller's tensor, as supplied
    pub tensor: Tensor,
}

impl Placeholder {
    /// Runtime shape of the bound argument
    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    /// Check if the argument's elements are of the declared datatype
    pub fn datatype_matches(&self) -> bool {
        self.tensor.datatype() == self.datatype
    }
}

/// One placeholder per declared input, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct BoundRequest {
    placeholders: Vec<Placeholder>,
}

impl BoundRequest {
    /// Placeholders in declaration order
    ///
    /// ```
    /// use binder::{bind, BindOptions, CallArgs};
    /// use signature::{DataType, SignatureDescriptor};
    /// use tensor::Tensor;
    ///
    /// let inputs = vec![
    ///     SignatureDescriptor::from_metadata("a", DataType::Int32, &[2]),
    ///     SignatureDescriptor::from_metadata("b", DataType::Int32, &[2]),
    /// ];
    /// let x = Tensor::from_vec(vec![2], vec![1i32, 2]).unwrap();
    /// let y = Tensor::from_vec(vec![2], vec![3i32, 4]).unwrap();
    /// let args = CallArgs::named([("b", y), ("a", x)]).resolve().unwrap();
    ///
    /// let request = bind(&inputs, args, BindOptions::default()).unwrap();
    /// assert_eq!(request.len(), 2);
    /// assert_eq!(request.placeholders()[0].name, "a");
    /// assert_eq!(request.into_placeholders()[1].name, "b");
    /// ```
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Take the placeholders, in declaration order
    pub fn into_placeholders(self) -> Vec<Placeholder> {
        self.placeholders
    }

    /// Look up a placeholder by input name
    pub fn get(&self, name: &str) -> Option<&Placeholder> {
        self.placeholders.iter().find(|p| p.name == name)
    }

    /// Number of declared inputs bound
    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    /// True for a model that declares no inputs
    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Total payload size in bytes
    pub fn byte_len(&self) -> usize {
        self.placeholders.iter().map(|p| p.tensor.byte_len()).sum()
    }
}

/// Bind arguments to declared inputs
///
/// Positional argument `i` binds to `inputs[i]`. Named arguments bind by
/// exact name. The result is always in declaration order.
pub fn bind(
    inputs: &[SignatureDescriptor],
    arguments: Arguments,
    options: BindOptions,
) -> Result<BoundRequest, BindingError> {
    if arguments.len() != inputs.len() {
        return Err(BindingError::ArityMismatch {
            expected: inputs.len(),
            actual: arguments.len(),
        });
    }

    let pairs: Vec<(&SignatureDescriptor, Tensor)> = match arguments {
        Arguments::Positional(values) => inputs.iter().zip(values).collect(),
        Arguments::Named(values) => {
            let mut by_name: HashMap<String, Tensor> = HashMap::with_capacity(values.len());
            for (name, value) in values {
                if !inputs.iter().any(|d| d.name == name) {
                    return Err(BindingError::UnknownInput(name));
                }
                by_name.insert(name, value);
            }

            let mut pairs = Vec::with_capacity(inputs.len());
            for desc in inputs {
                let value = by_name
                    .remove(&desc.name)
                    .ok_or_else(|| BindingError::MissingInput(desc.name.clone()))?;
                pairs.push((desc, value));
            }
            pairs
        }
    };

    let mut placeholders = Vec::with_capacity(pairs.len());
    for (desc, tensor) in pairs {
        if options.strict {
            check_strict(desc, &tensor)?;
        }
        placeholders.push(Placeholder {
            name: desc.name.clone(),
            datatype: desc.datatype,
            tensor,
        });
    }

    let request = BoundRequest { placeholders };
    debug!(
        "Bound {} inputs ({} bytes)",
        request.len(),
        request.byte_len()
    );
    Ok(request)
}

fn check_strict(desc: &SignatureDescriptor, tensor: &Tensor) -> Result<(), BindingError> {
    if tensor.datatype() != desc.datatype {
        return Err(BindingError::DatatypeMismatch {
            name: desc.name.clone(),
            expected: desc.datatype,
            actual: tensor.datatype(),
        });
    }
    if !desc.accepts_shape(tensor.shape()) {
        return Err(BindingError::ShapeMismatch {
            name: desc.name.clone(),
            expected: desc.shape.clone(),
            actual: tensor.shape().to_vec(),
        });
    }
    Ok(())
}
