//! Call Arguments

use crate::BindingError;
use std::collections::HashSet;
use tensor::Tensor;

/// Arguments as a caller supplied them
///
/// Both lists may be filled while building; [`CallArgs::resolve`] decides
/// which kind of call this is.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Tensor>,
    named: Vec<(String, Tensor)>,
}

impl CallArgs {
    /// Create an empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional arguments in declared input order
    pub fn positional(values: impl IntoIterator<Item = Tensor>) -> Self {
        Self {
            positional: values.into_iter().collect(),
            named: Vec::new(),
        }
    }

    /// Arguments keyed by input name
    pub fn named<K: Into<String>>(values: impl IntoIterator<Item = (K, Tensor)>) -> Self {
        Self {
            positional: Vec::new(),
            named: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: Tensor) -> Self {
        self.positional.push(value);
        self
    }

    /// Append a named argument
    pub fn kwarg(mut self, name: impl Into<String>, value: Tensor) -> Self {
        self.named.push((name.into(), value));
        self
    }

    /// Collapse into a positional or named call
    pub fn resolve(self) -> Result<Arguments, BindingError> {
        match (self.positional.is_empty(), self.named.is_empty()) {
            (true, true) => Err(BindingError::MissingArguments),
            (false, false) => Err(BindingError::AmbiguousArguments {
                positional: self.positional.len(),
                named: self.named.len(),
            }),
            (false, true) => Ok(Arguments::Positional(self.positional)),
            (true, false) => {
                let mut seen = HashSet::with_capacity(self.named.len());
                for (name, _) in &self.named {
                    if !seen.insert(name.as_str()) {
                        return Err(BindingError::DuplicateInput(name.clone()));
                    }
                }
                Ok(Arguments::Named(self.named))
            }
        }
    }
}

impl From<Vec<Tensor>> for CallArgs {
    fn from(values: Vec<Tensor>) -> Self {
        CallArgs::positional(values)
    }
}

impl From<Vec<(String, Tensor)>> for CallArgs {
    fn from(values: Vec<(String, Tensor)>) -> Self {
        CallArgs::named(values)
    }
}

/// A call that is known to be either positional or named
#[derive(Debug, Clone, PartialEq)]
pub enum Arguments {
    /// Values in declared input order
    Positional(Vec<Tensor>),
    /// Names are unique; order is as supplied
    Named(Vec<(String, Tensor)>),
}

impl Arguments {
    /// Number of supplied arguments
    pub fn len(&self) -> usize {
        match self {
            Arguments::Positional(values) => values.len(),
            Arguments::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Separate names (for named calls) from values, keeping order
    pub fn into_parts(self) -> (Option<Vec<String>>, Vec<Tensor>) {
        match self {
            Arguments::Positional(values) => (None, values),
            Arguments::Named(values) => {
                let (names, values) = values.into_iter().unzip();
                (Some(names), values)
            }
        }
    }

    /// Inverse of [`Arguments::into_parts`]; extra names or values are dropped
    pub fn from_parts(names: Option<Vec<String>>, values: Vec<Tensor>) -> Self {
        match names {
            None => Arguments::Positional(values),
            Some(names) => Arguments::Named(names.into_iter().zip(values).collect()),
        }
    }
}
