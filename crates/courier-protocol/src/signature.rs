//! Method signature indexing.
//!
//! Calls travel with a small integer instead of a method name and
//! parameter list. Every peer derives the integer on its own from the
//! interface's method set, so the mapping must be a pure function of that
//! set: methods are sorted by name, then parameter count, then parameter
//! type names lexicographically, and the index is the position in that
//! order.
//!
//! Peers are assumed to be built against the same version of each
//! interface. Nothing here can detect skew; a receiver only notices when
//! an index falls outside its own table.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MethodIndex, ProtocolError};

/// A method's name and ordered parameter type identifiers.
///
/// Type identifiers are plain strings agreed on by convention (`"i32"`,
/// `"String"`, `"PlayerId"`), not compiler type names, which are not
/// stable across builds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    name: String,
    params: Vec<String>,
}

impl MethodSignature {
    /// Creates a signature.
    pub fn new<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// The method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter type identifiers, in declaration order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    fn matches(&self, name: &str, params: &[&str]) -> bool {
        self.name == name
            && self.params.len() == params.len()
            && self.params.iter().zip(params).all(|(a, b)| a == b)
    }
}

impl Ord for MethodSignature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.params.len().cmp(&other.params.len()))
            .then_with(|| self.params.cmp(&other.params))
    }
}

impl PartialOrd for MethodSignature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// The canonically ordered method table of one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    name: String,
    methods: Vec<MethodSignature>,
}

impl InterfaceDescriptor {
    /// Starts building a descriptor for the interface called `name`.
    pub fn builder(name: impl Into<String>) -> InterfaceBuilder {
        InterfaceBuilder {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// The interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All methods, in canonical (index) order.
    pub fn methods(&self) -> &[MethodSignature] {
        &self.methods
    }

    /// Number of methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns `true` if the interface declares no methods.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Maps a method to its wire index.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownMethod`] if no method has this exact name
    /// and parameter list.
    pub fn index_of(&self, name: &str, params: &[&str]) -> Result<MethodIndex, ProtocolError> {
        self.methods
            .iter()
            .position(|m| m.matches(name, params))
            .map(|i| MethodIndex(i as u32))
            .ok_or_else(|| ProtocolError::UnknownMethod {
                interface: self.name.clone(),
                method: format!("{name}({})", params.join(", ")),
            })
    }

    /// Maps a wire index back to its method.
    ///
    /// # Errors
    /// [`ProtocolError::MethodIndexMismatch`] if the index is outside the
    /// table, which means the sender's interface differs from ours.
    pub fn method_at(&self, index: MethodIndex) -> Result<&MethodSignature, ProtocolError> {
        self.methods
            .get(index.0 as usize)
            .ok_or_else(|| ProtocolError::MethodIndexMismatch {
                interface: self.name.clone(),
                index: index.0,
                method_count: self.methods.len(),
            })
    }
}

/// Collects method signatures and produces an [`InterfaceDescriptor`].
///
/// Declaration order does not matter; `build` sorts.
///
/// ```rust
/// use courier_protocol::{InterfaceDescriptor, MethodIndex};
///
/// let calc = InterfaceDescriptor::builder("Calculator")
///     .method("mul", ["i32", "i32"])
///     .method("add", ["i32", "i32"])
///     .build();
///
/// assert_eq!(calc.index_of("add", &["i32", "i32"]).unwrap(), MethodIndex(0));
/// assert_eq!(calc.method_at(MethodIndex(1)).unwrap().name(), "mul");
/// ```
#[derive(Debug, Clone)]
pub struct InterfaceBuilder {
    name: String,
    methods: Vec<MethodSignature>,
}

impl InterfaceBuilder {
    /// Declares a method.
    pub fn method<I, S>(mut self, name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.push(MethodSignature::new(name, params));
        self
    }

    /// Sorts the methods into canonical order. Identical signatures
    /// declared twice collapse into one.
    pub fn build(mut self) -> InterfaceDescriptor {
        self.methods.sort();
        self.methods.dedup();
        InterfaceDescriptor {
            name: self.name,
            methods: self.methods,
        }
    }
}
