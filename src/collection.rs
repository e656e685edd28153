use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::diagnostics::{nearest_key, Warning};
use crate::error::{ParameterError, Result};
use crate::parser::Loader;
use crate::value::{self, FromValue, Value};

/// Index into a collection's list of axes.
pub type AxisId = usize;

/// The alternatives bound to one key, varying along one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiValue {
    pub axis: AxisId,
    pub values: Vec<Value>,
}

impl MultiValue {
    pub fn new(axis: AxisId, values: Vec<Value>) -> Self {
        MultiValue { axis, values }
    }
}

/// A parameter space: every key with its alternatives, the size of each
/// axis and which offset is currently selected on each axis.
///
/// Keys sharing an axis vary in lockstep. Every combination of axis offsets
/// is one point of the sweep; [`Collection::set_current_collection`] picks a
/// point by its linear index.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    values: BTreeMap<String, MultiValue>,
    axes: Vec<usize>,
    selection: Vec<usize>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration file into this collection. Relative imports
    /// resolve against the directory of the importing file.
    pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<Warning>> {
        let mut loader = Loader::new(self, Path::new(""));
        loader.load_file(path.as_ref())?;
        Ok(loader.into_warnings())
    }

    /// Parse configuration text into this collection. Relative imports
    /// resolve against `base_dir`.
    pub fn read_from_str(&mut self, source: &str, base_dir: impl AsRef<Path>) -> Result<Vec<Warning>> {
        let mut loader = Loader::new(self, base_dir.as_ref());
        loader.parse_source(source, "<input>")?;
        Ok(loader.into_warnings())
    }

    /// Allocate a new axis of `size` alternatives with offset 0 selected.
    /// A size of zero is treated as one.
    pub fn add_axis(&mut self, size: usize) -> AxisId {
        self.axes.push(size.max(1));
        self.selection.push(0);
        let axis = self.axes.len() - 1;
        tracing::debug!(axis, size, "allocated axis");
        axis
    }

    /// Bind `key` to `multi_value`, replacing any earlier binding. Returns
    /// whether the key was already defined.
    ///
    /// When the replaced binding leaves its old axis without keys, that axis
    /// is collapsed to size 1 so it no longer multiplies the sweep.
    pub fn set_key_value(&mut self, key: &str, multi_value: MultiValue) -> Result<bool> {
        let size = *self
            .axes
            .get(multi_value.axis)
            .ok_or_else(|| ParameterError::UnknownAxis {
                key: key.to_string(),
                axis: multi_value.axis,
            })?;
        if multi_value.values.len() != size {
            return Err(ParameterError::AxisMismatch {
                key: key.to_string(),
                axis: multi_value.axis,
                expected: size,
                found: multi_value.values.len(),
            });
        }

        let new_axis = multi_value.axis;
        match self.values.insert(key.to_string(), multi_value) {
            Some(old) => {
                if old.axis != new_axis && !self.axis_in_use(old.axis) {
                    self.neutralize_axis(old.axis);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Add one more alternative to an existing key, growing its axis.
    pub fn append_value(&mut self, key: &str, value: Value) -> Result<()> {
        let axis = match self.values.get(key) {
            Some(multi_value) => multi_value.axis,
            None => {
                return Err(ParameterError::UndefinedKey {
                    key: key.to_string(),
                })
            }
        };
        if self
            .values
            .iter()
            .any(|(other, multi_value)| other != key && multi_value.axis == axis)
        {
            return Err(ParameterError::SharedAxis {
                key: key.to_string(),
            });
        }

        let grown = self.axes[axis] + 1;
        if self.size_with_axis(axis, grown).is_none() {
            return Err(ParameterError::TooManyCombinations {
                key: key.to_string(),
            });
        }

        if let Some(multi_value) = self.values.get_mut(key) {
            multi_value.values.push(value);
            self.axes[axis] = multi_value.values.len();
        }
        Ok(())
    }

    fn axis_in_use(&self, axis: AxisId) -> bool {
        self.values.values().any(|multi_value| multi_value.axis == axis)
    }

    fn neutralize_axis(&mut self, axis: AxisId) {
        self.axes[axis] = 1;
        self.selection[axis] = 0;
    }

    /// Number of combinations: the product of all axis sizes.
    ///
    /// Loading and [`Collection::append_value`] refuse to grow the space
    /// past `usize::MAX` combinations. Axes allocated directly through
    /// [`Collection::add_axis`] are not checked; for those the size
    /// saturates at `usize::MAX` and [`Collection::checked_collection_size`]
    /// returns `None`.
    pub fn get_collection_size(&self) -> usize {
        self.checked_collection_size().unwrap_or(usize::MAX)
    }

    /// Number of combinations, or `None` if the product overflows `usize`.
    pub fn checked_collection_size(&self) -> Option<usize> {
        self.axes
            .iter()
            .try_fold(1usize, |acc, size| acc.checked_mul(*size))
    }

    /// The collection size if `axis` had `size` alternatives. Passing an
    /// axis id one past the last adds a new axis to the product.
    pub(crate) fn size_with_axis(&self, axis: AxisId, size: usize) -> Option<usize> {
        let others = self
            .axes
            .iter()
            .enumerate()
            .filter(|(id, _)| *id != axis)
            .try_fold(1usize, |acc, (_, axis_size)| acc.checked_mul(*axis_size))?;
        others.checked_mul(size.max(1))
    }

    /// Select combination `index`. Axis 0 varies slowest and the last axis
    /// fastest, the order a loop nest over the axes would enumerate them.
    pub fn set_current_collection(&mut self, index: usize) -> Result<()> {
        let size = self.get_collection_size();
        if index >= size {
            return Err(ParameterError::IndexOutOfRange { index, size });
        }

        let mut rest = index;
        for (offset, axis_size) in self.selection.iter_mut().zip(&self.axes).rev() {
            *offset = rest % axis_size;
            rest /= axis_size;
        }
        tracing::trace!(index, selection = ?self.selection, "selected combination");
        Ok(())
    }

    /// The unevaluated alternative currently selected for `key`.
    pub fn get_basic_value(&self, key: &str) -> Result<&Value> {
        match self.values.get(key) {
            Some(multi_value) => Ok(&multi_value.values[self.selection[multi_value.axis]]),
            None => Err(self.key_not_found(key)),
        }
    }

    /// Evaluate `key` at the current selection and convert it to `T`.
    pub fn get_value<T: FromValue>(&self, key: &str) -> Result<T> {
        let value = value::evaluate_key(self, key)?;
        let actual = value.kind();
        T::from_value(value).ok_or_else(|| ParameterError::TypeMismatch {
            key: key.to_string(),
            expected: T::KIND,
            actual,
        })
    }

    /// Evaluate `key` to an enum token and map it through `token_map`.
    ///
    /// ```
    /// use parameter_rust::collection::Collection;
    ///
    /// #[derive(Debug, Clone, PartialEq)]
    /// enum Boundary { Neumann, Dirichlet }
    ///
    /// let mut collection = Collection::new();
    /// collection.read_from_str("left = #dirichlet", ".").unwrap();
    /// let map = [("neumann", Boundary::Neumann), ("dirichlet", Boundary::Dirichlet)];
    /// assert_eq!(collection.get_enum_value("left", &map).unwrap(), Boundary::Dirichlet);
    /// ```
    pub fn get_enum_value<E: Clone>(&self, key: &str, token_map: &[(&str, E)]) -> Result<E> {
        let value = value::evaluate_key(self, key)?;
        let token = match value {
            Value::EnumToken(token) => token,
            other => {
                return Err(ParameterError::TypeMismatch {
                    key: key.to_string(),
                    expected: crate::value::ValueKind::EnumToken,
                    actual: other.kind(),
                })
            }
        };

        token_map
            .iter()
            .find(|(name, _)| *name == token)
            .map(|(_, mapped)| mapped.clone())
            .ok_or_else(|| ParameterError::InvalidEnumToken {
                key: key.to_string(),
                token,
                accepted: token_map.iter().map(|(name, _)| name.to_string()).collect(),
            })
    }

    /// Write every key with its declared type and evaluated value, one per
    /// line, in key order.
    pub fn print_key_values<W: Write>(&self, sink: &mut W) -> Result<()> {
        for (key, multi_value) in &self.values {
            let declared = &multi_value.values[self.selection[multi_value.axis]];
            let evaluated = value::evaluate_key(self, key)?;
            writeln!(
                sink,
                "key {} with {} value: {}",
                key,
                declared.kind(),
                evaluated.print()
            )?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.axes.clear();
        self.selection.clear();
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_multi_value(&self, key: &str) -> Option<&MultiValue> {
        self.values.get(key)
    }

    /// Keys in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn axis_sizes(&self) -> &[usize] {
        &self.axes
    }

    pub fn current_selection(&self) -> &[usize] {
        &self.selection
    }

    fn key_not_found(&self, key: &str) -> ParameterError {
        ParameterError::KeyNotFound {
            key: key.to_string(),
            suggestion: nearest_key(key, self.keys()).map(str::to_string),
        }
    }
}
