//! Utilities for working with containers with strongly-typed indexes.

/// A `Vec` that can only be indexed by the given type
#[derive(Clone, Debug, Default)]
pub struct IndexVec<Value, Index> {
    data: Vec<Value>,
    _phantom: std::marker::PhantomData<fn(Index) -> Index>,
}

impl<Value, Index> IndexVec<Value, Index>
where
    usize: From<Index>,
{
    pub fn new() -> Self {
        Vec::new().into()
    }

    pub fn get(&self, i: Index) -> Option<&Value> {
        self.data.get(usize::from(i))
    }

    /// Grows the container to `len` entries, filling with default values.
    ///
    /// Does nothing if the container is already at least `len` long.
    pub fn grow(&mut self, len: usize)
    where
        Value: Default,
    {
        if len > self.data.len() {
            self.data.resize_with(len, Default::default);
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.data.iter_mut()
    }
}

impl<Value, Index> std::ops::Index<Index> for IndexVec<Value, Index>
where
    usize: From<Index>,
{
    type Output = Value;
    fn index(&self, i: Index) -> &Value {
        &self.data[usize::from(i)]
    }
}

impl<Value, Index> std::ops::IndexMut<Index> for IndexVec<Value, Index>
where
    usize: From<Index>,
{
    fn index_mut(&mut self, i: Index) -> &mut Value {
        &mut self.data[usize::from(i)]
    }
}

impl<Value, Index> From<Vec<Value>> for IndexVec<Value, Index> {
    fn from(data: Vec<Value>) -> Self {
        Self {
            data,
            _phantom: std::marker::PhantomData,
        }
    }
}

macro_rules! define_index {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub(crate) usize);
        impl From<usize> for $name {
            fn from(v: usize) -> Self {
                Self(v)
            }
        }
        impl From<$name> for usize {
            fn from(v: $name) -> Self {
                v.0
            }
        }
    };
}
pub(crate) use define_index;
