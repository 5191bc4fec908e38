//! Core runtime value types
//!
//! Primitive kinds and values that live inside object storage, type ids,
//! and `ObjectRef` handles that address objects inside a [`Heap`].
//!
//! [`Heap`]: crate::runtime::memory::Heap

use std::fmt;

/// Type ID for runtime type identification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Tag stored in object headers. Zero is reserved for "no object".
    pub(crate) fn header_tag(self) -> u32 {
        self.0 + 1
    }

    pub(crate) fn from_header_tag(tag: u32) -> Option<Self> {
        tag.checked_sub(1).map(TypeId)
    }
}

/// Primitive field and array element kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Size in bytes; primitives are naturally aligned so this is also the alignment.
    pub fn size(self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::I8 => 1,
            PrimitiveKind::I16 => 2,
            PrimitiveKind::I32 | PrimitiveKind::F32 => 4,
            PrimitiveKind::I64 | PrimitiveKind::F64 => 8,
        }
    }

    /// Short type descriptor used in layout dumps
    pub fn descriptor(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "Z",
            PrimitiveKind::I8 => "B",
            PrimitiveKind::I16 => "S",
            PrimitiveKind::I32 => "I",
            PrimitiveKind::I64 => "J",
            PrimitiveKind::F32 => "F",
            PrimitiveKind::F64 => "D",
        }
    }

    /// The all-zero value of this kind
    pub fn zero(self) -> Value {
        match self {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::I8 => Value::I8(0),
            PrimitiveKind::I16 => Value::I16(0),
            PrimitiveKind::I32 => Value::I32(0),
            PrimitiveKind::I64 => Value::I64(0),
            PrimitiveKind::F32 => Value::F32(0.0),
            PrimitiveKind::F64 => Value::F64(0.0),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
        };
        write!(f, "{}", name)
    }
}

/// Handle to an object living in a heap
///
/// The offset addresses the object's header. Embedded objects have their own
/// header at a fixed distance from their container's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Declared type of the object
    pub ty: TypeId,
    /// Byte offset of the object header in the heap
    pub offset: usize,
}

impl ObjectRef {
    pub fn new(
        ty: TypeId,
        offset: usize,
    ) -> Self {
        Self { ty, offset }
    }
}

/// A primitive value, or a reference passed as a constructor argument
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// Object reference; only valid as a constructor argument
    Ref(ObjectRef),
}

/// The kind of a value: a primitive, or a reference to an object of a given type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Primitive(PrimitiveKind),
    Ref(TypeId),
}

impl fmt::Display for ValueKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ValueKind::Primitive(kind) => write!(f, "{}", kind),
            ValueKind::Ref(ty) => write!(f, "ref #{}", ty.0),
        }
    }
}

impl From<PrimitiveKind> for ValueKind {
    fn from(kind: PrimitiveKind) -> Self {
        ValueKind::Primitive(kind)
    }
}

impl Value {
    /// Get the kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Primitive(PrimitiveKind::Bool),
            Value::I8(_) => ValueKind::Primitive(PrimitiveKind::I8),
            Value::I16(_) => ValueKind::Primitive(PrimitiveKind::I16),
            Value::I32(_) => ValueKind::Primitive(PrimitiveKind::I32),
            Value::I64(_) => ValueKind::Primitive(PrimitiveKind::I64),
            Value::F32(_) => ValueKind::Primitive(PrimitiveKind::F32),
            Value::F64(_) => ValueKind::Primitive(PrimitiveKind::F64),
            Value::Ref(obj) => ValueKind::Ref(obj.ty),
        }
    }

    /// Primitive kind, or `None` for references
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.kind() {
            ValueKind::Primitive(kind) => Some(kind),
            ValueKind::Ref(_) => None,
        }
    }

    /// Little-endian encoding of a primitive value
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        let bytes = match *self {
            Value::Bool(v) => vec![v as u8],
            Value::I8(v) => v.to_le_bytes().to_vec(),
            Value::I16(v) => v.to_le_bytes().to_vec(),
            Value::I32(v) => v.to_le_bytes().to_vec(),
            Value::I64(v) => v.to_le_bytes().to_vec(),
            Value::F32(v) => v.to_le_bytes().to_vec(),
            Value::F64(v) => v.to_le_bytes().to_vec(),
            Value::Ref(_) => return None,
        };
        Some(bytes)
    }

    /// Decode a primitive value. `bytes` must be exactly `kind.size()` long.
    pub fn from_bytes(
        kind: PrimitiveKind,
        bytes: &[u8],
    ) -> Option<Self> {
        if bytes.len() != kind.size() {
            return None;
        }
        let value = match kind {
            PrimitiveKind::Bool => Value::Bool(bytes[0] != 0),
            PrimitiveKind::I8 => Value::I8(i8::from_le_bytes(bytes.try_into().ok()?)),
            PrimitiveKind::I16 => Value::I16(i16::from_le_bytes(bytes.try_into().ok()?)),
            PrimitiveKind::I32 => Value::I32(i32::from_le_bytes(bytes.try_into().ok()?)),
            PrimitiveKind::I64 => Value::I64(i64::from_le_bytes(bytes.try_into().ok()?)),
            PrimitiveKind::F32 => Value::F32(f32::from_le_bytes(bytes.try_into().ok()?)),
            PrimitiveKind::F64 => Value::F64(f64::from_le_bytes(bytes.try_into().ok()?)),
        };
        Some(value)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Ref(obj) => Some(*obj),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Ref(obj) => write!(f, "@{}", obj.offset),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    ObjectRef => Ref,
}
