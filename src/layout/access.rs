//! Path-based field access and dead reckoning
//!
//! A path names a field relative to an object: `l.p1.x`, `values[3]`,
//! `points[2].y`. Inline slots contribute a constant offset, so a path made
//! only of inline slots and primitive fields can be resolved against the type
//! alone ([`TypeSystem::dead_reckon`]). Paths through out-of-line slots need
//! the heap to follow handles.

use super::{FieldLayout, LayoutError, TypeKind, TypeSystem};
use crate::model::{Placement, SlotModel};
use crate::runtime::memory::{align_up, Heap, ARRAY_HEADER_SIZE, HEADER_SIZE, WORD_SIZE};
use crate::runtime::value::{ObjectRef, PrimitiveKind, TypeId, Value};
use std::fmt::Write as _;

/// What a path ends at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPlace {
    /// An object (struct, or embedded array)
    Object(ObjectRef),
    /// A primitive field or array element
    Primitive { offset: usize, kind: PrimitiveKind },
}

impl PathPlace {
    pub fn offset(&self) -> usize {
        match self {
            PathPlace::Object(obj) => obj.offset,
            PathPlace::Primitive { offset, .. } => *offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step<'p> {
    Field(&'p str),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Step<'_>>, LayoutError> {
    let bad = || LayoutError::BadPath {
        path: path.to_string(),
    };
    let mut steps = Vec::new();
    if path.is_empty() {
        return Ok(steps);
    }

    for segment in path.split('.') {
        let (name, mut rest) = match segment.find('[') {
            Some(pos) => segment.split_at(pos),
            None => (segment, ""),
        };
        if name.is_empty() && (rest.is_empty() || !steps.is_empty()) {
            return Err(bad());
        }
        if !name.is_empty() {
            if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(bad());
            }
            steps.push(Step::Field(name));
        }
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(bad)?;
            let index = rest[1..close].parse::<usize>().map_err(|_| bad())?;
            steps.push(Step::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(bad());
            }
        }
    }
    Ok(steps)
}

/// Position reached while walking a path
#[derive(Debug, Clone, Copy)]
enum Cursor {
    Object {
        ty: TypeId,
        offset: usize,
        /// Array length as declared by the slot the walk came through
        length: Option<usize>,
    },
    Primitive {
        offset: usize,
        kind: PrimitiveKind,
    },
}

impl TypeSystem {
    fn walk(
        &self,
        heap: Option<&Heap>,
        start: ObjectRef,
        path: &str,
    ) -> Result<Cursor, LayoutError> {
        let mut cursor = Cursor::Object {
            ty: start.ty,
            offset: start.offset,
            length: None,
        };

        for step in parse_path(path)? {
            cursor = match (cursor, step) {
                (Cursor::Object { ty, offset, .. }, Step::Field(name)) => {
                    self.step_field(heap, ty, offset, name)?
                }
                (Cursor::Object { ty, offset, length }, Step::Index(index)) => {
                    self.step_index(heap, ty, offset, length, index, path)?
                }
                (Cursor::Primitive { kind, .. }, Step::Field(name)) => {
                    return Err(LayoutError::UnknownField {
                        ty: kind.to_string(),
                        field: name.to_string(),
                    })
                }
                (Cursor::Primitive { .. }, Step::Index(_)) => {
                    return Err(LayoutError::NotAnArray {
                        path: path.to_string(),
                    })
                }
            };
        }
        Ok(cursor)
    }

    fn step_field(
        &self,
        heap: Option<&Heap>,
        ty: TypeId,
        offset: usize,
        name: &str,
    ) -> Result<Cursor, LayoutError> {
        let layout = self.struct_layout(ty)?;
        let field = layout
            .fields
            .get(name)
            .ok_or_else(|| LayoutError::UnknownField {
                ty: self.type_name(ty).to_string(),
                field: name.to_string(),
            })?;

        let model = match field {
            FieldLayout::Primitive {
                offset: field_offset,
                kind,
            } => {
                return Ok(Cursor::Primitive {
                    offset: offset + field_offset,
                    kind: *kind,
                })
            }
            FieldLayout::Slot(model) => model,
        };

        let length = model
            .primitive_array_model()
            .map(|shape| shape.length())
            .or_else(|| model.structured_array_model().map(|shape| shape.length()));
        let slot_offset = offset + model.location().offset;
        let target = match model.placement() {
            Placement::Inline { .. } => slot_offset,
            Placement::OutOfLine => {
                let heap = heap.ok_or_else(|| LayoutError::NotInline {
                    slot: model.qualified_name().to_string(),
                })?;
                heap.handle(slot_offset)?
                    .ok_or_else(|| LayoutError::NotConstructed {
                        slot: model.qualified_name().to_string(),
                    })?
            }
        };
        Ok(Cursor::Object {
            ty: model.element_type(),
            offset: target,
            length,
        })
    }

    fn step_index(
        &self,
        heap: Option<&Heap>,
        ty: TypeId,
        offset: usize,
        declared_length: Option<usize>,
        index: usize,
        path: &str,
    ) -> Result<Cursor, LayoutError> {
        let check = || {
            let length = match heap {
                Some(heap) => heap.array_length(offset)?,
                None => declared_length.ok_or_else(|| LayoutError::BadPath {
                    path: path.to_string(),
                })?,
            };
            if index < length {
                Ok(())
            } else {
                Err(LayoutError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    length,
                })
            }
        };

        match self.kind(ty) {
            Some(TypeKind::PrimitiveArray { element }) => {
                check()?;
                Ok(Cursor::Primitive {
                    offset: offset + ARRAY_HEADER_SIZE + index * element.size(),
                    kind: *element,
                })
            }
            Some(TypeKind::StructuredArray { element }) => {
                check()?;
                let stride = self.struct_layout(*element)?.instance_size;
                Ok(Cursor::Object {
                    ty: *element,
                    offset: offset + ARRAY_HEADER_SIZE + index * stride,
                    length: None,
                })
            }
            Some(TypeKind::Struct(_)) => Err(LayoutError::NotAnArray {
                path: path.to_string(),
            }),
            None => Err(LayoutError::UnknownTypeId(ty)),
        }
    }

    /// Offset of `path` from the header of a `ty` instance, computed from
    /// the layout alone.
    ///
    /// Fails with `NotInline` if the path crosses an out-of-line slot.
    pub fn dead_reckon(
        &self,
        ty: TypeId,
        path: &str,
    ) -> Result<usize, LayoutError> {
        match self.walk(None, ObjectRef::new(ty, 0), path)? {
            Cursor::Object { offset, .. } | Cursor::Primitive { offset, .. } => Ok(offset),
        }
    }

    /// Locate `path` inside the live object `obj`
    pub fn place(
        &self,
        heap: &Heap,
        obj: ObjectRef,
        path: &str,
    ) -> Result<PathPlace, LayoutError> {
        Ok(match self.walk(Some(heap), obj, path)? {
            Cursor::Object { ty, offset, .. } => PathPlace::Object(ObjectRef::new(ty, offset)),
            Cursor::Primitive { offset, kind } => PathPlace::Primitive { offset, kind },
        })
    }

    /// Read the primitive at `path`
    pub fn read(
        &self,
        heap: &Heap,
        obj: ObjectRef,
        path: &str,
    ) -> Result<Value, LayoutError> {
        match self.place(heap, obj, path)? {
            PathPlace::Primitive { offset, kind } => Ok(heap.read_value(offset, kind)?),
            PathPlace::Object(_) => Err(LayoutError::NotAPrimitive {
                path: path.to_string(),
            }),
        }
    }

    /// Write the primitive at `path`; the value must be of the field's kind
    pub fn write(
        &self,
        heap: &mut Heap,
        obj: ObjectRef,
        path: &str,
        value: Value,
    ) -> Result<(), LayoutError> {
        match self.place(heap, obj, path)? {
            PathPlace::Primitive { offset, kind } => {
                if value.primitive_kind() != Some(kind) {
                    return Err(LayoutError::KindMismatch {
                        path: path.to_string(),
                        expected: kind,
                        found: value.kind(),
                    });
                }
                Ok(heap.write_value(offset, value)?)
            }
            PathPlace::Object(_) => Err(LayoutError::NotAPrimitive {
                path: path.to_string(),
            }),
        }
    }

    /// Handle of the sub-object at `path`
    pub fn resolve(
        &self,
        heap: &Heap,
        obj: ObjectRef,
        path: &str,
    ) -> Result<ObjectRef, LayoutError> {
        match self.place(heap, obj, path)? {
            PathPlace::Object(obj) => Ok(obj),
            PathPlace::Primitive { .. } => Err(LayoutError::NotAnObject {
                path: path.to_string(),
            }),
        }
    }

    /// Render the field layout of struct `ty`
    pub fn print_field_layout(
        &self,
        ty: TypeId,
    ) -> Result<String, LayoutError> {
        let layout = self.struct_layout(ty)?;
        let intrinsic_start = align_up(layout.instance_fields_end, WORD_SIZE);

        let mut out = String::new();
        let _ = writeln!(out, "{}: field layout", self.type_name(ty));
        let _ = writeln!(out, "  @{:>3} --- object header ---", 0);
        let _ = writeln!(out, "  @{:>3} --- instance fields start ---", HEADER_SIZE);

        let mut inline = Vec::new();
        let mut out_of_line = Vec::new();
        for (name, field) in &layout.fields {
            match field {
                FieldLayout::Primitive { offset, kind } => {
                    let _ = writeln!(out, "  @{:>3} {:?} {}", offset, name, kind.descriptor());
                }
                FieldLayout::Slot(model) => match model.placement() {
                    Placement::Inline { size } => inline.push((name, model, size)),
                    Placement::OutOfLine => out_of_line.push((name, model)),
                },
            }
        }
        for (name, model) in out_of_line {
            let _ = writeln!(
                out,
                "  @{:>3} {:?} {} (out-of-line)",
                model.location().offset,
                name,
                self.slot_descriptor(model),
            );
        }
        let _ = writeln!(
            out,
            "  @{:>3} --- instance fields end ---",
            layout.instance_fields_end
        );
        let _ = writeln!(out, "  @{:>3} --- intrinsic fields start ---", intrinsic_start);
        for (name, model, size) in inline {
            let _ = writeln!(
                out,
                "  @{:>3} {:?} {} (inline, {} bytes)",
                model.location().offset,
                name,
                self.slot_descriptor(model),
                size,
            );
        }
        let _ = writeln!(
            out,
            "  @{:>3} --- intrinsic fields end ---",
            layout.instance_size
        );
        let _ = writeln!(out, "  @{:>3} --- instance ends ---", layout.instance_size);
        Ok(out)
    }

    fn slot_descriptor(
        &self,
        model: &SlotModel,
    ) -> String {
        if let Some(shape) = model.primitive_array_model() {
            format!("[{}; {}", shape.element().descriptor(), shape.length())
        } else if let Some(shape) = model.structured_array_model() {
            format!(
                "[L{}; {}",
                self.type_name(shape.element_class()),
                shape.length()
            )
        } else {
            format!("L{};", self.type_name(model.element_type()))
        }
    }
}
