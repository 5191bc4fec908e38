//! The layout pass
//!
//! Structs are laid out depth first in declaration order. A slot is inlined
//! when the size of what it embeds is known; a slot that leads back to a type
//! whose layout is still in progress (an embedding cycle) cannot have a finite
//! inline size and is stored out-of-line instead. Whether such a cycle is
//! actually legal is decided at construction time by the cycle guard.

use super::{
    FieldDecl, FieldLayout, LayoutConfig, LayoutError, SlotShape, StructLayout, TypeDecl,
    TypeInfo, TypeKind, TypeRegistry, TypeSystem,
};
use crate::construct::{Constructor, EmbedError, InvalidModelReason};
use crate::model::{Placement, PrimitiveArrayModel, SlotLocation, SlotModel, StructuredArrayModel};
use crate::runtime::memory::{align_up, checked_align_up, HEADER_SIZE, WORD_SIZE};
use crate::runtime::value::{PrimitiveKind, TypeId};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::debug;

enum Resolved {
    Struct(Vec<ResolvedField>),
    PrimitiveArray { element: PrimitiveKind },
    StructuredArray { element: TypeId },
}

enum ResolvedField {
    Primitive {
        name: String,
        kind: PrimitiveKind,
    },
    Slot {
        name: String,
        target: TypeId,
        shape: SlotShape,
    },
}

#[derive(Clone, Copy)]
enum Visit {
    Unvisited,
    Visiting,
    Done(usize),
}

struct SlotPlan {
    primitive: Option<PrimitiveArrayModel>,
    structured: Option<StructuredArrayModel>,
    inline_size: Option<usize>,
}

struct Layouter<'r> {
    names: &'r [String],
    resolved: &'r [Resolved],
    optimize: bool,
    state: Vec<Visit>,
    layouts: Vec<Option<StructLayout>>,
}

pub(super) fn finalize(
    registry: TypeRegistry,
    config: &LayoutConfig,
) -> Result<TypeSystem, LayoutError> {
    let TypeRegistry {
        names,
        decls,
        constructors,
        mut defaults,
    } = registry;
    let type_names: Vec<String> = names.keys().cloned().collect();

    let resolve_name = |name: &str| {
        names
            .get(name)
            .copied()
            .ok_or_else(|| LayoutError::UnknownType {
                name: name.to_string(),
            })
    };

    let mut resolved = Vec::with_capacity(decls.len());
    for decl in &decls {
        let entry = match decl {
            TypeDecl::Struct(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for field in fields {
                    out.push(match field {
                        FieldDecl::Primitive { name, kind } => ResolvedField::Primitive {
                            name: name.clone(),
                            kind: *kind,
                        },
                        FieldDecl::Slot { name, ty, shape } => ResolvedField::Slot {
                            name: name.clone(),
                            target: resolve_name(ty)?,
                            shape: *shape,
                        },
                    });
                }
                Resolved::Struct(out)
            }
            TypeDecl::PrimitiveArray { element } => Resolved::PrimitiveArray { element: *element },
            TypeDecl::StructuredArray { element } => {
                let element_id = resolve_name(element)?;
                if !matches!(decls[element_id.0 as usize], TypeDecl::Struct(_)) {
                    return Err(LayoutError::NotAStruct {
                        ty: element.clone(),
                    });
                }
                Resolved::StructuredArray {
                    element: element_id,
                }
            }
        };
        resolved.push(entry);
    }

    let mut layouter = Layouter {
        names: &type_names,
        resolved: &resolved,
        optimize: config.optimize_layout,
        state: vec![Visit::Unvisited; resolved.len()],
        layouts: (0..resolved.len()).map(|_| None).collect(),
    };
    for (index, entry) in resolved.iter().enumerate() {
        if matches!(entry, Resolved::Struct(_)) {
            layouter.layout(TypeId(index as u32))?;
        }
    }
    let mut layouts = layouter.layouts;

    let mut types = Vec::with_capacity(resolved.len());
    for (index, entry) in resolved.iter().enumerate() {
        let id = TypeId(index as u32);
        let name = type_names[index].clone();
        let kind = match entry {
            Resolved::Struct(_) => match layouts[index].take() {
                Some(layout) => TypeKind::Struct(layout),
                None => return Err(LayoutError::UnknownTypeId(id)),
            },
            Resolved::PrimitiveArray { element } => TypeKind::PrimitiveArray { element: *element },
            Resolved::StructuredArray { element } => TypeKind::StructuredArray { element: *element },
        };

        // Types without any declared constructor get an implicit no-op
        // default; array classes always have one.
        let implicit_default = match entry {
            Resolved::Struct(_) => constructors[index].is_empty(),
            Resolved::PrimitiveArray { .. } | Resolved::StructuredArray { .. } => true,
        };
        if implicit_default && !defaults.contains_key(&id) {
            let ctor = Constructor::new(id, name.clone(), Vec::new(), Box::new(|_, _| Ok(())));
            defaults.insert(id, ctor);
        }

        types.push(TypeInfo { name, kind });
    }

    let names: HashMap<String, TypeId> = names.into_iter().collect();
    Ok(TypeSystem {
        types,
        names,
        defaults,
        optimize_layout: config.optimize_layout,
    })
}

impl Layouter<'_> {
    fn name(
        &self,
        ty: TypeId,
    ) -> &str {
        &self.names[ty.0 as usize]
    }

    /// Lay out struct `ty`, returning its instance size
    fn layout(
        &mut self,
        ty: TypeId,
    ) -> Result<usize, LayoutError> {
        let index = ty.0 as usize;
        if let Visit::Done(size) = self.state[index] {
            return Ok(size);
        }
        self.state[index] = Visit::Visiting;

        let resolved = self.resolved;
        let fields = match &resolved[index] {
            Resolved::Struct(fields) => fields,
            _ => {
                return Err(LayoutError::NotAStruct {
                    ty: self.name(ty).to_string(),
                })
            }
        };

        let mut plans = Vec::with_capacity(fields.len());
        for field in fields {
            plans.push(match field {
                ResolvedField::Primitive { .. } => None,
                ResolvedField::Slot {
                    name,
                    target,
                    shape,
                } => Some(self.plan_slot(ty, name, *target, *shape)?),
            });
        }

        let mut offsets = vec![0usize; fields.len()];
        let mut offset = HEADER_SIZE;
        for (i, field) in fields.iter().enumerate() {
            if let ResolvedField::Primitive { kind, .. } = field {
                offset = align_up(offset, kind.size());
                offsets[i] = offset;
                offset += kind.size();
            }
        }
        for (i, plan) in plans.iter().enumerate() {
            if matches!(plan, Some(plan) if plan.inline_size.is_none()) {
                offset = align_up(offset, WORD_SIZE);
                offsets[i] = offset;
                offset += WORD_SIZE;
            }
        }
        let instance_fields_end = offset;
        let too_large = || LayoutError::TooLarge {
            ty: self.name(ty).to_string(),
        };
        offset = align_up(offset, WORD_SIZE);
        for (i, plan) in plans.iter().enumerate() {
            if let Some(SlotPlan {
                inline_size: Some(size),
                ..
            }) = plan
            {
                offsets[i] = offset;
                offset = offset.checked_add(*size).ok_or_else(too_large)?;
            }
        }
        let instance_size = checked_align_up(offset, WORD_SIZE).ok_or_else(too_large)?;

        let mut layout_fields = IndexMap::with_capacity(fields.len());
        for ((field, plan), offset) in fields.iter().zip(plans).zip(offsets) {
            match (field, plan) {
                (ResolvedField::Primitive { name, kind }, _) => {
                    layout_fields.insert(
                        name.clone(),
                        FieldLayout::Primitive {
                            offset,
                            kind: *kind,
                        },
                    );
                }
                (ResolvedField::Slot { name, target, .. }, Some(plan)) => {
                    let placement = match plan.inline_size {
                        Some(size) => Placement::Inline { size },
                        None => Placement::OutOfLine,
                    };
                    let location = SlotLocation {
                        container: ty,
                        container_name: self.name(ty).to_string(),
                        name: name.clone(),
                        element_type: *target,
                        element_name: self.name(*target).to_string(),
                        offset,
                        placement,
                    };
                    let model = SlotModel::build(location, plan.primitive, plan.structured)?;
                    layout_fields.insert(name.clone(), FieldLayout::Slot(model));
                }
                (ResolvedField::Slot { name, .. }, None) => {
                    return Err(LayoutError::UnknownField {
                        ty: self.name(ty).to_string(),
                        field: name.clone(),
                    })
                }
            }
        }

        debug!(
            ty = self.name(ty),
            size = instance_size,
            fields = layout_fields.len(),
            "laid out type"
        );
        self.layouts[index] = Some(StructLayout {
            instance_size,
            instance_fields_end,
            fields: layout_fields,
        });
        self.state[index] = Visit::Done(instance_size);
        Ok(instance_size)
    }

    fn plan_slot(
        &mut self,
        container: TypeId,
        slot: &str,
        target: TypeId,
        shape: SlotShape,
    ) -> Result<SlotPlan, LayoutError> {
        let qualified = format!("{}.{}", self.name(container), slot);
        let invalid = |reason| {
            LayoutError::from(EmbedError::InvalidModel {
                slot: qualified.clone(),
                reason,
            })
        };
        let resolved = self.resolved;

        match (shape, &resolved[target.0 as usize]) {
            (SlotShape::Scalar, Resolved::Struct(_)) => {
                let inline_size = self.inline_struct_size(container, slot, target)?;
                Ok(SlotPlan {
                    primitive: None,
                    structured: None,
                    inline_size,
                })
            }
            (SlotShape::Scalar, _) => Err(invalid(InvalidModelReason::MissingArrayShape {
                class: self.name(target).to_string(),
            })),
            (SlotShape::PrimitiveArray { length }, Resolved::PrimitiveArray { element }) => {
                let model = PrimitiveArrayModel::new(target, *element, length);
                let footprint = model
                    .footprint()
                    .ok_or_else(|| invalid(InvalidModelReason::ArrayTooLarge { length }))?;
                let inline_size = self.optimize.then_some(footprint);
                Ok(SlotPlan {
                    primitive: Some(model),
                    structured: None,
                    inline_size,
                })
            }
            (SlotShape::PrimitiveArray { .. }, _) => {
                Err(invalid(InvalidModelReason::UnexpectedArrayShape {
                    element: self.name(target).to_string(),
                    expected: "primitive-array",
                }))
            }
            (SlotShape::StructuredArray { length }, Resolved::StructuredArray { element }) => {
                let model = StructuredArrayModel::new(target, *element, length);
                let inline_size = match self.inline_struct_size(container, slot, *element)? {
                    Some(stride) => Some(
                        model
                            .footprint(stride)
                            .ok_or_else(|| invalid(InvalidModelReason::ArrayTooLarge { length }))?,
                    ),
                    None => None,
                };
                Ok(SlotPlan {
                    primitive: None,
                    structured: Some(model),
                    inline_size,
                })
            }
            (SlotShape::StructuredArray { .. }, _) => {
                Err(invalid(InvalidModelReason::UnexpectedArrayShape {
                    element: self.name(target).to_string(),
                    expected: "structured-array",
                }))
            }
        }
    }

    /// Size to reserve for an inline `ty`, or `None` if it must go out-of-line
    fn inline_struct_size(
        &mut self,
        container: TypeId,
        slot: &str,
        ty: TypeId,
    ) -> Result<Option<usize>, LayoutError> {
        if !self.optimize {
            return Ok(None);
        }
        match self.state[ty.0 as usize] {
            Visit::Visiting => {
                debug!(
                    slot = %format!("{}.{}", self.name(container), slot),
                    target = self.name(ty),
                    "embedding cycle in layout, storing slot out-of-line"
                );
                Ok(None)
            }
            Visit::Done(size) => Ok(Some(size)),
            Visit::Unvisited => self.layout(ty).map(Some),
        }
    }
}
