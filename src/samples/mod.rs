//! Sample types
//!
//! The geometry used throughout the documentation and tests: a `Triangle`
//! embeds a `Line` and a `Point`, a `Line` embeds two `Point`s. With layout
//! optimization on, every coordinate of a triangle sits at a fixed offset
//! from the triangle's header and can be reached without following a single
//! handle.
//!
//! `Polygon` embeds a structured array of points and `SampleBuffer` a
//! primitive array of longs. [`circular`] declares the self-embedding types
//! that construction must refuse.

use crate::construct::{
    BuildError, ConstructionContext, ConstructionRequest, Constructor, CtorAndArgs, EmbedError,
    PrimitiveArrayBuilder, StructuredArrayBuilder,
};
use crate::layout::{LayoutConfig, LayoutError, StructDecl, TypeRegistry, TypeSystem};
use crate::runtime::memory::Heap;
use crate::runtime::value::{ObjectRef, PrimitiveKind, TypeId, Value};
use std::sync::Arc;

/// Number of vertices of a [`Geometry::polygon`]
pub const POLYGON_VERTICES: usize = 4;
/// Number of values in a [`Geometry::sample_buffer`]
pub const SAMPLE_VALUES: usize = 8;

/// The sample geometry types and their constructors
#[derive(Debug, Clone)]
pub struct Geometry {
    types: Arc<TypeSystem>,
    pub point: TypeId,
    pub line: TypeId,
    pub triangle: TypeId,
    pub points: TypeId,
    pub polygon: TypeId,
    pub longs: TypeId,
    pub sample_buffer: TypeId,
    point_new: Constructor,
    line_new: Constructor,
    triangle_new: Constructor,
    sample_buffer_new: Constructor,
}

fn int(
    args: &[Value],
    index: usize,
) -> Result<i32, BuildError> {
    args.get(index)
        .and_then(Value::as_i32)
        .ok_or_else(|| BuildError::constructor(format!("argument {index} is not an int")))
}

impl Geometry {
    pub fn new(config: &LayoutConfig) -> Result<Self, LayoutError> {
        let mut registry = TypeRegistry::new();
        let point = registry.declare_struct(
            StructDecl::new("Point")
                .field("x", PrimitiveKind::I32)
                .field("y", PrimitiveKind::I32),
        )?;
        let line = registry.declare_struct(
            StructDecl::new("Line")
                .embedded("p1", "Point")
                .embedded("p2", "Point"),
        )?;
        let triangle = registry.declare_struct(
            StructDecl::new("Triangle")
                .embedded("l", "Line")
                .embedded("p", "Point"),
        )?;
        let points = registry.declare_structured_array("Points", "Point")?;
        let polygon = registry.declare_struct(StructDecl::new("Polygon").embedded_structured_array(
            "vertices",
            "Points",
            POLYGON_VERTICES,
        ))?;
        let longs = registry.declare_primitive_array("Longs", PrimitiveKind::I64)?;
        let sample_buffer = registry.declare_struct(
            StructDecl::new("SampleBuffer")
                .field("count", PrimitiveKind::I32)
                .embedded_primitive_array("values", "Longs", SAMPLE_VALUES),
        )?;

        registry.default_constructor(point, |_, _| Ok(()))?;
        let point_new = registry.constructor(
            point,
            [PrimitiveKind::I32, PrimitiveKind::I32],
            |this, args| {
                this.set("x", int(args, 0)?)?;
                this.set("y", int(args, 1)?)
            },
        )?;

        registry.default_constructor(line, |this, _| {
            this.construct_slot("p1", ConstructionRequest::Default)?;
            this.construct_slot("p2", ConstructionRequest::Default)?;
            Ok(())
        })?;
        let line_new = {
            let point_new = point_new.clone();
            registry.constructor(line, [PrimitiveKind::I32; 4], move |this, args| {
                let (p1, p2) = args.split_at(2);
                this.construct_slot(
                    "p1",
                    ConstructionRequest::with_args(&point_new, p1.iter().copied()),
                )?;
                this.construct_slot(
                    "p2",
                    ConstructionRequest::with_args(&point_new, p2.iter().copied()),
                )?;
                Ok(())
            })?
        };

        registry.default_constructor(triangle, |this, _| {
            this.construct_slot("l", ConstructionRequest::Default)?;
            this.construct_slot("p", ConstructionRequest::Default)?;
            Ok(())
        })?;
        let triangle_new = {
            let point_new = point_new.clone();
            let line_new = line_new.clone();
            registry.constructor(triangle, [PrimitiveKind::I32; 6], move |this, args| {
                let (l, p) = args.split_at(4);
                this.construct_slot(
                    "l",
                    ConstructionRequest::with_args(&line_new, l.iter().copied()),
                )?;
                this.construct_slot(
                    "p",
                    ConstructionRequest::with_args(&point_new, p.iter().copied()),
                )?;
                Ok(())
            })?
        };

        let sample_buffer_new = registry.constructor(
            sample_buffer,
            [PrimitiveKind::I32, PrimitiveKind::I64],
            |this, args| {
                this.set("count", args[0])?;
                let shape = this
                    .slot("values")?
                    .primitive_array_model()
                    .cloned()
                    .ok_or_else(|| BuildError::constructor("values is not a primitive array"))?;
                let builder = PrimitiveArrayBuilder::new(shape).fill(args[1]);
                this.construct_slot("values", builder.into())?;
                Ok(())
            },
        )?;

        Ok(Self {
            types: Arc::new(registry.finalize(config)?),
            point,
            line,
            triangle,
            points,
            polygon,
            longs,
            sample_buffer,
            point_new,
            line_new,
            triangle_new,
            sample_buffer_new,
        })
    }

    pub fn types(&self) -> &Arc<TypeSystem> {
        &self.types
    }

    /// `Point(x, y)`
    pub fn point_new(&self) -> &Constructor {
        &self.point_new
    }

    /// `Line(x1, y1, x2, y2)`
    pub fn line_new(&self) -> &Constructor {
        &self.line_new
    }

    /// `Triangle(x1, y1, x2, y2, x3, y3)`
    pub fn triangle_new(&self) -> &Constructor {
        &self.triangle_new
    }

    /// Allocate a triangle with the given corners
    pub fn triangle(
        &self,
        ctx: &mut ConstructionContext<'_>,
        corners: [(i32, i32); 3],
    ) -> Result<ObjectRef, EmbedError> {
        let args = corners
            .iter()
            .flat_map(|&(x, y)| [Value::I32(x), Value::I32(y)]);
        ctx.instantiate(
            self.triangle,
            ConstructionRequest::with_args(&self.triangle_new, args),
        )
    }

    /// Allocate a polygon, then build its vertices in place
    pub fn polygon(
        &self,
        ctx: &mut ConstructionContext<'_>,
        vertices: [(i32, i32); POLYGON_VERTICES],
    ) -> Result<ObjectRef, EmbedError> {
        let polygon = ctx.instantiate(self.polygon, ConstructionRequest::Default)?;
        let model = self
            .types
            .slot_model(self.polygon, "vertices")
            .map_err(|err| EmbedError::BuildFailure {
                slot: "Polygon.vertices".to_string(),
                cause: err.into(),
            })?;
        let shape = self
            .types
            .structured_array_model(self.points, POLYGON_VERTICES)
            .map_err(|err| EmbedError::BuildFailure {
                slot: model.qualified_name().to_string(),
                cause: err.into(),
            })?;

        let point_new = self.point_new.clone();
        let builder = StructuredArrayBuilder::new(shape).element_ctor_provider(move |index| {
            let (x, y) = vertices[index];
            CtorAndArgs::new(&point_new, [Value::I32(x), Value::I32(y)])
        });
        ctx.construct(polygon, model, builder.into())?;
        Ok(polygon)
    }

    /// Allocate a sample buffer whose values all start at `fill`
    pub fn sample_buffer(
        &self,
        ctx: &mut ConstructionContext<'_>,
        count: i32,
        fill: i64,
    ) -> Result<ObjectRef, EmbedError> {
        ctx.instantiate(
            self.sample_buffer,
            ConstructionRequest::with_args(&self.sample_buffer_new, [count.into(), fill.into()]),
        )
    }
}

/// Dead-reckoned offsets of every coordinate of a triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleOffsets {
    pub p1_x: usize,
    pub p1_y: usize,
    pub p2_x: usize,
    pub p2_y: usize,
    pub p_x: usize,
    pub p_y: usize,
}

impl TriangleOffsets {
    /// Fails with `NotInline` unless the layout was optimized
    pub fn new(geometry: &Geometry) -> Result<Self, LayoutError> {
        let types = geometry.types();
        let at = |path| types.dead_reckon(geometry.triangle, path);
        Ok(Self {
            p1_x: at("l.p1.x")?,
            p1_y: at("l.p1.y")?,
            p2_x: at("l.p2.x")?,
            p2_y: at("l.p2.y")?,
            p_x: at("p.x")?,
            p_y: at("p.y")?,
        })
    }

    /// Move every corner of `triangle` by `(dx, dy)` using fixed offsets
    pub fn shift(
        &self,
        heap: &mut Heap,
        triangle: ObjectRef,
        dx: i32,
        dy: i32,
    ) -> Result<(), LayoutError> {
        let base = triangle.offset;
        for (offset, delta) in [
            (self.p_x, dx),
            (self.p_y, dy),
            (self.p1_x, dx),
            (self.p1_y, dy),
            (self.p2_x, dx),
            (self.p2_y, dy),
        ] {
            let value = heap.read_value(base + offset, PrimitiveKind::I32)?;
            let current = value.as_i32().unwrap_or_default();
            heap.write_value(base + offset, Value::I32(current.wrapping_add(delta)))?;
        }
        Ok(())
    }
}

/// Move every corner of `triangle` by `(dx, dy)`, walking field paths
pub fn shift_by_path(
    types: &TypeSystem,
    heap: &mut Heap,
    triangle: ObjectRef,
    dx: i32,
    dy: i32,
) -> Result<(), LayoutError> {
    for (path, delta) in [
        ("p.x", dx),
        ("p.y", dy),
        ("l.p1.x", dx),
        ("l.p1.y", dy),
        ("l.p2.x", dx),
        ("l.p2.y", dy),
    ] {
        let current = types.read(heap, triangle, path)?.as_i32().unwrap_or_default();
        types.write(heap, triangle, path, Value::I32(current.wrapping_add(delta)))?;
    }
    Ok(())
}

/// Types that try to embed themselves
#[derive(Debug, Clone)]
pub struct Circular {
    types: Arc<TypeSystem>,
    /// Embeds itself directly
    pub foobar: TypeId,
    /// Embeds `Bar`, which embeds `Foo`
    pub foo: TypeId,
    pub bar: TypeId,
}

impl Circular {
    pub fn types(&self) -> &Arc<TypeSystem> {
        &self.types
    }
}

/// Declare `FooBar` (embeds itself) and `Foo` / `Bar` (embed each other),
/// each with a default constructor that builds its embedded slot.
pub fn circular(config: &LayoutConfig) -> Result<Circular, LayoutError> {
    let mut registry = TypeRegistry::new();
    let mut declare = |name: &str, slot: &str, target: &str| {
        registry.declare_struct(
            StructDecl::new(name)
                .field("x", PrimitiveKind::I32)
                .field("y", PrimitiveKind::I32)
                .embedded(slot, target),
        )
    };
    let foobar = declare("FooBar", "foobar", "FooBar")?;
    let foo = declare("Foo", "bar", "Bar")?;
    let bar = declare("Bar", "foo", "Foo")?;

    for (ty, slot) in [(foobar, "foobar"), (foo, "bar"), (bar, "foo")] {
        registry.default_constructor(ty, move |this, _| {
            this.construct_slot(slot, ConstructionRequest::Default)?;
            Ok(())
        })?;
    }

    Ok(Circular {
        types: Arc::new(registry.finalize(config)?),
        foobar,
        foo,
        bar,
    })
}
