//! Type instantiation: turning declarations into pattern data
//!
//! A declaration is placed either at an explicit address (`@ expr`) or at the
//! cursor. Unplaced struct members are aligned relative to the start of their
//! struct to the natural alignment of their type, capped by `#pragma
//! alignment`. Union members all start at the union's start.
//!
//! Named type instantiation counts against the recursion limit, as do
//! pointers, so self-referential layouts abort instead of overflowing.

use crate::interpreter::constants::MAX_ARRAY_ELEMENTS;
use crate::interpreter::engine::{resolve_in, Evaluator, Scope};
use crate::interpreter::errors::EvalError;
use crate::interpreter::ops::fold_constant;
use crate::memory::value::Value;
use crate::memory::{bytes_to_u128, decode_builtin, sizeof_builtin, Endian};
use crate::parser::ast::*;
use crate::pattern::{PatternData, PatternKind};

/// Smallest integer width in bytes able to hold `bits` bits
fn width_for_bits(bits: u32) -> u8 {
    match bits {
        0..=8 => 1,
        9..=16 => 2,
        17..=32 => 4,
        33..=64 => 8,
        _ => 16,
    }
}

/// Round `value` up to a multiple of `alignment`; `None` on overflow
fn align_up(value: u64, alignment: u64) -> Option<u64> {
    value.checked_next_multiple_of(alignment.max(1))
}

fn too_large(location: SourceLocation) -> EvalError {
    EvalError::aborted("type is too large", location)
}

impl<'a> Evaluator<'a> {
    /// Place a variable, array or pointer declaration and return its pattern
    pub(crate) fn place_declaration(&mut self, declaration: &AstNode) -> Result<PatternData, EvalError> {
        let placement = match declaration {
            AstNode::VarDecl { placement, .. }
            | AstNode::ArrayDecl { placement, .. }
            | AstNode::PointerDecl { placement, .. } => placement,
            _ => return Err(EvalError::type_error("declaration", "statement", declaration.location())),
        };

        let explicit = match placement {
            Some(address) => Some(self.evaluate_address(address)?),
            None => None,
        };
        let offset = match explicit {
            Some(address) => address,
            None => self.member_offset(declaration)?,
        };

        let saved_cursor = self.cursor;
        let endian = self.endian;
        let pattern = match declaration {
            AstNode::VarDecl { name, var_type, .. } => self.instantiate_type(var_type, name, offset, endian)?,
            AstNode::ArrayDecl {
                name,
                elem_type,
                size,
                location,
                ..
            } => self.instantiate_array(elem_type, size, name, offset, endian, *location)?,
            AstNode::PointerDecl {
                name,
                pointee,
                size_type,
                location,
                ..
            } => self.instantiate_pointer(pointee, size_type, name, offset, endian, *location)?,
            other => return Err(EvalError::type_error("declaration", "statement", other.location())),
        };

        self.cursor = match explicit {
            Some(_) => saved_cursor,
            None => pattern.end(),
        };
        Ok(pattern)
    }

    /// Address an unplaced declaration starts at
    fn member_offset(&self, declaration: &AstNode) -> Result<u64, EvalError> {
        match self.scopes.last() {
            Some(Scope::Type { start, is_union: true, .. }) => Ok(*start),
            Some(Scope::Type { start, .. }) => {
                let natural = self.alignment_of_declaration(declaration, &self.current_namespace(), 0);
                let alignment = natural.min(self.config.alignment.unwrap_or(u64::MAX));
                align_up(self.cursor.saturating_sub(*start), alignment)
                    .and_then(|relative| start.checked_add(relative))
                    .ok_or_else(|| EvalError::ReadOutOfRange {
                        address: *start,
                        size: self.cursor.saturating_sub(*start),
                        location: declaration.location(),
                    })
            }
            _ => Ok(self.cursor),
        }
    }

    fn new_pattern(
        &mut self,
        kind: PatternKind,
        name: &str,
        type_name: impl Into<String>,
        offset: u64,
        size: u64,
        endian: Endian,
    ) -> PatternData {
        let mut pattern = PatternData::new(kind, name, type_name, offset, size);
        pattern.endian = endian;
        pattern.color = self.palette.next_color();
        tracing::trace!(name, offset, size, kind = pattern.kind.name(), "created pattern");
        pattern
    }

    // ===== Types =====

    pub(crate) fn instantiate_type(
        &mut self,
        ty: &TypeRef,
        name: &str,
        offset: u64,
        inherited: Endian,
    ) -> Result<PatternData, EvalError> {
        let endian = ty.endian.unwrap_or(inherited);

        match &ty.kind {
            TypeKind::Builtin(builtin) => self.instantiate_builtin(*builtin, name, offset, endian, ty.location),
            TypeKind::Named(path) => {
                let (namespace, definition) = self.lookup_type(path).ok_or_else(|| EvalError::UndefinedType {
                    name: path.join("::"),
                    location: ty.location,
                })?;

                self.enter_depth(ty.location)?;
                self.namespaces.push(namespace);
                let result = self.instantiate_definition(definition, name, offset, endian);
                self.namespaces.pop();
                self.leave_depth();
                result
            }
        }
    }

    fn instantiate_builtin(
        &mut self,
        ty: BuiltinType,
        name: &str,
        offset: u64,
        endian: Endian,
        location: SourceLocation,
    ) -> Result<PatternData, EvalError> {
        let size = sizeof_builtin(ty);
        let value = if ty == BuiltinType::Padding {
            self.check_range(offset, size, location)?;
            None
        } else {
            let bytes = self.read_bytes(offset, size, location)?;
            decode_builtin(ty, &bytes, endian)
        };

        let mut pattern = self.new_pattern(PatternKind::Primitive(ty), name, ty.name(), offset, size, endian);
        pattern.value = value;
        Ok(pattern)
    }

    fn instantiate_definition(
        &mut self,
        definition: &'a AstNode,
        name: &str,
        offset: u64,
        endian: Endian,
    ) -> Result<PatternData, EvalError> {
        match definition {
            AstNode::StructDef {
                name: type_name,
                members,
                ..
            } => self.instantiate_compound(members, false, name, type_name, offset, endian),
            AstNode::UnionDef {
                name: type_name,
                members,
                ..
            } => self.instantiate_compound(members, true, name, type_name, offset, endian),
            AstNode::EnumDef {
                name: type_name,
                underlying,
                entries,
                location,
            } => self.instantiate_enum(underlying, entries, name, type_name, offset, endian, *location),
            AstNode::BitfieldDef {
                name: type_name,
                fields,
                location,
            } => self.instantiate_bitfield(fields, name, type_name, offset, endian, *location),
            AstNode::Using {
                name: alias, target, ..
            } => {
                let mut pattern = self.instantiate_type(target, name, offset, endian)?;
                pattern.type_name = alias.clone();
                Ok(pattern)
            }
            other => Err(EvalError::UndefinedType {
                name: other.type_name().unwrap_or_default().to_string(),
                location: other.location(),
            }),
        }
    }

    fn instantiate_compound(
        &mut self,
        members: &[AstNode],
        is_union: bool,
        name: &str,
        type_name: &str,
        offset: u64,
        endian: Endian,
    ) -> Result<PatternData, EvalError> {
        let kind = if is_union { PatternKind::Union } else { PatternKind::Struct };
        let mut pattern = self.new_pattern(kind, name, type_name, offset, 0, endian);

        let saved_cursor = self.cursor;
        let saved_endian = self.endian;
        self.cursor = offset;
        self.endian = endian;
        self.scopes.push(Scope::Type {
            members: Vec::new(),
            start: offset,
            is_union,
        });

        let result = self.execute_block(members);
        let end = self.cursor;
        let scope = self.scopes.pop();

        self.cursor = saved_cursor;
        self.endian = saved_endian;
        result?;

        let children = match scope {
            Some(Scope::Type { members, .. }) => members,
            _ => Vec::new(),
        };
        pattern.size = if is_union {
            children.iter().map(PatternData::end).max().unwrap_or(offset).saturating_sub(offset)
        } else {
            end.saturating_sub(offset)
        };
        Ok(pattern.with_children(children))
    }

    #[allow(clippy::too_many_arguments)]
    fn instantiate_enum(
        &mut self,
        underlying: &TypeRef,
        entries: &[EnumEntry],
        name: &str,
        type_name: &str,
        offset: u64,
        endian: Endian,
        location: SourceLocation,
    ) -> Result<PatternData, EvalError> {
        let ty = match underlying.kind {
            TypeKind::Builtin(ty) if ty.is_integral() => ty,
            _ => {
                return Err(EvalError::type_error(
                    "integral enum type",
                    underlying.display_name(),
                    location,
                ))
            }
        };
        let endian = underlying.endian.unwrap_or(endian);

        let size = sizeof_builtin(ty);
        let bytes = self.read_bytes(offset, size, location)?;
        let value = decode_builtin(ty, &bytes, endian)
            .ok_or_else(|| EvalError::type_error("integral enum type", ty.name(), location))?;

        let entry = self
            .enum_values(entries, ty)?
            .into_iter()
            .find(|(_, v)| *v == value)
            .map(|(entry, _)| entry);

        let pattern = self.new_pattern(PatternKind::Enum { entry }, name, type_name, offset, size, endian);
        Ok(pattern.with_value(value))
    }

    /// Entry values of an enum: explicit, or one more than the previous entry, starting at 0
    pub(crate) fn enum_values(&mut self, entries: &[EnumEntry], ty: BuiltinType) -> Result<Vec<(String, Value)>, EvalError> {
        let mut values = Vec::with_capacity(entries.len());
        let mut next: i128 = 0;

        for entry in entries {
            let raw = match &entry.value {
                Some(expr) => {
                    let value = self.evaluate_expr(expr)?;
                    value
                        .as_i128()
                        .or_else(|| value.as_u128().map(|v| v as i128))
                        .ok_or_else(|| EvalError::type_error("integer enum value", value.kind_name(), entry.location))?
                }
                None => next,
            };
            next = raw.wrapping_add(1);

            let value = Value::Signed(raw, 16)
                .cast_to(ty)
                .ok_or_else(|| EvalError::type_error("integral enum type", ty.name(), entry.location))?;
            values.push((entry.name.clone(), value));
        }
        Ok(values)
    }

    fn instantiate_bitfield(
        &mut self,
        fields: &[BitfieldField],
        name: &str,
        type_name: &str,
        offset: u64,
        endian: Endian,
        location: SourceLocation,
    ) -> Result<PatternData, EvalError> {
        let mut widths = Vec::with_capacity(fields.len());
        let mut total: u32 = 0;
        for field in fields {
            let value = self.evaluate_expr(&field.width)?;
            let width = value
                .as_u64()
                .filter(|w| (1..=128).contains(w))
                .ok_or_else(|| EvalError::aborted(format!("invalid bitfield width {}", value), field.location))?
                as u32;
            total += width;
            if total > 128 {
                return Err(EvalError::aborted("bitfield is wider than 128 bits", location));
            }
            widths.push(width);
        }

        let size = u64::from(total.div_ceil(8));
        let raw = bytes_to_u128(&self.read_bytes(offset, size, location)?, endian);

        let mut pattern = self.new_pattern(PatternKind::Bitfield, name, type_name, offset, size, endian);
        let mut bit_offset: u32 = 0;
        for (field, width) in fields.iter().zip(widths) {
            if let Some(field_name) = &field.name {
                let mask = if width >= 128 { u128::MAX } else { (1u128 << width) - 1 };
                let bits = (raw >> bit_offset) & mask;

                let first_byte = u64::from(bit_offset / 8);
                let last_byte = u64::from((bit_offset + width).div_ceil(8));
                let child = self
                    .new_pattern(
                        PatternKind::BitfieldField {
                            bit_offset,
                            bit_size: width,
                        },
                        field_name,
                        "bits",
                        offset + first_byte,
                        last_byte - first_byte,
                        endian,
                    )
                    .with_value(Value::unsigned(bits, width_for_bits(width)));
                pattern.children.push(child);
            }
            bit_offset += width;
        }
        Ok(pattern)
    }

    // ===== Arrays =====

    fn instantiate_array(
        &mut self,
        elem_type: &TypeRef,
        size: &ArraySize,
        name: &str,
        offset: u64,
        endian: Endian,
        location: SourceLocation,
    ) -> Result<PatternData, EvalError> {
        match elem_type.kind {
            TypeKind::Builtin(BuiltinType::Char) => self.instantiate_string(size, name, offset, endian, location),
            TypeKind::Builtin(BuiltinType::Padding) => {
                let count = self.byte_count(size, offset, location)?;
                self.check_range(offset, count, location)?;
                Ok(self.new_pattern(
                    PatternKind::Primitive(BuiltinType::Padding),
                    name,
                    "padding",
                    offset,
                    count,
                    endian,
                ))
            }
            _ => self.instantiate_elements(elem_type, size, name, offset, endian, location),
        }
    }

    fn array_count(&mut self, expr: &AstNode) -> Result<u64, EvalError> {
        let value = self.evaluate_expr(expr)?;
        let count = value
            .as_u64()
            .ok_or_else(|| EvalError::aborted(format!("invalid array size {}", value), expr.location()))?;
        if count > MAX_ARRAY_ELEMENTS {
            return Err(EvalError::aborted(
                format!("array of {} elements exceeds the limit of {}", count, MAX_ARRAY_ELEMENTS),
                expr.location(),
            ));
        }
        Ok(count)
    }

    /// Byte count of a `padding` array; `while` conditions are checked at every byte
    fn byte_count(&mut self, size: &ArraySize, offset: u64, location: SourceLocation) -> Result<u64, EvalError> {
        match size {
            ArraySize::Fixed(expr) => self.array_count(expr),
            ArraySize::While(condition) => self.while_count(condition, offset, location),
            ArraySize::Unsized => Err(EvalError::aborted("padding needs an explicit size", location)),
        }
    }

    fn while_count(&mut self, condition: &AstNode, offset: u64, location: SourceLocation) -> Result<u64, EvalError> {
        let mut count = 0;
        loop {
            self.cursor = offset.checked_add(count).ok_or(EvalError::ReadOutOfRange {
                address: offset,
                size: count,
                location,
            })?;
            if !self.condition(condition)? {
                return Ok(count);
            }
            count += 1;
            if count > MAX_ARRAY_ELEMENTS {
                return Err(EvalError::aborted("array exceeds the element limit", location));
            }
        }
    }

    /// `char` arrays decode to a single string pattern
    fn instantiate_string(
        &mut self,
        size: &ArraySize,
        name: &str,
        offset: u64,
        endian: Endian,
        location: SourceLocation,
    ) -> Result<PatternData, EvalError> {
        let bytes = match size {
            ArraySize::Fixed(expr) => {
                let count = self.array_count(expr)?;
                self.read_bytes(offset, count, location)?
            }
            ArraySize::While(condition) => {
                let count = self.while_count(condition, offset, location)?;
                self.read_bytes(offset, count, location)?
            }
            ArraySize::Unsized => {
                let mut bytes = Vec::new();
                loop {
                    let byte = self.read_bytes(offset + bytes.len() as u64, 1, location)?[0];
                    bytes.push(byte);
                    if byte == 0 {
                        break;
                    }
                }
                bytes
            }
        };

        let text: String = bytes.iter().take_while(|b| **b != 0).map(|b| char::from(*b)).collect();
        let pattern = self.new_pattern(PatternKind::String, name, "char", offset, bytes.len() as u64, endian);
        Ok(pattern.with_value(Value::String(text)))
    }

    fn instantiate_elements(
        &mut self,
        elem_type: &TypeRef,
        size: &ArraySize,
        name: &str,
        offset: u64,
        endian: Endian,
        location: SourceLocation,
    ) -> Result<PatternData, EvalError> {
        let color = self.palette.next_color();
        let count = match size {
            ArraySize::Fixed(expr) => Some(self.array_count(expr)?),
            _ => None,
        };

        let mut children = Vec::new();
        let mut cursor = offset;
        loop {
            let index = children.len() as u64;
            match size {
                ArraySize::Fixed(_) if Some(index) == count => break,
                ArraySize::While(condition) => {
                    self.cursor = cursor;
                    if !self.condition(condition)? {
                        break;
                    }
                }
                _ => {}
            }
            if index >= MAX_ARRAY_ELEMENTS {
                return Err(EvalError::aborted("array exceeds the element limit", location));
            }

            let element = self.instantiate_type(elem_type, &format!("[{}]", index), cursor, endian)?;
            cursor = element.end();
            let terminator = matches!(size, ArraySize::Unsized)
                && self.read_bytes(element.offset, element.size, location)?.iter().all(|b| *b == 0);
            children.push(element);
            if terminator {
                break;
            }
        }

        let type_name = format!("{}[{}]", elem_type.display_name(), children.len());
        let mut pattern = PatternData::new(PatternKind::Array, name, type_name, offset, cursor - offset);
        pattern.endian = elem_type.endian.unwrap_or(endian);
        pattern.children = children;
        pattern.paint(color);
        Ok(pattern)
    }

    // ===== Pointers =====

    fn instantiate_pointer(
        &mut self,
        pointee: &TypeRef,
        size_type: &TypeRef,
        name: &str,
        offset: u64,
        endian: Endian,
        location: SourceLocation,
    ) -> Result<PatternData, EvalError> {
        let width = match size_type.kind {
            TypeKind::Builtin(BuiltinType::Unsigned(width)) => width,
            _ => {
                return Err(EvalError::type_error(
                    "unsigned pointer size type",
                    size_type.display_name(),
                    location,
                ))
            }
        };
        let endian = size_type.endian.unwrap_or(endian);

        let bytes = self.read_bytes(offset, u64::from(width), location)?;
        let address = bytes_to_u128(&bytes, endian);

        let mut pattern = self.new_pattern(
            PatternKind::Pointer,
            name,
            format!("{}*", pointee.display_name()),
            offset,
            u64::from(width),
            endian,
        );

        if address != 0 {
            let address = u64::try_from(address)
                .map_err(|_| EvalError::aborted(format!("pointer address 0x{:x} is out of range", address), location))?;

            self.enter_depth(location)?;
            let saved_cursor = self.cursor;
            let target = self.instantiate_type(pointee, &format!("*({})", name), address, endian);
            self.cursor = saved_cursor;
            self.leave_depth();
            pattern.children.push(target?);
        }

        Ok(pattern.with_value(Value::Unsigned(address, width)))
    }

    // ===== Static layout =====

    /// Natural alignment of the pattern a member declaration creates
    pub(crate) fn alignment_of_declaration(&self, declaration: &AstNode, namespace: &NamespacePath, depth: u32) -> u64 {
        match declaration {
            AstNode::VarDecl { var_type: ty, .. }
            | AstNode::ArrayDecl { elem_type: ty, .. }
            | AstNode::PointerDecl { size_type: ty, .. } => self.alignment_of_type(ty, namespace, depth),
            AstNode::If {
                then_branch,
                else_branch,
                ..
            } => then_branch
                .iter()
                .chain(else_branch.iter().flatten())
                .map(|member| self.alignment_of_declaration(member, namespace, depth))
                .max()
                .unwrap_or(1),
            _ => 1,
        }
    }

    fn alignment_of_type(&self, ty: &TypeRef, namespace: &NamespacePath, depth: u32) -> u64 {
        if depth > self.config.recursion_limit {
            return 1;
        }

        match &ty.kind {
            TypeKind::Builtin(BuiltinType::Padding) => 1,
            TypeKind::Builtin(builtin) => sizeof_builtin(*builtin),
            TypeKind::Named(path) => match resolve_in(&self.types, namespace, path) {
                Some((ns, AstNode::StructDef { members, .. } | AstNode::UnionDef { members, .. })) => members
                    .iter()
                    .map(|member| self.alignment_of_declaration(member, &ns, depth + 1))
                    .max()
                    .unwrap_or(1),
                Some((ns, AstNode::EnumDef { underlying: target, .. } | AstNode::Using { target, .. })) => {
                    self.alignment_of_type(target, &ns, depth + 1)
                }
                _ => 1,
            },
        }
    }

    /// Size of a type known without reading any data.
    ///
    /// Fails for layouts that depend on the data: conditional members and
    /// arrays whose length is not a constant.
    pub(crate) fn static_size(&self, ty: &TypeRef, namespace: &NamespacePath, depth: u32) -> Result<u64, EvalError> {
        if depth > self.config.recursion_limit {
            return Err(EvalError::RecursionLimit {
                limit: self.config.recursion_limit,
                location: ty.location,
            });
        }

        let path = match &ty.kind {
            TypeKind::Builtin(builtin) => return Ok(sizeof_builtin(*builtin)),
            TypeKind::Named(path) => path,
        };

        let (ns, definition) = resolve_in(&self.types, namespace, path).ok_or_else(|| EvalError::UndefinedType {
            name: path.join("::"),
            location: ty.location,
        })?;
        let dynamic = || {
            EvalError::aborted(
                format!("size of type '{}' depends on the data", path.join("::")),
                ty.location,
            )
        };

        match definition {
            AstNode::StructDef { members, .. } => {
                let mut size = 0;
                for member in members {
                    match member {
                        AstNode::If { .. } => return Err(dynamic()),
                        AstNode::VarDecl { placement: Some(_), .. }
                        | AstNode::ArrayDecl { placement: Some(_), .. }
                        | AstNode::PointerDecl { placement: Some(_), .. } => {}
                        AstNode::VarDecl { .. } | AstNode::ArrayDecl { .. } | AstNode::PointerDecl { .. } => {
                            let natural = self.alignment_of_declaration(member, &ns, depth + 1);
                            let alignment = natural.min(self.config.alignment.unwrap_or(u64::MAX));
                            let member_size = self.static_member_size(member, &ns, depth + 1)?;
                            size = align_up(size, alignment)
                                .and_then(|start| start.checked_add(member_size))
                                .ok_or_else(|| too_large(member.location()))?;
                        }
                        _ => {}
                    }
                }
                Ok(size)
            }
            AstNode::UnionDef { members, .. } => {
                let mut size = 0;
                for member in members {
                    match member {
                        AstNode::If { .. } => return Err(dynamic()),
                        AstNode::VarDecl { .. } | AstNode::ArrayDecl { .. } | AstNode::PointerDecl { .. } => {
                            size = size.max(self.static_member_size(member, &ns, depth + 1)?);
                        }
                        _ => {}
                    }
                }
                Ok(size)
            }
            AstNode::EnumDef { underlying, .. } => self.static_size(underlying, &ns, depth + 1),
            AstNode::BitfieldDef { fields, .. } => {
                let mut bits: u64 = 0;
                for field in fields {
                    let width = fold_constant(&field.width)
                        .and_then(|w| w.as_u64())
                        .ok_or_else(dynamic)?;
                    bits = bits.checked_add(width).ok_or_else(|| too_large(field.location))?;
                }
                Ok(bits.div_ceil(8))
            }
            AstNode::Using { target, .. } => self.static_size(target, &ns, depth + 1),
            _ => Err(dynamic()),
        }
    }

    fn static_member_size(&self, member: &AstNode, namespace: &NamespacePath, depth: u32) -> Result<u64, EvalError> {
        match member {
            AstNode::VarDecl { var_type, .. } => self.static_size(var_type, namespace, depth),
            AstNode::PointerDecl { size_type, .. } => self.static_size(size_type, namespace, depth),
            AstNode::ArrayDecl {
                elem_type,
                size: ArraySize::Fixed(count),
                location,
                ..
            } => {
                let count = fold_constant(count).and_then(|c| c.as_u64()).ok_or_else(|| {
                    EvalError::aborted("array size depends on the data", *location)
                })?;
                let elem_size = self.static_size(elem_type, namespace, depth)?;
                count.checked_mul(elem_size).ok_or_else(|| too_large(*location))
            }
            other => Err(EvalError::aborted("array size depends on the data", other.location())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RuntimeConfig;
    use crate::interpreter::engine::Evaluator;
    use crate::interpreter::errors::EvalError;
    use crate::interpreter::functions::FunctionRegistry;
    use crate::memory::data_source::MemoryDataSource;
    use crate::memory::value::Value;
    use crate::memory::Endian;
    use crate::parser::Parser;
    use crate::pattern::{PatternData, PatternKind};
    use pretty_assertions::assert_eq;

    fn run_with(source: &str, data: Vec<u8>, config: RuntimeConfig) -> Result<Vec<PatternData>, EvalError> {
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        let data = MemoryDataSource::new(data);
        let registry = FunctionRegistry::with_std();
        let mut evaluator = Evaluator::new(&data, &registry, config);
        evaluator.evaluate(&program.nodes)
    }

    fn run(source: &str, data: Vec<u8>) -> Result<Vec<PatternData>, EvalError> {
        run_with(source, data, RuntimeConfig::default())
    }

    #[test]
    fn test_natural_alignment() {
        let source = "struct S { u8 a; u32 b; u8 c; u16 d; };\nS s @ 0;";
        let patterns = run(source, vec![0; 16]).unwrap();
        let offsets: Vec<u64> = patterns[0].children.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8, 10]);
        assert_eq!(patterns[0].size, 12);
    }

    #[test]
    fn test_packed_alignment() {
        let source = "struct S { u8 a; u32 b; };\nS s @ 0;";
        let patterns = run_with(source, vec![0; 8], RuntimeConfig::new().with_alignment(1)).unwrap();
        assert_eq!(patterns[0].child("b").unwrap().offset, 1);
        assert_eq!(patterns[0].size, 5);
    }

    #[test]
    fn test_union_members_overlap() {
        let source = "union U { u32 word; u8 bytes[2]; };\nU u @ 0;";
        let patterns = run(source, vec![0x01, 0x02, 0x03, 0x04]).unwrap();
        assert_eq!(patterns[0].size, 4);
        assert!(patterns[0].children.iter().all(|c| c.offset == 0));
    }

    #[test]
    fn test_endian_prefix_applies_to_subtree() {
        let source = "struct S { u16 a; le u16 b; };\nbe S s @ 0;";
        let patterns = run(source, vec![0x12, 0x34, 0x12, 0x34]).unwrap();
        assert_eq!(patterns[0].child("a").unwrap().value, Some(Value::Unsigned(0x1234, 2)));
        assert_eq!(patterns[0].child("b").unwrap().value, Some(Value::Unsigned(0x3412, 2)));

        let patterns = run_with(
            "u16 x @ 0;",
            vec![0x12, 0x34],
            RuntimeConfig::new().with_endian(Endian::Big),
        )
        .unwrap();
        assert_eq!(patterns[0].value, Some(Value::Unsigned(0x1234, 2)));
    }

    #[test]
    fn test_enum_entry_lookup() {
        let source = "enum Kind : u8 { A, B = 5, C };\nKind k1 @ 0;\nKind k2 @ 1;";
        let patterns = run(source, vec![6, 2]).unwrap();
        assert_eq!(
            patterns[0].kind,
            PatternKind::Enum {
                entry: Some("C".to_string())
            }
        );
        assert_eq!(patterns[1].kind, PatternKind::Enum { entry: None });
        assert_eq!(patterns[0].format_value(), "Kind::C (6)");
    }

    #[test]
    fn test_bitfield_fields_from_lsb() {
        let source = "bitfield Flags { low : 4; padding : 2; high : 2; wide : 8; };\nFlags flags @ 0;";
        let patterns = run(source, vec![0b1001_0110, 0xAB]).unwrap();
        let flags = &patterns[0];
        assert_eq!(flags.size, 2);
        assert_eq!(flags.children.len(), 3);
        assert_eq!(flags.child("low").unwrap().value, Some(Value::Unsigned(0b0110, 1)));
        assert_eq!(flags.child("high").unwrap().value, Some(Value::Unsigned(0b10, 1)));
        let wide = flags.child("wide").unwrap();
        assert_eq!(wide.value, Some(Value::Unsigned(0xAB, 1)));
        assert_eq!(wide.offset, 1);
    }

    #[test]
    fn test_strings() {
        let patterns = run("char fixed[3] @ 0;\nchar cstr[] @ 3;", b"abcxy\0z".to_vec()).unwrap();
        assert_eq!(patterns[0].value, Some(Value::String("abc".to_string())));
        assert_eq!(patterns[1].value, Some(Value::String("xy".to_string())));
        assert_eq!(patterns[1].size, 3);
        assert_eq!(patterns[1].kind, PatternKind::String);
    }

    #[test]
    fn test_while_and_unsized_arrays() {
        let source = "u8 until_ff[while(std::mem::read_unsigned($, 1) != 0xFF)] @ 0;\nu16 words[] @ 4;";
        let patterns = run(source, vec![1, 2, 3, 0xFF, 5, 0, 0, 0]).unwrap();
        assert_eq!(patterns[0].children.len(), 3);
        assert_eq!(patterns[1].children.len(), 2);
        assert_eq!(patterns[1].size, 4);
    }

    #[test]
    fn test_array_elements_share_color() {
        let patterns = run("u8 bytes[3] @ 0;", vec![1, 2, 3]).unwrap();
        let array = &patterns[0];
        assert!(array.children.iter().all(|c| c.color == array.color));
        assert_eq!(array.children[1].name, "[1]");
    }

    #[test]
    fn test_pointer_follows_address() {
        let source = "struct Target { u16 value; };\nTarget *ptr : u8 @ 0;\nstd::assert(ptr.value == 0xBEEF, \"through pointer\");";
        let patterns = run(source, vec![2, 0, 0xEF, 0xBE]).unwrap();
        let ptr = &patterns[0];
        assert_eq!(ptr.kind, PatternKind::Pointer);
        assert_eq!(ptr.value, Some(Value::Unsigned(2, 1)));
        assert_eq!(ptr.children[0].name, "*(ptr)");
        assert_eq!(ptr.children[0].offset, 2);
    }

    #[test]
    fn test_null_pointer_has_no_pointee() {
        let patterns = run("u32 *ptr : u16 @ 0;", vec![0, 0]).unwrap();
        assert!(patterns[0].children.is_empty());
    }

    #[test]
    fn test_self_referential_layout_hits_limit() {
        let source = "struct Node { u8 value; Node *next : u8; };\nNode head @ 0;";
        assert!(run(source, vec![1, 0x00]).is_ok());

        // The node at offset 1 points at itself
        let err = run(source, vec![1, 0x01, 0x01]).unwrap_err();
        assert!(matches!(err, EvalError::RecursionLimit { .. }));
    }

    #[test]
    fn test_conditional_members() {
        let source = "struct Rec { u8 tag; if (tag == 1) { u16 a; } else { u8 b; } };\nRec r1 @ 0;\nRec r2 @ 4;";
        let patterns = run(source, vec![1, 0, 0x34, 0x12, 2, 9]).unwrap();
        assert_eq!(patterns[0].child("a").unwrap().value, Some(Value::Unsigned(0x1234, 2)));
        assert!(patterns[1].child("a").is_none());
        assert_eq!(patterns[1].child("b").unwrap().value, Some(Value::Unsigned(9, 1)));
    }

    #[test]
    fn test_while_array_at_the_end_of_the_address_space() {
        let err = run("char s[while(true)] @ 0xFFFFFFFFFFFFFFFF;", vec![0; 4]).unwrap_err();
        assert!(matches!(err, EvalError::ReadOutOfRange { .. }));
    }

    #[test]
    fn test_static_size_overflow() {
        let err = run("struct S { u64 a[0x4000000000000000]; };\nstd::print(sizeof(S));", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "type is too large");
        assert_eq!(err.location().line, 1);

        let source = "struct Big { u8 a[0xFFFFFFFFFFFFFFFF]; };\nstruct Pair { Big first; u8 second; };\nstd::print(sizeof(Pair));";
        let err = run(source, vec![]).unwrap_err();
        assert_eq!(err.to_string(), "type is too large");
    }

    #[test]
    fn test_static_size_rejects_dynamic_layout() {
        let err = run("struct D { u8 n; u8 data[n]; };\nstd::print(sizeof(D));", vec![]).unwrap_err();
        assert!(err.to_string().contains("depends on the data"));
    }
}
