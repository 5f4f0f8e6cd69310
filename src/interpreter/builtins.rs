//! Standard library of native functions
//!
//! # Supported Built-ins
//!
//! - `std::assert(cond, message)`: abort the run if `cond` is zero
//! - `std::assert_warn(cond, message)`: log a warning if `cond` is zero
//! - `std::print(values...)`: concatenate the arguments into an info entry
//! - `std::mem::align_to(alignment, value)`: round `value` up to a multiple of `alignment`
//! - `std::mem::base_address()`, `std::mem::size()`: data source properties
//! - `std::mem::find_sequence(occurrence, bytes...)`: offset of the n-th (0-based) match
//! - `std::mem::read_unsigned(address, size)`, `std::mem::read_signed(address, size)`
//! - `std::str::length(s)`, `std::str::at(s, index)`, `std::str::compare(a, b)`
//!
//! # Implementation Notes
//!
//! Argument kinds are checked by the engine before dispatch, so the helpers
//! here only convert already validated literals. Errors are raised without a
//! location; the engine attaches the call site.

use crate::console::LogLevel;
use crate::interpreter::errors::EvalError;
use crate::interpreter::functions::{ArgKind, Arity, CallContext, FunctionRegistry, RegistryError};
use crate::memory::value::Value;
use crate::memory::{bytes_to_u128, data_source::DataSource};
use crate::parser::ast::SourceLocation;

/// Bytes scanned per read by `find_sequence`
const SCAN_CHUNK: u64 = 0x1000;

fn abort(message: impl Into<String>) -> EvalError {
    EvalError::aborted(message, SourceLocation::default())
}

fn integer(args: &[Value], index: usize) -> Result<u128, EvalError> {
    args[index]
        .as_u128()
        .ok_or_else(|| abort(format!("argument {} must be a non-negative integer", index)))
}

fn string(args: &[Value], index: usize) -> &str {
    args[index].as_str().unwrap_or_default()
}

/// Register the `std`, `std::mem` and `std::str` functions
pub fn register_std(registry: &mut FunctionRegistry) {
    // The std names are distinct and their signatures well-formed, so this cannot fail
    if let Err(err) = try_register_std(registry) {
        tracing::error!(%err, "failed to register standard library");
    }
}

fn try_register_std(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    use ArgKind::{Any, Integer, String};

    registry.register(&["std"], "assert", Arity::Exactly(2), &[Integer, String], |_, args| {
        if args[0].as_bool() == Some(false) {
            return Err(abort(format!("assertion failed \"{}\"", string(args, 1))));
        }
        Ok(None)
    })?;

    registry.register(&["std"], "assert_warn", Arity::Exactly(2), &[Integer, String], |ctx, args| {
        if args[0].as_bool() == Some(false) {
            ctx.log(LogLevel::Warning, format!("assertion failed \"{}\"", string(args, 1)));
        }
        Ok(None)
    })?;

    registry.register(&["std"], "print", Arity::MoreThan(0), &[Any], |ctx, args| {
        let message: std::string::String = args.iter().map(Value::to_string).collect();
        ctx.log(LogLevel::Info, message);
        Ok(None)
    })?;

    registry.register(&["std", "mem"], "align_to", Arity::Exactly(2), &[Integer, Integer], |_, args| {
        let (alignment, value) = (integer(args, 0)?, integer(args, 1)?);
        if alignment == 0 {
            return Err(abort("alignment must not be zero"));
        }
        let remainder = value % alignment;
        let aligned = if remainder == 0 {
            value
        } else {
            value + (alignment - remainder)
        };
        Ok(Some(Value::unsigned(aligned, 8)))
    })?;

    registry.register(&["std", "mem"], "base_address", Arity::None, &[], |ctx, _| {
        Ok(Some(Value::Unsigned(u128::from(ctx.source.base_address()), 8)))
    })?;

    registry.register(&["std", "mem"], "size", Arity::None, &[], |ctx, _| {
        Ok(Some(Value::Unsigned(u128::from(ctx.source.actual_size()), 8)))
    })?;

    registry.register(
        &["std", "mem"],
        "find_sequence",
        Arity::MoreThan(1),
        &[Integer, Integer],
        |ctx, args| {
            let occurrence = integer(args, 0)?;
            let sequence = args[1..]
                .iter()
                .map(|arg| arg.as_u128().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| abort("sequence bytes need to fit into 1 byte"))?;

            find_sequence(ctx.source, &sequence, occurrence)?
                .map(|offset| Some(Value::Unsigned(u128::from(offset), 8)))
                .ok_or_else(|| abort("failed to find sequence"))
        },
    )?;

    registry.register(&["std", "mem"], "read_unsigned", Arity::Exactly(2), &[Integer, Integer], |ctx, args| {
        let (raw, size) = read_integer(ctx, args)?;
        Ok(Some(Value::unsigned(raw, size)))
    })?;

    registry.register(&["std", "mem"], "read_signed", Arity::Exactly(2), &[Integer, Integer], |ctx, args| {
        let (raw, size) = read_integer(ctx, args)?;
        Ok(Some(Value::signed(raw as i128, size)))
    })?;

    registry.register(&["std", "str"], "length", Arity::Exactly(1), &[String], |_, args| {
        Ok(Some(Value::Unsigned(string(args, 0).len() as u128, 4)))
    })?;

    registry.register(&["std", "str"], "at", Arity::Exactly(2), &[String, Integer], |_, args| {
        let text = string(args, 0).as_bytes();
        args[1]
            .as_u128()
            .and_then(|index| usize::try_from(index).ok())
            .and_then(|index| text.get(index))
            .map(|c| Some(Value::Char(*c)))
            .ok_or_else(|| abort("character index out of bounds"))
    })?;

    registry.register(&["std", "str"], "compare", Arity::Exactly(2), &[String, String], |_, args| {
        Ok(Some(Value::Bool(string(args, 0) == string(args, 1))))
    })?;

    Ok(())
}

/// Shared body of `read_unsigned`/`read_signed`: returns the raw bits and the width
fn read_integer(ctx: &CallContext<'_>, args: &[Value]) -> Result<(u128, u8), EvalError> {
    let (address, size) = (integer(args, 0)?, integer(args, 1)?);

    let size = match size {
        1 | 2 | 4 | 8 | 16 => size as u8,
        _ => return Err(abort("invalid read size")),
    };

    let actual_size = u128::from(ctx.source.actual_size());
    if address >= actual_size || address + u128::from(size) > actual_size {
        return Err(abort("address out of range"));
    }

    let mut buffer = vec![0u8; usize::from(size)];
    ctx.source
        .read(address as u64, &mut buffer)
        .map_err(|err| abort(err.to_string()))?;

    Ok((bytes_to_u128(&buffer, ctx.endian), size))
}

/// Offset of the `occurrence`-th (0-based) match of `sequence`, scanning the
/// whole source from offset 0 in overlapping chunks
fn find_sequence(source: &dyn DataSource, sequence: &[u8], occurrence: u128) -> Result<Option<u64>, EvalError> {
    let total = source.actual_size();
    let length = sequence.len() as u64;
    if length == 0 || length > total {
        return Ok(None);
    }

    let mut remaining = occurrence;
    let mut start = 0u64;
    while start + length <= total {
        let end = (start + SCAN_CHUNK + length - 1).min(total);
        let mut buffer = vec![0u8; (end - start) as usize];
        source.read(start, &mut buffer).map_err(|err| abort(err.to_string()))?;

        for (i, window) in buffer.windows(sequence.len()).enumerate() {
            if window == sequence {
                if remaining == 0 {
                    return Ok(Some(start + i as u64));
                }
                remaining -= 1;
            }
        }

        start += SCAN_CHUNK;
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::LogConsole;
    use crate::memory::data_source::{DataSourceError, MemoryDataSource};
    use crate::memory::Endian;
    use crate::parser::ast::NamespacePath;

    fn call(source: &dyn DataSource, path: &[&str], name: &str, args: &[Value]) -> Result<Option<Value>, EvalError> {
        let registry = FunctionRegistry::with_std();
        let entry = registry.resolve(&NamespacePath::from(path), name).unwrap();
        entry.check_arguments(name, args, SourceLocation::default())?;

        let mut console = LogConsole::new();
        let mut ctx = CallContext {
            source,
            console: &mut console,
            endian: Endian::Little,
        };
        (entry.implementation)(&mut ctx, args)
    }

    fn int(v: i128) -> Value {
        Value::Signed(v, 4)
    }

    #[test]
    fn test_align_to() {
        let source = MemoryDataSource::new(vec![]);
        let align = |a, v| call(&source, &["std", "mem"], "align_to", &[int(a), int(v)]).unwrap();

        assert_eq!(align(4, 10), Some(Value::Unsigned(12, 8)));
        assert_eq!(align(4, 8), Some(Value::Unsigned(8, 8)));
        assert_eq!(align(16, 1), Some(Value::Unsigned(16, 8)));
        assert!(call(&source, &["std", "mem"], "align_to", &[int(0), int(3)]).is_err());
    }

    /// A 4 KiB window of which only the first 16 bytes are backed
    struct SparseWindow;

    impl DataSource for SparseWindow {
        fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), DataSourceError> {
            if address + buffer.len() as u64 > 16 {
                return Err(DataSourceError::OutOfRange { address, length: buffer.len(), size: 16 });
            }
            buffer.fill(0);
            Ok(())
        }

        fn size(&self) -> u64 {
            0x1000
        }

        fn actual_size(&self) -> u64 {
            16
        }

        fn base_address(&self) -> u64 {
            0
        }

        fn set_base_address(&mut self, _address: u64) {}
    }

    #[test]
    fn test_size_reports_backed_bytes() {
        let size = call(&SparseWindow, &["std", "mem"], "size", &[]).unwrap();
        assert_eq!(size, Some(Value::Unsigned(16, 8)));

        let source = MemoryDataSource::new(vec![0; 7]);
        assert_eq!(call(&source, &["std", "mem"], "size", &[]).unwrap(), Some(Value::Unsigned(7, 8)));
    }

    #[test]
    fn test_read_round_trip() {
        let mut source = MemoryDataSource::new(vec![0; 32]);
        source.write(4, &0xDEAD_BEEFu32.to_le_bytes());
        source.write(8, &(-2i16).to_le_bytes());

        let value = call(&source, &["std", "mem"], "read_unsigned", &[int(4), int(4)]).unwrap();
        assert_eq!(value, Some(Value::Unsigned(0xDEAD_BEEF, 4)));

        let value = call(&source, &["std", "mem"], "read_signed", &[int(8), int(2)]).unwrap();
        assert_eq!(value, Some(Value::Signed(-2, 2)));
    }

    #[test]
    fn test_read_rejects_bad_size_and_range() {
        let source = MemoryDataSource::new(vec![0; 8]);

        let err = call(&source, &["std", "mem"], "read_unsigned", &[int(0), int(3)]).unwrap_err();
        assert_eq!(err.to_string(), "invalid read size");

        let err = call(&source, &["std", "mem"], "read_unsigned", &[int(6), int(4)]).unwrap_err();
        assert_eq!(err.to_string(), "address out of range");

        let err = call(&source, &["std", "mem"], "read_signed", &[int(8), int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "address out of range");
    }

    #[test]
    fn test_find_sequence_occurrences() {
        let mut data = vec![0u8; 0x2100];
        data[3..5].copy_from_slice(&[0xAB, 0xCD]);
        // Straddles the first chunk boundary
        data[0xFFF..0x1001].copy_from_slice(&[0xAB, 0xCD]);
        let source = MemoryDataSource::new(data);
        let find = |n| call(&source, &["std", "mem"], "find_sequence", &[int(n), int(0xAB), int(0xCD)]);

        assert_eq!(find(0).unwrap(), Some(Value::Unsigned(3, 8)));
        assert_eq!(find(1).unwrap(), Some(Value::Unsigned(0xFFF, 8)));
        assert_eq!(find(2).unwrap_err().to_string(), "failed to find sequence");
    }

    #[test]
    fn test_find_sequence_byte_range() {
        let source = MemoryDataSource::new(vec![0; 4]);
        let err = call(&source, &["std", "mem"], "find_sequence", &[int(0), int(0x100)]).unwrap_err();
        assert_eq!(err.to_string(), "sequence bytes need to fit into 1 byte");

        // Longer than the source
        let err = call(&source, &["std", "mem"], "find_sequence", &[int(0), int(0), int(0), int(0), int(0), int(0)])
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to find sequence");
    }

    #[test]
    fn test_string_functions() {
        let source = MemoryDataSource::new(vec![]);
        let abc = Value::String("abc".into());

        assert_eq!(
            call(&source, &["std", "str"], "length", &[abc.clone()]).unwrap(),
            Some(Value::Unsigned(3, 4))
        );
        assert_eq!(
            call(&source, &["std", "str"], "at", &[abc.clone(), int(0)]).unwrap(),
            Some(Value::Char(b'a'))
        );
        assert_eq!(
            call(&source, &["std", "str"], "at", &[abc.clone(), int(3)]).unwrap_err().to_string(),
            "character index out of bounds"
        );
        assert_eq!(
            call(&source, &["std", "str"], "compare", &[abc.clone(), Value::String("abc".into())]).unwrap(),
            Some(Value::Bool(true))
        );
        assert_eq!(
            call(&source, &["std", "str"], "compare", &[abc, Value::String("abd".into())]).unwrap(),
            Some(Value::Bool(false))
        );
    }

    #[test]
    fn test_argument_kinds_checked_before_dispatch() {
        let source = MemoryDataSource::new(vec![]);
        let err = call(&source, &["std"], "assert", &[Value::String("x".into()), Value::String("y".into())])
            .unwrap_err();
        assert!(matches!(err, EvalError::ArgumentKind { index: 0, .. }));
    }

    #[test]
    fn test_assert_message() {
        let source = MemoryDataSource::new(vec![]);
        let err = call(&source, &["std"], "assert", &[int(0), Value::String("bad magic".into())]).unwrap_err();
        assert_eq!(err.to_string(), "assertion failed \"bad magic\"");
        assert!(call(&source, &["std"], "assert", &[int(1), Value::String("ok".into())]).is_ok());
    }
}
