//! Byte data sources
//!
//! The evaluator never touches files or process memory directly. Everything it
//! decodes is read through the [`DataSource`] capability, which hosts implement
//! for whatever medium they display. [`MemoryDataSource`] is the in-memory
//! implementation used by the CLI and the tests.
//!
//! # Sizes
//!
//! A source reports two sizes: [`DataSource::size`] is the addressable size the
//! host displays, [`DataSource::actual_size`] is the number of bytes that really
//! exist. Patterns only ever see the actual size, through `std::mem::size` and
//! the bounds checks on reads.

use thiserror::Error;

/// Failure reading from a data source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    #[error("data source is not available")]
    Unavailable,

    #[error("read of {length} bytes at 0x{address:x} is out of range (size 0x{size:x})")]
    OutOfRange { address: u64, length: usize, size: u64 },
}

/// Byte-addressable capability the evaluator reads from
pub trait DataSource {
    /// Fill `buffer` with the bytes starting at `address`
    fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), DataSourceError>;

    /// Addressable size shown by the host
    fn size(&self) -> u64;

    /// Number of bytes actually backed by data
    fn actual_size(&self) -> u64;

    fn base_address(&self) -> u64;

    fn set_base_address(&mut self, address: u64);

    fn is_available(&self) -> bool {
        true
    }
}

/// A data source backed by an owned byte buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryDataSource {
    data: Vec<u8>,
    base_address: u64,
    available: bool,
}

impl MemoryDataSource {
    pub fn new(data: Vec<u8>) -> Self {
        MemoryDataSource {
            data,
            base_address: 0,
            available: true,
        }
    }

    pub fn with_base_address(mut self, address: u64) -> Self {
        self.base_address = address;
        self
    }

    /// Mark the source as (un)available, e.g. after the backing file closed
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Overwrite bytes in place. Writes past the end grow the buffer.
    pub fn write(&mut self, address: usize, bytes: &[u8]) {
        let end = address + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[address..end].copy_from_slice(bytes);
    }
}

impl From<Vec<u8>> for MemoryDataSource {
    fn from(data: Vec<u8>) -> Self {
        MemoryDataSource::new(data)
    }
}

impl DataSource for MemoryDataSource {
    fn read(&self, address: u64, buffer: &mut [u8]) -> Result<(), DataSourceError> {
        if !self.available {
            return Err(DataSourceError::Unavailable);
        }

        let out_of_range = || DataSourceError::OutOfRange {
            address,
            length: buffer.len(),
            size: self.data.len() as u64,
        };

        let start = usize::try_from(address).map_err(|_| out_of_range())?;
        let end = start.checked_add(buffer.len()).ok_or_else(out_of_range)?;
        let bytes = self.data.get(start..end).ok_or_else(out_of_range)?;

        buffer.copy_from_slice(bytes);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn actual_size(&self) -> u64 {
        self.data.len() as u64
    }

    fn base_address(&self) -> u64 {
        self.base_address
    }

    fn set_base_address(&mut self, address: u64) {
        self.base_address = address;
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_bounds() {
        let source = MemoryDataSource::new(vec![1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        source.read(1, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
    }

    #[test]
    fn test_read_past_end_fails() {
        let source = MemoryDataSource::new(vec![1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        let err = source.read(3, &mut buf).unwrap_err();
        assert!(matches!(err, DataSourceError::OutOfRange { address: 3, length: 2, size: 4 }));
    }

    #[test]
    fn test_unavailable_source() {
        let mut source = MemoryDataSource::new(vec![0; 8]);
        source.set_available(false);
        let mut buf = [0u8; 1];
        assert_eq!(source.read(0, &mut buf), Err(DataSourceError::Unavailable));
    }

    #[test]
    fn test_write_grows_buffer() {
        let mut source = MemoryDataSource::new(vec![0; 2]);
        source.write(1, &[0xAA, 0xBB]);
        assert_eq!(source.bytes(), &[0, 0xAA, 0xBB]);
        assert_eq!(source.actual_size(), 3);
    }
}
