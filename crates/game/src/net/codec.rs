use glam::{Quat, Vec3};

use super::protocol::PacketError;

/// Append-only little-endian writer for one datagram.
///
/// Strings are written as a 4-byte signed length followed by UTF-8 bytes.
/// Collections are written as a 4-byte signed count followed by the records.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_count(&mut self, count: usize) {
        self.write_i32(clamp_len(count));
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_count(value.len());
        self.buffer.extend_from_slice(value.as_bytes());
    }

    pub fn write_vec3(&mut self, value: Vec3) {
        for component in value.to_array() {
            self.write_f32(component);
        }
    }

    pub fn write_quat(&mut self, value: Quat) {
        for component in value.to_array() {
            self.write_f32(component);
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

fn clamp_len(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Cursor over a received datagram. Every read is bounds-checked and fails
/// with [`PacketError::Truncated`] instead of panicking.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], PacketError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(PacketError::Truncated {
                offset: self.offset,
                needed,
                remaining,
            });
        }
        let slice = &self.data[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], PacketError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32, PacketError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, PacketError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_count(&mut self) -> Result<usize, PacketError> {
        let count = self.read_i32()?;
        usize::try_from(count).map_err(|_| PacketError::NegativeCount(count))
    }

    pub fn read_string(&mut self) -> Result<String, PacketError> {
        let len = self.read_count()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PacketError::InvalidUtf8 {
            offset: self.offset - len,
        })
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, PacketError> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_quat(&mut self) -> Result<Quat, PacketError> {
        Ok(Quat::from_xyzw(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    /// Reads a count-prefixed list, never preallocating more slots than there
    /// are bytes left so a forged count cannot balloon memory.
    pub fn read_list<T>(
        &mut self,
        mut read_one: impl FnMut(&mut Self) -> Result<T, PacketError>,
    ) -> Result<Vec<T>, PacketError> {
        let count = self.read_count()?;
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(read_one(self)?);
        }
        Ok(items)
    }

    pub fn finish(self) -> Result<(), PacketError> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(PacketError::TrailingBytes(extra)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_length_prefixed() {
        let mut writer = ByteWriter::default();
        writer.write_str("hey");
        assert_eq!(writer.into_bytes(), vec![3, 0, 0, 0, b'h', b'e', b'y']);
    }

    #[test]
    fn truncated_read_reports_position() {
        let mut reader = ByteReader::new(&[1, 0]);
        match reader.read_i32() {
            Err(PacketError::Truncated {
                offset,
                needed,
                remaining,
            }) => {
                assert_eq!(offset, 0);
                assert_eq!(needed, 4);
                assert_eq!(remaining, 2);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn forged_count_fails_without_allocating() {
        let mut writer = ByteWriter::default();
        writer.write_i32(i32::MAX);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        let result = reader.read_list(|r| r.read_f32());
        assert!(matches!(result, Err(PacketError::Truncated { .. })));
    }

    #[test]
    fn negative_count_is_rejected() {
        let bytes = (-1i32).to_le_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(
            reader.read_count(),
            Err(PacketError::NegativeCount(-1))
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut bytes = 2i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(
            reader.read_string(),
            Err(PacketError::InvalidUtf8 { offset: 4 })
        ));
    }
}
