use crate::error::{HostError, Result};

/// Fixed-capacity text buffer for `char* buf, size_t buf_size` parameter
/// pairs. The storage always holds `capacity` bytes and stays
/// NUL-terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CStringBuffer {
    bytes: Vec<u8>,
}

impl CStringBuffer {
    pub fn new(capacity: usize, text: &str) -> Result<Self> {
        if capacity == 0 {
            return Err(HostError::ZeroCapacity);
        }
        let mut buf = Self {
            bytes: vec![0; capacity],
        };
        buf.set(text)?;
        Ok(buf)
    }

    /// Replace the contents. `text` plus its terminator must fit.
    pub fn set(&mut self, text: &str) -> Result<()> {
        if let Some(pos) = text.bytes().position(|b| b == 0) {
            return Err(HostError::InteriorNul(pos));
        }
        if text.len() >= self.bytes.len() {
            return Err(HostError::TextTooLong {
                len: text.len(),
                capacity: self.bytes.len(),
            });
        }
        self.bytes[..text.len()].copy_from_slice(text.as_bytes());
        self.bytes[text.len()] = 0;
        Ok(())
    }

    /// Text up to the first NUL, as the native side last left it.
    pub fn get(&self) -> Result<&str> {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or(HostError::Unterminated)?;
        Ok(std::str::from_utf8(&self.bytes[..end])?)
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Raw view of the full storage, `capacity()` bytes long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_ptr(&mut self) -> *mut std::ffi::c_char {
        self.bytes.as_mut_ptr().cast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_capacity() {
        let buf = CStringBuffer::new(16, "hello").unwrap();
        assert_eq!(buf.get().unwrap(), "hello");
        assert_eq!(buf.as_bytes().len(), 16);
        assert_eq!(buf.capacity(), 16);
    }

    #[test]
    fn text_must_leave_room_for_the_terminator() {
        assert_eq!(
            CStringBuffer::new(5, "hello"),
            Err(HostError::TextTooLong {
                len: 5,
                capacity: 5
            })
        );
        assert!(CStringBuffer::new(6, "hello").is_ok());
        assert_eq!(CStringBuffer::new(0, ""), Err(HostError::ZeroCapacity));
        assert_eq!(CStringBuffer::new(8, "a\0b"), Err(HostError::InteriorNul(1)));
    }
}
