use super::{Token, TokenRef};
use crate::buffer::MirroredBuffer;

/// A resizable numeric token holding a bunch of vectors.
///
/// Element `i` of pattern `b` in a bunch of `n` patterns lives at `i * n + b`. The underlying
/// buffer only grows, `used_size` tells how much of it belongs to the current bunch.
#[derive(Debug, Clone)]
pub struct TokenBlock {
    buffer: MirroredBuffer,
    used_size: usize,
}

impl TokenBlock {
    /// Creates a new zeroed `TokenBlock` of `size` scalars.
    pub fn new(size: usize) -> Self {
        Self {
            buffer: MirroredBuffer::new(size),
            used_size: size,
        }
    }

    /// Creates a new `TokenBlock` which owns the given data.
    pub fn from_vec(data: Vec<f32>) -> Self {
        let used_size = data.len();

        Self {
            buffer: MirroredBuffer::from_vec(data),
            used_size,
        }
    }

    pub fn used_size(&self) -> usize {
        self.used_size
    }

    pub fn max_size(&self) -> usize {
        self.buffer.len()
    }

    /// Sets the used size, growing the buffer if needed.
    pub fn resize(&mut self, used_size: usize) {
        if used_size > self.buffer.len() {
            self.buffer.resize(used_size);
        }

        self.used_size = used_size;
    }

    pub fn buffer(&self) -> &MirroredBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut MirroredBuffer {
        &mut self.buffer
    }

    /// Gives a host view of the used portion of the token.
    pub fn read(&mut self) -> &[f32] {
        let used = self.used_size;
        &self.buffer.read()[..used]
    }

    /// Gives a mutable host view of the used portion of the token.
    pub fn read_write(&mut self) -> &mut [f32] {
        let used = self.used_size;
        &mut self.buffer.read_write()[..used]
    }

    /// Wraps this block into a shared token handle.
    pub fn into_ref(self) -> TokenRef {
        Token::Block(self).into_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_never_shrinks_capacity() {
        let mut block = TokenBlock::new(6);
        block.resize(2);
        assert_eq!(block.used_size(), 2);
        assert_eq!(block.max_size(), 6);

        block.resize(8);
        assert_eq!(block.max_size(), 8);
        assert_eq!(block.read().len(), 8);
    }
}
