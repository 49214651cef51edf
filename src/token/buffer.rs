//! The chunked token buffer backing [`super::cursor::ChunkedTokenCursor`]
//! (spec.md §4.8, C10).
//!
//! Grounded in `examples/original_source/source/lexer/token_buffer.c`:
//! chunks start at `INIT_CHUNK_CAPACITY` tokens and grow geometrically
//! (here, by `Vec`'s own amortized-doubling `push`/`insert`) up to
//! `MAX_CHUNK_LENGTH`, at which point a fresh chunk is started; `insert`
//! merges an overflowing chunk's tail into a new chunk, and merges two
//! adjacent chunks back together whenever the result still fits under the
//! limit.

use crate::error::{Error, Result};

use super::token::Token;

pub(super) const INIT_CHUNK_CAPACITY: usize = 32;
pub(super) const MAX_CHUNK_LENGTH: usize = 4096;

struct Chunk {
    tokens: Vec<Token>,
}

impl Chunk {
    fn new() -> Self {
        Self { tokens: Vec::with_capacity(INIT_CHUNK_CAPACITY) }
    }
}

/// A sequence of tokens stored as a list of bounded-size chunks rather than
/// one contiguous `Vec`, so that a mid-stream `insert` only shifts elements
/// within (at most) one chunk instead of the whole token stream.
#[derive(Default)]
pub struct ChunkedTokenBuffer {
    chunks: Vec<Chunk>,
}

impl ChunkedTokenBuffer {
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.tokens.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Appends a token to the tail, starting a fresh chunk once the current
    /// tail chunk hits `MAX_CHUNK_LENGTH`.
    pub fn push(&mut self, token: Token) {
        if self.chunks.last().map(|c| c.tokens.len()).unwrap_or(MAX_CHUNK_LENGTH) >= MAX_CHUNK_LENGTH {
            self.chunks.push(Chunk::new());
        }
        self.chunks.last_mut().unwrap().tokens.push(token);
    }

    /// Locates the chunk index and in-chunk offset for a global index.
    /// `index == len()` is a valid "append at tail" position.
    fn locate(&self, index: usize) -> Result<(usize, usize)> {
        let mut base = 0;
        for (i, chunk) in self.chunks.iter().enumerate() {
            if index < base + chunk.tokens.len() {
                return Ok((i, index - base));
            }
            base += chunk.tokens.len();
        }
        if index == base {
            let last = self.chunks.len().saturating_sub(1);
            let local = self.chunks.last().map(|c| c.tokens.len()).unwrap_or(0);
            return Ok((last, local));
        }
        Err(Error::OutOfBounds(format!("token index {index} out of bounds (len {base})")))
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        let (chunk, local) = self.locate(index).ok()?;
        self.chunks.get(chunk)?.tokens.get(local)
    }

    /// Splices `token` into position `index`, splitting the containing
    /// chunk if it would exceed `MAX_CHUNK_LENGTH`, then attempting to
    /// re-merge with a neighbor (spec.md §4.8).
    pub fn insert(&mut self, index: usize, token: Token) -> Result<()> {
        if self.chunks.is_empty() {
            self.chunks.push(Chunk::new());
        }
        let (chunk_idx, local) = self.locate(index)?;
        self.chunks[chunk_idx].tokens.insert(local, token);
        if self.chunks[chunk_idx].tokens.len() > MAX_CHUNK_LENGTH {
            self.split_chunk(chunk_idx);
        } else {
            self.try_merge_with_next(chunk_idx);
        }
        Ok(())
    }

    fn split_chunk(&mut self, idx: usize) {
        let mid = self.chunks[idx].tokens.len() / 2;
        let tail = self.chunks[idx].tokens.split_off(mid);
        self.chunks.insert(idx + 1, Chunk { tokens: tail });
    }

    fn try_merge_with_next(&mut self, idx: usize) {
        if idx + 1 >= self.chunks.len() {
            return;
        }
        if self.chunks[idx].tokens.len() + self.chunks[idx + 1].tokens.len() <= MAX_CHUNK_LENGTH {
            let next = self.chunks.remove(idx + 1);
            self.chunks[idx].tokens.extend(next.tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::string_pool::StringId;
    use crate::containers::Id;

    fn tok(i: u32) -> Token {
        Token::identifier(StringId::from_index(i))
    }

    #[test]
    fn push_past_max_chunk_length_starts_new_chunk() {
        let mut buf = ChunkedTokenBuffer::new();
        for i in 0..(MAX_CHUNK_LENGTH + 1) {
            buf.push(tok(i as u32));
        }
        assert_eq!(buf.num_chunks(), 2);
        assert_eq!(buf.len(), MAX_CHUNK_LENGTH + 1);
    }

    #[test]
    fn get_resolves_across_chunk_boundary() {
        let mut buf = ChunkedTokenBuffer::new();
        for i in 0..(MAX_CHUNK_LENGTH + 5) {
            buf.push(tok(i as u32));
        }
        match buf.get(MAX_CHUNK_LENGTH + 2).unwrap() {
            Token::Plain(crate::token::token::TokenPayload::Identifier(id)) => {
                assert_eq!(id.index(), (MAX_CHUNK_LENGTH + 2) as u32)
            }
            _ => panic!("expected identifier"),
        }
    }

    #[test]
    fn insert_merges_adjacent_small_chunks() {
        let mut buf = ChunkedTokenBuffer::new();
        for i in 0..10 {
            buf.push(tok(i));
        }
        buf.insert(5, tok(999)).unwrap();
        assert_eq!(buf.num_chunks(), 1);
        assert_eq!(buf.len(), 11);
    }

    #[test]
    fn insert_out_of_bounds_errors() {
        let mut buf = ChunkedTokenBuffer::new();
        buf.push(tok(0));
        assert!(buf.insert(5, tok(1)).is_err());
    }
}
