//! Tokens & cursor (spec.md §4.8, C10): the lexer's tagged-union `Token`
//! and the two cursor backings the parser/preprocessor consume them
//! through.

pub mod buffer;
pub mod cursor;
pub mod token;

pub use buffer::ChunkedTokenBuffer;
pub use cursor::{ArrayTokenCursor, ChunkedTokenCursor, TokenCursor};
pub use token::{Constant, PpHeaderName, PpNumber, PpWhitespace, StringLiteral, Token, TokenExtension, TokenPayload};
