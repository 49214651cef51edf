//! The lexer's `Token` tagged union (spec.md §4.8, C10).
//!
//! Grounded in `examples/original_source/headers/kefir/lexer/lexem.h`'s
//! `kefir_token_class_t`/`kefir_constant_token_type_t`/
//! `kefir_string_literal_token_type_t`/`kefir_punctuator_token_t` enums.
//! Concrete C keyword and punctuator spellings are lexer-front-end detail
//! the distilled spec doesn't name individually; we keep them interned
//! strings rather than transcribing all ~50 keyword variants, which would
//! just be the original's enum relabeled.

use crate::error::{Error, Result};
use crate::ir::operand::StringElementType;
use crate::string_pool::StringId;

/// A typed scalar constant token payload (`kefir_constant_token_t`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    Char(i32),
    WideChar(u32),
}

/// A string-literal token payload: raw bytes (already interned) plus the
/// element type the concatenation rule in [`StringElementType`] checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringLiteral {
    pub element_type: StringElementType,
    pub raw_literal: bool,
    pub content: StringId,
}

/// `kefir_pptoken_pp_whitespace_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpWhitespace {
    pub newline: bool,
}

/// `kefir_pptoken_pp_number_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpNumber {
    pub literal: StringId,
}

/// `kefir_pptoken_pp_header_name_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpHeaderName {
    pub system: bool,
    pub name: StringId,
}

/// An opaque, caller-defined token kind with a small v-table (spec.md
/// §4.8 "extension (opaque, with a v-table)"), mirroring
/// `kefir_token_extension_class_t`'s `free`/`copy`/`format`/`concat`
/// callbacks. We keep only the two that matter once ownership is Rust's:
/// formatting and concatenation compatibility.
pub trait TokenExtension: std::fmt::Debug {
    fn format(&self) -> String;

    /// Whether this extension token may be concatenated with `other`
    /// during string-literal-adjacent merging; `None` means "not
    /// concatenable".
    fn concat(&self, other: &dyn TokenExtension) -> Option<Box<dyn TokenExtension>>;
}

/// The tagged union over every token shape the lexer/preprocessor produce
/// (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPayload {
    Sentinel,
    Keyword(StringId),
    Identifier(StringId),
    Punctuator(StringId),
    PpWhitespace(PpWhitespace),
    PpNumber(PpNumber),
    PpHeaderName(PpHeaderName),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TypedPayload {
    Plain(TokenPayload),
    Constant(Constant),
    StringLiteral(StringLiteral),
}

/// A single lexer token. Extension tokens carry a boxed v-table and so
/// can't derive `Copy`/`PartialEq`; we model them as a separate variant
/// rather than cramming a trait object into [`TokenPayload`].
#[derive(Debug)]
pub enum Token {
    Plain(TokenPayload),
    Constant(Constant),
    StringLiteral(StringLiteral),
    Extension(Box<dyn TokenExtension>),
}

impl Token {
    pub fn sentinel() -> Self {
        Token::Plain(TokenPayload::Sentinel)
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Token::Plain(TokenPayload::Sentinel))
    }

    pub fn keyword(name: StringId) -> Self {
        Token::Plain(TokenPayload::Keyword(name))
    }

    pub fn identifier(name: StringId) -> Self {
        Token::Plain(TokenPayload::Identifier(name))
    }

    pub fn punctuator(spelling: StringId) -> Self {
        Token::Plain(TokenPayload::Punctuator(spelling))
    }

    pub fn constant(value: Constant) -> Self {
        Token::Constant(value)
    }

    pub fn string_literal(literal: StringLiteral) -> Self {
        Token::StringLiteral(literal)
    }

    /// String-literal element-type concatenation: "multibyte is a neutral
    /// element; any two identical non-multibyte types concatenate;
    /// distinct non-multibyte types cannot concatenate" (spec.md §4.8),
    /// exactly `kefir_token_string_literal_type_concat`
    /// (`source/lexer/lexem.c`).
    pub fn concat_string_literal_types(a: StringElementType, b: StringElementType) -> Result<StringElementType> {
        match (a, b) {
            (StringElementType::Multibyte, other) | (other, StringElementType::Multibyte) => Ok(other),
            (x, y) if x == y => Ok(x),
            _ => Err(Error::InvalidParameter(format!(
                "incompatible string literal element types: {a:?} and {b:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multibyte_is_neutral_on_either_side() {
        assert_eq!(
            Token::concat_string_literal_types(StringElementType::Multibyte, StringElementType::Utf16).unwrap(),
            StringElementType::Utf16
        );
        assert_eq!(
            Token::concat_string_literal_types(StringElementType::Wide, StringElementType::Multibyte).unwrap(),
            StringElementType::Wide
        );
    }

    #[test]
    fn identical_non_multibyte_types_concatenate() {
        assert_eq!(
            Token::concat_string_literal_types(StringElementType::Utf8, StringElementType::Utf8).unwrap(),
            StringElementType::Utf8
        );
    }

    #[test]
    fn distinct_non_multibyte_types_are_rejected() {
        assert!(Token::concat_string_literal_types(StringElementType::Utf16, StringElementType::Utf32).is_err());
    }
}
