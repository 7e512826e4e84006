//! Tokenizer and generic block grammar for DF-ISE text files.
//!
//! DF-ISE files are block-structured plain text. Every file starts with the
//! fixed two-token header `DF-ISE text`, followed by exactly two top-level
//! blocks: `Info` (fixed-schema counts and declarations) and `Data` (the
//! geometry or values).
//!
//! # Grammar Overview
//!
//! ```text
//! file        = "DF-ISE" "text" info_block data_block
//! info_block  = "Info" "{" mandatory_attrs info_extra "}"
//! data_block  = "Data" "{" data_body "}"
//!
//! attribute   = name "=" value
//! array       = name "=" "[" value* "]"
//! block       = name "{" ... "}"
//! named_block = name "(" param ")" "{" ... "}"
//!
//! value       = word | quoted_string
//! word        = any run of characters outside whitespace, punctuation and '#'
//! punctuation = "=" | "{" | "}" | "[" | "]" | "(" | ")"
//! ```
//!
//! `#` starts a line comment. Quoted strings may span physical lines and use
//! backslash escapes; a `#` inside a quoted string is literal.
//!
//! The mandatory `Info` attributes appear in fixed order: `version`, `type`,
//! `dimension`, `nb_vertices`, `nb_edges`, `nb_faces`, `nb_elements`,
//! `nb_regions`. The `info_extra` and `data_body` productions depend on the
//! file kind and are supplied by the concrete reader through
//! [`ParseCallbacks`].

mod reader;
mod tokenizer;

pub use reader::{BlockReader, FileKind, MandatoryInfo, ParseCallbacks};
pub use tokenizer::{Token, TokenKind, Tokenizer};
