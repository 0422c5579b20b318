//! Inline construct tokenizers and their integration with the CommonMark parser.
//!
//! Notes are CommonMark documents (parsed by `pulldown-cmark`) extended with four inline
//! constructs:
//!
//! | Construct | Pattern | Example | Fields |
//! |---|---|---|---|
//! | note-link | `[[` digits `]]` | `[[123]]` | `id` |
//! | date-link | `[[` `YYYY-MM-DD` `]]` | `[[1998-07-11]]` | `date` |
//! | note-embed | `![[` filename (`\|` label)? `]]` | `![[123\|hello]]` | `id`, `text` |
//! | tag-link | (line start or whitespace) `#` alpha namechar* | `#hello-world` | `name` |
//!
//! ## Key Components
//!
//! - [`chars`] - Character classes over a single [`chars::Code`]
//! - [`tokenizer`] - The [`Construct`](tokenizer::Construct) automaton contract and the
//!   transactional [`attempt`](tokenizer::attempt) driver
//! - [`constructs`] - The four automata, [`InlineNode`] and the text-run [`scan`]ner
//! - [`md`] - [`ConstructStream`](md::ConstructStream), which splices constructs into the
//!   pulldown-cmark event stream
//!
//! ## Failure Semantics
//!
//! A construct that does not match is not an error. The attempt is discarded without side
//! effects, its trigger character is emitted as ordinary text, and scanning resumes at the next
//! character. `[[123` or `#0123` therefore render literally and never disturb the surrounding
//! document:
//!
//! ```rust
//! use notesync_core::codec::{md::{events, NoteEvent}, InlineNode};
//!
//! let nodes: Vec<InlineNode> = events("#todo call [[42]] about [[2024-02-30]], not #42")
//!     .filter_map(|(event, _range)| match event {
//!         NoteEvent::Construct(node) => Some(node),
//!         _ => None,
//!     })
//!     .collect();
//! assert_eq!(nodes.len(), 3);
//! ```

pub mod chars;
pub mod constructs;
pub mod md;
pub mod tokenizer;

pub use constructs::{scan, InlineNode, Scanned};
pub use tokenizer::{ConstructKind, ConstructSet, Token, TokenKind};
