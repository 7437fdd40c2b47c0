//! Pipeline stages for schema-driven extraction.
//!
//! Each submodule implements exactly one step and is usable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! extraction:  input ──▶ encode ──▶ payload ──▶ endpoint ──▶ parse
//!             (path/URL)  (base64)   (schema)    (retry)     (strategies)
//!
//! suggestion:  input ──▶ relay ──▶ suggest ──▶ endpoint ──▶ repair
//!                       (public URL  (chat      (retry)     (JSON salvage)
//!                        or data URI) request)
//! ```
//!
//! 1. [`input`]    — read a local file or keep a URL as-is
//! 2. [`encode`]   — base64 / `data:` URI with a sniffed MIME type
//! 3. [`payload`]  — pair the image with the normalised schema
//! 4. [`endpoint`] — authenticated POST with retry and backoff; shared by
//!    extraction and suggestion
//! 5. [`parse`]    — locate the result in the endpoint's response
//! 6. [`relay`]    — optional upload to an image host
//! 7. [`suggest`]  — chat-completions request for a proposed schema
//! 8. [`repair`]   — recover a JSON list from free-form model text

pub mod encode;
pub mod endpoint;
pub mod input;
pub mod parse;
pub mod payload;
pub mod relay;
pub mod repair;
pub mod suggest;
