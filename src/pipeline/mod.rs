//! Pipeline stages of one submission.
//!
//! Each submodule implements exactly one step, so each is testable without
//! the others and the network stage can be swapped for a fake.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preview ──▶ request ──▶ response
//! (path)    (tempfile)  (multipart)  (JSON → result | error)
//! ```
//!
//! 1. [`input`]: read the dropped or picked file and reject non-images
//!    before any I/O to the service
//! 2. [`preview`]: revocable local copy shown while the request runs
//! 3. [`request`]: the single multipart POST; the only stage with network I/O
//! 4. [`response`]: map status and body onto a result or a typed error

pub mod input;
pub mod preview;
pub mod request;
pub mod response;
