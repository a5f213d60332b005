//!  Storage is organized through [tracker_storage::FileStorage].
//!  The basic idea is:
//!   - There is a directory holding everything the tracker knows.
//!   - Items live in `items.json` and are rewritten whenever one changes.
//!   - Completions and focus sessions are appended to `completions.jsonl` and `focus.jsonl`,
//!     one JSON value per line. Nothing is ever edited in place, a toggle off is a new line.

pub mod entities;
pub mod tracker_storage;
