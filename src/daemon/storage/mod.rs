//!  Completed sessions are persisted through [record_writer::RotatingRecordWriter].
//!  The basic idea is:
//!   - There is a directory with all the record files.
//!   - Each file holds one session per line, delimited text with a fixed header row.
//!   - Once a file grows past the size threshold the writer moves on to the next
//!     sequentially numbered file.

pub mod record_writer;
pub mod session;
