use std::{error, io};

use simple_error::SimpleError;

pub fn other_io_error(e: impl Into<Box<dyn error::Error + Send + Sync>>) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

pub fn string_io_error(s: String) -> io::Error {
    other_io_error(SimpleError::new(s))
}

/// The peer hung up before sending the value we were waiting for.
pub fn closed_early_io_error(expected: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        SimpleError::new(format!("connection closed before {expected} was received")),
    )
}
