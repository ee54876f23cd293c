//! Streaming SHA-256 helpers.

use std::io::{self, Read};

use sha2::{Digest, Sha256};

/// Hash everything `reader` yields, in fixed-size chunks.
pub fn sha256_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// A reader that hashes every byte it passes through.
///
/// Lets one pass over the audit log feed both the chain replay and the
/// whole-file digest.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Read the rest of the input and return the digest of all of it.
    pub fn finish(mut self) -> io::Result<String> {
        io::copy(&mut self, &mut io::sink())?;
        Ok(hex::encode(self.hasher.finalize()))
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};

    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn sha256_reader_matches_known_digest() {
        assert_eq!(sha256_reader(&b"hello"[..]).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn hashing_reader_covers_unread_tail() {
        let mut reader = HashingReader::new(&b"hello"[..]);
        let mut first = [0u8; 2];
        reader.read_exact(&mut first).unwrap();
        assert_eq!(&first, b"he");
        assert_eq!(reader.finish().unwrap(), HELLO_SHA256);
    }

    #[test]
    fn hashing_reader_counts_bytes_buffered_ahead() {
        let mut reader = HashingReader::new(&b"hel\nlo"[..]);
        {
            let mut buffered = BufReader::new(&mut reader);
            let mut line = String::new();
            buffered.read_line(&mut line).unwrap();
            assert_eq!(line, "hel\n");
        }
        // The BufReader pulled everything; finish must not double count.
        assert_eq!(
            reader.finish().unwrap(),
            sha256_reader(&b"hel\nlo"[..]).unwrap()
        );
    }
}
