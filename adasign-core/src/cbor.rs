//! Minimal canonical CBOR encoder for transaction bodies and witness sets.
//!
//! Only the subset of CBOR used by Shelley-era transactions is supported: unsigned integers,
//! byte and text strings, definite-length arrays and maps, tags and `null`. Integers and lengths
//! always use the shortest possible head, and [`Encoder::canonical_map`] orders keys the way
//! [RFC 7049 section 3.9](https://www.rfc-editor.org/rfc/rfc7049#section-3.9) requires, so equal
//! values always encode to equal bytes.

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;

const SIMPLE_NULL: u8 = 0xf6;

/// A type which can be written to an [`Encoder`]
pub trait Encode {
    /// Appends the CBOR encoding of `self`
    fn encode(&self, encoder: &mut Encoder);
}

/// Encodes a value to a fresh byte vector
pub fn to_vec<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut encoder = Encoder::new();
    value.encode(&mut encoder);
    encoder.into_bytes()
}

/// Append-only CBOR writer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the encoder, returning the written bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn head(&mut self, major: u8, value: u64) -> &mut Self {
        let major = major << 5;
        if value < 24 {
            self.buf.push(major | value as u8);
        } else if value <= u8::MAX as u64 {
            self.buf.push(major | 24);
            self.buf.push(value as u8);
        } else if value <= u16::MAX as u64 {
            self.buf.push(major | 25);
            self.buf.extend_from_slice(&(value as u16).to_be_bytes());
        } else if value <= u32::MAX as u64 {
            self.buf.push(major | 26);
            self.buf.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buf.push(major | 27);
            self.buf.extend_from_slice(&value.to_be_bytes());
        }
        self
    }

    /// Writes an unsigned integer
    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.head(MAJOR_UNSIGNED, value)
    }

    /// Writes a byte string
    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.head(MAJOR_BYTES, value.len() as u64);
        self.buf.extend_from_slice(value);
        self
    }

    /// Writes a UTF-8 text string
    pub fn str(&mut self, value: &str) -> &mut Self {
        self.head(MAJOR_TEXT, value.len() as u64);
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    /// Writes the head of a definite-length array. The caller writes `len` items next.
    pub fn array(&mut self, len: usize) -> &mut Self {
        self.head(MAJOR_ARRAY, len as u64)
    }

    /// Writes the head of a definite-length map. The caller writes `len` key/value pairs next,
    /// already in canonical key order.
    pub fn map(&mut self, len: usize) -> &mut Self {
        self.head(MAJOR_MAP, len as u64)
    }

    /// Writes a semantic tag. The tagged item follows.
    pub fn tag(&mut self, tag: u64) -> &mut Self {
        self.head(MAJOR_TAG, tag)
    }

    /// Writes `null`
    pub fn null(&mut self) -> &mut Self {
        self.buf.push(SIMPLE_NULL);
        self
    }

    /// Splices already-encoded CBOR into the output
    pub fn raw(&mut self, encoded: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(encoded);
        self
    }

    /// Writes an encodable value
    pub fn value<T: Encode + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.encode(self);
        self
    }

    /// Writes a map from pre-encoded keys and values, sorting entries by their encoded keys:
    /// shorter keys first, equal lengths compared bytewise.
    pub fn canonical_map(&mut self, mut entries: Vec<(Vec<u8>, Vec<u8>)>) -> &mut Self {
        entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        self.map(entries.len());
        for (key, value) in entries {
            self.raw(&key).raw(&value);
        }
        self
    }
}

impl Encode for u64 {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.u64(*self);
    }
}

impl Encode for str {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.str(self);
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.array(self.len());
        for item in self {
            item.encode(encoder);
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, encoder: &mut Encoder) {
        self.as_slice().encode(encoder);
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, encoder: &mut Encoder) {
        match self {
            Some(value) => value.encode(encoder),
            None => {
                encoder.null();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // vectors from RFC 7049 appendix A
    #[test]
    fn encodes_unsigned_integers() {
        assert_eq!(to_vec(&0u64), vec![0x00]);
        assert_eq!(to_vec(&23u64), vec![0x17]);
        assert_eq!(to_vec(&24u64), vec![0x18, 0x18]);
        assert_eq!(to_vec(&1000u64), vec![0x19, 0x03, 0xe8]);
        assert_eq!(to_vec(&1_000_000u64), vec![0x1a, 0x00, 0x0f, 0x42, 0x40]);
        assert_eq!(
            to_vec(&1_000_000_000_000u64),
            vec![0x1b, 0x00, 0x00, 0x00, 0xe8, 0xd4, 0xa5, 0x10, 0x00]
        );
        assert_eq!(hex::encode(to_vec(&u64::MAX)), "1bffffffffffffffff");
    }

    #[test]
    fn encodes_strings_and_collections() {
        let mut encoder = Encoder::new();
        encoder.bytes(&[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(encoder.into_bytes(), vec![0x44, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(to_vec("IETF"), vec![0x64, 0x49, 0x45, 0x54, 0x46]);
        assert_eq!(to_vec(&vec![1u64, 2, 3]), vec![0x83, 0x01, 0x02, 0x03]);
        assert_eq!(to_vec(&Vec::<u64>::new()), vec![0x80]);
        assert_eq!(to_vec(&None::<u64>), vec![0xf6]);

        let mut encoder = Encoder::new();
        encoder.map(0);
        assert_eq!(encoder.into_bytes(), vec![0xa0]);
    }

    #[test]
    fn canonical_map_orders_by_length_then_bytes() {
        let key = |bytes: &[u8]| {
            let mut encoder = Encoder::new();
            encoder.bytes(bytes);
            encoder.into_bytes()
        };
        let entries = vec![
            (key(&[0x01, 0x02]), to_vec(&1u64)),
            (key(&[0xff]), to_vec(&2u64)),
            (key(&[0x00]), to_vec(&3u64)),
        ];
        let mut encoder = Encoder::new();
        encoder.canonical_map(entries);
        assert_eq!(
            hex::encode(encoder.into_bytes()),
            // {h'00': 3, h'ff': 2, h'0102': 1}
            "a341000341ff0242010201"
        );
    }

    #[test]
    fn encodes_tags() {
        let mut encoder = Encoder::new();
        encoder.tag(30).array(2).u64(1).u64(3);
        assert_eq!(hex::encode(encoder.into_bytes()), "d81e820103");
    }
}
