//! Content addressing: BLAKE3 fingerprints for definitions and artifacts.
//!
//! A function's fingerprint is computed from its canonical source form
//! (the pretty-printed tree), so formatting, comments, and source position
//! do not change it while any change to the computation does. Compiled
//! artifacts and specialization cache keys are built on top of these.

use crate::ast::display::format_function;
use crate::ast::FnDef;
use crate::runtime::Value;

// Domain tags, one byte in front of every hashed record.
const TAG_FN: u8 = 0x01;
const TAG_COMPILED: u8 = 0x02;
const TAG_NATIVE: u8 = 0x03;
const TAG_KEY: u8 = 0x04;

// Version byte for hash stability
const HASH_VERSION: u8 = 1;

// ─── Content Hash ──────────────────────────────────────────────────

/// A 256-bit BLAKE3 content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Zero hash (used as placeholder).
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Display as full hex.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Display as short base-32 (8 characters, 40 bits).
    pub fn to_short(&self) -> String {
        const ALPHABET: &[u8] = b"0123456789abcdefghjkmnpqrstuvwxyz";
        let val = u64::from_be_bytes([
            0, 0, 0, self.0[0], self.0[1], self.0[2], self.0[3], self.0[4],
        ]);
        let mut result = String::with_capacity(8);
        for i in (0..8).rev() {
            let idx = ((val >> (i * 5)) & 0x1F) as usize;
            result.push(ALPHABET[idx] as char);
        }
        result
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.to_short())
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.to_short())
    }
}

// ─── Fingerprint builder ───────────────────────────────────────────

/// Incremental, length-prefixed record writer over BLAKE3.
///
/// Every variable-length field is prefixed with its length so that
/// adjacent fields can never alias (`"ab" + "c"` vs `"a" + "bc"`).
pub struct Fingerprint {
    hasher: blake3::Hasher,
}

impl Fingerprint {
    fn tagged(tag: u8) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[HASH_VERSION, tag]);
        Self { hasher }
    }

    /// Start a specialization cache key.
    pub fn key() -> Self {
        Self::tagged(TAG_KEY)
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.hasher.update(&v.to_le_bytes());
        self
    }

    pub fn write_f64(&mut self, v: f64) -> &mut Self {
        // Normalize NaN payloads and -0.0 so equal values hash equally.
        let bits = if v.is_nan() {
            f64::NAN.to_bits()
        } else if v == 0.0 {
            0
        } else {
            v.to_bits()
        };
        self.write_u64(bits)
    }

    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write_u64(s.len() as u64);
        self.hasher.update(s.as_bytes());
        self
    }

    pub fn write_value(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Num(n) => {
                self.hasher.update(&[0]);
                self.write_f64(*n)
            }
            Value::Bool(b) => {
                self.hasher.update(&[1, *b as u8]);
                self
            }
            Value::Array(values) => {
                self.hasher.update(&[2]);
                self.write_u64(values.len() as u64);
                for v in values.iter() {
                    self.write_f64(*v);
                }
                self
            }
            Value::Tuple(values) => {
                self.hasher.update(&[3]);
                self.write_u64(values.len() as u64);
                for v in values.iter() {
                    self.write_value(v);
                }
                self
            }
            Value::Unit => {
                self.hasher.update(&[4]);
                self
            }
        }
    }

    pub fn write_hash(&mut self, hash: &ContentHash) -> &mut Self {
        self.hasher.update(&hash.0);
        self
    }

    pub fn finish(&self) -> ContentHash {
        ContentHash(*self.hasher.finalize().as_bytes())
    }
}

/// Fingerprint of a function definition's computation.
pub fn hash_fn(func: &FnDef) -> ContentHash {
    Fingerprint::tagged(TAG_FN)
        .write_str(&format_function(func))
        .finish()
}

/// Fingerprint of a compiled artifact: its source definition plus the
/// fingerprints of every callee it was linked against, in call-site order.
pub fn hash_compiled(source: &ContentHash, callees: &[(String, ContentHash)]) -> ContentHash {
    let mut fp = Fingerprint::tagged(TAG_COMPILED);
    fp.write_hash(source).write_u64(callees.len() as u64);
    for (name, hash) in callees {
        fp.write_str(name).write_hash(hash);
    }
    fp.finish()
}

/// Fingerprint of a native primitive, identified by its qualified name.
pub fn hash_native(name: &str) -> ContentHash {
    Fingerprint::tagged(TAG_NATIVE).write_str(name).finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::navigate::find_function;

    fn fn_hash(source: &str, name: &str) -> ContentHash {
        let file = crate::parse_source_silent(source, "test.fst").unwrap();
        hash_fn(find_function(&file, name).unwrap())
    }

    #[test]
    fn test_formatting_does_not_change_hash() {
        let a = fn_hash("fn f(x) { x * x }", "f");
        let b = fn_hash("// square\nfn f(x) {\n    x  *  x\n}\n", "f");
        assert_eq!(a, b);
    }

    #[test]
    fn test_body_change_changes_hash() {
        let a = fn_hash("fn f(x) { x * x }", "f");
        let b = fn_hash("fn f(x) { x * x * x }", "f");
        assert_ne!(a, b);
    }

    #[test]
    fn test_compiled_hash_depends_on_callees() {
        let src = fn_hash("fn f(x) { g(x) }", "f");
        let g1 = fn_hash("fn g(x) { x }", "g");
        let g2 = fn_hash("fn g(x) { x + 1 }", "g");
        let a = hash_compiled(&src, &[("g".to_string(), g1)]);
        let b = hash_compiled(&src, &[("g".to_string(), g2)]);
        assert_ne!(a, b);
        assert_eq!(a, hash_compiled(&src, &[("g".to_string(), g1)]));
    }

    #[test]
    fn test_length_prefix_prevents_aliasing() {
        let a = Fingerprint::key().write_str("ab").write_str("c").finish();
        let b = Fingerprint::key().write_str("a").write_str("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_display() {
        let hash = hash_native("math.erf");
        assert_eq!(hash.to_short().len(), 8);
        assert_eq!(hash.to_hex().len(), 64);
        assert_eq!(format!("{}", hash), format!("#{}", hash.to_short()));
        assert_ne!(hash, ContentHash::zero());
    }
}
