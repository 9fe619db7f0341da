//! Literal pool interface (§6 "Literal pool").
//!
//! String literals decay to a `Location::Literal` address-of rvalue
//! (§4.3); the pool owns the bytes and hands back a stable label.

pub trait LiteralPool {
    /// Register `bytes` (already including any trailing NUL the front
    /// end wants) and return a label identifying its storage.
    fn use_literal(&mut self, bytes: &[u8]) -> String;
    fn literal_size(&self, label: &str) -> Option<u32>;
    fn literal_label(&self, label: &str) -> String {
        label.to_string()
    }
}

#[derive(Debug, Default)]
pub struct TestLiteralPool {
    entries: Vec<(String, Vec<u8>)>,
    next_id: u32,
}

impl TestLiteralPool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LiteralPool for TestLiteralPool {
    fn use_literal(&mut self, bytes: &[u8]) -> String {
        let label = format!("L{:04}", self.next_id);
        self.next_id += 1;
        self.entries.push((label.clone(), bytes.to_vec()));
        label
    }

    fn literal_size(&self, label: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, b)| b.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_literal_gets_a_distinct_label() {
        let mut pool = TestLiteralPool::new();
        let a = pool.use_literal(b"hello\0");
        let b = pool.use_literal(b"world\0");
        assert_ne!(a, b);
        assert_eq!(pool.literal_size(&a), Some(6));
    }
}
