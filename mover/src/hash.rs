use blake3::Hasher;

use crate::collision::{Quat, Vec3};

/// 32-byte content digest of simulation state.
pub type Digest = [u8; 32];

/// Incremental hasher for canonical state digests.
///
/// Every value is fed little-endian; strings and optional values are length/presence
/// prefixed so adjacent fields cannot alias.
pub struct StateHasher(Hasher);

impl Default for StateHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHasher {
    pub fn new() -> Self {
        StateHasher(Hasher::new())
    }

    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    #[inline]
    pub fn update_f32(&mut self, v: f32) {
        self.0.update(&v.to_le_bytes());
    }

    #[inline]
    pub fn update_f64(&mut self, v: f64) {
        self.0.update(&v.to_le_bytes());
    }

    #[inline]
    pub fn update_u32(&mut self, v: u32) {
        self.0.update(&v.to_le_bytes());
    }

    #[inline]
    pub fn update_u64(&mut self, v: u64) {
        self.0.update(&v.to_le_bytes());
    }

    #[inline]
    pub fn update_bool(&mut self, v: bool) {
        self.0.update(&[v as u8]);
    }

    pub fn update_str(&mut self, s: &str) {
        self.update_u64(s.len() as u64);
        self.0.update(s.as_bytes());
    }

    pub fn update_opt_str(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                self.update_bool(true);
                self.update_str(s);
            }
            None => self.update_bool(false),
        }
    }

    #[inline]
    pub fn update_vec3(&mut self, v: &Vec3) {
        for c in [v.x, v.y, v.z] {
            self.update_f32(c);
        }
    }

    #[inline]
    pub fn update_quat(&mut self, q: &Quat) {
        let c = q.coords;
        for v in [c.x, c.y, c.z, c.w] {
            self.update_f32(v);
        }
    }

    pub fn finalize(self) -> Digest {
        *self.0.finalize().as_bytes()
    }
}
