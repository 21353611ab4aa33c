//! The RC4 stream cipher.

pub(crate) struct Rc4 {
    i: u8,
    j: u8,
    state: [u8; 256],
}

impl Rc4 {
    pub(crate) fn new(key: &[u8]) -> Self {
        let mut state: [u8; 256] = std::array::from_fn(|i| i as u8);

        if !key.is_empty() {
            let mut j = 0_u8;

            for i in 0..256 {
                j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
                state.swap(i, j as usize);
            }
        }

        Self { i: 0, j: 0, state }
    }

    /// Encryption and decryption are the same operation.
    pub(crate) fn apply(&mut self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .map(|b| {
                self.i = self.i.wrapping_add(1);
                self.j = self.j.wrapping_add(self.state[self.i as usize]);
                self.state.swap(self.i as usize, self.j as usize);
                let k = self.state[self.i as usize].wrapping_add(self.state[self.j as usize]);

                b ^ self.state[k as usize]
            })
            .collect()
    }
}

/// Apply RC4 with `key` to `data`.
pub(crate) fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    Rc4::new(key).apply(data)
}
