use crate::{DecodeError, FactorId};

/// Decoder side dictionary, storing each phrase as its prefix id and last byte.
///
/// Single byte phrases have no prefix. With an empty root, id 0 stands for the empty phrase
/// and phrases extending it have no prefix either.
pub(crate) struct Phrases {
    prefixes: Vec<Option<FactorId>>,
    last_bytes: Vec<u8>,
    empty_root: bool,
    scratch: Vec<u8>,
}

impl Phrases {
    /// Dictionary with the empty phrase as id 0.
    pub fn with_empty_root() -> Self {
        Self {
            prefixes: vec![None],
            last_bytes: vec![0],
            empty_root: true,
            scratch: vec![],
        }
    }

    /// Dictionary with one single byte phrase per byte value, using the byte as id.
    pub fn with_byte_roots() -> Self {
        Self {
            prefixes: vec![None; 256],
            last_bytes: (0..=u8::MAX).collect(),
            empty_root: false,
            scratch: vec![],
        }
    }

    fn initial_len(&self) -> usize {
        if self.empty_root {
            1
        } else {
            256
        }
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Adds the phrase extending `prefix`, a valid id, by `byte`.
    pub fn push(&mut self, prefix: usize, byte: u8) {
        let prefix = (!(self.empty_root && prefix == 0)).then_some(prefix as FactorId);
        self.prefixes.push(prefix);
        self.last_bytes.push(byte);
    }

    /// Drops all phrases but the roots once the dictionary has `max_len` phrases.
    pub fn reset_if_full(&mut self, max_len: Option<usize>) {
        if max_len.is_some_and(|max_len| self.len() >= max_len) {
            let initial_len = self.initial_len();
            self.prefixes.truncate(initial_len);
            self.last_bytes.truncate(initial_len);
        }
    }

    pub fn check(&self, index: FactorId) -> Result<usize, DecodeError> {
        match usize::try_from(index) {
            Ok(index) if index < self.len() => Ok(index),
            _ => Err(DecodeError::UnknownPhrase {
                index,
                dictionary_size: self.len(),
            }),
        }
    }

    /// Appends the phrase `index`, a valid id, to `output`.
    pub fn expand_into(&mut self, index: usize, output: &mut Vec<u8>) {
        if self.empty_root && index == 0 {
            return;
        }
        self.scratch.clear();
        let mut id = index;
        loop {
            self.scratch.push(self.last_bytes[id]);
            match self.prefixes[id] {
                Some(prefix) => id = prefix as usize,
                None => break,
            }
        }
        output.extend(self.scratch.iter().rev());
    }
}
