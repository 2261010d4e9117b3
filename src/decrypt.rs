//! Chunked RSA decryption of encrypted response bodies
//!
//! When the server encrypts a configuration payload it splits the plaintext,
//! RSA-encrypts every piece independently with PKCS#1 v1.5 padding and
//! concatenates the ciphertexts. Each ciphertext block is exactly one modulus
//! long, so decryption walks the body in modulus-sized chunks and joins the
//! plaintext pieces in their original order.
//!
//! # Example
//!
//! ```no_run
//! use apollo_client::{ChunkedRsaDecryptor, PrivateKeyHandle};
//!
//! # fn example(body: &[u8]) -> Result<(), apollo_client::ApolloError> {
//! let key = PrivateKeyHandle::from_base64_der("MIIJQwIBADANBgkqhkiG9w0BAQEFAASC...")?;
//! let text = ChunkedRsaDecryptor::new(&key).decrypt(body)?;
//! # Ok(())
//! # }
//! ```

use rsa::Pkcs1v15Encrypt;
use zeroize::Zeroize;

use crate::error::ApolloError;
use crate::key::PrivateKeyHandle;

/// A primitive that decrypts one ciphertext block at a time
///
/// Implemented by [`PrivateKeyHandle`] with PKCS#1 v1.5 padding. Other
/// backends can be plugged into [`ChunkedRsaDecryptor`] through this trait.
pub trait BlockDecryptor {
    /// Ciphertext block length in bytes (the RSA modulus length)
    fn block_len(&self) -> usize;

    /// Decrypt a single block, returning the unpadded plaintext
    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>, String>;
}

impl BlockDecryptor for PrivateKeyHandle {
    fn block_len(&self) -> usize {
        self.modulus_len()
    }

    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>, String> {
        self.as_rsa()
            .decrypt(Pkcs1v15Encrypt, block)
            .map_err(|e| e.to_string())
    }
}

/// Splits ciphertext into blocks and decrypts them in order
pub struct ChunkedRsaDecryptor<'a, D: BlockDecryptor + ?Sized> {
    decryptor: &'a D,
    chunk_size: usize,
}

impl<'a, D: BlockDecryptor + ?Sized> ChunkedRsaDecryptor<'a, D> {
    /// Create a decryptor whose chunk size is the key's block length
    pub fn new(decryptor: &'a D) -> Self {
        Self {
            chunk_size: decryptor.block_len(),
            decryptor,
        }
    }

    /// Override the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self, ApolloError> {
        if chunk_size == 0 {
            return Err(ApolloError::InvalidChunkSize);
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    /// Chunk size used to split the ciphertext
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Decrypt `ciphertext` and decode the joined plaintext as UTF-8
    ///
    /// The last chunk may be shorter than the chunk size; it is handed to the
    /// RSA primitive unchanged and rejected there if malformed.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<String, ApolloError> {
        let bytes = self.decrypt_bytes(ciphertext)?;
        String::from_utf8(bytes).map_err(|e| {
            let mut rejected = e.into_bytes();
            rejected.zeroize();
            ApolloError::InvalidPlaintext
        })
    }

    /// Decrypt `ciphertext` into raw plaintext bytes
    pub fn decrypt_bytes(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ApolloError> {
        if self.chunk_size == 0 {
            return Err(ApolloError::InvalidChunkSize);
        }

        let chunk_count = ciphertext.len().div_ceil(self.chunk_size);
        tracing::debug!(
            ciphertext_len = ciphertext.len(),
            chunk_size = self.chunk_size,
            chunk_count = chunk_count,
            "decrypting response body"
        );

        let mut plaintext = Vec::with_capacity(ciphertext.len());
        for (chunk_index, chunk) in ciphertext.chunks(self.chunk_size).enumerate() {
            let mut piece = match self.decryptor.decrypt_block(chunk) {
                Ok(piece) => piece,
                Err(reason) => {
                    plaintext.zeroize();
                    return Err(ApolloError::Decryption {
                        chunk_index,
                        reason,
                    });
                }
            };
            plaintext.extend_from_slice(&piece);
            piece.zeroize();
        }

        Ok(plaintext)
    }
}

/// Decrypt an encrypted response body with the key's own block length
pub fn decrypt_response_body(
    key: &PrivateKeyHandle,
    ciphertext: &[u8],
) -> Result<String, ApolloError> {
    ChunkedRsaDecryptor::new(key).decrypt(ciphertext)
}
