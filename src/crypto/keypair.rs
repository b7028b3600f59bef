//! RSA key operations.
//!
//! Every certificate issued by genca, the authority included, gets its own
//! freshly generated 4096-bit RSA key pair.

use crate::error::{GenCaError, Result};
use der::{Decode, Encode};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use spki::SubjectPublicKeyInfoOwned;
use std::fmt;

/// Fixed key strength for every generated key.
pub const KEY_BITS: usize = 4096;

/// PEM label of the legacy PKCS#1 private key encoding.
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";

/// An RSA key pair. The private half never leaves this struct except through
/// the explicit PKCS#1 export.
pub struct KeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl KeyPair {
    /// Create a key pair from a private key.
    pub fn from_private(private: RsaPrivateKey) -> Self {
        let public = private.to_public_key();
        Self { private, public }
    }

    /// The public half.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    /// The public key as a `SubjectPublicKeyInfo` structure.
    pub fn subject_public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let der = self
            .public
            .to_public_key_der()
            .map_err(|e| GenCaError::Signing(format!("Failed to encode public key: {}", e)))?;

        SubjectPublicKeyInfoOwned::from_der(der.as_bytes())
            .map_err(|e| GenCaError::Signing(format!("Failed to decode public key info: {}", e)))
    }

    /// The private key in PKCS#1 DER form.
    pub fn to_pkcs1_der(&self) -> Result<Vec<u8>> {
        let document = self
            .private
            .to_pkcs1_der()
            .map_err(|e| GenCaError::Pem(format!("Failed to encode private key: {}", e)))?;
        Ok(document.as_bytes().to_vec())
    }

    /// Load a key pair from PKCS#1 DER bytes.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|e| GenCaError::Pem(format!("Failed to decode private key: {}", e)))?;
        Ok(Self::from_private(private))
    }

    /// Load a key pair from an `RSA PRIVATE KEY` PEM block.
    pub fn from_pkcs1_pem(pem_str: &str) -> Result<Self> {
        let pem = pem::parse(pem_str)
            .map_err(|e| GenCaError::Pem(format!("Failed to parse PEM: {}", e)))?;

        if pem.tag() != RSA_PRIVATE_KEY_LABEL {
            return Err(GenCaError::Pem(format!(
                "Expected {}, got {}",
                RSA_PRIVATE_KEY_LABEL,
                pem.tag()
            )));
        }

        Self::from_pkcs1_der(pem.contents())
    }

    /// Sign `message` with RSASSA-PKCS1-v1_5 over SHA-256.
    pub fn sign_sha256(&self, message: &[u8]) -> Result<Vec<u8>> {
        let digest = Sha256::digest(message);
        self.private
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| GenCaError::Signing(format!("RSA signing failed: {}", e)))
    }

    /// Whether this key pair holds the private half of `public`.
    pub fn matches(&self, public: &RsaPublicKey) -> bool {
        &self.public == public
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

/// Verify an RSASSA-PKCS1-v1_5/SHA-256 signature.
pub fn verify_sha256(public: &RsaPublicKey, message: &[u8], signature: &[u8]) -> Result<()> {
    let digest = Sha256::digest(message);
    public
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .map_err(|e| GenCaError::Signing(format!("Signature verification failed: {}", e)))
}

/// Recover an RSA public key from a `SubjectPublicKeyInfo`.
pub fn public_key_from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<RsaPublicKey> {
    let der = spki
        .to_der()
        .map_err(|e| GenCaError::Signing(format!("Failed to encode public key info: {}", e)))?;

    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| GenCaError::Signing(format!("Not an RSA public key: {}", e)))
}

/// Generate a new 4096-bit RSA key pair from the operating system's CSPRNG.
///
/// # Example
///
/// ```no_run
/// use genca::crypto::keypair::{generate_rsa_keypair, KEY_BITS};
///
/// let keypair = generate_rsa_keypair().unwrap();
/// assert_eq!(keypair.bits(), KEY_BITS);
/// ```
pub fn generate_rsa_keypair() -> Result<KeyPair> {
    let private = RsaPrivateKey::new(&mut OsRng, KEY_BITS).map_err(|e| {
        GenCaError::KeyGeneration(format!("Failed to generate RSA {} bit key: {}", KEY_BITS, e))
    })?;
    Ok(KeyPair::from_private(private))
}

/// Key pairs shared across unit tests; 4096-bit generation is too slow to
/// repeat in every test.
#[cfg(test)]
pub(crate) mod test_keys {
    use super::{generate_rsa_keypair, KeyPair};
    use std::sync::OnceLock;

    pub(crate) fn authority() -> &'static KeyPair {
        static KEY: OnceLock<KeyPair> = OnceLock::new();
        KEY.get_or_init(|| generate_rsa_keypair().unwrap())
    }

    pub(crate) fn leaf() -> &'static KeyPair {
        static KEY: OnceLock<KeyPair> = OnceLock::new();
        KEY.get_or_init(|| generate_rsa_keypair().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_has_fixed_size() {
        assert_eq!(test_keys::authority().bits(), KEY_BITS);
    }

    #[test]
    fn test_generated_keys_differ() {
        assert!(!test_keys::authority().matches(test_keys::leaf().public_key()));
    }

    #[test]
    fn test_pkcs1_der_roundtrip_preserves_public_key() {
        let keypair = test_keys::authority();
        let der = keypair.to_pkcs1_der().unwrap();
        let loaded = KeyPair::from_pkcs1_der(&der).unwrap();
        assert!(loaded.matches(keypair.public_key()));
    }

    #[test]
    fn test_from_pkcs1_pem_rejects_wrong_label() {
        let der = test_keys::authority().to_pkcs1_der().unwrap();
        let pem_str = pem::encode(&pem::Pem::new("PRIVATE KEY", der));
        let result = KeyPair::from_pkcs1_pem(&pem_str);
        assert!(matches!(result, Err(GenCaError::Pem(_))));
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = test_keys::authority();
        let signature = keypair.sign_sha256(b"to be signed").unwrap();

        assert!(verify_sha256(keypair.public_key(), b"to be signed", &signature).is_ok());
        assert!(verify_sha256(keypair.public_key(), b"tampered", &signature).is_err());
        assert!(verify_sha256(test_keys::leaf().public_key(), b"to be signed", &signature).is_err());
    }

    #[test]
    fn test_spki_roundtrip() {
        let keypair = test_keys::leaf();
        let spki = keypair.subject_public_key_info().unwrap();
        let public = public_key_from_spki(&spki).unwrap();
        assert!(keypair.matches(&public));
    }

    #[test]
    fn test_debug_hides_key_material() {
        let text = format!("{:?}", test_keys::leaf());
        assert!(text.contains("4096"));
        assert!(!text.contains("private"));
    }
}
