//! Key material for the node handshake: long-lived RSA identities,
//! ephemeral X25519 agreement, and the derived session cipher.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use sn_domain::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// HKDF info string binding derived keys to this protocol version.
const SESSION_KDF_INFO: &[u8] = b"spacenode/session/v1";
const AEAD_NONCE_LEN: usize = 12;
/// OAEP-SHA256 overhead per block: two hash lengths plus two bytes.
const OAEP_OVERHEAD: usize = 2 * 32 + 2;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RSA identities
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An RSA public key used to seal handshake records to its owner.
///
/// Payloads longer than one OAEP block are split into blocks of the
/// key's capacity and the ciphertext blocks are concatenated.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPublic(RsaPublicKey);

impl RsaPublic {
    /// Parse a PKCS#8 (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map(Self)
            .map_err(|e| Error::Crypto(format!("invalid RSA public key: {e}")))
    }

    pub fn to_pem(&self) -> Result<String> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::Crypto(format!("failed to encode RSA public key: {e}")))
    }

    fn block_capacity(&self) -> Result<usize> {
        self.0
            .size()
            .checked_sub(OAEP_OVERHEAD)
            .filter(|n| *n > 0)
            .ok_or_else(|| Error::Crypto("RSA key too small for OAEP-SHA256".into()))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let capacity = self.block_capacity()?;
        let mut rng = OsRng;
        let mut out = Vec::with_capacity(self.0.size() * (plaintext.len() / capacity + 1));

        // An empty payload still produces one block so decryption has
        // something to authenticate.
        let blocks: Vec<&[u8]> = if plaintext.is_empty() {
            vec![plaintext]
        } else {
            plaintext.chunks(capacity).collect()
        };
        for block in blocks {
            let sealed = self
                .0
                .encrypt(&mut rng, Oaep::new::<Sha256>(), block)
                .map_err(|e| Error::Crypto(format!("RSA encryption failed: {e}")))?;
            out.extend_from_slice(&sealed);
        }
        Ok(out)
    }

    pub fn encrypt_base64(&self, plaintext: &[u8]) -> Result<String> {
        Ok(STANDARD.encode(self.encrypt(plaintext)?))
    }
}

impl fmt::Debug for RsaPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RsaPublic({} bits)", self.0.size() * 8)
    }
}

/// An RSA private key. Never leaves the process that owns it.
#[derive(Clone)]
pub struct RsaPrivate(RsaPrivateKey);

impl RsaPrivate {
    /// Generate a fresh key. Slow; meant for provisioning and tests.
    pub fn generate(bits: usize) -> Result<Self> {
        RsaPrivateKey::new(&mut OsRng, bits)
            .map(Self)
            .map_err(|e| Error::Crypto(format!("RSA key generation failed: {e}")))
    }

    /// Parse a PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map(Self)
            .map_err(|e| Error::Crypto(format!("invalid RSA private key: {e}")))
    }

    pub fn to_pem(&self) -> Result<String> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.as_str().to_owned())
            .map_err(|e| Error::Crypto(format!("failed to encode RSA private key: {e}")))
    }

    pub fn public_key(&self) -> RsaPublic {
        RsaPublic(self.0.to_public_key())
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let block = self.0.size();
        if ciphertext.is_empty() || ciphertext.len() % block != 0 {
            return Err(Error::Decryption(format!(
                "ciphertext length {} is not a multiple of the {block}-byte key size",
                ciphertext.len()
            )));
        }
        let mut out = Vec::with_capacity(ciphertext.len());
        for sealed in ciphertext.chunks(block) {
            let plain = self
                .0
                .decrypt(Oaep::new::<Sha256>(), sealed)
                .map_err(|e| Error::Decryption(format!("RSA decryption failed: {e}")))?;
            out.extend_from_slice(&plain);
        }
        Ok(out)
    }

    pub fn decrypt_base64(&self, encoded: &str) -> Result<Vec<u8>> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Decryption(format!("invalid base64 ciphertext: {e}")))?;
        self.decrypt(&raw)
    }
}

impl fmt::Debug for RsaPrivate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RsaPrivate({} bits)", self.0.size() * 8)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ephemeral ECDH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Single-use X25519 keypair. Consumed by [`EphemeralKey::agree`].
pub struct EphemeralKey {
    secret: x25519_dalek::EphemeralSecret,
    public: x25519_dalek::PublicKey,
}

impl EphemeralKey {
    pub fn generate() -> Self {
        let secret = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
        let public = x25519_dalek::PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.public.as_bytes())
    }

    /// Complete the exchange with the peer's base64 public key.
    ///
    /// Rejects low-order peer keys, which would force an all-zero secret.
    pub fn agree(self, peer_public_b64: &str) -> Result<SharedSecret> {
        let peer = decode_x25519_public(peer_public_b64)?;
        let shared = self.secret.diffie_hellman(&peer);
        if !shared.was_contributory() {
            return Err(Error::Crypto("peer ECDH key is low-order".into()));
        }
        Ok(SharedSecret(*shared.as_bytes()))
    }
}

fn decode_x25519_public(encoded: &str) -> Result<x25519_dalek::PublicKey> {
    let raw = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::Crypto(format!("invalid ECDH public key encoding: {e}")))?;
    let bytes: [u8; 32] = raw
        .try_into()
        .map_err(|_| Error::Crypto("ECDH public key must be 32 bytes".into()))?;
    Ok(x25519_dalek::PublicKey::from(bytes))
}

/// Raw X25519 output. Only ever fed to [`SessionCipher::derive`].
pub struct SharedSecret([u8; 32]);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session cipher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Symmetric keys for one authenticated session: a ChaCha20-Poly1305
/// key for sealing and a separate HMAC-SHA256 key for request MACs.
#[derive(Clone)]
pub struct SessionCipher {
    enc_key: [u8; 32],
    mac_key: [u8; 32],
}

impl SessionCipher {
    /// HKDF-SHA256 over the shared secret, salted with the handshake
    /// nonce so both sides bind the keys to that exchange.
    pub fn derive(shared: &SharedSecret, nonce: i64) -> Result<Self> {
        let salt = nonce.to_be_bytes();
        let hk = Hkdf::<Sha256>::new(Some(&salt), &shared.0);
        let mut okm = [0u8; 64];
        hk.expand(SESSION_KDF_INFO, &mut okm)
            .map_err(|e| Error::Crypto(format!("session key derivation failed: {e}")))?;

        let mut enc_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        enc_key.copy_from_slice(&okm[..32]);
        mac_key.copy_from_slice(&okm[32..]);
        Ok(Self { enc_key, mac_key })
    }

    /// Seal `plaintext`; output is `nonce || ciphertext+tag`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.enc_key));
        let mut nonce = [0u8; AEAD_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| Error::Crypto(format!("session encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(AEAD_NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < AEAD_NONCE_LEN {
            return Err(Error::Decryption("sealed payload too short".into()));
        }
        let (nonce, body) = sealed.split_at(AEAD_NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.enc_key));
        cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|_| Error::Decryption("session payload failed authentication".into()))
    }

    pub fn seal_base64(&self, plaintext: &[u8]) -> Result<String> {
        Ok(STANDARD.encode(self.seal(plaintext)?))
    }

    pub fn open_base64(&self, encoded: &str) -> Result<Vec<u8>> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Decryption(format!("invalid base64 payload: {e}")))?;
        self.open(&raw)
    }

    /// HMAC-SHA256 over length-prefixed parts.
    pub fn mac(&self, parts: &[&[u8]]) -> Vec<u8> {
        self.mac_state(parts).finalize().into_bytes().to_vec()
    }

    /// Constant-time check of a MAC produced by [`SessionCipher::mac`].
    pub fn verify_mac(&self, parts: &[&[u8]], tag: &[u8]) -> bool {
        self.mac_state(parts).verify_slice(tag).is_ok()
    }

    fn mac_state(&self, parts: &[&[u8]]) -> HmacSha256 {
        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.mac_key)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        for part in parts {
            mac.update(&(part.len() as u64).to_be_bytes());
            mac.update(part);
        }
        mac
    }
}

impl fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCipher(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::keys;

    fn agreed_pair(nonce: i64) -> (SessionCipher, SessionCipher) {
        let a = EphemeralKey::generate();
        let b = EphemeralKey::generate();
        let a_pub = a.public_key_base64();
        let b_pub = b.public_key_base64();
        let sa = a.agree(&b_pub).unwrap();
        let sb = b.agree(&a_pub).unwrap();
        (
            SessionCipher::derive(&sa, nonce).unwrap(),
            SessionCipher::derive(&sb, nonce).unwrap(),
        )
    }

    #[test]
    fn rsa_seals_multi_block_payloads() {
        let key = keys::node_key();
        let payload = vec![7u8; 500];
        let sealed = key.public_key().encrypt_base64(&payload).unwrap();
        assert_eq!(key.decrypt_base64(&sealed).unwrap(), payload);
    }

    #[test]
    fn rsa_rejects_wrong_key() {
        let sealed = keys::node_key().public_key().encrypt(b"hello").unwrap();
        let err = keys::device_key().decrypt(&sealed).unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn rsa_pem_round_trip_accepts_both_encodings() {
        let key = keys::device_key();
        let pem = key.to_pem().unwrap();
        assert!(RsaPrivate::from_pem(&pem).is_ok());
        let public_pem = key.public_key().to_pem().unwrap();
        assert_eq!(RsaPublic::from_pem(&public_pem).unwrap(), key.public_key());
        assert!(matches!(RsaPublic::from_pem("garbage"), Err(Error::Crypto(_))));
    }

    #[test]
    fn both_sides_derive_the_same_cipher() {
        let (device, node) = agreed_pair(1_700_000_000_000);
        let sealed = node.seal_base64(b"plain text test").unwrap();
        assert_eq!(device.open_base64(&sealed).unwrap(), b"plain text test");
        assert_eq!(device.mac(&[b"a", b"b"]), node.mac(&[b"a", b"b"]));
    }

    #[test]
    fn nonce_salt_separates_sessions() {
        let a = EphemeralKey::generate();
        let b = EphemeralKey::generate();
        let b_pub = b.public_key_base64();
        let shared = a.agree(&b_pub).unwrap();
        let one = SessionCipher::derive(&shared, 1).unwrap();
        let two = SessionCipher::derive(&shared, 2).unwrap();
        let sealed = one.seal(b"x").unwrap();
        assert!(two.open(&sealed).is_err());
    }

    #[test]
    fn mac_parts_are_length_prefixed() {
        let (cipher, _) = agreed_pair(5);
        let tag = cipher.mac(&[b"ab", b"c"]);
        assert!(cipher.verify_mac(&[b"ab", b"c"], &tag));
        assert!(!cipher.verify_mac(&[b"a", b"bc"], &tag));
    }

    #[test]
    fn low_order_peer_key_is_rejected() {
        let zero = STANDARD.encode([0u8; 32]);
        let err = EphemeralKey::generate().agree(&zero).err().unwrap();
        assert!(matches!(err, Error::Crypto(_)));
    }
}
