use crate::error::CryptError;

/// Signature check and body decryption for callbacks.
///
/// Implementations wrap the vendor's message-crypto scheme (token,
/// EncodingAESKey, receiver id). Both methods return plaintext bytes.
pub trait MsgCrypt: Send + Sync {
    /// Answer the URL ownership challenge sent when the callback URL is saved.
    fn verify_url(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        echostr: &str,
    ) -> Result<Vec<u8>, CryptError>;

    fn decrypt_msg(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        body: &[u8],
    ) -> Result<Vec<u8>, CryptError>;
}

/// Accepts every request and hands the payload through unchanged.
///
/// Only meant for local development, or for deployments where a gateway in
/// front of this process has already checked signatures and decrypted bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCrypt;

impl MsgCrypt for PassthroughCrypt {
    fn verify_url(
        &self,
        _msg_signature: &str,
        _timestamp: &str,
        _nonce: &str,
        echostr: &str,
    ) -> Result<Vec<u8>, CryptError> {
        Ok(echostr.as_bytes().to_vec())
    }

    fn decrypt_msg(
        &self,
        _msg_signature: &str,
        _timestamp: &str,
        _nonce: &str,
        body: &[u8],
    ) -> Result<Vec<u8>, CryptError> {
        Ok(body.to_vec())
    }
}
