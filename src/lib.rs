mod codec;
mod crypto;
mod escape;
mod token;

pub use codec::{decode, decode_into, encode, encode_into, encoded_len, Base64Error, EncodingMode};
pub use crypto::{sign, SigMethod, UnknownSigMethod};
pub use escape::escape_signature;
pub use token::{TokenError, TokenRequest, TOKEN_VERSION};
